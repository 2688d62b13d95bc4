pub mod bridge;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod navigation;
pub mod scheduler;
pub mod session;
pub mod task;


#[cfg(test)]
mod test_bridge;

#[cfg(test)]
mod test_lifecycle;


pub use bridge::{ReactiveBridge, StreamSubscription};
pub use context::{
    AffinityMap, AffinityResolver, DispatchTarget, EntityId, ExecutionContext, HostContext,
    RegionId, SchedulerMode, probe_scheduler_mode,
};
pub use error::{DispatchError, LogSupervisor, Supervisor};
pub use lifecycle::{LifecycleRegistry, ScopeToken};
pub use navigation::{
    NavigationStack, ResultCallback, RouteBack, Screen, ScreenId, ScreenResult, ScreenStatus,
};
pub use scheduler::TickScheduler;
pub use session::{Session, SessionId, ShutdownNotifier};
pub use task::{Cancellable, TaskHandle, TaskState};
