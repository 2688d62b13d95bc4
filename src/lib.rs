//! In-process application host for interactive screens inside a live
//! multiplayer game-server process.
//!
//! The core is a dual-mode tick scheduler (one global logical thread, or
//! region-affine threads selected by a one-time capability probe), a
//! lifecycle-scoped cancellation registry, a reactive-stream bridge that
//! re-dispatches every consuming stage onto the context owning its target,
//! and the per-session navigation stack of screens built on top of them.

pub mod config;
pub mod host;

pub use config::HostConfig;
pub use host::{
    AffinityMap, AffinityResolver, Cancellable, DispatchError, DispatchTarget, EntityId,
    ExecutionContext, HostContext, LifecycleRegistry, NavigationStack, ReactiveBridge, RegionId,
    RouteBack, SchedulerMode, ScopeToken, Screen, ScreenId, ScreenStatus, Session, SessionId,
    StreamSubscription, Supervisor, TaskHandle, TaskState, TickScheduler, probe_scheduler_mode,
};
