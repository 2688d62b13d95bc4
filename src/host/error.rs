use std::any::Any;

use log::error;
use thiserror::Error;

/// Why a dispatch could not be carried out.
///
/// Both kinds are expected, transient, and recovered locally: the affected
/// task is dropped and logged, nothing propagates to the submitting caller.
///
/// Two conditions from the same family are deliberately *not* errors:
/// routing back past the root screen is a normal session close, and
/// cancelling an already-terminal task or subscription is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The owning context can no longer accept work (session torn down,
    /// host shutting down).
    #[error("scheduling unavailable: the owning context no longer accepts work")]
    SchedulingUnavailable,

    /// The target entity or session is no longer resolvable (disconnected,
    /// removed, moved out of the world).
    #[error("invalid affinity target: entity cannot be resolved to an owner")]
    InvalidAffinityTarget,
}

/// Sink for failures that are *not* part of the expected taxonomy above.
///
/// Expected "target gone" conditions never reach the supervisor; panics
/// inside task bodies and stream stages always do. The scheduler and the
/// bridge keep running either way.
pub trait Supervisor: Send + Sync {
    fn report_panic(&self, origin: &'static str, payload: Box<dyn Any + Send>);
}

/// Default supervisor: reports through the log facade.
pub struct LogSupervisor;

impl Supervisor for LogSupervisor {
    fn report_panic(&self, origin: &'static str, payload: Box<dyn Any + Send>) {
        let msg = panic_message(&payload);
        error!("panic in {}: {}", origin, msg);
    }
}

/// Best-effort extraction of the human-readable part of a panic payload.
pub fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
