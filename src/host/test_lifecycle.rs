use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::host::context::{AffinityMap, DispatchTarget, SchedulerMode};
use crate::host::error::LogSupervisor;
use crate::host::lifecycle::{LifecycleRegistry, ScopeToken};
use crate::host::scheduler::TickScheduler;
use crate::host::task::Cancellable;

/// Cancellable that just remembers whether (and how often) it was cancelled.
struct FlagCancel {
    cancelled: Arc<AtomicUsize>,
}

impl FlagCancel {
    fn pair() -> (Self, Arc<AtomicUsize>) {
        let cancelled = Arc::new(AtomicUsize::new(0));
        (
            Self {
                cancelled: cancelled.clone(),
            },
            cancelled,
        )
    }
}

impl Cancellable for FlagCancel {
    fn cancel(&self) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}

fn scheduler() -> Arc<TickScheduler> {
    Arc::new(TickScheduler::new(
        SchedulerMode::Global,
        Arc::new(AffinityMap::new()),
        Arc::new(LogSupervisor),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_interning_is_stable() {
        let mut registry = LifecycleRegistry::new();
        let round = registry.scope("round");
        let hud = registry.scope("hud");
        assert_eq!(round, registry.scope("round"));
        assert_ne!(round, hud);
        assert_ne!(round, ScopeToken::DEFAULT);
    }

    #[test]
    fn clearing_one_scope_leaves_others_schedulable() {
        let sched = scheduler();
        let mut registry = LifecycleRegistry::new();
        let round = registry.scope("round");

        let ran_a = Arc::new(AtomicBool::new(false));
        let ran_b = Arc::new(AtomicBool::new(false));

        let a = {
            let ran = ran_a.clone();
            sched.run_after(DispatchTarget::Global, 2, move || {
                ran.store(true, Ordering::SeqCst);
            })
        };
        let b = {
            let ran = ran_b.clone();
            sched.run_after(DispatchTarget::Global, 2, move || {
                ran.store(true, Ordering::SeqCst);
            })
        };
        registry.add(round, a);
        registry.add_default(b);

        registry.clear(round);
        for _ in 0..3 {
            sched.advance();
        }

        assert!(!ran_a.load(Ordering::SeqCst), "cleared member must never run");
        assert!(ran_b.load(Ordering::SeqCst), "other collections are untouched");
    }

    #[test]
    fn clear_cancels_each_member_exactly_once() {
        let mut registry = LifecycleRegistry::new();
        let round = registry.scope("round");
        let (unit, cancelled) = FlagCancel::pair();
        registry.add(round, unit);

        registry.clear(round);
        registry.clear(round);
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty(round));
    }

    #[test]
    fn cleared_scope_is_reusable_under_the_same_token() {
        let mut registry = LifecycleRegistry::new();
        let round = registry.scope("round");

        let (first, first_cancelled) = FlagCancel::pair();
        registry.add(round, first);
        registry.clear(round);

        let (second, second_cancelled) = FlagCancel::pair();
        registry.add(round, second);
        assert_eq!(registry.len(round), 1);

        registry.clear(round);
        assert_eq!(first_cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(second_cancelled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_all_sweeps_every_collection() {
        let mut registry = LifecycleRegistry::new();
        let round = registry.scope("round");
        let hud = registry.scope("hud");

        let (a, a_cancelled) = FlagCancel::pair();
        let (b, b_cancelled) = FlagCancel::pair();
        let (c, c_cancelled) = FlagCancel::pair();
        registry.add(round, a);
        registry.add(hud, b);
        registry.add_default(c);

        registry.clear_all();
        assert_eq!(a_cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(b_cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(c_cancelled.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty(round));
        assert!(registry.is_empty(hud));
        assert!(registry.is_empty(ScopeToken::DEFAULT));
    }
}
