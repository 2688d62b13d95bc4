use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::channel::mpsc;

use crate::host::bridge::ReactiveBridge;
use crate::host::context::{AffinityMap, DispatchTarget, EntityId, RegionId, SchedulerMode};
use crate::host::error::{LogSupervisor, Supervisor, panic_message};
use crate::host::scheduler::TickScheduler;
use crate::host::task::Cancellable;

struct RecordingSupervisor {
    reports: Mutex<Vec<String>>,
}

impl RecordingSupervisor {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            reports: Mutex::new(Vec::new()),
        })
    }

    fn reports(&self) -> Vec<String> {
        self.reports.lock().unwrap().clone()
    }
}

impl Supervisor for RecordingSupervisor {
    fn report_panic(&self, origin: &'static str, payload: Box<dyn Any + Send>) {
        self.reports
            .lock()
            .unwrap()
            .push(format!("{}: {}", origin, panic_message(&payload)));
    }
}

fn bridge(mode: SchedulerMode) -> (ReactiveBridge, Arc<TickScheduler>, Arc<AffinityMap>) {
    let affinity = Arc::new(AffinityMap::new());
    let sched = Arc::new(TickScheduler::new(
        mode,
        affinity.clone(),
        Arc::new(LogSupervisor),
    ));
    let bridge = ReactiveBridge::new(sched.clone(), Arc::new(LogSupervisor));
    (bridge, sched, affinity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emission_runs_on_the_scheduled_tick_not_the_pump() {
        let (bridge, sched, _) = bridge(SchedulerMode::Global);
        let seen = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded::<u32>();

        let seen_in = seen.clone();
        bridge.attach(DispatchTarget::Global, rx, move |n| {
            seen_in.fetch_add(n as usize, Ordering::SeqCst);
        });

        tx.unbounded_send(5).unwrap();
        bridge.pump();
        assert_eq!(seen.load(Ordering::SeqCst), 0, "consumer must wait for its context");
        sched.advance();
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn gone_target_skips_emission_but_stream_survives() {
        let (bridge, sched, affinity) = bridge(SchedulerMode::RegionAffine);
        let player = EntityId::new();
        affinity.place(player, RegionId(9));
        let seen = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded::<u32>();

        let seen_in = seen.clone();
        bridge.attach(DispatchTarget::Entity(player), rx, move |_| {
            seen_in.fetch_add(1, Ordering::SeqCst);
        });

        // First emission targets an entity that is gone at dispatch time.
        tx.unbounded_send(1).unwrap();
        bridge.pump();
        affinity.remove(player);
        sched.advance();
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        // The stage is still attached; once the entity is owned again,
        // later emissions flow.
        affinity.place(player, RegionId(3));
        tx.unbounded_send(2).unwrap();
        bridge.pump();
        sched.advance();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancelled_subscription_never_runs_its_consumer() {
        let (bridge, sched, _) = bridge(SchedulerMode::Global);
        let seen = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded::<u32>();

        let seen_in = seen.clone();
        let subscription = bridge.attach(DispatchTarget::Global, rx, move |_| {
            seen_in.fetch_add(1, Ordering::SeqCst);
        });

        tx.unbounded_send(1).unwrap();
        bridge.pump();
        // Cancellation lands between re-dispatch and execution.
        subscription.cancel();
        subscription.cancel();
        sched.advance();
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert!(!subscription.is_live());
    }

    #[test]
    fn finished_stream_detaches_quietly() {
        let (bridge, sched, _) = bridge(SchedulerMode::Global);
        let seen = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded::<u32>();

        let seen_in = seen.clone();
        bridge.attach(DispatchTarget::Global, rx, move |_| {
            seen_in.fetch_add(1, Ordering::SeqCst);
        });

        tx.unbounded_send(1).unwrap();
        drop(tx);
        bridge.pump();
        sched.advance();
        assert_eq!(seen.load(Ordering::SeqCst), 1, "items before completion still flow");

        // Later pumps find nothing to do.
        bridge.pump();
        sched.advance();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn always_ready_producer_is_bounded_per_pump() {
        let (bridge, sched, _) = bridge(SchedulerMode::Global);
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_in = seen.clone();
        bridge.attach(DispatchTarget::Global, futures::stream::repeat(1u32), move |_| {
            seen_in.fetch_add(1, Ordering::SeqCst);
        });

        bridge.pump();
        sched.advance();
        let first = seen.load(Ordering::SeqCst);
        assert!(first > 0);
        assert!(first <= 16, "one pump drains a bounded batch, not the whole stream");

        bridge.pump();
        sched.advance();
        assert_eq!(
            seen.load(Ordering::SeqCst),
            first * 2,
            "the next pump picks up where the last one left off"
        );
    }

    #[test]
    fn producer_panic_escalates_and_detaches_the_stage() {
        let affinity = Arc::new(AffinityMap::new());
        let sched = Arc::new(TickScheduler::new(
            SchedulerMode::Global,
            affinity,
            Arc::new(LogSupervisor),
        ));
        let supervisor = RecordingSupervisor::new();
        let bridge = ReactiveBridge::new(sched, supervisor.clone());

        let stream = futures::stream::poll_fn(|_| -> std::task::Poll<Option<u32>> {
            panic!("bad producer")
        });
        bridge.attach(DispatchTarget::Global, stream, |_| {});

        bridge.pump();
        let reports = supervisor.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("bad producer"));

        // Stage was detached; pumping again reports nothing new.
        bridge.pump();
        assert_eq!(supervisor.reports().len(), 1);
    }

    #[test]
    fn consumer_panic_escalates_through_the_scheduler() {
        let affinity = Arc::new(AffinityMap::new());
        let supervisor = RecordingSupervisor::new();
        let sched = Arc::new(TickScheduler::new(
            SchedulerMode::Global,
            affinity,
            supervisor.clone(),
        ));
        let bridge = ReactiveBridge::new(sched.clone(), supervisor.clone());
        let (tx, rx) = mpsc::unbounded::<u32>();

        bridge.attach(DispatchTarget::Global, rx, |_| panic!("bad consumer"));
        tx.unbounded_send(1).unwrap();
        bridge.pump();
        sched.advance();

        let reports = supervisor.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("bad consumer"));
    }
}
