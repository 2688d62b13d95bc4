use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, trace};

use crate::host::context::{
    AffinityResolver, DispatchTarget, ExecutionContext, SchedulerMode,
};
use crate::host::error::{DispatchError, Supervisor};
use crate::host::task::{
    Cancellable, GlobalTaskHandle, RegionTaskHandle, TaskCell, TaskHandle,
};

/// Type-erased task body. One-shot bodies are wrapped so they can live in
/// the same queue as periodic ones.
type Job = Box<dyn FnMut() + Send>;

struct QueuedTask {
    seq: u64,
    cell: Arc<TaskCell>,
    target: DispatchTarget,
    job: Job,
    /// `Some` for periodic tasks; rearmed after each run until cancelled.
    period: Option<u64>,
}

struct SchedulerInner {
    /// Current logical tick.
    now: u64,
    /// Due tick -> tasks, FIFO within a tick by submission sequence.
    queue: BTreeMap<u64, Vec<QueuedTask>>,
}

/// Issues immediate, delayed, and periodic work against an execution
/// context, backed by one of two interchangeable strategies chosen once at
/// startup.
///
/// All calls return immediately; the effect happens later, on the target
/// context, when the host drives [`TickScheduler::advance`]. Affinity is
/// resolved at execution time, never at submission: work aimed at an entity
/// that has since disconnected is dropped silently (its handle reads
/// `Cancelled`) and the failure never reaches the submitting caller.
pub struct TickScheduler {
    mode: SchedulerMode,
    affinity: Arc<dyn AffinityResolver>,
    supervisor: Arc<dyn Supervisor>,
    inner: Mutex<SchedulerInner>,
    seq: AtomicU64,
    shutdown: AtomicBool,
}

impl TickScheduler {
    pub fn new(
        mode: SchedulerMode,
        affinity: Arc<dyn AffinityResolver>,
        supervisor: Arc<dyn Supervisor>,
    ) -> Self {
        Self {
            mode,
            affinity,
            supervisor,
            inner: Mutex::new(SchedulerInner {
                now: 0,
                queue: BTreeMap::new(),
            }),
            seq: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> SchedulerMode {
        self.mode
    }

    /// Current logical tick.
    pub fn now(&self) -> u64 {
        self.inner.lock().unwrap().now
    }

    /// Execute as soon as the owning context is next available.
    pub fn run_now(
        &self,
        target: DispatchTarget,
        job: impl FnOnce() + Send + 'static,
    ) -> TaskHandle {
        self.run_after(target, 0, job)
    }

    /// Schedule one execution after a discrete tick delay.
    ///
    /// The global backend accepts a zero delay (the task runs within the
    /// same scheduling pass when submitted from inside one); the region
    /// backend clamps any delay below one tick up to one, because the
    /// region model forbids zero-delay cross-context scheduling.
    pub fn run_after(
        &self,
        target: DispatchTarget,
        delay_ticks: u64,
        job: impl FnOnce() + Send + 'static,
    ) -> TaskHandle {
        let mut job = Some(job);
        self.submit(
            target,
            delay_ticks,
            None,
            Box::new(move || {
                if let Some(f) = job.take() {
                    f()
                }
            }),
        )
    }

    /// Repeat until cancelled. A zero period is clamped to one tick.
    pub fn run_periodic(
        &self,
        target: DispatchTarget,
        delay_ticks: u64,
        period_ticks: u64,
        job: impl FnMut() + Send + 'static,
    ) -> TaskHandle {
        self.submit(target, delay_ticks, Some(period_ticks.max(1)), Box::new(job))
    }

    /// Idempotent; returns normally whether or not the task had already
    /// completed or was already cancelled.
    pub fn cancel(&self, handle: &TaskHandle) {
        handle.cancel();
    }

    /// Stop accepting work and cancel everything still queued. Submissions
    /// after shutdown are dropped with their handles reading `Cancelled`.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        for (_, tasks) in std::mem::take(&mut inner.queue) {
            for task in tasks {
                task.cell.cancel();
            }
        }
        debug!("tick scheduler shut down at tick {}", inner.now);
    }

    /// One scheduling pass: move the logical clock forward one tick and run
    /// everything due, in (due tick, submission order). Zero-delay work
    /// submitted by a running task joins the same pass in global mode.
    pub fn advance(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.now += 1;
        let now = inner.now;
        loop {
            let batch = drain_due(&mut inner.queue, now);
            if batch.is_empty() {
                break;
            }
            // The lock is released while bodies run so they can submit and
            // cancel freely.
            drop(inner);
            for task in batch {
                self.execute(task);
            }
            inner = self.inner.lock().unwrap();
        }
    }

    fn submit(
        &self,
        target: DispatchTarget,
        delay_ticks: u64,
        period: Option<u64>,
        job: Job,
    ) -> TaskHandle {
        let cell = TaskCell::new();
        let handle = self.wrap(cell.clone());

        if self.shutdown.load(Ordering::Acquire) {
            debug!(
                "dropping submission for {:?}: {}",
                target,
                DispatchError::SchedulingUnavailable
            );
            cell.cancel();
            return handle;
        }

        let delay = self.effective_delay(delay_ticks);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock().unwrap();
        let due = inner.now + delay;
        inner.queue.entry(due).or_default().push(QueuedTask {
            seq,
            cell,
            target,
            job,
            period,
        });
        handle
    }

    fn wrap(&self, cell: Arc<TaskCell>) -> TaskHandle {
        match self.mode {
            SchedulerMode::Global => TaskHandle::Global(GlobalTaskHandle { cell }),
            SchedulerMode::RegionAffine => TaskHandle::Region(RegionTaskHandle { cell }),
        }
    }

    fn effective_delay(&self, delay_ticks: u64) -> u64 {
        match self.mode {
            SchedulerMode::Global => delay_ticks,
            SchedulerMode::RegionAffine => delay_ticks.max(1),
        }
    }

    /// Derive the owning context for a target, right now. Called once per
    /// execution, so ownership changes between submission and execution are
    /// always honored.
    fn resolve(&self, target: DispatchTarget) -> Result<ExecutionContext, DispatchError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(DispatchError::SchedulingUnavailable);
        }
        match (self.mode, target) {
            (_, DispatchTarget::Global) => Ok(ExecutionContext::Global),
            (SchedulerMode::RegionAffine, DispatchTarget::Entity(entity)) => self
                .affinity
                .resolve(entity)
                .map(ExecutionContext::Region)
                .ok_or(DispatchError::InvalidAffinityTarget),
            // Classic mode still checks liveness so that dispatch to a gone
            // entity is a no-op under either backend.
            (SchedulerMode::Global, DispatchTarget::Entity(entity)) => {
                if self.affinity.resolve(entity).is_some() {
                    Ok(ExecutionContext::Global)
                } else {
                    Err(DispatchError::InvalidAffinityTarget)
                }
            }
        }
    }

    fn execute(&self, mut task: QueuedTask) {
        let context = match self.resolve(task.target) {
            Ok(context) => context,
            Err(err) => {
                debug!("dropping task {} for {:?}: {}", task.seq, task.target, err);
                task.cell.cancel();
                return;
            }
        };

        if !task.cell.begin() {
            // Cancelled while queued; the body never runs.
            return;
        }

        trace!("running task {} on {:?}", task.seq, context);
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| (task.job)())) {
            self.supervisor.report_panic("scheduled task body", payload);
            // A panicking periodic task is not rearmed.
            task.cell.cancel();
            return;
        }

        match task.period {
            Some(period) if task.cell.rearm() => {
                let mut inner = self.inner.lock().unwrap();
                let due = inner.now + period;
                inner.queue.entry(due).or_default().push(task);
            }
            _ => task.cell.complete(),
        }
    }
}

fn drain_due(queue: &mut BTreeMap<u64, Vec<QueuedTask>>, now: u64) -> Vec<QueuedTask> {
    let due_ticks: Vec<u64> = queue.range(..=now).map(|(tick, _)| *tick).collect();
    let mut batch = Vec::new();
    for tick in due_ticks {
        if let Some(mut tasks) = queue.remove(&tick) {
            tasks.sort_by_key(|task| task.seq);
            batch.extend(tasks);
        }
    }
    batch
}
