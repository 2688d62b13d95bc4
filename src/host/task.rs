use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Observable state of a scheduled task.
///
/// Transitions are monotonic forward only; `Cancelled` and `Completed` are
/// terminal. A body already running when cancellation arrives is allowed to
/// finish, but the task is then observed `Cancelled`, not `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Cancelled,
    Completed,
}

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const CANCELLED: u8 = 2;
const COMPLETED: u8 = 3;

/// Shared cell between a queue entry and the handles pointing at it.
#[derive(Debug)]
pub(crate) struct TaskCell {
    state: AtomicU8,
}

impl TaskCell {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(PENDING),
        })
    }

    pub(crate) fn state(&self) -> TaskState {
        match self.state.load(Ordering::Acquire) {
            PENDING => TaskState::Pending,
            RUNNING => TaskState::Running,
            CANCELLED => TaskState::Cancelled,
            _ => TaskState::Completed,
        }
    }

    /// Pending -> Running. Returns false when the task was cancelled while
    /// queued; the body must not run in that case.
    pub(crate) fn begin(&self) -> bool {
        self.state
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Running -> Completed. Loses against a cancel that arrived mid-run.
    pub(crate) fn complete(&self) {
        let _ = self
            .state
            .compare_exchange(RUNNING, COMPLETED, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Running -> Pending, for periodic tasks going back onto the queue.
    /// Returns false when a cancel arrived mid-run; the task is not rearmed.
    pub(crate) fn rearm(&self) -> bool {
        self.state
            .compare_exchange(RUNNING, PENDING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Idempotent. Terminal states win: cancelling a completed or already
    /// cancelled task changes nothing.
    pub(crate) fn cancel(&self) {
        loop {
            match self.state.load(Ordering::Acquire) {
                CANCELLED | COMPLETED => return,
                current => {
                    if self
                        .state
                        .compare_exchange(current, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return;
                    }
                }
            }
        }
    }
}

/// Handle onto a task queued with the single-threaded global backend.
#[derive(Debug, Clone)]
pub struct GlobalTaskHandle {
    pub(crate) cell: Arc<TaskCell>,
}

/// Handle onto a task queued with the region-affine backend.
#[derive(Debug, Clone)]
pub struct RegionTaskHandle {
    pub(crate) cell: Arc<TaskCell>,
}

/// Cancellable reference abstracting the native scheduling primitive of
/// whichever backend is active. Exhaustively matched everywhere; callers
/// never branch on the active backend themselves.
#[derive(Debug, Clone)]
pub enum TaskHandle {
    Global(GlobalTaskHandle),
    Region(RegionTaskHandle),
}

impl TaskHandle {
    pub fn state(&self) -> TaskState {
        self.cell().state()
    }

    pub(crate) fn cell(&self) -> &Arc<TaskCell> {
        match self {
            TaskHandle::Global(h) => &h.cell,
            TaskHandle::Region(h) => &h.cell,
        }
    }
}

/// A unit of work that a lifecycle scope can cancel.
///
/// Cancellation never blocks and never fails; cancelling twice is a no-op.
pub trait Cancellable: Send {
    fn cancel(&self);
}

impl Cancellable for TaskHandle {
    fn cancel(&self) {
        self.cell().cancel();
    }
}
