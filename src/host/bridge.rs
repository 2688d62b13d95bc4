use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::stream::{Stream, StreamExt};
use log::{debug, trace};

use crate::host::context::DispatchTarget;
use crate::host::error::Supervisor;
use crate::host::scheduler::TickScheduler;
use crate::host::task::Cancellable;

type BoxedItem = Box<dyn Any + Send>;
type Consumer = Arc<dyn Fn(BoxedItem) + Send + Sync>;

/// Most emissions a single stage may re-dispatch per pump. Keeps one
/// always-ready producer from monopolizing the pump and flooding the
/// scheduler queue.
const EMISSION_BUDGET: usize = 16;

/// A cancellable unit of reactive work attached to the bridge.
///
/// Cancelling detaches the stage on the next pump and prevents any already
/// re-dispatched emission from reaching its consumer. Idempotent.
#[derive(Clone)]
pub struct StreamSubscription {
    live: Arc<AtomicBool>,
}

impl StreamSubscription {
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

impl Cancellable for StreamSubscription {
    fn cancel(&self) {
        self.live.store(false, Ordering::Release);
    }
}

struct BridgedStage {
    stream: Pin<Box<dyn Stream<Item = BoxedItem> + Send>>,
    target: DispatchTarget,
    consumer: Consumer,
    live: Arc<AtomicBool>,
}

/// Adapts cooperative reactive-stream stages onto the tick scheduler.
///
/// Producer stages are polled on whatever worker drives [`ReactiveBridge::pump`];
/// every emission is re-dispatched through `run_now(target)` so the consumer
/// only ever runs on the context owning the target. A target that is gone at
/// dispatch time means the emission is skipped; the stream itself survives
/// and is never torn down by a transient dispatch failure. Panics in
/// producer polls or consumer bodies go to the supervisor instead.
pub struct ReactiveBridge {
    scheduler: Arc<TickScheduler>,
    supervisor: Arc<dyn Supervisor>,
    stages: Mutex<Vec<BridgedStage>>,
}

impl ReactiveBridge {
    pub fn new(scheduler: Arc<TickScheduler>, supervisor: Arc<dyn Supervisor>) -> Self {
        Self {
            scheduler,
            supervisor,
            stages: Mutex::new(Vec::new()),
        }
    }

    /// Attach a stream stage. Each item is handed to `consumer` on the
    /// context that owns `target` at the moment the item is dispatched.
    pub fn attach<S, T, F>(
        &self,
        target: DispatchTarget,
        stream: S,
        consumer: F,
    ) -> StreamSubscription
    where
        S: Stream<Item = T> + Send + 'static,
        T: Send + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let live = Arc::new(AtomicBool::new(true));
        let consumer: Consumer = Arc::new(move |item: BoxedItem| {
            if let Ok(item) = item.downcast::<T>() {
                consumer(*item)
            }
        });
        let stage = BridgedStage {
            stream: stream.map(|item| Box::new(item) as BoxedItem).boxed(),
            target,
            consumer,
            live: live.clone(),
        };
        self.stages.lock().unwrap().push(stage);
        trace!("bridge stage attached for {:?}", target);
        StreamSubscription { live }
    }

    /// Poll every attached producer, re-dispatching ready emissions up to a
    /// fixed budget per stage.
    ///
    /// Uses a noop waker: stages are polled cooperatively each host tick
    /// rather than woken, so a `Pending` stage simply waits for the next
    /// pump, and a stage that exhausts its budget resumes there too.
    pub fn pump(&self) {
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut stages = self.stages.lock().unwrap();
        let mut i = 0;
        while i < stages.len() {
            if !stages[i].live.load(Ordering::Acquire) {
                stages.swap_remove(i);
                continue;
            }
            match self.drain_stage(&mut stages[i], &mut cx) {
                StageOutcome::Active => i += 1,
                StageOutcome::Finished => {
                    debug!("bridge stage for {:?} finished", stages[i].target);
                    stages.swap_remove(i);
                }
            }
        }
    }

    fn drain_stage(&self, stage: &mut BridgedStage, cx: &mut Context<'_>) -> StageOutcome {
        let mut drained = 0;
        loop {
            let polled = catch_unwind(AssertUnwindSafe(|| stage.stream.as_mut().poll_next(cx)));
            match polled {
                Ok(Poll::Ready(Some(item))) => {
                    let consumer = stage.consumer.clone();
                    let live = stage.live.clone();
                    // Dispatch failures (target gone, scheduler shut down)
                    // are absorbed inside run_now; the emission is skipped
                    // and the stage stays attached.
                    let _ = self.scheduler.run_now(stage.target, move || {
                        if live.load(Ordering::Acquire) {
                            consumer(item)
                        }
                    });
                    drained += 1;
                    if drained == EMISSION_BUDGET {
                        // An always-ready producer yields here; the next
                        // pump continues where this one left off.
                        return StageOutcome::Active;
                    }
                }
                Ok(Poll::Ready(None)) => return StageOutcome::Finished,
                Ok(Poll::Pending) => return StageOutcome::Active,
                Err(payload) => {
                    self.supervisor.report_panic("bridge producer stage", payload);
                    stage.live.store(false, Ordering::Release);
                    return StageOutcome::Finished;
                }
            }
        }
    }
}

enum StageOutcome {
    Active,
    Finished,
}
