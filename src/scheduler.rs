use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::runtime::Handle as TokioHandle;
use tokio::sync::oneshot;
use tracing::trace;

lazy_static::lazy_static! {
  static ref NEXT_TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// Opaque identity of a logical task managed by a cooperative scheduler.
///
/// The pool never infers identity from ambient context; callers obtain a
/// `TaskId` from their scheduler (or mint one with [`TaskId::fresh`]) and
/// pass it explicitly into every pool operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
  /// Mints a process-unique task id.
  pub fn fresh() -> Self {
    TaskId(NEXT_TASK_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed))
  }
}

impl fmt::Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "task-{}", self.0)
  }
}

/// The waiting half of a suspend point. Awaited by the task that suspends;
/// completes once the paired [`ResumeHandle`] delivers a wakeup.
///
/// Completion alone does not mean a unit was granted: the pool arbitrates
/// the outcome against its waiter queue after the wait concludes, so a
/// `SuspendWait` whose handle was dropped simply completes and lets that
/// arbitration decide.
#[derive(Debug)]
pub struct SuspendWait {
  rx: oneshot::Receiver<()>,
}

impl Future for SuspendWait {
  type Output = ();

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
    match Pin::new(&mut self.rx).poll(cx) {
      Poll::Ready(_) => Poll::Ready(()),
      Poll::Pending => Poll::Pending,
    }
  }
}

/// The resuming half of a suspend point, stored by the pool while the task
/// waits in the queue.
#[derive(Debug)]
pub struct ResumeHandle {
  tx: oneshot::Sender<()>,
}

impl ResumeHandle {
  /// Delivers the wakeup. Returns `false` if the waiting side is gone.
  pub fn resume(self) -> bool {
    self.tx.send(()).is_ok()
  }
}

pub(crate) fn suspend_pair() -> (SuspendWait, ResumeHandle) {
  let (tx, rx) = oneshot::channel();
  (SuspendWait { rx }, ResumeHandle { tx })
}

/// The external scheduler collaborator consumed by the pool.
///
/// The pool stores resumption handles and calls back through this trait
/// rather than manipulating scheduler internals directly.
pub trait Scheduler: Send + Sync + 'static {
  /// Mints a one-shot suspend point: the future the suspending task awaits
  /// and the handle used to resume it.
  fn suspend_point(&self) -> (SuspendWait, ResumeHandle);

  /// Resumes a suspended task before returning. Reports whether the waiting
  /// side was still there to receive the wakeup.
  fn resume_now(&self, handle: ResumeHandle) -> bool;

  /// Queues the wakeup for the scheduler's next iteration and returns
  /// immediately.
  fn resume_next_iteration(&self, handle: ResumeHandle);

  /// A timer completing after `after`, used to bound waits.
  fn timer(&self, after: Duration) -> BoxFuture<'static, ()>;
}

/// [`Scheduler`] implementation backed by a Tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
  handle: TokioHandle,
}

impl TokioScheduler {
  pub fn new(handle: TokioHandle) -> Self {
    Self { handle }
  }

  /// Binds to the runtime of the calling context.
  ///
  /// # Panics
  ///
  /// Panics if called outside a Tokio runtime.
  pub fn current() -> Self {
    Self::new(TokioHandle::current())
  }
}

impl Scheduler for TokioScheduler {
  fn suspend_point(&self) -> (SuspendWait, ResumeHandle) {
    suspend_pair()
  }

  fn resume_now(&self, handle: ResumeHandle) -> bool {
    handle.resume()
  }

  fn resume_next_iteration(&self, handle: ResumeHandle) {
    self.handle.spawn(async move {
      tokio::task::yield_now().await;
      if !handle.resume() {
        trace!("Deferred wakeup found no waiting side.");
      }
    });
  }

  fn timer(&self, after: Duration) -> BoxFuture<'static, ()> {
    Box::pin(tokio::time::sleep(after))
  }
}
