use crate::config::{PoolConfig, WakeupStrategy};
use crate::error::PoolError;
use crate::ownership::OwnershipLedger;
use crate::scheduler::{Scheduler, TaskId};
use crate::wait_queue::{WaitQueue, Waiter};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

/// Best-effort snapshot of a pool's occupancy, taken under the pool lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolInfo {
  /// Tasks currently suspended awaiting a unit.
  pub waiting: usize,
  /// Units currently held across all owners.
  pub owned: usize,
  /// Maximum simultaneously-held units.
  pub limit: usize,
}

/// Owner ledger and waiter queue, mutated together under one lock.
struct PoolState {
  owners: OwnershipLedger,
  waiters: WaitQueue,
}

/// A counting-resource pool for cooperative task schedulers.
///
/// Up to `limit` logical tasks hold a unit at a time; further `acquire`
/// calls suspend (via the [`Scheduler`] collaborator) until a unit is
/// released, and are granted in strict arrival order. The pool may be shared
/// across OS threads: all bookkeeping happens under a single mutex that is
/// never held across a suspension point.
pub struct ResourcePool<S: Scheduler> {
  name: Arc<String>,
  limit: usize,
  wakeup: WakeupStrategy,
  scheduler: S,
  state: Mutex<PoolState>,
}

impl<S: Scheduler> ResourcePool<S> {
  /// Creates a pool from validated configuration.
  ///
  /// # Errors
  ///
  /// Returns [`PoolError::InvalidConfiguration`] if `config.limit()` is zero.
  pub fn new(name: &str, config: PoolConfig, scheduler: S) -> Result<Arc<Self>, PoolError> {
    config.validate()?;
    debug!(
      pool = %name,
      limit = config.limit(),
      mode = ?config.mode(),
      wakeup = ?config.wakeup(),
      "Creating resource pool."
    );
    Ok(Arc::new(Self {
      name: Arc::new(name.to_string()),
      limit: config.limit(),
      wakeup: config.wakeup(),
      scheduler,
      state: Mutex::new(PoolState {
        owners: OwnershipLedger::new(config.mode()),
        waiters: WaitQueue::default(),
      }),
    }))
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn limit(&self) -> usize {
    self.limit
  }

  /// Acquires one unit for `task`, suspending until one becomes available.
  ///
  /// With `timeout` set, a wait that outlasts it is cancelled and the call
  /// returns [`PoolError::AcquireTimeout`] with the pool state fully cleaned
  /// up: no waiter residue, no unit held. Cancellation and a racing grant
  /// are mutually exclusive: whichever is recorded first under the pool lock
  /// wins and the loser's effect is a no-op.
  ///
  /// # Errors
  ///
  /// [`PoolError::AlreadyHeld`] if the ownership policy forbids this task
  /// from re-acquiring; [`PoolError::AcquireTimeout`] as above.
  pub async fn acquire(&self, task: TaskId, timeout: Option<Duration>) -> Result<(), PoolError> {
    let wait = {
      let mut state = self.state.lock();
      if state.owners.reacquire_blocked(task) {
        return Err(PoolError::AlreadyHeld);
      }
      if state.owners.total_held() < self.limit {
        state.owners.add(task);
        trace!(pool = %self.name, %task, "Acquired a unit on the fast path.");
        return Ok(());
      }
      let (wait, handle) = self.scheduler.suspend_point();
      state.waiters.push_back(Waiter { task, handle });
      debug!(
        pool = %self.name,
        %task,
        waiting = state.waiters.len(),
        "Pool saturated; task suspended."
      );
      wait
    };

    // Cleans up the queue entry (or a grant that landed meanwhile) if this
    // future is dropped mid-wait.
    let guard = AbandonGuard {
      pool: self,
      task,
      armed: true,
    };

    let timed_out_after = match timeout {
      None => {
        wait.await;
        None
      }
      Some(after) => {
        let timer = self.scheduler.timer(after);
        tokio::select! {
          _ = wait => None,
          _ = timer => Some(after),
        }
      }
    };

    // Single arbitration point: queue membership under the lock decides the
    // outcome. Entry still present means no grant happened; entry gone means
    // a release already handed this task the unit.
    let still_queued = self.state.lock().waiters.cancel(task);
    guard.disarm();

    // A wait can only conclude unresumed when its timer fired first; a
    // normal wakeup always dequeues before resuming.
    debug_assert!(!still_queued || timed_out_after.is_some());

    match timed_out_after {
      Some(after) if still_queued => {
        debug!(pool = %self.name, %task, ?after, "Wait timed out; waiter cancelled.");
        Err(PoolError::AcquireTimeout(after))
      }
      Some(_) => {
        trace!(pool = %self.name, %task, "Grant won the race against the timeout.");
        Ok(())
      }
      None => {
        trace!(pool = %self.name, %task, "Woken with a granted unit.");
        Ok(())
      }
    }
  }

  /// Scoped acquisition: runs `body` only after a unit is granted, and
  /// releases it on every exit path (normal return, error propagated through
  /// the body's output, or unwind). A call that fails to obtain the unit
  /// never invokes `body`.
  pub async fn acquire_scoped<T, F, Fut>(
    &self,
    task: TaskId,
    timeout: Option<Duration>,
    body: F,
  ) -> Result<T, PoolError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
  {
    self.acquire(task, timeout).await?;
    let _guard = ReleaseGuard { pool: self, task };
    Ok(body().await)
  }

  /// Grants a unit if one is immediately available; never suspends and never
  /// touches the waiter queue.
  ///
  /// # Errors
  ///
  /// [`PoolError::AlreadyHeld`] under the same condition as [`acquire`](Self::acquire).
  pub fn try_acquire(&self, task: TaskId) -> Result<bool, PoolError> {
    let mut state = self.state.lock();
    if state.owners.reacquire_blocked(task) {
      return Err(PoolError::AlreadyHeld);
    }
    if state.owners.total_held() < self.limit {
      state.owners.add(task);
      trace!(pool = %self.name, %task, "Acquired a unit without waiting.");
      Ok(true)
    } else {
      trace!(pool = %self.name, %task, "Pool saturated; probe declined.");
      Ok(false)
    }
  }

  /// Releases one unit held by `task` and wakes the earliest waiter, if any,
  /// per the configured wakeup strategy.
  ///
  /// # Errors
  ///
  /// [`PoolError::NotHeld`] if `task` is not a current owner; `owners` and
  /// `waiters` are left untouched in that case.
  pub fn release(&self, task: TaskId) -> Result<(), PoolError> {
    let waking = {
      let mut state = self.state.lock();
      if !state.owners.remove(task) {
        return Err(PoolError::NotHeld);
      }
      trace!(pool = %self.name, %task, "Released a unit.");
      Self::grant_next_locked(&mut state)
    };
    self.deliver(waking);
    Ok(())
  }

  /// True if `task` currently holds at least one unit.
  pub fn already_acquired(&self, task: TaskId) -> bool {
    self.state.lock().owners.holds(task)
  }

  /// True if a unit is immediately available.
  pub fn can_be_acquired(&self) -> bool {
    self.state.lock().owners.total_held() < self.limit
  }

  /// Units currently held by `task` (0 or 1 in Exclusive mode).
  pub fn held_count(&self, task: TaskId) -> usize {
    self.state.lock().owners.held_by(task)
  }

  /// Occupancy snapshot, computed under the pool lock to avoid torn reads.
  pub fn info(&self) -> PoolInfo {
    let state = self.state.lock();
    PoolInfo {
      waiting: state.waiters.len(),
      owned: state.owners.total_held(),
      limit: self.limit,
    }
  }

  /// Pops the next waiter and records its grant in the same critical
  /// section, so the freed unit can never be stolen by a concurrent probe
  /// between the dequeue and the wakeup.
  fn grant_next_locked(state: &mut PoolState) -> Option<Waiter> {
    let waiter = state.waiters.pop_front()?;
    state.owners.add(waiter.task);
    Some(waiter)
  }

  /// Delivers a wakeup per the configured strategy.
  fn deliver(&self, waiter: Option<Waiter>) {
    let Some(waiter) = waiter else { return };
    match self.wakeup {
      WakeupStrategy::Immediate => {
        if self.scheduler.resume_now(waiter.handle) {
          trace!(pool = %self.name, task = %waiter.task, "Woke next waiter immediately.");
        } else {
          // The waiting side vanished (its timer fired, or the wait was
          // abandoned). The grant stands; that task's own arbitration path
          // settles the unit.
          trace!(
            pool = %self.name,
            task = %waiter.task,
            "Immediate wakeup found no waiting side."
          );
        }
      }
      WakeupStrategy::NextIteration => {
        trace!(
          pool = %self.name,
          task = %waiter.task,
          "Queued wakeup for the next scheduler iteration."
        );
        self.scheduler.resume_next_iteration(waiter.handle);
      }
    }
  }

  /// Settles the state of a wait whose `acquire` future was dropped: retract
  /// the queue entry, or pass a grant that already landed on to the next
  /// waiter.
  fn abandon_wait(&self, task: TaskId) {
    let waking = {
      let mut state = self.state.lock();
      if state.waiters.cancel(task) {
        debug!(pool = %self.name, %task, "Abandoned wait retracted from the queue.");
        None
      } else if state.owners.remove(task) {
        debug!(pool = %self.name, %task, "Abandoned wait had been granted; unit passed on.");
        Self::grant_next_locked(&mut state)
      } else {
        None
      }
    };
    self.deliver(waking);
  }
}

/// Retracts a pending wait when the `acquire` future is dropped before its
/// arbitration ran.
struct AbandonGuard<'a, S: Scheduler> {
  pool: &'a ResourcePool<S>,
  task: TaskId,
  armed: bool,
}

impl<S: Scheduler> AbandonGuard<'_, S> {
  fn disarm(mut self) {
    self.armed = false;
  }
}

impl<S: Scheduler> Drop for AbandonGuard<'_, S> {
  fn drop(&mut self) {
    if self.armed {
      self.pool.abandon_wait(self.task);
    }
  }
}

/// Releases the unit held for a scoped acquisition when the scope exits.
struct ReleaseGuard<'a, S: Scheduler> {
  pool: &'a ResourcePool<S>,
  task: TaskId,
}

impl<S: Scheduler> Drop for ReleaseGuard<'_, S> {
  fn drop(&mut self) {
    if self.pool.release(self.task).is_err() {
      warn!(
        pool = %self.pool.name,
        task = %self.task,
        "Scoped release found no held unit."
      );
    }
  }
}
