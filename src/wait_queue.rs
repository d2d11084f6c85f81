use crate::scheduler::{ResumeHandle, TaskId};

use std::collections::VecDeque;

/// A suspended task awaiting a unit, paired with the resumption handle the
/// scheduler minted when it suspended.
#[derive(Debug)]
pub(crate) struct Waiter {
  pub(crate) task: TaskId,
  pub(crate) handle: ResumeHandle,
}

/// FIFO queue of suspended tasks.
///
/// Every call happens under the pool lock, so `cancel` against a racing
/// `pop_front` is a single-winner decision: whichever runs first sees the
/// entry, the loser finds it gone.
#[derive(Debug, Default)]
pub(crate) struct WaitQueue {
  entries: VecDeque<Waiter>,
}

impl WaitQueue {
  /// Appends a waiter in arrival order.
  pub(crate) fn push_back(&mut self, waiter: Waiter) {
    debug_assert!(
      !self.contains(waiter.task),
      "duplicate waiter {} enqueued",
      waiter.task
    );
    self.entries.push_back(waiter);
  }

  /// Pops the earliest waiter, if any.
  pub(crate) fn pop_front(&mut self) -> Option<Waiter> {
    self.entries.pop_front()
  }

  /// Removes the entry for `task` out of arrival order (timeout and abandon
  /// paths). Returns whether it was present; repeated calls are no-ops.
  pub(crate) fn cancel(&mut self, task: TaskId) -> bool {
    match self.entries.iter().position(|w| w.task == task) {
      Some(idx) => {
        self.entries.remove(idx);
        true
      }
      None => false,
    }
  }

  pub(crate) fn contains(&self, task: TaskId) -> bool {
    self.entries.iter().any(|w| w.task == task)
  }

  pub(crate) fn len(&self) -> usize {
    self.entries.len()
  }
}
