use crate::scheduler::TaskId;

use std::collections::{HashMap, HashSet};

/// Rule set governing whether, and how many, units a single task may hold
/// concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnershipMode {
  /// A task may hold at most one unit; re-acquiring while held is an error.
  #[default]
  Exclusive,
  /// A task may accumulate multiple units; each release peels one off and
  /// the task stays an owner until its count reaches zero.
  Counting,
}

/// Per-task accounting of held units, selected at construction.
///
/// Callers must hold the pool lock for every call.
#[derive(Debug)]
pub(crate) enum OwnershipLedger {
  Exclusive(HashSet<TaskId>),
  Counting(HashMap<TaskId, usize>),
}

impl OwnershipLedger {
  pub(crate) fn new(mode: OwnershipMode) -> Self {
    match mode {
      OwnershipMode::Exclusive => OwnershipLedger::Exclusive(HashSet::new()),
      OwnershipMode::Counting => OwnershipLedger::Counting(HashMap::new()),
    }
  }

  pub(crate) fn holds(&self, task: TaskId) -> bool {
    self.held_by(task) > 0
  }

  /// Units currently held by `task`.
  pub(crate) fn held_by(&self, task: TaskId) -> usize {
    match self {
      OwnershipLedger::Exclusive(owners) => usize::from(owners.contains(&task)),
      OwnershipLedger::Counting(owners) => owners.get(&task).copied().unwrap_or(0),
    }
  }

  /// Total units held across all owners.
  pub(crate) fn total_held(&self) -> usize {
    match self {
      OwnershipLedger::Exclusive(owners) => owners.len(),
      OwnershipLedger::Counting(owners) => owners.values().sum(),
    }
  }

  /// True when the mode forbids `task` from requesting another unit.
  pub(crate) fn reacquire_blocked(&self, task: TaskId) -> bool {
    matches!(self, OwnershipLedger::Exclusive(_)) && self.holds(task)
  }

  /// Records one more unit held by `task`.
  pub(crate) fn add(&mut self, task: TaskId) {
    match self {
      OwnershipLedger::Exclusive(owners) => {
        let inserted = owners.insert(task);
        debug_assert!(inserted, "exclusive owner {task} recorded twice");
      }
      OwnershipLedger::Counting(owners) => {
        *owners.entry(task).or_insert(0) += 1;
      }
    }
  }

  /// Removes one unit held by `task`, dropping the entry at zero.
  /// Returns `false` if the task held nothing.
  pub(crate) fn remove(&mut self, task: TaskId) -> bool {
    match self {
      OwnershipLedger::Exclusive(owners) => owners.remove(&task),
      OwnershipLedger::Counting(owners) => match owners.get_mut(&task) {
        Some(count) => {
          *count -= 1;
          if *count == 0 {
            owners.remove(&task);
          }
          true
        }
        None => false,
      },
    }
  }
}
