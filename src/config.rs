use crate::error::PoolError;
use crate::ownership::OwnershipMode;

use std::str::FromStr;

/// Policy for when a woken waiter actually resumes execution relative to the
/// releasing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WakeupStrategy {
  /// The releasing call delivers the wakeup synchronously, before `release`
  /// returns control to its own caller.
  #[default]
  Immediate,
  /// The wakeup is queued for the scheduler's next iteration; `release`
  /// returns without the woken task having run.
  NextIteration,
}

impl FromStr for WakeupStrategy {
  type Err = PoolError;

  /// Parses a strategy name from external configuration. Accepts
  /// `"immediate"` and `"next-iteration"` (case-insensitive, `_` allowed).
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().replace('_', "-").as_str() {
      "immediate" => Ok(WakeupStrategy::Immediate),
      "next-iteration" => Ok(WakeupStrategy::NextIteration),
      other => Err(PoolError::InvalidConfiguration(format!(
        "unrecognized wakeup strategy {other:?}, expected \"immediate\" or \"next-iteration\""
      ))),
    }
  }
}

/// Construction-time settings for a [`ResourcePool`](crate::ResourcePool).
///
/// `limit` is the maximum number of simultaneously-held units and must be
/// greater than zero. Ownership mode defaults to [`OwnershipMode::Exclusive`]
/// and wakeup delivery to [`WakeupStrategy::Immediate`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
  limit: usize,
  mode: OwnershipMode,
  wakeup: WakeupStrategy,
}

impl PoolConfig {
  pub fn new(limit: usize) -> Self {
    Self {
      limit,
      mode: OwnershipMode::default(),
      wakeup: WakeupStrategy::default(),
    }
  }

  /// Selects how many units a single task may hold concurrently.
  pub fn ownership_mode(mut self, mode: OwnershipMode) -> Self {
    self.mode = mode;
    self
  }

  /// Selects how wakeups are delivered to woken waiters.
  pub fn wakeup_strategy(mut self, wakeup: WakeupStrategy) -> Self {
    self.wakeup = wakeup;
    self
  }

  pub fn limit(&self) -> usize {
    self.limit
  }

  pub fn mode(&self) -> OwnershipMode {
    self.mode
  }

  pub fn wakeup(&self) -> WakeupStrategy {
    self.wakeup
  }

  /// Rejects configurations the pool cannot honor.
  pub fn validate(&self) -> Result<(), PoolError> {
    if self.limit == 0 {
      return Err(PoolError::InvalidConfiguration(
        "limit must be greater than 0".to_string(),
      ));
    }
    Ok(())
  }
}
