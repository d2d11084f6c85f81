use std::time::Duration;

use thiserror::Error;

/// Errors that can occur within a `coop_pool` resource pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
  #[error("current task already owns this resource")]
  AlreadyHeld,

  #[error("current task does not own this resource")]
  NotHeld,

  #[error("timeout of {0:?} elapsed before a unit became available")]
  AcquireTimeout(Duration),

  #[error("invalid pool configuration: {0}")]
  InvalidConfiguration(String),
}
