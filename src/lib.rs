//! A counting-resource pool for cooperative task schedulers, with pluggable
//! ownership accounting, FIFO waiting, timeout-bound suspension and
//! configurable wakeup delivery.

mod config;
mod error;
mod ownership;
mod pool;
mod scheduler;
mod wait_queue;

pub use config::{PoolConfig, WakeupStrategy};
pub use error::PoolError;
pub use ownership::OwnershipMode;
pub use pool::{PoolInfo, ResourcePool};
pub use scheduler::{ResumeHandle, Scheduler, SuspendWait, TaskId, TokioScheduler};
