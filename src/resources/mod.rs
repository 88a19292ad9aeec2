//! GPU slot arbitration for streaming and batch inference workloads.

mod manager;
mod pool;

pub use manager::{ActiveRequestIds, ResourceManager, ResourceStatus};
pub use pool::PoolStatus;
