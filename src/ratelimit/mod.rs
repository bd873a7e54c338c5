//! Per-client rate limiting state and eviction.

mod bucket;
mod identity;
mod registry;
mod sweeper;

pub use bucket::{Quota, TokenBucket};
pub use identity::ClientIdentity;
pub use registry::{ClientRegistry, SharedBucket};
pub use sweeper::{Sweeper, DEFAULT_IDLE_THRESHOLD, DEFAULT_SWEEP_INTERVAL};
