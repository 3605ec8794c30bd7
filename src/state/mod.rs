//! State management.
//!
//! This module provides persistent storage of the attribute trees the
//! provider returned for each managed resource, plus a lock file that keeps
//! two commands from writing the same state.

mod local;
mod lock;
mod store;
mod types;

pub use local::{DEFAULT_STATE_DIR, LocalStateStore};
pub use lock::{LOCK_EXPIRY_SECS, LOCK_REFRESH_INTERVAL_SECS, LockInfo, generate_holder_id};
pub use store::StateStore;
pub use types::{ResourceState, STATE_VERSION, StateDocument};
