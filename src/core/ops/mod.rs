//! core::ops
//!
//! Cross-process coordination primitives.
//!
//! # Modules
//!
//! - [`lock`] - Advisory per-dataset lock on shared storage
//!
//! # Architecture
//!
//! Only the import workflow mutates dataset content exclusively, so it is
//! the only caller that takes a dataset lock:
//! 1. Check for a fresh lock held by someone else and fail fast
//! 2. Acquire (reclaiming a stale lock at most once)
//! 3. Mutate and publish
//! 4. Release on every exit path via the guard's `Drop`

pub mod lock;

pub use lock::{format_age, DatasetLock, LockError, LockInfo, LockManager, DEFAULT_TTL_HOURS};
