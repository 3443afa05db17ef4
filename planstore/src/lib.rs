//! PlanStore - versioned record persistence
//!
//! Stores serializable records as JSON documents on disk, one file per
//! record, grouped by collection. Writes are optimistic-concurrency
//! checked: a write only succeeds if it carries a strictly newer version
//! than the stored copy, so two writers racing on the same record cannot
//! silently overwrite each other.
//!
//! # Core Concepts
//!
//! - **Record**: anything serializable with an id, a version, and a
//!   collection name
//! - **Versioned writes**: `put` fails with `VersionConflict` instead of
//!   clobbering newer state
//! - **Archival**: closed records move to an archive area instead of being
//!   deleted

pub mod store;

pub use store::{Record, Store, StoreError};

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
