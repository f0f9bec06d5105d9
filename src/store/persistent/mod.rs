//! Persistent storage using RocksDB.
//!
//! Versions, tags, publish slots, id counters and the publish log each live
//! in their own column family. A committed [`Transaction`] is written as a
//! single `WriteBatch`.
//!
//! This module is only available when the `rocksdb-storage` feature is enabled.
//!
//! [`Transaction`]: crate::store::Transaction

#[cfg(feature = "rocksdb-storage")]
pub mod rocks;

#[cfg(feature = "rocksdb-storage")]
pub use rocks::RocksBackend;

#[cfg(feature = "rocksdb-storage")]
use rocksdb::{Options, DB};
#[cfg(feature = "rocksdb-storage")]
use std::path::Path;
#[cfg(feature = "rocksdb-storage")]
use std::sync::Arc;

#[cfg(feature = "rocksdb-storage")]
use crate::error::{VersoError, VersoResult};

/// Column family names
#[cfg(feature = "rocksdb-storage")]
pub const CF_VERSIONS: &str = "versions";
#[cfg(feature = "rocksdb-storage")]
pub const CF_TAGS: &str = "tags";
#[cfg(feature = "rocksdb-storage")]
pub const CF_PUBLISH_STATE: &str = "publish_state";
#[cfg(feature = "rocksdb-storage")]
pub const CF_PUBLISH_HISTORY: &str = "publish_history";
#[cfg(feature = "rocksdb-storage")]
pub const CF_COUNTERS: &str = "counters";

/// Opens a RocksDB instance with all required column families.
#[cfg(feature = "rocksdb-storage")]
pub fn open_db<P: AsRef<Path>>(path: P) -> VersoResult<Arc<DB>> {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);

    let column_families = vec![
        CF_VERSIONS,
        CF_TAGS,
        CF_PUBLISH_STATE,
        CF_PUBLISH_HISTORY,
        CF_COUNTERS,
    ];

    let db = DB::open_cf(&opts, path, &column_families)
        .map_err(|e| VersoError::Storage(format!("Failed to open RocksDB: {}", e)))?;

    Ok(Arc::new(db))
}
