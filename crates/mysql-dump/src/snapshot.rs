//! Consistency boundary for a dump.
//!
//! A [`Snapshot`] wraps the reader returned by [`DumpSource::begin`]. All
//! table extraction for one dump happens through it, between
//! [`Snapshot::begin`] and [`Snapshot::release`]. Release always rolls back:
//! a dump never commits.
//!
//! If a snapshot is dropped without being released (an early return or a
//! panic unwinding through the dump), the driver's reader is dropped with it
//! and the driver ends the transaction on its own.

use tracing::{debug, warn};

use crate::core::traits::{DumpSource, SnapshotReader};
use crate::error::{DumpError, Result};

/// An open, read-only transaction shared by every table of one dump.
pub struct Snapshot<'a> {
    reader: Box<dyn SnapshotReader + 'a>,
    released: bool,
}

impl<'a> Snapshot<'a> {
    /// Open the consistency boundary on `source`.
    ///
    /// Nothing has been read when this fails, and the error is returned as is.
    pub async fn begin<S>(source: &'a mut S) -> Result<Snapshot<'a>>
    where
        S: DumpSource + ?Sized,
    {
        let db_type = source.db_type().to_string();
        let reader = source.begin().await?;
        debug!("Opened {} snapshot", db_type);
        Ok(Self {
            reader,
            released: false,
        })
    }

    /// The reader all extraction must go through.
    pub fn reader(&mut self) -> &mut (dyn SnapshotReader + 'a) {
        self.reader.as_mut()
    }

    /// End the snapshot with a rollback.
    ///
    /// Returns the rollback error, if any, after logging it. Callers treat it
    /// as a cleanup problem: output already written stays valid.
    pub async fn release(mut self) -> Option<DumpError> {
        self.released = true;
        match self.reader.rollback().await {
            Ok(()) => {
                debug!("Snapshot rolled back");
                None
            }
            Err(e) => {
                warn!("Failed to roll back dump snapshot: {}", e);
                Some(e)
            }
        }
    }
}

impl Drop for Snapshot<'_> {
    fn drop(&mut self) {
        if !self.released {
            warn!("Snapshot dropped without release; the driver will roll it back");
        }
    }
}
