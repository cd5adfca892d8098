//! Bounded activity ledger.
//!
//! Append-only audit trail of user actions.  After every append the ledger
//! trims itself back to the retention bound, oldest entries first.  The
//! append-then-trim pair is not atomic across concurrent appends; the ledger
//! is advisory and may transiently over- or undershoot the bound.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::storage::{ActivityRow, Storage};

pub struct ActivityLedger {
    storage: Arc<Storage>,
    retention: i64,
}

impl ActivityLedger {
    pub fn new(storage: Arc<Storage>, retention: i64) -> Self {
        Self { storage, retention }
    }

    pub fn retention(&self) -> i64 {
        self.retention
    }

    /// Append an immutable entry stamped with the current time, then enforce
    /// the retention bound in the same logical operation.
    pub async fn append(&self, username: &str, action: &str) -> Result<ActivityRow> {
        let entry = self.storage.append_activity(username, action).await?;

        let count = self.storage.count_activity().await?;
        if count > self.retention {
            match self.storage.trim_activity(self.retention).await {
                Ok(removed) => debug!(removed, "activity ledger trimmed"),
                // Entry is durable; a failed trim only delays retention.
                Err(e) => warn!(err = %e, "activity ledger trim failed"),
            }
        }
        Ok(entry)
    }

    /// The most recent entries, newest first.
    pub async fn list(&self, limit: Option<i64>) -> Result<Vec<ActivityRow>> {
        self.storage
            .list_activity(limit.unwrap_or(self.retention))
            .await
    }
}
