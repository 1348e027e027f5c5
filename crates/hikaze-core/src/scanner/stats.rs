//! Scan counters and the status snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Running totals for the current (or last) scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Files found by the walk.
    pub total: u64,
    pub processed: u64,
    pub added: u64,
    pub updated: u64,
    /// Files that vanished or stopped being regular files before processing.
    pub skipped: u64,
    pub errors: u64,
    pub by_type: BTreeMap<String, u64>,
}

impl ScanStats {
    /// Integer percentage of processed files, 0 when nothing was found.
    pub fn progress(&self) -> u8 {
        if self.total == 0 {
            0
        } else {
            (self.processed.saturating_mul(100) / self.total).min(100) as u8
        }
    }

    pub(crate) fn count_type(&mut self, model_type: &str) {
        *self.by_type.entry(model_type.to_string()).or_insert(0) += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatus {
    pub running: bool,
    pub progress: u8,
    pub stats: ScanStats,
    pub last_error: Option<String>,
    pub last_started: Option<i64>,
    pub last_finished: Option<i64>,
    /// Registry id of the current or last scan.
    pub job_id: Option<String>,
}
