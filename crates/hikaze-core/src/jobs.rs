//! In-memory registry of background jobs.
//!
//! Jobs are owned by the API object and vanish on restart. Removing a job is
//! how a caller cancels it: workers poll [`JobRegistry::contains`] between
//! items and stop once their entry is gone.

use crate::config::ScanConfig;
use crate::store::now_ms;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Scan,
    QuickTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Failed,
}

impl JobStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }
}

/// Snapshot of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub total: u64,
    pub processed: u64,
    /// Records changed by the job (added or updated).
    pub updated: u64,
    pub errors: u64,
    /// 0-100, never decreases.
    pub progress: u8,
    pub error: Option<String>,
}

impl JobInfo {
    fn new(id: String, kind: JobKind) -> Self {
        Self {
            id,
            kind,
            status: JobStatus::Queued,
            created_at: now_ms(),
            started_at: None,
            finished_at: None,
            total: 0,
            processed: 0,
            updated: 0,
            errors: 0,
            progress: 0,
            error: None,
        }
    }

    /// Record `processed` out of `total` and raise progress accordingly.
    pub fn set_counts(&mut self, processed: u64, total: u64) {
        self.processed = processed;
        self.total = total;
        let pct = if total == 0 {
            0
        } else {
            (processed.saturating_mul(100) / total).min(100) as u8
        };
        self.progress = self.progress.max(pct);
    }
}

/// Concurrent `job id -> JobInfo` map with TTL eviction of finished jobs.
#[derive(Debug)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, JobInfo>>,
    ttl: Duration,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::with_ttl(ScanConfig::FINISHED_JOB_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn state(&self) -> MutexGuard<'_, HashMap<String, JobInfo>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a queued job and return its id.
    pub fn register(&self, kind: JobKind) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let mut jobs = self.state();
        self.evict_expired(&mut jobs);
        jobs.insert(id.clone(), JobInfo::new(id.clone(), kind));
        debug!("Registered {:?} job {}", kind, id);
        id
    }

    /// Apply `f` to a job. Returns false when the job is gone.
    ///
    /// Progress is clamped so an update can never move it backwards.
    pub fn update(&self, id: &str, f: impl FnOnce(&mut JobInfo)) -> bool {
        let mut jobs = self.state();
        let Some(job) = jobs.get_mut(id) else {
            return false;
        };
        let previous = job.progress;
        f(job);
        job.progress = job.progress.clamp(previous, 100);
        true
    }

    pub fn mark_running(&self, id: &str) -> bool {
        self.update(id, |job| {
            job.status = JobStatus::Running;
            job.started_at = Some(now_ms());
        })
    }

    /// Move a job to `success` or `failed`.
    pub fn mark_finished(&self, id: &str, error: Option<String>) -> bool {
        self.update(id, |job| {
            job.finished_at = Some(now_ms());
            match error {
                None => {
                    job.status = JobStatus::Success;
                    job.progress = 100;
                }
                Some(message) => {
                    job.status = JobStatus::Failed;
                    job.error = Some(message);
                }
            }
        })
    }

    pub fn get(&self, id: &str) -> Option<JobInfo> {
        self.state().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state().contains_key(id)
    }

    /// Remove a job; a worker still running it stops at its next check.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.state().remove(id).is_some();
        if removed {
            debug!("Removed job {}", id);
        }
        removed
    }

    /// All live jobs, oldest first.
    pub fn list(&self) -> Vec<JobInfo> {
        let mut jobs = self.state();
        self.evict_expired(&mut jobs);
        let mut all: Vec<JobInfo> = jobs.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    fn evict_expired(&self, jobs: &mut HashMap<String, JobInfo>) {
        let cutoff = now_ms() - self.ttl.as_millis() as i64;
        jobs.retain(|_, job| match job.finished_at {
            Some(finished) if job.status.is_finished() => finished > cutoff,
            _ => true,
        });
    }
}
