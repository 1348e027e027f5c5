//! Quick-tag: derive tags from the folders a model file sits in.
//!
//! For `<root>/lora/anime style/x.safetensors` the worker adds `lora` and
//! `anime_style`. Existing tags are never removed. Only one quick-tag job
//! runs at a time.

use crate::classifier::RootSet;
use crate::config::{PathsConfig, ScanConfig};
use crate::error::{HikazeError, Result};
use crate::jobs::{JobInfo, JobKind, JobRegistry};
use crate::paths::segments_below;
use crate::store::CatalogStore;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Directory segments between the model's root and the file, as tags.
///
/// The root is the most specific configured root containing the path; when
/// none does, everything after a `models` directory is used. Tags are
/// lower-cased, spaces become `_` and duplicates are dropped.
pub fn extract_tags(path: &Path, roots: &RootSet) -> Vec<String> {
    let segments = match roots.find(path) {
        Some(root) => segments_below(path, &root.path).unwrap_or_default(),
        None => segments_after_models_dir(path),
    };

    let dirs = match segments.split_last() {
        Some((_file, dirs)) => dirs,
        None => return Vec::new(),
    };

    let mut seen = HashSet::new();
    dirs.iter()
        .map(|seg| seg.trim().replace(' ', "_").to_lowercase())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

fn segments_after_models_dir(path: &Path) -> Vec<String> {
    let segments: Vec<String> = path
        .to_string_lossy()
        .replace('\\', "/")
        .split('/')
        .map(str::to_string)
        .collect();
    // Index 0 is the part before the first separator; `/models/` needs a
    // separator on both sides.
    segments
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, s)| s.eq_ignore_ascii_case(PathsConfig::MODELS_DIR_NAME))
        .map(|(i, _)| {
            segments[i + 1..]
                .iter()
                .filter(|s| !s.is_empty() && *s != "." && *s != "..")
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Starts and tracks the single quick-tag job.
pub struct QuickTagger {
    store: CatalogStore,
    jobs: Arc<JobRegistry>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
}

impl QuickTagger {
    pub fn new(store: CatalogStore, jobs: Arc<JobRegistry>, runtime: Handle) -> Self {
        Self {
            store,
            jobs,
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
            runtime,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start tagging every catalogued model against `roots`.
    ///
    /// Returns the queued job, or [`HikazeError::Conflict`] when a quick-tag
    /// job is already running.
    pub fn start(&self, roots: RootSet) -> Result<JobInfo> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(HikazeError::Conflict {
                job: "quick_tag".to_string(),
            });
        }
        let flag = RunningFlag(self.running.clone());

        let job_id = self.jobs.register(JobKind::QuickTag);
        let job = self
            .jobs
            .get(&job_id)
            .ok_or_else(|| HikazeError::Other(format!("job {job_id} vanished on registration")))?;

        let store = self.store.clone();
        let jobs = self.jobs.clone();
        let handle = self.runtime.spawn_blocking(move || {
            let _flag = flag;
            let result = run(&store, &jobs, &job_id, &roots);
            if let Err(e) = &result {
                warn!("Quick-tag job {} failed: {}", job_id, e);
            }
            jobs.mark_finished(&job_id, result.err().map(|e| e.to_string()));
        });
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(job)
    }

    /// Wait for the most recently started job to finish.
    pub async fn wait(&self) {
        let handle = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Quick-tag task failed: {}", e);
            }
        }
    }
}

/// Clears the singleton flag when the worker ends, however it ends.
struct RunningFlag(Arc<AtomicBool>);

impl Drop for RunningFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn run(store: &CatalogStore, jobs: &JobRegistry, job_id: &str, roots: &RootSet) -> Result<()> {
    jobs.mark_running(job_id);
    let entries = store.all_model_paths()?;
    let total = entries.len() as u64;
    jobs.update(job_id, |job| job.total = total);
    info!("Quick-tag job {} started over {} models", job_id, total);

    let mut processed = 0u64;
    let mut updated = 0u64;
    for entry in entries {
        if !jobs.contains(job_id) {
            info!("Quick-tag job {} cancelled", job_id);
            return Ok(());
        }

        match tag_one(store, entry.id, &entry.path, roots) {
            Ok(true) => updated += 1,
            Ok(false) => {}
            Err(e) => debug!("Quick-tag skipped model {}: {}", entry.id, e),
        }
        processed += 1;

        if processed % ScanConfig::QUICK_TAG_PROGRESS_EVERY as u64 == 0 || processed == total {
            jobs.update(job_id, |job| {
                job.set_counts(processed, total);
                job.updated = updated;
            });
        }
    }

    jobs.update(job_id, |job| {
        job.set_counts(processed, total);
        job.updated = updated;
    });
    info!(
        "Quick-tag job {} finished: {} processed, {} updated",
        job_id, processed, updated
    );
    Ok(())
}

/// Add the missing folder tags to one model. Returns whether any were added.
///
/// Folder names that are another model type are left off by the store.
fn tag_one(store: &CatalogStore, model_id: i64, path: &Path, roots: &RootSet) -> Result<bool> {
    let tags = extract_tags(path, roots);
    if tags.is_empty() {
        return Ok(false);
    }
    let current: HashSet<String> = store.list_model_tags(model_id)?.into_iter().collect();
    let add: Vec<String> = tags.into_iter().filter(|t| !current.contains(t)).collect();
    if add.is_empty() {
        return Ok(false);
    }
    let after = store.set_model_tags(model_id, &add, &[])?;
    Ok(after.len() > current.len())
}
