//! Background scanner.
//!
//! At most one scan runs at a time. The running check and the transition to
//! running happen under the same lock that serves [`Scanner::status`], so two
//! concurrent `start` calls can never both begin. The scan itself runs on the
//! tokio blocking pool and stops cooperatively between files.

mod index;
mod stats;

pub use index::{index_file, HashPolicy, IndexOutcome};
pub use stats::{ScanStats, ScanStatus};

use crate::cancel::CancellationToken;
use crate::classifier::RootSet;
use crate::error::Result;
use crate::jobs::{JobKind, JobRegistry};
use crate::paths::absolutize;
use crate::store::{now_ms, CatalogStore};
use crate::walker::walk;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
struct ScanState {
    running: bool,
    stats: ScanStats,
    last_error: Option<String>,
    last_started: Option<i64>,
    last_finished: Option<i64>,
    job_id: Option<String>,
    cancel: CancellationToken,
}

type SharedState = Arc<Mutex<ScanState>>;

fn lock_state(state: &SharedState) -> MutexGuard<'_, ScanState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scans configured roots into the catalog.
pub struct Scanner {
    store: CatalogStore,
    jobs: Arc<JobRegistry>,
    roots: RwLock<RootSet>,
    state: SharedState,
    task: Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
}

impl Scanner {
    pub fn new(store: CatalogStore, roots: RootSet, jobs: Arc<JobRegistry>, runtime: Handle) -> Self {
        Self {
            store,
            jobs,
            roots: RwLock::new(roots),
            state: Arc::new(Mutex::new(ScanState::default())),
            task: Mutex::new(None),
            runtime,
        }
    }

    /// Roots used for classification and as default scan targets.
    pub fn roots(&self) -> RootSet {
        self.roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the roots. A scan already in progress keeps the ones it
    /// started with.
    pub fn set_roots(&self, roots: RootSet) {
        *self.roots.write().unwrap_or_else(PoisonError::into_inner) = roots;
    }

    /// Start a scan in the background.
    ///
    /// Returns false, leaving the running scan and its statistics alone,
    /// when a scan is already in progress. `paths` defaults to the configured
    /// roots; entries that are not directories are dropped. With `full`
    /// every file is hashed, otherwise only files the catalog has not seen.
    pub fn start(&self, paths: Option<Vec<PathBuf>>, full: bool) -> bool {
        let roots = self.roots();
        let (cancel, job_id) = {
            let mut state = lock_state(&self.state);
            if state.running {
                debug!("Scan already running, ignoring start request");
                return false;
            }
            let cancel = CancellationToken::new();
            let job_id = self.jobs.register(JobKind::Scan);
            *state = ScanState {
                running: true,
                stats: ScanStats::default(),
                last_error: None,
                last_started: Some(now_ms()),
                last_finished: state.last_finished,
                job_id: Some(job_id.clone()),
                cancel: cancel.clone(),
            };
            (cancel, job_id)
        };

        let targets: Vec<PathBuf> = paths
            .unwrap_or_else(|| roots.paths())
            .iter()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| absolutize(p))
            .filter(|p| p.is_dir())
            .collect();

        let run = ScanRun {
            store: self.store.clone(),
            jobs: self.jobs.clone(),
            state: self.state.clone(),
            roots,
            cancel,
            job_id,
            policy: if full {
                HashPolicy::Always
            } else {
                HashPolicy::NewOnly
            },
        };
        let handle = self.runtime.spawn_blocking(move || run.run(targets));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        true
    }

    /// Ask the running scan to stop after the current file.
    ///
    /// Returns whether a scan was running to receive the request.
    pub fn stop(&self) -> bool {
        let state = lock_state(&self.state);
        state.cancel.cancel();
        if state.running {
            info!("Scan stop requested");
        }
        state.running
    }

    pub fn status(&self) -> ScanStatus {
        let state = lock_state(&self.state);
        ScanStatus {
            running: state.running,
            progress: state.stats.progress(),
            stats: state.stats.clone(),
            last_error: state.last_error.clone(),
            last_started: state.last_started,
            last_finished: state.last_finished,
            job_id: state.job_id.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        lock_state(&self.state).running
    }

    /// Wait for the most recently started scan to finish.
    pub async fn wait(&self) {
        let handle = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Scan task failed: {}", e);
            }
        }
    }

    /// Re-index one file outside the scan machinery.
    ///
    /// Independent of the running flag. Returns false when `path` is not a
    /// regular file. This blocks on IO; async callers should move it to the
    /// blocking pool.
    pub fn refresh_one(&self, path: &Path, compute_hash: bool) -> Result<bool> {
        let path = absolutize(path);
        if !path.is_file() {
            return Ok(false);
        }
        let policy = if compute_hash {
            HashPolicy::Always
        } else {
            HashPolicy::Never
        };
        let outcome = index_file(&self.store, &self.roots(), &path, policy)?;
        Ok(!matches!(outcome, IndexOutcome::Skipped))
    }
}

/// Everything a background scan needs, moved onto the blocking pool.
struct ScanRun {
    store: CatalogStore,
    jobs: Arc<JobRegistry>,
    state: SharedState,
    roots: RootSet,
    cancel: CancellationToken,
    job_id: String,
    policy: HashPolicy,
}

impl ScanRun {
    fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || !self.jobs.contains(&self.job_id)
    }

    fn with_stats(&self, f: impl FnOnce(&mut ScanStats)) {
        let mut state = lock_state(&self.state);
        f(&mut state.stats);
        let (processed, total) = (state.stats.processed, state.stats.total);
        let changed = state.stats.added + state.stats.updated;
        let errors = state.stats.errors;
        drop(state);
        self.jobs.update(&self.job_id, |job| {
            job.set_counts(processed, total);
            job.updated = changed;
            job.errors = errors;
        });
    }

    fn run(self, targets: Vec<PathBuf>) {
        let mut guard = FinishGuard {
            state: self.state.clone(),
            jobs: self.jobs.clone(),
            job_id: self.job_id.clone(),
            error: None,
        };
        self.jobs.mark_running(&self.job_id);
        info!(
            "Scan started over {} roots ({:?} hashing)",
            targets.len(),
            self.policy
        );

        let files: Vec<PathBuf> = walk(targets).take_while(|_| !self.should_stop()).collect();
        self.with_stats(|stats| stats.total = files.len() as u64);

        if let Err(e) = self.process_all(files) {
            guard.error = Some(e.to_string());
        }
    }

    /// Index every file. Only a store failure ends the loop early with an
    /// error; per-file IO failures are counted and skipped.
    fn process_all(&self, files: Vec<PathBuf>) -> Result<()> {
        for path in files {
            if self.should_stop() {
                info!("Scan stopped before {}", path.display());
                break;
            }
            match index_file(&self.store, &self.roots, &path, self.policy) {
                Ok(IndexOutcome::Added { model_type }) => self.with_stats(|s| {
                    s.added += 1;
                    s.count_type(&model_type);
                    s.processed += 1;
                }),
                Ok(IndexOutcome::Updated { model_type }) => self.with_stats(|s| {
                    s.updated += 1;
                    s.count_type(&model_type);
                    s.processed += 1;
                }),
                Ok(IndexOutcome::Skipped) => self.with_stats(|s| {
                    s.skipped += 1;
                    s.processed += 1;
                }),
                Err(e) if e.is_store_error() => {
                    error!("Scan aborted on {}: {}", path.display(), e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Failed to index {}: {}", path.display(), e);
                    self.with_stats(|s| {
                        s.errors += 1;
                        s.processed += 1;
                    });
                }
            }
        }
        Ok(())
    }
}

/// Clears the running flag and closes the registry entry when the scan ends,
/// including by panic.
struct FinishGuard {
    state: SharedState,
    jobs: Arc<JobRegistry>,
    job_id: String,
    error: Option<String>,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        let error = self.error.take().or_else(|| {
            std::thread::panicking().then(|| "scan task panicked".to_string())
        });
        let mut state = lock_state(&self.state);
        state.running = false;
        state.last_finished = Some(now_ms());
        state.last_error = error.clone();
        let stats = state.stats.clone();
        drop(state);

        self.jobs.mark_finished(&self.job_id, error);
        info!(
            "Scan finished: {} processed, {} added, {} updated, {} errors",
            stats.processed, stats.added, stats.updated, stats.errors
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support;
    use std::fs;
    use tempfile::TempDir;

    fn setup(temp: &TempDir) -> (Scanner, Arc<JobRegistry>, PathBuf) {
        let root = temp.path().join("models");
        fs::create_dir_all(root.join("lora")).unwrap();
        fs::create_dir_all(root.join("checkpoint")).unwrap();
        fs::write(root.join("lora/a.safetensors"), vec![1u8; 5000]).unwrap();
        fs::write(root.join("checkpoint/b.ckpt"), vec![2u8; 9000]).unwrap();

        let store = CatalogStore::open(temp.path().join("catalog.sqlite3")).unwrap();
        let jobs = Arc::new(JobRegistry::new());
        let scanner = Scanner::new(
            store,
            RootSet::new(&[&root]),
            jobs.clone(),
            Handle::current(),
        );
        (scanner, jobs, root)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_scan_populates_stats() {
        let temp = TempDir::new().unwrap();
        let (scanner, jobs, _root) = setup(&temp);

        assert!(scanner.start(None, true));
        scanner.wait().await;

        let status = scanner.status();
        assert!(!status.running);
        assert_eq!(status.progress, 100);
        assert_eq!(status.stats.total, 2);
        assert_eq!(status.stats.added, 2);
        assert_eq!(status.stats.by_type.get("lora"), Some(&1));
        assert_eq!(status.stats.by_type.get("checkpoint"), Some(&1));
        assert!(status.last_finished.is_some());

        let job = jobs.get(status.job_id.as_deref().unwrap()).unwrap();
        assert_eq!(job.status, crate::jobs::JobStatus::Success);
        assert_eq!(job.updated, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_rejected_while_running() {
        let temp = TempDir::new().unwrap();
        let (scanner, jobs, _root) = setup(&temp);

        scanner.start(None, true);
        scanner.wait().await;
        let before = scanner.status();

        lock_state(&scanner.state).running = true;
        assert!(!scanner.start(None, true));
        let after = scanner.status();
        assert_eq!(after.stats, before.stats);
        assert_eq!(after.job_id, before.job_id);
        assert_eq!(jobs.list().len(), 1);

        lock_state(&scanner.state).running = false;
        assert!(scanner.start(None, false));
        scanner.wait().await;
        assert_eq!(scanner.status().stats.updated, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancelled_job_stops_scan() {
        let temp = TempDir::new().unwrap();
        let (scanner, jobs, _root) = setup(&temp);

        let run = ScanRun {
            store: scanner.store.clone(),
            jobs: jobs.clone(),
            state: scanner.state.clone(),
            roots: scanner.roots(),
            cancel: CancellationToken::new(),
            job_id: jobs.register(JobKind::Scan),
            policy: HashPolicy::NewOnly,
        };
        jobs.remove(&run.job_id);
        run.run(scanner.roots().paths());

        let status = scanner.status();
        assert!(!status.running);
        assert_eq!(status.stats.processed, 0);
        assert_eq!(scanner.store.count_models().unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rescan_updates_in_place() {
        let temp = TempDir::new().unwrap();
        let (scanner, _jobs, _root) = setup(&temp);

        scanner.start(None, true);
        scanner.wait().await;
        scanner.start(None, false);
        scanner.wait().await;

        let status = scanner.status();
        assert_eq!(status.stats.added, 0);
        assert_eq!(status.stats.updated, 2);
        assert_eq!(scanner.store.count_models().unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_explicit_paths_drop_non_directories() {
        let temp = TempDir::new().unwrap();
        let (scanner, _jobs, root) = setup(&temp);

        assert!(scanner.start(
            Some(vec![root.join("lora"), root.join("lora/a.safetensors"), temp.path().join("nope")]),
            false
        ));
        scanner.wait().await;
        assert_eq!(scanner.status().stats.total, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_refresh_one() {
        let temp = TempDir::new().unwrap();
        let (scanner, _jobs, root) = setup(&temp);

        assert!(scanner.refresh_one(&root.join("lora/a.safetensors"), false).unwrap());
        assert!(!scanner.refresh_one(&root.join("lora"), false).unwrap());
        assert!(!scanner.refresh_one(&root.join("missing.ckpt"), true).unwrap());

        let record = scanner
            .store
            .get_by_path(&root.join("lora/a.safetensors"))
            .unwrap()
            .unwrap();
        assert_eq!(record.model_type, "lora");
        assert_eq!(record.hash_hex, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_starts_run_one_scan() {
        let temp = TempDir::new().unwrap();
        let (scanner, jobs, _root) = setup(&temp);

        for round in 1..=10 {
            // The winning scan stalls on the store until both calls returned.
            let conn = test_support::connection(&scanner.store);
            let barrier = std::sync::Barrier::new(2);
            let (barrier, racer) = (&barrier, &scanner);
            let started: Vec<bool> = std::thread::scope(|s| {
                let handles: Vec<_> = (0..2)
                    .map(|_| {
                        s.spawn(move || {
                            barrier.wait();
                            racer.start(None, false)
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });
            drop(conn);
            assert_eq!(started.iter().filter(|s| **s).count(), 1);
            scanner.wait().await;
            assert_eq!(jobs.list().len(), round);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unreadable_file_counts_error_and_scan_continues() {
        let temp = TempDir::new().unwrap();
        let (scanner, jobs, root) = setup(&temp);

        // A path below a regular file cannot be stat'ed, even as root.
        let broken = root.join("lora/a.safetensors/inner.ckpt");
        let files = vec![
            broken,
            root.join("lora/a.safetensors"),
            root.join("checkpoint/b.ckpt"),
        ];
        let run = ScanRun {
            store: scanner.store.clone(),
            jobs: jobs.clone(),
            state: scanner.state.clone(),
            roots: scanner.roots(),
            cancel: CancellationToken::new(),
            job_id: jobs.register(JobKind::Scan),
            policy: HashPolicy::Always,
        };
        run.with_stats(|s| s.total = files.len() as u64);
        run.process_all(files).unwrap();

        let stats = scanner.status().stats;
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.added, 2);
        assert_eq!(stats.processed, 3);
        assert_eq!(scanner.store.count_models().unwrap(), 2);
        let hashed = scanner
            .store
            .get_by_path(&root.join("checkpoint/b.ckpt"))
            .unwrap()
            .unwrap();
        assert!(hashed.hash_hex.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_store_failure_aborts_scan() {
        let temp = TempDir::new().unwrap();
        let (scanner, jobs, _root) = setup(&temp);
        test_support::connection(&scanner.store)
            .execute_batch("DROP TABLE model_tags; DROP TABLE models;")
            .unwrap();

        assert!(scanner.start(None, true));
        scanner.wait().await;

        let status = scanner.status();
        assert!(!status.running);
        assert!(status.last_error.unwrap().contains("models"));
        assert_eq!(status.stats.added, 0);
        let job = jobs.get(status.job_id.as_deref().unwrap()).unwrap();
        assert_eq!(job.status, crate::jobs::JobStatus::Failed);

        // Idle again: the next start is accepted.
        assert!(scanner.start(None, true));
        scanner.wait().await;
        assert!(!scanner.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_is_observed_between_files() {
        let temp = TempDir::new().unwrap();
        let (scanner, _jobs, _root) = setup(&temp);

        let conn = test_support::connection(&scanner.store);
        assert!(scanner.start(None, true));

        // Once the walk is counted, the scan is on its first file and
        // blocked on the store.
        while scanner.status().stats.total == 0 {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert!(scanner.stop());
        drop(conn);
        scanner.wait().await;

        let status = scanner.status();
        assert!(!status.running);
        assert_eq!(status.stats.total, 2);
        assert_eq!(status.stats.processed, 1);
        assert_eq!(status.last_error, None);
        assert_eq!(scanner.store.count_models().unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_without_scan() {
        let temp = TempDir::new().unwrap();
        let (scanner, _jobs, _root) = setup(&temp);
        assert!(!scanner.stop());
        scanner.wait().await;
    }
}
