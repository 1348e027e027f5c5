//! Scan control methods on HikazeApi.

use std::path::PathBuf;

use crate::api::models::ModelRef;
use crate::error::{HikazeError, Result};
use crate::scanner::ScanStatus;
use crate::HikazeApi;

impl HikazeApi {
    /// Start a background scan; false when one is already running.
    ///
    /// `paths` defaults to the configured model roots. With `full` every
    /// file is re-hashed, otherwise only paths the catalog has not seen.
    pub fn start_scan(&self, paths: Option<Vec<PathBuf>>, full: bool) -> bool {
        self.state.scanner.start(paths, full)
    }

    /// Ask the running scan to stop after its current file.
    pub fn stop_scan(&self) -> bool {
        self.state.scanner.stop()
    }

    pub fn scan_status(&self) -> ScanStatus {
        self.state.scanner.status()
    }

    /// Wait for the most recently started scan to finish.
    pub async fn wait_for_scan(&self) {
        self.state.scanner.wait().await
    }

    /// Re-index one model file, by catalog id or by path.
    ///
    /// Returns false when the path is not a regular file. An unknown id is a
    /// `NotFound` error.
    pub async fn refresh_model(&self, target: ModelRef, compute_hash: bool) -> Result<bool> {
        self.blocking(move |state| {
            let path = match target {
                ModelRef::Path(path) => path,
                ModelRef::Id(id) => {
                    state
                        .store
                        .get_by_id(id)?
                        .ok_or_else(|| HikazeError::model_not_found(id))?
                        .path
                }
            };
            if path.as_os_str().is_empty() {
                return Err(HikazeError::validation("path", "id or path required"));
            }
            state.scanner.refresh_one(&path, compute_hash)
        })
        .await
    }
}
