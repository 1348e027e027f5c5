//! Background job methods on HikazeApi.

use crate::classifier::RootSet;
use crate::error::{HikazeError, Result};
use crate::jobs::JobInfo;
use crate::HikazeApi;

impl HikazeApi {
    /// Queue a quick-tag pass over the whole catalog.
    ///
    /// Fails with `Conflict` while another quick-tag job is running.
    pub fn start_quick_tag(&self) -> Result<JobInfo> {
        let roots = RootSet::new(&self.state.config().model_roots);
        self.state.quick_tag.start(roots)
    }

    /// Wait for the most recently started quick-tag job to finish.
    pub async fn wait_for_quick_tag(&self) {
        self.state.quick_tag.wait().await
    }

    pub fn job(&self, id: &str) -> Result<JobInfo> {
        self.state.jobs.get(id).ok_or_else(|| job_not_found(id))
    }

    /// Cancel a job by dropping it from the registry.
    ///
    /// The worker notices before its next item. A cancelled scan also has
    /// its stop token set so the scan status reflects it promptly.
    pub fn cancel_job(&self, id: &str) -> Result<()> {
        let scan_job = self.state.scanner.status().job_id;
        if !self.state.jobs.remove(id) {
            return Err(job_not_found(id));
        }
        if scan_job.as_deref() == Some(id) {
            self.state.scanner.stop();
        }
        Ok(())
    }

    pub fn list_jobs(&self) -> Vec<JobInfo> {
        self.state.jobs.list()
    }
}

fn job_not_found(id: &str) -> HikazeError {
    HikazeError::NotFound {
        entity: "job",
        id: id.to_string(),
    }
}
