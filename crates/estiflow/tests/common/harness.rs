//! Isolated pipeline environment: temp run/filestore roots plus fake CRM,
//! portal, mailer and board, with accessors for asserting side effects.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;

use estiflow::crm::FakeCrm;
use estiflow::job::JobSpec;
use estiflow::notify::{FakeBoard, FakeMailer, Notifier};
use estiflow::pipeline::Pipeline;
use estiflow::portal::{AutomationError, EstimatePortal, PortalMeta, StubPortal};

/// Portal wrapper that counts invocations and can be armed to fail, for
/// asserting fail-fast ordering.
pub struct CountingPortal {
    inner: StubPortal,
    pub calls: AtomicUsize,
    fail: AtomicBool,
}

impl CountingPortal {
    pub fn new() -> Self {
        Self {
            inner: StubPortal::new(),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail_always(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.fail.store(false, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EstimatePortal for CountingPortal {
    fn generate_estimate(
        &self,
        job: &JobSpec,
        sof_path: &Path,
        out_path: &Path,
    ) -> Result<PortalMeta, AutomationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AutomationError::Login("armed to fail".to_string()));
        }
        self.inner.generate_estimate(job, sof_path, out_path)
    }
}

pub struct TestHarness {
    temp_dir: TempDir,
    pub run_root: PathBuf,
    pub filestore_root: PathBuf,
    pub crm: Arc<FakeCrm>,
    pub portal: Arc<CountingPortal>,
    pub mailer: Arc<FakeMailer>,
    pub board: Arc<FakeBoard>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        Self {
            run_root: temp_dir.path().join("runs"),
            filestore_root: temp_dir.path().join("filestore"),
            temp_dir,
            crm: Arc::new(FakeCrm::with_sample_customers()),
            portal: Arc::new(CountingPortal::new()),
            mailer: Arc::new(FakeMailer::new()),
            board: Arc::new(FakeBoard::new()),
        }
    }

    /// Pipeline with notifications enabled through the fakes.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.run_root.clone(),
            &self.filestore_root,
            self.crm.clone(),
            self.portal.clone(),
            Notifier::new(Some(self.mailer.clone()), Some(self.board.clone())),
        )
    }

    /// Pipeline with the notifier switched off.
    pub fn silent_pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.run_root.clone(),
            &self.filestore_root,
            self.crm.clone(),
            self.portal.clone(),
            Notifier::disabled(),
        )
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.run_root.join(format!("job-{job_id}"))
    }

    pub fn stage_log(&self, job_id: &str, stage: &str) -> PathBuf {
        self.job_dir(job_id).join(format!("logs/{stage}.json"))
    }
}
