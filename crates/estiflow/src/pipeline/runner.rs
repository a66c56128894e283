//! The orchestrator: a fixed, fail-fast stage sequence over injected
//! adapters. Every stage persists its result before the next one starts, so a
//! crash or failure leaves a resumable record and a re-run with the same job
//! id reuses prior results instead of hitting external systems again.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::config::Config;
use crate::crm::{CrmGateway, OpportunityRecord};
use crate::error::EstiflowError;
use crate::extract::{EstimateExtractor, EstimateResult};
use crate::job::spec::JobSpec;
use crate::notify::{Notifier, NotifyOutcome};
use crate::portal::{EstimatePortal, PortalMeta};
use crate::sof::SofGenerator;
use crate::store::filesystem::{save_artifact, write_bytes, write_json, ArtifactStore};
use crate::store::paths::{ensure_job_dirs, CanonicalPaths};

use super::context::PipelineContext;
use super::error::PipelineError;
use super::state::{
    read_stage_result, write_stage_failure, write_stage_result, PipelineRun, Stage,
};

const SOF_FILENAME: &str = "SOF.pdf";
const ESTIMATE_FILENAME: &str = "Estimate.pdf";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub job_id: String,
    pub ok: bool,
    #[serde(default)]
    pub opportunity: Option<OpportunityRecord>,
    #[serde(default)]
    pub estimate: Option<EstimateResult>,
    #[serde(default)]
    pub canonical: Option<CanonicalPaths>,
    #[serde(default)]
    pub failed_stage: Option<Stage>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl PipelineResult {
    /// A run that never started (dispatch-time rejection).
    pub fn rejected(job_id: &str, reason: String) -> Self {
        Self {
            job_id: job_id.to_string(),
            ok: false,
            opportunity: None,
            estimate: None,
            canonical: None,
            failed_stage: None,
            error: Some(reason),
            warnings: Vec::new(),
        }
    }
}

/// Result blob persisted by the SOF stage. The fingerprint covers page text
/// only, so cache hits survive the embedded render timestamp.
#[derive(Debug, Serialize, Deserialize)]
struct SofRecord {
    path: PathBuf,
    fingerprint: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PortalRecord {
    estimate_path: PathBuf,
    meta: PortalMeta,
}

pub struct Pipeline {
    run_root: PathBuf,
    crm: Arc<dyn CrmGateway>,
    generator: SofGenerator,
    portal: Arc<dyn EstimatePortal>,
    extractor: EstimateExtractor,
    store: ArtifactStore,
    notifier: Notifier,
}

impl Pipeline {
    pub fn new<P: Into<PathBuf>, Q: AsRef<std::path::Path>>(
        run_root: P,
        filestore_root: Q,
        crm: Arc<dyn CrmGateway>,
        portal: Arc<dyn EstimatePortal>,
        notifier: Notifier,
    ) -> Self {
        Self {
            run_root: run_root.into(),
            crm,
            generator: SofGenerator::new(),
            portal,
            extractor: EstimateExtractor::new(),
            store: ArtifactStore::new(filestore_root),
            notifier,
        }
    }

    /// Production constructor: builds the configured adapter implementations.
    pub fn from_config(config: &Config) -> Result<Self, EstiflowError> {
        let crm = crate::crm::gateway_from_config(&config.crm)?;
        let portal = crate::portal::driver_from_config(&config.portal)?;
        let notifier = Notifier::from_config(&config.notifications)?;
        Ok(Self::new(
            config.run_root.clone(),
            &config.filestore_root,
            crm,
            portal,
            notifier,
        ))
    }

    /// Runs the full stage sequence for one job. Never panics on stage
    /// failure; the returned record says how far the run got.
    pub fn run(&self, job: &JobSpec) -> PipelineResult {
        let _span = info_span!("pipeline", job_id = %job.job_id).entered();

        let dirs = match ensure_job_dirs(&self.run_root, &job.job_id) {
            Ok(dirs) => dirs,
            Err(e) => return PipelineResult::rejected(&job.job_id, e.to_string()),
        };

        let mut run = PipelineRun::new(&job.job_id);
        if let Err(e) = run.persist(&dirs.base) {
            return PipelineResult::rejected(&job.job_id, e.to_string());
        }

        let mut ctx = PipelineContext::new(job.clone(), dirs);

        let steps: [(Stage, fn(&Pipeline, &mut PipelineContext) -> Result<(), PipelineError>); 6] = [
            (Stage::CreateOpportunity, Pipeline::step_create_opportunity),
            (Stage::GenerateSof, Pipeline::step_generate_sof),
            (Stage::RunPortal, Pipeline::step_run_portal),
            (Stage::ExtractEstimate, Pipeline::step_extract_estimate),
            (Stage::Canonicalize, Pipeline::step_canonicalize),
            (Stage::Notify, Pipeline::step_notify),
        ];

        for (stage, step) in steps {
            let _step_span = info_span!("stage", stage = stage.key()).entered();

            run.begin_stage(stage);
            if let Err(e) = run.persist(&ctx.dirs.base) {
                return self.fail(run, ctx, stage, PipelineError::Storage(e));
            }

            if let Err(e) = step(self, &mut ctx) {
                return self.fail(run, ctx, stage, e);
            }

            run.stage_ok(stage);
            if let Err(e) = run.persist(&ctx.dirs.base) {
                return self.fail(run, ctx, stage, PipelineError::Storage(e));
            }
        }

        run.succeed();
        if let Err(e) = run.persist(&ctx.dirs.base) {
            warn!(job_id = %ctx.job.job_id, error = %e, "run record not persisted after success");
        }

        let result = PipelineResult {
            job_id: ctx.job.job_id.clone(),
            ok: true,
            opportunity: ctx.opportunity,
            estimate: ctx.estimate,
            canonical: ctx.canonical,
            failed_stage: None,
            error: None,
            warnings: ctx.warnings,
        };
        if let Err(e) = write_json(&ctx.dirs.base.join("result.json"), &result) {
            warn!(job_id = %result.job_id, error = %e, "result record not persisted");
        }
        info!(job_id = %result.job_id, "pipeline complete");
        result
    }

    fn step_create_opportunity(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        if let Some(record) =
            read_stage_result::<OpportunityRecord>(&ctx.dirs.logs, Stage::CreateOpportunity)
        {
            debug!(opportunity = %record.opportunity_key, "reusing recorded opportunity");
            ctx.opportunity = Some(record);
            return Ok(());
        }

        let record = self.crm.create_opportunity(&ctx.job)?;
        write_stage_result(&ctx.dirs.logs, Stage::CreateOpportunity, &record)?;
        ctx.opportunity = Some(record);
        Ok(())
    }

    fn step_generate_sof(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let fingerprint = self.generator.fingerprint(&ctx.job)?;

        if let Some(record) = read_stage_result::<SofRecord>(&ctx.dirs.logs, Stage::GenerateSof) {
            if record.fingerprint == fingerprint && record.path.exists() {
                debug!("reusing recorded SOF");
                ctx.sof_path = Some(record.path);
                ctx.sof_fingerprint = Some(record.fingerprint);
                return Ok(());
            }
        }

        let bytes = self.generator.render(&ctx.job)?;
        let sof_path = ctx.dirs.outputs.join(SOF_FILENAME);
        write_bytes(&sof_path, &bytes)?;

        let record = SofRecord {
            path: sof_path.clone(),
            fingerprint: fingerprint.clone(),
        };
        write_stage_result(&ctx.dirs.logs, Stage::GenerateSof, &record)?;
        ctx.sof_path = Some(sof_path);
        ctx.sof_fingerprint = Some(fingerprint);
        Ok(())
    }

    fn step_run_portal(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        if let Some(record) = read_stage_result::<PortalRecord>(&ctx.dirs.logs, Stage::RunPortal) {
            if record.estimate_path.exists() {
                debug!("reusing recorded portal estimate");
                ctx.portal = Some(record.meta);
                ctx.estimate_path = Some(record.estimate_path);
                return Ok(());
            }
        }

        let sof_path = ctx.sof_path.as_ref().expect("generate_sof completed");
        let estimate_path = ctx.dirs.outputs.join(ESTIMATE_FILENAME);
        let meta = self
            .portal
            .generate_estimate(&ctx.job, sof_path, &estimate_path)?;

        let record = PortalRecord {
            estimate_path: estimate_path.clone(),
            meta: meta.clone(),
        };
        write_stage_result(&ctx.dirs.logs, Stage::RunPortal, &record)?;
        ctx.portal = Some(meta);
        ctx.estimate_path = Some(estimate_path);
        Ok(())
    }

    fn step_extract_estimate(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        if let Some(result) =
            read_stage_result::<EstimateResult>(&ctx.dirs.logs, Stage::ExtractEstimate)
        {
            debug!("reusing recorded extraction");
            ctx.estimate = Some(result);
            return Ok(());
        }

        let estimate_path = ctx.estimate_path.as_ref().expect("run_portal completed");
        // Prefer the number the portal reported as the degradation fallback.
        let fallback = ctx
            .portal
            .as_ref()
            .and_then(|m| m.estimate_no.clone())
            .unwrap_or_else(|| format!("EST-{}", ctx.job.job_id));

        let result = self.extractor.extract(estimate_path, &fallback)?;
        write_stage_result(&ctx.dirs.logs, Stage::ExtractEstimate, &result)?;
        ctx.estimate = Some(result);
        Ok(())
    }

    fn step_canonicalize(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        if let Some(paths) = read_stage_result::<CanonicalPaths>(&ctx.dirs.logs, Stage::Canonicalize)
        {
            if paths.sof.exists() && paths.estimate.exists() {
                debug!("canonical copies already in place");
                ctx.canonical = Some(paths);
                return Ok(());
            }
        }

        let estimate = ctx.estimate.as_ref().expect("extract_estimate completed");
        let estimate_no = estimate
            .estimate_no_found
            .then_some(estimate.estimate_no.as_str());
        let paths =
            self.store
                .canonical_paths(&ctx.job.job_id, &ctx.job.customer.name, estimate_no);

        let sof_path = ctx.sof_path.as_ref().expect("generate_sof completed");
        let estimate_path = ctx.estimate_path.as_ref().expect("run_portal completed");
        save_artifact(sof_path, &paths.sof)?;
        save_artifact(estimate_path, &paths.estimate)?;

        write_stage_result(&ctx.dirs.logs, Stage::Canonicalize, &paths)?;
        ctx.canonical = Some(paths);
        Ok(())
    }

    fn step_notify(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        if let Some(outcome) = read_stage_result::<NotifyOutcome>(&ctx.dirs.logs, Stage::Notify) {
            debug!("reusing recorded notification outcome");
            ctx.warnings.extend(outcome.warnings.clone());
            ctx.notify = Some(outcome);
            return Ok(());
        }

        let outcome = if self.notifier.is_enabled() {
            let estimate = ctx.estimate.as_ref().expect("extract_estimate completed");
            let attachment = ctx
                .canonical
                .as_ref()
                .map(|c| c.estimate.as_path())
                .or(ctx.estimate_path.as_deref());
            self.notifier.notify(&ctx.job, estimate, attachment)
        } else {
            debug!("notifications disabled");
            NotifyOutcome::default()
        };

        write_stage_result(&ctx.dirs.logs, Stage::Notify, &outcome)?;
        ctx.warnings.extend(outcome.warnings.clone());
        ctx.notify = Some(outcome);
        Ok(())
    }

    fn fail(
        &self,
        mut run: PipelineRun,
        ctx: PipelineContext,
        stage: Stage,
        error: PipelineError,
    ) -> PipelineResult {
        let message = error.to_string();
        warn!(job_id = %ctx.job.job_id, stage = stage.key(), error = %message, "pipeline halted");

        if let Err(e) = write_stage_failure(&ctx.dirs.logs, stage, &message) {
            warn!(job_id = %ctx.job.job_id, error = %e, "stage failure log not persisted");
        }
        run.stage_failed(stage, &message);
        if let Err(e) = run.persist(&ctx.dirs.base) {
            warn!(job_id = %ctx.job.job_id, error = %e, "run record not persisted after failure");
        }

        PipelineResult {
            job_id: ctx.job.job_id.clone(),
            ok: false,
            opportunity: ctx.opportunity,
            estimate: ctx.estimate,
            canonical: ctx.canonical,
            failed_stage: Some(stage),
            error: Some(message),
            warnings: ctx.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::FakeCrm;
    use crate::job::spec::{Customer, LineItem, Project, ProjectSource};
    use crate::portal::StubPortal;
    use tempfile::TempDir;

    fn sample_job(job_id: &str) -> JobSpec {
        JobSpec {
            job_id: job_id.to_string(),
            customer: Customer {
                name: "Acme Builders Ltd.".to_string(),
                email: None,
                phone: None,
                address: None,
                crm_key: None,
                metadata: None,
            },
            project: Project {
                site: "123 Industrial Rd".to_string(),
                due_date: None,
                source: ProjectSource::Manual,
            },
            line_items: vec![LineItem {
                room: "Warehouse".to_string(),
                opening: "dock".to_string(),
                size: "10x10".to_string(),
                qty: 1,
                spec: "PVC liner".to_string(),
                price: Some(1450.0),
            }],
            attachments: None,
            tags: None,
        }
    }

    fn pipeline(tmp: &TempDir) -> (Pipeline, Arc<FakeCrm>) {
        let crm = Arc::new(FakeCrm::new());
        let pipeline = Pipeline::new(
            tmp.path().join("runs"),
            tmp.path().join("filestore"),
            crm.clone(),
            Arc::new(StubPortal::new()),
            Notifier::disabled(),
        );
        (pipeline, crm)
    }

    #[test]
    fn test_happy_path_produces_artifacts_and_logs() {
        let tmp = TempDir::new().unwrap();
        let (pipeline, _crm) = pipeline(&tmp);
        let job = sample_job("J-20260805-001");

        let result = pipeline.run(&job);
        assert!(result.ok, "pipeline failed: {:?}", result.error);
        assert!(result.opportunity.is_some());

        let estimate = result.estimate.unwrap();
        // Stub portal reports no number, so the placeholder is used.
        assert_eq!(estimate.estimate_no, "EST-J-20260805-001");
        assert!(!estimate.estimate_no_found);

        let canonical = result.canonical.unwrap();
        assert!(canonical.sof.exists());
        assert!(canonical.estimate.exists());
        assert!(canonical.root.starts_with(tmp.path().join("filestore/2026")));

        let job_dir = tmp.path().join("runs/job-J-20260805-001");
        assert!(job_dir.join("run.json").exists());
        assert!(job_dir.join("result.json").exists());
        for stage in Stage::ORDER {
            assert!(
                job_dir.join(format!("logs/{}.json", stage.key())).exists(),
                "missing log for {stage}"
            );
        }

        let run = PipelineRun::load(&job_dir).unwrap();
        assert_eq!(run.state, crate::pipeline::RunState::Succeeded);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_rerun_reuses_recorded_stages() {
        let tmp = TempDir::new().unwrap();
        let (pipeline, crm) = pipeline(&tmp);
        let job = sample_job("J-20260805-002");

        let first = pipeline.run(&job);
        let second = pipeline.run(&job);

        assert!(first.ok && second.ok);
        assert_eq!(crm.create_count(), 1, "second run must not create again");
        assert_eq!(
            first.opportunity.unwrap().opportunity_key,
            second.opportunity.unwrap().opportunity_key
        );
    }

    #[test]
    fn test_template_failure_stops_before_portal() {
        let tmp = TempDir::new().unwrap();
        let (pipeline, _crm) = pipeline(&tmp);
        let mut job = sample_job("J-20260805-003");
        job.line_items.clear();

        let result = pipeline.run(&job);
        assert!(!result.ok);
        assert_eq!(result.failed_stage, Some(Stage::GenerateSof));
        // Opportunity was already recorded before the failing stage.
        assert!(result.opportunity.is_some());

        let job_dir = tmp.path().join("runs/job-J-20260805-003");
        assert!(!job_dir.join("outputs/Estimate.pdf").exists());
        assert!(!job_dir.join("logs/run_portal.json").exists());

        let run = PipelineRun::load(&job_dir).unwrap();
        assert_eq!(
            run.state,
            crate::pipeline::RunState::Failed { stage: Stage::GenerateSof }
        );
    }

    #[test]
    fn test_crm_failure_marks_first_stage() {
        let tmp = TempDir::new().unwrap();
        let (pipeline, crm) = pipeline(&tmp);
        crm.fail_next(crate::crm::fake::FakeFailure::Unavailable);

        let result = pipeline.run(&sample_job("J-20260805-004"));
        assert!(!result.ok);
        assert_eq!(result.failed_stage, Some(Stage::CreateOpportunity));
        assert!(result.error.unwrap().contains("unreachable"));
    }

    #[test]
    fn test_estimate_number_from_portal_names_canonical_file() {
        let tmp = TempDir::new().unwrap();
        let crm = Arc::new(FakeCrm::new());
        let pipeline = Pipeline::new(
            tmp.path().join("runs"),
            tmp.path().join("filestore"),
            crm,
            Arc::new(StubPortal::with_estimate_no("EST-7731")),
            Notifier::disabled(),
        );

        let result = pipeline.run(&sample_job("J-20260805-005"));
        assert!(result.ok);
        // The SOF text carries no estimate-number line, so extraction degrades
        // to the portal-reported number.
        let estimate = result.estimate.unwrap();
        assert_eq!(estimate.estimate_no, "EST-7731");
        assert!(!estimate.estimate_no_found);
        // Not found in the document: the canonical name falls back to the job id.
        assert!(result
            .canonical
            .unwrap()
            .estimate
            .ends_with("Estimate-J-20260805-005.pdf"));
    }
}
