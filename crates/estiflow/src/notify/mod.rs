//! Best-effort notifications once an estimate is durably produced. A failed
//! delivery is logged and surfaced as a warning on the run; it never fails
//! the pipeline, because the opportunity and the artifacts already exist.

pub mod email;
pub mod kanban;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::NotificationConfig;
use crate::extract::EstimateResult;
use crate::job::spec::JobSpec;

pub use email::{render_summary, FakeMailer, Mailer, SmtpMailer, SummaryContext};
pub use kanban::{CardRef, FakeBoard, KanbanBoard, TrelloBoard};

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Email transport failed: {0}")]
    Smtp(String),

    #[error("Invalid mail address '{0}'")]
    Address(String),

    #[error("Kanban request failed: {0}")]
    Kanban(String),

    #[error("Notification misconfigured: {0}")]
    Config(String),
}

/// Per-run record of what the notifier managed to deliver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyOutcome {
    pub emailed: bool,
    #[serde(default)]
    pub card: Option<CardRef>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

pub struct Notifier {
    mailer: Option<Arc<dyn Mailer>>,
    board: Option<Arc<dyn KanbanBoard>>,
    fallback_to: String,
}

impl Notifier {
    /// A notifier with both channels switched off.
    pub fn disabled() -> Self {
        Self {
            mailer: None,
            board: None,
            fallback_to: default_fallback_to(),
        }
    }

    pub fn new(mailer: Option<Arc<dyn Mailer>>, board: Option<Arc<dyn KanbanBoard>>) -> Self {
        Self {
            mailer,
            board,
            fallback_to: default_fallback_to(),
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Result<Self, DeliveryError> {
        let mailer: Option<Arc<dyn Mailer>> = if config.email.enabled {
            Some(Arc::new(SmtpMailer::new(&config.email)?))
        } else {
            None
        };
        let board: Option<Arc<dyn KanbanBoard>> = if config.kanban.enabled {
            Some(Arc::new(TrelloBoard::new(&config.kanban)?))
        } else {
            None
        };
        Ok(Self::new(mailer, board))
    }

    pub fn is_enabled(&self) -> bool {
        self.mailer.is_some() || self.board.is_some()
    }

    /// Fire-and-forget delivery. Failures land in the outcome's warnings.
    pub fn notify(
        &self,
        job: &JobSpec,
        estimate: &EstimateResult,
        attachment: Option<&Path>,
    ) -> NotifyOutcome {
        let mut outcome = NotifyOutcome::default();

        if let Some(mailer) = self.mailer.as_deref() {
            let to = job
                .customer
                .email
                .as_deref()
                .unwrap_or(&self.fallback_to);
            let subject = format!("Estimate {}", estimate.estimate_no);
            let html = render_summary(&SummaryContext {
                customer: job.customer.name.clone(),
                estimate_no: estimate.estimate_no.clone(),
                total: estimate.total,
            });
            let attachments: Vec<&Path> = attachment.into_iter().collect();

            match mailer.deliver(to, &subject, &html, &attachments) {
                Ok(()) => outcome.emailed = true,
                Err(e) => {
                    warn!(job_id = %job.job_id, error = %e, "estimate email not delivered");
                    outcome.warnings.push(format!("email delivery failed: {e}"));
                }
            }
        }

        if let Some(board) = self.board.as_deref() {
            let name = format!("Estimate {} / {}", estimate.estimate_no, job.customer.name);
            match board.create_card(&name, "Automated estimate") {
                Ok(card) => {
                    if let Some(path) = attachment {
                        let url = format!("file://{}", path.display());
                        if let Err(e) = board.attach_url(&card, &url, Some("Estimate")) {
                            warn!(job_id = %job.job_id, error = %e, "estimate not attached to card");
                            outcome.warnings.push(format!("card attachment failed: {e}"));
                        }
                    }
                    outcome.card = Some(card);
                }
                Err(e) => {
                    warn!(job_id = %job.job_id, error = %e, "tracking card not created");
                    outcome.warnings.push(format!("kanban card failed: {e}"));
                }
            }
        }

        outcome
    }
}

fn default_fallback_to() -> String {
    "ops@example.com".to_string()
}
