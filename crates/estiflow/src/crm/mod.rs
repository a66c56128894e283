pub mod client;
pub mod fake;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::CrmConfig;
use crate::config::DriverKind;
use crate::job::spec::JobSpec;

pub use client::HttpCrmGateway;
pub use fake::{FakeCrm, FakeFailure};

#[derive(Error, Debug)]
pub enum CrmError {
    #[error("CRM unreachable: {0}")]
    Unavailable(String),

    #[error("Customer key '{0}' could not be resolved")]
    InvalidCustomerKey(String),

    #[error("CRM request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to decode CRM response: {0}")]
    Decode(String),
}

/// Sales opportunity created (or found) for a job. One job maps to at most
/// one record; `created` is false when an existing record was reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunityRecord {
    pub opportunity_key: String,
    #[serde(default)]
    pub entry_key: Option<String>,
    #[serde(default)]
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub crm_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetail {
    pub crm_key: String,
    pub company_name: String,
    #[serde(default)]
    pub primary_contact: Option<ContactInfo>,
    #[serde(default)]
    pub billing_address: Option<serde_json::Value>,
    #[serde(default)]
    pub discount_policy: Option<serde_json::Value>,
    #[serde(default)]
    pub udf: Option<serde_json::Value>,
}

/// CRM boundary. `create_opportunity` must be idempotent per job id: calling
/// it twice never yields two records.
pub trait CrmGateway: Send + Sync {
    fn create_opportunity(&self, job: &JobSpec) -> Result<OpportunityRecord, CrmError>;

    fn search_customer(&self, query: &str, limit: usize)
        -> Result<Vec<CustomerSummary>, CrmError>;

    fn get_customer(&self, key: &str) -> Result<CustomerDetail, CrmError>;
}

/// Builds the configured gateway implementation.
pub fn gateway_from_config(
    config: &CrmConfig,
) -> Result<std::sync::Arc<dyn CrmGateway>, CrmError> {
    match config.driver {
        DriverKind::Http => Ok(std::sync::Arc::new(HttpCrmGateway::new(config)?)),
        DriverKind::Stub => Ok(std::sync::Arc::new(FakeCrm::with_sample_customers())),
    }
}
