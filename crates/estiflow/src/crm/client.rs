//! HTTP CRM gateway. The vendor exposes a JSON API; this client keeps the
//! surface to the three calls the rest of the system needs and tags every
//! created opportunity with the job id so a retry can find it again.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::CrmConfig;
use crate::crm::{CrmError, CrmGateway, CustomerDetail, CustomerSummary, OpportunityRecord};
use crate::job::spec::JobSpec;

pub struct HttpCrmGateway {
    client: reqwest::blocking::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct OpportunityDto {
    key: String,
    #[serde(default)]
    entry_key: Option<String>,
}

impl HttpCrmGateway {
    pub fn new(config: &CrmConfig) -> Result<Self, CrmError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(pat) = config.pat.as_deref() {
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {pat}"))
                .map_err(|e| CrmError::Unavailable(format!("invalid access token: {e}")))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| CrmError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CrmError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .map_err(transport_error)?;
        decode(response)
    }

    /// Finds the opportunity previously tagged with this job id, if any.
    fn find_by_tag(&self, tag: &str) -> Result<Option<OpportunityDto>, CrmError> {
        let found: Vec<OpportunityDto> =
            self.get_json("/opportunities", &[("tag", tag), ("limit", "1")])?;
        Ok(found.into_iter().next())
    }
}

impl CrmGateway for HttpCrmGateway {
    fn create_opportunity(&self, job: &JobSpec) -> Result<OpportunityRecord, CrmError> {
        // Resolve the customer key up front so a bad key fails loudly instead
        // of producing an orphaned opportunity.
        if let Some(key) = job.customer.crm_key.as_deref() {
            self.get_customer(key)?;
        }

        let tag = job.idempotency_tag();
        if let Some(existing) = self.find_by_tag(&tag)? {
            info!(job_id = %job.job_id, opportunity = %existing.key, "reusing tagged opportunity");
            return Ok(OpportunityRecord {
                opportunity_key: existing.key,
                entry_key: existing.entry_key,
                created: false,
            });
        }

        let payload = json!({
            "entry_key": job.customer.crm_key,
            "title": format!("Estimate for {}", job.customer.name),
            "site": job.project.site,
            "due_date": job.project.due_date,
            "tags": [tag],
            "line_count": job.line_items.len(),
        });

        let response = self
            .client
            .post(format!("{}/opportunities", self.base_url))
            .json(&payload)
            .send()
            .map_err(transport_error)?;
        let dto: OpportunityDto = decode(response)?;

        debug!(job_id = %job.job_id, opportunity = %dto.key, "opportunity created");
        Ok(OpportunityRecord {
            opportunity_key: dto.key,
            entry_key: dto.entry_key.or_else(|| job.customer.crm_key.clone()),
            created: true,
        })
    }

    fn search_customer(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CustomerSummary>, CrmError> {
        self.get_json(
            "/customers",
            &[("q", query), ("limit", &limit.to_string())],
        )
    }

    fn get_customer(&self, key: &str) -> Result<CustomerDetail, CrmError> {
        let response = self
            .client
            .get(format!("{}/customers/{}", self.base_url, key))
            .send()
            .map_err(transport_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CrmError::InvalidCustomerKey(key.to_string()));
        }
        decode(response)
    }
}

fn transport_error(e: reqwest::Error) -> CrmError {
    if e.is_timeout() || e.is_connect() {
        CrmError::Unavailable(e.to_string())
    } else {
        CrmError::Api {
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            body: e.to_string(),
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::blocking::Response,
) -> Result<T, CrmError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(CrmError::Api {
            status: status.as_u16(),
            body,
        });
    }
    response.json().map_err(|e| CrmError::Decode(e.to_string()))
}
