//! Deterministic in-memory CRM used by tests and by `driver = "stub"`
//! deployments that have no live CRM wired up yet.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::crm::{
    ContactInfo, CrmError, CrmGateway, CustomerDetail, CustomerSummary, OpportunityRecord,
};
use crate::job::spec::JobSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    Unavailable,
    InvalidCustomerKey,
}

#[derive(Default)]
struct FakeState {
    opportunities: HashMap<String, OpportunityRecord>,
    create_calls: usize,
    next_fail: Option<FakeFailure>,
}

pub struct FakeCrm {
    customers: HashMap<String, CustomerDetail>,
    state: Mutex<FakeState>,
}

impl FakeCrm {
    pub fn new() -> Self {
        Self {
            customers: HashMap::new(),
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn with_sample_customers() -> Self {
        let mut fake = Self::new();
        fake.customers.insert(
            "AB-12345".to_string(),
            CustomerDetail {
                crm_key: "AB-12345".to_string(),
                company_name: "Acme Builders Ltd.".to_string(),
                primary_contact: Some(ContactInfo {
                    name: "Jane Li".to_string(),
                    email: Some("jane@acme.com".to_string()),
                }),
                billing_address: Some(serde_json::json!({
                    "line1": "1 Main St",
                    "city": "Toronto"
                })),
                discount_policy: Some(serde_json::json!({
                    "type": "tiered",
                    "tier": "Gold",
                    "percent": 7.5
                })),
                udf: Some(serde_json::json!({"TaxExempt": false})),
            },
        );
        fake
    }

    pub fn with_customer(mut self, detail: CustomerDetail) -> Self {
        self.customers.insert(detail.crm_key.clone(), detail);
        self
    }

    /// Arms the next gateway call to fail.
    pub fn fail_next(&self, failure: FakeFailure) {
        self.state.lock().expect("fake crm lock").next_fail = Some(failure);
    }

    /// How many times an opportunity was actually created (reuse excluded).
    pub fn create_count(&self) -> usize {
        self.state.lock().expect("fake crm lock").create_calls
    }

    pub fn opportunity_for(&self, job_id: &str) -> Option<OpportunityRecord> {
        self.state
            .lock()
            .expect("fake crm lock")
            .opportunities
            .get(job_id)
            .cloned()
    }

    fn take_failure(&self, state: &mut FakeState) -> Option<CrmError> {
        match state.next_fail.take() {
            Some(FakeFailure::Unavailable) => {
                Some(CrmError::Unavailable("stub CRM armed to fail".to_string()))
            }
            Some(FakeFailure::InvalidCustomerKey) => {
                Some(CrmError::InvalidCustomerKey("armed".to_string()))
            }
            None => None,
        }
    }
}

impl Default for FakeCrm {
    fn default() -> Self {
        Self::new()
    }
}

impl CrmGateway for FakeCrm {
    fn create_opportunity(&self, job: &JobSpec) -> Result<OpportunityRecord, CrmError> {
        let mut state = self.state.lock().expect("fake crm lock");
        if let Some(err) = self.take_failure(&mut state) {
            return Err(err);
        }

        if let Some(key) = job.customer.crm_key.as_deref() {
            if !self.customers.contains_key(key) {
                return Err(CrmError::InvalidCustomerKey(key.to_string()));
            }
        }

        if let Some(existing) = state.opportunities.get(&job.job_id) {
            let mut reused = existing.clone();
            reused.created = false;
            return Ok(reused);
        }

        state.create_calls += 1;
        let record = OpportunityRecord {
            opportunity_key: format!("OPP-{:04}", state.create_calls),
            entry_key: job.customer.crm_key.clone(),
            created: true,
        };
        state
            .opportunities
            .insert(job.job_id.clone(), record.clone());
        Ok(record)
    }

    fn search_customer(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CustomerSummary>, CrmError> {
        let mut state = self.state.lock().expect("fake crm lock");
        if let Some(err) = self.take_failure(&mut state) {
            return Err(err);
        }
        drop(state);

        let needle = query.to_lowercase();
        let mut hits: Vec<CustomerSummary> = self
            .customers
            .values()
            .filter(|c| c.company_name.to_lowercase().contains(&needle))
            .map(|c| CustomerSummary {
                name: c.company_name.clone(),
                city: c
                    .billing_address
                    .as_ref()
                    .and_then(|a| a.get("city"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
                phone: None,
                crm_key: c.crm_key.clone(),
            })
            .collect();
        hits.sort_by(|a, b| a.crm_key.cmp(&b.crm_key));
        hits.truncate(limit);
        Ok(hits)
    }

    fn get_customer(&self, key: &str) -> Result<CustomerDetail, CrmError> {
        let mut state = self.state.lock().expect("fake crm lock");
        if let Some(err) = self.take_failure(&mut state) {
            return Err(err);
        }
        drop(state);

        self.customers
            .get(key)
            .cloned()
            .ok_or_else(|| CrmError::InvalidCustomerKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::spec::{Customer, Project, ProjectSource};

    fn job(job_id: &str, crm_key: Option<&str>) -> JobSpec {
        JobSpec {
            job_id: job_id.to_string(),
            customer: Customer {
                name: "Acme Builders Ltd.".to_string(),
                email: None,
                phone: None,
                address: None,
                crm_key: crm_key.map(|k| k.to_string()),
                metadata: None,
            },
            project: Project {
                site: "Site".to_string(),
                due_date: None,
                source: ProjectSource::Manual,
            },
            line_items: vec![],
            attachments: None,
            tags: None,
        }
    }

    #[test]
    fn test_create_is_idempotent_per_job_id() {
        let crm = FakeCrm::with_sample_customers();
        let first = crm.create_opportunity(&job("J-1", Some("AB-12345"))).unwrap();
        let second = crm.create_opportunity(&job("J-1", Some("AB-12345"))).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.opportunity_key, second.opportunity_key);
        assert_eq!(crm.create_count(), 1);
    }

    #[test]
    fn test_distinct_jobs_get_distinct_opportunities() {
        let crm = FakeCrm::new();
        let a = crm.create_opportunity(&job("J-1", None)).unwrap();
        let b = crm.create_opportunity(&job("J-2", None)).unwrap();
        assert_ne!(a.opportunity_key, b.opportunity_key);
        assert_eq!(crm.create_count(), 2);
    }

    #[test]
    fn test_unknown_crm_key_rejected() {
        let crm = FakeCrm::new();
        let err = crm.create_opportunity(&job("J-1", Some("NOPE"))).unwrap_err();
        assert!(matches!(err, CrmError::InvalidCustomerKey(_)));
    }

    #[test]
    fn test_armed_failure_fires_once() {
        let crm = FakeCrm::new();
        crm.fail_next(FakeFailure::Unavailable);
        assert!(matches!(
            crm.create_opportunity(&job("J-1", None)).unwrap_err(),
            CrmError::Unavailable(_)
        ));
        assert!(crm.create_opportunity(&job("J-1", None)).is_ok());
    }

    #[test]
    fn test_search_matches_case_insensitively() {
        let crm = FakeCrm::with_sample_customers();
        let hits = crm.search_customer("acme", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].crm_key, "AB-12345");
        assert_eq!(hits[0].city.as_deref(), Some("Toronto"));

        assert!(crm.search_customer("unknown co", 10).unwrap().is_empty());
    }

    #[test]
    fn test_get_customer_unknown_key() {
        let crm = FakeCrm::with_sample_customers();
        assert!(crm.get_customer("AB-12345").is_ok());
        assert!(matches!(
            crm.get_customer("ZZ-0").unwrap_err(),
            CrmError::InvalidCustomerKey(_)
        ));
    }
}
