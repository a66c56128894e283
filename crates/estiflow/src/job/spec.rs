//! The immutable pipeline input. `job_id` is the idempotency key: assigned
//! exactly once, never mutated, and every derived artifact is namespaced by it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentKind {
    #[serde(rename = "SOF")]
    Sof,
    Plans,
    Photos,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub path: String,
}

/// One room/opening line. Order is meaningful and duplicates are allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub room: String,
    pub opening: String,
    pub size: String,
    #[serde(default = "default_qty")]
    pub qty: u32,
    pub spec: String,
    #[serde(default)]
    pub price: Option<f64>,
}

fn default_qty() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<serde_json::Value>,
    /// Key of an existing CRM entry this customer maps to, if known.
    #[serde(default)]
    pub crm_key: Option<String>,
    /// Discount/tax metadata carried through from the CRM.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectSource {
    #[default]
    Manual,
    Uploaded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub site: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub source: ProjectSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Idempotency key, format `J-YYYYMMDD-###` or externally assigned.
    pub job_id: String,
    pub customer: Customer,
    pub project: Project,
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl JobSpec {
    /// Tag value used to mark external records created for this job.
    pub fn idempotency_tag(&self) -> String {
        format!("job:{}", self.job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "job_id": "J-20260805-001",
            "customer": {"name": "Acme Builders Ltd.", "email": "jane@acme.com", "crm_key": "AB-12345"},
            "project": {"site": "123 Industrial Rd", "source": "manual"},
            "line_items": [
                {"room": "Warehouse", "opening": "dock", "size": "10x10", "spec": "PVC liner"},
                {"room": "Warehouse", "opening": "door", "size": "12x14", "qty": 2, "spec": "PVC liner", "price": 1450.0}
            ],
            "tags": ["reline"]
        }"#
    }

    #[test]
    fn test_jobspec_round_trip() {
        let spec: JobSpec = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(spec.job_id, "J-20260805-001");
        assert_eq!(spec.line_items.len(), 2);
        assert_eq!(spec.line_items[0].qty, 1, "qty defaults to 1");
        assert_eq!(spec.line_items[1].qty, 2);
        assert_eq!(spec.project.source, ProjectSource::Manual);

        let back: JobSpec = serde_json::from_str(&serde_json::to_string(&spec).unwrap()).unwrap();
        assert_eq!(back.customer.crm_key.as_deref(), Some("AB-12345"));
    }

    #[test]
    fn test_attachment_kind_wire_names() {
        let a: Attachment =
            serde_json::from_str(r#"{"kind": "SOF", "path": "/tmp/sof.pdf"}"#).unwrap();
        assert_eq!(a.kind, AttachmentKind::Sof);
        assert!(serde_json::to_string(&a).unwrap().contains("\"SOF\""));
    }

    #[test]
    fn test_idempotency_tag() {
        let spec: JobSpec = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(spec.idempotency_tag(), "job:J-20260805-001");
    }
}
