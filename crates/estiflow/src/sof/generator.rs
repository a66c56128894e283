//! Statement-of-Facts renderer: a fixed-layout, paginated PDF built strictly
//! from job fields. No network, no filesystem. Repeated calls on the same job
//! produce identical page content; only the Info dictionary's CreationDate
//! differs, which is why content comparison goes through `fingerprint`.

use chrono::Utc;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::job::spec::JobSpec;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Required field '{0}' is empty")]
    MissingField(&'static str),

    #[error("Job has no line items")]
    NoLineItems,

    #[error("Failed to encode PDF content: {0}")]
    Encode(String),
}

const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN_LEFT: i64 = 72;
const TOP_BASELINE: i64 = 720;
const FONT_SIZE: i64 = 11;
const LEADING: i64 = 14;
const LINES_PER_PAGE: usize = 46;

#[derive(Debug, Default)]
pub struct SofGenerator;

impl SofGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Renders the SOF PDF bytes for `job`.
    pub fn render(&self, job: &JobSpec) -> Result<Vec<u8>, TemplateError> {
        let lines = self.layout(job)?;

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for chunk in lines.chunks(LINES_PER_PAGE) {
            let content = page_content(chunk);
            let encoded = content
                .encode()
                .map_err(|e| TemplateError::Encode(e.to_string()))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let page_count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Producer" => Object::string_literal("estiflow"),
            "CreationDate" => Object::string_literal(
                format!("D:{}Z", Utc::now().format("%Y%m%d%H%M%S"))
            ),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| TemplateError::Encode(e.to_string()))?;
        Ok(out)
    }

    /// Content hash of the laid-out text, excluding the embedded timestamp.
    /// Two renders of the same job always fingerprint equal.
    pub fn fingerprint(&self, job: &JobSpec) -> Result<String, TemplateError> {
        let lines = self.layout(job)?;
        let mut hasher = Sha256::new();
        for line in &lines {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    fn layout(&self, job: &JobSpec) -> Result<Vec<String>, TemplateError> {
        if job.job_id.trim().is_empty() {
            return Err(TemplateError::MissingField("job_id"));
        }
        if job.customer.name.trim().is_empty() {
            return Err(TemplateError::MissingField("customer.name"));
        }
        if job.project.site.trim().is_empty() {
            return Err(TemplateError::MissingField("project.site"));
        }
        if job.line_items.is_empty() {
            return Err(TemplateError::NoLineItems);
        }

        let mut lines = Vec::new();
        lines.push("STATEMENT OF FACTS".to_string());
        lines.push(format!("Job {}", job.job_id));
        lines.push(String::new());

        match job.customer.email.as_deref() {
            Some(email) if !email.is_empty() => {
                lines.push(format!("Customer: {} <{}>", job.customer.name, email))
            }
            _ => lines.push(format!("Customer: {}", job.customer.name)),
        }
        lines.push(format!("Site: {}", job.project.site));
        if let Some(due) = job.project.due_date.as_deref() {
            lines.push(format!("Due: {}", due));
        }
        lines.push(String::new());

        lines.push(format!(
            "{:<14} {:<10} {:<10} {:>4}  {:<24} {:>10}",
            "Room", "Opening", "Size", "Qty", "Spec", "Price"
        ));
        lines.push("-".repeat(78));
        for item in &job.line_items {
            let price = item
                .price
                .map(|p| format!("{:.2}", p))
                .unwrap_or_else(|| "-".to_string());
            lines.push(format!(
                "{:<14} {:<10} {:<10} {:>4}  {:<24} {:>10}",
                item.room, item.opening, item.size, item.qty, item.spec, price
            ));
        }

        if let Some(tags) = job.tags.as_deref() {
            if !tags.is_empty() {
                lines.push(String::new());
                lines.push(format!("Tags: {}", tags.join(", ")));
            }
        }

        Ok(lines)
    }
}

fn page_content(lines: &[String]) -> Content {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
        Operation::new("TL", vec![LEADING.into()]),
        Operation::new("Td", vec![MARGIN_LEFT.into(), TOP_BASELINE.into()]),
    ];
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(line.as_str())],
        ));
    }
    operations.push(Operation::new("ET", vec![]));
    Content { operations }
}
