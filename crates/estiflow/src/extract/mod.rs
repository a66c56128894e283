//! Recovers structured fields from a downloaded estimate PDF. Missing fields
//! degrade to placeholders instead of failing: a partially parsed estimate
//! still gets filed, and the gap shows up downstream as a business concern.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read estimate '{path}': {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse estimate PDF: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateResult {
    /// Vendor-assigned estimate number, or the caller's placeholder when the
    /// document carries none we can recognize.
    pub estimate_no: String,
    /// Whether `estimate_no` was actually found in the document.
    pub estimate_no_found: bool,
    /// Grand total in currency units; `None` when no total line matched.
    pub total: Option<f64>,
    /// Length of the extracted text, kept for diagnosing parser regressions.
    pub raw_len: usize,
}

pub struct EstimateExtractor {
    total_re: Regex,
    estimate_no_re: Regex,
}

impl EstimateExtractor {
    pub fn new() -> Self {
        Self {
            // Thousands separators allowed, exactly two decimals required.
            total_re: Regex::new(r"(?i)Total\s*\$?([0-9][0-9,]*\.[0-9]{2})")
                .expect("hard-coded total pattern compiles"),
            // "Estimate No 12345", "Estimate #: EST-7731" and similar.
            estimate_no_re: Regex::new(r"(?i)Estimate\s*(?:No\.?|#)\s*:?\s*([A-Z0-9][A-Z0-9-]*)")
                .expect("hard-coded estimate-number pattern compiles"),
        }
    }

    /// Parses the PDF at `path`. Only an unreadable or unparseable file is an
    /// error; absent fields degrade (`total: None`, `fallback_no`).
    pub fn extract(&self, path: &Path, fallback_no: &str) -> Result<EstimateResult, ExtractError> {
        let bytes = std::fs::read(path).map_err(|e| ExtractError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let doc = lopdf::Document::load_mem(&bytes)
            .map_err(|e| ExtractError::Parse(e.to_string()))?;

        let mut text = String::new();
        for (page_num, _) in doc.get_pages() {
            if let Ok(page_text) = doc.extract_text(&[page_num]) {
                text.push_str(&page_text);
                text.push('\n');
            }
        }

        let result = self.extract_from_text(&text, fallback_no);
        debug!(
            raw_len = result.raw_len,
            total_found = result.total.is_some(),
            estimate_no_found = result.estimate_no_found,
            "estimate parsed"
        );
        Ok(result)
    }

    /// Pattern matching over already-extracted text.
    pub fn extract_from_text(&self, text: &str, fallback_no: &str) -> EstimateResult {
        let total = self
            .total_re
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok());

        let (estimate_no, estimate_no_found) = match self
            .estimate_no_re
            .captures(text)
            .and_then(|c| c.get(1))
        {
            Some(m) => (m.as_str().to_string(), true),
            None => (fallback_no.to_string(), false),
        };

        EstimateResult {
            estimate_no,
            estimate_no_found,
            total,
            raw_len: text.len(),
        }
    }
}

impl Default for EstimateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_with_thousands_separator() {
        let extractor = EstimateExtractor::new();
        let result = extractor.extract_from_text(
            "Estimate No: EST-7731\nSubtotal $11,000.00\nTotal $12,345.67\n",
            "EST-FALLBACK",
        );
        assert_eq!(result.total, Some(12345.67));
        assert_eq!(result.estimate_no, "EST-7731");
        assert!(result.estimate_no_found);
    }

    #[test]
    fn test_total_case_insensitive_without_dollar() {
        let extractor = EstimateExtractor::new();
        let result = extractor.extract_from_text("TOTAL 980.00", "X");
        assert_eq!(result.total, Some(980.0));
    }

    #[test]
    fn test_missing_total_is_none_not_error() {
        let extractor = EstimateExtractor::new();
        let result = extractor.extract_from_text("No totals to see here", "EST-FALLBACK");
        assert_eq!(result.total, None);
        assert_eq!(result.estimate_no, "EST-FALLBACK");
        assert!(!result.estimate_no_found);
        assert_eq!(result.raw_len, "No totals to see here".len());
    }

    #[test]
    fn test_total_requires_two_decimals() {
        let extractor = EstimateExtractor::new();
        assert_eq!(extractor.extract_from_text("Total $12", "X").total, None);
        assert_eq!(extractor.extract_from_text("Total $12.5", "X").total, None);
        assert_eq!(
            extractor.extract_from_text("Total $12.50", "X").total,
            Some(12.5)
        );
    }

    #[test]
    fn test_estimate_number_variants() {
        let extractor = EstimateExtractor::new();
        assert_eq!(
            extractor.extract_from_text("Estimate # EST-1001", "X").estimate_no,
            "EST-1001"
        );
        assert_eq!(
            extractor.extract_from_text("estimate no. 44812", "X").estimate_no,
            "44812"
        );
        assert_eq!(
            extractor
                .extract_from_text("ESTIMATE NO: Q-2026-0042", "X")
                .estimate_no,
            "Q-2026-0042"
        );
    }

    #[test]
    fn test_extract_reads_generated_pdf() {
        use crate::job::spec::{Customer, JobSpec, LineItem, Project, ProjectSource};
        use crate::sof::SofGenerator;

        // Render a document whose spec column carries an estimate footer, then
        // round-trip it through the extractor.
        let job = JobSpec {
            job_id: "J-20260805-002".to_string(),
            customer: Customer {
                name: "Acme".to_string(),
                email: None,
                phone: None,
                address: None,
                crm_key: None,
                metadata: None,
            },
            project: Project {
                site: "Site".to_string(),
                due_date: None,
                source: ProjectSource::Manual,
            },
            line_items: vec![LineItem {
                room: "Estimate No: EST-9004".to_string(),
                opening: "-".to_string(),
                size: "-".to_string(),
                qty: 1,
                spec: "Total $12,345.67".to_string(),
                price: None,
            }],
            attachments: None,
            tags: None,
        };
        let bytes = SofGenerator::new().render(&job).unwrap();

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("Estimate.pdf");
        std::fs::write(&path, &bytes).unwrap();

        let result = EstimateExtractor::new()
            .extract(&path, "EST-FALLBACK")
            .unwrap();
        assert_eq!(result.total, Some(12345.67));
        assert_eq!(result.estimate_no, "EST-9004");
        assert!(result.raw_len > 0);
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let missing = tmp.path().join("absent.pdf");
        let err = EstimateExtractor::new()
            .extract(&missing, "X")
            .unwrap_err();
        assert!(matches!(err, ExtractError::Read { .. }));
    }

    #[test]
    fn test_garbage_bytes_are_a_parse_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("junk.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();
        let err = EstimateExtractor::new().extract(&path, "X").unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }
}
