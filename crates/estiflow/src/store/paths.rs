//! Path derivation for the per-job working directory and the canonical
//! long-term store. `canonical_paths` is a pure function so callers can plan
//! destinations before any file exists.

use std::path::{Path, PathBuf};

use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::job::id::job_year;

/// Canonical layout: `<root>/<year>/<customer-slug>-<job_id>/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalPaths {
    pub root: PathBuf,
    pub sof: PathBuf,
    pub estimate: PathBuf,
}

/// Private working directory for one job.
pub fn job_dir(run_root: &Path, job_id: &str) -> PathBuf {
    run_root.join(format!("job-{job_id}"))
}

/// The working-directory skeleton the pipeline relies on.
#[derive(Debug, Clone)]
pub struct JobDirs {
    pub base: PathBuf,
    pub inputs: PathBuf,
    pub logs: PathBuf,
    pub outputs: PathBuf,
}

pub fn ensure_job_dirs(run_root: &Path, job_id: &str) -> Result<JobDirs, StorageError> {
    let base = job_dir(run_root, job_id);
    let dirs = JobDirs {
        inputs: base.join("inputs"),
        logs: base.join("logs"),
        outputs: base.join("outputs"),
        base,
    };
    for dir in [&dirs.inputs, &dirs.logs, &dirs.outputs] {
        std::fs::create_dir_all(dir).map_err(|e| StorageError::CreateDirectory {
            path: dir.clone(),
            source: e,
        })?;
    }
    Ok(dirs)
}

/// Derives the canonical artifact locations. The year segment comes from the
/// date embedded in the job id; ids without one fall back to the current year.
/// No I/O: identical inputs always produce identical paths.
pub fn canonical_paths(
    filestore_root: &Path,
    job_id: &str,
    customer_name: &str,
    estimate_no: Option<&str>,
) -> CanonicalPaths {
    let year = job_year(job_id).unwrap_or_else(|| Local::now().year());
    let root = filestore_root
        .join(year.to_string())
        .join(format!("{}-{}", slugify(customer_name), job_id));
    let sof = root.join(format!("SOF-{job_id}.pdf"));
    let estimate = match estimate_no {
        Some(no) if !no.is_empty() => root.join(format!("Estimate-{no}.pdf")),
        _ => root.join(format!("Estimate-{job_id}.pdf")),
    };
    CanonicalPaths { root, sof, estimate }
}

/// Filesystem-safe lowercase slug: alphanumerics kept, runs of anything else
/// collapsed to single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Acme Builders Ltd."), "acme-builders-ltd");
        assert_eq!(slugify("  A & B  Co "), "a-b-co");
        assert_eq!(slugify("Already-slugged"), "already-slugged");
        assert_eq!(slugify("Ünïcode Café"), "n-code-caf");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_canonical_paths_layout() {
        let paths = canonical_paths(
            Path::new("/filestore"),
            "J-20260805-001",
            "Acme Builders Ltd.",
            Some("EST-7731"),
        );
        assert_eq!(
            paths.root,
            Path::new("/filestore/2026/acme-builders-ltd-J-20260805-001")
        );
        assert_eq!(
            paths.sof,
            paths.root.join("SOF-J-20260805-001.pdf")
        );
        assert_eq!(paths.estimate, paths.root.join("Estimate-EST-7731.pdf"));
    }

    #[test]
    fn test_canonical_paths_deterministic() {
        let a = canonical_paths(Path::new("/fs"), "J-20250101-009", "Acme", None);
        let b = canonical_paths(Path::new("/fs"), "J-20250101-009", "Acme", None);
        assert_eq!(a, b);
        assert_eq!(a.estimate, a.root.join("Estimate-J-20250101-009.pdf"));
    }

    #[test]
    fn test_canonical_paths_year_from_job_id() {
        let paths = canonical_paths(Path::new("/fs"), "J-19991231-042", "Acme", None);
        assert!(paths.root.starts_with("/fs/1999"));
    }

    #[test]
    fn test_canonical_paths_empty_estimate_no_falls_back() {
        let paths = canonical_paths(Path::new("/fs"), "J-20260805-001", "Acme", Some(""));
        assert_eq!(paths.estimate, paths.root.join("Estimate-J-20260805-001.pdf"));
    }

    #[test]
    fn test_job_dir_is_namespaced() {
        assert_eq!(
            job_dir(Path::new("/runs"), "J-20260805-001"),
            Path::new("/runs/job-J-20260805-001")
        );
    }

    #[test]
    fn test_ensure_job_dirs_creates_skeleton() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dirs = ensure_job_dirs(tmp.path(), "J-20260805-001").unwrap();
        assert!(dirs.inputs.is_dir());
        assert!(dirs.logs.is_dir());
        assert!(dirs.outputs.is_dir());
        assert!(dirs.base.ends_with("job-J-20260805-001"));
    }
}
