//! Job id assignment. Ids look like `J-20260805-001`: the capture date plus a
//! per-installation sequence kept in a counter file under the run root.

use std::path::Path;

use chrono::{Datelike, Local, NaiveDate};

use crate::error::StorageError;

const COUNTER_FILE: &str = ".counter";

/// Allocates the next job id. The counter file is created on first use.
pub fn make_job_id(run_root: &Path) -> Result<String, StorageError> {
    let today = Local::now().format("%Y%m%d");
    let counter_path = run_root.join(COUNTER_FILE);

    if let Some(parent) = counter_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let counter = match std::fs::read_to_string(&counter_path) {
        Ok(raw) => raw.trim().parse::<u64>().unwrap_or(0),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
        Err(e) => {
            return Err(StorageError::ReadFile {
                path: counter_path,
                source: e,
            })
        }
    };

    let next = counter + 1;
    std::fs::write(&counter_path, next.to_string()).map_err(|e| StorageError::WriteFile {
        path: counter_path.clone(),
        source: e,
    })?;

    Ok(format!("J-{}-{:03}", today, next))
}

/// Recovers the year embedded in a `J-YYYYMMDD-###` id. Externally assigned
/// ids without a parseable date yield `None`.
pub fn job_year(job_id: &str) -> Option<i32> {
    let date_part = job_id.split('-').nth(1)?;
    if date_part.len() != 8 {
        return None;
    }
    NaiveDate::parse_from_str(date_part, "%Y%m%d")
        .ok()
        .map(|d| d.year())
}
