//! Atomic file placement. Canonical copies are shared with humans and other
//! systems, so a destination is never visible in a half-written state: all
//! writes go to a temporary sibling first and are renamed into place.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;
use crate::store::paths::{canonical_paths, CanonicalPaths};

pub struct ArtifactStore {
    filestore_root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(filestore_root: P) -> Self {
        Self {
            filestore_root: filestore_root.as_ref().to_path_buf(),
        }
    }

    pub fn filestore_root(&self) -> &Path {
        &self.filestore_root
    }

    pub fn canonical_paths(
        &self,
        job_id: &str,
        customer_name: &str,
        estimate_no: Option<&str>,
    ) -> CanonicalPaths {
        canonical_paths(&self.filestore_root, job_id, customer_name, estimate_no)
    }
}

/// Copies `src` over `dest`, creating parent directories. The copy lands in a
/// temporary sibling and is renamed into place, so `dest` is either absent,
/// the previous intact version, or the complete new version. Calling twice
/// with identical content is a no-op overwrite.
pub fn save_artifact(src: &Path, dest: &Path) -> Result<PathBuf, StorageError> {
    ensure_parent(dest)?;
    let tmp = temp_sibling(dest);

    if let Err(e) = std::fs::copy(src, &tmp) {
        let _ = std::fs::remove_file(&tmp);
        return Err(StorageError::CopyFile {
            from: src.to_path_buf(),
            to: dest.to_path_buf(),
            source: e,
        });
    }

    if let Err(e) = sync_file(&tmp).and_then(|_| std::fs::rename(&tmp, dest)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(StorageError::CopyFile {
            from: src.to_path_buf(),
            to: dest.to_path_buf(),
            source: e,
        });
    }

    Ok(dest.to_path_buf())
}

/// Writes raw bytes with the same temp-then-rename discipline.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    ensure_parent(path)?;
    let tmp = temp_sibling(path);

    let result = std::fs::File::create(&tmp)
        .and_then(|mut f| f.write_all(bytes).and_then(|_| f.sync_all()))
        .and_then(|_| std::fs::rename(&tmp, path));

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        });
    }
    Ok(())
}

/// Writes a serializable record as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Encode {
        path: path.to_path_buf(),
        source: e,
    })?;
    write_bytes(path, &bytes)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let bytes = std::fs::read(path).map_err(|e| StorageError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| StorageError::Decode {
        path: path.to_path_buf(),
        source: e,
    })
}

fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

fn temp_sibling(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    dest.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}

fn sync_file(path: &Path) -> std::io::Result<()> {
    std::fs::File::open(path)?.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_artifact_copies_and_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.pdf");
        std::fs::write(&src, b"%PDF-1.5 payload").unwrap();

        let dest = tmp.path().join("2026/acme-J-1/SOF-J-1.pdf");
        let placed = save_artifact(&src, &dest).unwrap();

        assert_eq!(placed, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.5 payload");
    }

    #[test]
    fn test_save_artifact_idempotent_overwrite() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.pdf");
        std::fs::write(&src, b"same content").unwrap();
        let dest = tmp.path().join("out/copy.pdf");

        save_artifact(&src, &dest).unwrap();
        save_artifact(&src, &dest).unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"same content");
    }

    #[test]
    fn test_failed_copy_leaves_no_destination() {
        let tmp = TempDir::new().unwrap();
        let missing_src = tmp.path().join("nope.pdf");
        let dest = tmp.path().join("out/copy.pdf");

        let err = save_artifact(&missing_src, &dest).unwrap_err();
        assert!(matches!(err, StorageError::CopyFile { .. }));
        assert!(!dest.exists());
        // No temp droppings either
        let leftovers: Vec<_> = std::fs::read_dir(dest.parent().unwrap())
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_failed_copy_preserves_prior_version() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.pdf");
        std::fs::write(&src, b"version one").unwrap();
        let dest = tmp.path().join("out/copy.pdf");
        save_artifact(&src, &dest).unwrap();

        // Interrupt the second copy by removing the source
        std::fs::remove_file(&src).unwrap();
        assert!(save_artifact(&src, &dest).is_err());

        assert_eq!(std::fs::read(&dest).unwrap(), b"version one");
    }

    #[test]
    fn test_write_json_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs/record.json");
        write_json(&path, &serde_json::json!({"ok": true, "n": 3})).unwrap();

        let back: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(back["ok"], true);
        assert_eq!(back["n"], 3);
    }

    #[test]
    fn test_read_json_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = read_json::<serde_json::Value>(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StorageError::ReadFile { .. }));
    }
}
