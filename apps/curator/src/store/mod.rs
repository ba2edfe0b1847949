//! File-backed stores. Every document is rewritten whole through a temp file in the
//! same directory and renamed into place, so readers see either the old or the
//! new content, never a torn write.

pub mod catalog;
pub mod cursor;
pub mod session;

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

use crate::errors::AppError;

/// Reads a JSON document. A missing file is `Ok(None)`; a corrupt one is an error.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, AppError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AppError::storage(path)(e)),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(AppError::serialization(path))
}

pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let mut content = serde_json::to_vec_pretty(value).map_err(AppError::serialization(path))?;
    content.push(b'\n');
    write_file_atomic(path, &content)
}

/// Writes `content` to `path` via a synced temp file and rename.
/// Creates the parent directory if needed.
pub fn write_file_atomic(path: &Path, content: &[u8]) -> Result<(), AppError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(AppError::storage(dir))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(AppError::storage(dir))?;
    tmp.write_all(content).map_err(AppError::storage(tmp.path()))?;
    tmp.as_file().sync_all().map_err(AppError::storage(tmp.path()))?;
    tmp.persist(path)
        .map_err(|e| AppError::storage(path)(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_document_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let value: Option<serde_json::Value> = read_json(&dir.path().join("absent.json")).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_write_then_read_creates_parent_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");
        write_json_atomic(&path, &json!({"lastSequence": 12})).unwrap();

        let value: serde_json::Value = read_json(&path).unwrap().unwrap();
        assert_eq!(value["lastSequence"], 12);

        let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("doc.json")]);
    }

    #[test]
    fn test_corrupt_document_is_an_error_not_a_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, "{not json").unwrap();
        let result: Result<Option<serde_json::Value>, _> = read_json(&path);
        assert!(matches!(result, Err(AppError::Serialization { .. })));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{not json");
    }
}
