// ============================================================
// Layer 6: Artifact Store
// ============================================================
// Every file this tool produces (apart from the burn record)
// goes through write_atomic():
//
//   1. create the parent directory if needed
//   2. write into a NamedTempFile in that same directory
//   3. flush, then rename over the destination
//
// A crash or error before step 3 drops the temp file, so the
// destination holds either the previous artifact or the new
// one, never a partial write.

use std::{fs, io::Write, path::Path};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

use crate::domain::label_encoder::LabelEncoder;

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create directory '{}'", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Cannot create temp file in '{}'", dir.display()))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .with_context(|| format!("Cannot write '{}'", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("Cannot move temp file to '{}'", path.display()))?;

    tracing::debug!("Wrote {} bytes to '{}'", bytes.len(), path.display());
    Ok(())
}

pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .with_context(|| format!("Cannot serialise '{}'", path.display()))?;
    write_atomic(path, &json)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Malformed JSON in '{}'", path.display()))
}

// ─── Label encoder ────────────────────────────────────────────────────────────

pub fn save_labels(path: &Path, labels: &LabelEncoder) -> Result<()> {
    write_json_atomic(path, labels)?;
    tracing::info!("Saved {} label classes to '{}'", labels.num_classes(), path.display());
    Ok(())
}

/// Load the persisted class list. An empty list is an error: every
/// consumer indexes into it.
pub fn load_labels(path: &Path) -> Result<LabelEncoder> {
    let labels: LabelEncoder = read_json(path)
        .with_context(|| "Cannot load label encoder. Have you run 'train' first?")?;
    if labels.classes.is_empty() {
        anyhow::bail!("Label encoder '{}' has no classes", path.display());
    }
    Ok(labels)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_creates_parent_and_replaces() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.bin");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");

        // Only the destination remains, no temp files
        let entries = fs::read_dir(dir.path().join("nested")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_labels_round_trip_and_version_is_optional() {
        let dir    = tempfile::tempdir().unwrap();
        let path   = dir.path().join("label_encoder.json");
        let labels = LabelEncoder::fit(["time", "music", "time"]);

        save_labels(&path, &labels).unwrap();
        assert_eq!(load_labels(&path).unwrap(), labels);

        fs::write(&path, r#"{"classes": ["a", "b"]}"#).unwrap();
        let loaded = load_labels(&path).unwrap();
        assert_eq!(loaded.classes, vec!["a", "b"]);
        assert_eq!(loaded.version, 1);
    }

    #[test]
    fn test_empty_or_missing_labels_are_errors() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("label_encoder.json");
        assert!(load_labels(&path).is_err());

        fs::write(&path, r#"{"classes": []}"#).unwrap();
        assert!(load_labels(&path).is_err());

        fs::write(&path, "not json").unwrap();
        assert!(read_json::<LabelEncoder>(&path).is_err());
    }
}
