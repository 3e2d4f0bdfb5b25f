// ============================================================
// Layer 4: JSON Example Loader
// ============================================================
// Loads a labelled dataset from a JSON array on disk:
//
//   [
//     { "text": "What time is it?", "intent": "time" },
//     { "text": "Play some music",  "intent": "music" }
//   ]
//
// Unlike a directory walk, a single malformed file is fatal:
// training on a silently truncated dataset is worse than not
// training at all.

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

use crate::domain::example::Example;
use crate::domain::traits::DatasetSource;

pub struct JsonExampleLoader {
    path: PathBuf,
}

impl JsonExampleLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DatasetSource for JsonExampleLoader {
    fn load_all(&self) -> Result<Vec<Example>> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read dataset '{}'", self.path.display()))?;

        let examples: Vec<Example> = serde_json::from_str(&json)
            .with_context(|| format!("Malformed dataset JSON in '{}'", self.path.display()))?;

        tracing::info!("Loaded {} examples from '{}'", examples.len(), self.path.display());
        Ok(examples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_json_array() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, r#"[{"text":"hi","intent":"greeting"},{"text":"play","intent":"music"}]"#)
            .unwrap();

        let examples = JsonExampleLoader::new(&path).load_all().unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[1].intent, "music");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(JsonExampleLoader::new(dir.path().join("nope.json")).load_all().is_err());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"[{"text":"hi"}]"#).unwrap();
        assert!(JsonExampleLoader::new(&path).load_all().is_err());
    }
}
