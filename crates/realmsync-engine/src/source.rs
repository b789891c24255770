//! Document sources: ordered sequences of desired-state snapshots.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{EngineError, Result};

/// One raw desired-state document, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// Source name used in error reports (usually the file name).
    pub name: String,
    pub body: Value,
}

impl RawDocument {
    pub fn new(name: impl Into<String>, body: Value) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

/// A lazy, ordered, finite, non-restartable sequence of snapshots.
///
/// The engine consumes documents strictly in the order produced here and
/// never reorders or parallelizes across them.
#[async_trait]
pub trait DocumentSource: Send {
    async fn next(&mut self) -> Result<Option<RawDocument>>;
}

/// Reads `.json` snapshot files from a directory, ordered by numeric
/// filename prefix and then by name — the `0_create_realm.json`,
/// `1_update_realm.json` convention of numbered import steps.
pub struct DirectorySource {
    files: std::vec::IntoIter<PathBuf>,
}

impl DirectorySource {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| EngineError::Remote(e.into()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort_by_key(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            (numeric_prefix(&name), name)
        });
        Ok(Self {
            files: files.into_iter(),
        })
    }
}

fn numeric_prefix(name: &str) -> u64 {
    let digits: String = name.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(u64::MAX)
}

#[async_trait]
impl DocumentSource for DirectorySource {
    async fn next(&mut self) -> Result<Option<RawDocument>> {
        let Some(path) = self.files.next() else {
            return Ok(None);
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| EngineError::Remote(e.into()))?;
        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|e| EngineError::malformed(&name, format!("invalid JSON: {e}")))?;
        Ok(Some(RawDocument::new(name, body)))
    }
}

/// In-memory source for tests and embedding.
pub struct VecSource {
    documents: std::vec::IntoIter<RawDocument>,
}

impl VecSource {
    pub fn new(documents: Vec<RawDocument>) -> Self {
        Self {
            documents: documents.into_iter(),
        }
    }

    /// Builds a source from bare JSON bodies, naming them by index.
    pub fn from_bodies(bodies: Vec<Value>) -> Self {
        Self::new(
            bodies
                .into_iter()
                .enumerate()
                .map(|(index, body)| RawDocument::new(format!("snapshot-{index}"), body))
                .collect(),
        )
    }
}

#[async_trait]
impl DocumentSource for VecSource {
    async fn next(&mut self) -> Result<Option<RawDocument>> {
        Ok(self.documents.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_prefix_ordering_key() {
        assert_eq!(numeric_prefix("0_create.json"), 0);
        assert_eq!(numeric_prefix("10_update.json"), 10);
        assert_eq!(numeric_prefix("final.json"), u64::MAX);
    }

    #[tokio::test]
    async fn test_directory_source_orders_by_numeric_prefix() {
        let dir = tempfile::tempdir().unwrap();
        // Written out of order; lexicographic order would put 10 before 2.
        for name in ["10_more.json", "0_create.json", "2_update.json"] {
            std::fs::write(dir.path().join(name), b"{\"realm\": \"acme\"}").unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut source = DirectorySource::new(dir.path()).unwrap();
        let mut names = Vec::new();
        while let Some(doc) = source.next().await.unwrap() {
            names.push(doc.name);
        }
        assert_eq!(names, vec!["0_create.json", "2_update.json", "10_more.json"]);
    }

    #[tokio::test]
    async fn test_directory_source_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0_bad.json"), b"{ nope").unwrap();

        let mut source = DirectorySource::new(dir.path()).unwrap();
        let err = source.next().await.unwrap_err();
        assert!(matches!(err, EngineError::MalformedDocument { .. }));
    }

    #[tokio::test]
    async fn test_vec_source_is_finite_and_ordered() {
        let mut source = VecSource::from_bodies(vec![json!({"realm": "a"}), json!({"realm": "b"})]);
        assert_eq!(source.next().await.unwrap().unwrap().name, "snapshot-0");
        assert_eq!(source.next().await.unwrap().unwrap().name, "snapshot-1");
        assert!(source.next().await.unwrap().is_none());
        // Non-restartable: the sequence stays exhausted.
        assert!(source.next().await.unwrap().is_none());
    }
}
