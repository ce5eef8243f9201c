//! Destinations for retained command results.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use log::info;
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::model::DatabaseVariable;

/// Writes `File` retentions, keyed by short session id and file name.
#[async_trait]
pub trait FileRetentionWriter: Send + Sync {
    async fn write(&self, short_session_id: &str, name: &str, value: &str) -> Result<()>;
}

/// Writes retained files to `<root>/<short session id>/<name>`.
#[derive(Debug, Clone)]
pub struct FsRetentionWriter {
    root: PathBuf,
}

impl FsRetentionWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, short_session_id: &str, name: &str) -> PathBuf {
        self.root.join(short_session_id).join(name)
    }
}

#[async_trait]
impl FileRetentionWriter for FsRetentionWriter {
    async fn write(&self, short_session_id: &str, name: &str, value: &str) -> Result<()> {
        let path = self.path_of(short_session_id, name);
        let failed = |source| SessionError::RetentionWrite {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(failed)?;
        }
        tokio::fs::write(&path, value).await.map_err(failed)?;
        Ok(())
    }
}

/// Receives `DatabaseImmediate` retentions as soon as they resolve.
///
/// Called while a session holds its command lock; must not block.
pub trait ResultsProducer: Send + Sync {
    fn produce_retention_result(&self, operation_id: Uuid, variable: DatabaseVariable);
}

/// Logs immediate results instead of shipping them anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogResultsProducer;

impl ResultsProducer for LogResultsProducer {
    fn produce_retention_result(&self, operation_id: Uuid, variable: DatabaseVariable) {
        info!(
            "Operation {} produced {} = {:?}",
            operation_id, variable.name, variable.value
        );
    }
}

/// Keeps immediate results in memory.
#[derive(Debug, Default)]
pub struct MemoryResultsProducer {
    produced: Mutex<Vec<(Uuid, DatabaseVariable)>>,
}

impl MemoryResultsProducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn produced(&self) -> Vec<(Uuid, DatabaseVariable)> {
        self.produced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ResultsProducer for MemoryResultsProducer {
    fn produce_retention_result(&self, operation_id: Uuid, variable: DatabaseVariable) {
        self.produced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((operation_id, variable));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataType;

    #[tokio::test]
    async fn test_fs_writer_creates_session_directory() {
        let root = tempfile::tempdir().unwrap();
        let writer = FsRetentionWriter::new(root.path());

        writer.write("0a1b2c3d", "uname.txt", "Linux").await.unwrap();

        let written = std::fs::read_to_string(root.path().join("0a1b2c3d/uname.txt")).unwrap();
        assert_eq!(written, "Linux");
    }

    #[tokio::test]
    async fn test_fs_writer_reports_path_on_failure() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        // The session directory would have to live under a regular file
        let writer = FsRetentionWriter::new(&blocker);
        let err = writer.write("0a1b2c3d", "x", "y").await.unwrap_err();
        assert!(err.to_string().contains("0a1b2c3d"));
    }

    #[test]
    fn test_memory_producer_keeps_order() {
        let producer = MemoryResultsProducer::new();
        let operation_id = Uuid::new_v4();
        for (name, value) in [("a", "1"), ("b", "2")] {
            producer.produce_retention_result(
                operation_id,
                DatabaseVariable::new(DataType::Number, name, value),
            );
        }

        let produced = producer.produced();
        assert_eq!(produced.len(), 2);
        assert_eq!(produced[0].1.name, "a");
        assert_eq!(produced[1].0, operation_id);
    }
}
