use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::error::{MatchError, Result};

/// Precomputed task/narrative/skills vectors for one catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub slug: String,
    pub task: Vec<f32>,
    pub narrative: Vec<f32>,
    pub skills: Vec<f32>,
}

/// Local copy of the catalog embeddings, used when the vector store is down
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSnapshot {
    pub model: String,
    pub dimensions: usize,
    pub entries: Vec<SnapshotEntry>,
}

impl EmbeddingSnapshot {
    fn check(&self) -> Result<()> {
        let mut slugs = HashSet::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !slugs.insert(entry.slug.as_str()) {
                return Err(MatchError::Validation(format!(
                    "duplicate snapshot slug: {}",
                    entry.slug
                )));
            }
            let dims = [entry.task.len(), entry.narrative.len(), entry.skills.len()];
            if dims.iter().any(|&d| d != self.dimensions) {
                return Err(MatchError::Validation(format!(
                    "snapshot vectors for {} do not have {} dimensions",
                    entry.slug, self.dimensions
                )));
            }
        }
        Ok(())
    }
}

/// Lazily loaded embedding snapshot
#[derive(Debug)]
pub struct SnapshotStore {
    path: Option<PathBuf>,
    snapshot: OnceCell<Arc<EmbeddingSnapshot>>,
}

impl SnapshotStore {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            snapshot: OnceCell::new(),
        }
    }

    pub fn from_snapshot(snapshot: EmbeddingSnapshot) -> Result<Self> {
        snapshot.check()?;
        Ok(Self {
            path: None,
            snapshot: OnceCell::new_with(Some(Arc::new(snapshot))),
        })
    }

    /// A store with nothing behind it; every load fails
    pub fn unavailable() -> Self {
        Self {
            path: None,
            snapshot: OnceCell::new(),
        }
    }

    pub async fn load(&self) -> Result<Arc<EmbeddingSnapshot>> {
        self.snapshot
            .get_or_try_init(|| async {
                let path = self.path.as_ref().ok_or_else(|| {
                    MatchError::Validation("no local embedding snapshot configured".to_string())
                })?;

                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    MatchError::Validation(format!(
                        "embedding snapshot unreadable at {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                let snapshot: EmbeddingSnapshot = serde_json::from_slice(&bytes).map_err(|e| {
                    MatchError::Validation(format!("embedding snapshot is malformed: {}", e))
                })?;
                snapshot.check()?;

                tracing::info!(
                    "Loaded embedding snapshot ({} entries, {} dims, model {})",
                    snapshot.entries.len(),
                    snapshot.dimensions,
                    snapshot.model
                );
                Ok::<_, MatchError>(Arc::new(snapshot))
            })
            .await
            .cloned()
    }
}
