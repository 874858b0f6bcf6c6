use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::error::{MatchError, Result};
use crate::models::CatalogEntry;

/// Immutable, slug-indexed snapshot of every career record
#[derive(Debug)]
pub struct Catalog {
    entries: Vec<Arc<CatalogEntry>>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog, rejecting records that fail schema checks or reuse a slug
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self> {
        let mut index = HashMap::with_capacity(entries.len());
        let mut stored = Vec::with_capacity(entries.len());

        for entry in entries {
            entry.check().map_err(MatchError::Validation)?;
            if index.contains_key(&entry.slug) {
                return Err(MatchError::Validation(format!(
                    "duplicate catalog slug: {}",
                    entry.slug
                )));
            }
            index.insert(entry.slug.clone(), stored.len());
            stored.push(Arc::new(entry));
        }

        Ok(Self {
            entries: stored,
            index,
        })
    }

    pub fn get(&self, slug: &str) -> Option<&Arc<CatalogEntry>> {
        self.index.get(slug).map(|&i| &self.entries[i])
    }

    /// Entries in source order
    pub fn entries(&self) -> &[Arc<CatalogEntry>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Optional per-career transition notes passed to the reasoning stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CareerNotes {
    #[serde(rename = "entryRoutes", default)]
    pub entry_routes: Vec<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
}

pub type CareerNotesTable = HashMap<String, CareerNotes>;

/// Read-only access to the catalog and its auxiliary tables
///
/// Files are read on first use and kept for the life of the repository.
/// Construct one per process and share it behind an `Arc`.
#[derive(Debug)]
pub struct CatalogRepository {
    catalog_path: Option<PathBuf>,
    notes_path: Option<PathBuf>,
    catalog: OnceCell<Arc<Catalog>>,
    notes: OnceCell<Arc<CareerNotesTable>>,
}

impl CatalogRepository {
    pub fn from_path(catalog_path: impl Into<PathBuf>, notes_path: Option<PathBuf>) -> Self {
        Self {
            catalog_path: Some(catalog_path.into()),
            notes_path,
            catalog: OnceCell::new(),
            notes: OnceCell::new(),
        }
    }

    /// Repository over an in-memory catalog, with no notes table
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self> {
        let catalog = Catalog::from_entries(entries)?;
        Ok(Self {
            catalog_path: None,
            notes_path: None,
            catalog: OnceCell::new_with(Some(Arc::new(catalog))),
            notes: OnceCell::new(),
        })
    }

    pub fn with_notes(mut self, notes: CareerNotesTable) -> Self {
        self.notes = OnceCell::new_with(Some(Arc::new(notes)));
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.catalog.initialized()
    }

    /// The catalog, loading it on first access
    pub async fn catalog(&self) -> Result<Arc<Catalog>> {
        self.catalog
            .get_or_try_init(|| async {
                let path = self.catalog_path.as_ref().ok_or_else(|| {
                    MatchError::Configuration("no catalog path configured".to_string())
                })?;

                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    MatchError::Validation(format!(
                        "catalog unreadable at {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                let entries: Vec<CatalogEntry> = serde_json::from_slice(&bytes)
                    .map_err(|e| MatchError::Validation(format!("catalog is malformed: {}", e)))?;

                let catalog = Catalog::from_entries(entries)?;
                tracing::info!("Loaded catalog with {} careers from {}", catalog.len(), path.display());
                Ok::<_, MatchError>(Arc::new(catalog))
            })
            .await
            .cloned()
    }

    /// Transition notes, or an empty table when none is available
    pub async fn notes(&self) -> Arc<CareerNotesTable> {
        self.notes
            .get_or_init(|| async {
                let Some(path) = self.notes_path.as_ref() else {
                    return Arc::new(CareerNotesTable::new());
                };

                let loaded = match tokio::fs::read(path).await {
                    Ok(bytes) => serde_json::from_slice::<CareerNotesTable>(&bytes)
                        .map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                };

                match loaded {
                    Ok(table) => {
                        tracing::info!("Loaded career notes for {} careers", table.len());
                        Arc::new(table)
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Skipping career notes table at {}: {}",
                            path.display(),
                            e
                        );
                        Arc::new(CareerNotesTable::new())
                    }
                }
            })
            .await
            .clone()
    }
}
