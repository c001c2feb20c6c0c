//! Dataset sources.
//!
//! # Responsibility
//! - Fetch the raw records of one [`EntityKind`].
//! - Resolve primary/fallback file locations and tolerate the two document
//!   shapes found in the wild (bare array, or object wrapping the array).
//!
//! # Invariants
//! - A malformed individual record never fails the whole document.
//! - `SourceUnavailable` is returned only when no data root exists at all.
//! - A root that cannot serve a file defers to the next root.

use crate::dataset::DataLoadError;
use crate::model::entity::{Entity, EntityKind};
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Supplier of raw dataset records.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Fetches every record of `kind`.
    async fn fetch(&self, kind: EntityKind) -> Result<Vec<Entity>, DataLoadError>;
}

/// File names of the three collections, relative to a data root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatasetFiles {
    pub activities: String,
    pub places: String,
    pub communities: String,
}

impl Default for DatasetFiles {
    fn default() -> Self {
        Self {
            activities: "aktivity_komapka.json".to_string(),
            places: "mista.json".to_string(),
            communities: "komunity.json".to_string(),
        }
    }
}

impl DatasetFiles {
    pub fn file_for(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Activity => &self.activities,
            EntityKind::Place => &self.places,
            EntityKind::Community => &self.communities,
        }
    }
}

/// Reads collections from JSON files, trying each root in order.
#[derive(Debug, Clone)]
pub struct FileDatasetSource {
    roots: Vec<PathBuf>,
    files: DatasetFiles,
}

impl FileDatasetSource {
    /// Source with one primary root and an optional fallback root.
    pub fn new(primary: impl Into<PathBuf>, fallback: Option<PathBuf>) -> Self {
        let mut roots = vec![primary.into()];
        roots.extend(fallback);
        Self {
            roots,
            files: DatasetFiles::default(),
        }
    }

    /// Overrides the per-kind file names.
    pub fn with_files(mut self, files: DatasetFiles) -> Self {
        self.files = files;
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    async fn existing_roots(&self) -> Vec<&Path> {
        let mut existing = Vec::with_capacity(self.roots.len());
        for root in &self.roots {
            if tokio::fs::metadata(root)
                .await
                .map(|meta| meta.is_dir())
                .unwrap_or(false)
            {
                existing.push(root.as_path());
            }
        }
        existing
    }
}

#[async_trait]
impl DatasetSource for FileDatasetSource {
    async fn fetch(&self, kind: EntityKind) -> Result<Vec<Entity>, DataLoadError> {
        let roots = self.existing_roots().await;
        if roots.is_empty() {
            return Err(DataLoadError::SourceUnavailable(
                self.roots
                    .iter()
                    .map(|root| root.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            ));
        }

        let file_name = self.files.file_for(kind);
        let mut tried = Vec::with_capacity(roots.len());
        let mut last_io = None;
        for root in roots {
            let path = root.join(file_name);
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => {
                    debug!(
                        "event=dataset_file_read module=dataset status=ok kind={} bytes={}",
                        kind.as_str(),
                        text.len()
                    );
                    return parse_document(&path, &text);
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    warn!(
                        "event=dataset_file_missing module=dataset status=fallback kind={} path={}",
                        kind.as_str(),
                        path.display()
                    );
                    tried.push(path);
                }
                Err(err) => {
                    warn!(
                        "event=dataset_file_read module=dataset status=fallback kind={} path={} error={}",
                        kind.as_str(),
                        path.display(),
                        err
                    );
                    last_io = Some(DataLoadError::Io {
                        path: path.clone(),
                        message: err.to_string(),
                    });
                    tried.push(path);
                }
            }
        }

        Err(last_io.unwrap_or(DataLoadError::NotFound { kind, tried }))
    }
}

/// Parses one dataset document.
///
/// Accepts a top-level array or an object whose first key holds the array.
/// Any other shape yields an empty collection.
pub fn parse_document(path: &Path, text: &str) -> Result<Vec<Entity>, DataLoadError> {
    let document: Value = serde_json::from_str(text).map_err(|err| DataLoadError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    let records = match document {
        Value::Array(records) => records,
        Value::Object(mut map) => {
            let first_key = map.keys().next().cloned();
            match first_key.and_then(|key| map.remove(&key)) {
                Some(Value::Array(records)) => records,
                _ => {
                    warn!(
                        "event=dataset_shape_unexpected module=dataset status=empty path={}",
                        path.display()
                    );
                    return Ok(Vec::new());
                }
            }
        }
        _ => {
            warn!(
                "event=dataset_shape_unexpected module=dataset status=empty path={}",
                path.display()
            );
            return Ok(Vec::new());
        }
    };

    let total = records.len();
    let mut entities = Vec::with_capacity(total);
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<Entity>(record) {
            Ok(entity) => entities.push(entity),
            Err(err) => warn!(
                "event=dataset_record_skipped module=dataset status=error path={} index={} error={}",
                path.display(),
                index,
                err
            ),
        }
    }
    if entities.len() < total {
        debug!(
            "event=dataset_records_parsed module=dataset status=partial parsed={} total={}",
            entities.len(),
            total
        );
    }
    Ok(entities)
}
