//! In-memory dataset store.
//!
//! # Responsibility
//! - Load the activity, place and community collections once.
//! - Assign synthetic ids to records that lack one.
//! - Answer enumeration queries (categories, facet values).
//!
//! # Invariants
//! - Every stored entity has `id = Some(..)`.
//! - A per-file failure yields an empty collection, never an initialization
//!   failure.

pub mod lazy;
pub mod source;

use crate::model::entity::{Entity, EntityKind, FacetField};
use log::{info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

pub use lazy::LazyDatasetStore;
pub use source::{parse_document, DatasetFiles, DatasetSource, FileDatasetSource};

/// Per-file loading failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLoadError {
    /// No candidate location held the file.
    NotFound {
        kind: EntityKind,
        tried: Vec<PathBuf>,
    },
    Io {
        path: PathBuf,
        message: String,
    },
    Parse {
        path: PathBuf,
        message: String,
    },
    /// None of the configured data roots exists.
    SourceUnavailable(String),
}

impl Display for DataLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, tried } => write!(
                f,
                "{} dataset not found (tried {})",
                kind.as_str(),
                tried
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::Io { path, message } => {
                write!(f, "failed to read `{}`: {message}", path.display())
            }
            Self::Parse { path, message } => {
                write!(f, "malformed dataset `{}`: {message}", path.display())
            }
            Self::SourceUnavailable(roots) => write!(f, "no data root exists: {roots}"),
        }
    }
}

impl Error for DataLoadError {}

/// Dataset initialization failure, shared with every waiting caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitializationError {
    /// The load task panicked; carries the sanitized panic payload.
    LoadPanicked(String),
    /// The load task was cancelled before publishing an outcome.
    Abandoned,
}

impl Display for InitializationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoadPanicked(message) => {
                write!(f, "dataset initialization failed: {message}")
            }
            Self::Abandoned => f.write_str("dataset initialization was abandoned"),
        }
    }
}

impl Error for InitializationError {}

/// Loaded collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetStore {
    activities: Vec<Arc<Entity>>,
    places: Vec<Arc<Entity>>,
    communities: Vec<Arc<Entity>>,
}

impl DatasetStore {
    /// Loads all three collections concurrently from `source`. A failed
    /// collection is logged and left empty.
    pub async fn load(source: &dyn DatasetSource) -> Self {
        let (activities, places, communities) = tokio::join!(
            source.fetch(EntityKind::Activity),
            source.fetch(EntityKind::Place),
            source.fetch(EntityKind::Community),
        );

        let store = Self::from_collections(
            recover(EntityKind::Activity, activities),
            recover(EntityKind::Place, places),
            recover(EntityKind::Community, communities),
        );
        info!(
            "event=dataset_load module=dataset status=ok activities={} places={} communities={}",
            store.activities.len(),
            store.places.len(),
            store.communities.len()
        );
        store
    }

    /// Builds a store from raw collections, filling missing ids with
    /// `<prefix>-<index>`.
    pub fn from_collections(
        activities: Vec<Entity>,
        places: Vec<Entity>,
        communities: Vec<Entity>,
    ) -> Self {
        Self {
            activities: assign_ids(EntityKind::Activity, activities),
            places: assign_ids(EntityKind::Place, places),
            communities: assign_ids(EntityKind::Community, communities),
        }
    }

    pub fn items(&self, kind: EntityKind) -> &[Arc<Entity>] {
        match kind {
            EntityKind::Activity => &self.activities,
            EntityKind::Place => &self.places,
            EntityKind::Community => &self.communities,
        }
    }

    /// Looks up one entity by kind and id.
    pub fn find(&self, kind: EntityKind, id: &str) -> Option<&Arc<Entity>> {
        self.items(kind)
            .iter()
            .find(|entity| entity.id.as_deref() == Some(id))
    }

    pub fn len(&self) -> usize {
        self.activities.len() + self.places.len() + self.communities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct trimmed categories across all kinds, sorted.
    pub fn unique_categories(&self) -> Vec<String> {
        let mut categories = BTreeSet::new();
        for kind in EntityKind::ALL {
            for entity in self.items(kind) {
                collect_trimmed(&mut categories, entity.facet(FacetField::Category));
            }
        }
        categories.into_iter().collect()
    }

    /// Distinct trimmed values of `field` across activities, sorted.
    ///
    /// Filter facets describe activities, so places and communities are not
    /// consulted.
    pub fn unique_facet_values(&self, field: FacetField) -> Vec<String> {
        let mut values = BTreeSet::new();
        for entity in &self.activities {
            collect_trimmed(&mut values, entity.facet(field));
        }
        values.into_iter().collect()
    }
}

fn recover(kind: EntityKind, loaded: Result<Vec<Entity>, DataLoadError>) -> Vec<Entity> {
    loaded.unwrap_or_else(|err| {
        warn!(
            "event=dataset_load module=dataset status=degraded kind={} error={}",
            kind.as_str(),
            err
        );
        Vec::new()
    })
}

fn assign_ids(kind: EntityKind, entities: Vec<Entity>) -> Vec<Arc<Entity>> {
    entities
        .into_iter()
        .enumerate()
        .map(|(index, mut entity)| {
            if entity.id.is_none() {
                entity.id = Some(format!("{}-{index}", kind.id_prefix()));
            }
            Arc::new(entity)
        })
        .collect()
}

fn collect_trimmed(target: &mut BTreeSet<String>, values: Option<Vec<&str>>) {
    for value in values.into_iter().flatten() {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            target.insert(trimmed.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DataLoadError, DatasetStore};
    use crate::dataset::DatasetSource;
    use crate::model::entity::{Entity, EntityKind, FacetField};
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct ScriptedSource {
        fail_places: Option<DataLoadError>,
    }

    #[async_trait]
    impl DatasetSource for ScriptedSource {
        async fn fetch(&self, kind: EntityKind) -> Result<Vec<Entity>, DataLoadError> {
            match (kind, &self.fail_places) {
                (EntityKind::Place, Some(err)) => Err(err.clone()),
                (EntityKind::Activity, _) => Ok(vec![
                    Entity::new("Jóga").in_category("Sport"),
                    Entity::with_id("a-7", "Koncert").in_category(" Kultura "),
                ]),
                _ => Ok(vec![Entity::new(format!("{} 1", kind.as_str()))]),
            }
        }
    }

    #[test]
    fn synthetic_ids_fill_only_missing_values() {
        let store = DatasetStore::from_collections(
            vec![Entity::new("a"), Entity::with_id("keep", "b"), Entity::new("c")],
            vec![Entity::new("p")],
            vec![Entity::new("c")],
        );

        let ids = store
            .items(EntityKind::Activity)
            .iter()
            .map(|entity| entity.id.clone().unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["act-0", "keep", "act-2"]);
        assert_eq!(store.items(EntityKind::Place)[0].id.as_deref(), Some("plc-0"));
        assert_eq!(store.items(EntityKind::Community)[0].id.as_deref(), Some("com-0"));
        assert!(store.find(EntityKind::Activity, "keep").is_some());
    }

    #[tokio::test]
    async fn recoverable_errors_become_empty_collections() {
        let source = ScriptedSource {
            fail_places: Some(DataLoadError::Parse {
                path: PathBuf::from("mista.json"),
                message: "eof".to_string(),
            }),
        };

        let store = DatasetStore::load(&source).await;
        assert_eq!(store.items(EntityKind::Activity).len(), 2);
        assert!(store.items(EntityKind::Place).is_empty());
        assert_eq!(store.items(EntityKind::Community).len(), 1);
    }

    #[tokio::test]
    async fn unavailable_source_degrades_to_empty_collection() {
        let source = ScriptedSource {
            fail_places: Some(DataLoadError::SourceUnavailable("/nowhere".to_string())),
        };

        let store = DatasetStore::load(&source).await;
        assert!(store.items(EntityKind::Place).is_empty());
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn unique_categories_are_trimmed_and_sorted() {
        let source = ScriptedSource { fail_places: None };
        let store = DatasetStore::load(&source).await;
        assert_eq!(store.unique_categories(), vec!["Kultura", "Sport"]);
    }

    #[test]
    fn unique_facet_values_read_activities_only() {
        let mut activity = Entity::new("a");
        activity.language = Some(vec!["Čeština".to_string(), "English ".to_string()]);
        let mut place = Entity::new("p");
        place.language = Some(vec!["Deutsch".to_string()]);

        let store = DatasetStore::from_collections(vec![activity], vec![place], Vec::new());
        assert_eq!(
            store.unique_facet_values(FacetField::Language),
            vec!["English", "Čeština"]
        );
    }
}
