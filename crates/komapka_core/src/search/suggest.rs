//! Autocomplete suggestions over entity names.

use crate::dataset::DatasetStore;
use crate::model::entity::{Entity, EntityKind};
use crate::search::normalize::{contains_normalized, normalize};
use serde::Serialize;
use std::sync::Arc;

pub const DEFAULT_MAX_SUGGESTIONS: usize = 10;
pub const DEFAULT_MIN_QUERY_CHARS: usize = 2;

/// One autocomplete entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub text: String,
    pub kind: EntityKind,
    /// `Aktivita`, `Místo` or `Komunita`.
    pub label: &'static str,
    pub entity: Arc<Entity>,
}

/// Limits applied by [`suggest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionLimits {
    pub min_query_chars: usize,
    pub max_suggestions: usize,
}

impl Default for SuggestionLimits {
    fn default() -> Self {
        Self {
            min_query_chars: DEFAULT_MIN_QUERY_CHARS,
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
        }
    }
}

/// Names containing `query`, activities first, then places, then
/// communities. Names are de-duplicated case-insensitively.
pub fn suggest(datasets: &DatasetStore, query: &str, limits: SuggestionLimits) -> Vec<Suggestion> {
    let needle = normalize(query.trim());
    if needle.chars().count() < limits.min_query_chars.max(1) {
        return Vec::new();
    }

    let mut suggestions: Vec<Suggestion> = Vec::new();
    'kinds: for kind in EntityKind::ALL {
        for entity in datasets.items(kind) {
            if suggestions.len() >= limits.max_suggestions {
                break 'kinds;
            }
            if !contains_normalized(&entity.name, &needle) {
                continue;
            }
            let lowered = entity.name.to_lowercase();
            if suggestions
                .iter()
                .any(|existing| existing.text.to_lowercase() == lowered)
            {
                continue;
            }
            suggestions.push(Suggestion {
                text: entity.name.clone(),
                kind,
                label: kind.label(),
                entity: Arc::clone(entity),
            });
        }
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::{suggest, SuggestionLimits};
    use crate::dataset::DatasetStore;
    use crate::model::entity::{Entity, EntityKind};

    fn store() -> DatasetStore {
        DatasetStore::from_collections(
            vec![Entity::new("Kavárna v parku"), Entity::new("Běh parkem")],
            vec![Entity::new("KAVÁRNA V PARKU"), Entity::new("Park Stromovka")],
            vec![Entity::new("Parkour klub")],
        )
    }

    #[test]
    fn short_queries_yield_nothing() {
        assert!(suggest(&store(), "p", SuggestionLimits::default()).is_empty());
        assert!(suggest(&store(), "  ", SuggestionLimits::default()).is_empty());
    }

    #[test]
    fn orders_by_kind_and_dedupes_case_insensitively() {
        let suggestions = suggest(&store(), "park", SuggestionLimits::default());
        let texts = suggestions.iter().map(|s| s.text.as_str()).collect::<Vec<_>>();
        assert_eq!(
            texts,
            vec!["Kavárna v parku", "Běh parkem", "Park Stromovka", "Parkour klub"]
        );
        assert_eq!(suggestions[2].kind, EntityKind::Place);
        assert_eq!(suggestions[3].label, "Komunita");
    }

    #[test]
    fn caps_at_max_suggestions() {
        let limits = SuggestionLimits {
            max_suggestions: 2,
            ..SuggestionLimits::default()
        };
        assert_eq!(suggest(&store(), "park", limits).len(), 2);
    }
}
