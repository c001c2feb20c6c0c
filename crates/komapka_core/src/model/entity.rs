//! Point-of-interest records shown on the map.
//!
//! # Responsibility
//! - Define the single record shape shared by activities, places and
//!   communities.
//! - Accept the dataset wire format (Czech keys, string-or-list facets,
//!   string-or-number ids) and normalize it at the deserialization boundary.
//!
//! # Invariants
//! - `id` is unique within one [`EntityKind`] but may collide across kinds.
//! - Facet fields are `None` when absent, null or blank; a present facet is
//!   always a list, even when the source held a single string.
//! - Entities are never mutated after load; they are shared as `Arc<Entity>`.

use crate::model::geo::Coordinates;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::warn;
use serde::{Deserialize, Serialize};

/// Which collection an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Activity,
    Place,
    Community,
}

impl EntityKind {
    /// All kinds in result order.
    pub const ALL: [EntityKind; 3] = [Self::Activity, Self::Place, Self::Community];

    /// Stable machine name used in marker keys and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Place => "place",
            Self::Community => "community",
        }
    }

    /// Prefix for synthetic ids assigned at load time.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Activity => "act",
            Self::Place => "plc",
            Self::Community => "com",
        }
    }

    /// User-facing label shown next to suggestions.
    pub fn label(self) -> &'static str {
        match self {
            Self::Activity => "Aktivita",
            Self::Place => "Místo",
            Self::Community => "Komunita",
        }
    }
}

/// City/region pair carried by community records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Locality {
    #[serde(default, alias = "mesto", skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Canonical point-of-interest record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawEntity")]
pub struct Entity {
    /// Stable id; filled with a synthetic value by the dataset store when the
    /// source omits it.
    pub id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality: Option<Locality>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Entities without coordinates never reach the map.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suitability: Option<Vec<String>>,
    /// Price bucket label, e.g. `Vstup zdarma` or `100-500 Kč`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_range: Option<String>,
    /// Free-form price text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Entity {
    /// Creates an entity with only a name set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            category: None,
            address: None,
            locality: None,
            tags: Vec::new(),
            coordinates: None,
            starts_at: None,
            ends_at: None,
            suitability: None,
            price_range: None,
            price: None,
            environment: None,
            focus: None,
            format: None,
            language: None,
            reservation: None,
            time_of_day: None,
            url: None,
        }
    }

    /// Creates an entity with a caller-provided id.
    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        let mut entity = Self::new(name);
        entity.id = Some(id.into());
        entity
    }

    /// Sets coordinates, consuming and returning the entity.
    pub fn at(mut self, latitude: f64, longitude: f64) -> Self {
        self.coordinates = Some(Coordinates::new(latitude, longitude));
        self
    }

    /// Sets a single category, consuming and returning the entity.
    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(vec![category.into()]);
        self
    }
}

/// Named facet fields that expose enumerable values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetField {
    Category,
    Suitability,
    PriceRange,
    Environment,
    Focus,
    Format,
    Language,
    Reservation,
    TimeOfDay,
}

impl FacetField {
    /// Dataset wire key for this facet.
    pub fn wire_key(self) -> &'static str {
        match self {
            Self::Category => "kategorie",
            Self::Suitability => "vhodnost_pro",
            Self::PriceRange => "cenove_rozpeti",
            Self::Environment => "prostredi",
            Self::Focus => "zamereni",
            Self::Format => "format_akce",
            Self::Language => "jazyk_akce",
            Self::Reservation => "rezervace_vstupne",
            Self::TimeOfDay => "denni_doba",
        }
    }

    /// Resolves either the wire key or the snake_case field name.
    pub fn parse(value: &str) -> Option<Self> {
        const FIELDS: [FacetField; 9] = [
            FacetField::Category,
            FacetField::Suitability,
            FacetField::PriceRange,
            FacetField::Environment,
            FacetField::Focus,
            FacetField::Format,
            FacetField::Language,
            FacetField::Reservation,
            FacetField::TimeOfDay,
        ];
        let value = value.trim();
        FIELDS.into_iter().find(|field| {
            field.wire_key() == value
                || serde_json::to_value(field)
                    .ok()
                    .and_then(|v| v.as_str().map(|name| name == value))
                    .unwrap_or(false)
        })
    }
}

impl Entity {
    /// Values of one facet; `None` when the entity has no such field.
    pub fn facet(&self, field: FacetField) -> Option<Vec<&str>> {
        fn list(values: &Option<Vec<String>>) -> Option<Vec<&str>> {
            values
                .as_ref()
                .map(|values| values.iter().map(String::as_str).collect())
        }
        fn single(value: &Option<String>) -> Option<Vec<&str>> {
            value.as_deref().map(|value| vec![value])
        }

        match field {
            FacetField::Category => list(&self.category),
            FacetField::Suitability => list(&self.suitability),
            FacetField::PriceRange => single(&self.price_range),
            FacetField::Environment => single(&self.environment),
            FacetField::Focus => list(&self.focus),
            FacetField::Format => list(&self.format),
            FacetField::Language => list(&self.language),
            FacetField::Reservation => list(&self.reservation),
            FacetField::TimeOfDay => list(&self.time_of_day),
        }
    }
}

/// Facet source value: a single string or a list of strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<Option<String>>),
}

impl OneOrMany {
    fn into_facet(self) -> Option<Vec<String>> {
        match self {
            Self::One(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(vec![trimmed.to_string()])
                }
            }
            Self::Many(values) => Some(
                values
                    .into_iter()
                    .flatten()
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
                    .collect(),
            ),
        }
    }
}

/// Scalar accepted where the source mixes strings and numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl Scalar {
    fn into_text(self) -> Option<String> {
        let text = match self {
            Self::Text(value) => value.trim().to_string(),
            Self::Number(value) => value.to_string(),
            Self::Flag(value) => value.to_string(),
        };
        (!text.is_empty()).then_some(text)
    }
}

/// Wire shape of one dataset record.
#[derive(Debug, Deserialize)]
struct RawEntity {
    #[serde(default)]
    id: Option<Scalar>,
    #[serde(default, rename = "nazev", alias = "name")]
    name: Option<String>,
    #[serde(default, rename = "popis", alias = "description")]
    description: Option<String>,
    #[serde(default, rename = "kategorie", alias = "category")]
    category: Option<OneOrMany>,
    #[serde(default, rename = "adresa", alias = "address")]
    address: Option<String>,
    #[serde(default, rename = "lokalita", alias = "locality")]
    locality: Option<Locality>,
    #[serde(default, rename = "tagy", alias = "tags")]
    tags: Option<OneOrMany>,
    #[serde(default, alias = "lat")]
    latitude: Option<f64>,
    #[serde(default, alias = "lng")]
    longitude: Option<f64>,
    #[serde(default)]
    coordinates: Option<Coordinates>,
    #[serde(default, rename = "zacatek", alias = "starts_at")]
    starts_at: Option<String>,
    #[serde(default, rename = "konec", alias = "ends_at")]
    ends_at: Option<String>,
    #[serde(default, rename = "vhodnost_pro", alias = "suitability")]
    suitability: Option<OneOrMany>,
    #[serde(default, rename = "cenove_rozpeti", alias = "price_range")]
    price_range: Option<Scalar>,
    #[serde(default, rename = "cena", alias = "price")]
    price: Option<Scalar>,
    #[serde(default, rename = "prostredi", alias = "environment")]
    environment: Option<String>,
    #[serde(default, rename = "zamereni", alias = "focus")]
    focus: Option<OneOrMany>,
    #[serde(default, rename = "format_akce", alias = "format")]
    format: Option<OneOrMany>,
    #[serde(default, rename = "jazyk_akce", alias = "language")]
    language: Option<OneOrMany>,
    #[serde(default, rename = "rezervace_vstupne", alias = "reservation")]
    reservation: Option<OneOrMany>,
    #[serde(default, rename = "denni_doba", alias = "time_of_day")]
    time_of_day: Option<OneOrMany>,
    #[serde(default, rename = "web", alias = "url")]
    url: Option<String>,
}

impl From<RawEntity> for Entity {
    fn from(raw: RawEntity) -> Self {
        let coordinates = match (raw.latitude, raw.longitude) {
            (Some(latitude), Some(longitude)) if latitude.is_finite() && longitude.is_finite() => {
                Some(Coordinates::new(latitude, longitude))
            }
            _ => raw.coordinates,
        };

        Self {
            id: raw.id.and_then(Scalar::into_text),
            name: raw.name.unwrap_or_default(),
            description: non_blank(raw.description),
            category: raw.category.and_then(OneOrMany::into_facet),
            address: non_blank(raw.address),
            locality: raw.locality,
            tags: raw
                .tags
                .and_then(OneOrMany::into_facet)
                .unwrap_or_default(),
            coordinates,
            starts_at: raw.starts_at.as_deref().and_then(parse_field_timestamp),
            ends_at: raw.ends_at.as_deref().and_then(parse_field_timestamp),
            suitability: raw.suitability.and_then(OneOrMany::into_facet),
            price_range: raw.price_range.and_then(Scalar::into_text),
            price: raw.price.and_then(Scalar::into_text),
            environment: non_blank(raw.environment),
            focus: raw.focus.and_then(OneOrMany::into_facet),
            format: raw.format.and_then(OneOrMany::into_facet),
            language: raw.language.and_then(OneOrMany::into_facet),
            reservation: raw.reservation.and_then(OneOrMany::into_facet),
            time_of_day: raw.time_of_day.and_then(OneOrMany::into_facet),
            url: non_blank(raw.url),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn parse_field_timestamp(value: &str) -> Option<NaiveDateTime> {
    if value.trim().is_empty() {
        return None;
    }
    let parsed = parse_timestamp(value);
    if parsed.is_none() {
        warn!("event=entity_timestamp_invalid module=model status=skipped value_len={}", value.len());
    }
    parsed
}

/// Parses the timestamp forms found in dataset files and filter input.
///
/// Accepts RFC 3339 (converted to UTC), `YYYY-MM-DDTHH:MM[:SS[.f]]`,
/// `YYYY-MM-DD HH:MM[:SS]` and a bare `YYYY-MM-DD` (midnight).
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for format in FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    parse_date_only(value).and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Parses a bare calendar date.
pub fn parse_date_only(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::{parse_timestamp, Entity, FacetField};

    #[test]
    fn facet_field_parses_wire_and_field_names() {
        assert_eq!(FacetField::parse("vhodnost_pro"), Some(FacetField::Suitability));
        assert_eq!(FacetField::parse("time_of_day"), Some(FacetField::TimeOfDay));
        assert_eq!(FacetField::parse("unknown"), None);
    }

    #[test]
    fn facet_exposes_single_and_list_fields_uniformly() {
        let mut entity = Entity::new("x");
        entity.environment = Some("Venku".to_string());
        entity.focus = Some(vec!["Sport".to_string(), "Hry".to_string()]);

        assert_eq!(entity.facet(FacetField::Environment), Some(vec!["Venku"]));
        assert_eq!(entity.facet(FacetField::Focus), Some(vec!["Sport", "Hry"]));
        assert_eq!(entity.facet(FacetField::Language), None);
    }

    #[test]
    fn deserializes_czech_wire_keys() {
        let value = serde_json::json!({
            "id": 7,
            "nazev": "Kavárna U Mostu",
            "kategorie": "Gastronomie",
            "adresa": "Karlova 1, Praha",
            "latitude": 50.08,
            "longitude": 14.43,
            "vhodnost_pro": ["Rodiny s dětmi", "Senioři"],
            "cena": 120,
            "zacatek": "2025-05-10T18:00:00"
        });

        let entity: Entity = serde_json::from_value(value).expect("record should parse");
        assert_eq!(entity.id.as_deref(), Some("7"));
        assert_eq!(entity.name, "Kavárna U Mostu");
        assert_eq!(entity.category, Some(vec!["Gastronomie".to_string()]));
        assert_eq!(entity.suitability.as_ref().map(Vec::len), Some(2));
        assert_eq!(entity.price.as_deref(), Some("120"));
        assert!(entity.coordinates.is_some());
        assert!(entity.starts_at.is_some());
    }

    #[test]
    fn blank_facets_are_absent_and_missing_coordinates_stay_none() {
        let value = serde_json::json!({
            "nazev": "Bez polohy",
            "prostredi": "  ",
            "zamereni": "",
            "latitude": 50.0
        });

        let entity: Entity = serde_json::from_value(value).expect("record should parse");
        assert!(entity.id.is_none());
        assert!(entity.environment.is_none());
        assert!(entity.focus.is_none());
        assert!(entity.coordinates.is_none());
    }

    #[test]
    fn unparseable_timestamp_is_treated_as_absent() {
        let value = serde_json::json!({ "nazev": "x", "zacatek": "zítra večer" });
        let entity: Entity = serde_json::from_value(value).expect("record should parse");
        assert!(entity.starts_at.is_none());
    }

    #[test]
    fn parse_timestamp_accepts_common_forms() {
        assert!(parse_timestamp("2025-05-10").is_some());
        assert!(parse_timestamp("2025-05-10T18:00").is_some());
        assert!(parse_timestamp("2025-05-10 18:00:00").is_some());
        assert!(parse_timestamp("2025-05-10T18:00:00+02:00").is_some());
        assert!(parse_timestamp("10. 5. 2025").is_none());
    }
}
