//! Multi-facet filter engine.
//!
//! # Responsibility
//! - Narrow the dataset by location text, free-text query and facet filters.
//! - Partition matches by bounding box and report both counts.
//!
//! # Invariants
//! - All supplied facets must match (AND across facets, OR inside one
//!   facet's value list).
//! - A missing facet value on an entity passes that facet, except price.
//! - Entities without coordinates never count as inside bounds.

use crate::dataset::DatasetStore;
use crate::model::entity::{parse_date_only, parse_timestamp, Entity, EntityKind};
use crate::model::geo::Bounds;
use crate::search::normalize::{contains_normalized, normalize};
use crate::search::result::SearchResult;
use chrono::NaiveDateTime;
use log::{debug, info};
use once_cell::sync::Lazy;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Filter-layer error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// A filter value cannot be interpreted.
    InvalidFilter { field: &'static str, value: String },
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFilter { field, value } => {
                write!(f, "invalid filter `{field}`: `{value}`")
            }
        }
    }
}

impl Error for SearchError {}

/// Price bucket offered by the filter form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceRange {
    Free,
    UpTo100,
    From100To500,
    Over500,
}

impl PriceRange {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "zdarma",
            Self::UpTo100 => "do100",
            Self::From100To500 => "100-500",
            Self::Over500 => "nad500",
        }
    }

    fn synonyms(self) -> &'static [String] {
        static FREE: Lazy<Vec<String>> = Lazy::new(|| normalized(&["Vstup zdarma", "zdarma"]));
        static UP_TO_100: Lazy<Vec<String>> =
            Lazy::new(|| normalized(&["Do 100 Kč", "do 100 kč", "do 100kč"]));
        static FROM_100_TO_500: Lazy<Vec<String>> =
            Lazy::new(|| normalized(&["100-500 Kč", "100-500 kč", "100-500kč"]));
        static OVER_500: Lazy<Vec<String>> =
            Lazy::new(|| normalized(&["Nad 500 Kč", "nad 500 kč", "nad 500kč"]));

        match self {
            Self::Free => FREE.as_slice(),
            Self::UpTo100 => UP_TO_100.as_slice(),
            Self::From100To500 => FROM_100_TO_500.as_slice(),
            Self::Over500 => OVER_500.as_slice(),
        }
    }
}

impl FromStr for PriceRange {
    type Err = SearchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalize(value.trim()).as_str() {
            "zdarma" | "free" => Ok(Self::Free),
            "do100" => Ok(Self::UpTo100),
            "100-500" => Ok(Self::From100To500),
            "nad500" => Ok(Self::Over500),
            _ => Err(SearchError::InvalidFilter {
                field: "priceRange",
                value: value.to_string(),
            }),
        }
    }
}

impl Serialize for PriceRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Indoor/outdoor bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Outdoor,
    Indoor,
    Both,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Outdoor => "outdoor",
            Self::Indoor => "indoor",
            Self::Both => "both",
        }
    }

    fn synonyms(self) -> &'static [String] {
        static OUTDOOR: Lazy<Vec<String>> =
            Lazy::new(|| normalized(&["outdoor", "venku", "venkovni"]));
        static INDOOR: Lazy<Vec<String>> = Lazy::new(|| {
            normalized(&["indoor", "vnitřní", "vnitrni", "za každého počasí"])
        });
        static BOTH: Lazy<Vec<String>> =
            Lazy::new(|| normalized(&["oboji", "obojí", "indoor i outdoor"]));

        match self {
            Self::Outdoor => OUTDOOR.as_slice(),
            Self::Indoor => INDOOR.as_slice(),
            Self::Both => BOTH.as_slice(),
        }
    }
}

impl FromStr for Environment {
    type Err = SearchError;

    /// Accepts the machine names and the Czech form labels.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalize(value.trim()).as_str() {
            "outdoor" | "venku" => Ok(Self::Outdoor),
            "indoor" | "indoor (za kazdeho pocasi)" | "vnitrni" => Ok(Self::Indoor),
            "both" | "oboji" | "indoor i outdoor" => Ok(Self::Both),
            _ => Err(SearchError::InvalidFilter {
                field: "environment",
                value: value.to_string(),
            }),
        }
    }
}

impl Serialize for Environment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Active filter selection, as submitted by the filter form.
///
/// Field order is part of the cache key and must stay stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSet {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suitability: Vec<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_bucket"
    )]
    pub price_range: Option<PriceRange>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_bucket"
    )]
    pub environment: Option<Environment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub focus: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub format: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub language: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reservation: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub time_of_day: Vec<String>,
}

impl FilterSet {
    /// Whether no filter is active.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Stable JSON form used in cache keys; `None` when empty.
    pub fn cache_fragment(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        serde_json::to_string(self).ok()
    }
}

/// `"all"`, blank and null all mean "no bucket selected".
fn deserialize_bucket<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.eq_ignore_ascii_case("all") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(de::Error::custom),
    }
}

/// Options of one search call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub bounds: Option<Bounds>,
    pub filters: FilterSet,
    /// Return only the bounds-contained subset as the entity lists.
    pub bounds_only: bool,
}

impl SearchOptions {
    pub fn within(bounds: Bounds) -> Self {
        Self {
            bounds: Some(bounds),
            ..Self::default()
        }
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }
}

/// Filter values pre-normalized once per search.
#[derive(Debug)]
struct CompiledFilters {
    location: Option<String>,
    categories: Vec<String>,
    date_from: Option<NaiveDateTime>,
    date_to: Option<NaiveDateTime>,
    suitability: Vec<String>,
    price: Option<PriceRange>,
    environment: Option<Environment>,
    focus: Vec<String>,
    format: Vec<String>,
    language: Vec<String>,
    reservation: Vec<String>,
    time_of_day: Vec<String>,
}

impl CompiledFilters {
    fn compile(filters: &FilterSet) -> Result<Self, SearchError> {
        Ok(Self {
            location: filters
                .location
                .as_deref()
                .map(normalize)
                .filter(|value| !value.trim().is_empty()),
            categories: normalize_all(&filters.categories),
            date_from: parse_bound("dateFrom", filters.date_from.as_deref(), false)?,
            date_to: parse_bound("dateTo", filters.date_to.as_deref(), true)?,
            suitability: normalize_all(&filters.suitability),
            price: filters.price_range,
            environment: filters.environment,
            focus: normalize_all(&filters.focus),
            format: normalize_all(&filters.format),
            language: normalize_all(&filters.language),
            reservation: normalize_all(&filters.reservation),
            time_of_day: normalize_all(&filters.time_of_day),
        })
    }

    fn matches_location(&self, kind: EntityKind, entity: &Entity) -> bool {
        let Some(location) = self.location.as_deref() else {
            return true;
        };
        if entity
            .address
            .as_deref()
            .is_some_and(|address| contains_normalized(address, location))
        {
            return true;
        }
        kind == EntityKind::Community
            && entity.locality.as_ref().is_some_and(|locality| {
                [locality.city.as_deref(), locality.region.as_deref()]
                    .into_iter()
                    .flatten()
                    .any(|value| contains_normalized(value, location))
            })
    }

    fn matches_facets(&self, entity: &Entity) -> bool {
        list_facet_matches(&self.categories, entity.category.as_deref(), false)
            && self.matches_dates(entity)
            && list_facet_matches(&self.suitability, entity.suitability.as_deref(), false)
            && self.matches_price(entity)
            && self.matches_environment(entity)
            && list_facet_matches(&self.focus, entity.focus.as_deref(), false)
            && list_facet_matches(&self.format, entity.format.as_deref(), false)
            && list_facet_matches(&self.language, entity.language.as_deref(), false)
            && list_facet_matches(&self.reservation, entity.reservation.as_deref(), true)
            && list_facet_matches(&self.time_of_day, entity.time_of_day.as_deref(), false)
    }

    /// Inclusive overlap of the entity's `[start, end]` with the window.
    fn matches_dates(&self, entity: &Entity) -> bool {
        if self.date_from.is_none() && self.date_to.is_none() {
            return true;
        }
        if entity.starts_at.is_none() && entity.ends_at.is_none() {
            return true;
        }
        let end = entity.ends_at.or(entity.starts_at);
        if let (Some(from), Some(end)) = (self.date_from, end) {
            if end < from {
                return false;
            }
        }
        if let (Some(to), Some(start)) = (self.date_to, entity.starts_at) {
            if start > to {
                return false;
            }
        }
        true
    }

    /// Price is the one facet where a missing value rejects the entity.
    fn matches_price(&self, entity: &Entity) -> bool {
        let Some(range) = self.price else {
            return true;
        };
        let synonyms = range.synonyms();
        [entity.price_range.as_deref(), entity.price.as_deref()]
            .into_iter()
            .flatten()
            .map(normalize)
            .any(|value| synonyms.iter().any(|synonym| value.contains(synonym.as_str())))
    }

    fn matches_environment(&self, entity: &Entity) -> bool {
        let (Some(environment), Some(value)) = (self.environment, entity.environment.as_deref())
        else {
            return true;
        };
        let value = normalize(value);
        environment
            .synonyms()
            .iter()
            .any(|synonym| value.contains(synonym.as_str()))
    }
}

/// Runs the filter pipeline over every collection.
///
/// # Errors
/// - Returns `SearchError::InvalidFilter` when a filter date cannot be parsed.
pub fn filter(
    datasets: &DatasetStore,
    query: &str,
    options: &SearchOptions,
) -> Result<SearchResult, SearchError> {
    let compiled = CompiledFilters::compile(&options.filters)?;
    let normalized_query = normalize(query.trim());

    let mut result = SearchResult::default();
    for kind in EntityKind::ALL {
        let matches = datasets
            .items(kind)
            .iter()
            .filter(|entity| compiled.matches_location(kind, entity))
            .filter(|entity| matches_query(kind, entity, &normalized_query))
            .filter(|entity| compiled.matches_facets(entity))
            .cloned();
        result.items_mut(kind).extend(matches);
    }

    if let Some(bounds) = options.bounds {
        result = partition_by_bounds(result, &bounds, options.bounds_only);
    }

    info!(
        "event=search_filter module=search status=ok query_len={} filters={} matched={} in_bounds={}",
        normalized_query.chars().count(),
        !options.filters.is_empty(),
        result.total.map(|counts| counts.total).unwrap_or(result.len()),
        result
            .map_bounds
            .map(|counts| counts.total.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    Ok(result)
}

/// Attaches bounds counts to `result`; with `bounds_only` the entity lists
/// are narrowed to the contained subset as well.
pub fn partition_by_bounds(mut result: SearchResult, bounds: &Bounds, bounds_only: bool) -> SearchResult {
    let mut contained = SearchResult::default();
    let mut without_coordinates = 0usize;
    for (kind, entity) in result.iter() {
        match entity.coordinates {
            Some(point) if bounds.contains(point) => {
                contained.items_mut(kind).push(entity.clone());
            }
            Some(_) => {}
            None => without_coordinates += 1,
        }
    }
    if without_coordinates > 0 {
        debug!(
            "event=search_bounds module=search status=skipped reason=no_coordinates count={}",
            without_coordinates
        );
    }

    let map_counts = contained.list_counts();
    let total_counts = result.total.unwrap_or_else(|| result.list_counts());
    if bounds_only {
        result.activities = contained.activities;
        result.places = contained.places;
        result.communities = contained.communities;
    }
    result.map_bounds = Some(map_counts);
    result.total = Some(total_counts);
    result.bounds = Some(bounds.bbox_string());
    result
}

fn matches_query(kind: EntityKind, entity: &Entity, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let mut fields = [entity.name.as_str()]
        .into_iter()
        .chain(entity.description.as_deref())
        .chain(entity.category.iter().flatten().map(String::as_str))
        .chain(entity.address.as_deref())
        .chain(entity.tags.iter().map(String::as_str));
    if fields.any(|field| contains_normalized(field, query)) {
        return true;
    }
    kind == EntityKind::Community
        && entity.locality.as_ref().is_some_and(|locality| {
            [locality.city.as_deref(), locality.region.as_deref()]
                .into_iter()
                .flatten()
                .any(|value| contains_normalized(value, query))
        })
}

/// `wanted` empty or `values` absent passes. Otherwise any pair must be equal
/// after normalization; `bidirectional` also accepts containment either way.
fn list_facet_matches(wanted: &[String], values: Option<&[String]>, bidirectional: bool) -> bool {
    let Some(values) = values else {
        return true;
    };
    if wanted.is_empty() {
        return true;
    }
    values.iter().map(|value| normalize(value)).any(|value| {
        wanted.iter().any(|filter| {
            value == *filter
                || (bidirectional && (value.contains(filter.as_str()) || filter.contains(value.as_str())))
        })
    })
}

fn parse_bound(
    field: &'static str,
    value: Option<&str>,
    end_of_day: bool,
) -> Result<Option<NaiveDateTime>, SearchError> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    if end_of_day {
        if let Some(date) = parse_date_only(value) {
            return Ok(date.and_hms_milli_opt(23, 59, 59, 999));
        }
    }
    parse_timestamp(value)
        .map(Some)
        .ok_or_else(|| SearchError::InvalidFilter {
            field,
            value: value.to_string(),
        })
}

fn normalize_all(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| normalize(value.trim()))
        .filter(|value| !value.is_empty())
        .collect()
}

fn normalized(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| normalize(value)).collect()
}
