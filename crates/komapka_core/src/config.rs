//! Engine configuration.
//!
//! # Responsibility
//! - Hold every tunable of the search engine and map session.
//! - Load overrides from a JSON file, defaulting each missing field.
//!
//! # Invariants
//! - A loaded config has passed [`EngineConfig::validate`].

use crate::dataset::{DatasetFiles, FileDatasetSource};
use crate::search::suggest::SuggestionLimits;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration loading/validation error.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    /// A field is outside its allowed range.
    Invalid { field: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "malformed config: {err}"),
            Self::Invalid { field, message } => write!(f, "invalid config `{field}`: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Primary data directory.
    pub data_dir: PathBuf,
    /// Tried when a file is missing from `data_dir`.
    pub fallback_data_dir: Option<PathBuf>,
    pub files: DatasetFiles,
    pub cache_ttl_ms: u64,
    pub debounce_ms: u64,
    pub loading_indicator_delay_ms: u64,
    pub drift_tolerance_percent: f64,
    pub max_suggestions: usize,
    pub min_suggestion_chars: usize,
    pub default_radius_km: f64,
    pub max_radius_km: f64,
    /// Geolocation searches cover `radius * multiplier`.
    pub geolocation_buffer_multiplier: f64,
    pub selected_item_zoom: f64,
    /// Pad applied around a geocoded area.
    pub geocode_buffer_pad: f64,
    /// Categories offered by the provider search.
    pub provider_categories: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            fallback_data_dir: None,
            files: DatasetFiles::default(),
            cache_ttl_ms: 5 * 60 * 1000,
            debounce_ms: 1500,
            loading_indicator_delay_ms: 300,
            drift_tolerance_percent: 10.0,
            max_suggestions: 10,
            min_suggestion_chars: 2,
            default_radius_km: 10.0,
            max_radius_km: 50.0,
            geolocation_buffer_multiplier: 1.5,
            selected_item_zoom: 16.0,
            geocode_buffer_pad: 0.5,
            provider_categories: ["kultura", "sport", "gastronomie", "příroda", "zábava"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

impl EngineConfig {
    /// Reads and validates a JSON config file.
    ///
    /// # Errors
    /// - `Io` when the file cannot be read.
    /// - `Parse` for malformed JSON or wrongly typed fields.
    /// - `Invalid` for out-of-range values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                message: message.into(),
            }
        }

        if self.cache_ttl_ms == 0 {
            return Err(invalid("cache_ttl_ms", "must be positive"));
        }
        if self.loading_indicator_delay_ms > self.debounce_ms {
            return Err(invalid(
                "loading_indicator_delay_ms",
                "must not exceed debounce_ms",
            ));
        }
        if !(0.0..=100.0).contains(&self.drift_tolerance_percent) {
            return Err(invalid("drift_tolerance_percent", "must be within 0..=100"));
        }
        if self.max_suggestions == 0 {
            return Err(invalid("max_suggestions", "must be positive"));
        }
        if !(self.default_radius_km > 0.0 && self.default_radius_km <= self.max_radius_km) {
            return Err(invalid(
                "default_radius_km",
                "must be positive and not exceed max_radius_km",
            ));
        }
        if self.geolocation_buffer_multiplier < 1.0 {
            return Err(invalid("geolocation_buffer_multiplier", "must be at least 1.0"));
        }
        if self.geocode_buffer_pad < 0.0 {
            return Err(invalid("geocode_buffer_pad", "must not be negative"));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn loading_indicator_delay(&self) -> Duration {
        Duration::from_millis(self.loading_indicator_delay_ms)
    }

    pub fn suggestion_limits(&self) -> SuggestionLimits {
        SuggestionLimits {
            min_query_chars: self.min_suggestion_chars,
            max_suggestions: self.max_suggestions,
        }
    }

    /// File source over the configured directories.
    pub fn dataset_source(&self) -> FileDatasetSource {
        FileDatasetSource::new(self.data_dir.clone(), self.fallback_data_dir.clone())
            .with_files(self.files.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig};
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn missing_fields_take_defaults() {
        let config = EngineConfig::from_json_str(r#"{"debounce_ms": 800}"#).expect("config should parse");
        assert_eq!(config.debounce(), Duration::from_millis(800));
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.files.places, "mista.json");
        assert_eq!(config.provider_categories.len(), 5);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = EngineConfig::from_json_str(r#"{"drift_tolerance_percent": 150}"#)
            .expect_err("tolerance above 100 must fail");
        assert!(matches!(err, ConfigError::Invalid { field: "drift_tolerance_percent", .. }));

        let err = EngineConfig::from_json_str(r#"{"default_radius_km": 80}"#)
            .expect_err("radius above max must fail");
        assert!(matches!(err, ConfigError::Invalid { field: "default_radius_km", .. }));
    }

    #[test]
    fn reads_file_and_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file should be created");
        write!(file, r#"{{"data_dir": "/srv/komapka", "files": {{"places": "places.json"}}}}"#)
            .expect("temp file should be writable");
        let config = EngineConfig::from_json_file(file.path()).expect("config should load");
        assert_eq!(config.data_dir.to_str(), Some("/srv/komapka"));
        assert_eq!(config.files.places, "places.json");
        assert_eq!(config.files.activities, "aktivity_komapka.json");

        let err = EngineConfig::from_json_str("{").expect_err("truncated json must fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = EngineConfig::from_json_file("/definitely/not/here.json")
            .expect_err("missing file must fail");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
