//! Device position seam.
//!
//! # Responsibility
//! - Abstract position acquisition behind [`Geolocator`].
//! - Map acquisition failures to user-facing messages.

use crate::model::geo::Coordinates;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Position acquisition failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeolocationError {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
    Unknown,
    /// The platform offers no geolocation at all.
    Unsupported,
}

impl GeolocationError {
    /// Message shown in the result panel.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::PermissionDenied => "Uživatel odmítl sdílet svou polohu.",
            Self::PositionUnavailable => "Informace o poloze není dostupná.",
            Self::Timeout => "Vypršel časový limit pro získání polohy.",
            Self::Unknown => "Nastala neznámá chyba při získávání polohy.",
            Self::Unsupported => "Geolokace není podporována vaším prohlížečem.",
        }
    }

    fn code(self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::PositionUnavailable => "position_unavailable",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
            Self::Unsupported => "unsupported",
        }
    }
}

impl Display for GeolocationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "geolocation failed: {}", self.code())
    }
}

impl Error for GeolocationError {}

/// Source of the user's current position.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError>;
}

/// Geolocator answering with a fixed outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedGeolocator {
    outcome: Result<Coordinates, GeolocationError>,
}

impl FixedGeolocator {
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            outcome: Ok(Coordinates::new(latitude, longitude)),
        }
    }

    pub fn failing(error: GeolocationError) -> Self {
        Self { outcome: Err(error) }
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        self.outcome
    }
}
