//! External activity providers.
//!
//! # Responsibility
//! - Define the [`ActivityProvider`] seam for event sources near a point.
//! - Register providers by id and merge their results.
//!
//! # Invariants
//! - A failing provider contributes nothing; the merge still succeeds.

pub mod canned;
pub mod registry;

use crate::model::entity::Entity;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use canned::{GoOutProvider, KudyZNudyProvider};
pub use registry::{ProviderRegistry, ProviderRegistryError};

/// Failure of one provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Request parameters are out of range.
    InvalidRequest(String),
    /// The upstream source could not be reached.
    Unavailable { provider_id: String, message: String },
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequest(message) => write!(f, "invalid provider request: {message}"),
            Self::Unavailable {
                provider_id,
                message,
            } => write!(f, "provider `{provider_id}` unavailable: {message}"),
        }
    }
}

impl Error for ProviderError {}

/// Source of activities around a location.
#[async_trait]
pub trait ActivityProvider: Send + Sync {
    /// Stable id in `[a-z0-9_-]+`.
    fn provider_id(&self) -> &str;

    async fn fetch_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<Entity>, ProviderError>;
}

/// Rejects coordinates outside WGS84 and non-positive radii.
pub fn validate_request(latitude: f64, longitude: f64, radius_km: f64) -> Result<(), ProviderError> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(ProviderError::InvalidRequest(format!(
            "coordinates out of range: {latitude}, {longitude}"
        )));
    }
    if !(radius_km.is_finite() && radius_km > 0.0) {
        return Err(ProviderError::InvalidRequest(format!(
            "radius must be positive: {radius_km}"
        )));
    }
    Ok(())
}
