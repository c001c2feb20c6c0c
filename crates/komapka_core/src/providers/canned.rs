//! Canned stand-ins for the GoOut and KudyZNudy sources.
//!
//! Both return fixed activities offset from the requested point.

use crate::model::entity::{parse_timestamp, Entity};
use crate::providers::{validate_request, ActivityProvider, ProviderError};
use async_trait::async_trait;
use log::debug;
use std::time::Duration;

struct CannedActivity {
    id: &'static str,
    name: &'static str,
    venue: &'static str,
    lat_offset: f64,
    lng_offset: f64,
    starts_at: Option<&'static str>,
    category: &'static str,
    url: &'static str,
}

const GOOUT_ACTIVITIES: [CannedActivity; 2] = [
    CannedActivity {
        id: "go1",
        name: "Koncert v parku",
        venue: "Městský park",
        lat_offset: 0.01,
        lng_offset: -0.01,
        starts_at: Some("2025-05-10T18:00:00"),
        category: "kultura",
        url: "https://goout.net/cs/koncert-v-parku/123456",
    },
    CannedActivity {
        id: "go2",
        name: "Divadelní představení",
        venue: "Městské divadlo",
        lat_offset: -0.02,
        lng_offset: 0.03,
        starts_at: Some("2025-05-12T19:30:00"),
        category: "kultura",
        url: "https://goout.net/cs/divadelni-predstaveni/789012",
    },
];

const KUDYZNUDY_ACTIVITIES: [CannedActivity; 2] = [
    CannedActivity {
        id: "kzn1",
        name: "Prohlídka hradu",
        venue: "Hrad Karlštejn",
        lat_offset: 0.05,
        lng_offset: 0.02,
        starts_at: None,
        category: "kultura",
        url: "https://www.kudyznudy.cz/aktivity/hrad-karlstejn",
    },
    CannedActivity {
        id: "kzn2",
        name: "Cyklovýlet podél řeky",
        venue: "Cyklostezka",
        lat_offset: -0.03,
        lng_offset: -0.04,
        starts_at: None,
        category: "sport",
        url: "https://www.kudyznudy.cz/aktivity/cyklovylet-podél-reky",
    },
];

async fn serve(
    provider_id: &str,
    latency: Duration,
    activities: &[CannedActivity],
    latitude: f64,
    longitude: f64,
    radius_km: f64,
) -> Result<Vec<Entity>, ProviderError> {
    validate_request(latitude, longitude, radius_km)?;
    debug!(
        "event=provider_fetch module=providers status=start provider={} radius_km={}",
        provider_id, radius_km
    );
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
    Ok(activities
        .iter()
        .map(|activity| {
            let mut entity = Entity::with_id(activity.id, activity.name)
                .at(latitude + activity.lat_offset, longitude + activity.lng_offset)
                .in_category(activity.category);
            entity.address = Some(activity.venue.to_string());
            entity.starts_at = activity.starts_at.and_then(parse_timestamp);
            entity.url = Some(activity.url.to_string());
            entity.tags = vec![provider_id.to_string()];
            entity
        })
        .collect())
}

/// Event listings stand-in.
#[derive(Debug, Clone, Default)]
pub struct GoOutProvider {
    latency: Duration,
}

impl GoOutProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated response delay.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl ActivityProvider for GoOutProvider {
    fn provider_id(&self) -> &str {
        "goout"
    }

    async fn fetch_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<Entity>, ProviderError> {
        serve(
            self.provider_id(),
            self.latency,
            &GOOUT_ACTIVITIES,
            latitude,
            longitude,
            radius_km,
        )
        .await
    }
}

/// Trip and sightseeing stand-in.
#[derive(Debug, Clone, Default)]
pub struct KudyZNudyProvider {
    latency: Duration,
}

impl KudyZNudyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl ActivityProvider for KudyZNudyProvider {
    fn provider_id(&self) -> &str {
        "kudyznudy"
    }

    async fn fetch_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<Entity>, ProviderError> {
        serve(
            self.provider_id(),
            self.latency,
            &KUDYZNUDY_ACTIVITIES,
            latitude,
            longitude,
            radius_km,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::{GoOutProvider, KudyZNudyProvider};
    use crate::providers::{ActivityProvider, ProviderError};
    use std::time::Duration;

    #[tokio::test]
    async fn goout_offsets_events_from_requested_point() {
        let events = GoOutProvider::new()
            .fetch_nearby(50.0, 14.0, 10.0)
            .await
            .expect("canned fetch should succeed");
        assert_eq!(events.len(), 2);
        let concert = &events[0];
        assert_eq!(concert.id.as_deref(), Some("go1"));
        let point = concert.coordinates.expect("canned events have coordinates");
        assert!((point.latitude - 50.01).abs() < 1e-9);
        assert!((point.longitude - 13.99).abs() < 1e-9);
        assert!(concert.starts_at.is_some());
        assert_eq!(concert.address.as_deref(), Some("Městský park"));
    }

    #[tokio::test(start_paused = true)]
    async fn kudyznudy_waits_for_latency_and_has_undated_trips() {
        let provider = KudyZNudyProvider::new().with_latency(Duration::from_millis(700));
        let started = tokio::time::Instant::now();
        let trips = provider
            .fetch_nearby(49.0, 16.0, 5.0)
            .await
            .expect("canned fetch should succeed");
        assert!(started.elapsed() >= Duration::from_millis(700));
        assert!(trips.iter().all(|trip| trip.starts_at.is_none()));
        assert_eq!(trips[1].category, Some(vec!["sport".to_string()]));
    }

    #[tokio::test]
    async fn rejects_invalid_radius() {
        let err = GoOutProvider::new()
            .fetch_nearby(50.0, 14.0, -1.0)
            .await
            .expect_err("negative radius should fail");
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }
}
