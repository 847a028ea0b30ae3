//! Place enrichment for parsed streams
//!
//! Lookups are strictly sequential with a fixed pause before every call,
//! including the first. A failed lookup never aborts the run; the stream gets
//! a synthesized place instead.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::geocode::{Geocode, ReverseGeocoder};
use crate::models::Stream;

pub struct EnrichmentPipeline<G> {
    geocoder: G,
    delay: Duration,
}

impl<G: ReverseGeocoder> EnrichmentPipeline<G> {
    pub fn new(geocoder: G, delay: Duration) -> Self {
        Self { geocoder, delay }
    }

    /// Give every stream a `place`, and a raw geocoder payload when the
    /// lookup succeeded.
    pub async fn enrich(&self, mut streams: Vec<Stream>) -> Vec<Stream> {
        info!(
            "Fetching location data for {} streams (delay: {}ms)",
            streams.len(),
            self.delay.as_millis()
        );

        let total = streams.len();
        let mut failed = 0usize;

        for (i, stream) in streams.iter_mut().enumerate() {
            tokio::time::sleep(self.delay).await;

            debug!(
                "Requesting geocode for {} at [{}, {}]",
                stream.name, stream.latitude, stream.longitude
            );
            match self
                .geocoder
                .reverse_geocode(stream.latitude, stream.longitude)
                .await
            {
                Ok(geocode) => apply_geocode(stream, geocode),
                Err(e) => {
                    warn!(
                        "Failed to get location data for {} [{}, {}]: {}",
                        stream.name, stream.latitude, stream.longitude, e
                    );
                    failed += 1;
                    stream.geocode_raw = None;
                    stream.place = Some(stream.fallback_place());
                }
            }

            if i % 10 == 0 || i + 1 == total {
                info!("Processed {}/{} mount points", i + 1, total);
            }
        }

        info!(
            "Completed processing {} mount points ({} lookups failed)",
            total, failed
        );
        streams
    }
}

/// Places for a run that skips geocoding altogether
pub fn apply_fallback_places(streams: &mut [Stream]) {
    for stream in streams {
        stream.geocode_raw = None;
        stream.place = Some(stream.fallback_place());
    }
}

fn apply_geocode(stream: &mut Stream, geocode: Geocode) {
    if stream.country.is_empty() {
        if let Some(country) = geocode.country {
            stream.country = country;
        }
    }

    let locality = Some(geocode.locality).filter(|l| !l.is_empty() && l != "Unknown");
    stream.place = Some(
        geocode
            .display_name
            .or(locality)
            .unwrap_or_else(|| stream.fallback_place()),
    );
    stream.geocode_raw = Some(geocode.raw);
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::errors::GeocodeError;

    /// Replays canned replies in order; `None` is a failed lookup
    struct Scripted {
        replies: Mutex<VecDeque<Option<Value>>>,
        calls: Arc<Mutex<Vec<(f64, f64)>>>,
    }

    impl Scripted {
        fn new(replies: Vec<Option<Value>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl ReverseGeocoder for Scripted {
        async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Geocode, GeocodeError> {
            self.calls.lock().unwrap().push((lat, lon));
            match self.replies.lock().unwrap().pop_front().flatten() {
                Some(raw) => Ok(Geocode::from_json(raw)),
                None => Err(GeocodeError::Status(503)),
            }
        }
    }

    fn stream(name: &str, lat: f64, lon: f64, country: &str) -> Stream {
        Stream {
            name: name.to_string(),
            network: "ASG-EUPOS".to_string(),
            location: "ASG-EUPOS".to_string(),
            country: country.to_string(),
            latitude: lat,
            longitude: lon,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn failed_lookup_gets_fallback_place() {
        let geocoder = Scripted::new(vec![
            None,
            Some(json!({"display_name": "Kraków, Polska", "address": {"city": "Kraków"}})),
        ]);
        let pipeline = EnrichmentPipeline::new(geocoder, Duration::ZERO);

        let streams = pipeline
            .enrich(vec![
                stream("WARS", 52.2, 21.0, "POL"),
                stream("KRAK", 50.06, 19.94, "POL"),
            ])
            .await;

        assert_eq!(streams[0].place.as_deref(), Some("ASG-EUPOS (POL)"));
        assert_eq!(streams[0].geocode_raw, None);
        assert_eq!(streams[1].place.as_deref(), Some("Kraków, Polska"));
        assert!(streams[1].geocode_raw.is_some());
    }

    #[tokio::test]
    async fn every_lookup_failing_still_completes() {
        let pipeline = EnrichmentPipeline::new(Scripted::new(vec![]), Duration::ZERO);
        let streams = pipeline
            .enrich(vec![stream("A", 1.0, 1.0, ""), stream("B", 2.0, 2.0, "")])
            .await;

        assert!(streams
            .iter()
            .all(|s| s.place.as_deref() == Some("ASG-EUPOS (Unknown)")));
    }

    #[tokio::test]
    async fn backfills_empty_country_only() {
        let reply = json!({"display_name": "Somewhere", "address": {"country": "Polska"}});
        let pipeline = EnrichmentPipeline::new(
            Scripted::new(vec![Some(reply.clone()), Some(reply)]),
            Duration::ZERO,
        );

        let streams = pipeline
            .enrich(vec![stream("A", 1.0, 1.0, ""), stream("B", 2.0, 2.0, "DEU")])
            .await;

        assert_eq!(streams[0].country, "Polska");
        assert_eq!(streams[1].country, "DEU");
    }

    #[tokio::test]
    async fn place_prefers_display_name_then_locality_then_fallback() {
        let pipeline = EnrichmentPipeline::new(
            Scripted::new(vec![
                Some(json!({"display_name": "Full, Name", "address": {"city": "Warsaw"}})),
                Some(json!({"address": {"city": "Warsaw", "suburb": "Mokotów"}})),
                Some(json!({"error": "Unable to geocode"})),
            ]),
            Duration::ZERO,
        );

        let streams = pipeline
            .enrich(vec![
                stream("A", 1.0, 1.0, "POL"),
                stream("B", 2.0, 2.0, "POL"),
                stream("C", 3.0, 3.0, "POL"),
            ])
            .await;

        assert_eq!(streams[0].place.as_deref(), Some("Full, Name"));
        assert_eq!(streams[1].place.as_deref(), Some("Warsaw (Mokotów)"));
        assert_eq!(streams[2].place.as_deref(), Some("ASG-EUPOS (POL)"));
        assert_eq!(
            streams[2].geocode_raw,
            Some(json!({"error": "Unable to geocode"}))
        );
    }

    #[tokio::test]
    async fn lookups_follow_stream_order() {
        let geocoder = Scripted::new(vec![]);
        let calls = Arc::clone(&geocoder.calls);
        let pipeline = EnrichmentPipeline::new(geocoder, Duration::ZERO);

        pipeline
            .enrich(vec![
                stream("A", 1.5, 2.5, ""),
                stream("B", 3.5, 4.5, ""),
                stream("C", 5.5, 6.5, ""),
            ])
            .await;

        assert_eq!(
            *calls.lock().unwrap(),
            vec![(1.5, 2.5), (3.5, 4.5), (5.5, 6.5)]
        );
    }

    #[tokio::test]
    async fn waits_before_every_lookup() {
        let pipeline = EnrichmentPipeline::new(Scripted::new(vec![]), Duration::from_millis(20));
        let started = std::time::Instant::now();

        pipeline
            .enrich(vec![stream("A", 1.0, 1.0, ""), stream("B", 2.0, 2.0, "")])
            .await;

        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn fallback_places_without_lookup() {
        let mut streams = vec![stream("A", 1.0, 1.0, "POL"), stream("B", 2.0, 2.0, "")];
        apply_fallback_places(&mut streams);
        assert_eq!(streams[0].place.as_deref(), Some("ASG-EUPOS (POL)"));
        assert_eq!(streams[1].place.as_deref(), Some("ASG-EUPOS (Unknown)"));
    }
}
