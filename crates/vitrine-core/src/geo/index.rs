//! Geo index engine (component I): radius and location-name search.
//!
//! The main coordinate index is a Redis geospatial sorted set (`GEOADD`/
//! `GEORADIUS`), bucket and location-name membership are plain sets
//! (`SADD`/`SMEMBERS`), and bucket metadata is a hash (`HSET`/`HGETALL`) —
//! all via [`StructuredStore`] rather than JSON blobs under one string key.
//! Document payloads, which are arbitrary caller JSON rather than a fixed
//! shape, still go through plain [`CacheStore::get`]/[`CacheStore::set`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::StructuredStore;
use crate::error::{FacadeError, Result};
use crate::geo::normalizer::GeoNormalizer;

/// Mean Earth radius in kilometers, used for haversine distance.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A document registered in the geo index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoDocument {
    /// Document id.
    pub id: String,
    /// Latitude, degrees.
    pub lat: f64,
    /// Longitude, degrees.
    pub lng: f64,
    /// Free-text location name, if any.
    pub location_name: Option<String>,
    /// Bucket this document belongs to, if known.
    pub bucket_id: Option<String>,
    /// Verbatim payload attached at index time.
    pub payload: Value,
}

/// Stored bucket metadata (see [`crate::geo::bucket`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoBucket {
    /// Bucket id.
    pub id: String,
    /// Centroid latitude.
    pub center_lat: f64,
    /// Centroid longitude.
    pub center_lng: f64,
    /// Radius in kilometers, guaranteed ≥ farthest member distance × 1.1.
    pub radius_km: f64,
    /// Most frequent non-empty member location name.
    pub location_name: Option<String>,
}

impl GeoBucket {
    pub(crate) fn to_hash_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.id.clone()),
            ("center_lat", self.center_lat.to_string()),
            ("center_lng", self.center_lng.to_string()),
            ("radius_km", self.radius_km.to_string()),
            ("location_name", self.location_name.clone().unwrap_or_default()),
        ]
    }

    pub(crate) fn from_hash(map: &std::collections::HashMap<String, String>) -> Option<Self> {
        Some(Self {
            id: map.get("id")?.clone(),
            center_lat: map.get("center_lat")?.parse().ok()?,
            center_lng: map.get("center_lng")?.parse().ok()?,
            radius_km: map.get("radius_km")?.parse().ok()?,
            location_name: map.get("location_name").filter(|s| !s.is_empty()).cloned(),
        })
    }
}

/// Distance-boost threshold: hits within `within_km` get at least `boost`.
#[derive(Debug, Clone, Copy)]
pub struct DistanceBoost {
    /// Threshold distance, kilometers.
    pub within_km: f64,
    /// Minimum boost applied to hits within the threshold.
    pub boost: f64,
}

/// Options for [`GeoIndexEngine::search_by_radius`].
#[derive(Debug, Clone)]
pub struct RadiusSearchOptions {
    /// If the initial radius yields fewer than `min_results`, re-issue at
    /// this radius (must exceed the initial radius to take effect).
    pub max_range_km: Option<f64>,
    /// Minimum result count that avoids triggering expansion.
    pub min_results: usize,
    /// Cap on returned hits.
    pub limit: usize,
    /// Sort by ascending distance (always true in this implementation —
    /// kept as a field so callers can express intent/future toggles).
    pub sort_by_distance: bool,
    /// Include the computed distance on each hit.
    pub include_distance: bool,
    /// Boost thresholds, evaluated in order; the best (max) applicable
    /// boost wins.
    pub distance_boost: Vec<DistanceBoost>,
}

impl Default for RadiusSearchOptions {
    fn default() -> Self {
        Self {
            max_range_km: None,
            min_results: 0,
            limit: 20,
            sort_by_distance: true,
            include_distance: true,
            distance_boost: Vec::new(),
        }
    }
}

/// A scored geo search hit.
#[derive(Debug, Clone)]
pub struct GeoHit {
    /// Document id.
    pub id: String,
    /// Verbatim payload.
    pub payload: Value,
    /// Distance from the search center, kilometers.
    pub distance_km: f64,
    /// Final relevance score: base distance score × boost.
    pub relevance_score: f64,
}

/// Binds a [`StructuredStore`] to one table's geo index.
pub struct GeoIndexEngine {
    store: Arc<dyn StructuredStore>,
    key_prefix: String,
    table: String,
}

impl GeoIndexEngine {
    /// Build an engine for `table`.
    #[must_use]
    pub fn new(store: Arc<dyn StructuredStore>, key_prefix: impl Into<String>, table: impl Into<String>) -> Self {
        Self { store, key_prefix: key_prefix.into(), table: table.into() }
    }

    fn main_key(&self) -> String {
        format!("{}:geo:{}:main", self.key_prefix, self.table)
    }

    fn doc_key(&self, id: &str) -> String {
        format!("{}:geo:{}:doc:{}", self.key_prefix, self.table, id)
    }

    fn bucket_members_key(&self, bucket_id: &str) -> String {
        format!("{}:geo:{}:bucket:{}", self.key_prefix, self.table, bucket_id)
    }

    fn bucket_data_key(&self, bucket_id: &str) -> String {
        format!("{}:geo:{}:bucket-data:{}", self.key_prefix, self.table, bucket_id)
    }

    fn location_key(&self, canonical: &str) -> String {
        format!("{}:geo:{}:location:{}", self.key_prefix, self.table, canonical)
    }

    /// Validate coordinates and, if valid, register `doc` in the geo
    /// index, write its payload, and (if a bucket or location name is
    /// known) add it to that bucket's/location's member set.
    ///
    /// Out-of-range coordinates are logged and skipped, never indexed.
    pub async fn index_document(&self, doc: &GeoDocument) -> Result<()> {
        if !(-90.0..=90.0).contains(&doc.lat) || !(-180.0..=180.0).contains(&doc.lng) {
            tracing::warn!(table = %self.table, id = %doc.id, lat = doc.lat, lng = doc.lng, "skipping document with invalid coordinates");
            return Ok(());
        }

        self.store.geoadd(&self.main_key(), &doc.id, doc.lng, doc.lat).await?;

        let payload = serde_json::to_string(doc).map_err(|e| FacadeError::internal(format!("geo doc serialize failed: {e}")))?;
        self.store.set(&self.doc_key(&doc.id), &payload, Duration::ZERO).await?;

        if let Some(bucket_id) = &doc.bucket_id {
            self.store.sadd(&self.bucket_members_key(bucket_id), &doc.id).await?;
        }

        if let Some(name) = &doc.location_name {
            self.store.sadd(&self.location_key(name), &doc.id).await?;
        }

        Ok(())
    }

    /// Persist bucket metadata, replacing any prior metadata for the
    /// same bucket id.
    pub async fn save_bucket(&self, bucket: &GeoBucket) -> Result<()> {
        let key = self.bucket_data_key(&bucket.id);
        for (field, value) in bucket.to_hash_fields() {
            self.store.hset(&key, field, &value).await?;
        }
        Ok(())
    }

    /// Radius search around `(center_lat, center_lng)`, with elastic
    /// expansion to `options.max_range_km` when the initial radius
    /// undershoots `options.min_results`.
    pub async fn search_by_radius(
        &self,
        center_lat: f64,
        center_lng: f64,
        radius_km: f64,
        options: &RadiusSearchOptions,
    ) -> Result<Vec<GeoHit>> {
        let within_radius = self.store.georadius(&self.main_key(), center_lng, center_lat, radius_km, None).await?;

        let (hits_with_distance, effective_radius, expanded) =
            if within_radius.len() < options.min_results && options.max_range_km.is_some_and(|max| max > radius_km) {
                let max_range = options.max_range_km.unwrap();
                let expanded_hits = self.store.georadius(&self.main_key(), center_lng, center_lat, max_range, None).await?;
                (expanded_hits, max_range, true)
            } else {
                (within_radius, radius_km, false)
            };

        let mut hits = Vec::with_capacity(hits_with_distance.len());
        for (id, distance) in hits_with_distance.into_iter().take(options.limit) {
            let Some(raw) = self.store.get(&self.doc_key(&id)).await? else { continue };
            let Ok(doc) = serde_json::from_str::<GeoDocument>(&raw) else { continue };

            let mut base_score = (1.0 - distance / effective_radius).max(0.0);
            if expanded && distance > radius_km {
                base_score *= 0.7;
            }

            let mut boost = 1.0_f64;
            for threshold in &options.distance_boost {
                if distance <= threshold.within_km {
                    boost = boost.max(threshold.boost);
                }
            }

            hits.push(GeoHit { id, payload: doc.payload, distance_km: distance, relevance_score: base_score * boost });
        }

        Ok(hits)
    }

    /// Normalize `name` via `normalizer`; if it resolved to coordinates,
    /// search by radius (falling back to `default_radius_km`); if only a
    /// bucket is known (not modeled by the normalizer in this
    /// implementation — callers resolve buckets via
    /// [`Self::search_by_bucket`] directly), fail explicitly.
    pub async fn search_by_location_name(
        &self,
        name: &str,
        normalizer: &GeoNormalizer,
        default_radius_km: f64,
        options: &RadiusSearchOptions,
    ) -> Result<Vec<GeoHit>> {
        let canonical = normalizer.normalize(name);
        match canonical.coordinates {
            Some((lat, lng)) => self.search_by_radius(lat, lng, default_radius_km, options).await,
            None => Err(FacadeError::unknown_location(name)),
        }
    }

    /// Fetch bucket metadata and delegate to [`Self::search_by_radius`]
    /// using its center and radius.
    pub async fn search_by_bucket(&self, bucket_id: &str, options: &RadiusSearchOptions) -> Result<Vec<GeoHit>> {
        let map = self.store.hgetall(&self.bucket_data_key(bucket_id)).await?;
        let bucket = GeoBucket::from_hash(&map).ok_or_else(|| FacadeError::not_found("geo bucket", bucket_id))?;

        self.search_by_radius(bucket.center_lat, bucket.center_lng, bucket.radius_km, options).await
    }
}

/// Great-circle distance between two points in kilometers.
#[must_use]
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let dlat = (lat2 - lat1).abs();
    let dlng = (lng2 - lng1).to_radians().abs();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::cache::InMemoryCacheStore;

    fn engine() -> GeoIndexEngine {
        GeoIndexEngine::new(Arc::new(InMemoryCacheStore::new()), "vitrine", "places")
    }

    fn doc(id: &str, lat: f64, lng: f64) -> GeoDocument {
        GeoDocument { id: id.to_string(), lat, lng, location_name: None, bucket_id: None, payload: json!({"id": id}) }
    }

    #[test]
    fn test_haversine_same_point_is_zero() {
        assert!((haversine_km(40.0, -74.0, 40.0, -74.0)).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_known_distance_approx() {
        // NYC to LA is roughly 3940 km.
        let d = haversine_km(40.7128, -74.0060, 34.0522, -118.2437);
        assert!((3900.0..4000.0).contains(&d), "distance was {d}");
    }

    #[tokio::test]
    async fn test_index_document_rejects_invalid_coordinates() {
        let engine = engine();
        engine.index_document(&doc("bad", 200.0, 0.0)).await.unwrap();
        let hits = engine.search_by_radius(0.0, 0.0, 20_000.0, &RadiusSearchOptions::default()).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_search_by_radius_finds_nearby_documents() {
        let engine = engine();
        let center = (40.7128, -74.0060);
        engine.index_document(&doc("near", center.0 + 0.01, center.1)).await.unwrap();
        engine.index_document(&doc("far", center.0 + 10.0, center.1)).await.unwrap();

        let hits = engine.search_by_radius(center.0, center.1, 5.0, &RadiusSearchOptions::default()).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near"]);
    }

    #[tokio::test]
    async fn test_search_by_radius_expands_when_under_min_results() {
        let engine = engine();
        let center = (40.7128, -74.0060);
        // ~1.1 km per 0.01 degree latitude.
        engine.index_document(&doc("d1", center.0 + 0.018, center.1)).await.unwrap(); // ~2km
        engine.index_document(&doc("d2", center.0 + 0.027, center.1)).await.unwrap(); // ~3km
        engine.index_document(&doc("d3", center.0 + 0.036, center.1)).await.unwrap(); // ~4km
        engine.index_document(&doc("d4", center.0 + 0.108, center.1)).await.unwrap(); // ~12km

        let options = RadiusSearchOptions { max_range_km: Some(35.0), min_results: 4, limit: 20, ..RadiusSearchOptions::default() };
        let hits = engine.search_by_radius(center.0, center.1, 5.0, &options).await.unwrap();
        assert_eq!(hits.len(), 4);

        let far_hit = hits.iter().find(|h| h.id == "d4").unwrap();
        assert!(far_hit.relevance_score < 1.0);
    }

    #[tokio::test]
    async fn test_search_by_location_name_without_coordinates_fails() {
        let engine = engine();
        let normalizer = GeoNormalizer::new(&HashMap::new());
        let err = engine
            .search_by_location_name("Nowhereville", &normalizer, 10.0, &RadiusSearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FacadeError::UnknownLocation { .. }));
    }

    #[tokio::test]
    async fn test_search_by_location_name_resolves_known_city() {
        let engine = engine();
        engine.index_document(&doc("nyc-doc", 40.71, -74.0)).await.unwrap();
        let normalizer = GeoNormalizer::new(&HashMap::new());
        let hits = engine
            .search_by_location_name("NYC", &normalizer, 10.0, &RadiusSearchOptions::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_search_by_bucket_uses_saved_metadata() {
        let engine = engine();
        let center = (37.7749, -122.4194);
        engine.index_document(&doc("sf-doc", center.0, center.1)).await.unwrap();
        engine
            .save_bucket(&GeoBucket {
                id: "bucket-1".to_string(),
                center_lat: center.0,
                center_lng: center.1,
                radius_km: 10.0,
                location_name: Some("San Francisco".to_string()),
            })
            .await
            .unwrap();

        let hits = engine.search_by_bucket("bucket-1", &RadiusSearchOptions::default()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "sf-doc");
    }

    #[tokio::test]
    async fn test_search_by_bucket_missing_bucket_errors() {
        let engine = engine();
        let err = engine.search_by_bucket("nonexistent", &RadiusSearchOptions::default()).await.unwrap_err();
        assert!(matches!(err, FacadeError::NotFound { .. }));
    }
}
