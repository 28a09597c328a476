//! Geo bucket builder (component J): grid partition + k-means subdivision.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::StructuredStore;
use crate::error::Result;
use crate::geo::index::{haversine_km, GeoBucket};

/// Degrees of latitude (or, approximately, longitude near the equator) per
/// kilometer, used to size grid cells from a kilometer target.
const DEGREES_PER_KM: f64 = 1.0 / 111.0;

const MAX_KMEANS_ITERATIONS: usize = 20;
const CONVERGENCE_THRESHOLD_DEGREES: f64 = 1e-4;

/// Tuning knobs for [`build_buckets`].
#[derive(Debug, Clone, Copy)]
pub struct BucketBuildOptions {
    /// Desired member count per bucket; cells that exceed 3× this are
    /// subdivided with k-means.
    pub target_bucket_size: usize,
    /// Grid cell size, expressed in kilometers.
    pub grid_size_km: f64,
    /// Cells (or k-means clusters) below this member count are dropped.
    pub min_bucket_size: usize,
}

impl Default for BucketBuildOptions {
    fn default() -> Self {
        Self { target_bucket_size: 20, grid_size_km: 10.0, min_bucket_size: 3 }
    }
}

/// One document as the bucket builder sees it: id, coordinates, and an
/// optional free-text location name used for the bucket's display name.
#[derive(Debug, Clone)]
pub struct BucketMember {
    /// Document id.
    pub id: String,
    /// Latitude, degrees.
    pub lat: f64,
    /// Longitude, degrees.
    pub lng: f64,
    /// Free-text location name, if known.
    pub location_name: Option<String>,
}

/// A built bucket together with its member ids.
#[derive(Debug, Clone)]
pub struct BuiltBucket {
    /// Bucket metadata.
    pub bucket: GeoBucket,
    /// Member document ids.
    pub members: Vec<String>,
}

/// Builds buckets for a table's geo index and atomically replaces whatever
/// buckets previously existed there.
///
/// The set of live bucket ids is itself a Redis set (`bucket-index`); each
/// bucket's metadata is a hash (`bucket-data:<id>`) and its member list a
/// set (`bucket:<id>`) — all via [`StructuredStore`] rather than JSON blobs.
pub struct GeoBucketBuilder {
    store: Arc<dyn StructuredStore>,
    key_prefix: String,
    table: String,
}

impl GeoBucketBuilder {
    /// Build a bucket builder for `table`.
    #[must_use]
    pub fn new(store: Arc<dyn StructuredStore>, key_prefix: impl Into<String>, table: impl Into<String>) -> Self {
        Self { store, key_prefix: key_prefix.into(), table: table.into() }
    }

    fn bucket_index_key(&self) -> String {
        format!("{}:geo:{}:bucket-index", self.key_prefix, self.table)
    }

    fn bucket_data_key(&self, bucket_id: &str) -> String {
        format!("{}:geo:{}:bucket-data:{}", self.key_prefix, self.table, bucket_id)
    }

    fn bucket_members_key(&self, bucket_id: &str) -> String {
        format!("{}:geo:{}:bucket:{}", self.key_prefix, self.table, bucket_id)
    }

    /// Replace all prior buckets with freshly computed ones from
    /// `members`. Prior bucket ids are discovered via the stored bucket
    /// index set rather than a `CacheStore::scan` pattern, since bucket
    /// ids don't share a discoverable key suffix pattern.
    pub async fn rebuild(&self, members: &[BucketMember], options: &BucketBuildOptions) -> Result<Vec<BuiltBucket>> {
        let built = build_buckets(members, options);

        let prior_ids = self.store.smembers(&self.bucket_index_key()).await?;
        for prior_id in &prior_ids {
            self.store.del(&self.bucket_data_key(prior_id)).await.ok();
            self.store.del(&self.bucket_members_key(prior_id)).await.ok();
            self.store.srem(&self.bucket_index_key(), prior_id).await.ok();
        }

        for entry in &built {
            self.store.sadd(&self.bucket_index_key(), &entry.bucket.id).await?;
            for (field, value) in entry.bucket.to_hash_fields() {
                self.store.hset(&self.bucket_data_key(&entry.bucket.id), field, &value).await?;
            }
            for member_id in &entry.members {
                self.store.sadd(&self.bucket_members_key(&entry.bucket.id), member_id).await?;
            }
        }

        Ok(built)
    }
}

struct Cell {
    key: (i64, i64),
    members: Vec<BucketMember>,
}

/// Pure grid-partition + k-means bucket computation, with no store access
/// (so it can be exercised without an async runtime).
#[must_use]
pub fn build_buckets(members: &[BucketMember], options: &BucketBuildOptions) -> Vec<BuiltBucket> {
    let finite_members: Vec<&BucketMember> = members.iter().filter(|m| m.lat.is_finite() && m.lng.is_finite()).collect();

    let cell_size_degrees = options.grid_size_km * DEGREES_PER_KM;
    let mut cells: HashMap<(i64, i64), Vec<BucketMember>> = HashMap::new();
    for member in &finite_members {
        let key = (
            (member.lat / cell_size_degrees).floor() as i64,
            (member.lng / cell_size_degrees).floor() as i64,
        );
        cells.entry(key).or_default().push((*member).clone());
    }

    let mut cell_list: Vec<Cell> = cells.into_iter().map(|(key, members)| Cell { key, members }).collect();
    cell_list.sort_by_key(|c| c.key);

    let mut buckets = Vec::new();
    let mut bucket_counter = 0usize;

    for cell in cell_list {
        if cell.members.len() < options.min_bucket_size {
            continue;
        }

        if cell.members.len() <= 3 * options.target_bucket_size {
            bucket_counter += 1;
            buckets.push(emit_bucket(format!("bucket-{bucket_counter}"), &cell.members));
            continue;
        }

        let k = (cell.members.len() as f64 / options.target_bucket_size as f64).ceil() as usize;
        let clusters = kmeans(&cell.members, k.max(1));
        for cluster in clusters {
            if cluster.len() < options.min_bucket_size {
                continue;
            }
            bucket_counter += 1;
            buckets.push(emit_bucket(format!("bucket-{bucket_counter}"), &cluster));
        }
    }

    buckets
}

fn emit_bucket(id: String, members: &[BucketMember]) -> BuiltBucket {
    let count = members.len() as f64;
    let center_lat = members.iter().map(|m| m.lat).sum::<f64>() / count;
    let center_lng = members.iter().map(|m| m.lng).sum::<f64>() / count;

    let max_distance = members
        .iter()
        .map(|m| haversine_km(center_lat, center_lng, m.lat, m.lng))
        .fold(0.0_f64, f64::max);

    let location_name = most_frequent_location_name(members);

    BuiltBucket {
        bucket: GeoBucket {
            id,
            center_lat,
            center_lng,
            radius_km: max_distance * 1.1,
            location_name,
        },
        members: members.iter().map(|m| m.id.clone()).collect(),
    }
}

fn most_frequent_location_name(members: &[BucketMember]) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for member in members {
        let Some(name) = &member.location_name else { continue };
        if name.is_empty() {
            continue;
        }
        match counts.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, count)) => *count += 1,
            None => counts.push((name.clone(), 1)),
        }
    }
    let mut best: Option<(String, usize)> = None;
    for (name, count) in counts {
        match &best {
            Some((_, best_count)) if count <= *best_count => {}
            _ => best = Some((name, count)),
        }
    }
    best.map(|(name, _)| name)
}

/// k-means over `members`, capped at [`MAX_KMEANS_ITERATIONS`] iterations
/// with centroid convergence threshold [`CONVERGENCE_THRESHOLD_DEGREES`].
/// Initial centroids are evenly spaced samples from the input (deterministic,
/// no RNG dependency).
fn kmeans(members: &[BucketMember], k: usize) -> Vec<Vec<BucketMember>> {
    if members.is_empty() || k == 0 {
        return Vec::new();
    }
    if k >= members.len() {
        return members.iter().map(|m| vec![m.clone()]).collect();
    }

    let mut centroids: Vec<(f64, f64)> = (0..k)
        .map(|i| {
            let idx = i * (members.len() - 1) / k.max(1).max(1);
            (members[idx].lat, members[idx].lng)
        })
        .collect();

    let mut assignment = vec![0usize; members.len()];

    for _ in 0..MAX_KMEANS_ITERATIONS {
        for (i, member) in members.iter().enumerate() {
            let mut best_cluster = 0;
            let mut best_distance = f64::MAX;
            for (cluster_idx, centroid) in centroids.iter().enumerate() {
                let distance = haversine_km(member.lat, member.lng, centroid.0, centroid.1);
                if distance < best_distance {
                    best_distance = distance;
                    best_cluster = cluster_idx;
                }
            }
            assignment[i] = best_cluster;
        }

        let mut max_shift = 0.0_f64;
        for cluster_idx in 0..k {
            let members_in_cluster: Vec<&BucketMember> =
                members.iter().zip(&assignment).filter(|(_, &a)| a == cluster_idx).map(|(m, _)| m).collect();
            if members_in_cluster.is_empty() {
                continue;
            }
            let count = members_in_cluster.len() as f64;
            let new_lat = members_in_cluster.iter().map(|m| m.lat).sum::<f64>() / count;
            let new_lng = members_in_cluster.iter().map(|m| m.lng).sum::<f64>() / count;

            let shift = ((new_lat - centroids[cluster_idx].0).powi(2) + (new_lng - centroids[cluster_idx].1).powi(2)).sqrt();
            max_shift = max_shift.max(shift);
            centroids[cluster_idx] = (new_lat, new_lng);
        }

        if max_shift < CONVERGENCE_THRESHOLD_DEGREES {
            break;
        }
    }

    let mut clusters = vec![Vec::new(); k];
    for (member, &cluster_idx) in members.iter().zip(&assignment) {
        clusters[cluster_idx].push(member.clone());
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, lat: f64, lng: f64) -> BucketMember {
        BucketMember { id: id.to_string(), lat, lng, location_name: None }
    }

    #[test]
    fn test_build_buckets_skips_non_finite_coordinates() {
        let members = vec![
            member("a", f64::NAN, 0.0),
            member("b", 40.0, 0.0),
            member("c", 40.01, 0.0),
            member("d", 40.02, 0.0),
        ];
        let buckets = build_buckets(&members, &BucketBuildOptions { target_bucket_size: 10, grid_size_km: 50.0, min_bucket_size: 3 });
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].members.len(), 3);
    }

    #[test]
    fn test_build_buckets_drops_cells_below_min_size() {
        let members = vec![member("a", 0.0, 0.0), member("b", 0.01, 0.0)];
        let buckets = build_buckets(&members, &BucketBuildOptions { target_bucket_size: 10, grid_size_km: 10.0, min_bucket_size: 3 });
        assert!(buckets.is_empty());
    }

    #[test]
    fn test_build_buckets_subdivides_large_cell_with_kmeans() {
        // 15 members in one cell, targetBucketSize=5 -> k = ceil(15/5) = 3 buckets.
        let members: Vec<BucketMember> = (0..15).map(|i| member(&format!("m{i}"), 40.0 + i as f64 * 0.0001, -74.0)).collect();
        let options = BucketBuildOptions { target_bucket_size: 5, grid_size_km: 50.0, min_bucket_size: 3 };
        let buckets = build_buckets(&members, &options);
        assert_eq!(buckets.len(), 3);
        let total_members: usize = buckets.iter().map(|b| b.members.len()).sum();
        assert_eq!(total_members, 15);
    }

    #[test]
    fn test_emitted_bucket_radius_covers_farthest_member() {
        let members = vec![member("a", 40.0, -74.0), member("b", 40.1, -74.0), member("c", 40.05, -74.0)];
        let options = BucketBuildOptions { target_bucket_size: 10, grid_size_km: 50.0, min_bucket_size: 1 };
        let buckets = build_buckets(&members, &options);
        assert_eq!(buckets.len(), 1);
        let bucket = &buckets[0].bucket;
        for m in &members {
            assert!(haversine_km(bucket.center_lat, bucket.center_lng, m.lat, m.lng) <= bucket.radius_km);
        }
    }

    #[test]
    fn test_most_frequent_location_name_breaks_ties_by_first_encountered() {
        let members = vec![
            BucketMember { id: "a".to_string(), lat: 0.0, lng: 0.0, location_name: Some("Downtown".to_string()) },
            BucketMember { id: "b".to_string(), lat: 0.0, lng: 0.0, location_name: Some("Uptown".to_string()) },
        ];
        assert_eq!(most_frequent_location_name(&members), Some("Downtown".to_string()));
    }

    #[tokio::test]
    async fn test_rebuild_replaces_prior_buckets() {
        use crate::cache::InMemoryCacheStore;

        let store = Arc::new(InMemoryCacheStore::new());
        let builder = GeoBucketBuilder::new(store.clone(), "vitrine", "places");

        let first_gen: Vec<BucketMember> = (0..5).map(|i| member(&format!("a{i}"), 40.0 + i as f64 * 0.001, -74.0)).collect();
        let options = BucketBuildOptions { target_bucket_size: 10, grid_size_km: 50.0, min_bucket_size: 1 };
        let first = builder.rebuild(&first_gen, &options).await.unwrap();
        assert_eq!(first.len(), 1);

        let second_gen: Vec<BucketMember> = (0..5).map(|i| member(&format!("b{i}"), 10.0 + i as f64 * 0.001, 10.0)).collect();
        let second = builder.rebuild(&second_gen, &options).await.unwrap();
        assert_eq!(second.len(), 1);

        let members = store.smembers(&builder.bucket_members_key(&second[0].bucket.id)).await.unwrap();
        assert!(members.iter().all(|id| id.starts_with('b')), "stale members from first generation leaked: {members:?}");
    }

    #[tokio::test]
    async fn test_rebuild_drops_stale_bucket_ids_from_index() {
        use crate::cache::InMemoryCacheStore;

        let store = Arc::new(InMemoryCacheStore::new());
        let builder = GeoBucketBuilder::new(store.clone(), "vitrine", "places");

        let first_gen: Vec<BucketMember> = (0..5).map(|i| member(&format!("a{i}"), 40.0 + i as f64 * 0.001, -74.0)).collect();
        let options = BucketBuildOptions { target_bucket_size: 10, grid_size_km: 50.0, min_bucket_size: 1 };
        let first = builder.rebuild(&first_gen, &options).await.unwrap();
        let first_id = first[0].bucket.id.clone();

        let second_gen: Vec<BucketMember> = (0..5).map(|i| member(&format!("b{i}"), 10.0 + i as f64 * 0.001, 10.0)).collect();
        builder.rebuild(&second_gen, &options).await.unwrap();

        let index_ids = store.smembers(&builder.bucket_index_key()).await.unwrap();
        assert!(!index_ids.contains(&first_id));
    }
}
