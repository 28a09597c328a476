//! Geo search: location normalization (H), radius index (I), bucket builder (J).

pub mod bucket;
pub mod index;
pub mod normalizer;

pub use bucket::{build_buckets, BucketBuildOptions, BucketMember, BuiltBucket, GeoBucketBuilder};
pub use index::{haversine_km, DistanceBoost, GeoBucket, GeoDocument, GeoHit, GeoIndexEngine, RadiusSearchOptions};
pub use normalizer::{dice_coefficient, CanonicalLocation, GeoNormalizer};
