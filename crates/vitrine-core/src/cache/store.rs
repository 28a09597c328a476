//! Key-value cache store abstraction (component C).
//!
//! The store is the one place the rest of the façade touches the
//! transient backing store. It is deliberately narrow: get/set/del/scan/
//! multi-del/ping, nothing that leaks Redis-specific semantics into
//! callers. A store outage degrades operations to a cache miss rather
//! than failing the caller's request — callers fall through to the
//! database adapter.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::error::{FacadeError, Result};

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use parking_lot::Mutex;

/// Upper bound on keys returned by a single [`CacheStore::scan`] call.
/// Callers that need more must page by re-issuing `scan` with a narrower
/// pattern; this keeps a single scan from blocking the store under load.
pub const MAX_SCAN_BATCH: usize = 100;

/// Transient key-value store used both as a query-result cache and as the
/// persistent substrate for the inverted index and geo index.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a value, or `None` if the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value with a time-to-live. `ttl` of zero means "no expiry".
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Delete a single key. Not an error if the key didn't exist.
    async fn del(&self, key: &str) -> Result<()>;

    /// Delete many keys in one round trip. Not an error if some are absent.
    async fn multi_del(&self, keys: &[String]) -> Result<()>;

    /// List keys matching `pattern` (glob-style), capped at
    /// [`MAX_SCAN_BATCH`] regardless of how many actually match.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>>;

    /// Shrink an existing key's time-to-live without rewriting its value.
    /// Used by lazy invalidation, which lets an entry expire on its own
    /// rather than deleting it synchronously. Not an error if the key is
    /// already absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Liveness check. Used by health endpoints and the transient-store
    /// fallback path: a failing ping means operations should bypass the
    /// cache rather than surface an error to the caller.
    async fn ping(&self) -> Result<()>;
}

/// Redis-backed [`CacheStore`].
pub struct RedisCacheStore {
    client: redis::Client,
}

impl RedisCacheStore {
    /// Build a store from a `redis://` connection URL.
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::TransientStore`] if the URL can't be parsed
    /// into a client (no connection is attempted yet).
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| FacadeError::transient_store(format!("invalid redis url: {e}")))?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis connection failed: {e}")))
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        conn.get(key).await.map_err(|e| FacadeError::transient_store(format!("redis GET failed: {e}")))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        if ttl.is_zero() {
            conn.set(key, value)
                .await
                .map_err(|e| FacadeError::transient_store(format!("redis SET failed: {e}")))
        } else {
            conn.set_ex::<_, _, ()>(key, value, ttl.as_secs())
                .await
                .map_err(|e| FacadeError::transient_store(format!("redis SETEX failed: {e}")))
        }
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis DEL failed: {e}")))
    }

    async fn multi_del(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(keys)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis MDEL failed: {e}")))
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.connection().await?;
        let mut iter: redis::AsyncIter<'_, String> = conn
            .scan_match(pattern)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis SCAN failed: {e}")))?;

        let mut keys = Vec::new();
        while keys.len() < MAX_SCAN_BATCH {
            match iter.next_item().await {
                Some(key) => keys.push(key),
                None => break,
            }
        }
        Ok(keys)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        let seconds = ttl.as_secs().max(1);
        conn.expire::<_, ()>(key, seconds as i64)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis EXPIRE failed: {e}")))
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| FacadeError::transient_store(format!("redis PING failed: {e}")))
    }
}

/// Native structured commands the inverted index (component F) and geo
/// index (component I) need beyond plain get/set: sorted sets for
/// term-score postings, sets for document/bucket membership, hashes for
/// build metadata, and geospatial indexing. A parallel trait rather than
/// folding these into [`CacheStore`] so a store backing only the query
/// cache doesn't have to implement commands it never uses.
#[async_trait]
pub trait StructuredStore: CacheStore {
    /// `ZADD key score member`, overwriting any existing score.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// `ZINCRBY key delta member`, returning the new score.
    async fn zincrby(&self, key: &str, member: &str, delta: f64) -> Result<f64>;

    /// `ZREVRANGE key start stop WITHSCORES`, highest score first.
    /// Negative indices count from the end, as in Redis.
    async fn zrevrange_withscores(&self, key: &str, start: isize, stop: isize) -> Result<Vec<(String, f64)>>;

    /// `ZINTERSTORE dest numkeys key [key ...] AGGREGATE SUM`.
    async fn zinterstore_sum(&self, dest: &str, keys: &[String]) -> Result<()>;

    /// `ZREM key member`.
    async fn zrem(&self, key: &str, member: &str) -> Result<()>;

    /// `ZCARD key`.
    async fn zcard(&self, key: &str) -> Result<u64>;

    /// `SADD key member`.
    async fn sadd(&self, key: &str, member: &str) -> Result<()>;

    /// `SMEMBERS key`.
    async fn smembers(&self, key: &str) -> Result<Vec<String>>;

    /// `SREM key member`.
    async fn srem(&self, key: &str, member: &str) -> Result<()>;

    /// `SCARD key`.
    async fn scard(&self, key: &str) -> Result<u64>;

    /// `HSET key field value`.
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// `HGETALL key`.
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>>;

    /// `GEOADD key longitude latitude member`.
    async fn geoadd(&self, key: &str, member: &str, lng: f64, lat: f64) -> Result<()>;

    /// `GEORADIUS key longitude latitude radius km WITHDIST [COUNT count]`.
    /// Returns `(member, distance_km)` pairs, closest first.
    async fn georadius(
        &self,
        key: &str,
        lng: f64,
        lat: f64,
        radius_km: f64,
        count: Option<usize>,
    ) -> Result<Vec<(String, f64)>>;

    /// `GEOPOS key member`, `None` if the member isn't indexed.
    async fn geopos(&self, key: &str, member: &str) -> Result<Option<(f64, f64)>>;

    /// `MEMORY USAGE key`, `None` if the key doesn't exist or the backend
    /// doesn't support the command.
    async fn memory_usage(&self, key: &str) -> Result<Option<u64>>;
}

#[async_trait]
impl StructuredStore for RedisCacheStore {
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis ZADD failed: {e}")))
    }

    async fn zincrby(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        let mut conn = self.connection().await?;
        redis::cmd("ZINCRBY")
            .arg(key)
            .arg(delta)
            .arg(member)
            .query_async::<f64>(&mut conn)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis ZINCRBY failed: {e}")))
    }

    async fn zrevrange_withscores(&self, key: &str, start: isize, stop: isize) -> Result<Vec<(String, f64)>> {
        let mut conn = self.connection().await?;
        let flat: Vec<String> = redis::cmd("ZREVRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis ZREVRANGE failed: {e}")))?;
        Ok(pair_up_with_scores(flat))
    }

    async fn zinterstore_sum(&self, dest: &str, keys: &[String]) -> Result<()> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("ZINTERSTORE");
        cmd.arg(dest).arg(keys.len()).arg(keys).arg("AGGREGATE").arg("SUM");
        cmd.query_async::<()>(&mut conn)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis ZINTERSTORE failed: {e}")))
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("ZREM")
            .arg(key)
            .arg(member)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis ZREM failed: {e}")))
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        let mut conn = self.connection().await?;
        redis::cmd("ZCARD")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis ZCARD failed: {e}")))
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("SADD")
            .arg(key)
            .arg(member)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis SADD failed: {e}")))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.connection().await?;
        redis::cmd("SMEMBERS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis SMEMBERS failed: {e}")))
    }

    async fn srem(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("SREM")
            .arg(key)
            .arg(member)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis SREM failed: {e}")))
    }

    async fn scard(&self, key: &str) -> Result<u64> {
        let mut conn = self.connection().await?;
        redis::cmd("SCARD")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis SCARD failed: {e}")))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("HSET")
            .arg(key)
            .arg(field)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis HSET failed: {e}")))
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.connection().await?;
        redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis HGETALL failed: {e}")))
    }

    async fn geoadd(&self, key: &str, member: &str, lng: f64, lat: f64) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("GEOADD")
            .arg(key)
            .arg(lng)
            .arg(lat)
            .arg(member)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis GEOADD failed: {e}")))
    }

    async fn georadius(
        &self,
        key: &str,
        lng: f64,
        lat: f64,
        radius_km: f64,
        count: Option<usize>,
    ) -> Result<Vec<(String, f64)>> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("GEORADIUS");
        cmd.arg(key).arg(lng).arg(lat).arg(radius_km).arg("km").arg("WITHDIST").arg("ASC");
        if let Some(n) = count {
            cmd.arg("COUNT").arg(n);
        }
        let rows: Vec<(String, f64)> = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis GEORADIUS failed: {e}")))?;
        Ok(rows)
    }

    async fn geopos(&self, key: &str, member: &str) -> Result<Option<(f64, f64)>> {
        let mut conn = self.connection().await?;
        let rows: Vec<Option<(f64, f64)>> = redis::cmd("GEOPOS")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis GEOPOS failed: {e}")))?;
        Ok(rows.into_iter().next().flatten())
    }

    async fn memory_usage(&self, key: &str) -> Result<Option<u64>> {
        let mut conn = self.connection().await?;
        redis::cmd("MEMORY")
            .arg("USAGE")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| FacadeError::transient_store(format!("redis MEMORY USAGE failed: {e}")))
    }
}

/// `ZREVRANGE ... WITHSCORES` returns a flat `[member, score, member,
/// score, ...]` array; pair it up and parse scores as `f64`.
fn pair_up_with_scores(flat: Vec<String>) -> Vec<(String, f64)> {
    flat.chunks_exact(2).map(|pair| (pair[0].clone(), pair[1].parse().unwrap_or(0.0))).collect()
}

/// In-memory [`CacheStore`] used by tests. Ignores TTLs entirely, so
/// expiry-dependent behavior must be tested against `RedisCacheStore`
/// directly (gated behind the `test-mysql`/integration harness).
#[cfg(test)]
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    healthy: Arc<Mutex<bool>>,
    zsets: Arc<Mutex<HashMap<String, HashMap<String, f64>>>>,
    sets: Arc<Mutex<HashMap<String, std::collections::HashSet<String>>>>,
    hashes: Arc<Mutex<HashMap<String, HashMap<String, String>>>>,
    geo: Arc<Mutex<HashMap<String, HashMap<String, (f64, f64)>>>>,
}

impl InMemoryCacheStore {
    /// New, empty, healthy store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            healthy: Arc::new(Mutex::new(true)),
            zsets: Arc::new(Mutex::new(HashMap::new())),
            sets: Arc::new(Mutex::new(HashMap::new())),
            hashes: Arc::new(Mutex::new(HashMap::new())),
            geo: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Flip the store into a failing state, so tests can exercise the
    /// cache-miss fallback path without a real Redis outage.
    pub fn set_healthy(&self, healthy: bool) {
        *self.healthy.lock() = healthy;
    }

    /// Number of live entries, for test assertions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store currently holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
fn glob_match(pattern: &str, candidate: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == candidate,
        Some((prefix, suffix)) => {
            candidate.len() >= prefix.len() + suffix.len()
                && candidate.starts_with(prefix)
                && candidate.ends_with(suffix)
        }
    }
}

#[cfg(test)]
#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl: Duration) -> Result<()> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn multi_del(&self, keys: &[String]) -> Result<()> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        let mut entries = self.entries.lock();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        let entries = self.entries.lock();
        let mut matches: Vec<String> =
            entries.keys().filter(|k| glob_match(pattern, k)).cloned().collect();
        matches.sort();
        matches.truncate(MAX_SCAN_BATCH);
        Ok(matches)
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<()> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        // TTLs aren't tracked by this test double; `expire` is a no-op
        // beyond the healthy/key-presence check its callers rely on.
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        if *self.healthy.lock() {
            Ok(())
        } else {
            Err(FacadeError::transient_store("store unavailable"))
        }
    }
}

#[cfg(test)]
fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let (lat1r, lat2r) = (lat1.to_radians(), lat2.to_radians());
    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1r.cos() * lat2r.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Resolve a Redis-style inclusive `[start, stop]` range (negative indices
/// count from the end) into a plain Rust slice range.
#[cfg(test)]
fn resolve_inclusive_range(len: usize, start: isize, stop: isize) -> std::ops::Range<usize> {
    let norm = |i: isize| -> isize { if i < 0 { i + len as isize } else { i } };
    let s = norm(start).clamp(0, len as isize) as usize;
    let e = (norm(stop) + 1).clamp(0, len as isize) as usize;
    if s >= e {
        s..s
    } else {
        s..e
    }
}

#[cfg(test)]
#[async_trait]
impl StructuredStore for InMemoryCacheStore {
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        self.zsets.lock().entry(key.to_string()).or_default().insert(member.to_string(), score);
        Ok(())
    }

    async fn zincrby(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        let mut zsets = self.zsets.lock();
        let set = zsets.entry(key.to_string()).or_default();
        let score = set.entry(member.to_string()).or_insert(0.0);
        *score += delta;
        Ok(*score)
    }

    async fn zrevrange_withscores(&self, key: &str, start: isize, stop: isize) -> Result<Vec<(String, f64)>> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        let zsets = self.zsets.lock();
        let Some(set) = zsets.get(key) else { return Ok(Vec::new()) };
        let mut members: Vec<(String, f64)> = set.iter().map(|(m, s)| (m.clone(), *s)).collect();
        members.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
        let range = resolve_inclusive_range(members.len(), start, stop);
        Ok(members[range].to_vec())
    }

    async fn zinterstore_sum(&self, dest: &str, keys: &[String]) -> Result<()> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        let mut zsets = self.zsets.lock();
        let Some((first, rest)) = keys.split_first() else {
            zsets.insert(dest.to_string(), HashMap::new());
            return Ok(());
        };
        let mut result = zsets.get(first).cloned().unwrap_or_default();
        for key in rest {
            let other = zsets.get(key).cloned().unwrap_or_default();
            result.retain(|member, _| other.contains_key(member));
            for (member, score) in &mut result {
                *score += other.get(member).copied().unwrap_or(0.0);
            }
        }
        zsets.insert(dest.to_string(), result);
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<()> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        if let Some(set) = self.zsets.lock().get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        Ok(self.zsets.lock().get(key).map_or(0, |s| s.len() as u64))
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        self.sets.lock().entry(key.to_string()).or_default().insert(member.to_string());
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        Ok(self.sets.lock().get(key).map(|s| s.iter().cloned().collect()).unwrap_or_default())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<()> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        if let Some(set) = self.sets.lock().get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn scard(&self, key: &str) -> Result<u64> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        Ok(self.sets.lock().get(key).map_or(0, |s| s.len() as u64))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        self.hashes.lock().entry(key.to_string()).or_default().insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        Ok(self.hashes.lock().get(key).cloned().unwrap_or_default())
    }

    async fn geoadd(&self, key: &str, member: &str, lng: f64, lat: f64) -> Result<()> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        self.geo.lock().entry(key.to_string()).or_default().insert(member.to_string(), (lng, lat));
        Ok(())
    }

    async fn georadius(
        &self,
        key: &str,
        lng: f64,
        lat: f64,
        radius_km: f64,
        count: Option<usize>,
    ) -> Result<Vec<(String, f64)>> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        let geo = self.geo.lock();
        let Some(points) = geo.get(key) else { return Ok(Vec::new()) };
        let mut hits: Vec<(String, f64)> = points
            .iter()
            .map(|(member, (plng, plat))| (member.clone(), haversine_km(lat, lng, *plat, *plng)))
            .filter(|(_, dist)| *dist <= radius_km)
            .collect();
        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        if let Some(n) = count {
            hits.truncate(n);
        }
        Ok(hits)
    }

    async fn geopos(&self, key: &str, member: &str) -> Result<Option<(f64, f64)>> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        Ok(self.geo.lock().get(key).and_then(|points| points.get(member).copied()))
    }

    async fn memory_usage(&self, key: &str) -> Result<Option<u64>> {
        if !*self.healthy.lock() {
            return Err(FacadeError::transient_store("store unavailable"));
        }
        Ok(self.entries.lock().get(key).map(|v| v.len() as u64))
    }
}
