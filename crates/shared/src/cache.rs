//! TTL-keyed analysis cache.
//!
//! Three independent keyspaces back the analyzer: full site characteristics,
//! robots.txt payloads, and sitemap summaries. Reads after expiry behave as
//! misses (read-before-evict); rows are always replaced whole, never merged.

use crate::db::Database;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Logical keyspace, one SQLite table each. No cross-keyspace coupling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKeyspace {
    /// Full WebsiteCharacteristics records, keyed by domain
    WebsiteAnalysis,
    /// Raw robots.txt text, keyed by domain
    Robots,
    /// Sitemap summaries, keyed by sitemap URL
    Sitemap,
}

impl CacheKeyspace {
    fn table(&self) -> &'static str {
        match self {
            CacheKeyspace::WebsiteAnalysis => "website_analysis",
            CacheKeyspace::Robots => "robots_cache",
            CacheKeyspace::Sitemap => "sitemap_cache",
        }
    }

    /// Default TTL per keyspace: characteristics 24h, robots 168h, sitemaps 24h
    pub fn default_ttl(&self) -> Duration {
        match self {
            CacheKeyspace::WebsiteAnalysis => Duration::hours(24),
            CacheKeyspace::Robots => Duration::hours(168),
            CacheKeyspace::Sitemap => Duration::hours(24),
        }
    }

    fn all() -> [CacheKeyspace; 3] {
        [
            CacheKeyspace::WebsiteAnalysis,
            CacheKeyspace::Robots,
            CacheKeyspace::Sitemap,
        ]
    }
}

/// Cache row counts per keyspace
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub analysis_rows: usize,
    pub robots_rows: usize,
    pub sitemap_rows: usize,
}

/// Analysis cache over the shared SQLite database.
///
/// Cloning is cheap; all clones share one connection. The mutex serializes
/// writes so concurrent analyzer calls can never interleave a partial row.
#[derive(Clone)]
pub struct AnalysisCache {
    db: Arc<Mutex<Database>>,
}

impl AnalysisCache {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Get a cached value, treating expired rows as absent
    pub fn get<T: DeserializeOwned>(&self, keyspace: CacheKeyspace, key: &str) -> Result<Option<T>> {
        self.get_at(keyspace, key, Utc::now())
    }

    /// Get with an explicit clock, so expiry is testable without sleeping
    pub fn get_at<T: DeserializeOwned>(
        &self,
        keyspace: CacheKeyspace,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<T>> {
        let db = self.db.lock().unwrap();

        let sql = format!(
            "SELECT payload, expires_at FROM {} WHERE key = ?1",
            keyspace.table()
        );
        let row: Option<(String, DateTime<Utc>)> = db
            .conn()
            .query_row(&sql, params![key], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()
            .with_context(|| format!("Failed to query {} cache", keyspace.table()))?;

        let (payload, expires_at) = match row {
            Some(row) => row,
            None => {
                debug!(keyspace = keyspace.table(), key = key, "Cache miss");
                return Ok(None);
            }
        };

        if expires_at <= now {
            debug!(
                keyspace = keyspace.table(),
                key = key,
                expired_at = %expires_at,
                "Cache entry expired, treating as miss"
            );
            return Ok(None);
        }

        match serde_json::from_str(&payload) {
            Ok(value) => {
                debug!(keyspace = keyspace.table(), key = key, "Cache hit");
                Ok(Some(value))
            }
            Err(e) => {
                // Corrupt payload: miss, so the caller re-analyzes and replaces it
                warn!(
                    keyspace = keyspace.table(),
                    key = key,
                    error = %e,
                    "Undeserializable cache payload, treating as miss"
                );
                Ok(None)
            }
        }
    }

    /// Store a value with the given TTL, replacing any existing row whole
    pub fn put<T: Serialize>(
        &self,
        keyspace: CacheKeyspace,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let now = Utc::now();
        let payload = serde_json::to_string(value).context("Failed to serialize cache payload")?;

        let db = self.db.lock().unwrap();
        let sql = format!(
            "INSERT OR REPLACE INTO {} (key, payload, cached_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            keyspace.table()
        );
        db.conn()
            .execute(&sql, params![key, payload, now, now + ttl])
            .with_context(|| format!("Failed to write {} cache", keyspace.table()))?;

        debug!(
            keyspace = keyspace.table(),
            key = key,
            ttl_hours = ttl.num_hours(),
            "Cache stored"
        );
        Ok(())
    }

    /// Store with the keyspace's default TTL
    pub fn put_default<T: Serialize>(
        &self,
        keyspace: CacheKeyspace,
        key: &str,
        value: &T,
    ) -> Result<()> {
        self.put(keyspace, key, value, keyspace.default_ttl())
    }

    /// Delete expired rows across all keyspaces. Optional housekeeping;
    /// correctness never depends on it.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let db = self.db.lock().unwrap();

        let mut purged = 0;
        for keyspace in CacheKeyspace::all() {
            let sql = format!("DELETE FROM {} WHERE expires_at <= ?1", keyspace.table());
            purged += db
                .conn()
                .execute(&sql, params![now])
                .with_context(|| format!("Failed to purge {} cache", keyspace.table()))?;
        }

        if purged > 0 {
            debug!(purged = purged, "Purged expired cache rows");
        }
        Ok(purged)
    }

    /// Row counts per keyspace
    pub fn stats(&self) -> Result<CacheStats> {
        let db = self.db.lock().unwrap();

        let count = |table: &str| -> Result<usize> {
            let n: i64 = db
                .conn()
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
            Ok(n as usize)
        };

        Ok(CacheStats {
            analysis_rows: count("website_analysis")?,
            robots_rows: count("robots_cache")?,
            sitemap_rows: count("sitemap_cache")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        name: String,
        score: f64,
    }

    fn test_cache() -> AnalysisCache {
        AnalysisCache::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let cache = test_cache();
        let payload = Payload {
            name: "example.com".to_string(),
            score: 4.5,
        };

        cache.put(
            CacheKeyspace::WebsiteAnalysis,
            "example.com",
            &payload,
            Duration::hours(1),
        )?;

        let loaded: Option<Payload> = cache.get(CacheKeyspace::WebsiteAnalysis, "example.com")?;
        assert_eq!(loaded, Some(payload));

        Ok(())
    }

    #[test]
    fn test_expired_read_is_miss() -> Result<()> {
        let cache = test_cache();
        let payload = Payload {
            name: "example.com".to_string(),
            score: 4.5,
        };

        cache.put(
            CacheKeyspace::WebsiteAnalysis,
            "example.com",
            &payload,
            Duration::hours(1),
        )?;

        // Simulate the clock advancing past the TTL
        let later = Utc::now() + Duration::hours(2);
        let loaded: Option<Payload> =
            cache.get_at(CacheKeyspace::WebsiteAnalysis, "example.com", later)?;
        assert_eq!(loaded, None);

        Ok(())
    }

    #[test]
    fn test_keyspaces_are_independent() -> Result<()> {
        let cache = test_cache();

        cache.put(
            CacheKeyspace::Robots,
            "example.com",
            &"User-agent: *".to_string(),
            Duration::hours(1),
        )?;

        let miss: Option<String> = cache.get(CacheKeyspace::WebsiteAnalysis, "example.com")?;
        assert_eq!(miss, None);

        let hit: Option<String> = cache.get(CacheKeyspace::Robots, "example.com")?;
        assert_eq!(hit, Some("User-agent: *".to_string()));

        Ok(())
    }

    #[test]
    fn test_put_replaces_whole_row() -> Result<()> {
        let cache = test_cache();

        cache.put(
            CacheKeyspace::WebsiteAnalysis,
            "example.com",
            &Payload {
                name: "old".to_string(),
                score: 1.0,
            },
            Duration::hours(1),
        )?;
        cache.put(
            CacheKeyspace::WebsiteAnalysis,
            "example.com",
            &Payload {
                name: "new".to_string(),
                score: 2.0,
            },
            Duration::hours(1),
        )?;

        let loaded: Option<Payload> = cache.get(CacheKeyspace::WebsiteAnalysis, "example.com")?;
        assert_eq!(loaded.unwrap().name, "new");

        let stats = cache.stats()?;
        assert_eq!(stats.analysis_rows, 1);

        Ok(())
    }

    #[test]
    fn test_corrupt_payload_is_miss() -> Result<()> {
        let cache = test_cache();

        // A string payload that is not a valid Payload object
        cache.put(
            CacheKeyspace::WebsiteAnalysis,
            "example.com",
            &"not a payload".to_string(),
            Duration::hours(1),
        )?;

        let loaded: Option<Payload> = cache.get(CacheKeyspace::WebsiteAnalysis, "example.com")?;
        assert_eq!(loaded, None);

        Ok(())
    }

    #[test]
    fn test_purge_expired() -> Result<()> {
        let cache = test_cache();

        cache.put(
            CacheKeyspace::Sitemap,
            "https://example.com/sitemap.xml",
            &42u64,
            Duration::seconds(-10),
        )?;
        cache.put(
            CacheKeyspace::Sitemap,
            "https://example.com/sitemap2.xml",
            &7u64,
            Duration::hours(1),
        )?;

        let purged = cache.purge_expired()?;
        assert_eq!(purged, 1);

        let stats = cache.stats()?;
        assert_eq!(stats.sitemap_rows, 1);

        Ok(())
    }
}
