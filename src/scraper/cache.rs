use crate::scraper::{Listing, ScraperError};
use crate::scraper::source::Query;
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

const SECS_PER_DAY: u64 = 86_400;

/// Directory of raw listing payloads, one JSON file per cache key.
pub struct ScrapeCache {
    dir: PathBuf,
    enabled: bool,
    ttl_days: i64,
}

impl ScrapeCache {
    pub fn new(dir: impl AsRef<Path>, enabled: bool, ttl_days: i64) -> Result<Self, ScraperError> {
        let dir = dir.as_ref().to_path_buf();
        if enabled {
            fs::create_dir_all(&dir).map_err(|e| ScraperError::IoError(e.to_string()))?;
        }
        Ok(Self {
            dir,
            enabled,
            ttl_days,
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<Listing>>, ScraperError> {
        self.get_at(key, SystemTime::now())
    }

    /// Cached listings for `key` if present and no older than the TTL at `now`.
    pub fn get_at(&self, key: &str, now: SystemTime) -> Result<Option<Vec<Listing>>, ScraperError> {
        if !self.enabled {
            return Ok(None);
        }

        let path = self.path_for(key);
        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(m) => m,
            Err(_) => {
                debug!("Cache miss: {key}");
                return Ok(None);
            }
        };

        let age_days = now
            .duration_since(modified)
            .map(|d| (d.as_secs() / SECS_PER_DAY) as i64)
            .unwrap_or(0);

        if age_days > self.ttl_days {
            info!("Cache stale ({age_days} days old): {key}");
            return Ok(None);
        }

        let content =
            fs::read_to_string(&path).map_err(|e| ScraperError::IoError(e.to_string()))?;
        let listings: Vec<Listing> =
            serde_json::from_str(&content).map_err(|e| ScraperError::JsonParse(e.to_string()))?;

        info!("Cache hit ({age_days} days old): {key}");
        Ok(Some(listings))
    }

    pub fn put(&self, key: &str, listings: &[Listing]) -> Result<(), ScraperError> {
        if !self.enabled {
            return Ok(());
        }

        let json = serde_json::to_string(listings)
            .map_err(|e| ScraperError::JsonParse(e.to_string()))?;
        fs::write(self.path_for(key), json).map_err(|e| ScraperError::IoError(e.to_string()))?;

        info!("Saved to cache: {key} ({} rows)", listings.len());
        Ok(())
    }
}

/// `<source>_<YYYYMM>_<first 12 hex chars of sha256("k=v_k=v")>`
pub fn cache_key(source: &str, query: &Query, today: NaiveDate) -> String {
    let key_string = query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("_");

    let digest = format!("{:x}", Sha256::digest(key_string.as_bytes()));

    format!(
        "{}_{}_{}",
        source.to_lowercase(),
        today.format("%Y%m"),
        &digest[..12]
    )
}
