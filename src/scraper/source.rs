use crate::scraper::cache::{cache_key, ScrapeCache};
use crate::scraper::{Listing, ScraperError};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::info;

/// Parameters identifying one acquisition request. Ordered so cache keys are
/// stable.
pub type Query = BTreeMap<String, String>;

/// The contract every listing source fulfils. Fetching returns the raw
/// payload; parsing turns it into listings.
pub trait ListingSource {
    fn name(&self) -> &str;
    fn fetch(&self, query: &Query) -> Result<String, ScraperError>;
    fn parse(&self, raw: &str) -> Result<Vec<Listing>, ScraperError>;
}

/// Fetch through the cache: a fresh hit short-circuits the source, otherwise
/// the payload is fetched, parsed and written back.
pub fn scrape(
    source: &dyn ListingSource,
    query: &Query,
    cache: &ScrapeCache,
    use_cache: bool,
) -> Result<Vec<Listing>, ScraperError> {
    let key = cache_key(source.name(), query, Utc::now().date_naive());

    if use_cache {
        if let Some(cached) = cache.get(&key)? {
            return Ok(cached);
        }
    }

    info!(source = source.name(), ?query, "Fetching fresh data");
    let raw = source.fetch(query)?;
    let listings = source.parse(&raw)?;
    cache.put(&key, &listings)?;

    Ok(listings)
}
