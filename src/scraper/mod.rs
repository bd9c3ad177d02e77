mod cache;
mod models;
mod scraper;
mod scraper_error;
mod source;

pub use self::cache::{cache_key, ScrapeCache};
pub use self::models::{Address, Coordinate, Description, Flags, Listing};
pub use self::scraper::{sanitize_text, HtmlPageSource, JsonFileSource};
pub use self::scraper_error::ScraperError;
pub use self::source::{scrape, ListingSource, Query};
