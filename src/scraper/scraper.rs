// scraper.rs
use crate::scraper::source::{ListingSource, Query};
use crate::scraper::{Listing, ScraperError};
use scraper::{Html, Selector};
use serde_json::Value;
use std::fs;
use tracing::debug;

/// Reads a JSON array of listing objects from `query["path"]`.
pub struct JsonFileSource;

/// Reads a saved listing-search page from `query["path"]` and pulls the
/// listings out of its embedded `__NEXT_DATA__` script.
pub struct HtmlPageSource;

fn read_query_path(query: &Query) -> Result<String, ScraperError> {
    let path = query
        .get("path")
        .ok_or_else(|| ScraperError::Source("query has no 'path'".to_string()))?;
    debug!("Reading {path}");
    fs::read_to_string(path).map_err(|e| ScraperError::IoError(format!("{path}: {e}")))
}

impl ListingSource for JsonFileSource {
    fn name(&self) -> &str {
        "jsonfile"
    }

    fn fetch(&self, query: &Query) -> Result<String, ScraperError> {
        read_query_path(query)
    }

    fn parse(&self, raw: &str) -> Result<Vec<Listing>, ScraperError> {
        let data: Value =
            serde_json::from_str(raw).map_err(|e| ScraperError::JsonParse(e.to_string()))?;
        extract_listings_array(&data)
    }
}

impl ListingSource for HtmlPageSource {
    fn name(&self) -> &str {
        "htmlpage"
    }

    fn fetch(&self, query: &Query) -> Result<String, ScraperError> {
        read_query_path(query)
    }

    fn parse(&self, raw: &str) -> Result<Vec<Listing>, ScraperError> {
        let data = extract_next_data(raw)?;
        extract_listings(&data)
    }
}

pub fn extract_next_data(html: &str) -> Result<Value, ScraperError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[id="__NEXT_DATA__"]"#)
        .map_err(|e| ScraperError::HtmlParse(e.to_string()))?;

    let element = document
        .select(&selector)
        .next()
        .ok_or(ScraperError::MissingNextData)?;

    let json_text = element.text().next().ok_or(ScraperError::MissingNextData)?;
    let data: Value =
        serde_json::from_str(json_text).map_err(|e| ScraperError::JsonParse(e.to_string()))?;
    Ok(data)
}

pub fn extract_listings(data: &Value) -> Result<Vec<Listing>, ScraperError> {
    let arr = &data["props"]["pageProps"]["properties"];
    if !arr.is_array() {
        return Err(ScraperError::UnexpectedShape(
            "properties missing".to_string(),
        ));
    }
    extract_listings_array(arr)
}

fn extract_listings_array(data: &Value) -> Result<Vec<Listing>, ScraperError> {
    let arr = data.as_array().ok_or(ScraperError::UnexpectedShape(
        "expected an array of listings".to_string(),
    ))?;

    let listings: Result<Vec<Listing>, _> = arr
        .iter()
        .map(|v| serde_json::from_value(v.clone()))
        .collect();

    listings.map_err(|e| ScraperError::Deserialize(e.to_string()))
}

/// Collapse runs of whitespace and trim.
pub fn sanitize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
