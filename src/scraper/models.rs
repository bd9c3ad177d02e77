//! Listing-search payload model.
//!
//! Sold and active listings share one shape. Sale fields appear either at the
//! top level (`sold_price`, `last_sold_*`) or under `description`, depending
//! on the search that produced the payload.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Listing {
    pub property_id: Option<String>,
    pub source: Source,
    pub location: Location,
    pub description: Option<Description>,

    pub status: Option<String>,
    pub list_price: Option<i64>,
    pub list_date: Option<String>,
    pub sold_price: Option<i64>,
    pub last_sold_price: Option<i64>,
    pub last_sold_date: Option<String>,

    pub flags: Option<Flags>,
}

impl Listing {
    /// The most specific identifier present: the source's property id, then
    /// the payload's property id, then the listing id.
    pub fn raw_id(&self) -> Option<&str> {
        self.source
            .id
            .as_deref()
            .or(self.property_id.as_deref())
            .or(self.source.listing_id.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn closing_date(&self) -> Option<&str> {
        self.description
            .as_ref()
            .and_then(|d| d.sold_date.as_deref())
            .or(self.last_sold_date.as_deref())
    }

    /// First positive closing price found.
    pub fn closing_price(&self) -> Option<i64> {
        [
            self.sold_price,
            self.description.as_ref().and_then(|d| d.sold_price),
            self.last_sold_price,
        ]
        .into_iter()
        .flatten()
        .find(|p| *p > 0)
    }

    pub fn is_flagged(&self, flag: impl Fn(&Flags) -> Option<bool>) -> bool {
        self.flags.as_ref().and_then(flag).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Source {
    pub name: Option<String>,
    pub id: Option<String>,
    pub listing_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Location {
    pub address: Option<Address>,
    pub coordinate: Option<Coordinate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    pub line: Option<String>,
    pub city: Option<String>,
    pub state_code: Option<String>,
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Physical facts plus, for sold searches, the closing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Description {
    pub beds: Option<f64>,
    pub baths: Option<f64>,
    pub sqft: Option<f64>,
    pub lot_sqft: Option<f64>,
    pub year_built: Option<i32>,
    pub sold_date: Option<String>,
    pub sold_price: Option<i64>,
    #[serde(rename = "type")]
    pub property_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flags {
    pub is_coming_soon: Option<bool>,
    pub is_contingent: Option<bool>,
    pub is_pending: Option<bool>,
    pub is_new_construction: Option<bool>,
}
