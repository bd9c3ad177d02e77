// src/domain/property.rs

use crate::domain::logic::{derive_canonical_status, CanonicalStatus};
use crate::scraper::{sanitize_text, Listing};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// Static attributes of a property, known at listing time.
/// This acts as an anti-corruption layer between the raw payload and our models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFacts {
    /// Source-scoped identifier, e.g. "realtor:12345678"
    pub id: String,

    pub address_line: String,
    pub city: String,
    pub postal_code: String,

    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,

    #[serde(default)]
    pub beds: Option<f64>,
    #[serde(default)]
    pub baths: Option<f64>,
    #[serde(default)]
    pub sqft: Option<f64>,
    #[serde(default)]
    pub lot_sqft: Option<f64>,
    #[serde(default)]
    pub year_built: Option<i32>,
    #[serde(default)]
    pub property_type: Option<String>,
}

/// A closed sale: the facts of the property plus the observed price and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    #[serde(flatten)]
    pub facts: PropertyFacts,
    pub sale_price: i64,
    pub sale_date: NaiveDate,
    #[serde(default)]
    pub list_price: Option<i64>,
    #[serde(default)]
    pub list_date: Option<NaiveDate>,
}

/// A property to be valued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(flatten)]
    pub facts: PropertyFacts,
    /// Carried through to reports only; never a model input.
    #[serde(default)]
    pub list_price: Option<i64>,
}

/// Prefix IDs with the source so ids can't collide across sources.
/// Example: "realtor:12345678"
pub fn make_scoped_id(source: &str, raw_id: &str) -> String {
    format!("{}:{}", source.trim().to_lowercase(), raw_id.trim())
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates. Timestamps keep
/// their local calendar date.
pub fn parse_listing_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    s.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

impl PropertyFacts {
    /// Creates flattened, clean facts from the raw nested listing model.
    /// It validates that essential fields required for identification exist.
    pub fn from_listing(listing: &Listing) -> Result<Self, String> {
        let address = listing
            .location
            .address
            .as_ref()
            .ok_or("Missing address object")?;

        let address_line = address
            .line
            .as_deref()
            .map(sanitize_text)
            .filter(|s| !s.is_empty())
            .ok_or("Missing or empty address line")?;

        let city = address
            .city
            .as_deref()
            .map(sanitize_text)
            .filter(|s| !s.is_empty())
            .ok_or("Missing or empty city")?;

        // ZIP+4 collapses to the five-digit ZIP
        let postal_code = address
            .postal_code
            .as_deref()
            .map(|s| s.trim().chars().take(5).collect::<String>())
            .filter(|s| !s.is_empty())
            .ok_or("Missing or empty postal code")?;

        let source = listing.source.name.as_deref().unwrap_or("unknown");
        let raw_id = listing.raw_id().ok_or("Missing property and listing id")?;

        let coordinate = listing.location.coordinate.as_ref();
        let description = listing.description.as_ref();

        Ok(PropertyFacts {
            id: make_scoped_id(source, raw_id),
            address_line,
            city,
            postal_code,
            latitude: coordinate.and_then(|c| c.lat),
            longitude: coordinate.and_then(|c| c.lon),
            beds: description.and_then(|d| d.beds),
            baths: description.and_then(|d| d.baths),
            sqft: description.and_then(|d| d.sqft).filter(|v| *v > 0.0),
            lot_sqft: description.and_then(|d| d.lot_sqft).filter(|v| *v > 0.0),
            year_built: description.and_then(|d| d.year_built),
            property_type: description.and_then(|d| d.property_type.clone()),
        })
    }

    /// Normalized address used to detect duplicate records.
    pub fn address_key(&self) -> String {
        format!(
            "{}|{}",
            sanitize_text(&self.address_line).to_lowercase(),
            self.postal_code.trim()
        )
    }
}

impl SaleRecord {
    /// Returns `Ok(None)` for listings that have not closed.
    pub fn from_listing(listing: &Listing) -> Result<Option<Self>, String> {
        let sale_date = listing.closing_date().and_then(parse_listing_date);

        let status = derive_canonical_status(
            &sale_date,
            listing.is_flagged(|f| f.is_pending),
            listing.is_flagged(|f| f.is_contingent),
            listing.is_flagged(|f| f.is_coming_soon),
            &listing.status,
        );

        let sale_date = match (status, sale_date) {
            (CanonicalStatus::Sold, Some(date)) => date,
            _ => return Ok(None),
        };

        let sale_price = listing
            .closing_price()
            .ok_or("Sold listing without a positive sold price")?;

        Ok(Some(SaleRecord {
            facts: PropertyFacts::from_listing(listing)?,
            sale_price,
            sale_date,
            list_price: listing.list_price,
            list_date: listing.list_date.as_deref().and_then(parse_listing_date),
        }))
    }

    pub fn price_per_sqft(&self) -> Option<f64> {
        self.facts
            .sqft
            .filter(|s| *s > 0.0)
            .map(|s| self.sale_price as f64 / s)
    }
}

impl Subject {
    pub fn from_listing(listing: &Listing) -> Result<Self, String> {
        Ok(Subject {
            facts: PropertyFacts::from_listing(listing)?,
            list_price: listing.list_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::{Address, Coordinate, Description, Flags};

    fn listing() -> Listing {
        let mut l = Listing::default();
        l.source.name = Some("Realtor".into());
        l.source.id = Some(" 42 ".into());
        l.location.address = Some(Address {
            line: Some("  100  Main   St ".into()),
            city: Some("Dallas".into()),
            state_code: Some("TX".into()),
            postal_code: Some("75201-1234".into()),
        });
        l.location.coordinate = Some(Coordinate {
            lat: Some(32.78),
            lon: Some(-96.8),
        });
        l.description = Some(Description {
            beds: Some(3.0),
            baths: Some(2.0),
            sqft: Some(2000.0),
            lot_sqft: Some(0.0),
            year_built: Some(2001),
            sold_date: Some("2024-02-10T00:00:00Z".into()),
            sold_price: None,
            property_type: Some("single_family".into()),
        });
        l.sold_price = Some(500_000);
        l.list_price = Some(515_000);
        l.list_date = Some("2024-01-05".into());
        l
    }

    #[test]
    fn facts_are_normalized() {
        let f = PropertyFacts::from_listing(&listing()).unwrap();
        assert_eq!(f.id, "realtor:42");
        assert_eq!(f.address_line, "100 Main St");
        assert_eq!(f.postal_code, "75201");
        assert_eq!(f.lot_sqft, None);
        assert_eq!(f.address_key(), "100 main st|75201");
    }

    #[test]
    fn missing_city_is_rejected() {
        let mut l = listing();
        l.location.address.as_mut().unwrap().city = Some("   ".into());
        assert_eq!(
            PropertyFacts::from_listing(&l).unwrap_err(),
            "Missing or empty city"
        );
    }

    #[test]
    fn sold_listing_becomes_sale() {
        let sale = SaleRecord::from_listing(&listing()).unwrap().unwrap();
        assert_eq!(sale.sale_date, NaiveDate::from_ymd_opt(2024, 2, 10).unwrap());
        assert_eq!(sale.sale_price, 500_000);
        assert_eq!(sale.list_date, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(sale.price_per_sqft(), Some(250.0));
    }

    #[test]
    fn open_listing_is_not_a_sale() {
        let mut l = listing();
        l.description.as_mut().unwrap().sold_date = None;
        l.flags = Some(Flags {
            is_pending: Some(true),
            ..Flags::default()
        });
        assert!(SaleRecord::from_listing(&l).unwrap().is_none());
        let subject = Subject::from_listing(&l).unwrap();
        assert_eq!(subject.list_price, Some(515_000));
    }

    #[test]
    fn sold_without_price_is_an_error() {
        let mut l = listing();
        l.sold_price = None;
        assert!(SaleRecord::from_listing(&l).is_err());
    }

    #[test]
    fn dates_parse_in_both_formats() {
        assert_eq!(
            parse_listing_date("2023-07-04"),
            NaiveDate::from_ymd_opt(2023, 7, 4)
        );
        assert_eq!(
            parse_listing_date("2023-07-04T23:30:00-05:00"),
            NaiveDate::from_ymd_opt(2023, 7, 4)
        );
        assert_eq!(
            parse_listing_date("2023-07-05T00:15:00+00:00"),
            NaiveDate::from_ymd_opt(2023, 7, 5)
        );
        assert_eq!(parse_listing_date("soon"), None);
    }
}
