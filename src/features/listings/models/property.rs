use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    Sale,
    Rent,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::Sale => "sale",
            ListingType::Rent => "rent",
        }
    }

    pub fn from_db(value: &str) -> Self {
        if value.eq_ignore_ascii_case("rent") {
            ListingType::Rent
        } else {
            ListingType::Sale
        }
    }
}

/// Lifecycle status stored in `properties.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    Sold,
    Rented,
    Expired,
    OffMarket,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Sold => "sold",
            ListingStatus::Rented => "rented",
            ListingStatus::Expired => "expired",
            ListingStatus::OffMarket => "off_market",
        }
    }
}

/// Normalized listing, one row of `properties` keyed by `mls_number`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyRow {
    pub mls_number: String,
    pub title: String,
    pub slug: String,
    pub property_type: &'static str,
    pub listing_type: ListingType,
    pub status: ListingStatus,
    pub price: i64,
    pub price_label: &'static str,
    pub address: String,
    pub neighborhood: Option<String>,
    pub city: String,
    pub province: String,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<f64>,
    pub area: Option<String>,
    pub area_unit: &'static str,
    pub description: Option<String>,
    pub main_image_url: Option<String>,
    pub gallery_images: Vec<String>,
    pub is_featured: bool,
    pub is_prestige: bool,
    pub original_url: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub postal_code: Option<String>,
}

/// Active listing picked for re-verification
#[derive(Debug, Clone, FromRow)]
pub struct ListingToVerify {
    pub mls_number: String,
    pub original_url: String,
    pub listing_type: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerificationSummary {
    pub verified: usize,
    pub updated: usize,
    pub unknown: usize,
}

/// Outcome for one target database
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseSyncResult {
    /// Connection string with the password masked
    pub database: String,
    pub imported: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub fetched: usize,
    pub databases: Vec<DatabaseSyncResult>,
}

impl SyncReport {
    pub fn failed_databases(&self) -> usize {
        self.databases.iter().filter(|db| db.error.is_some()).count()
    }
}
