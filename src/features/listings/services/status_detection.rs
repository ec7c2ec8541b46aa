//! Listing status from a fetched listing page
//!
//! Patterns only match badge text, JSON fields and full sentences. A street
//! named "Sold Lane" must not flip a listing.

use lazy_static::lazy_static;
use regex::Regex;

use crate::features::listings::models::{ListingStatus, ListingType};

lazy_static! {
    static ref SOLD_PATTERNS: Vec<Regex> = [
        r"(?i)>\s*vendu\s*<",
        r#"(?i)class="[^"]*sold[^"]*""#,
        r"(?i)>\s*sold\s*<",
        r#"(?i)"status"\s*:\s*"sold""#,
        r"(?i)sold\s+(?:for|at)\s+\$",
        r"(?i)cette\s+propri[ée]t[ée]\s+a\s+[ée]t[ée]\s+vendue",
        r"(?i)property\s+has\s+been\s+sold",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();

    static ref RENTED_PATTERNS: Vec<Regex> = [
        r"(?i)>\s*lou[ée]\s*<",
        r#"(?i)class="[^"]*rented[^"]*""#,
        r"(?i)>\s*rented\s*<",
        r#"(?i)"status"\s*:\s*"rented""#,
        r"(?i)no\s+longer\s+available\s+for\s+rent",
        r"(?i)property\s+has\s+been\s+rented",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();

    /// The only rented signal trusted on sale listings
    static ref RENTED_JSON_PATTERN: Regex = Regex::new(r#"(?i)"status"\s*:\s*"rented""#).unwrap();

    static ref EXPIRED_PATTERNS: Vec<Regex> = [
        r"(?i)listing\s+(?:has\s+)?expired",
        r"(?i)annonce\s+expir[ée]e",
        r"(?i)this\s+listing\s+is\s+no\s+longer\s+available",
        r"(?i)cette\s+annonce\s+n['’]est\s+plus\s+disponible",
        r"(?i)inscription\s+n['’]est\s+plus\s+disponible",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();

    static ref PRICE_PATTERN: Regex = Regex::new(r"\$[\d,]+").unwrap();
}

/// What a verification fetch concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedStatus {
    Active,
    Sold,
    Rented,
    Expired,
    OffMarket,
    Unknown,
}

impl DetectedStatus {
    /// Status to write, `None` when the row stays as it is
    pub fn status_update(self) -> Option<ListingStatus> {
        match self {
            DetectedStatus::Sold => Some(ListingStatus::Sold),
            DetectedStatus::Rented => Some(ListingStatus::Rented),
            DetectedStatus::Expired => Some(ListingStatus::Expired),
            DetectedStatus::OffMarket => Some(ListingStatus::OffMarket),
            DetectedStatus::Active | DetectedStatus::Unknown => None,
        }
    }
}

/// 404/410 mean the listing page is gone
pub fn status_from_http(status: u16) -> Option<DetectedStatus> {
    matches!(status, 404 | 410).then_some(DetectedStatus::OffMarket)
}

pub fn detect_status(html: &str, listing_type: ListingType) -> DetectedStatus {
    if listing_type == ListingType::Rent && RENTED_PATTERNS.iter().any(|p| p.is_match(html)) {
        return DetectedStatus::Rented;
    }

    if SOLD_PATTERNS.iter().any(|p| p.is_match(html)) {
        return DetectedStatus::Sold;
    }

    if listing_type != ListingType::Rent && RENTED_JSON_PATTERN.is_match(html) {
        return DetectedStatus::Rented;
    }

    if EXPIRED_PATTERNS.iter().any(|p| p.is_match(html)) {
        return DetectedStatus::Expired;
    }

    let has_listing_content =
        html.contains("Features") || html.contains("Description") || html.contains("Bedrooms");
    if has_listing_content && PRICE_PATTERN.is_match(html) {
        return DetectedStatus::Active;
    }

    DetectedStatus::Unknown
}
