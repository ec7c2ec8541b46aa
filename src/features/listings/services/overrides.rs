use std::collections::HashMap;

use crate::features::listings::models::{ListingStatus, PropertyRow};

/// Listings scraped from one group of source URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Regular,
    /// Broker's own listings, shown first on the site
    Featured,
    /// Recently sold listings kept for the track record
    Sold,
    /// Area-wide map search results; never the broker's own
    MapSearch,
}

impl SourceKind {
    fn apply(self, row: &mut PropertyRow) {
        match self {
            SourceKind::Regular => {}
            SourceKind::Featured => row.is_featured = true,
            SourceKind::Sold => row.status = ListingStatus::Sold,
            SourceKind::MapSearch => row.is_featured = false,
        }
    }

    /// A source URL that is itself the map search is treated as one
    pub fn for_url(self, url: &str, map_fallback: Option<&str>) -> SourceKind {
        match map_fallback {
            Some(fallback) if self != SourceKind::Sold && url == fallback => SourceKind::MapSearch,
            _ => self,
        }
    }
}

/// URL to scrape instead when `url` produced no listings. Sold groups are
/// not retried since map results are active listings.
pub fn map_fallback<'a>(
    kind: SourceKind,
    url: &str,
    fallback: Option<&'a str>,
    found: usize,
) -> Option<&'a str> {
    match fallback {
        Some(fallback) if found == 0 && kind != SourceKind::Sold && url != fallback => {
            Some(fallback)
        }
        _ => None,
    }
}

/// Apply per-source overrides and keep one row per MLS number. Later
/// batches replace earlier ones; first-seen order is kept.
pub fn merge_listings(batches: Vec<(SourceKind, Vec<PropertyRow>)>) -> Vec<PropertyRow> {
    let mut rows: Vec<PropertyRow> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (kind, batch) in batches {
        for mut row in batch {
            kind.apply(&mut row);
            match index.get(&row.mls_number) {
                Some(&position) => rows[position] = row,
                None => {
                    index.insert(row.mls_number.clone(), rows.len());
                    rows.push(row);
                }
            }
        }
    }

    rows
}
