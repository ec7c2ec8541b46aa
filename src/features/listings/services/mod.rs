mod mapper;
mod overrides;
mod status_detection;
mod sync_service;
mod verification_service;

pub use mapper::{
    extract_postal_code, is_listing_item, map_listing_item, map_property_type, parse_price,
};
pub use overrides::{map_fallback, merge_listings, SourceKind};
pub use status_detection::{detect_status, status_from_http, DetectedStatus};
pub use sync_service::{ensure_schema, import_listings, ListingSyncService};
pub use verification_service::ListingVerifier;
