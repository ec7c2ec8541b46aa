// =============================================================================
// X-RAY INGESTION
// =============================================================================

/// File extensions treated as DICOM regardless of the declared MIME type
pub const DICOM_EXTENSIONS: &[&str] = &["dcm", "dicom"];

/// MIME type declared by DICOM-aware uploaders
pub const DICOM_MIME_TYPE: &str = "application/dicom";

/// URL scheme used for variants that could not be generated
pub const PLACEHOLDER_URL_SCHEME: &str = "placeholder://";

/// Storage path segment for X-ray objects
pub const XRAY_STORAGE_PURPOSE: &str = "xrays";

// =============================================================================
// REPORTING
// =============================================================================

/// Custom ranges up to this many days are broken down per day, longer ones per week
pub const DAILY_BREAKDOWN_MAX_DAYS: i64 = 30;

// =============================================================================
// LISTINGS
// =============================================================================

/// Sale listings at or above this price are flagged as prestige
pub const PRESTIGE_PRICE_THRESHOLD: i64 = 1_000_000;

/// Browser user agent for listing page verification
pub const LISTING_VERIFY_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";
