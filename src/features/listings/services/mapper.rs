//! Scraped realtor items → `PropertyRow`
//!
//! The two actors disagree on key casing (`MlsNumber` vs `mlsNumber`) and on
//! where photos live, so every lookup tries both spellings.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::features::listings::models::{ListingStatus, ListingType, PropertyRow};
use crate::shared::constants::PRESTIGE_PRICE_THRESHOLD;

const DEFAULT_CITY: &str = "Montréal";
const DEFAULT_PROVINCE: &str = "Quebec";
const MAX_TEXT_LEN: usize = 500;
const MAX_DESCRIPTION_LEN: usize = 5000;

lazy_static! {
    /// Canadian postal code, `A1A 1A1` with optional space or dash
    static ref POSTAL_CODE_REGEX: Regex =
        Regex::new(r"\b([A-Za-z]\d[A-Za-z])[ -]?(\d[A-Za-z]\d)\b").unwrap();

    static ref LEADING_NUMBER_REGEX: Regex =
        Regex::new(r"^\s*([-+]?(?:\d+\.?\d*|\.\d+))").unwrap();

    static ref SLUG_UNSAFE_REGEX: Regex = Regex::new(r"[^a-zA-Z0-9-]").unwrap();
}

/// JS-style truthiness: skips null, false, 0 and empty strings
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// First truthy value among `keys`
fn pick<'a>(object: Option<&'a Value>, keys: &[&str]) -> Option<&'a Value> {
    let object = object?;
    keys.iter()
        .filter_map(|key| object.get(key))
        .find(|value| is_truthy(value))
}

/// First non-null value among `keys`
fn pick_present<'a>(object: Option<&'a Value>, keys: &[&str]) -> Option<&'a Value> {
    let object = object?;
    keys.iter()
        .filter_map(|key| object.get(key))
        .find(|value| !value.is_null())
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn leading_number(text: &str) -> Option<f64> {
    LEADING_NUMBER_REGEX
        .captures(text)
        .and_then(|c| c[1].parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => leading_number(s),
        _ => None,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Digits only: `"$1,250,000"` → 1250000
pub fn parse_price(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64),
        Value::String(s) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse::<i64>().ok()
        }
        _ => None,
    }
}

/// Uppercase, no separator: `"h2x 1y4"` → `"H2X1Y4"`
pub fn extract_postal_code(text: &str) -> Option<String> {
    POSTAL_CODE_REGEX
        .captures(text)
        .map(|c| format!("{}{}", &c[1], &c[2]).to_ascii_uppercase())
}

pub fn map_property_type(raw: Option<&str>) -> &'static str {
    let t = raw.unwrap_or("").to_lowercase();
    if t.contains("condo") || t.contains("apartment") {
        "condo"
    } else if t.contains("house") || t.contains("single family") || t.contains("detached") {
        "house"
    } else if t.contains("townhouse") || t.contains("town house") {
        "townhouse"
    } else if t.contains("duplex") {
        "duplex"
    } else if t.contains("triplex") {
        "triplex"
    } else if t.contains("commercial") {
        "commercial"
    } else if t.contains("land") {
        "land"
    } else {
        "apartment"
    }
}

/// Property listings only; one actor also returns agent profiles
pub fn is_listing_item(item: &Value) -> bool {
    pick(Some(item), &["MlsNumber", "mlsNumber"]).is_some()
        || (pick(Some(item), &["Id"]).is_some() && pick(Some(item), &["Property"]).is_some())
}

fn photo_url(photo: &Value) -> Option<String> {
    pick(Some(photo), &["HighResPath", "MedResPath", "LowResPath"]).and_then(as_text)
}

/// `None` when the item has no MLS number
pub fn map_listing_item(item: &Value) -> Option<PropertyRow> {
    let mls = pick(Some(item), &["MlsNumber", "mlsNumber", "Id", "id"])
        .and_then(as_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())?;

    let building = pick(Some(item), &["Building", "building"]);
    let property = pick(Some(item), &["Property", "property"]);
    let address = pick(property, &["Address", "address"]);

    let price = pick(property, &["Price", "price"])
        .or_else(|| pick(Some(item), &["Price", "price"]))
        .and_then(parse_price)
        .unwrap_or(0);

    let address_text = pick(address, &["AddressText", "addressText"])
        .or_else(|| pick(Some(item), &["Address", "address"]))
        .and_then(as_text);
    let city = pick(address, &["City", "city"])
        .or_else(|| pick(Some(item), &["City", "city"]))
        .and_then(as_text);
    let province = pick(address, &["Province", "province"])
        .or_else(|| pick(Some(item), &["Province", "province", "ProvinceName"]))
        .and_then(as_text);
    let latitude = pick(address, &["Latitude", "latitude"])
        .or_else(|| pick(Some(item), &["Latitude", "latitude"]))
        .and_then(as_number);
    let longitude = pick(address, &["Longitude", "longitude"])
        .or_else(|| pick(Some(item), &["Longitude", "longitude"]))
        .and_then(as_number);

    let bedrooms = pick_present(building, &["Bedrooms", "bedrooms"])
        .or_else(|| pick_present(Some(item), &["Bedrooms", "bedrooms"]))
        .and_then(as_number)
        .map(|n| n.trunc() as i32);
    let bathrooms = pick_present(building, &["BathroomTotal", "bathroomTotal"])
        .or_else(|| pick_present(Some(item), &["BathroomTotal", "bathroomTotal"]))
        .and_then(as_number);

    let property_type = map_property_type(
        pick(building, &["Type", "type"])
            .or_else(|| pick(property, &["Type", "type"]))
            .and_then(Value::as_str),
    );

    let status_id = pick(Some(item), &["StatusId", "statusId"]).and_then(as_text);
    let listing_type = if status_id.as_deref() == Some("3") {
        ListingType::Rent
    } else {
        ListingType::Sale
    };

    let photos: Vec<String> = pick(Some(item), &["Photo", "photo"])
        .or_else(|| pick(property, &["Photo", "photo"]))
        .and_then(Value::as_array)
        .map(|photos| photos.iter().filter_map(photo_url).collect())
        .unwrap_or_default();

    let area = pick(building, &["SizeInterior", "sizeInterior"]).and_then(as_text);
    let description = pick(Some(item), &["PublicRemarks", "publicRemarks", "Description", "description"])
        .and_then(as_text)
        .map(|d| truncate(&d, MAX_DESCRIPTION_LEN))
        .filter(|d| !d.is_empty());
    let neighborhood = pick(address, &["CommunityName", "communityName"]).and_then(as_text);

    let fallback_title = format!("Property {}", mls);
    let first_segment = |text: &str| {
        truncate(text.split('|').next().unwrap_or("").trim(), MAX_TEXT_LEN)
    };
    let title = Some(first_segment(address_text.as_deref().unwrap_or(&fallback_title)))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback_title.clone());
    let street = Some(first_segment(address_text.as_deref().unwrap_or(&title)))
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| title.clone());

    let postal_code = pick(address, &["PostalCode", "postalCode"])
        .or_else(|| pick(Some(item), &["PostalCode", "postalCode"]))
        .and_then(as_text)
        .and_then(|p| extract_postal_code(&p))
        .or_else(|| address_text.as_deref().and_then(extract_postal_code));

    let listing_id = pick(Some(item), &["Id"]).and_then(as_text).unwrap_or_else(|| mls.clone());
    let slug = truncate(
        &SLUG_UNSAFE_REGEX.replace_all(&format!("realtor-{}", mls), "-"),
        MAX_TEXT_LEN,
    );

    Some(PropertyRow {
        slug,
        title,
        property_type,
        listing_type,
        status: ListingStatus::Active,
        price,
        price_label: match listing_type {
            ListingType::Rent => "mo",
            ListingType::Sale => "",
        },
        address: street,
        neighborhood,
        city: city.unwrap_or_else(|| DEFAULT_CITY.to_string()),
        province: province.unwrap_or_else(|| DEFAULT_PROVINCE.to_string()),
        bedrooms,
        bathrooms,
        area,
        area_unit: "ft²",
        description,
        main_image_url: photos.first().cloned(),
        gallery_images: photos,
        is_featured: false,
        is_prestige: listing_type == ListingType::Sale && price >= PRESTIGE_PRICE_THRESHOLD,
        original_url: format!("https://www.realtor.ca/real-estate/{}/", listing_id),
        latitude,
        longitude,
        postal_code,
        mls_number: mls,
    })
}
