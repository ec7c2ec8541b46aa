use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::core::config::ListingSyncConfig;
use crate::core::database::{create_target_pool, redact_database_url};
use crate::core::error::{AppError, Result};
use crate::features::listings::models::{DatabaseSyncResult, PropertyRow, SyncReport};
use crate::features::listings::services::{
    is_listing_item, map_fallback, map_listing_item, merge_listings, ListingVerifier,
    SourceKind,
};
use crate::modules::apify::ApifyClient;

/// Idempotent; target databases are owned by the broker sites and may predate
/// some columns
const ENSURE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS properties (
        id BIGSERIAL PRIMARY KEY,
        mls_number VARCHAR(50) NOT NULL UNIQUE,
        title VARCHAR(500) NOT NULL,
        slug VARCHAR(500) NOT NULL,
        property_type VARCHAR(50) NOT NULL,
        listing_type VARCHAR(20) NOT NULL,
        status VARCHAR(20) NOT NULL DEFAULT 'active',
        price NUMERIC(14, 2) NOT NULL DEFAULT 0,
        price_label VARCHAR(20) NOT NULL DEFAULT '',
        address VARCHAR(500) NOT NULL,
        neighborhood VARCHAR(255),
        city VARCHAR(255) NOT NULL,
        province VARCHAR(100) NOT NULL,
        bedrooms INTEGER,
        bathrooms DOUBLE PRECISION,
        area VARCHAR(100),
        area_unit VARCHAR(20),
        description TEXT,
        main_image_url TEXT,
        gallery_images JSONB NOT NULL DEFAULT '[]',
        is_featured BOOLEAN NOT NULL DEFAULT FALSE,
        is_prestige BOOLEAN NOT NULL DEFAULT FALSE,
        room_details JSONB,
        original_url TEXT,
        latitude DOUBLE PRECISION,
        longitude DOUBLE PRECISION,
        postal_code VARCHAR(10),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "ALTER TABLE properties ADD COLUMN IF NOT EXISTS postal_code VARCHAR(10)",
    "ALTER TABLE properties ADD COLUMN IF NOT EXISTS updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_properties_mls_number ON properties (mls_number)",
    "CREATE INDEX IF NOT EXISTS idx_properties_status ON properties (status)",
    "CREATE INDEX IF NOT EXISTS idx_properties_postal_code ON properties (postal_code) WHERE postal_code IS NOT NULL",
];

const UPSERT_PROPERTY: &str = r#"
    INSERT INTO properties (
        mls_number, title, slug, property_type, listing_type, status, price, price_label,
        address, neighborhood, city, province, bedrooms, bathrooms, area, area_unit,
        description, main_image_url, gallery_images, is_featured, is_prestige, room_details,
        original_url, latitude, longitude, postal_code
    )
    VALUES (
        $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
        $17, $18, $19, $20, $21, NULL, $22, $23, $24, $25
    )
    ON CONFLICT (mls_number) DO UPDATE SET
        title = EXCLUDED.title,
        slug = EXCLUDED.slug,
        property_type = EXCLUDED.property_type,
        listing_type = EXCLUDED.listing_type,
        status = EXCLUDED.status,
        price = EXCLUDED.price,
        price_label = EXCLUDED.price_label,
        address = EXCLUDED.address,
        neighborhood = EXCLUDED.neighborhood,
        city = EXCLUDED.city,
        province = EXCLUDED.province,
        bedrooms = EXCLUDED.bedrooms,
        bathrooms = EXCLUDED.bathrooms,
        area = EXCLUDED.area,
        area_unit = EXCLUDED.area_unit,
        description = EXCLUDED.description,
        main_image_url = EXCLUDED.main_image_url,
        gallery_images = EXCLUDED.gallery_images,
        is_featured = EXCLUDED.is_featured,
        is_prestige = EXCLUDED.is_prestige,
        room_details = EXCLUDED.room_details,
        original_url = EXCLUDED.original_url,
        latitude = EXCLUDED.latitude,
        longitude = EXCLUDED.longitude,
        postal_code = EXCLUDED.postal_code,
        updated_at = NOW()
"#;

/// Scrape → map → upsert into every target database → verify
pub struct ListingSyncService {
    /// Main application database, used to discover target databases
    main_pool: Option<PgPool>,
    apify: ApifyClient,
    verifier: ListingVerifier,
    config: ListingSyncConfig,
}

impl ListingSyncService {
    pub fn new(main_pool: Option<PgPool>, config: ListingSyncConfig) -> Result<Self> {
        let apify = ApifyClient::new(&config.apify_base_url, &config.apify_token)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let verifier = ListingVerifier::new(config.verify_limit)?;

        Ok(Self {
            main_pool,
            apify,
            verifier,
            config,
        })
    }

    pub async fn run(&self) -> Result<SyncReport> {
        let groups = [
            (SourceKind::Regular, &self.config.source_urls),
            (SourceKind::Featured, &self.config.featured_urls),
            (SourceKind::Sold, &self.config.sold_urls),
        ];

        let mut batches = Vec::new();
        for (kind, urls) in groups {
            let group = self.scrape_group(kind, urls).await;
            let count: usize = group.iter().map(|(_, rows)| rows.len()).sum();
            tracing::info!("Scraped {} {:?} listings", count, kind);
            batches.extend(group);
        }

        let listings = merge_listings(batches);
        if listings.is_empty() {
            return Err(AppError::ExternalServiceError(
                "Listing scrape returned no listings".to_string(),
            ));
        }

        let targets = self.target_databases().await?;
        if targets.is_empty() {
            tracing::warn!("No target listing databases configured");
        }

        let mut databases = Vec::with_capacity(targets.len());
        for url in &targets {
            databases.push(self.sync_database(url, &listings).await);
        }

        Ok(SyncReport {
            fetched: listings.len(),
            databases,
        })
    }

    /// One batch per URL. A URL with no listings is retried once against
    /// the map search, whose rows are then never featured.
    async fn scrape_group(
        &self,
        kind: SourceKind,
        urls: &[String],
    ) -> Vec<(SourceKind, Vec<PropertyRow>)> {
        let fallback = self.config.map_fallback_url.as_deref();
        let mut batches = Vec::with_capacity(urls.len());

        for url in urls {
            let rows = self.scrape_url(url).await;
            match map_fallback(kind, url, fallback, rows.len()) {
                Some(fallback_url) => {
                    tracing::info!("No listings from {}, trying map search fallback", url);
                    let rows = self.scrape_url(fallback_url).await;
                    batches.push((SourceKind::MapSearch, rows));
                }
                None => batches.push((kind.for_url(url, fallback), rows)),
            }
        }

        batches
    }

    /// Failures are logged and yield no rows
    async fn scrape_url(&self, url: &str) -> Vec<PropertyRow> {
        match self
            .apify
            .scrape(&self.config.actor_ids, url, self.config.max_items)
            .await
        {
            Ok(items) => items
                .iter()
                .filter(|item| is_listing_item(item))
                .filter_map(map_listing_item)
                .collect(),
            Err(e) => {
                tracing::error!("Scrape of {} failed: {}", url, e);
                Vec::new()
            }
        }
    }

    /// Configured URLs, else the listing databases of deployed websites
    pub async fn target_databases(&self) -> Result<Vec<String>> {
        if !self.config.database_urls.is_empty() {
            return Ok(self.config.database_urls.clone());
        }

        let Some(pool) = &self.main_pool else {
            return Ok(Vec::new());
        };

        let urls = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT listings_database_url
            FROM websites
            WHERE is_deployed
              AND listings_database_url IS NOT NULL
              AND listings_database_url <> ''
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(urls)
    }

    /// Never fails; the error lands in the result
    async fn sync_database(&self, url: &str, listings: &[PropertyRow]) -> DatabaseSyncResult {
        let mut result = DatabaseSyncResult {
            database: redact_database_url(url),
            imported: 0,
            error: None,
            verification: None,
        };

        let pool = match create_target_pool(url).await {
            Ok(pool) => pool,
            Err(e) => {
                tracing::error!("Cannot connect to {}: {}", result.database, e);
                result.error = Some(format!("Connection failed: {}", e));
                return result;
            }
        };

        match import_listings(&pool, listings).await {
            Ok(count) => {
                tracing::info!("Imported {} listings into {}", count, result.database);
                result.imported = count;
            }
            Err(e) => {
                tracing::error!("Import into {} failed: {}", result.database, e);
                result.error = Some(e.to_string());
                pool.close().await;
                return result;
            }
        }

        let scraped: Vec<String> = listings.iter().map(|l| l.mls_number.clone()).collect();
        match self.verifier.verify_vanished(&pool, &scraped).await {
            Ok(summary) => result.verification = Some(summary),
            Err(e) => tracing::warn!("Verification on {} failed: {}", result.database, e),
        }

        pool.close().await;
        result
    }
}

pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in ENSURE_SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// All rows or none for one database
pub async fn import_listings(pool: &PgPool, listings: &[PropertyRow]) -> Result<usize> {
    ensure_schema(pool).await?;

    let mut tx = pool.begin().await?;
    for row in listings {
        sqlx::query(UPSERT_PROPERTY)
            .bind(&row.mls_number)
            .bind(&row.title)
            .bind(&row.slug)
            .bind(row.property_type)
            .bind(row.listing_type.as_str())
            .bind(row.status.as_str())
            .bind(Decimal::from(row.price))
            .bind(row.price_label)
            .bind(&row.address)
            .bind(&row.neighborhood)
            .bind(&row.city)
            .bind(&row.province)
            .bind(row.bedrooms)
            .bind(row.bathrooms)
            .bind(&row.area)
            .bind(row.area_unit)
            .bind(&row.description)
            .bind(&row.main_image_url)
            .bind(Json(row.gallery_images.clone()))
            .bind(row.is_featured)
            .bind(row.is_prestige)
            .bind(&row.original_url)
            .bind(row.latitude)
            .bind(row.longitude)
            .bind(&row.postal_code)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(listings.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Needs `DATABASE_URL` pointing at a scratch database
    #[tokio::test]
    #[ignore]
    async fn test_upsert_is_idempotent_by_mls_number() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let pool = create_target_pool(&url).await.unwrap();

        let mls = format!("TEST-{}", uuid::Uuid::new_v4().simple());
        let mut row = map_listing_item(&json!({ "MlsNumber": mls, "Price": "$500,000" })).unwrap();

        import_listings(&pool, std::slice::from_ref(&row)).await.unwrap();
        row.price = 525_000;
        import_listings(&pool, std::slice::from_ref(&row)).await.unwrap();

        let (count, price): (i64, Decimal) = sqlx::query_as(
            "SELECT COUNT(*) OVER (), price FROM properties WHERE mls_number = $1",
        )
        .bind(&mls)
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(count, 1);
        assert_eq!(price, Decimal::from(525_000));

        sqlx::query("DELETE FROM properties WHERE mls_number = $1")
            .bind(&mls)
            .execute(&pool)
            .await
            .unwrap();
    }
}
