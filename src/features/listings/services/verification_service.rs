use reqwest::Client;
use sqlx::PgPool;
use std::time::Duration;

use crate::core::error::{AppError, Result};
use crate::features::listings::models::{ListingToVerify, ListingType, VerificationSummary};
use crate::features::listings::services::status_detection::{
    detect_status, status_from_http, DetectedStatus,
};
use crate::shared::constants::LISTING_VERIFY_USER_AGENT;

/// Pause between page fetches
const FETCH_DELAY: Duration = Duration::from_millis(500);

/// Re-checks active listings that disappeared from the latest scrape
pub struct ListingVerifier {
    client: Client,
    limit: i64,
}

impl ListingVerifier {
    pub fn new(limit: i64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(LISTING_VERIFY_USER_AGENT)
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, limit })
    }

    /// Only updates rows whose new status was positively detected
    pub async fn verify_vanished(
        &self,
        pool: &PgPool,
        scraped_mls: &[String],
    ) -> Result<VerificationSummary> {
        let candidates = sqlx::query_as::<_, ListingToVerify>(
            r#"
            SELECT mls_number, original_url, listing_type
            FROM properties
            WHERE status = 'active'
              AND original_url IS NOT NULL
              AND NOT (mls_number = ANY($1))
            ORDER BY updated_at ASC
            LIMIT $2
            "#,
        )
        .bind(scraped_mls)
        .bind(self.limit)
        .fetch_all(pool)
        .await?;

        let mut summary = VerificationSummary::default();

        for (i, listing) in candidates.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(FETCH_DELAY).await;
            }

            let detected = self.check(listing).await;
            summary.verified += 1;

            match detected.status_update() {
                Some(status) => {
                    sqlx::query(
                        "UPDATE properties SET status = $1, updated_at = NOW() WHERE mls_number = $2",
                    )
                    .bind(status.as_str())
                    .bind(&listing.mls_number)
                    .execute(pool)
                    .await?;

                    tracing::info!(
                        "Listing {} marked {}",
                        listing.mls_number,
                        status.as_str()
                    );
                    summary.updated += 1;
                }
                None if detected == DetectedStatus::Active => {
                    // Still listed; push it to the back of the queue
                    sqlx::query("UPDATE properties SET updated_at = NOW() WHERE mls_number = $1")
                        .bind(&listing.mls_number)
                        .execute(pool)
                        .await?;
                }
                None => summary.unknown += 1,
            }
        }

        Ok(summary)
    }

    async fn check(&self, listing: &ListingToVerify) -> DetectedStatus {
        let response = match self.client.get(&listing.original_url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Could not fetch {}: {}", listing.original_url, e);
                return DetectedStatus::Unknown;
            }
        };

        let status = response.status();
        if let Some(detected) = status_from_http(status.as_u16()) {
            return detected;
        }
        if !status.is_success() {
            tracing::debug!("{} returned {}", listing.original_url, status);
            return DetectedStatus::Unknown;
        }

        match response.text().await {
            Ok(html) => detect_status(&html, ListingType::from_db(&listing.listing_type)),
            Err(e) => {
                tracing::warn!("Could not read {}: {}", listing.original_url, e);
                DetectedStatus::Unknown
            }
        }
    }
}
