use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

/// Actor that accepts agent pages as `startUrls: [{url}]`
const MEMO23_ACTOR: &str = "memo23/realtor-canada-search-cheerio";

#[derive(Debug, Error)]
pub enum ApifyError {
    #[error("Apify request failed: {0}")]
    Request(String),

    #[error("Actor {actor} returned {status}: {body}")]
    Status {
        actor: String,
        status: u16,
        body: String,
    },

    #[error("No actor returned items: {0}")]
    AllActorsFailed(String),
}

/// Thin client over `run-sync-get-dataset-items`
pub struct ApifyClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApifyClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, ApifyError> {
        let client = Client::builder()
            // run-sync waits for the actor run to finish (Apify caps it at 300s)
            .timeout(Duration::from_secs(330))
            .build()
            .map_err(|e| ApifyError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn run_sync_url(&self, actor_id: &str) -> String {
        format!(
            "{}/acts/{}/run-sync-get-dataset-items?token={}",
            self.base_url,
            actor_id.replace('/', "~"),
            urlencoding::encode(&self.token)
        )
    }

    /// Each actor expects its own input shape
    pub fn actor_input(actor_id: &str, source_url: &str, max_items: u32) -> Value {
        if actor_id == MEMO23_ACTOR {
            json!({
                "startUrls": [{ "url": source_url }],
                "maxItems": max_items,
                "maxConcurrency": 5,
                "proxy": { "useApifyProxy": true, "apifyProxyGroups": ["RESIDENTIAL"] }
            })
        } else {
            json!({
                "startUrls": [source_url],
                "getDetails": true,
                "simplifyOutput": false,
                "maxListings": max_items,
                "numberOfWorkers": 3,
                "proxy": { "useApifyProxy": true, "apifyProxyCountry": "CA" }
            })
        }
    }

    pub async fn run_actor(&self, actor_id: &str, input: &Value) -> Result<Vec<Value>, ApifyError> {
        let response = self
            .client
            .post(self.run_sync_url(actor_id))
            .json(input)
            .send()
            .await
            .map_err(|e| ApifyError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApifyError::Status {
                actor: actor_id.to_string(),
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| ApifyError::Request(format!("Invalid dataset items: {}", e)))
    }

    /// Try the actors in order; the first one that answers wins, even with zero items
    pub async fn scrape(
        &self,
        actor_ids: &[String],
        source_url: &str,
        max_items: u32,
    ) -> Result<Vec<Value>, ApifyError> {
        let mut last_error = String::from("no actors configured");

        for actor_id in actor_ids {
            let input = Self::actor_input(actor_id, source_url, max_items);
            match self.run_actor(actor_id, &input).await {
                Ok(items) => {
                    tracing::info!(
                        "Actor {} returned {} items for {}",
                        actor_id,
                        items.len(),
                        source_url
                    );
                    return Ok(items);
                }
                Err(e) => {
                    tracing::warn!("Actor {} failed for {}: {}", actor_id, source_url, e);
                    last_error = e.to_string();
                }
            }
        }

        Err(ApifyError::AllActorsFailed(last_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_sync_url_escapes_actor_and_token() {
        let client = ApifyClient::new("https://api.apify.com/v2/", "tok en").unwrap();
        assert_eq!(
            client.run_sync_url("memo23/realtor-canada-search-cheerio"),
            "https://api.apify.com/v2/acts/memo23~realtor-canada-search-cheerio/run-sync-get-dataset-items?token=tok%20en"
        );
    }

    #[test]
    fn test_actor_input_shapes() {
        let memo = ApifyClient::actor_input(MEMO23_ACTOR, "https://www.realtor.ca/agent/1", 25);
        assert_eq!(memo["startUrls"][0]["url"], "https://www.realtor.ca/agent/1");
        assert_eq!(memo["maxItems"], 25);

        let other = ApifyClient::actor_input(
            "scrapemind/realtor-ca-scraper",
            "https://www.realtor.ca/agent/1",
            25,
        );
        assert_eq!(other["startUrls"][0], "https://www.realtor.ca/agent/1");
        assert_eq!(other["maxListings"], 25);
    }

    #[tokio::test]
    async fn test_scrape_without_actors_fails() {
        let client = ApifyClient::new("http://127.0.0.1:1", "t").unwrap();
        let result = client.scrape(&[], "https://www.realtor.ca/agent/1", 10).await;
        assert!(matches!(result, Err(ApifyError::AllActorsFailed(_))));
    }
}
