use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub swagger: SwaggerConfig,
    pub minio: MinIOConfig,
    pub xray: XrayConfig,
    /// Present only when `APIFY_TOKEN` is configured
    pub listing_sync: Option<ListingSyncConfig>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_request_body_size: usize,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub jwks_cache_ttl: Duration,
    pub jwt_leeway: Duration,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

/// MinIO/S3 storage configuration for X-ray originals and derived images
#[derive(Debug, Clone)]
pub struct MinIOConfig {
    /// MinIO/S3 endpoint URL
    pub endpoint: String,
    /// Public endpoint URL for publicly accessible files (optional, defaults to endpoint)
    pub public_endpoint: String,
    /// Access key for authentication
    pub access_key: String,
    /// Secret key for authentication
    pub secret_key: String,
    /// Bucket name for storing files
    pub bucket: String,
    /// AWS region (for S3 compatibility)
    pub region: String,
    /// Prefix for public files (e.g., "public")
    pub public_prefix: String,
    /// Prefix for private files (e.g., "private")
    pub private_prefix: String,
    /// Presigned URL expiry time in seconds
    pub presigned_url_expiry_secs: u32,
}

/// X-ray ingestion settings
#[derive(Debug, Clone)]
pub struct XrayConfig {
    pub max_upload_size: usize,
    pub parse_max_retries: u32,
    pub parse_retry_delay: Duration,
    /// Downstream workflow webhook; notifications are skipped when unset
    pub workflow_webhook_url: Option<String>,
    pub workflow_webhook_secret: Option<String>,
}

/// Listing sync (scraping actor + target databases)
#[derive(Debug, Clone)]
pub struct ListingSyncConfig {
    pub apify_token: String,
    pub apify_base_url: String,
    /// Actors tried in order until one returns items
    pub actor_ids: Vec<String>,
    pub source_urls: Vec<String>,
    pub featured_urls: Vec<String>,
    pub sold_urls: Vec<String>,
    /// Map search retried when a source URL yields no listings
    pub map_fallback_url: Option<String>,
    /// Explicit target databases; empty means "look them up in `websites`"
    pub database_urls: Vec<String>,
    /// 0 disables the in-process periodic worker
    pub interval_secs: u64,
    pub verify_limit: i64,
    pub max_items: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
            minio: MinIOConfig::from_env()?,
            xray: XrayConfig::from_env()?,
            listing_sync: ListingSyncConfig::from_env_optional()?,
        })
    }
}

impl AppConfig {
    const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_request_body_size = env::var("MAX_REQUEST_BODY_SIZE")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_REQUEST_BODY_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| "MAX_REQUEST_BODY_SIZE must be a valid number".to_string())?;

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
            max_request_body_size,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MAX_CONNECTIONS must be a valid number".to_string())?;

        let min_connections = env::var("DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MIN_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MIN_CONNECTIONS must be a valid number".to_string())?;

        let acquire_timeout_secs = env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_ACQUIRE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_ACQUIRE_TIMEOUT_SECS must be a valid number".to_string())?;

        let idle_timeout_secs = env::var("DB_IDLE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_IDLE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_IDLE_TIMEOUT_SECS must be a valid number".to_string())?;

        let max_lifetime_secs = env::var("DB_MAX_LIFETIME_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_LIFETIME_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_MAX_LIFETIME_SECS must be a valid number".to_string())?;

        Ok(Self {
            url,
            max_connections,
            min_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
        })
    }
}

impl AuthConfig {
    const DEFAULT_JWKS_CACHE_TTL_SECS: u64 = 3600; // 1 hour
    const DEFAULT_JWT_LEEWAY_SECS: u64 = 60; // 1 minute

    pub fn from_env() -> Result<Self, String> {
        let issuer = env::var("AUTH_ISSUER")
            .map_err(|_| "AUTH_ISSUER environment variable is required".to_string())?;

        let audience = env::var("AUTH_AUDIENCE")
            .map_err(|_| "AUTH_AUDIENCE environment variable is required".to_string())?;

        let jwks_cache_ttl_secs = env::var("JWKS_CACHE_TTL")
            .unwrap_or_else(|_| Self::DEFAULT_JWKS_CACHE_TTL_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "JWKS_CACHE_TTL must be a valid number".to_string())?;

        let jwt_leeway_secs = env::var("JWT_LEEWAY")
            .unwrap_or_else(|_| Self::DEFAULT_JWT_LEEWAY_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "JWT_LEEWAY must be a valid number".to_string())?;

        Ok(Self {
            issuer,
            audience,
            jwks_cache_ttl: Duration::from_secs(jwks_cache_ttl_secs),
            jwt_leeway: Duration::from_secs(jwt_leeway_secs),
        })
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("SWAGGER_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("SWAGGER_PASSWORD").ok().filter(|s| !s.is_empty());
        let title = env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Practice Ops API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION").unwrap_or_else(|_| {
            "Reporting, X-ray ingestion and listing sync for practice operations".to_string()
        });

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}

impl MinIOConfig {
    const DEFAULT_PRESIGNED_URL_EXPIRY_SECS: u32 = 3600; // 1 hour

    pub fn from_env() -> Result<Self, String> {
        let endpoint =
            env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".to_string());

        let public_endpoint =
            env::var("MINIO_PUBLIC_ENDPOINT").unwrap_or_else(|_| endpoint.clone());

        let access_key = env::var("MINIO_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string());

        let secret_key = env::var("MINIO_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string());

        let bucket = env::var("MINIO_BUCKET").unwrap_or_else(|_| "practice-ops-media".to_string());

        let region = env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        let public_prefix =
            env::var("MINIO_PUBLIC_PREFIX").unwrap_or_else(|_| "public".to_string());

        let private_prefix =
            env::var("MINIO_PRIVATE_PREFIX").unwrap_or_else(|_| "private".to_string());

        let presigned_url_expiry_secs = env::var("MINIO_PRESIGNED_URL_EXPIRY_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_PRESIGNED_URL_EXPIRY_SECS.to_string())
            .parse::<u32>()
            .map_err(|_| "MINIO_PRESIGNED_URL_EXPIRY_SECS must be a valid number".to_string())?;

        Ok(Self {
            endpoint,
            public_endpoint,
            access_key,
            secret_key,
            bucket,
            region,
            public_prefix,
            private_prefix,
            presigned_url_expiry_secs,
        })
    }
}

impl XrayConfig {
    const DEFAULT_MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024; // 100MB, DICOM studies are large
    const DEFAULT_PARSE_MAX_RETRIES: u32 = 3;
    const DEFAULT_PARSE_RETRY_DELAY_MS: u64 = 1000;

    pub fn from_env() -> Result<Self, String> {
        let max_upload_size = env::var("XRAY_MAX_UPLOAD_SIZE")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_UPLOAD_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| "XRAY_MAX_UPLOAD_SIZE must be a valid number".to_string())?;

        let parse_max_retries = env::var("XRAY_PARSE_MAX_RETRIES")
            .unwrap_or_else(|_| Self::DEFAULT_PARSE_MAX_RETRIES.to_string())
            .parse::<u32>()
            .map_err(|_| "XRAY_PARSE_MAX_RETRIES must be a valid number".to_string())?;

        let parse_retry_delay_ms = env::var("XRAY_PARSE_RETRY_DELAY_MS")
            .unwrap_or_else(|_| Self::DEFAULT_PARSE_RETRY_DELAY_MS.to_string())
            .parse::<u64>()
            .map_err(|_| "XRAY_PARSE_RETRY_DELAY_MS must be a valid number".to_string())?;

        let workflow_webhook_url = env::var("WORKFLOW_WEBHOOK_URL")
            .ok()
            .filter(|s| !s.is_empty());
        let workflow_webhook_secret = env::var("WORKFLOW_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        Ok(Self {
            max_upload_size,
            parse_max_retries,
            parse_retry_delay: Duration::from_millis(parse_retry_delay_ms),
            workflow_webhook_url,
            workflow_webhook_secret,
        })
    }
}

impl Default for XrayConfig {
    fn default() -> Self {
        Self {
            max_upload_size: Self::DEFAULT_MAX_UPLOAD_SIZE,
            parse_max_retries: Self::DEFAULT_PARSE_MAX_RETRIES,
            parse_retry_delay: Duration::from_millis(Self::DEFAULT_PARSE_RETRY_DELAY_MS),
            workflow_webhook_url: None,
            workflow_webhook_secret: None,
        }
    }
}

impl ListingSyncConfig {
    const DEFAULT_APIFY_BASE_URL: &'static str = "https://api.apify.com/v2";
    const DEFAULT_ACTOR_IDS: &'static [&'static str] = &[
        "memo23/realtor-canada-search-cheerio",
        "scrapemind/realtor-ca-scraper",
    ];
    const DEFAULT_VERIFY_LIMIT: i64 = 50;
    const DEFAULT_MAX_ITEMS: u32 = 50;

    /// Returns `Ok(None)` when no scraping token is configured
    pub fn from_env_optional() -> Result<Option<Self>, String> {
        match env::var("APIFY_TOKEN").ok().filter(|s| !s.is_empty()) {
            Some(token) => Self::with_token(token).map(Some),
            None => Ok(None),
        }
    }

    /// Like `from_env_optional`, but a missing token is an error (script entry point)
    pub fn from_env() -> Result<Self, String> {
        let token = env::var("APIFY_TOKEN")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "APIFY_TOKEN not configured".to_string())?;
        Self::with_token(token)
    }

    fn with_token(apify_token: String) -> Result<Self, String> {
        let apify_base_url = env::var("APIFY_BASE_URL")
            .unwrap_or_else(|_| Self::DEFAULT_APIFY_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let actor_ids = match env::var("LISTING_ACTOR_IDS") {
            Ok(raw) if !raw.trim().is_empty() => parse_list("LISTING_ACTOR_IDS", &raw)?,
            _ => Self::DEFAULT_ACTOR_IDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        let source_urls = list_from_env("LISTING_SOURCE_URLS")?;
        let featured_urls = list_from_env("LISTING_FEATURED_URLS")?;
        let sold_urls = list_from_env("LISTING_SOLD_URLS")?;
        let database_urls = list_from_env("CENTRIS_REALTOR_DATABASE_URLS")?;
        let map_fallback_url = env::var("REALTOR_MAP_FALLBACK_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let interval_secs = env::var("LISTING_SYNC_INTERVAL_SECS")
            .unwrap_or_else(|_| "0".to_string())
            .parse::<u64>()
            .map_err(|_| "LISTING_SYNC_INTERVAL_SECS must be a valid number".to_string())?;

        let verify_limit = env::var("LISTING_VERIFY_LIMIT")
            .unwrap_or_else(|_| Self::DEFAULT_VERIFY_LIMIT.to_string())
            .parse::<i64>()
            .map_err(|_| "LISTING_VERIFY_LIMIT must be a valid number".to_string())?;

        let max_items = env::var("LISTING_MAX_ITEMS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_ITEMS.to_string())
            .parse::<u32>()
            .map_err(|_| "LISTING_MAX_ITEMS must be a valid number".to_string())?;

        Ok(Self {
            apify_token,
            apify_base_url,
            actor_ids,
            source_urls,
            featured_urls,
            sold_urls,
            map_fallback_url,
            database_urls,
            interval_secs,
            verify_limit,
            max_items,
        })
    }
}

fn list_from_env(name: &str) -> Result<Vec<String>, String> {
    match env::var(name) {
        Ok(raw) => parse_list(name, &raw),
        Err(_) => Ok(Vec::new()),
    }
}

/// Accepts either a JSON array of strings or a comma-separated list
pub fn parse_list(name: &str, raw: &str) -> Result<Vec<String>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let items: Vec<String> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)
            .map_err(|e| format!("{} must be a JSON array of strings: {}", name, e))?
    } else {
        trimmed.split(',').map(|s| s.to_string()).collect()
    };

    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_json_array() {
        let urls = parse_list(
            "X",
            r#"["postgres://a/db1", " postgres://b/db2 ", ""]"#,
        )
        .unwrap();
        assert_eq!(urls, vec!["postgres://a/db1", "postgres://b/db2"]);
    }

    #[test]
    fn test_parse_list_comma_separated() {
        let urls = parse_list("X", "a, b,,c").unwrap();
        assert_eq!(urls, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_list_invalid_json() {
        let err = parse_list("CENTRIS_REALTOR_DATABASE_URLS", "[not json").unwrap_err();
        assert!(err.contains("CENTRIS_REALTOR_DATABASE_URLS"));
    }

    #[test]
    fn test_swagger_credentials() {
        let swagger = SwaggerConfig {
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            title: String::new(),
            version: String::new(),
            description: String::new(),
        };
        assert_eq!(swagger.credentials(), Some("admin:secret".to_string()));

        let anonymous = SwaggerConfig {
            password: None,
            ..swagger
        };
        assert_eq!(anonymous.credentials(), None);
    }
}
