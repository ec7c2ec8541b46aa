use axum::{extract::DefaultBodyLimit, middleware::from_fn, Router};
use practice_ops_core::core::config::Config;
use practice_ops_core::core::openapi::{ApiDoc, SwaggerInfoModifier};
use practice_ops_core::core::{database, middleware};
use practice_ops_core::features::auth;
use practice_ops_core::features::dental_reports::{routes as reports_routes, DentalReportService};
use practice_ops_core::features::listings::{ListingSyncService, ListingSyncWorker};
use practice_ops_core::features::xrays::{routes as xrays_routes, XrayPipeline, XrayService};
use practice_ops_core::modules::dicom::NativeDicomDecoder;
use practice_ops_core::modules::storage::MinIOClient;
use practice_ops_core::modules::vna::VnaService;
use practice_ops_core::modules::workflow::WorkflowNotifier;
use practice_ops_core::shared::retry::RetryOptions;
use std::sync::Arc;
use std::time::Duration;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn main() -> anyhow::Result<()> {
    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        // DICOM decoding and JPEG encoding run on the blocking pool
        .max_blocking_threads(worker_threads * 4)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(worker_threads))
}

async fn async_main(worker_threads: usize) -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    let available_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);
    tracing::info!(
        "System info: available_cpus={}, tokio_worker_threads={}, pid={}",
        available_cpus,
        worker_threads,
        std::process::id()
    );

    tracing::info!("Configuration loaded successfully");

    let pool = database::create_pool(&config.database).await?;
    tracing::info!("Database connection pool created");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
    tracing::info!("Database migrations completed successfully");

    // Auth
    let jwks_client = Arc::new(auth::JwksClient::new(
        &config.auth.issuer,
        config.auth.jwks_cache_ttl,
    ));
    let jwt_validator = Arc::new(auth::JwtValidator::new(
        jwks_client,
        config.auth.issuer.clone(),
        config.auth.audience.clone(),
        config.auth.jwt_leeway,
    ));
    tracing::info!("Auth configuration initialized");

    // Object storage for X-ray originals and variants
    let minio_client = Arc::new(
        MinIOClient::new(config.minio.clone())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize MinIO client: {}", e))?,
    );
    tracing::info!(
        "MinIO client initialized for bucket: {}",
        minio_client.bucket_name()
    );

    // Reports
    let report_service = Arc::new(DentalReportService::new(pool.clone()));
    tracing::info!("Dental report service initialized");

    // X-rays
    let pipeline = XrayPipeline::new(
        minio_client.clone(),
        Arc::new(NativeDicomDecoder),
        RetryOptions::new(
            config.xray.parse_max_retries,
            config.xray.parse_retry_delay,
            true,
        ),
    );
    let vna_service = Arc::new(
        VnaService::new(pool.clone())
            .map_err(|e| anyhow::anyhow!("Failed to initialize VNA service: {}", e))?,
    );
    let notifier = Arc::new(
        WorkflowNotifier::new(&config.xray)
            .map_err(|e| anyhow::anyhow!("Failed to initialize workflow notifier: {}", e))?,
    );
    if !notifier.is_enabled() {
        tracing::info!("Workflow webhook not configured, upload notifications disabled");
    }
    let xray_service = Arc::new(XrayService::new(
        pool.clone(),
        pipeline,
        vna_service,
        notifier,
        &config.xray,
    ));
    tracing::info!(
        "X-ray service initialized (max upload {} MB)",
        config.xray.max_upload_size / 1024 / 1024
    );

    // Periodic listing sync
    match &config.listing_sync {
        Some(sync_config) if sync_config.interval_secs > 0 => {
            let period = Duration::from_secs(sync_config.interval_secs);
            let sync_service = Arc::new(
                ListingSyncService::new(Some(pool.clone()), sync_config.clone())
                    .map_err(|e| anyhow::anyhow!("Failed to initialize listing sync: {}", e))?,
            );
            let worker = ListingSyncWorker::new(sync_service, period);
            tokio::spawn(async move {
                worker.run().await;
            });
            tracing::info!("Listing sync worker spawned");
        }
        Some(_) => tracing::info!("Listing sync interval is 0, periodic worker disabled"),
        None => tracing::info!("APIFY_TOKEN not set, listing sync disabled"),
    }

    // Build application router with dynamic swagger config
    let swagger_modifier = SwaggerInfoModifier {
        title: config.swagger.title.clone(),
        version: config.swagger.version.clone(),
        description: config.swagger.description.clone(),
    };

    let mut openapi = ApiDoc::openapi();
    swagger_modifier.modify(&mut openapi);

    let swagger = if let Some(credentials) = config.swagger.credentials() {
        tracing::info!("Swagger UI basic auth enabled");
        Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
            .layer(from_fn(middleware::basic_auth_middleware(Arc::new(
                credentials,
            ))))
    } else {
        tracing::info!("Swagger UI basic auth disabled (no credentials configured)");
        Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
    };

    // Protected routes (require JWT authentication)
    let protected_routes = Router::new()
        .merge(reports_routes(report_service))
        .merge(xrays_routes(xray_service))
        .route_layer(axum::middleware::from_fn_with_state(
            jwt_validator.clone(),
            middleware::auth_middleware,
        ));

    // Simple health check endpoint (no auth required)
    async fn health_check() -> axum::http::StatusCode {
        axum::http::StatusCode::OK
    }
    let health_route = Router::new().route("/health", axum::routing::get(health_check));

    let app = Router::new()
        .merge(swagger)
        .merge(protected_routes)
        .merge(health_route)
        .layer(DefaultBodyLimit::max(config.app.max_request_body_size))
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        // Propagate X-Request-Id to response headers
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Generate X-Request-Id using UUID v7 (or use client-provided one)
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid));

    // Start server
    let addr = config.app.server_address();
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    let socket = socket2::Socket::new(
        socket2::Domain::for_address(socket_addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nodelay(true)?;

    // Large multipart uploads
    socket.set_recv_buffer_size(1024 * 1024)?;
    socket.set_send_buffer_size(256 * 1024)?;

    #[cfg(target_os = "linux")]
    {
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(std::time::Duration::from_secs(60))
            .with_interval(std::time::Duration::from_secs(10))
            .with_retries(3);
        socket.set_tcp_keepalive(&keepalive)?;
    }
    #[cfg(not(target_os = "linux"))]
    {
        let keepalive = socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(60));
        socket.set_tcp_keepalive(&keepalive)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(65535)?;

    let listener = tokio::net::TcpListener::from_std(socket.into())?;
    tracing::info!("Server listening on {}", format!("http://{}", addr));
    tracing::info!(
        "Swagger UI available at {}",
        format!("http://{}/swagger-ui/", addr)
    );

    axum::serve(listener, app).await?;

    Ok(())
}
