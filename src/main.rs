use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use campus_market::catalog::PgCatalogStore;
use campus_market::config::{Config, StorageConfig};
use campus_market::db::{create_pool, run_migrations};
use campus_market::directory::{PgUniversityDirectory, PgUserDirectory, UniversityDirectory};
use campus_market::identity::JwtIdentityGate;
use campus_market::lifecycle::ItemLifecycleManager;
use campus_market::listing::{ListingQueryEngine, PageLimits};
use campus_market::middleware::{
    enforce_rate_limit, ip_rate_limiter, with_security_headers, AuthLayer,
};
use campus_market::models::MAX_IMAGES;
use campus_market::services::{router, AppState};
use campus_market::storage::{BlobReferenceResolver, LocalBackend, R2Backend, StorageBackend};

use http::{header, HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_market=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing::info!("Starting campus-market server...");
    tracing::info!("Connecting to database...");

    let pool = create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database connection established");

    // Blob storage: local directory or R2
    let backend: Arc<dyn StorageBackend> = match &config.storage {
        StorageConfig::Local { upload_dir } => Arc::new(LocalBackend::new(upload_dir.clone())),
        StorageConfig::R2 {
            bucket,
            account_id,
            access_key,
            secret_key,
        } => Arc::new(
            R2Backend::new(
                bucket.clone(),
                account_id.clone(),
                access_key.clone(),
                secret_key.clone(),
            )
            .context("Failed to create R2 client")?,
        ),
    };
    let upload_dir = match &config.storage {
        StorageConfig::Local { upload_dir } => Some(upload_dir.clone()),
        StorageConfig::R2 { .. } => None,
    };
    tracing::info!("Blob storage enabled: {}", backend.bucket());

    let store = Arc::new(PgCatalogStore::new(pool.clone()));
    let users = Arc::new(PgUserDirectory::new(pool.clone()));
    let universities: Arc<dyn UniversityDirectory> =
        Arc::new(PgUniversityDirectory::new(pool.clone()));
    let blobs = Arc::new(BlobReferenceResolver::new(backend, config.max_upload_bytes));

    let state = AppState {
        listing: Arc::new(ListingQueryEngine::new(store.clone(), users.clone())),
        lifecycle: Arc::new(ItemLifecycleManager::new(
            store,
            users,
            universities.clone(),
            blobs.clone(),
        )),
        blobs,
        universities,
        page_limits: PageLimits {
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        },
        enable_university_seed: config.enable_university_seed,
    };
    if config.enable_university_seed {
        tracing::warn!("University seed endpoint is enabled");
    }

    let origin: HeaderValue = config
        .client_url
        .parse()
        .context("CLIENT_URL is not a valid origin")?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    let mut app = router(state);
    if let Some(dir) = upload_dir {
        tracing::info!("Serving uploads from {}", dir);
        app = app.nest_service("/uploads", ServeDir::new(dir));
    }
    let mut app = app
        .layer(AuthLayer::new(Arc::new(JwtIdentityGate::new(&config.jwt_secret))))
        .layer(DefaultBodyLimit::max(
            MAX_IMAGES * config.max_upload_bytes + 1024 * 1024,
        ));

    if config.rate_limit_enabled {
        let limiter = Arc::new(
            ip_rate_limiter(config.rate_limit_requests, config.rate_limit_window_secs)
                .context("RATE_LIMIT_REQUESTS and RATE_LIMIT_WINDOW_SECS must be non-zero")?,
        );
        tracing::info!(
            "Rate limiting /api/ to {} requests per {}s per client",
            config.rate_limit_requests,
            config.rate_limit_window_secs
        );

        // Forget idle clients so the key map stays bounded
        let sweeper = limiter.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(60));
            loop {
                tick.tick().await;
                sweeper.retain_recent();
            }
        });

        app = app.layer(axum::middleware::from_fn_with_state(
            limiter,
            enforce_rate_limit,
        ));
    } else {
        tracing::warn!("Rate limiting is disabled");
    }

    let app = with_security_headers(app)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .context("Invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
