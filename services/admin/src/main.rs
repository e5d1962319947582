use std::{future::IntoFuture, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use admin::{
    AppState, Repositories, Services,
    config::{AppConfig, AttemptStoreKind},
    hasher::Argon2Hasher,
    jwt::JwtService,
    policy::CasbinEnforcer,
    rate_limiter::{AttemptStore, LoginAttemptLimiter, MemoryAttemptStore, RedisAttemptStore},
    routes,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting RBAC admin service");

    let config = AppConfig::load()?;
    let shutdown = CancellationToken::new();

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    run_migrations(&pool, &sqlx::migrate!("./migrations")).await?;

    let store: Arc<dyn AttemptStore> = match config.security.login.store {
        AttemptStoreKind::Memory => {
            let store = MemoryAttemptStore::new();
            let _sweeper =
                store.spawn_sweeper(config.security.login.sweep_interval(), shutdown.child_token());
            Arc::new(store)
        }
        AttemptStoreKind::Redis => {
            let redis_pool = RedisPool::new(&RedisConfig::from_env()?).await?;
            Arc::new(RedisAttemptStore::new(redis_pool))
        }
    };

    let services = Services {
        enforcer: Arc::new(CasbinEnforcer::new().await?),
        hasher: Arc::new(Argon2Hasher),
        limiter: LoginAttemptLimiter::new(config.security.login.limit(), store),
        jwt_service: JwtService::new(config.security.token.clone()),
        min_password_strength: config.security.password.min_strength,
    };
    let state = AppState::new(Repositories::postgres(pool), services, shutdown.clone());

    let summary = state.reloader.reload_all(&shutdown.child_token()).await?;
    info!(?summary, "Policy graph loaded");

    let app = routes::create_router(state);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Admin service listening on {}", address);

    tokio::spawn(wait_for_signal(shutdown.clone()));

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.clone().cancelled_owned())
    .into_future();

    let grace = Duration::from_secs(config.server.shutdown_timeout_secs);
    tokio::select! {
        result = server => result?,
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(grace).await;
        } => warn!("Shutdown grace period elapsed, dropping open connections"),
    }

    info!("Admin service stopped");
    Ok(())
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM
async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
