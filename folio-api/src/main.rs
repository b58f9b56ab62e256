use crate::{
    config::{Env, StoreBackend},
    server::{AdminCredentials, ServerState},
};
use folio_db::{
    client::DbClient,
    files::FileStore,
    postgres::PgStore,
    store::{ContentStore, StoreError},
};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("DATABASE_URL is required for the postgres store backend")]
    MissingDatabaseUrl,
    #[error("Error opening content store: {0}")]
    Store(#[from] StoreError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "folio_api=debug,folio_db=debug,folio_common=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn open_store(env: &Env) -> Result<Box<dyn ContentStore>, InitError> {
    let store: Box<dyn ContentStore> = match env.store_backend {
        StoreBackend::Files => {
            let store = FileStore::open(env.content_dir.clone(), env.worker_id).await?;
            info!(root = %store.root().display(), "Opened file content store");
            Box::new(store)
        }
        StoreBackend::Postgres => {
            let database_url = env
                .database_url
                .as_deref()
                .ok_or(InitError::MissingDatabaseUrl)?;
            let store = PgStore::connect(database_url, env.worker_id, env.store_timeout()).await?;
            store.migrate().await?;
            Box::new(store)
        }
    };

    Ok(store)
}

/// Cancels `token` on Ctrl-C or, on unix, SIGTERM.
async fn cancel_on_shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(%err, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("Received shutdown signal, shutting down server");
    token.cancel();
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let admin = AdminCredentials::new(env.admin_username.clone(), env.admin_password.clone());
    if !admin.is_enabled() {
        warn!("ADMIN_PASSWORD is not set, all requests needing admin access will be rejected");
    }

    let store = open_store(&env).await?;
    let db_client = Arc::new(DbClient::new(store, env.store_timeout()));

    let state = ServerState {
        db_client: Arc::clone(&db_client),
        admin: Arc::new(admin),
    };
    let app = server::app(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(shutdown.clone()));

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe);

    if let Err(err) = db_client.close().await {
        error!(%err, "Could not close content store");
    }

    served
}
