use imhere_api::{build_router, state::AppState};
use imhere_config::{Settings, StoreBackend};
use imhere_db::{connect, indexes::ensure_indexes};
use imhere_services::{DocumentStore, MemoryStore, MongoStore};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "imhere_api=debug,imhere_services=debug,imhere_db=debug,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!("Starting I'm Here API on {}:{}", settings.app.host, settings.app.port);

    let store: Arc<dyn DocumentStore> = match settings.store.backend {
        StoreBackend::Mongo => {
            let db = connect(&settings).await?;
            ensure_indexes(&db).await?;
            Arc::new(MongoStore::new(db, settings.store.watch_buffer))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new(settings.store.watch_buffer))
        }
    };

    let app_state = AppState::new(store, settings.clone())?;
    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
