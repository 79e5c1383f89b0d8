use tokio::net::TcpListener;
use tracing::{error, info};
use tripbudget::config::AppConfig;
use tripbudget::db::init_pool;
use tripbudget::error::AppError;
use tripbudget::prefs::PrefsStore;
use tripbudget::repo::TripRepository;
use tripbudget::routes::create_router;
use tripbudget::state::AppState;
use tripbudget::store::TripStore;
use tripbudget::sync::run_change_listener;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    let db = init_pool(&config.database_url).await?;

    if let Err(err) = sqlx::migrate!("./migrations").run(&db).await {
        error!("migration failed: {err:?}");
        return Err(AppError::Other(err.into()));
    }

    let prefs = PrefsStore::new(config.prefs_root.clone());
    prefs.ensure_structure().await?;

    let repo = TripRepository::new(db.clone());
    let store = TripStore::new(repo.clone(), prefs);
    store.bootstrap().await?;
    info!("store ready, active trip: {:?}", store.trip_id().await);

    // One subscription per process lifetime, established after bootstrap.
    tokio::spawn(run_change_listener(store.clone(), repo.subscribe()));

    let state = AppState::new(config.clone(), store);
    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tripbudget=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
