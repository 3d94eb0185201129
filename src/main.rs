use std::sync::Arc;

use sobie_research::config::Config;
use sobie_research::db::{self, PgSubmissionStore};
use sobie_research::directory::PgDirectory;
use sobie_research::notify::{LogNotifier, Notifier, WebhookNotifier};
use sobie_research::storage::LocalDocumentStore;
use sobie_research::{build_router, AppState, Engine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sobie_research=info,tower_http=info".into()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(pool.as_ref()).await?;

    let documents = LocalDocumentStore::new(config.upload_folder.clone())?;
    let notifier: Arc<dyn Notifier> = match &config.notification_webhook_url {
        Some(url) => {
            tracing::info!("Dispatching notifications to {}", url);
            Arc::new(WebhookNotifier::new(url.clone())?)
        }
        None => {
            tracing::warn!("NOTIFICATION_WEBHOOK_URL not set; notifications are only logged");
            Arc::new(LogNotifier)
        }
    };

    let directory = Arc::new(PgDirectory::new(pool.clone()));
    let engine = Engine::new(
        Arc::new(PgSubmissionStore::new(pool.clone())),
        directory.clone(),
        directory,
        Arc::new(documents),
        notifier,
    )
    .with_settings(config.engine_settings());

    let state = Arc::new(AppState {
        engine: Arc::new(engine),
        config: config.clone(),
    });
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("SOBIE research engine listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
