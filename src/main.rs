//! lapcat daemon entry point
//!
//! Wires configuration, persistence, the sync orchestrator and the scheduler
//! together, then runs the scheduling loop until a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use lapcat::application::{CatalogSyncOrchestrator, SyncScheduler};
use lapcat::domain::product::Brand;
use lapcat::domain::services::{EmbeddingService, LiveMarketSource, SummarizationService};
use lapcat::infrastructure::logging::init_logging;
use lapcat::infrastructure::{
    AppConfig, DatabaseConnection, DatasheetFetcher, HttpLlmClient, LiveScraper, SpecExtractor,
    SqliteCatalogStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var("LAPCAT_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(AppConfig::default_config_path);

    let config = AppConfig::load_or_create(&config_path).await?;
    init_logging(&config.logging)?;
    info!(config = %config_path.display(), "lapcat starting");

    let db = DatabaseConnection::new(&config.database.url)
        .await
        .context("failed to open catalog database")?;
    db.migrate().await.context("failed to run migrations")?;
    let store = Arc::new(SqliteCatalogStore::new(db.pool().clone()));

    let fetcher = Arc::new(DatasheetFetcher::new(&config.http)?);
    let extractor = SpecExtractor::new(config.datasheet_rules.clone());

    let markets: Vec<Arc<dyn LiveMarketSource>> = vec![
        Arc::new(LiveScraper::new(
            Brand::Lenovo,
            config.scraping.profiles.lenovo.clone(),
            &config.http,
            &config.scraping,
        )),
        Arc::new(LiveScraper::new(
            Brand::Hp,
            config.scraping.profiles.hp.clone(),
            &config.http,
            &config.scraping,
        )),
    ];

    let llm = HttpLlmClient::from_config(&config.llm)?.map(Arc::new);
    let embedder: Option<Arc<dyn EmbeddingService>> =
        llm.clone().map(|c| c as Arc<dyn EmbeddingService>);
    let summarizer: Option<Arc<dyn SummarizationService>> =
        llm.map(|c| c as Arc<dyn SummarizationService>);

    let orchestrator = Arc::new(CatalogSyncOrchestrator::new(
        config.catalog.clone(),
        store,
        fetcher,
        extractor,
        markets,
        embedder,
        summarizer,
        config.sync.embed_on_insert,
    ));

    let scheduler = SyncScheduler::new(orchestrator, &config.sync);
    let token = scheduler.cancellation_token();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            token.cancel();
        }
    });

    scheduler.run().await;
    info!("lapcat stopped");
    Ok(())
}
