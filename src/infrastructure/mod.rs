//! Infrastructure module - concrete integrations behind the domain traits
//!
//! HTTP, HTML and PDF handling, persistence, configuration and logging.

pub mod catalog_repository;
pub mod config;
pub mod database_connection;
pub mod datasheet_fetcher;
pub mod live_scraper;
pub mod llm_client;
pub mod logging;
pub mod selectors;
pub mod spec_extractor;
pub mod spec_rules;
pub mod sync_error;

pub use catalog_repository::SqliteCatalogStore;
pub use config::AppConfig;
pub use database_connection::DatabaseConnection;
pub use datasheet_fetcher::DatasheetFetcher;
pub use live_scraper::{LiveScraper, ScrapeSession};
pub use llm_client::HttpLlmClient;
pub use spec_extractor::SpecExtractor;
pub use sync_error::{SyncError, SyncResult};
