//! Shared test doubles for the sync pipeline
//!
//! In-memory store and scripted collaborators used by unit and integration
//! tests. The scripted marketplace tracks session acquisition and release so
//! tests can assert the resource discipline the orchestrator promises.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use anyhow::{Result, anyhow};
use tokio::sync::Mutex;

use crate::domain::product::{
    Brand, ProductQuery, ProductRecord, ScrapeResult, SpecValue, TechnicalSpecMap, humanize_key,
};
use crate::domain::repositories::{CatalogStore, InsertOutcome};
use crate::domain::services::{
    DatasheetSource, EmbeddingService, LiveMarketSource, MarketSession, SummarizationService,
};

/// A minimal but fully populated record for store tests.
pub fn sample_record(sku: &str) -> ProductRecord {
    let mut specs = TechnicalSpecMap::new();
    specs.insert("processor_family".into(), SpecValue::from("Intel Core i5"));
    specs.insert("max_memory".into(), SpecValue::from("40GB"));
    ProductRecord::with_datasheet_specs(sku, &format!("https://example.com/{sku}.pdf"), specs)
}

/// In-memory `CatalogStore` with the same unique-SKU semantics as the SQLite
/// implementation. Optional insert latency widens race windows in
/// concurrency tests.
#[derive(Default)]
pub struct MemoryCatalogStore {
    records: Mutex<BTreeMap<String, ProductRecord>>,
    latency: Option<Duration>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            latency: Some(latency),
        }
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn find_by_sku(&self, sku: &str) -> Result<Option<ProductRecord>> {
        self.pause().await;
        Ok(self.records.lock().await.get(sku).cloned())
    }

    async fn insert(&self, record: &ProductRecord) -> Result<InsertOutcome> {
        self.pause().await;
        let mut records = self.records.lock().await;
        if records.contains_key(&record.sku) {
            return Ok(InsertOutcome::DuplicateSku);
        }
        records.insert(record.sku.clone(), record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn all_records(&self) -> Result<Vec<ProductRecord>> {
        Ok(self.records.lock().await.values().cloned().collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.lock().await.len() as u64)
    }

    async fn filter_products(&self, query: &ProductQuery) -> Result<Vec<ProductRecord>> {
        let records = self.records.lock().await;
        Ok(records
            .values()
            .filter(|r| query.brand.is_none_or(|b| r.brand == b))
            .filter(|r| query.min_price.is_none_or(|p| r.current_price >= p))
            .filter(|r| query.max_price.is_none_or(|p| r.current_price <= p))
            .filter(|r| query.min_rating.is_none_or(|p| r.average_rating >= p))
            .skip(query.skip as usize)
            .take(if query.limit == 0 { 50 } else { query.limit } as usize)
            .cloned()
            .collect())
    }

    async fn search_projection(
        &self,
        min_price: Option<f64>,
        max_price: Option<f64>,
        limit: u32,
    ) -> Result<Vec<ProductRecord>> {
        let records = self.records.lock().await;
        Ok(records
            .values()
            .filter(|r| min_price.is_none_or(|p| r.current_price >= p))
            .filter(|r| max_price.is_none_or(|p| r.current_price <= p))
            .take(if limit == 0 { 10 } else { limit } as usize)
            .map(|r| {
                let mut r = r.clone();
                r.embedding = None;
                r
            })
            .collect())
    }
}

/// Datasheet source backed by a fixed URL -> document map, with optional
/// per-URL simulated failures.
#[derive(Default)]
pub struct StaticDatasheets {
    documents: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
}

impl StaticDatasheets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: &str, text: &str) -> Self {
        self.documents.insert(url.to_string(), text.as_bytes().to_vec());
        self
    }

    pub fn with_failure(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }
}

#[async_trait]
impl DatasheetSource for StaticDatasheets {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if self.failing.contains(url) {
            return Err(anyhow!("simulated fetch failure for {url}"));
        }
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("no datasheet registered for {url}"))
    }
}

/// Scripted marketplace: canned scrape results keyed by model query, with
/// session-accounting counters.
pub struct ScriptedMarket {
    brand: Brand,
    results: Arc<HashMap<String, ScrapeResult>>,
    failing_queries: Arc<HashSet<String>>,
    fail_open: bool,
    /// Total sessions ever opened.
    pub sessions_opened: Arc<AtomicU32>,
    /// Sessions currently open; zero after a well-behaved run.
    pub sessions_active: Arc<AtomicU32>,
    /// Every query attempted across all sessions.
    pub queries_seen: Arc<Mutex<Vec<String>>>,
}

impl ScriptedMarket {
    pub fn new(brand: Brand) -> Self {
        Self {
            brand,
            results: Arc::new(HashMap::new()),
            failing_queries: Arc::new(HashSet::new()),
            fail_open: false,
            sessions_opened: Arc::new(AtomicU32::new(0)),
            sessions_active: Arc::new(AtomicU32::new(0)),
            queries_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a canned result under the default query for a canonical key.
    pub fn with_result_for_key(mut self, key: &str, result: ScrapeResult) -> Self {
        let mut results = (*self.results).clone();
        results.insert(humanize_key(key), result);
        self.results = Arc::new(results);
        self
    }

    /// Simulate a scrape failure for a canonical key's query.
    pub fn with_failure_for_key(mut self, key: &str) -> Self {
        let mut failing = (*self.failing_queries).clone();
        failing.insert(humanize_key(key));
        self.failing_queries = Arc::new(failing);
        self
    }

    /// Simulate a run-fatal session acquisition failure.
    pub fn failing_to_open(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

#[async_trait]
impl LiveMarketSource for ScriptedMarket {
    fn brand(&self) -> Brand {
        self.brand
    }

    async fn open_session(&self) -> Result<Box<dyn MarketSession>> {
        if self.fail_open {
            return Err(anyhow!("simulated session acquisition failure"));
        }
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        self.sessions_active.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            results: self.results.clone(),
            failing_queries: self.failing_queries.clone(),
            active_gauge: self.sessions_active.clone(),
            queries_seen: self.queries_seen.clone(),
            open: true,
        }))
    }
}

pub struct ScriptedSession {
    results: Arc<HashMap<String, ScrapeResult>>,
    failing_queries: Arc<HashSet<String>>,
    active_gauge: Arc<AtomicU32>,
    queries_seen: Arc<Mutex<Vec<String>>>,
    open: bool,
}

#[async_trait]
impl MarketSession for ScriptedSession {
    async fn search_and_scrape(
        &mut self,
        model_query: &str,
        _lightweight: bool,
    ) -> Result<Option<ScrapeResult>> {
        self.queries_seen.lock().await.push(model_query.to_string());
        if self.failing_queries.contains(model_query) {
            return Err(anyhow!("simulated scrape failure for {model_query}"));
        }
        Ok(self.results.get(model_query).cloned())
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            self.active_gauge.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Embedding stub returning a fixed vector.
pub struct FixedEmbedder(pub Vec<f32>);

#[async_trait]
impl EmbeddingService for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.0.clone())
    }
}

/// Embedding stub that always fails; the record must persist regardless.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingService for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(anyhow!("simulated embedding failure"))
    }
}

/// Summarizer stub that records its input and returns a canned digest.
#[derive(Default)]
pub struct RecordingSummarizer {
    pub inputs: Mutex<Vec<String>>,
}

#[async_trait]
impl SummarizationService for RecordingSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        self.inputs.lock().await.push(text.to_string());
        Ok(format!("digest of {} line(s)", text.lines().count()))
    }
}
