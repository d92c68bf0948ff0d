//! End-to-end orchestrator behavior against scripted collaborators:
//! idempotency, failure isolation, resource release and drift reporting.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use lapcat::application::{CatalogSyncOrchestrator, SyncScheduler};
use lapcat::domain::product::{AvailabilityStatus, Brand, ScrapeResult, SpecValue, TechnicalSpecMap};
use lapcat::domain::repositories::CatalogStore;
use lapcat::domain::services::{EmbeddingService, LiveMarketSource, SummarizationService};
use lapcat::infrastructure::SpecExtractor;
use lapcat::infrastructure::config::{CanonicalEntry, SyncScheduleConfig};
use lapcat::infrastructure::spec_rules::DatasheetRuleSets;
use lapcat::test_utils::{
    FailingEmbedder, FixedEmbedder, MemoryCatalogStore, RecordingSummarizer, ScriptedMarket,
    StaticDatasheets,
};

const LENOVO_URL: &str = "https://example.com/lenovo_e14.pdf";
const HP_URL: &str = "https://example.com/hp_450.pdf";

const LENOVO_DOC: &str = "Processor Family Intel Core i5 / i7\nMax Memory 40GB\nMemory Type DDR4-3200\n";
const HP_DOC: &str = "Maximum memory 32 GB\nMemory slots 2 SODIMM\n";

fn catalog() -> Vec<CanonicalEntry> {
    vec![
        CanonicalEntry::new("lenovo_thinkpad_e14_intel", LENOVO_URL),
        CanonicalEntry::new("hp_probook_450_g10", HP_URL),
    ]
}

fn datasheets() -> StaticDatasheets {
    StaticDatasheets::new()
        .with_document(LENOVO_URL, LENOVO_DOC)
        .with_document(HP_URL, HP_DOC)
}

fn in_stock_result(price: f64) -> ScrapeResult {
    let mut specs = TechnicalSpecMap::new();
    specs.insert("Memory".into(), SpecValue::from("16 GB DDR4"));
    ScrapeResult {
        title: Some("ThinkPad E14".to_string()),
        url: Some("https://shop.example/e14".to_string()),
        price: Some(price),
        rating: Some(4.5),
        review_count_raw: Some("(1,234)".to_string()),
        specs,
        availability: AvailabilityStatus::InStock,
        ..ScrapeResult::default()
    }
}

struct Harness {
    orchestrator: Arc<CatalogSyncOrchestrator>,
    store: Arc<MemoryCatalogStore>,
    lenovo: SessionCounters,
    hp: SessionCounters,
}

#[derive(Clone)]
struct SessionCounters {
    opened: Arc<std::sync::atomic::AtomicU32>,
    active: Arc<std::sync::atomic::AtomicU32>,
}

fn build(
    store: Arc<MemoryCatalogStore>,
    datasheets: StaticDatasheets,
    lenovo: ScriptedMarket,
    hp: ScriptedMarket,
    embedder: Option<Arc<dyn EmbeddingService>>,
    summarizer: Option<Arc<dyn SummarizationService>>,
) -> Harness {
    let lenovo_counters = SessionCounters {
        opened: lenovo.sessions_opened.clone(),
        active: lenovo.sessions_active.clone(),
    };
    let hp_counters = SessionCounters {
        opened: hp.sessions_opened.clone(),
        active: hp.sessions_active.clone(),
    };

    let markets: Vec<Arc<dyn LiveMarketSource>> = vec![Arc::new(lenovo), Arc::new(hp)];
    let orchestrator = Arc::new(CatalogSyncOrchestrator::new(
        catalog(),
        store.clone(),
        Arc::new(datasheets),
        SpecExtractor::new(DatasheetRuleSets::default()),
        markets,
        embedder,
        summarizer,
        true,
    ));

    Harness {
        orchestrator,
        store,
        lenovo: lenovo_counters,
        hp: hp_counters,
    }
}

#[tokio::test]
async fn idempotent_sync_inserts_each_key_exactly_once() {
    let harness = build(
        Arc::new(MemoryCatalogStore::new()),
        datasheets(),
        ScriptedMarket::new(Brand::Lenovo)
            .with_result_for_key("lenovo_thinkpad_e14_intel", in_stock_result(1299.99)),
        ScriptedMarket::new(Brand::Hp),
        None,
        None,
    );

    let first = harness.orchestrator.sync(false).await.unwrap();
    assert_eq!(first.inserted, 2);
    assert_eq!(first.skipped_existing, 0);
    assert!(first.failed.is_empty());
    assert_eq!(harness.store.count().await.unwrap(), 2);

    let second = harness.orchestrator.sync(false).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped_existing, 2);
    assert_eq!(harness.store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn not_found_listing_still_persists_complete_default_record() {
    // Neither marketplace returns a listing.
    let harness = build(
        Arc::new(MemoryCatalogStore::new()),
        datasheets(),
        ScriptedMarket::new(Brand::Lenovo),
        ScriptedMarket::new(Brand::Hp),
        None,
        None,
    );

    let summary = harness.orchestrator.sync(false).await.unwrap();
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.live_misses, 2);

    let record = harness
        .store
        .find_by_sku("lenovo_thinkpad_e14_intel")
        .await
        .unwrap()
        .expect("datasheet-only record persisted");
    assert_eq!(record.brand, Brand::Lenovo);
    assert_eq!(record.canonical_name, "Lenovo Thinkpad E14 Intel");
    assert_eq!(record.current_price, 0.0);
    assert_eq!(record.availability, AvailabilityStatus::OutOfStock);
    assert!(!record.technical_specs.is_empty());
    assert!(record.specs_live.is_none());
    assert_eq!(record.source_urls, vec![LENOVO_URL.to_string()]);
}

#[tokio::test]
async fn live_fields_overlay_onto_default_record() {
    let harness = build(
        Arc::new(MemoryCatalogStore::new()),
        datasheets(),
        ScriptedMarket::new(Brand::Lenovo)
            .with_result_for_key("lenovo_thinkpad_e14_intel", in_stock_result(1299.99)),
        ScriptedMarket::new(Brand::Hp),
        None,
        None,
    );

    harness.orchestrator.sync(false).await.unwrap();

    let record = harness
        .store
        .find_by_sku("lenovo_thinkpad_e14_intel")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.current_price, 1299.99);
    assert_eq!(record.availability, AvailabilityStatus::InStock);
    assert_eq!(record.review_count, 1234);
    assert_eq!(record.average_rating, 4.5);
    assert!(record.specs_live.is_some());
    // Datasheet specs survive the overlay untouched.
    assert_eq!(
        record.technical_specs.get("max_memory"),
        Some(&SpecValue::Text("40GB".to_string()))
    );
    assert!(record.source_urls.contains(&"https://shop.example/e14".to_string()));
}

#[tokio::test]
async fn datasheet_failure_is_isolated_and_sessions_are_released() {
    let bad_datasheets = StaticDatasheets::new()
        .with_failure(LENOVO_URL)
        .with_document(HP_URL, HP_DOC);

    let harness = build(
        Arc::new(MemoryCatalogStore::new()),
        bad_datasheets,
        ScriptedMarket::new(Brand::Lenovo),
        ScriptedMarket::new(Brand::Hp),
        None,
        None,
    );

    let summary = harness.orchestrator.sync(false).await.unwrap();

    // The failing product is reported; the rest of the run continued.
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].key, "lenovo_thinkpad_e14_intel");
    assert_eq!(summary.inserted, 1);
    assert!(harness.store.find_by_sku("hp_probook_450_g10").await.unwrap().is_some());
    assert!(
        harness
            .store
            .find_by_sku("lenovo_thinkpad_e14_intel")
            .await
            .unwrap()
            .is_none()
    );

    // Both sessions were opened once and released on the way out.
    assert_eq!(harness.lenovo.opened.load(Ordering::SeqCst), 1);
    assert_eq!(harness.hp.opened.load(Ordering::SeqCst), 1);
    assert_eq!(harness.lenovo.active.load(Ordering::SeqCst), 0);
    assert_eq!(harness.hp.active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn scrape_failure_is_isolated_and_sessions_are_released() {
    let harness = build(
        Arc::new(MemoryCatalogStore::new()),
        datasheets(),
        ScriptedMarket::new(Brand::Lenovo).with_failure_for_key("lenovo_thinkpad_e14_intel"),
        ScriptedMarket::new(Brand::Hp),
        None,
        None,
    );

    let summary = harness.orchestrator.sync(false).await.unwrap();
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.inserted, 1);
    assert_eq!(harness.lenovo.active.load(Ordering::SeqCst), 0);
    assert_eq!(harness.hp.active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn session_acquisition_failure_is_run_fatal_and_releases_opened_sessions() {
    let harness = build(
        Arc::new(MemoryCatalogStore::new()),
        datasheets(),
        ScriptedMarket::new(Brand::Lenovo),
        ScriptedMarket::new(Brand::Hp).failing_to_open(),
        None,
        None,
    );

    let result = harness.orchestrator.sync(false).await;
    assert!(result.is_err());
    assert_eq!(harness.store.count().await.unwrap(), 0);

    // The Lenovo session opened before the HP failure was released.
    assert_eq!(harness.lenovo.opened.load(Ordering::SeqCst), 1);
    assert_eq!(harness.lenovo.active.load(Ordering::SeqCst), 0);
    assert_eq!(harness.hp.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn embedding_failure_still_persists_the_record() {
    let harness = build(
        Arc::new(MemoryCatalogStore::new()),
        datasheets(),
        ScriptedMarket::new(Brand::Lenovo),
        ScriptedMarket::new(Brand::Hp),
        Some(Arc::new(FailingEmbedder)),
        None,
    );

    let summary = harness.orchestrator.sync(false).await.unwrap();
    assert_eq!(summary.inserted, 2);

    let record = harness
        .store
        .find_by_sku("hp_probook_450_g10")
        .await
        .unwrap()
        .unwrap();
    assert!(record.embedding.is_none());
}

#[tokio::test]
async fn embedding_is_attached_when_the_service_succeeds() {
    let harness = build(
        Arc::new(MemoryCatalogStore::new()),
        datasheets(),
        ScriptedMarket::new(Brand::Lenovo),
        ScriptedMarket::new(Brand::Hp),
        Some(Arc::new(FixedEmbedder(vec![0.1, 0.2, 0.3]))),
        None,
    );

    harness.orchestrator.sync(false).await.unwrap();
    let record = harness
        .store
        .find_by_sku("lenovo_thinkpad_e14_intel")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.embedding, Some(vec![0.1, 0.2, 0.3]));
}

#[tokio::test]
async fn drift_report_observes_changes_without_mutating_records() {
    let summarizer = Arc::new(RecordingSummarizer::default());
    let store = Arc::new(MemoryCatalogStore::new());

    // First sync stores the listing at 1299.99.
    let harness = build(
        store.clone(),
        datasheets(),
        ScriptedMarket::new(Brand::Lenovo)
            .with_result_for_key("lenovo_thinkpad_e14_intel", in_stock_result(1299.99)),
        ScriptedMarket::new(Brand::Hp),
        None,
        Some(summarizer.clone()),
    );
    harness.orchestrator.sync(false).await.unwrap();

    // A later pass sees a lower live price; the report fires but the stored
    // record stays as inserted.
    let drifted = build(
        store.clone(),
        datasheets(),
        ScriptedMarket::new(Brand::Lenovo)
            .with_result_for_key("lenovo_thinkpad_e14_intel", in_stock_result(1199.99)),
        ScriptedMarket::new(Brand::Hp),
        None,
        Some(summarizer.clone()),
    );
    drifted.orchestrator.report_price_drift().await.unwrap();

    let inputs = summarizer.inputs.lock().await;
    assert_eq!(inputs.len(), 1);
    assert!(inputs[0].contains("lenovo_thinkpad_e14_intel"));
    assert!(inputs[0].contains("1299.99"));
    assert!(inputs[0].contains("1199.99"));
    drop(inputs);

    let record = store
        .find_by_sku("lenovo_thinkpad_e14_intel")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.current_price, 1299.99);

    assert_eq!(drifted.lenovo.active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn overlapping_scheduler_firings_are_skipped_not_interleaved() {
    let store = Arc::new(MemoryCatalogStore::with_latency(Duration::from_millis(50)));
    let harness = build(
        store.clone(),
        datasheets(),
        ScriptedMarket::new(Brand::Lenovo),
        ScriptedMarket::new(Brand::Hp),
        None,
        None,
    );

    let scheduler = Arc::new(SyncScheduler::new(
        harness.orchestrator.clone(),
        &SyncScheduleConfig {
            drift_report: false,
            ..SyncScheduleConfig::default()
        },
    ));

    let a = scheduler.clone();
    let b = scheduler.clone();
    tokio::join!(
        async move { a.run_once(false).await },
        async move { b.run_once(false).await },
    );

    // Exactly one firing ran; the overlapping one was skipped, so each
    // marketplace session was opened exactly once.
    assert_eq!(harness.lenovo.opened.load(Ordering::SeqCst), 1);
    assert_eq!(harness.hp.opened.load(Ordering::SeqCst), 1);
    assert_eq!(store.count().await.unwrap(), 2);
}
