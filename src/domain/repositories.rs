//! Repository interfaces for catalog persistence
//!
//! The store enforces the unique-SKU invariant; the orchestrator's
//! existence pre-check is a cost-saving short-circuit only, never the dedup
//! authority.

use async_trait::async_trait;
use anyhow::Result;

use crate::domain::product::{ProductQuery, ProductRecord};

/// Outcome of an insert attempt. A duplicate SKU is an expected no-op, not
/// an error: the pre-check-then-insert sequence is not atomic and a
/// concurrent run may have won the race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    DuplicateSku,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Look up a record by SKU. Used by the orchestrator as an advisory
    /// existence pre-check.
    async fn find_by_sku(&self, sku: &str) -> Result<Option<ProductRecord>>;

    /// Insert a record, relying on the store's unique index on `sku`.
    /// A unique-constraint conflict maps to `InsertOutcome::DuplicateSku`.
    async fn insert(&self, record: &ProductRecord) -> Result<InsertOutcome>;

    /// All persisted records, in SKU order.
    async fn all_records(&self) -> Result<Vec<ProductRecord>>;

    async fn count(&self) -> Result<u64>;

    /// Filtered catalog listing with pagination.
    async fn filter_products(&self, query: &ProductQuery) -> Result<Vec<ProductRecord>>;

    /// Search projection for the summarization path: embeddings are dropped
    /// and list-valued weight/memory/processor specs are collapsed to their
    /// first entry.
    async fn search_projection(
        &self,
        min_price: Option<f64>,
        max_price: Option<f64>,
        limit: u32,
    ) -> Result<Vec<ProductRecord>>;
}
