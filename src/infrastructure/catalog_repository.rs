//! SQLite-backed catalog store
//!
//! Persistence for `ProductRecord` with the unique-SKU invariant enforced at
//! the store. Spec maps, source URLs and embeddings are stored as JSON text
//! columns. A duplicate-SKU insert is reported as an outcome, not an error:
//! the orchestrator's pre-check races with concurrent runs by design and the
//! unique index is the authority.

use std::sync::Arc;

use async_trait::async_trait;
use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::debug;

use crate::domain::product::{ProductQuery, ProductRecord, SpecValue, TechnicalSpecMap};
use crate::domain::repositories::{CatalogStore, InsertOutcome};

const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Spec fields collapsed to one representative value in the search
/// projection.
const SINGLE_VALUED_SEARCH_FIELDS: [&str; 3] = ["weight", "memory", "processor"];

#[derive(Clone)]
pub struct SqliteCatalogStore {
    pool: Arc<SqlitePool>,
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn find_by_sku(&self, sku: &str) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(
            r#"
            SELECT sku, brand, model, canonical_name, technical_specs, specs_live,
                   current_price, currency, availability, review_count, average_rating,
                   source_urls, last_updated, embedding
            FROM products WHERE sku = ?
            "#,
        )
        .bind(sku)
        .fetch_optional(&*self.pool)
        .await?;

        row.map(|row| record_from_row(&row, true)).transpose()
    }

    async fn insert(&self, record: &ProductRecord) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO products
            (sku, brand, model, canonical_name, technical_specs, specs_live,
             current_price, currency, availability, review_count, average_rating,
             source_urls, last_updated, embedding)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.sku)
        .bind(record.brand.as_str())
        .bind(&record.model)
        .bind(&record.canonical_name)
        .bind(serde_json::to_string(&record.technical_specs)?)
        .bind(
            record
                .specs_live
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(record.current_price)
        .bind(record.currency.as_str())
        .bind(record.availability.as_str())
        .bind(i64::from(record.review_count))
        .bind(record.average_rating)
        .bind(serde_json::to_string(&record.source_urls)?)
        .bind(record.last_updated)
        .bind(
            record
                .embedding
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .execute(&*self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!(sku = %record.sku, "duplicate SKU rejected by unique index");
                Ok(InsertOutcome::DuplicateSku)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn all_records(&self) -> Result<Vec<ProductRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT sku, brand, model, canonical_name, technical_specs, specs_live,
                   current_price, currency, availability, review_count, average_rating,
                   source_urls, last_updated, embedding
            FROM products ORDER BY sku ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(|row| record_from_row(row, true)).collect()
    }

    async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM products")
            .fetch_one(&*self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n.max(0) as u64)
    }

    async fn filter_products(&self, query: &ProductQuery) -> Result<Vec<ProductRecord>> {
        let limit = if query.limit == 0 {
            DEFAULT_PAGE_LIMIT
        } else {
            query.limit
        };

        let rows = sqlx::query(
            r#"
            SELECT sku, brand, model, canonical_name, technical_specs, specs_live,
                   current_price, currency, availability, review_count, average_rating,
                   source_urls, last_updated, embedding
            FROM products
            WHERE (?1 IS NULL OR brand = ?1)
              AND (?2 IS NULL OR current_price >= ?2)
              AND (?3 IS NULL OR current_price <= ?3)
              AND (?4 IS NULL OR average_rating >= ?4)
            ORDER BY sku ASC
            LIMIT ?5 OFFSET ?6
            "#,
        )
        .bind(query.brand.map(|b| b.as_str()))
        .bind(query.min_price)
        .bind(query.max_price)
        .bind(query.min_rating)
        .bind(i64::from(limit))
        .bind(i64::from(query.skip))
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(|row| record_from_row(row, true)).collect()
    }

    async fn search_projection(
        &self,
        min_price: Option<f64>,
        max_price: Option<f64>,
        limit: u32,
    ) -> Result<Vec<ProductRecord>> {
        let limit = if limit == 0 { 10 } else { limit };

        let rows = sqlx::query(
            r#"
            SELECT sku, brand, model, canonical_name, technical_specs, specs_live,
                   current_price, currency, availability, review_count, average_rating,
                   source_urls, last_updated
            FROM products
            WHERE (?1 IS NULL OR current_price >= ?1)
              AND (?2 IS NULL OR current_price <= ?2)
            ORDER BY sku ASC
            LIMIT ?3
            "#,
        )
        .bind(min_price)
        .bind(max_price)
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let mut record = record_from_row(row, false)?;
                normalize_search_specs(&mut record.technical_specs);
                Ok(record)
            })
            .collect()
    }
}

fn record_from_row(row: &SqliteRow, with_embedding: bool) -> Result<ProductRecord> {
    let brand: String = row.get("brand");
    let currency: String = row.get("currency");
    let availability: String = row.get("availability");
    let technical_specs: String = row.get("technical_specs");
    let specs_live: Option<String> = row.get("specs_live");
    let source_urls: String = row.get("source_urls");
    let review_count: i64 = row.get("review_count");

    let embedding = if with_embedding {
        let raw: Option<String> = row.get("embedding");
        raw.map(|json| serde_json::from_str::<Vec<f32>>(&json))
            .transpose()
            .context("corrupt embedding column")?
    } else {
        None
    };

    Ok(ProductRecord {
        sku: row.get("sku"),
        brand: brand.parse().map_err(anyhow::Error::msg)?,
        model: row.get("model"),
        canonical_name: row.get("canonical_name"),
        technical_specs: serde_json::from_str(&technical_specs)
            .context("corrupt technical_specs column")?,
        specs_live: specs_live
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .context("corrupt specs_live column")?,
        current_price: row.get("current_price"),
        currency: currency.parse().map_err(anyhow::Error::msg)?,
        availability: availability.parse().map_err(anyhow::Error::msg)?,
        review_count: review_count.max(0) as u32,
        average_rating: row.get("average_rating"),
        source_urls: serde_json::from_str(&source_urls).context("corrupt source_urls column")?,
        last_updated: row.get("last_updated"),
        embedding,
    })
}

/// Collapse list-valued weight/memory/processor specs to their first entry,
/// matching the search projection the summarization path expects.
fn normalize_search_specs(specs: &mut TechnicalSpecMap) {
    for field in SINGLE_VALUED_SEARCH_FIELDS {
        if let Some(SpecValue::List(items)) = specs.get(field) {
            if let Some(first) = items.first().cloned() {
                specs.insert(field.to_string(), SpecValue::Text(first));
            }
        }
    }
}
