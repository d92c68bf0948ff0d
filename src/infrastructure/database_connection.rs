// Database connection and pool management
// This module handles SQLite database connections using sqlx

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use anyhow::Result;
use std::path::Path;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        // Create database file directory if it doesn't exist
        let db_path = if database_url.starts_with("sqlite://") {
            database_url.trim_start_matches("sqlite://")
        } else if database_url.starts_with("sqlite:") {
            database_url.trim_start_matches("sqlite:")
        } else {
            database_url
        };

        if db_path != ":memory:" {
            if let Some(parent) = Path::new(db_path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            if !Path::new(db_path).exists() {
                std::fs::File::create(db_path)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the catalog schema. The unique index on `sku` is the
    /// authoritative dedup guard for concurrent sync runs.
    pub async fn migrate(&self) -> Result<()> {
        Self::migrate_on(&self.pool).await
    }

    /// Run the schema migration against an externally managed pool.
    pub async fn migrate_on(pool: &SqlitePool) -> Result<()> {
        let create_products_sql = r#"
            CREATE TABLE IF NOT EXISTS products (
                sku TEXT NOT NULL,
                brand TEXT NOT NULL,
                model TEXT NOT NULL,
                canonical_name TEXT NOT NULL,
                technical_specs TEXT NOT NULL,
                specs_live TEXT,
                current_price REAL NOT NULL DEFAULT 0.0,
                currency TEXT NOT NULL DEFAULT 'USD',
                availability TEXT NOT NULL DEFAULT 'out_of_stock',
                review_count INTEGER NOT NULL DEFAULT 0,
                average_rating REAL NOT NULL DEFAULT 0.0,
                source_urls TEXT NOT NULL,
                last_updated DATETIME NOT NULL,
                embedding TEXT
            )
        "#;

        let create_indexes_sql = r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_products_sku ON products (sku);
            CREATE INDEX IF NOT EXISTS idx_products_brand ON products (brand);
            CREATE INDEX IF NOT EXISTS idx_products_current_price ON products (current_price);
            CREATE INDEX IF NOT EXISTS idx_products_average_rating ON products (average_rating);
        "#;

        sqlx::query(create_products_sql).execute(pool).await?;
        sqlx::query(create_indexes_sql).execute(pool).await?;

        Ok(())
    }
}
