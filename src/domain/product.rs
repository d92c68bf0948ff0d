//! Core catalog entities and value objects
//!
//! The persisted `ProductRecord` shape (field names and enumerations) is the
//! wire contract consumed by downstream subsystems and must not change
//! without a migration.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported manufacturers (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    Lenovo,
    Hp,
}

impl Brand {
    /// Infer the brand from a canonical product key's naming convention
    /// (e.g. `lenovo_thinkpad_e14_intel` / `hp_probook_450_g10`).
    pub fn infer_from_key(key: &str) -> Self {
        if key.contains("lenovo") {
            Self::Lenovo
        } else {
            Self::Hp
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lenovo => "lenovo",
            Self::Hp => "hp",
        }
    }
}

impl std::fmt::Display for Brand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Brand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lenovo" => Ok(Self::Lenovo),
            "hp" => Ok(Self::Hp),
            other => Err(format!("unknown brand: {other}")),
        }
    }
}

/// Currency of a listed price (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
    #[serde(rename = "GBP")]
    Gbp,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            other => Err(format!("unknown currency: {other}")),
        }
    }
}

/// Stock state of a live marketplace listing (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    InStock,
    OutOfStock,
    PreOrder,
    Limited,
}

impl AvailabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InStock => "in_stock",
            Self::OutOfStock => "out_of_stock",
            Self::PreOrder => "pre_order",
            Self::Limited => "limited",
        }
    }
}

impl Default for AvailabilityStatus {
    fn default() -> Self {
        Self::OutOfStock
    }
}

impl std::str::FromStr for AvailabilityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_stock" => Ok(Self::InStock),
            "out_of_stock" => Ok(Self::OutOfStock),
            "pre_order" => Ok(Self::PreOrder),
            "limited" => Ok(Self::Limited),
            other => Err(format!("unknown availability status: {other}")),
        }
    }
}

/// A single specification value. Datasheets mix free text, option lists and
/// presence facts (e.g. a security chip) in one map, so the value space
/// covers all three.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecValue {
    Flag(bool),
    Text(String),
    List(Vec<String>),
}

impl SpecValue {
    /// First textual value, for list-valued fields that downstream consumers
    /// want collapsed to a single representative entry.
    pub fn first_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::List(items) => items.first().map(String::as_str),
            Self::Flag(_) => None,
        }
    }
}

impl From<&str> for SpecValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for SpecValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<String>> for SpecValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl From<bool> for SpecValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

/// Order-irrelevant mapping from spec-field name to value. Field names are
/// source-defined free form ("processor_family", "max_memory", ...).
pub type TechnicalSpecMap = BTreeMap<String, SpecValue>;

/// Render a spec map as compact text, e.g. for embedding input.
pub fn render_spec_map(specs: &TechnicalSpecMap) -> String {
    let mut parts = Vec::with_capacity(specs.len());
    for (field, value) in specs {
        let rendered = match value {
            SpecValue::Flag(flag) => flag.to_string(),
            SpecValue::Text(text) => text.clone(),
            SpecValue::List(items) => items.join(", "),
        };
        parts.push(format!("{field}: {rendered}"));
    }
    parts.join("; ")
}

/// The persisted catalog entity, one record per SKU.
///
/// Created exactly once per canonical key by the sync pipeline; the
/// datasheet-derived `technical_specs` map is never overwritten in place --
/// live spec data goes to the separate `specs_live` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub brand: Brand,
    pub model: String,
    pub sku: String,
    pub canonical_name: String,
    pub technical_specs: TechnicalSpecMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specs_live: Option<TechnicalSpecMap>,
    pub current_price: f64,
    pub currency: Currency,
    pub availability: AvailabilityStatus,
    pub review_count: u32,
    pub average_rating: f64,
    pub source_urls: Vec<String>,
    pub last_updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl ProductRecord {
    /// Build the default record for a canonical key: always insertable even
    /// when live enrichment fails entirely. Price 0.0 is the "unknown/out of
    /// stock" sentinel.
    pub fn with_datasheet_specs(
        key: &str,
        datasheet_url: &str,
        specs: TechnicalSpecMap,
    ) -> Self {
        Self {
            brand: Brand::infer_from_key(key),
            model: key.to_string(),
            sku: key.to_string(),
            canonical_name: humanize_key(key),
            technical_specs: specs,
            specs_live: None,
            current_price: 0.0,
            currency: Currency::Usd,
            availability: AvailabilityStatus::OutOfStock,
            review_count: 0,
            average_rating: 0.0,
            source_urls: vec![datasheet_url.to_string()],
            last_updated: Utc::now(),
            embedding: None,
        }
    }

    /// Text fed to the embedding service: canonical name plus the rendered
    /// datasheet spec map.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.canonical_name, render_spec_map(&self.technical_specs))
    }
}

/// "lenovo_thinkpad_e14_intel" -> "Lenovo Thinkpad E14 Intel"
pub fn humanize_key(key: &str) -> String {
    key.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Transient per-run scrape output; folded into `ProductRecord`, never
/// persisted on its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub title: Option<String>,
    pub url: Option<String>,
    pub price: Option<f64>,
    pub discount: Option<String>,
    pub rating: Option<f64>,
    /// Raw review-count text as rendered by the site, e.g. "(1,234)".
    /// Numeric normalization happens downstream.
    pub review_count_raw: Option<String>,
    pub specs: TechnicalSpecMap,
    pub images: Option<Vec<String>>,
    pub availability: AvailabilityStatus,
}

/// Filter criteria for catalog queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductQuery {
    pub brand: Option<Brand>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rating: Option<f64>,
    pub skip: u32,
    pub limit: u32,
}
