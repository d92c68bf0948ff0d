//! Domain module - catalog entities, value objects and service interfaces

pub mod product;
pub mod repositories;
pub mod services;

pub use product::{
    AvailabilityStatus, Brand, Currency, ProductQuery, ProductRecord, ScrapeResult, SpecValue,
    TechnicalSpecMap,
};
pub use repositories::{CatalogStore, InsertOutcome};
