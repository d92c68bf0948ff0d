//! Per-marketplace scrape profiles
//!
//! Search entry points and CSS selector tables for each supported
//! marketplace. These are versioned configuration, not code: when a site's
//! markup drifts, the profile is patched in the config file and no
//! extraction logic changes. Adding a marketplace is a profile plus an enum
//! variant, not an inheritance branch.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::domain::product::Brand;

/// Supported marketplaces, one per manufacturer storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    Lenovo,
    Hp,
}

impl Marketplace {
    pub fn for_brand(brand: Brand) -> Self {
        match brand {
            Brand::Lenovo => Self::Lenovo,
            Brand::Hp => Self::Hp,
        }
    }

    pub fn brand(&self) -> Brand {
        match self {
            Self::Lenovo => Brand::Lenovo,
            Self::Hp => Brand::Hp,
        }
    }
}

/// CSS selectors for the parts of a marketplace page the scraper reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSelectors {
    /// Anchor inside the search results list that links to a product page.
    pub results_link: String,
    /// Product title on the product page.
    pub title: String,
    /// Current price.
    pub price: String,
    /// Discount/savings badge.
    pub discount: String,
    /// Average star rating.
    pub rating: String,
    /// Review-count text (kept raw; normalized downstream).
    pub review_count: String,
    /// One spec bullet in the spec list.
    pub spec_item: String,
    /// Label element inside a spec bullet.
    pub spec_name: String,
    /// Value element inside a spec bullet.
    pub spec_value: String,
    /// Buy / out-of-stock control.
    pub stock_control: String,
    /// Substring of the stock control's text that marks the listing
    /// unavailable.
    pub out_of_stock_marker: String,
    /// Product gallery images.
    pub image: String,
}

/// Everything the scraper needs to drive one marketplace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceProfile {
    pub name: String,
    pub base_url: String,
    /// Search entry point with a `{query}` placeholder.
    pub search_url_pattern: String,
    pub selectors: SiteSelectors,
}

impl MarketplaceProfile {
    pub fn lenovo_default() -> Self {
        Self {
            name: "Lenovo US store".to_string(),
            base_url: "https://www.lenovo.com".to_string(),
            search_url_pattern: "https://www.lenovo.com/us/en/search?text={query}".to_string(),
            selectors: SiteSelectors {
                results_link: "li.product_item .product_title a".to_string(),
                title: "h1.product_summary".to_string(),
                price: "span.price".to_string(),
                discount: "span.price-save-mt".to_string(),
                rating: ".card-review-inline .bv_text".to_string(),
                review_count: ".card-review-inline .bv_numReviews_component_container .bv_text"
                    .to_string(),
                spec_item: "div.specs_list div.specs_item".to_string(),
                spec_name: "div.item_name".to_string(),
                spec_value: "div.item_content".to_string(),
                stock_control: "button.buyNowBtn, button.outOfStock".to_string(),
                out_of_stock_marker: "out of stock".to_string(),
                image: ".product_gallery img".to_string(),
            },
        }
    }

    pub fn hp_default() -> Self {
        Self {
            name: "HP US store".to_string(),
            base_url: "https://www.hp.com".to_string(),
            search_url_pattern: "https://www.hp.com/us-en/shop/sitesearch?keyword={query}"
                .to_string(),
            selectors: SiteSelectors {
                results_link: ".product-tile a.product-name, li.product-item a.product-item-link"
                    .to_string(),
                title: "h1.product-name, h1.page-title".to_string(),
                price: "span.sale-price, span.price".to_string(),
                discount: "span.save-percent, span.price-save".to_string(),
                rating: ".bv_avgRating_component_container, .rating-summary .rating".to_string(),
                review_count: ".bv_numReviews_component_container, .reviews-actions a"
                    .to_string(),
                spec_item: ".product-specs li, .techSpecs-list .techSpecs-item".to_string(),
                spec_name: ".spec-label, .techSpecs-name".to_string(),
                spec_value: ".spec-value, .techSpecs-value".to_string(),
                stock_control: "button.add-to-cart, button.oos-button".to_string(),
                out_of_stock_marker: "out of stock".to_string(),
                image: ".product-gallery img".to_string(),
            },
        }
    }

    /// Build the search URL for a model query.
    pub fn search_url(&self, query: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(query.as_bytes()).collect();
        self.search_url_pattern.replace("{query}", &encoded)
    }

    /// Resolve a possibly relative href against the marketplace base URL.
    pub fn resolve_url(&self, href: &str) -> String {
        if href.starts_with("http") {
            href.to_string()
        } else if href.starts_with('/') {
            format!("{}{}", self.base_url.trim_end_matches('/'), href)
        } else {
            format!("{}/{}", self.base_url.trim_end_matches('/'), href)
        }
    }
}

/// Profile table keyed by marketplace, carried in the application config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceProfiles {
    pub lenovo: MarketplaceProfile,
    pub hp: MarketplaceProfile,
}

impl Default for MarketplaceProfiles {
    fn default() -> Self {
        Self {
            lenovo: MarketplaceProfile::lenovo_default(),
            hp: MarketplaceProfile::hp_default(),
        }
    }
}

impl MarketplaceProfiles {
    pub fn for_marketplace(&self, marketplace: Marketplace) -> &MarketplaceProfile {
        match marketplace {
            Marketplace::Lenovo => &self.lenovo,
            Marketplace::Hp => &self.hp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_encodes_query() {
        let profile = MarketplaceProfile::lenovo_default();
        let url = profile.search_url("ThinkPad E14 Gen 5 (Intel)");
        assert!(url.starts_with("https://www.lenovo.com/us/en/search?text="));
        assert!(!url.contains(' '));
        assert!(url.contains("ThinkPad"));
    }

    #[test]
    fn url_resolution() {
        let profile = MarketplaceProfile::lenovo_default();
        assert_eq!(
            profile.resolve_url("/p/laptops/thinkpad/e14"),
            "https://www.lenovo.com/p/laptops/thinkpad/e14"
        );
        assert_eq!(
            profile.resolve_url("https://other.example/x"),
            "https://other.example/x"
        );
        assert_eq!(
            profile.resolve_url("p/relative"),
            "https://www.lenovo.com/p/relative"
        );
    }

    #[test]
    fn marketplace_maps_one_to_one_with_brand() {
        assert_eq!(Marketplace::for_brand(Brand::Lenovo).brand(), Brand::Lenovo);
        assert_eq!(Marketplace::for_brand(Brand::Hp).brand(), Brand::Hp);
    }
}
