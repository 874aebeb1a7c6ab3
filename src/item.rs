//! Product records flowing through the scraper
//!
//! An [`Item`] starts life as a stub built from a listing card and is enriched
//! in place with [`DetailFields`] once its detail page has been scraped. Items
//! serialize flat, so persisted progress and failure files hold plain
//! `{brand, name, price, ...}` objects.

use serde::{Deserialize, Serialize};

/// Fields read from a listing card
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFields {
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub url: String,
}

/// Fields read from a product detail page
///
/// Every field is required on deserialization so that a record without any
/// detail keys reads back as a stub rather than an empty enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailFields {
    pub highlights: String,
    pub description: String,
    pub directions: String,
    pub ingredients: String,
    pub nutritional_info: String,
    pub product_type: String,
    pub target_area: String,
}

/// A scrape target: listing fields plus optional detail fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(flatten)]
    pub product: ProductFields,

    #[serde(flatten)]
    pub details: Option<DetailFields>,
}

impl Item {
    /// Creates a stub item from listing fields
    pub fn stub(product: ProductFields) -> Self {
        Self {
            product,
            details: None,
        }
    }

    /// The detail page URL, which also identifies the item
    pub fn url(&self) -> &str {
        &self.product.url
    }

    /// Returns true once detail fields have been merged in
    pub fn is_enriched(&self) -> bool {
        self.details.is_some()
    }

    /// Merges detail fields into this item, replacing any earlier details
    pub fn merge_details(&mut self, details: DetailFields) {
        self.details = Some(details);
    }

    /// Short display label used in log lines
    pub fn label(&self) -> String {
        let name = if self.product.name.is_empty() {
            "Unknown"
        } else {
            self.product.name.as_str()
        };
        name.chars().take(40).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_product() -> ProductFields {
        ProductFields {
            brand: "Nature's Bounty".to_string(),
            name: "Hair, Skin and Nails 60 Gummies".to_string(),
            price: "£12.99".to_string(),
            image: "https://images.example.com/p.jpg".to_string(),
            url: "https://www.hollandandbarrett.com/shop/product/p-60".to_string(),
        }
    }

    #[test]
    fn test_stub_is_not_enriched() {
        let item = Item::stub(sample_product());
        assert!(!item.is_enriched());
        assert_eq!(item.url(), "https://www.hollandandbarrett.com/shop/product/p-60");
    }

    #[test]
    fn test_merge_details() {
        let mut item = Item::stub(sample_product());
        item.merge_details(DetailFields {
            highlights: "Supports hair".to_string(),
            ..Default::default()
        });

        assert!(item.is_enriched());
        assert_eq!(item.details.unwrap().highlights, "Supports hair");
    }

    #[test]
    fn test_stub_serializes_flat_without_detail_keys() {
        let item = Item::stub(sample_product());
        let value = serde_json::to_value(&item).unwrap();

        assert_eq!(value["brand"], "Nature's Bounty");
        assert!(value.get("highlights").is_none());

        let parsed: Item = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.details, None);
    }

    #[test]
    fn test_enriched_item_reads_back_details() {
        let mut item = Item::stub(sample_product());
        item.merge_details(DetailFields {
            description: "Biotin gummies".to_string(),
            ..Default::default()
        });

        let json = serde_json::to_string(&item).unwrap();
        let parsed: Item = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, item);
    }

    #[test]
    fn test_missing_listing_fields_default_to_empty() {
        let parsed: Item = serde_json::from_str(r#"{"url": "https://example.com/p"}"#).unwrap();
        assert_eq!(parsed.product.brand, "");
        assert_eq!(parsed.url(), "https://example.com/p");
    }

    #[test]
    fn test_label_truncates_and_defaults() {
        let mut item = Item::default();
        assert_eq!(item.label(), "Unknown");

        item.product.name = "x".repeat(100);
        assert_eq!(item.label().len(), 40);
    }
}
