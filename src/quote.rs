// src/quote.rs
use serde::{Deserialize, Serialize};

/// Per-source result record. Exactly one is produced for every registered
/// source per lookup, whether or not the source actually answered.
///
/// `price == 0` means "no legible price", not an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShopQuote {
    pub shop_name: String,
    pub price: u32,
    /// Always populated, so the caller can offer a manual-check link even
    /// when the scrape came back empty.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ShopQuote {
    /// Placeholder for a source that failed to fetch or yielded nothing.
    pub fn empty(shop_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            shop_name: shop_name.into(),
            price: 0,
            url: url.into(),
            product_name: None,
            image_url: None,
        }
    }
}

/// Full answer for one lookup: the ordered quote list plus the derived
/// headline figure and the consolidated product identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedAnswer {
    pub jan_code: String,
    /// One entry per registered source, in registration order.
    pub prices: Vec<ShopQuote>,
    /// Highest positive quote, absent when no source had a legible price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best: Option<ShopQuote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_quote_keeps_url_and_zero_price() {
        let q = ShopQuote::empty("買取Wiki", "https://gamekaitori.jp/search?q=49");
        assert_eq!(q.price, 0);
        assert_eq!(q.url, "https://gamekaitori.jp/search?q=49");
        assert!(q.product_name.is_none());
    }

    #[test]
    fn absent_metadata_is_omitted_from_json() {
        let q = ShopQuote::empty("A", "https://a.test/");
        let v = serde_json::to_value(&q).unwrap();
        assert!(v.get("productName").is_none());
        assert!(v.get("imageUrl").is_none());
        assert_eq!(v["shopName"], "A");
    }
}
