//! # Source Registry
//!
//! Static table of the shops we scrape: display name, URL template,
//! role (price signal, metadata, or both) and optional CSS extraction
//! hints for sources with known markup.
//!
//! - Loads from JSON config (`SOURCES_CONFIG_PATH` → `config/sources.json`).
//! - Falls back to a built-in `default_seed()` mirroring the production list.
//! - Immutable after startup; the registration order defines the order of
//!   every quote list this service returns.
//!
//! A homepage-only shop is just a template without a `{code}` placeholder;
//! nothing downstream branches on it.

use serde::Deserialize;
use std::{fs, path::Path};

const ENV_PATH: &str = "SOURCES_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/sources.json";

/// What a source is good for when results are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRole {
    /// Only the price signal is trusted; extracted titles stay local.
    Price,
    /// Only consulted for product name / image.
    Metadata,
    /// Both price and metadata.
    Both,
}

impl SourceRole {
    pub fn provides_metadata(self) -> bool {
        matches!(self, SourceRole::Metadata | SourceRole::Both)
    }

    pub fn provides_price(self) -> bool {
        matches!(self, SourceRole::Price | SourceRole::Both)
    }
}

/// CSS selector paths for sources with relatively stable markup.
/// All fields optional: a price-only shop may carry nothing but `price`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionHints {
    /// First matching element is treated as the result block.
    #[serde(default)]
    pub result_block: Option<String>,
    /// Title within the result block.
    #[serde(default)]
    pub title: Option<String>,
    /// Document-wide fallback when the block title misses.
    #[serde(default)]
    pub title_fallback: Option<String>,
    /// Image within the result block.
    #[serde(default)]
    pub image: Option<String>,
    /// Document-wide fallback image.
    #[serde(default)]
    pub image_fallback: Option<String>,
    /// Element whose text carries the shop's own listed price.
    #[serde(default)]
    pub price: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    /// `{code}` is replaced by the product code; a template without the
    /// placeholder models a homepage-only source.
    pub url_template: String,
    pub role: SourceRole,
    #[serde(default)]
    pub hints: Option<ExtractionHints>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl SourceDescriptor {
    pub fn url_for(&self, code: &str) -> String {
        self.url_template.replace("{code}", code)
    }
}

/// Process-wide, read-only list of sources. Built once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceRegistry {
    pub sources: Vec<SourceDescriptor>,
}

impl SourceRegistry {
    /// Load the registry from a JSON file. Falls back to `default_seed()`
    /// when the file is missing or malformed, so the service always boots.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                tracing::warn!(error = ?e, "sources config unreadable, using built-in seed");
                Self::default_seed()
            }),
            Err(_) => Self::default_seed(),
        }
    }

    /// Resolution order: $SOURCES_CONFIG_PATH → config/sources.json → seed.
    pub fn load_default() -> Self {
        if let Ok(p) = std::env::var(ENV_PATH) {
            return Self::load_from_file(p);
        }
        Self::load_from_file(DEFAULT_PATH)
    }

    pub fn enabled(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter().filter(|s| s.enabled)
    }

    pub fn enabled_len(&self) -> usize {
        self.enabled().count()
    }

    /// Built-in shop list, mirroring production: two marketplaces with
    /// stable markup for metadata, and the buy-back shops for quotes.
    pub fn default_seed() -> Self {
        let sources = vec![
            SourceDescriptor {
                name: "Rakuten".to_string(),
                url_template: "https://search.rakuten.co.jp/search/mall/{code}/".to_string(),
                role: SourceRole::Both,
                hints: Some(ExtractionHints {
                    result_block: Some(".searchresultitem".to_string()),
                    title: Some(".title a".to_string()),
                    title_fallback: Some("div[class*='title'] a".to_string()),
                    image: Some(".image img".to_string()),
                    image_fallback: Some("div[class*='image'] img".to_string()),
                    price: None,
                }),
                enabled: true,
            },
            SourceDescriptor {
                name: "Yahoo".to_string(),
                url_template:
                    "https://shopping.yahoo.co.jp/search?first=1&tab_ex=commerce&p={code}"
                        .to_string(),
                role: SourceRole::Both,
                hints: Some(ExtractionHints {
                    result_block: Some("li.LoopList__item".to_string()),
                    title: Some("a.LoopList__itemTitle".to_string()),
                    title_fallback: None,
                    image: Some("img".to_string()),
                    image_fallback: None,
                    price: None,
                }),
                enabled: true,
            },
            SourceDescriptor {
                name: "買取商店".to_string(),
                url_template: "https://www.kaitorishouten-co.jp/".to_string(),
                role: SourceRole::Price,
                hints: Some(ExtractionHints {
                    price: Some(".price_num".to_string()),
                    ..ExtractionHints::default()
                }),
                enabled: true,
            },
            SourceDescriptor {
                name: "買取Wiki".to_string(),
                url_template: "https://gamekaitori.jp/search?type=&q={code}".to_string(),
                role: SourceRole::Price,
                hints: Some(ExtractionHints {
                    price: Some(".price".to_string()),
                    ..ExtractionHints::default()
                }),
                enabled: true,
            },
            SourceDescriptor {
                name: "買取ルデア".to_string(),
                url_template: "https://kaitori-rudeya.com/search/index/{code}/".to_string(),
                role: SourceRole::Price,
                hints: Some(ExtractionHints {
                    price: Some(".price".to_string()),
                    ..ExtractionHints::default()
                }),
                enabled: true,
            },
            SourceDescriptor {
                name: "買取ソムリエ".to_string(),
                url_template: "https://somurie-kaitori.com/".to_string(),
                role: SourceRole::Price,
                hints: Some(ExtractionHints {
                    price: Some(".price".to_string()),
                    ..ExtractionHints::default()
                }),
                enabled: true,
            },
            SourceDescriptor {
                name: "買取ホムラ".to_string(),
                url_template: "https://kaitori-homura.com/".to_string(),
                role: SourceRole::Price,
                hints: Some(ExtractionHints {
                    price: Some(".price".to_string()),
                    ..ExtractionHints::default()
                }),
                enabled: true,
            },
        ];
        Self { sources }
    }
}
