// tests/aggregate_pipeline.rs
//
// End-to-end aggregation over scripted pages: fan-out, per-source failure
// isolation, price extraction, metadata consolidation, and the
// one-quote-per-source invariant.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;

use sedori_price_checker::aggregate::{aggregate, InvalidJanCode};
use sedori_price_checker::fetch::{FetchErrorKind, PageFetcher, RawFetchResult};
use sedori_price_checker::sources::SourceRegistry;

const JAN: &str = "4902370536485";

/// Serves canned bodies by exact URL; anything unknown fails like a dead
/// network.
struct StubFetcher {
    pages: HashMap<String, String>,
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> RawFetchResult {
        match self.pages.get(url) {
            Some(body) => RawFetchResult::ok(body.clone()),
            None => RawFetchResult::failed(FetchErrorKind::Network),
        }
    }
}

fn test_registry() -> SourceRegistry {
    serde_json::from_value(json!({
        "sources": [
            {
                "name": "Rakuten",
                "url_template": "https://rakuten.test/search/{code}/",
                "role": "both",
                "hints": {
                    "result_block": ".searchresultitem",
                    "title": ".title a",
                    "image": ".image img"
                }
            },
            {
                "name": "Yahoo",
                "url_template": "https://yahoo.test/search?p={code}",
                "role": "both",
                "hints": {
                    "result_block": "li.LoopList__item",
                    "title": "a.LoopList__itemTitle",
                    "image": "img"
                }
            },
            {
                "name": "買取Wiki",
                "url_template": "https://kaitori.test/search?q={code}",
                "role": "price",
                "hints": { "price": ".price" }
            },
            {
                "name": "買取ホムラ",
                "url_template": "https://homura.test/",
                "role": "price"
            }
        ]
    }))
    .expect("registry json")
}

fn rakuten_page() -> String {
    // alt text is longer than the anchor title, so it wins the title slot
    r#"<html><body>
        <div class="searchresultitem">
            <div class="title"><a>ポケモン スカーレット</a></div>
            <div class="image">
                <img src="https://img.rakuten.test/p.jpg"
                     alt="ポケットモンスター スカーレット Nintendo Switch ソフト">
            </div>
            <span>¥5,480</span>
        </div>
    </body></html>"#
        .to_string()
}

fn yahoo_page() -> String {
    r#"<html><body>
        <li class="LoopList__item">
            <a class="LoopList__itemTitle">ポケモン SV</a>
            <img data-src="https://img.yahoo.test/p.png" src="">
            <span>5,980円</span>
        </li>
    </body></html>"#
        .to_string()
}

fn kaitori_page() -> String {
    r#"<html><body>
        <div class="item">
            <div class="price">6,200円</div>
            <p>買取強化中 990円キャンペーン対象外</p>
        </div>
    </body></html>"#
        .to_string()
}

fn stub() -> StubFetcher {
    let mut pages = HashMap::new();
    pages.insert(format!("https://rakuten.test/search/{JAN}/"), rakuten_page());
    pages.insert(format!("https://yahoo.test/search?p={JAN}"), yahoo_page());
    pages.insert(format!("https://kaitori.test/search?q={JAN}"), kaitori_page());
    // 買取ホムラ deliberately missing: fetch fails.
    StubFetcher { pages }
}

#[tokio::test]
async fn every_registered_source_yields_exactly_one_quote_in_order() {
    let registry = test_registry();
    let answer = aggregate(&registry, &stub(), JAN).await.expect("valid code");

    assert_eq!(answer.prices.len(), 4);
    let names: Vec<&str> = answer.prices.iter().map(|q| q.shop_name.as_str()).collect();
    assert_eq!(names, vec!["Rakuten", "Yahoo", "買取Wiki", "買取ホムラ"]);
}

#[tokio::test]
async fn failed_source_degrades_to_zero_price_with_url_kept() {
    let registry = test_registry();
    let answer = aggregate(&registry, &stub(), JAN).await.unwrap();

    let homura = &answer.prices[3];
    assert_eq!(homura.price, 0);
    assert_eq!(homura.url, "https://homura.test/");
}

#[tokio::test]
async fn best_quote_is_highest_positive_price() {
    let registry = test_registry();
    let answer = aggregate(&registry, &stub(), JAN).await.unwrap();

    let best = answer.best.expect("three sources had prices");
    assert_eq!(best.shop_name, "買取Wiki");
    assert_eq!(best.price, 6200);
}

#[tokio::test]
async fn consolidated_metadata_is_backfilled_onto_all_quotes() {
    let registry = test_registry();
    let answer = aggregate(&registry, &stub(), JAN).await.unwrap();

    // Rakuten's alt text is the longest candidate among metadata sources.
    let expected = "ポケットモンスター スカーレット Nintendo Switch ソフト";
    assert_eq!(answer.product_name.as_deref(), Some(expected));
    assert_eq!(answer.image_url.as_deref(), Some("https://img.rakuten.test/p.jpg"));

    for quote in &answer.prices {
        assert_eq!(quote.product_name.as_deref(), Some(expected));
        assert_eq!(quote.image_url.as_deref(), Some("https://img.rakuten.test/p.jpg"));
    }
}

#[tokio::test]
async fn lazy_load_image_attribute_is_used_when_src_is_empty() {
    // Yahoo alone, so the consolidation cannot mask its own extraction.
    let yahoo_only: SourceRegistry = serde_json::from_value(json!({
        "sources": [{
            "name": "Yahoo",
            "url_template": "https://yahoo.test/search?p={code}",
            "role": "both",
            "hints": {
                "result_block": "li.LoopList__item",
                "title": "a.LoopList__itemTitle",
                "image": "img"
            }
        }]
    }))
    .unwrap();
    let solo = aggregate(&yahoo_only, &stub(), JAN).await.unwrap();
    assert_eq!(solo.prices[0].image_url.as_deref(), Some("https://img.yahoo.test/p.png"));
}

#[tokio::test]
async fn invalid_codes_are_rejected_before_any_fetch() {
    let registry = test_registry();
    assert_eq!(aggregate(&registry, &stub(), "").await.unwrap_err(), InvalidJanCode);
    assert_eq!(
        aggregate(&registry, &stub(), "49abc123").await.unwrap_err(),
        InvalidJanCode
    );
}

#[tokio::test]
async fn all_sources_failing_still_returns_full_quote_list() {
    let registry = test_registry();
    let empty = StubFetcher { pages: HashMap::new() };
    let answer = aggregate(&registry, &empty, JAN).await.unwrap();

    assert_eq!(answer.prices.len(), 4);
    assert!(answer.prices.iter().all(|q| q.price == 0));
    assert!(answer.best.is_none(), "all-zero must be absent, not an error");
    assert!(answer.product_name.is_none());
}
