//! # Aggregator
//!
//! Fans one lookup out to every enabled source concurrently, isolates
//! per-source failures, and merges the partial results into one ordered
//! answer. The caller always receives exactly one quote per registered
//! source, in registration order: a dead shop degrades to a zero-price
//! placeholder, it never shrinks or reorders the list.
//!
//! There is no cross-request state: each lookup owns its own response
//! buffers, and dropping the returned future drops every in-flight
//! per-source fetch with it.

use futures::future::join_all;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use std::fmt;
use std::time::Instant;

use crate::extract;
use crate::fetch::PageFetcher;
use crate::quote::{AggregatedAnswer, ShopQuote};
use crate::rank;
use crate::sources::{SourceDescriptor, SourceRegistry};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scrape_lookups_total", "Aggregate lookups served.");
        describe_counter!(
            "scrape_fetch_errors_total",
            "Per-source fetch failures (network/timeout/status/relay-exhausted)."
        );
        describe_counter!(
            "scrape_extraction_miss_total",
            "Pages fetched but yielding no plausible price."
        );
        describe_histogram!(
            "scrape_source_ms",
            "Per-source fetch+extract time in milliseconds."
        );
    });
}

/// The only caller-visible failure of a lookup: the product code itself is
/// unusable. Everything downstream degrades per source instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidJanCode;

impl fmt::Display for InvalidJanCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JAN code is required")
    }
}

impl std::error::Error for InvalidJanCode {}

/// A scannable code is a non-empty digit string (JAN/EAN/ISBN).
pub fn validate_jan(code: &str) -> Result<(), InvalidJanCode> {
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(InvalidJanCode);
    }
    Ok(())
}

/// Look up one product code across every enabled source.
pub async fn aggregate(
    registry: &SourceRegistry,
    fetcher: &dyn PageFetcher,
    code: &str,
) -> Result<AggregatedAnswer, InvalidJanCode> {
    ensure_metrics_described();
    validate_jan(code)?;
    counter!("scrape_lookups_total").increment(1);

    let sources: Vec<&SourceDescriptor> = registry.enabled().collect();

    // Concurrent fan-out; join_all keeps registration order and waits for
    // every source to settle. Slow shops cannot block fast ones, but the
    // lookup as a whole is bounded by the slowest source's own timeout.
    let mut quotes = join_all(
        sources
            .iter()
            .map(|source| scrape_one(source, fetcher, code)),
    )
    .await;

    let (product_name, image_url) = consolidate_metadata(&sources, &mut quotes);
    let best = rank::best_quote(&quotes).cloned();

    Ok(AggregatedAnswer {
        jan_code: code.to_string(),
        prices: quotes,
        best,
        product_name,
        image_url,
    })
}

async fn scrape_one(source: &SourceDescriptor, fetcher: &dyn PageFetcher, code: &str) -> ShopQuote {
    let url = source.url_for(code);
    let t0 = Instant::now();

    let fetched = fetcher.fetch(&url).await;
    if !fetched.succeeded {
        tracing::warn!(source = %source.name, error = ?fetched.error, "source fetch failed");
        counter!("scrape_fetch_errors_total").increment(1);
        return ShopQuote::empty(source.name.clone(), url);
    }

    let extracted = extract::extract(source, &fetched.body);
    histogram!("scrape_source_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    if extracted.price == 0 {
        counter!("scrape_extraction_miss_total").increment(1);
    }

    ShopQuote {
        shop_name: source.name.clone(),
        price: extracted.price,
        url,
        product_name: extracted.product_name,
        image_url: extracted.image_url,
    }
}

/// Merge policy over metadata-role sources: longest non-empty name wins,
/// first non-empty image in registration order wins. The winners are then
/// written onto every quote so the caller renders one coherent product
/// identity even though no single source was complete.
///
/// Known accuracy limitation: "longest wins" is an empirical proxy for
/// "most descriptive" and can promote a longer-but-wrong title.
fn consolidate_metadata(
    sources: &[&SourceDescriptor],
    quotes: &mut [ShopQuote],
) -> (Option<String>, Option<String>) {
    let mut best_name: Option<String> = None;
    let mut best_image: Option<String> = None;

    for (source, quote) in sources.iter().zip(quotes.iter()) {
        if !source.role.provides_metadata() {
            continue;
        }
        if let Some(name) = quote.product_name.as_deref().filter(|n| !n.is_empty()) {
            let longer = best_name
                .as_deref()
                .map_or(true, |b| name.chars().count() > b.chars().count());
            if longer {
                best_name = Some(name.to_string());
            }
        }
        if best_image.is_none() {
            best_image = quote
                .image_url
                .as_deref()
                .filter(|u| !u.is_empty())
                .map(|u| u.to_string());
        }
    }

    for quote in quotes.iter_mut() {
        if best_name.is_some() {
            quote.product_name = best_name.clone();
        }
        if best_image.is_some() {
            quote.image_url = best_image.clone();
        }
    }

    (best_name, best_image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{SourceDescriptor, SourceRole};

    fn desc(name: &str, role: SourceRole) -> SourceDescriptor {
        SourceDescriptor {
            name: name.to_string(),
            url_template: format!("https://{name}.test/{{code}}"),
            role,
            hints: None,
            enabled: true,
        }
    }

    fn quote(name: &str, price: u32, title: Option<&str>, img: Option<&str>) -> ShopQuote {
        ShopQuote {
            shop_name: name.to_string(),
            price,
            url: format!("https://{name}.test/"),
            product_name: title.map(str::to_string),
            image_url: img.map(str::to_string),
        }
    }

    #[test]
    fn rejects_empty_and_non_digit_codes() {
        assert_eq!(validate_jan(""), Err(InvalidJanCode));
        assert_eq!(validate_jan("49abc"), Err(InvalidJanCode));
        assert_eq!(validate_jan("４９０２"), Err(InvalidJanCode));
        assert!(validate_jan("4902370536485").is_ok());
    }

    #[test]
    fn longest_name_wins_and_is_backfilled_everywhere() {
        let x = desc("X", SourceRole::Both);
        let y = desc("Y", SourceRole::Both);
        let z = desc("Z", SourceRole::Price);
        let sources = vec![&x, &y, &z];
        let mut quotes = vec![
            quote("X", 100, Some("Foo"), None),
            quote("Y", 200, Some("Foo Deluxe Edition"), None),
            quote("Z", 300, None, None),
        ];

        let (name, _) = consolidate_metadata(&sources, &mut quotes);
        assert_eq!(name.as_deref(), Some("Foo Deluxe Edition"));
        for q in &quotes {
            assert_eq!(q.product_name.as_deref(), Some("Foo Deluxe Edition"));
        }
    }

    #[test]
    fn first_image_in_registration_order_wins() {
        let x = desc("X", SourceRole::Both);
        let y = desc("Y", SourceRole::Both);
        let sources = vec![&x, &y];
        let mut quotes = vec![
            quote("X", 0, None, Some("https://img.x/1.jpg")),
            quote("Y", 0, None, Some("https://img.y/2.jpg")),
        ];

        let (_, image) = consolidate_metadata(&sources, &mut quotes);
        assert_eq!(image.as_deref(), Some("https://img.x/1.jpg"));
        assert!(quotes
            .iter()
            .all(|q| q.image_url.as_deref() == Some("https://img.x/1.jpg")));
    }

    #[test]
    fn price_only_sources_never_contribute_metadata() {
        let x = desc("X", SourceRole::Price);
        let y = desc("Y", SourceRole::Both);
        let sources = vec![&x, &y];
        let mut quotes = vec![
            quote("X", 500, Some("leaked shop boilerplate"), Some("https://x/no.png")),
            quote("Y", 0, None, None),
        ];

        let (name, image) = consolidate_metadata(&sources, &mut quotes);
        assert!(name.is_none());
        assert!(image.is_none());
        // No winner: the price source keeps its own local title.
        assert_eq!(quotes[0].product_name.as_deref(), Some("leaked shop boilerplate"));
    }
}
