//! # Extractor
//!
//! Turns one fetched page into a price signal plus optional product
//! metadata. Two passes, most specific first:
//!
//! 1. **Structured**: CSS hints from the source descriptor locate the first
//!    result block and read title/image (and the block's own listed price,
//!    when the shop exposes one).
//! 2. **Generic price scan**: layout-independent regex over the visible page
//!    text for `¥1,234` / `1,234円` shapes. Candidates outside the
//!    (100, 1,000,000) exclusive band are noise (dates, counts, promo codes)
//!    and dropped; the maximum survivor is the page's price signal. Buy-back
//!    pages show the offered price as the most prominent number, so "max
//!    plausible number" holds up without per-page layout knowledge.
//!
//! The scan always runs; the final price is the larger of the two passes.
//! Structured selectors break silently whenever a shop redesigns, which is
//! exactly why the scan is not just a fallback.

use once_cell::sync::OnceCell;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::sources::{ExtractionHints, SourceDescriptor};

/// Boilerplate that leaks into scraped titles (site names, result-page
/// chrome). Stripped from every title; a title that is nothing else is
/// discarded rather than surfaced.
const TITLE_DENYLIST: &[&str] = &[
    "【楽天市場】",
    "楽天市場",
    "Yahoo!ショッピング",
    "ヤフーショッピング",
    "検索結果",
    "商品一覧",
    "買取価格表",
    "買取Wiki",
    "買取商店",
    "買取ルデア",
    "買取ソムリエ",
    "買取ホムラ",
    "送料無料",
];

/// What one page yielded. `price == 0` means no plausible signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub price: u32,
    pub product_name: Option<String>,
    pub image_url: Option<String>,
}

fn price_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    // Currency-prefixed or 円-suffixed integers, thousands separators allowed.
    RE.get_or_init(|| Regex::new(r"[¥￥]([0-9][0-9,]*)|([0-9][0-9,]*)円").unwrap())
}

fn script_style_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap())
}

fn tags_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap())
}

fn ws_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn digits_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"[0-9][0-9,]*").unwrap())
}

/// Strict exclusive band; 100 and 1,000,000 themselves are rejected.
pub fn plausible_price(p: u32) -> bool {
    p > 100 && p < 1_000_000
}

/// Visible page text: drop script/style blocks, strip tags, decode
/// entities, collapse whitespace.
pub fn visible_text(html: &str) -> String {
    let no_scripts = script_style_re().replace_all(html, " ");
    let no_tags = tags_re().replace_all(&no_scripts, " ");
    let decoded = html_escape::decode_html_entities(&no_tags);
    ws_re().replace_all(&decoded, " ").trim().to_string()
}

/// All plausible price candidates in the text, in match order.
/// Pure function of its input, so re-running on identical text is
/// guaranteed to yield the identical candidate list.
pub fn scan_prices(text: &str) -> Vec<u32> {
    let mut out = Vec::new();
    for caps in price_re().captures_iter(text) {
        let raw = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        if let Ok(p) = raw.replace(',', "").parse::<u32>() {
            if plausible_price(p) {
                out.push(p);
            }
        }
    }
    out
}

/// Price signal for a whole page: maximum plausible candidate, else 0.
pub fn page_price(visible: &str) -> u32 {
    scan_prices(visible).into_iter().max().unwrap_or(0)
}

/// Price from one element's text, e.g. a `.price` node reading "¥1,480".
/// Falls back to bare digit runs when the currency marker is missing.
fn parse_price_text(text: &str) -> Option<u32> {
    if let Some(p) = scan_prices(text).into_iter().max() {
        return Some(p);
    }
    digits_re()
        .find_iter(text)
        .filter_map(|m| m.as_str().replace(',', "").parse::<u32>().ok())
        .filter(|p| plausible_price(*p))
        .max()
}

/// Title hygiene: decode entities, strip denylisted boilerplate, and refuse
/// to surface a title that was nothing but boilerplate.
pub fn clean_title(raw: &str) -> Option<String> {
    let decoded = html_escape::decode_html_entities(raw).to_string();
    let mut out = ws_re().replace_all(&decoded, " ").trim().to_string();
    if out.is_empty() || TITLE_DENYLIST.contains(&out.as_str()) {
        return None;
    }
    for phrase in TITLE_DENYLIST {
        out = out.replace(phrase, " ");
    }
    let out = ws_re().replace_all(&out, " ");
    let out = out
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '|' | '｜' | '-' | ':' | '：'))
        .to_string();
    if out.is_empty() || TITLE_DENYLIST.contains(&out.as_str()) {
        None
    } else {
        Some(out)
    }
}

/// Extract price + metadata for one source's page body.
pub fn extract(source: &SourceDescriptor, body: &str) -> Extracted {
    let mut raw_title: Option<String> = None;
    let mut image_url: Option<String> = None;
    let mut listed_price: Option<u32> = None;

    if let Some(hints) = &source.hints {
        let (t, i, p) = structured_pass(hints, body);
        raw_title = t;
        image_url = i;
        listed_price = p;
    }

    let scanned = page_price(&visible_text(body));
    let price = listed_price.unwrap_or(0).max(scanned);

    Extracted {
        price,
        product_name: raw_title.as_deref().and_then(clean_title),
        image_url,
    }
}

/// Config-driven selector; a bad path in the config just disables that hint.
fn parse_selector(path: &str) -> Option<Selector> {
    match Selector::parse(path) {
        Ok(s) => Some(s),
        Err(_) => {
            tracing::warn!(selector = %path, "unparseable selector hint, skipping");
            None
        }
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Real image source, skipping lazy-load placeholders: a usable `src` wins,
/// otherwise `data-src`.
fn image_src(el: ElementRef<'_>) -> Option<String> {
    let v = el.value();
    let src = v
        .attr("src")
        .filter(|s| !s.is_empty() && !s.starts_with("data:"));
    src.or_else(|| v.attr("data-src").filter(|s| !s.is_empty()))
        .map(|s| s.to_string())
}

/// First element for a hint path: within the result block when one
/// matched, document-wide otherwise.
fn select_first<'a>(
    doc: &'a Html,
    block: Option<ElementRef<'a>>,
    path: &str,
) -> Option<ElementRef<'a>> {
    let sel = parse_selector(path)?;
    match block {
        Some(b) => b.select(&sel).next(),
        None => doc.select(&sel).next(),
    }
}

/// First element document-wide, ignoring the block.
fn select_global<'a>(doc: &'a Html, path: &str) -> Option<ElementRef<'a>> {
    let sel = parse_selector(path)?;
    doc.select(&sel).next()
}

fn structured_pass(
    hints: &ExtractionHints,
    body: &str,
) -> (Option<String>, Option<String>, Option<u32>) {
    let doc = Html::parse_document(body);

    let block: Option<ElementRef<'_>> = hints
        .result_block
        .as_deref()
        .and_then(|p| select_global(&doc, p));

    let mut title = hints
        .title
        .as_deref()
        .and_then(|p| select_first(&doc, block, p))
        .map(element_text)
        .filter(|t| !t.is_empty());

    // Shops shuffle class names; the fallback path matches on substrings
    // across the whole document.
    if title.is_none() {
        title = hints
            .title_fallback
            .as_deref()
            .and_then(|p| select_global(&doc, p))
            .map(element_text)
            .filter(|t| !t.is_empty());
    }

    let mut img_el = hints
        .image
        .as_deref()
        .and_then(|p| select_first(&doc, block, p));
    if img_el.is_none() {
        img_el = hints
            .image_fallback
            .as_deref()
            .and_then(|p| select_global(&doc, p));
    }

    let mut image = None;
    if let Some(img) = img_el {
        image = image_src(img);
        // An alt text longer than the visible title is usually the complete
        // product name, truncated in the anchor.
        if let Some(alt) = img.value().attr("alt") {
            let cur_len = title.as_deref().map(|t| t.chars().count()).unwrap_or(0);
            if !alt.trim().is_empty() && alt.chars().count() > cur_len {
                title = Some(alt.trim().to_string());
            }
        }
    }

    let listed_price = hints
        .price
        .as_deref()
        .and_then(|p| select_first(&doc, block, p))
        .map(element_text)
        .as_deref()
        .and_then(parse_price_text);

    (title, image, listed_price)
}
