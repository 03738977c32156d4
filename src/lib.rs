// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod aggregate;
pub mod api;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod metrics;
pub mod quote;
pub mod rank;
pub mod sources;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{aggregate, validate_jan, InvalidJanCode};
pub use crate::api::{router, AppState};
pub use crate::fetch::{FetchErrorKind, PageFetcher, RawFetchResult};
pub use crate::quote::{AggregatedAnswer, ShopQuote};
pub use crate::rank::best_quote;
pub use crate::sources::{SourceDescriptor, SourceRegistry, SourceRole};
