#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Fuzzy address matching and ranking engine.
//!
//! Resolves free-text, possibly misspelled addresses to geocoded
//! records from an [`AddressStore`].
//!
//! # Architecture
//!
//! - [`dictionary`]: bare street/city name correction (exact key, token
//!   prefix, then an edit-distance scan with early exit)
//! - [`ranking`]: per-record similarity, component, and relevance
//!   signals combined under a [`WeightVector`]
//! - [`parser`]: the external parser seam and the naive tokenizer used
//!   when the parser is absent or fails
//! - [`orchestrator`]: the two-tier request flow, escalating to
//!   dictionary correction when the cheap tier is not confident
//!
//! # Usage
//!
//! ```rust,no_run
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use address_match::{AddressStore, Corrector, CorrectorConfig};
//!
//! let store = AddressStore::open("data/address_index")?;
//! let corrector = Corrector::new(store, CorrectorConfig::default(), None)?;
//! let outcome = corrector.search("orbat 10", 5)?;
//! if let Some(best) = outcome.candidates.first() {
//!     println!("{} ({:.2})", best.record.full_address, best.final_score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dictionary;
pub mod orchestrator;
pub mod parser;
pub mod ranking;
pub mod similarity;

pub use address_match_index::{AddressStore, IndexError};
pub use address_match_models::{
    CorrectionOptions, CorrectionRequest, CorrectionResponse, CorrectorConfig, DictionaryMatch,
    HealthReport, QueryComponents, RankingMode, ScoredCandidate, WeightVector,
};
pub use orchestrator::{Corrector, ParseMethod, SearchOutcome};

/// Errors from matching operations.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// The store failed to answer a query.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] IndexError),

    /// The engine configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(#[from] config::ConfigError),

    /// The request was rejected before matching.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Async task join error.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
