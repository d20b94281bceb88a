#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the address matching and ranking engine.
//!
//! Query components, scoring weights, scored candidates, engine
//! configuration, and the request/response envelope exchanged with
//! transport layers. No I/O and no index dependencies beyond the plain
//! record types.

use std::collections::BTreeMap;

pub use address_match_index_models::{AddressRecord, DictionaryEntry, DictionaryKind};
use serde::{Deserialize, Serialize};

/// Structured components of an address query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryComponents {
    /// City or locality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Street name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road: Option<String>,
    /// House number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house_number: Option<String>,
}

impl QueryComponents {
    /// Builds components, treating blank strings as absent.
    #[must_use]
    pub fn new(city: Option<&str>, road: Option<&str>, house_number: Option<&str>) -> Self {
        let own = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        };
        Self {
            city: own(city),
            road: own(road),
            house_number: own(house_number),
        }
    }

    /// Components of a stored record.
    #[must_use]
    pub fn from_record(record: &AddressRecord) -> Self {
        Self::new(
            record.city.as_deref(),
            record.street.as_deref(),
            record.house_number.as_deref(),
        )
    }

    /// `true` when a city or a road is present. A bare house number is
    /// not enough to search on.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        self.city.is_some() || self.road.is_some()
    }

    /// `true` when no component is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.city.is_none() && self.road.is_none() && self.house_number.is_none()
    }
}

/// Weights of the three ranking signals.
///
/// Conventionally sums to 1.0. Constant for the lifetime of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    /// Weight of the normalized edit-distance similarity.
    pub similarity: f64,
    /// Weight of the structured component agreement.
    pub component: f64,
    /// Weight of the index relevance.
    pub relevance: f64,
}

impl Default for WeightVector {
    fn default() -> Self {
        Self {
            similarity: 0.25,
            component: 0.60,
            relevance: 0.15,
        }
    }
}

impl WeightVector {
    /// Creates a weight vector.
    #[must_use]
    pub const fn new(similarity: f64, component: f64, relevance: f64) -> Self {
        Self {
            similarity,
            component,
            relevance,
        }
    }

    /// Sum of all weights.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.similarity + self.component + self.relevance
    }

    /// Every weight is finite and non-negative, and at least one is
    /// positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let weights = [self.similarity, self.component, self.relevance];
        weights.iter().all(|w| w.is_finite() && *w >= 0.0) && weights.iter().any(|w| *w > 0.0)
    }

    /// The weights effective under `mode`.
    ///
    /// [`RankingMode::Basic`] has no edit-distance or relevance signal,
    /// so their weights become zero and the component weight takes the
    /// whole sum.
    #[must_use]
    pub fn for_mode(self, mode: RankingMode) -> Self {
        match mode {
            RankingMode::Advanced => self,
            RankingMode::Basic => Self {
                similarity: 0.0,
                component: self.sum(),
                relevance: 0.0,
            },
        }
    }
}

/// The three per-candidate ranking signals, before weighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    /// Normalized edit-distance similarity in `[0, 1]`.
    pub similarity: f64,
    /// Component agreement, at most 1.0; negative when a requested
    /// house number is missing on the candidate.
    pub component: f64,
    /// Index relevance normalized against the best in the candidate set,
    /// in `[0, 1]`.
    pub relevance: f64,
}

/// Capability flag of the ranking engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMode {
    /// Exact key lookups and component scoring only.
    Basic,
    /// Prefix search, edit-distance similarity, and relevance scoring.
    #[default]
    Advanced,
}

impl RankingMode {
    /// Whether the edit-distance and relevance signals are computed.
    #[must_use]
    pub const fn is_advanced(self) -> bool {
        matches!(self, Self::Advanced)
    }
}

/// Which matcher tier produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Exact normalized-key lookup.
    Exact,
    /// Token-prefix relevance search.
    Prefix,
    /// Edit-distance fallback scan.
    EditDistance,
}

/// A dictionary entry matched against a bare name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryMatch {
    /// Name as stored.
    pub display_name: String,
    /// Normalized key.
    pub normalized_name: String,
    /// Best edit-distance similarity to the query in `[0, 1]`.
    pub similarity: f64,
    /// Usage count of the entry.
    pub usage_count: u64,
    /// Raw index relevance (0 for edit-distance matches).
    pub relevance: f64,
    /// Tier that produced the match.
    pub tier: MatchTier,
    /// `0.7 × similarity + 0.3 × min(usage_count / 1000, 1)`.
    pub blended: f64,
}

/// A record scored against a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    /// Record id in the store.
    pub record_id: u64,
    /// The record.
    pub record: AddressRecord,
    /// Normalized edit-distance similarity in `[0, 1]`.
    pub similarity: f64,
    /// Component agreement score.
    pub component_score: f64,
    /// Normalized index relevance in `[0, 1]`.
    pub relevance_score: f64,
    /// Weighted combination clamped to `[0, 1]`.
    pub final_score: f64,
    /// Tier that retrieved the record.
    pub tier: MatchTier,
}

impl ScoredCandidate {
    /// The unweighted signals of this candidate.
    #[must_use]
    pub const fn signals(&self) -> Signals {
        Signals {
            similarity: self.similarity,
            component: self.component_score,
            relevance: self.relevance_score,
        }
    }
}

/// Engine configuration.
///
/// Every field has a default, so an empty TOML document is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectorConfig {
    /// Ranking signal weights.
    pub weights: WeightVector,
    /// Ranking capability flag.
    pub mode: RankingMode,
    /// Best Tier A score below which the escalation tier runs.
    pub escalation_threshold: f64,
    /// Default minimum similarity of dictionary matches.
    pub min_similarity: f64,
    /// Similarity at which a fallback match counts toward early exit.
    pub high_confidence_similarity: f64,
    /// The fallback scan stops after `early_exit_multiplier × limit`
    /// high-confidence matches.
    pub early_exit_multiplier: usize,
    /// Prefix searches fetch `candidate_multiplier × limit` candidates.
    pub candidate_multiplier: usize,
    /// Number of most-used cities the fallback scan considers.
    pub city_scan_limit: usize,
    /// Dictionary hits per lookup merged during escalation.
    pub escalation_hits: usize,
    /// Parser expansion variants tried for unparseable queries.
    pub max_variants: usize,
    /// Queries shorter than this skip the external parser.
    pub parser_min_query_len: usize,
    /// Minimum similarity for address-level component correction.
    pub address_min_similarity: f64,
    /// Parser language hint.
    pub language: String,
    /// Parser country hint.
    pub country: String,
}

impl Default for CorrectorConfig {
    fn default() -> Self {
        Self {
            weights: WeightVector::default(),
            mode: RankingMode::default(),
            escalation_threshold: 0.28,
            min_similarity: 0.6,
            high_confidence_similarity: 0.8,
            early_exit_multiplier: 2,
            candidate_multiplier: 3,
            city_scan_limit: 30,
            escalation_hits: 3,
            max_variants: 3,
            parser_min_query_len: 3,
            address_min_similarity: 0.7,
            language: "ru".to_string(),
            country: "RU".to_string(),
        }
    }
}

/// Per-request options of a correction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionOptions {
    /// Parser language; the engine default when `None`.
    pub language: Option<String>,
    /// Parser country; the engine default when `None`.
    pub country: Option<String>,
    /// Only return suggestions graded exact or fuzzy match.
    pub strict_mode: bool,
    /// Try parser expansion variants of the query.
    pub enable_normalization: bool,
}

impl Default for CorrectionOptions {
    fn default() -> Self {
        Self {
            language: None,
            country: None,
            strict_mode: false,
            enable_normalization: true,
        }
    }
}

/// A correction request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionRequest {
    /// Free-text address to correct.
    pub original_address: String,
    /// Maximum suggestions; 5 when not positive.
    pub max_suggestions: i32,
    /// Minimum suggestion score; 0.5 when not positive.
    pub min_similarity: f64,
    /// Request options.
    pub options: CorrectionOptions,
}

impl CorrectionRequest {
    /// A request for `address` with default parameters.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            original_address: address.into(),
            ..Self::default()
        }
    }
}

/// Outcome code of a correction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// Request handled.
    Ok,
    /// The request was empty.
    InvalidRequest,
    /// The store failed or an unexpected error occurred.
    InternalError,
}

/// How confident a suggestion is, graded from its score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorrectionSource {
    /// Score ≥ 0.95.
    ExactMatch,
    /// Score ≥ 0.7.
    FuzzyMatch,
    /// Score ≥ 0.5.
    Database,
    /// Anything lower.
    Normalization,
}

impl CorrectionSource {
    /// Grades a suggestion score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.95 {
            Self::ExactMatch
        } else if score >= 0.7 {
            Self::FuzzyMatch
        } else if score >= 0.5 {
            Self::Database
        } else {
            Self::Normalization
        }
    }
}

/// WGS84 coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

/// One suggested correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// The record's full address.
    pub corrected_address: String,
    /// Final ranking score.
    pub similarity_score: f64,
    /// Components of the matched record.
    pub components: QueryComponents,
    /// Coordinates of the matched record.
    pub coordinates: Coordinates,
    /// Tags of the matched record.
    pub tags: BTreeMap<String, String>,
    /// Confidence grade.
    pub source: CorrectionSource,
}

/// A correction response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionResponse {
    /// Outcome code.
    pub status: StatusCode,
    /// Human-readable status message.
    pub message: String,
    /// Error details for `INTERNAL_ERROR`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// The request address, trimmed.
    pub original_address: String,
    /// Best suggestion, or the best normalized variant when there is none.
    pub corrected_address: String,
    /// Suggestions, best first.
    pub suggestions: Vec<Suggestion>,
    /// Whether `corrected_address` differs from the input, ignoring case.
    pub was_corrected: bool,
    /// Wall-clock handling time.
    pub execution_time_ms: u64,
    /// Expansion variants plus candidates evaluated.
    pub variants_checked: u64,
}

/// Overall service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    /// Store readable and holding records.
    Healthy,
    /// Store readable but empty.
    Degraded,
}

/// Health check result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall status.
    pub status: HealthStatus,
    /// Whether the store is reachable.
    pub connected: bool,
    /// Number of records.
    pub records: u64,
    /// Number of street dictionary entries.
    pub streets: u64,
    /// Number of city dictionary entries.
    pub cities: u64,
    /// Seconds since the engine was created.
    pub uptime_seconds: u64,
    /// Engine version.
    pub version: String,
}
