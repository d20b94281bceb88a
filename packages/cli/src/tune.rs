//! Offline weight tuning.
//!
//! Each tuning case is searched once and the unweighted signals of its
//! candidates are kept. Every weight triple of the grid then re-scores
//! those cached signals through [`ranking::final_score`], so the grid
//! costs no further store queries.

use std::path::Path;
use std::sync::Arc;

use address_match::ranking;
use address_match::{Corrector, MatchError};
use address_match_index::normalize;
use address_match_index::progress::ProgressCallback;
use address_match_models::{ScoredCandidate, WeightVector};
use serde::Deserialize;

/// Cases bundled with the binary.
pub const DEFAULT_CASES: &str = include_str!("tuning_cases.toml");

/// Candidates kept per case.
pub const CANDIDATES_PER_CASE: usize = 10;

/// Errors from loading tuning cases.
#[derive(Debug, thiserror::Error)]
pub enum TuneError {
    /// The cases file could not be read.
    #[error("Failed to read cases {path}: {source}")]
    Io {
        /// Path of the cases file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The cases document is not valid.
    #[error("Invalid cases: {0}")]
    Toml(#[from] toml::de::Error),

    /// Searching a case failed.
    #[error(transparent)]
    Match(#[from] MatchError),
}

/// A query and the record it should resolve to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TuningCase {
    /// Free-text query.
    pub query: String,
    /// Street of the expected record.
    pub expected_street: String,
    /// House number of the expected record, if any.
    #[serde(default)]
    pub expected_house: Option<String>,
}

impl TuningCase {
    /// Whether `candidate` is the expected record.
    #[must_use]
    pub fn is_satisfied_by(&self, candidate: &ScoredCandidate) -> bool {
        let street = normalize::comparison_form(candidate.record.street_str());
        if street != normalize::comparison_form(&self.expected_street) {
            return false;
        }
        self.expected_house.as_deref().is_none_or(|house| {
            normalize::normalize_key(house)
                == normalize::normalize_key(candidate.record.house_number_str())
        })
    }
}

#[derive(Deserialize)]
struct CaseFile {
    #[serde(rename = "case", default)]
    cases: Vec<TuningCase>,
}

/// Parses a cases document of `[[case]]` tables.
///
/// # Errors
///
/// Returns [`TuneError::Toml`] if the document does not parse.
pub fn parse_cases(document: &str) -> Result<Vec<TuningCase>, TuneError> {
    let file: CaseFile = toml::from_str(document)?;
    Ok(file.cases)
}

/// Reads a cases file, or the bundled cases when `path` is `None`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse.
pub fn load_cases(path: Option<&Path>) -> Result<Vec<TuningCase>, TuneError> {
    let Some(path) = path else {
        return parse_cases(DEFAULT_CASES);
    };
    let document = std::fs::read_to_string(path).map_err(|e| TuneError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_cases(&document)
}

/// A case with the candidates found for it.
#[derive(Debug, Clone)]
pub struct CaseSignals {
    /// The case.
    pub case: TuningCase,
    /// Candidates with their unweighted signals.
    pub candidates: Vec<ScoredCandidate>,
}

/// Searches every case once.
///
/// # Errors
///
/// Returns an error if the store fails.
pub fn collect_signals(
    corrector: &Corrector,
    cases: Vec<TuningCase>,
) -> Result<Vec<CaseSignals>, TuneError> {
    cases
        .into_iter()
        .map(|case| {
            let outcome = corrector.search(&case.query, CANDIDATES_PER_CASE)?;
            log::debug!(
                "Case '{}': {} candidates",
                case.query,
                outcome.candidates.len()
            );
            Ok(CaseSignals {
                case,
                candidates: outcome.candidates,
            })
        })
        .collect()
}

/// Weight triples in steps of 0.1 with `similarity ∈ [0.1, 0.5]`,
/// `component ∈ [0.3, 0.7]`, `relevance ∈ [0.1, 0.4]`, summing to 1.
#[must_use]
pub fn weight_grid() -> Vec<WeightVector> {
    let mut grid = Vec::new();
    for similarity in 1..=5u8 {
        for component in 3..=7u8 {
            let Some(relevance) = 10u8.checked_sub(similarity + component) else {
                continue;
            };
            if (1..=4).contains(&relevance) {
                grid.push(WeightVector::new(
                    f64::from(similarity) / 10.0,
                    f64::from(component) / 10.0,
                    f64::from(relevance) / 10.0,
                ));
            }
        }
    }
    grid
}

/// How one weight triple performed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridResult {
    /// The weights.
    pub weights: WeightVector,
    /// Cases whose top candidate was the expected record.
    pub passed: usize,
    /// Cases evaluated.
    pub total: usize,
    /// Mean re-scored final score of the top candidates.
    pub mean_top_score: f64,
}

impl GridResult {
    /// Fraction of cases passed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }
}

/// Re-scores the cached candidates under `weights`.
#[must_use]
pub fn evaluate(weights: &WeightVector, signals: &[CaseSignals]) -> GridResult {
    let mut passed = 0;
    let mut top_total = 0.0;

    for case in signals {
        let top = case
            .candidates
            .iter()
            .map(|c| ScoredCandidate {
                final_score: ranking::final_score(weights, &c.signals()),
                ..c.clone()
            })
            .min_by(ranking::compare_candidates);

        if let Some(top) = top {
            top_total += top.final_score;
            if case.case.is_satisfied_by(&top) {
                passed += 1;
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let mean_top_score = if signals.is_empty() {
        0.0
    } else {
        top_total / signals.len() as f64
    };

    GridResult {
        weights: *weights,
        passed,
        total: signals.len(),
        mean_top_score,
    }
}

/// Evaluates every grid point, best first: pass rate descending, then
/// mean top score descending.
#[must_use]
pub fn run_grid(signals: &[CaseSignals], progress: &Arc<dyn ProgressCallback>) -> Vec<GridResult> {
    let grid = weight_grid();
    progress.set_total(grid.len() as u64);

    let mut results: Vec<GridResult> = grid
        .iter()
        .map(|weights| {
            let result = evaluate(weights, signals);
            progress.inc(1);
            result
        })
        .collect();

    results.sort_by(|a, b| {
        b.pass_rate()
            .total_cmp(&a.pass_rate())
            .then_with(|| b.mean_top_score.total_cmp(&a.mean_top_score))
    });

    progress.finish(format!("Evaluated {} weight triples", results.len()));
    results
}
