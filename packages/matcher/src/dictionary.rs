//! Bare-name correction against the street and city dictionaries.
//!
//! Three tiers, cheapest first:
//!
//! 1. **Exact**: normalized-key lookup
//! 2. **Prefix**: token-prefix relevance search, over-fetching
//!    `candidate_multiplier × limit` entries for re-ranking
//! 3. **Edit distance**: only when the first two return nothing; scans
//!    the dictionary in descending usage order and stops early once
//!    `early_exit_multiplier × limit` high-confidence matches are found
//!
//! Every surviving candidate has similarity ≥ `min_similarity` and is
//! ranked by `0.7 × similarity + 0.3 × min(usage / 1000, 1)`.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use address_match_index::dictionary::DictionaryIndex;
use address_match_index::{IndexError, normalize};
use address_match_models::{
    CorrectorConfig, DictionaryEntry, DictionaryKind, DictionaryMatch, MatchTier,
};

use crate::similarity::best_part_similarity;

/// Weight of similarity in the blended dictionary score.
pub const SIMILARITY_BLEND: f64 = 0.7;

/// Weight of popularity in the blended dictionary score.
pub const USAGE_BLEND: f64 = 0.3;

/// Usage count at which the popularity term saturates.
pub const USAGE_SATURATION: f64 = 1000.0;

/// Shortest query, in characters, that is matched at all.
pub const MIN_QUERY_CHARS: usize = 2;

/// `0.7 × similarity + 0.3 × min(usage / 1000, 1)`.
#[must_use]
pub fn blended_score(similarity: f64, usage_count: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let popularity = (usage_count as f64 / USAGE_SATURATION).min(1.0);
    SIMILARITY_BLEND.mul_add(similarity, USAGE_BLEND * popularity)
}

/// Result of a dictionary correction.
#[derive(Debug, Clone, Default)]
pub struct NameOutcome {
    /// Matches, best first, at most `limit`.
    pub matches: Vec<DictionaryMatch>,
    /// Whether the edit-distance fallback ran.
    pub fallback: bool,
    /// Entries compared by the fallback scan.
    pub scanned: usize,
    /// Whether the fallback scan stopped early.
    pub early_exit: bool,
}

/// Corrects a bare street or city name.
///
/// Queries shorter than two characters, or with nothing left after
/// sanitization, return an empty outcome.
///
/// # Errors
///
/// Returns an error if the dictionary cannot be searched.
pub fn correct_name(
    dictionary: &DictionaryIndex,
    kind: DictionaryKind,
    query: &str,
    limit: usize,
    min_similarity: f64,
    config: &CorrectorConfig,
) -> Result<NameOutcome, IndexError> {
    if limit == 0 || query.trim().chars().count() < MIN_QUERY_CHARS {
        return Ok(NameOutcome::default());
    }

    let sanitized = normalize::sanitize_query(query);
    let key = normalize::normalize_key(&sanitized);
    if key.is_empty() {
        return Ok(NameOutcome::default());
    }

    let mut outcome = NameOutcome::default();
    let mut seen = BTreeSet::new();
    let mut matches = Vec::new();

    if let Some(entry) = dictionary.lookup(&key)? {
        seen.insert(entry.normalized_name.clone());
        matches.push(to_match(entry, 1.0, 0.0, MatchTier::Exact));
    }

    let fetch = limit.saturating_mul(config.candidate_multiplier.max(1));
    for (entry, score) in dictionary.prefix_search(&sanitized, fetch)? {
        if !seen.insert(entry.normalized_name.clone()) {
            continue;
        }
        let similarity = best_part_similarity(&key, &entry.normalized_name);
        if similarity >= min_similarity {
            matches.push(to_match(entry, similarity, f64::from(score), MatchTier::Prefix));
        }
    }

    if matches.is_empty() && seen.is_empty() {
        log::info!(
            "Prefix search found nothing for {} '{}', trying edit distance",
            kind.as_str(),
            key
        );
        outcome.fallback = true;

        let scan: &[DictionaryEntry] = match kind {
            DictionaryKind::Street => dictionary.by_usage(),
            DictionaryKind::City => {
                let all = dictionary.by_usage();
                &all[..all.len().min(config.city_scan_limit)]
            }
        };
        let target = limit.saturating_mul(config.early_exit_multiplier.max(1));
        let mut high_confidence = 0usize;

        for entry in scan {
            outcome.scanned += 1;
            let similarity = best_part_similarity(&key, &entry.normalized_name);
            if similarity < min_similarity {
                continue;
            }
            matches.push(to_match(entry.clone(), similarity, 0.0, MatchTier::EditDistance));

            if similarity >= config.high_confidence_similarity {
                high_confidence += 1;
                if high_confidence >= target {
                    log::info!("Early exit: found {high_confidence} good matches");
                    outcome.early_exit = true;
                    break;
                }
            }
        }
    }

    matches.sort_by(compare_matches);
    matches.truncate(limit);
    outcome.matches = matches;

    Ok(outcome)
}

fn to_match(entry: DictionaryEntry, similarity: f64, relevance: f64, tier: MatchTier) -> DictionaryMatch {
    DictionaryMatch {
        blended: blended_score(similarity, entry.usage_count),
        display_name: entry.display_name,
        normalized_name: entry.normalized_name,
        similarity,
        usage_count: entry.usage_count,
        relevance,
        tier,
    }
}

/// Blended score descending, then usage descending, then key ascending.
fn compare_matches(a: &DictionaryMatch, b: &DictionaryMatch) -> Ordering {
    b.blended
        .total_cmp(&a.blended)
        .then_with(|| b.usage_count.cmp(&a.usage_count))
        .then_with(|| a.normalized_name.cmp(&b.normalized_name))
}
