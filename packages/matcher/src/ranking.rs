//! Record-level ranking.
//!
//! Each candidate record gets three independent signals:
//!
//! - **similarity**: edit-distance similarity between the comparison
//!   forms of the query and the record's full address
//! - **component**: agreement of the query components with the
//!   record's fields
//! - **relevance**: the index relevance score divided by the best score
//!   of the same retrieval batch
//!
//! [`final_score`] combines them linearly. It is a pure function of the
//! weights and signals, so offline tools can re-score cached signals
//! under any [`WeightVector`].

use std::cmp::Ordering;

use address_match_index::normalize;
use address_match_index::records::RecordHit;
use address_match_models::{
    AddressRecord, MatchTier, QueryComponents, RankingMode, ScoredCandidate, Signals, WeightVector,
};

use crate::similarity::normalized_similarity;

/// Credit for a query city contained in the record's city.
pub const CITY_CONTAINED: f64 = 0.5;

/// Credit for a query road contained in the record's street.
pub const ROAD_CONTAINED: f64 = 0.7;

/// Credit for a query house number contained in the record's.
pub const HOUSE_CONTAINED: f64 = 0.5;

/// Penalty when a house number was requested but the record has none.
pub const HOUSE_MISSING_PENALTY: f64 = -0.3;

/// Weighted sum of `signals`, clamped to `[0, 1]`.
#[must_use]
pub fn final_score(weights: &WeightVector, signals: &Signals) -> f64 {
    let score = weights.relevance.mul_add(
        signals.relevance,
        weights
            .similarity
            .mul_add(signals.similarity, weights.component * signals.component),
    );
    score.clamp(0.0, 1.0)
}

/// Edit-distance similarity of the query and a full address, each in
/// comparison form (admin tokens dropped, tokens sorted).
#[must_use]
pub fn similarity_signal(query: &str, full_address: &str) -> f64 {
    normalized_similarity(
        &normalize::comparison_form(query),
        &normalize::comparison_form(full_address),
    )
}

/// Average per-field agreement of the present query components.
///
/// Per field: 1.0 on a case-insensitive match, partial credit when the
/// query value is contained in the record value, and for the house
/// number a penalty when the record has none. Zero when no component
/// is present.
#[must_use]
pub fn component_signal(components: &QueryComponents, record: &AddressRecord) -> f64 {
    let mut total = 0.0;
    let mut present = 0u32;

    if let Some(city) = components.city.as_deref() {
        present += 1;
        let query = normalize::normalize_key(city);
        let stored = normalize::normalize_key(record.city_str());
        if !stored.is_empty() {
            if query == stored {
                total += 1.0;
            } else if stored.contains(&query) {
                total += CITY_CONTAINED;
            }
        }
    }

    if let Some(road) = components.road.as_deref() {
        present += 1;
        let query = normalize::comparison_form(road);
        let stored = normalize::comparison_form(record.street_str());
        if query == stored {
            total += 1.0;
        } else if !query.is_empty() && !stored.is_empty() && stored.contains(&query) {
            total += ROAD_CONTAINED;
        }
    }

    if let Some(house) = components.house_number.as_deref() {
        present += 1;
        let query = normalize::normalize_key(house);
        let stored = normalize::normalize_key(record.house_number_str());
        if stored.is_empty() {
            total += HOUSE_MISSING_PENALTY;
        } else if query == stored {
            total += 1.0;
        } else if stored.contains(&query) {
            total += HOUSE_CONTAINED;
        }
    }

    if present == 0 {
        return 0.0;
    }
    total / f64::from(present)
}

/// `true` when every present component fully agrees with the record.
#[must_use]
pub fn is_exact_match(components: &QueryComponents, record: &AddressRecord) -> bool {
    components.is_usable() && (component_signal(components, record) - 1.0).abs() < f64::EPSILON
}

/// Scores one retrieval batch.
///
/// Relevance is normalized against the best score of `hits`. In
/// [`RankingMode::Basic`] the similarity and relevance signals are not
/// computed.
#[must_use]
pub fn score_batch(
    hits: Vec<RecordHit>,
    components: &QueryComponents,
    query: &str,
    weights: &WeightVector,
    mode: RankingMode,
    tier: MatchTier,
) -> Vec<ScoredCandidate> {
    let best_relevance = hits.iter().map(|h| h.relevance).fold(0.0f32, f32::max);

    hits.into_iter()
        .map(|hit| {
            let signals = if mode.is_advanced() {
                Signals {
                    similarity: similarity_signal(query, &hit.record.full_address),
                    component: component_signal(components, &hit.record),
                    relevance: if best_relevance > 0.0 {
                        f64::from(hit.relevance / best_relevance).min(1.0)
                    } else {
                        0.0
                    },
                }
            } else {
                Signals {
                    component: component_signal(components, &hit.record),
                    ..Signals::default()
                }
            };

            let tier = if tier == MatchTier::Prefix && is_exact_match(components, &hit.record) {
                MatchTier::Exact
            } else {
                tier
            };

            ScoredCandidate {
                record_id: hit.id,
                final_score: final_score(weights, &signals),
                similarity: signals.similarity,
                component_score: signals.component,
                relevance_score: signals.relevance,
                record: hit.record,
                tier,
            }
        })
        .collect()
}

/// Final score descending, then component score descending, then full
/// address ascending, then record id ascending.
#[must_use]
pub fn compare_candidates(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| b.component_score.total_cmp(&a.component_score))
        .then_with(|| a.record.full_address.cmp(&b.record.full_address))
        .then_with(|| a.record_id.cmp(&b.record_id))
}

/// Sorts candidates best first and keeps the top `limit`.
pub fn rank(candidates: &mut Vec<ScoredCandidate>, limit: usize) {
    candidates.sort_by(compare_candidates);
    candidates.truncate(limit);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(city: &str, street: &str, house: Option<&str>) -> AddressRecord {
        AddressRecord {
            city: Some(city.to_string()),
            street: Some(street.to_string()),
            house_number: house.map(ToString::to_string),
            latitude: 55.75,
            longitude: 37.59,
            full_address: AddressRecord::compose_full_address(Some(city), Some(street), house),
            tags: std::collections::BTreeMap::new(),
        }
    }

    fn hit(id: u64, record: AddressRecord, relevance: f32) -> RecordHit {
        RecordHit {
            id,
            record,
            relevance,
        }
    }

    #[test]
    fn perfect_match_scores_one() {
        let components = QueryComponents::new(Some("Moscow"), Some("Arbat street"), Some("10"));
        let scored = score_batch(
            vec![hit(0, record("Moscow", "Arbat Street", Some("10")), 4.2)],
            &components,
            "Moscow, Arbat street, 10",
            &WeightVector::default(),
            RankingMode::Advanced,
            MatchTier::Prefix,
        );
        assert!((scored[0].final_score - 1.0).abs() < 1e-9);
        assert_eq!(scored[0].tier, MatchTier::Exact);
    }

    #[test]
    fn component_grades() {
        let r = record("Moscow", "Arbat Street", Some("10к2"));

        let city_only = QueryComponents::new(Some("moscow"), None, None);
        assert!((component_signal(&city_only, &r) - 1.0).abs() < 1e-9);

        let partial_city = QueryComponents::new(Some("mos"), None, None);
        assert!((component_signal(&partial_city, &r) - CITY_CONTAINED).abs() < 1e-9);

        let partial_house = QueryComponents::new(None, None, Some("10"));
        assert!((component_signal(&partial_house, &r) - HOUSE_CONTAINED).abs() < 1e-9);

        let road = QueryComponents::new(None, Some("ул. Arbat"), None);
        assert!((component_signal(&road, &r) - 1.0).abs() < 1e-9);

        assert!(component_signal(&QueryComponents::default(), &r).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_house_number_is_penalized() {
        let r = record("Moscow", "Arbat Street", None);
        let components = QueryComponents::new(None, Some("Arbat"), Some("10"));
        let score = component_signal(&components, &r);
        assert!((score - (1.0 + HOUSE_MISSING_PENALTY) / 2.0).abs() < 1e-9);

        let house_only = QueryComponents::new(None, None, Some("10"));
        assert!(component_signal(&house_only, &r) < 0.0);
    }

    #[test]
    fn final_score_is_clamped() {
        let weights = WeightVector::default();
        let low = Signals {
            similarity: 0.0,
            component: -0.3,
            relevance: 0.0,
        };
        assert!(final_score(&weights, &low).abs() < f64::EPSILON);

        let heavy = WeightVector::new(1.0, 1.0, 1.0);
        let high = Signals {
            similarity: 1.0,
            component: 1.0,
            relevance: 1.0,
        };
        assert!((final_score(&heavy, &high) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn raising_component_weight_favours_perfect_components() {
        let perfect = Signals {
            similarity: 0.4,
            component: 1.0,
            relevance: 0.5,
        };
        let imperfect = Signals {
            component: 0.5,
            ..perfect
        };

        let mut previous_gap = f64::NEG_INFINITY;
        for step in 0..=6 {
            let w = WeightVector::new(0.2, 0.1 * f64::from(step), 0.1);
            let gap = final_score(&w, &perfect) - final_score(&w, &imperfect);
            assert!(gap >= 0.0);
            assert!(gap >= previous_gap - 1e-12);
            previous_gap = gap;
        }
    }

    #[test]
    fn relevance_is_normalized_per_batch() {
        let components = QueryComponents::new(None, Some("Arbat"), None);
        let scored = score_batch(
            vec![
                hit(0, record("Moscow", "Arbat Street", Some("10")), 8.0),
                hit(1, record("Moscow", "Arbat Street", Some("12")), 2.0),
            ],
            &components,
            "Arbat",
            &WeightVector::default(),
            RankingMode::Advanced,
            MatchTier::Prefix,
        );
        assert!((scored[0].relevance_score - 1.0).abs() < 1e-9);
        assert!((scored[1].relevance_score - 0.25).abs() < 1e-9);
    }

    #[test]
    fn basic_mode_skips_fuzzy_signals() {
        let components = QueryComponents::new(Some("Moscow"), Some("Arbat Street"), None);
        let weights = WeightVector::default().for_mode(RankingMode::Basic);
        let scored = score_batch(
            vec![hit(0, record("Moscow", "Arbat Street", Some("10")), 3.0)],
            &components,
            "Moscow Arbat Street",
            &weights,
            RankingMode::Basic,
            MatchTier::Exact,
        );
        assert!(scored[0].similarity.abs() < f64::EPSILON);
        assert!(scored[0].relevance_score.abs() < f64::EPSILON);
        assert!((scored[0].final_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ties_break_deterministically() {
        let components = QueryComponents::new(None, Some("Arbat"), None);
        let mut scored = score_batch(
            vec![
                hit(7, record("Moscow", "Arbat Street", Some("12")), 1.0),
                hit(3, record("Moscow", "Arbat Street", Some("10")), 1.0),
            ],
            &components,
            "Arbat",
            &WeightVector::new(0.0, 1.0, 0.0),
            RankingMode::Advanced,
            MatchTier::Prefix,
        );
        rank(&mut scored, 10);
        assert_eq!(scored[0].record_id, 3);
        assert_eq!(scored[1].record_id, 7);

        rank(&mut scored, 1);
        assert_eq!(scored.len(), 1);
    }

    #[test]
    fn similarity_ignores_token_order_and_admin_words() {
        let score = similarity_signal("ул. Арбат 10 Москва", "Москва, Арбат, 10");
        assert!((score - 1.0).abs() < 1e-9);
    }
}
