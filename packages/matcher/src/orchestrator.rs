//! Two-tier correction flow.
//!
//! **Tier A** parses the query into components and ranks the records
//! retrieved for them. **Tier B** runs when Tier A's best score is below
//! the escalation threshold or the query has neither city nor road: the
//! road, the bare query text, its individual words and (for unparseable
//! queries) parser variants are corrected against the street and city
//! dictionaries, and the records retrieved for each corrected component
//! set are merged into the candidate pool before the final ranking.
//!
//! Every step has a hard candidate bound, so the cost of a request does
//! not grow with the store.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use address_match_index::records::RecordKeys;
use address_match_index::{AddressStore, normalize, query, synonyms};
use address_match_models::{
    CorrectionOptions, CorrectionRequest, CorrectionResponse, CorrectionSource, CorrectorConfig,
    Coordinates, DictionaryKind, DictionaryMatch, HealthReport, HealthStatus, MatchTier,
    QueryComponents, ScoredCandidate, StatusCode, Suggestion, WeightVector,
};

use crate::MatchError;
use crate::config;
use crate::dictionary::{self, MIN_QUERY_CHARS, correct_name};
use crate::parser::{AddressParser, CitySnapshot, NaiveTokenizer};
use crate::ranking;

/// Suggestions returned when a request asks for none.
pub const DEFAULT_MAX_SUGGESTIONS: usize = 5;

/// Minimum suggestion score when a request asks for none.
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.5;

/// Most single-word lookups tried during escalation.
const MAX_WORD_LOOKUPS: usize = 4;

/// How the query components were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMethod {
    /// The external parser.
    Parser,
    /// The local naive tokenizer.
    Naive,
}

/// Result of [`Corrector::search`].
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Ranked candidates, best first.
    pub candidates: Vec<ScoredCandidate>,
    /// Components parsed from the query.
    pub components: QueryComponents,
    /// How the components were parsed.
    pub parse_method: ParseMethod,
    /// Whether Tier B ran.
    pub escalated: bool,
    /// Best final score after Tier A alone.
    pub tier_a_best: f64,
    /// Normalized variants tried during escalation.
    pub variants: Vec<String>,
    /// Candidates scored across all retrievals, before merging.
    pub candidates_evaluated: usize,
}

impl SearchOutcome {
    fn empty() -> Self {
        Self {
            candidates: Vec::new(),
            components: QueryComponents::default(),
            parse_method: ParseMethod::Naive,
            escalated: false,
            tier_a_best: 0.0,
            variants: Vec::new(),
            candidates_evaluated: 0,
        }
    }
}

/// The store together with everything derived from it.
struct Snapshot {
    store: AddressStore,
    tokenizer: NaiveTokenizer,
}

impl Snapshot {
    fn new(store: AddressStore) -> Self {
        let cities = CitySnapshot::from_dictionary(store.dictionary(DictionaryKind::City));
        log::info!("Cached {} cities for the naive tokenizer", cities.len());
        Self {
            store,
            tokenizer: NaiveTokenizer::new(cities),
        }
    }
}

/// Records keyed by id, keeping each record's best-scoring candidate.
#[derive(Default)]
struct CandidatePool {
    candidates: BTreeMap<u64, ScoredCandidate>,
}

impl CandidatePool {
    fn merge(&mut self, batch: Vec<ScoredCandidate>) {
        for candidate in batch {
            let better = self
                .candidates
                .get(&candidate.record_id)
                .is_none_or(|existing| candidate.final_score > existing.final_score);
            if better {
                self.candidates.insert(candidate.record_id, candidate);
            }
        }
    }

    fn best(&self) -> f64 {
        self.candidates
            .values()
            .map(|c| c.final_score)
            .fold(0.0, f64::max)
    }

    fn ranked(self, limit: usize) -> Vec<ScoredCandidate> {
        let mut candidates: Vec<ScoredCandidate> = self.candidates.into_values().collect();
        ranking::rank(&mut candidates, limit);
        candidates
    }
}

/// The correction engine.
///
/// Cheap to share behind an `Arc`. Queries take a snapshot of the
/// current store; [`Self::swap_store`] replaces it without blocking
/// in-flight queries.
pub struct Corrector {
    config: CorrectorConfig,
    weights: WeightVector,
    parser: Option<Arc<dyn AddressParser>>,
    snapshot: RwLock<Arc<Snapshot>>,
    started: Instant,
}

impl Corrector {
    /// Creates an engine over `store`.
    ///
    /// Without a `parser`, every query is split by the naive tokenizer.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::Config`] if the weights are negative,
    /// non-finite, or all zero.
    pub fn new(
        store: AddressStore,
        config: CorrectorConfig,
        parser: Option<Arc<dyn AddressParser>>,
    ) -> Result<Self, MatchError> {
        config::validate(&config)?;
        let weights = config.weights.for_mode(config.mode);
        Ok(Self {
            config,
            weights,
            parser,
            snapshot: RwLock::new(Arc::new(Snapshot::new(store))),
            started: Instant::now(),
        })
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &CorrectorConfig {
        &self.config
    }

    /// Weights in effect for the configured mode.
    #[must_use]
    pub const fn weights(&self) -> &WeightVector {
        &self.weights
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replaces the store, e.g. after a rebuild.
    ///
    /// The city snapshot is rebuilt before the swap. Queries already
    /// running finish against the previous store.
    pub fn swap_store(&self, store: AddressStore) {
        let next = Arc::new(Snapshot::new(store));
        let stats = next.store.stats();
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = next;
        log::info!(
            "Swapped in address store: {} records, {} streets, {} cities",
            stats.records,
            stats.streets,
            stats.cities
        );
    }

    /// Searches with default request options.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::StoreUnavailable`] if the store fails.
    pub fn search(&self, query: &str, limit: usize) -> Result<SearchOutcome, MatchError> {
        self.search_with(query, limit, &CorrectionOptions::default())
    }

    /// Searches for up to `limit` records matching `query`.
    ///
    /// Queries shorter than two characters return an empty outcome.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::StoreUnavailable`] if the store fails.
    pub fn search_with(
        &self,
        query: &str,
        limit: usize,
        options: &CorrectionOptions,
    ) -> Result<SearchOutcome, MatchError> {
        let query = query.trim();
        if limit == 0 || query.chars().count() < MIN_QUERY_CHARS {
            return Ok(SearchOutcome::empty());
        }

        let snapshot = self.snapshot();
        let language = options.language.as_deref().unwrap_or(&self.config.language);
        let country = options.country.as_deref().unwrap_or(&self.config.country);

        let (components, parse_method) = self.parse(query, language, country, &snapshot.tokenizer);
        log::debug!("Components for '{query}' ({parse_method:?}): {components:?}");

        let mut pool = CandidatePool::default();
        let batch = self.retrieve(&snapshot.store, &components, query, limit, MatchTier::Prefix)?;
        let mut evaluated = batch.len();
        pool.merge(batch);

        let tier_a_best = pool.best();
        let escalated = tier_a_best < self.config.escalation_threshold || !components.is_usable();
        let mut variants = Vec::new();

        if escalated {
            log::info!(
                "Escalating '{query}': tier A best {tier_a_best:.3}, usable components: {}",
                components.is_usable()
            );

            let mut lookups = Vec::new();
            if let Some(road) = &components.road {
                lookups.push(road.clone());
            }
            let bare = bare_query(query);
            let words: Vec<String> = bare.split_whitespace().map(ToString::to_string).collect();
            lookups.push(bare);
            if words.len() > 1 {
                lookups.extend(
                    words
                        .into_iter()
                        .filter(|w| w.chars().count() > MIN_QUERY_CHARS)
                        .take(MAX_WORD_LOOKUPS),
                );
            }
            if !components.is_usable() && options.enable_normalization {
                variants = self.expand(query, language);
                lookups.extend(variants.iter().cloned());
            }

            for (set, tier) in self.corrected_sets(&snapshot.store, &components, &lookups)? {
                let batch = self.retrieve(&snapshot.store, &set, query, limit, tier)?;
                evaluated += batch.len();
                pool.merge(batch);
            }
        }

        let candidates = pool.ranked(limit);
        if let Some(top) = candidates.first() {
            log::debug!(
                "Top candidate for '{query}': '{}' final={:.3} similarity={:.3} component={:.3} relevance={:.3} tier={:?}",
                top.record.full_address,
                top.final_score,
                top.similarity,
                top.component_score,
                top.relevance_score,
                top.tier
            );
        }

        Ok(SearchOutcome {
            candidates,
            components,
            parse_method,
            escalated,
            tier_a_best,
            variants,
            candidates_evaluated: evaluated,
        })
    }

    fn parse(
        &self,
        query: &str,
        language: &str,
        country: &str,
        tokenizer: &NaiveTokenizer,
    ) -> (QueryComponents, ParseMethod) {
        if let Some(parser) = &self.parser
            && query.chars().count() >= self.config.parser_min_query_len
        {
            match parser.parse(query, language, country) {
                Ok(components) => return (components, ParseMethod::Parser),
                Err(e) => log::warn!("Parser failed for '{query}', using naive tokenizer: {e}"),
            }
        }
        (tokenizer.tokenize(query), ParseMethod::Naive)
    }

    fn expand(&self, query: &str, language: &str) -> Vec<String> {
        let mut variants = match &self.parser {
            Some(parser) => parser.expand(query, language).unwrap_or_else(|e| {
                log::warn!("Parser expansion failed for '{query}', using local variants: {e}");
                NaiveTokenizer::variants(query)
            }),
            None => NaiveTokenizer::variants(query),
        };
        variants.retain(|v| !v.trim().is_empty());
        variants.truncate(self.config.max_variants);
        variants
    }

    /// Retrieves and scores the records for one component set.
    fn retrieve(
        &self,
        store: &AddressStore,
        components: &QueryComponents,
        query: &str,
        limit: usize,
        tier: MatchTier,
    ) -> Result<Vec<ScoredCandidate>, MatchError> {
        let fetch = limit.saturating_mul(self.config.candidate_multiplier.max(1));

        let (hits, tier) = if self.config.mode.is_advanced() {
            let mut terms: Vec<String> =
                [&components.city, &components.road, &components.house_number]
                    .into_iter()
                    .flatten()
                    .map(String::as_str)
                    .flat_map(query::prefix_terms)
                    .collect();
            if !components.is_usable() {
                for term in query::prefix_terms(query) {
                    if term.chars().count() > MIN_QUERY_CHARS && !terms.contains(&term) {
                        terms.push(term);
                    }
                }
            }
            (store.records().prefix_search(&terms, fetch)?, tier)
        } else {
            let keys = RecordKeys {
                city: components.city.as_deref().unwrap_or(""),
                street: components.road.as_deref().unwrap_or(""),
                house_number: components.house_number.as_deref().unwrap_or(""),
            };
            let tier = if tier == MatchTier::EditDistance {
                tier
            } else {
                MatchTier::Exact
            };
            (store.records().exact(keys, fetch)?, tier)
        };

        Ok(ranking::score_batch(
            hits,
            components,
            query,
            &self.weights,
            self.config.mode,
            tier,
        ))
    }

    /// Component sets built from dictionary corrections of `lookups`.
    fn corrected_sets(
        &self,
        store: &AddressStore,
        components: &QueryComponents,
        lookups: &[String],
    ) -> Result<Vec<(QueryComponents, MatchTier)>, MatchError> {
        let mut seen_lookups = Vec::new();
        let mut streets: Vec<(usize, DictionaryMatch)> = Vec::new();
        let mut cities: Vec<(usize, DictionaryMatch)> = Vec::new();

        for lookup in lookups {
            let key = normalize::normalize_key(lookup);
            if key.is_empty() || seen_lookups.contains(&key) {
                continue;
            }
            let index = seen_lookups.len();
            seen_lookups.push(key);

            for (kind, found) in [
                (DictionaryKind::Street, &mut streets),
                (DictionaryKind::City, &mut cities),
            ] {
                let outcome = correct_name(
                    store.dictionary(kind),
                    kind,
                    lookup,
                    self.config.escalation_hits,
                    self.config.min_similarity,
                    &self.config,
                )?;
                found.extend(outcome.matches.into_iter().map(|m| (index, m)));
            }
        }

        let best_city_excluding = |lookup: usize| {
            cities
                .iter()
                .filter(|(p, _)| *p != lookup)
                .max_by(|a, b| a.1.blended.total_cmp(&b.1.blended))
                .map(|(_, m)| m.display_name.clone())
        };

        let mut sets: Vec<(QueryComponents, MatchTier)> = Vec::new();
        let mut push = |set: QueryComponents, tier: MatchTier| {
            if !sets.iter().any(|(s, _)| *s == set) {
                sets.push((set, tier));
            }
        };

        for (lookup, m) in &streets {
            let city = components.city.clone().or_else(|| best_city_excluding(*lookup));
            push(
                QueryComponents {
                    city,
                    road: Some(m.display_name.clone()),
                    house_number: components.house_number.clone(),
                },
                escalation_tier(m.tier),
            );
        }

        for (lookup, m) in &cities {
            let road = components
                .road
                .clone()
                .filter(|r| normalize::normalize_key(r) != seen_lookups[*lookup]);
            push(
                QueryComponents {
                    city: Some(m.display_name.clone()),
                    road,
                    house_number: components.house_number.clone(),
                },
                escalation_tier(m.tier),
            );
        }

        log::debug!(
            "Escalation produced {} component sets from {} lookups",
            sets.len(),
            seen_lookups.len()
        );
        Ok(sets)
    }

    /// Handles a transport request.
    ///
    /// Never fails: invalid input and store failures are reported
    /// through the response status.
    #[must_use]
    pub fn handle(&self, request: &CorrectionRequest) -> CorrectionResponse {
        let start = Instant::now();
        let original = request.original_address.trim().to_string();

        if let Err(e) = validate_request(request) {
            log::debug!("Rejected request: {e}");
            return CorrectionResponse {
                status: StatusCode::InvalidRequest,
                message: "Original address is empty".to_string(),
                details: None,
                original_address: String::new(),
                corrected_address: String::new(),
                suggestions: Vec::new(),
                was_corrected: false,
                execution_time_ms: elapsed_ms(start),
                variants_checked: 0,
            };
        }

        let max_suggestions = usize::try_from(request.max_suggestions)
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_SUGGESTIONS);
        let min_similarity = if request.min_similarity > 0.0 {
            request.min_similarity
        } else {
            DEFAULT_MIN_SIMILARITY
        };

        let outcome = match self.search_with(&original, max_suggestions, &request.options) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Correction of '{original}' failed: {e}");
                return CorrectionResponse {
                    status: StatusCode::InternalError,
                    message: "Internal error".to_string(),
                    details: Some(e.to_string()),
                    corrected_address: original.clone(),
                    original_address: original,
                    suggestions: Vec::new(),
                    was_corrected: false,
                    execution_time_ms: elapsed_ms(start),
                    variants_checked: 0,
                };
            }
        };

        let suggestions: Vec<Suggestion> = outcome
            .candidates
            .iter()
            .filter(|c| c.final_score >= min_similarity)
            .map(to_suggestion)
            .filter(|s| {
                !request.options.strict_mode
                    || matches!(
                        s.source,
                        CorrectionSource::ExactMatch | CorrectionSource::FuzzyMatch
                    )
            })
            .collect();

        let corrected_address = suggestions.first().map_or_else(
            || {
                outcome
                    .variants
                    .first()
                    .cloned()
                    .unwrap_or_else(|| original.clone())
            },
            |s| s.corrected_address.clone(),
        );
        let was_corrected = corrected_address.to_lowercase() != original.to_lowercase();
        let variants_checked = (outcome.variants.len() + outcome.candidates_evaluated) as u64;
        let execution_time_ms = elapsed_ms(start);

        log::info!(
            "Correct '{original}' -> '{corrected_address}' ({} suggestions, {execution_time_ms}ms)",
            suggestions.len()
        );

        CorrectionResponse {
            status: StatusCode::Ok,
            message: "OK".to_string(),
            details: None,
            original_address: original,
            corrected_address,
            suggestions,
            was_corrected,
            execution_time_ms,
            variants_checked,
        }
    }

    /// Async wrapper around [`Self::handle`], dispatched to a blocking
    /// thread.
    pub async fn handle_async(self: &Arc<Self>, request: CorrectionRequest) -> CorrectionResponse {
        let corrector = Arc::clone(self);
        let original = request.original_address.trim().to_string();

        match tokio::task::spawn_blocking(move || corrector.handle(&request)).await {
            Ok(response) => response,
            Err(e) => {
                let e = MatchError::from(e);
                log::error!("Correction task for '{original}' failed: {e}");
                CorrectionResponse {
                    status: StatusCode::InternalError,
                    message: "Internal error".to_string(),
                    details: Some(e.to_string()),
                    corrected_address: original.clone(),
                    original_address: original,
                    suggestions: Vec::new(),
                    was_corrected: false,
                    execution_time_ms: 0,
                    variants_checked: 0,
                }
            }
        }
    }

    /// Corrects a bare street name.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::StoreUnavailable`] if the store fails.
    pub fn correct_street(
        &self,
        query: &str,
        limit: usize,
        min_similarity: f64,
    ) -> Result<dictionary::NameOutcome, MatchError> {
        self.correct(DictionaryKind::Street, query, limit, min_similarity)
    }

    /// Corrects a bare city name.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::StoreUnavailable`] if the store fails.
    pub fn correct_city(
        &self,
        query: &str,
        limit: usize,
        min_similarity: f64,
    ) -> Result<dictionary::NameOutcome, MatchError> {
        self.correct(DictionaryKind::City, query, limit, min_similarity)
    }

    fn correct(
        &self,
        kind: DictionaryKind,
        query: &str,
        limit: usize,
        min_similarity: f64,
    ) -> Result<dictionary::NameOutcome, MatchError> {
        let snapshot = self.snapshot();
        Ok(correct_name(
            snapshot.store.dictionary(kind),
            kind,
            query,
            limit,
            min_similarity,
            &self.config,
        )?)
    }

    /// Corrects the city and road of `components` independently and
    /// joins the result as `"city, road, house"`.
    ///
    /// A part is replaced only when its best dictionary match is not an
    /// exact one. Returns the corrected address and whether anything
    /// changed; `address` is returned when no component is present.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::StoreUnavailable`] if the store fails.
    pub fn correct_components(
        &self,
        address: &str,
        components: &QueryComponents,
    ) -> Result<(String, bool), MatchError> {
        let min_similarity = self.config.address_min_similarity;
        let mut parts = Vec::new();
        let mut was_corrected = false;

        for (kind, value) in [
            (DictionaryKind::City, &components.city),
            (DictionaryKind::Street, &components.road),
        ] {
            let Some(value) = value else {
                continue;
            };
            let outcome = self.correct(kind, value, 1, min_similarity)?;
            match outcome.matches.first() {
                Some(best) if best.similarity < 1.0 => {
                    log::info!(
                        "{} corrected: '{value}' -> '{}' (similarity: {:.2})",
                        kind.as_str(),
                        best.display_name,
                        best.similarity
                    );
                    parts.push(best.display_name.clone());
                    was_corrected = true;
                }
                _ => parts.push(value.clone()),
            }
        }

        if let Some(house) = &components.house_number {
            parts.push(house.clone());
        }

        if parts.is_empty() {
            return Ok((address.to_string(), false));
        }
        Ok((parts.join(", "), was_corrected))
    }

    /// Parses an address the way [`Self::search`] would.
    #[must_use]
    pub fn parse_components(&self, address: &str) -> (QueryComponents, ParseMethod) {
        let snapshot = self.snapshot();
        self.parse(
            address.trim(),
            &self.config.language,
            &self.config.country,
            &snapshot.tokenizer,
        )
    }

    /// Store connectivity and counts.
    ///
    /// An empty store is reported as degraded.
    #[must_use]
    pub fn health(&self) -> HealthReport {
        let stats = self.snapshot().store.stats();
        let status = if stats.records > 0 {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        HealthReport {
            status,
            connected: true,
            records: stats.records,
            streets: stats.streets,
            cities: stats.cities,
            uptime_seconds: self.started.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Rejects requests with an empty address.
fn validate_request(request: &CorrectionRequest) -> Result<(), MatchError> {
    if request.original_address.trim().is_empty() {
        return Err(MatchError::InvalidInput(
            "original address is empty".to_string(),
        ));
    }
    Ok(())
}

/// Dictionary-corrected sets keep the edit-distance tier; anything else
/// retrieved during escalation counts as a prefix match.
const fn escalation_tier(tier: MatchTier) -> MatchTier {
    match tier {
        MatchTier::EditDistance => MatchTier::EditDistance,
        MatchTier::Exact | MatchTier::Prefix => MatchTier::Prefix,
    }
}

/// The query without house numbers, administrative words, or filler
/// words; the sanitized query when nothing else is left.
fn bare_query(query: &str) -> String {
    let words: Vec<String> = normalize::tokenize(query)
        .into_iter()
        .filter(|t| {
            !normalize::is_house_number(t)
                && !synonyms::is_admin_token(t)
                && !synonyms::is_filler_word(t)
        })
        .collect();

    if words.is_empty() {
        normalize::normalize_key(&normalize::sanitize_query(query))
    } else {
        words.join(" ")
    }
}

fn to_suggestion(candidate: &ScoredCandidate) -> Suggestion {
    Suggestion {
        corrected_address: candidate.record.full_address.clone(),
        similarity_score: candidate.final_score,
        components: QueryComponents::from_record(&candidate.record),
        coordinates: Coordinates {
            lat: candidate.record.latitude,
            lon: candidate.record.longitude,
        },
        tags: candidate.record.tags.clone(),
        source: CorrectionSource::from_score(candidate.final_score),
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserError;
    use address_match_index::BuildConfig;
    use address_match_models::{AddressRecord, RankingMode};

    fn record(city: &str, street: &str, house: &str, lat: f64, lon: f64) -> AddressRecord {
        AddressRecord {
            city: Some(city.to_string()),
            street: Some(street.to_string()),
            house_number: Some(house.to_string()),
            latitude: lat,
            longitude: lon,
            full_address: AddressRecord::compose_full_address(Some(city), Some(street), Some(house)),
            tags: [("building".to_string(), "yes".to_string())].into(),
        }
    }

    fn fixture() -> Vec<AddressRecord> {
        vec![
            record("Moscow", "Arbat Street", "10", 55.7520, 37.5930),
            record("Moscow", "Arbat Street", "12", 55.7515, 37.5920),
            record("Moscow", "Arbat Street", "100", 55.7490, 37.5850),
            record("Moscow", "Tverskaya Street", "7", 55.7610, 37.6090),
            record("Moscow", "Tverskaya Street", "9", 55.7620, 37.6080),
            record("Moscow", "Novy Arbat Avenue", "15", 55.7530, 37.5900),
            record("Moscow", "Lenin Avenue", "3", 55.7100, 37.5900),
            record("Saint Petersburg", "Nevsky Avenue", "28", 59.9350, 30.3250),
            record("Kazan", "Bauman Street", "5", 55.7890, 49.1220),
        ]
    }

    fn store(records: &[AddressRecord]) -> AddressStore {
        AddressStore::build_in_ram(
            records,
            &BuildConfig {
                writer_heap_bytes: 15_000_000,
            },
        )
        .unwrap()
    }

    fn corrector() -> Corrector {
        Corrector::new(store(&fixture()), CorrectorConfig::default(), None).unwrap()
    }

    struct FailingParser;

    impl AddressParser for FailingParser {
        fn parse(&self, _: &str, _: &str, _: &str) -> Result<QueryComponents, ParserError> {
            Err(ParserError::Unavailable("connection refused".to_string()))
        }

        fn expand(&self, _: &str, _: &str) -> Result<Vec<String>, ParserError> {
            Err(ParserError::Unavailable("connection refused".to_string()))
        }
    }

    struct EmptyParser;

    impl AddressParser for EmptyParser {
        fn parse(&self, _: &str, _: &str, _: &str) -> Result<QueryComponents, ParserError> {
            Ok(QueryComponents::default())
        }

        fn expand(&self, _: &str, _: &str) -> Result<Vec<String>, ParserError> {
            Ok(vec![
                "tverskaya street".to_string(),
                "tverskaya".to_string(),
                "tverskaya st".to_string(),
                "tverskaya str".to_string(),
            ])
        }
    }

    #[test]
    fn exact_address_scores_near_one() {
        let outcome = corrector().search("Moscow, Arbat street, 10", 5).unwrap();
        let top = &outcome.candidates[0];

        assert_eq!(top.record.full_address, "Moscow, Arbat Street, 10");
        assert!(top.final_score >= 0.95);
        assert_eq!(top.tier, MatchTier::Exact);
        assert!(!outcome.escalated);
        assert_eq!(outcome.components.city.as_deref(), Some("Moscow"));
        assert_eq!(outcome.components.road.as_deref(), Some("arbat"));
        assert_eq!(outcome.components.house_number.as_deref(), Some("10"));
    }

    #[test]
    fn typo_escalates_to_canonical_street() {
        let outcome = corrector().search("orbat 10", 5).unwrap();
        let top = &outcome.candidates[0];

        assert!(outcome.escalated);
        assert!(outcome.tier_a_best < 0.28);
        assert_eq!(top.record.full_address, "Moscow, Arbat Street, 10");
        assert!(top.final_score >= 0.65);
        assert_eq!(top.tier, MatchTier::EditDistance);
    }

    #[test]
    fn name_only_query_still_ranks_high() {
        let outcome = corrector().search("Arbat", 5).unwrap();
        let top = &outcome.candidates[0];

        assert_eq!(top.record.street.as_deref(), Some("Arbat Street"));
        assert!(top.final_score >= 0.70);
        assert!((top.component_score - 1.0).abs() < 1e-9);
        assert!(outcome.components.house_number.is_none());
    }

    #[test]
    fn record_without_house_number_gets_penalized_grade() {
        // Number only present in the full address, as in extracts with an
        // empty house column.
        let mut lot = record("Moscow", "Arbat Street", "10", 55.7520, 37.5930);
        lot.house_number = None;
        let corrector = Corrector::new(store(&[lot]), CorrectorConfig::default(), None).unwrap();

        let outcome = corrector.search("Arbat 10", 5).unwrap();
        let top = &outcome.candidates[0];

        assert_eq!(outcome.components.house_number.as_deref(), Some("10"));
        assert!(top.record.house_number.is_none());
        assert!(
            (top.component_score - (1.0 + ranking::HOUSE_MISSING_PENALTY) / 2.0).abs() < 1e-9
        );
        assert!(top.final_score < 0.95);
    }

    #[test]
    fn unparsed_query_is_searched_as_text_before_escalating() {
        let corrector = Corrector::new(
            store(&fixture()),
            CorrectorConfig::default(),
            Some(Arc::new(EmptyParser)),
        )
        .unwrap();
        let outcome = corrector.search("tverskaya tverskaya ulitsa", 5).unwrap();

        assert!(outcome.components.is_empty());
        assert!(outcome.tier_a_best > 0.0);
        assert!(outcome.candidates_evaluated >= 2);
    }

    #[test]
    fn rejects_invalid_weights() {
        for weights in [
            WeightVector::new(f64::NAN, 0.6, 0.15),
            WeightVector::new(-0.25, 0.6, 0.15),
            WeightVector::new(0.0, 0.0, 0.0),
        ] {
            let config = CorrectorConfig {
                weights,
                ..CorrectorConfig::default()
            };
            assert!(matches!(
                Corrector::new(store(&fixture()), config, None),
                Err(MatchError::Config(_))
            ));
        }
    }

    #[test]
    fn unknown_street_returns_nothing_confident() {
        let outcome = corrector().search("Zzyzx Road", 5).unwrap();
        assert!(outcome.escalated);
        assert!(outcome.candidates.iter().all(|c| c.similarity < 0.5));
    }

    #[test]
    fn short_queries_return_empty() {
        let corrector = corrector();
        assert!(corrector.search("", 5).unwrap().candidates.is_empty());
        assert!(corrector.search("a", 5).unwrap().candidates.is_empty());
        assert!(corrector.search("Arbat", 0).unwrap().candidates.is_empty());
    }

    #[test]
    fn reserved_characters_are_harmless() {
        let outcome = corrector().search("\"Arbat\" (*10*)", 5).unwrap();
        assert_eq!(
            outcome.candidates[0].record.full_address,
            "Moscow, Arbat Street, 10"
        );
        assert!(corrector().search("\"*()\"", 5).unwrap().candidates.is_empty());
    }

    #[test]
    fn misspelled_city_and_street_are_both_corrected() {
        let outcome = corrector().search("Moskow Orbat 10", 5).unwrap();
        assert!(outcome.escalated);
        assert_eq!(
            outcome.candidates[0].record.full_address,
            "Moscow, Arbat Street, 10"
        );
    }

    #[test]
    fn results_are_bounded_and_sorted() {
        let outcome = corrector().search("Moscow", 3).unwrap();
        assert!(outcome.candidates.len() <= 3);
        for pair in outcome.candidates.windows(2) {
            assert!(pair[0].final_score >= pair[1].final_score);
        }
    }

    #[test]
    fn parser_failure_falls_back_to_naive_tokenizer() {
        let corrector = Corrector::new(
            store(&fixture()),
            CorrectorConfig::default(),
            Some(Arc::new(FailingParser)),
        )
        .unwrap();
        let outcome = corrector.search("Moscow, Arbat street, 10", 5).unwrap();
        assert_eq!(outcome.parse_method, ParseMethod::Naive);
        assert!(outcome.candidates[0].final_score >= 0.95);
    }

    #[test]
    fn short_queries_skip_the_parser() {
        let corrector = Corrector::new(
            store(&fixture()),
            CorrectorConfig::default(),
            Some(Arc::new(EmptyParser)),
        )
        .unwrap();
        let (_, method) = corrector.parse_components("10");
        assert_eq!(method, ParseMethod::Naive);
        let (_, method) = corrector.parse_components("Arbat");
        assert_eq!(method, ParseMethod::Parser);
    }

    #[test]
    fn unusable_components_try_variants() {
        let corrector = Corrector::new(
            store(&fixture()),
            CorrectorConfig::default(),
            Some(Arc::new(EmptyParser)),
        )
        .unwrap();
        let outcome = corrector.search("tverskaya ulitsa", 5).unwrap();

        assert_eq!(outcome.parse_method, ParseMethod::Parser);
        assert!(outcome.escalated);
        assert_eq!(outcome.variants.len(), 3);
        assert_eq!(
            outcome.candidates[0].record.street.as_deref(),
            Some("Tverskaya Street")
        );
    }

    #[test]
    fn basic_mode_uses_exact_keys() {
        let config = CorrectorConfig {
            mode: RankingMode::Basic,
            ..CorrectorConfig::default()
        };
        let corrector = Corrector::new(store(&fixture()), config, None).unwrap();
        let outcome = corrector.search("Moscow, Arbat street, 10", 5).unwrap();
        let top = &outcome.candidates[0];

        assert_eq!(top.record.full_address, "Moscow, Arbat Street, 10");
        assert!((top.final_score - 1.0).abs() < 1e-9);
        assert!(top.similarity.abs() < f64::EPSILON);
        assert!(top.relevance_score.abs() < f64::EPSILON);
    }

    #[test]
    fn swap_store_replaces_records_and_cities() {
        let corrector = corrector();
        let kazan: Vec<AddressRecord> = fixture()
            .into_iter()
            .filter(|r| r.city.as_deref() == Some("Kazan"))
            .collect();
        corrector.swap_store(store(&kazan));

        assert!(corrector
            .search("Moscow, Arbat street, 10", 5)
            .unwrap()
            .candidates
            .iter()
            .all(|c| c.record.city.as_deref() == Some("Kazan")));

        let (components, _) = corrector.parse_components("Kazan Bauman 5");
        assert_eq!(components.city.as_deref(), Some("Kazan"));
        assert_eq!(corrector.health().records, 1);
    }

    #[test]
    fn handle_rejects_empty_input() {
        let response = corrector().handle(&CorrectionRequest::new("   "));
        assert_eq!(response.status, StatusCode::InvalidRequest);
        assert!(response.suggestions.is_empty());
        assert!(!response.was_corrected);
    }

    #[test]
    fn handle_builds_suggestions() {
        let response = corrector().handle(&CorrectionRequest::new("moscow arbat 10"));

        assert_eq!(response.status, StatusCode::Ok);
        assert!(!response.suggestions.is_empty());
        assert!(response.suggestions.len() <= DEFAULT_MAX_SUGGESTIONS);
        assert_eq!(response.corrected_address, "Moscow, Arbat Street, 10");
        assert!(response.was_corrected);
        assert!(response.variants_checked > 0);

        let best = &response.suggestions[0];
        assert_eq!(best.source, CorrectionSource::ExactMatch);
        assert_eq!(best.components.road.as_deref(), Some("Arbat Street"));
        assert!((best.coordinates.lat - 55.7520).abs() < 1e-9);
        assert_eq!(best.tags.get("building").map(String::as_str), Some("yes"));
        assert!(response.suggestions.iter().all(|s| s.similarity_score >= 0.5));
    }

    #[test]
    fn handle_applies_min_similarity_and_strict_mode() {
        let corrector = corrector();

        let mut request = CorrectionRequest::new("orbat 10");
        request.min_similarity = 0.9;
        let response = corrector.handle(&request);
        assert!(response.suggestions.is_empty());
        assert_eq!(response.corrected_address, "orbat 10");
        assert!(!response.was_corrected);

        let mut request = CorrectionRequest::new("Arbat");
        request.options.strict_mode = true;
        let response = corrector.handle(&request);
        assert!(response.suggestions.iter().all(|s| matches!(
            s.source,
            CorrectionSource::ExactMatch | CorrectionSource::FuzzyMatch
        )));
    }

    #[test]
    fn handle_respects_max_suggestions() {
        let mut request = CorrectionRequest::new("Moscow");
        request.max_suggestions = 2;
        request.min_similarity = 0.01;
        let response = corrector().handle(&request);
        assert!(response.suggestions.len() <= 2);
    }

    #[tokio::test]
    async fn handle_async_matches_sync() {
        let corrector = Arc::new(corrector());
        let response = corrector
            .handle_async(CorrectionRequest::new("Moscow, Arbat street, 10"))
            .await;
        assert_eq!(response.status, StatusCode::Ok);
        assert_eq!(response.corrected_address, "Moscow, Arbat Street, 10");
    }

    #[test]
    fn corrects_components_independently() {
        let corrector = corrector();
        let components = QueryComponents::new(Some("Moskow"), Some("Orbat"), Some("10"));
        let (address, corrected) = corrector
            .correct_components("Moskow Orbat 10", &components)
            .unwrap();
        assert_eq!(address, "Moscow, Arbat Street, 10");
        assert!(corrected);

        let components = QueryComponents::new(Some("Moscow"), Some("Arbat Street"), None);
        let (address, corrected) = corrector
            .correct_components("Moscow Arbat Street", &components)
            .unwrap();
        assert_eq!(address, "Moscow, Arbat Street");
        assert!(!corrected);

        let (address, corrected) = corrector
            .correct_components("???", &QueryComponents::default())
            .unwrap();
        assert_eq!(address, "???");
        assert!(!corrected);
    }

    #[test]
    fn corrects_bare_names() {
        let corrector = corrector();
        let streets = corrector.correct_street("tverskya", 3, 0.6).unwrap();
        assert_eq!(streets.matches[0].display_name, "Tverskaya Street");

        let cities = corrector.correct_city("Kazn", 3, 0.6).unwrap();
        assert_eq!(cities.matches[0].display_name, "Kazan");
    }

    #[test]
    fn health_reports_counts() {
        let health = corrector().health();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert!(health.connected);
        assert_eq!(health.records, 9);
        assert_eq!(health.streets, 6);
        assert_eq!(health.cities, 3);

        let empty = Corrector::new(store(&[]), CorrectorConfig::default(), None).unwrap();
        assert_eq!(empty.health().status, HealthStatus::Degraded);
    }

    #[test]
    fn bare_query_strips_numbers_and_admin_words() {
        assert_eq!(bare_query("ул. Арбат, д. 10"), "арбат");
        assert_eq!(bare_query("10"), "10");
    }
}
