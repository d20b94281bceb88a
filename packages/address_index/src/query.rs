//! Query construction for store lookups.
//!
//! Two query shapes are built here:
//!
//! 1. **Exact**: `TermQuery` conjunctions over the lowercase key fields.
//! 2. **Prefix**: every proper-name token must prefix-match some indexed
//!    token. An exact token hit is boosted on top of the constant prefix
//!    score so whole-word matches rank above partial ones, and BM25 on
//!    the exact term orders documents within each group.
//!
//! Queries are assembled programmatically from sanitized tokens, so no
//! user input is ever interpreted as query syntax.

use tantivy::Term;
use tantivy::query::{BooleanQuery, BoostQuery, FuzzyTermQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};

use crate::normalize;
use crate::synonyms;

/// Boost applied to a whole-token match relative to a bare prefix match.
pub const EXACT_TERM_BOOST: f32 = 2.0;

/// Extracts prefix search terms from free text.
///
/// Sanitizes the text, splits it into lowercase tokens, and drops
/// administrative tokens so `"Arbat St"` matches an indexed
/// `"Arbat Street"`. If every token is administrative they are kept,
/// since an empty query would match nothing useful.
#[must_use]
pub fn prefix_terms(text: &str) -> Vec<String> {
    let tokens = normalize::tokenize(&normalize::sanitize_query(text));
    let proper: Vec<String> = tokens
        .iter()
        .filter(|t| !synonyms::is_admin_token(t))
        .cloned()
        .collect();
    if proper.is_empty() { tokens } else { proper }
}

/// Builds a prefix query requiring every term to prefix-match a token
/// in `field`.
///
/// Returns `None` when `terms` is empty.
#[must_use]
pub fn build_prefix_query(field: Field, terms: &[String]) -> Option<Box<dyn Query>> {
    if terms.is_empty() {
        return None;
    }

    let clauses: Vec<(Occur, Box<dyn Query>)> = terms
        .iter()
        .map(|token| {
            let term = Term::from_field_text(field, token);
            let exact: Box<dyn Query> = Box::new(BoostQuery::new(
                Box::new(TermQuery::new(term.clone(), IndexRecordOption::WithFreqs)),
                EXACT_TERM_BOOST,
            ));
            let prefix: Box<dyn Query> = Box::new(FuzzyTermQuery::new_prefix(term, 0, true));
            let either: Box<dyn Query> = Box::new(BooleanQuery::new(vec![
                (Occur::Should, exact),
                (Occur::Should, prefix),
            ]));
            (Occur::Must, either)
        })
        .collect();

    Some(Box::new(BooleanQuery::new(clauses)))
}

/// Builds an exact-match query on a single `STRING` key field.
#[must_use]
pub fn build_key_query(field: Field, key: &str) -> Box<dyn Query> {
    Box::new(TermQuery::new(
        Term::from_field_text(field, key),
        IndexRecordOption::Basic,
    ))
}

/// Builds a conjunction of exact key matches, skipping empty keys.
///
/// Returns `None` when every key is empty.
#[must_use]
pub fn build_exact_query(keys: &[(Field, &str)]) -> Option<Box<dyn Query>> {
    let clauses: Vec<(Occur, Box<dyn Query>)> = keys
        .iter()
        .filter(|(_, key)| !key.is_empty())
        .map(|(field, key)| (Occur::Must, build_key_query(*field, key)))
        .collect();

    if clauses.is_empty() {
        return None;
    }

    Some(Box::new(BooleanQuery::new(clauses)))
}
