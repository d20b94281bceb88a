//! Address parser collaborator and the local naive tokenizer.
//!
//! An external parser (a statistical address parser running as a
//! service, for example) plugs in through [`AddressParser`]. Its
//! failures are never fatal: the orchestrator falls back to
//! [`NaiveTokenizer`], which classifies tokens against an immutable
//! snapshot of known city names.

use std::collections::BTreeMap;

use address_match_index::dictionary::DictionaryIndex;
use address_match_index::{normalize, synonyms};
use address_match_models::QueryComponents;

/// Errors from a parser collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    /// The parser could not be reached.
    #[error("Parser unavailable: {0}")]
    Unavailable(String),

    /// The parser refused or failed to parse the input.
    #[error("Parser rejected input: {0}")]
    Rejected(String),
}

/// Splits addresses into components and produces normalized variants.
pub trait AddressParser: Send + Sync {
    /// Parses an address into components. Partial results are allowed.
    ///
    /// # Errors
    ///
    /// Returns an error if the parser is unreachable or rejects the
    /// input.
    fn parse(
        &self,
        address: &str,
        language: &str,
        country: &str,
    ) -> Result<QueryComponents, ParserError>;

    /// Normalized textual variants of an address, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if the parser is unreachable or rejects the
    /// input.
    fn expand(&self, address: &str, language: &str) -> Result<Vec<String>, ParserError>;
}

/// Known city names keyed by normalized name.
///
/// Built once from the city dictionary and replaced only when the store
/// is rebuilt.
#[derive(Debug, Clone, Default)]
pub struct CitySnapshot {
    cities: BTreeMap<String, String>,
}

impl CitySnapshot {
    /// Snapshots every entry of a city dictionary.
    #[must_use]
    pub fn from_dictionary(dictionary: &DictionaryIndex) -> Self {
        Self::from_names(dictionary.by_usage().iter().map(|e| e.display_name.as_str()))
    }

    /// Snapshots the given display names.
    #[must_use]
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let cities = names
            .into_iter()
            .filter_map(|name| {
                let key = normalize::normalize_key(name);
                (!key.is_empty()).then(|| (key, name.trim().to_string()))
            })
            .collect();
        Self { cities }
    }

    /// Display name of a known city.
    #[must_use]
    pub fn get(&self, normalized: &str) -> Option<&str> {
        self.cities.get(normalized).map(String::as_str)
    }

    /// Number of cities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cities.len()
    }

    /// Returns `true` if no city is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

/// Rule-based fallback parser.
///
/// Lowercases and splits on whitespace and `, ; :`, then classifies
/// each token: known one- or two-word city names become the city,
/// digit-leading tokens the house number (the last one wins), and what
/// remains after dropping administrative and filler words the road.
/// Other tokens shorter than two characters are ignored.
#[derive(Debug, Clone, Default)]
pub struct NaiveTokenizer {
    cities: CitySnapshot,
}

impl NaiveTokenizer {
    /// Creates a tokenizer over a city snapshot.
    #[must_use]
    pub const fn new(cities: CitySnapshot) -> Self {
        Self { cities }
    }

    /// The city snapshot.
    #[must_use]
    pub const fn cities(&self) -> &CitySnapshot {
        &self.cities
    }

    /// Splits an address into components.
    #[must_use]
    pub fn tokenize(&self, address: &str) -> QueryComponents {
        let lowered = address.to_lowercase();
        let parts: Vec<&str> = lowered
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':'))
            .map(|p| p.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|p| !p.is_empty())
            .collect();

        let mut city = None;
        let mut house = None;
        let mut road_parts = Vec::new();

        let mut i = 0;
        while i < parts.len() {
            let part = parts[i];

            if let Some(next) = parts.get(i + 1)
                && let Some(name) = self.cities.get(&format!("{part} {next}"))
            {
                city = Some(name);
                i += 2;
                continue;
            }
            i += 1;

            if let Some(name) = self.cities.get(part) {
                city = Some(name);
            } else if normalize::is_house_number(part) {
                house = Some(part);
            } else if part.chars().count() >= 2
                && !synonyms::is_admin_token(part)
                && !synonyms::is_filler_word(part)
            {
                road_parts.push(part);
            }
        }

        let road = road_parts.join(" ");
        QueryComponents::new(city, Some(road.as_str()), house)
    }

    /// Local variants of an address: the abbreviation-expanded form and
    /// the sanitized form, deduplicated, non-empty.
    #[must_use]
    pub fn variants(address: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for variant in [
            normalize::expand_abbreviations(address),
            normalize::normalize_key(&normalize::sanitize_query(address)),
        ] {
            if !variant.is_empty() && !out.contains(&variant) {
                out.push(variant);
            }
        }
        out
    }
}

impl AddressParser for NaiveTokenizer {
    fn parse(
        &self,
        address: &str,
        _language: &str,
        _country: &str,
    ) -> Result<QueryComponents, ParserError> {
        Ok(self.tokenize(address))
    }

    fn expand(&self, address: &str, _language: &str) -> Result<Vec<String>, ParserError> {
        Ok(Self::variants(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> NaiveTokenizer {
        NaiveTokenizer::new(CitySnapshot::from_names([
            "Moscow",
            "Saint Petersburg",
            "Москва",
        ]))
    }

    #[test]
    fn splits_city_road_and_house() {
        let c = tokenizer().tokenize("Moscow, Arbat street, 10");
        assert_eq!(c.city.as_deref(), Some("Moscow"));
        assert_eq!(c.road.as_deref(), Some("arbat"));
        assert_eq!(c.house_number.as_deref(), Some("10"));
    }

    #[test]
    fn recognises_two_word_cities() {
        let c = tokenizer().tokenize("saint petersburg nevsky 28");
        assert_eq!(c.city.as_deref(), Some("Saint Petersburg"));
        assert_eq!(c.road.as_deref(), Some("nevsky"));
    }

    #[test]
    fn drops_admin_and_filler_words() {
        let c = tokenizer().tokenize("адрес: г. Москва, ул. Тверская, д. 7");
        assert_eq!(c.city.as_deref(), Some("Москва"));
        assert_eq!(c.road.as_deref(), Some("тверская"));
        assert_eq!(c.house_number.as_deref(), Some("7"));
    }

    #[test]
    fn keeps_compound_house_numbers() {
        let c = tokenizer().tokenize("Arbat 10/2");
        assert_eq!(c.house_number.as_deref(), Some("10/2"));
        let c = tokenizer().tokenize("Arbat 10 12к1");
        assert_eq!(c.house_number.as_deref(), Some("12к1"));
    }

    #[test]
    fn road_only_and_empty_inputs() {
        let c = tokenizer().tokenize("orbat");
        assert_eq!(c.road.as_deref(), Some("orbat"));
        assert!(c.city.is_none());

        let c = tokenizer().tokenize(" , ; ");
        assert!(c.is_empty());
    }

    #[test]
    fn expands_local_variants() {
        let variants = NaiveTokenizer::variants("Arbat St., 10");
        assert_eq!(variants, ["arbat street 10", "arbat st 10"]);
        assert!(NaiveTokenizer::variants("...").is_empty());
    }

    #[test]
    fn parser_trait_delegates_to_tokenizer() {
        let parser: &dyn AddressParser = &tokenizer();
        let c = parser.parse("Moscow Arbat 10", "ru", "RU").unwrap();
        assert_eq!(c.city.as_deref(), Some("Moscow"));
        assert!(!parser.expand("Arbat", "ru").unwrap().is_empty());
    }
}
