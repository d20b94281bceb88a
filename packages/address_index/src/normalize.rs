//! Address normalization.
//!
//! Provides the deterministic normalization pipeline applied
//! symmetrically at index time and query time:
//!
//! - [`normalize_key`]: lowercase + whitespace collapse, the dictionary key
//! - [`sanitize_query`]: strips characters that are meaningful to query
//!   syntaxes so user input can never produce a malformed query
//! - [`comparison_form`]: lowercase, punctuation stripped, administrative
//!   tokens removed, tokens sorted; used for edit-distance comparison

use regex::Regex;
use std::sync::LazyLock;

use crate::synonyms;

pub use address_match_index_models::normalize_name as normalize_key;

/// Characters reserved by prefix-index query syntaxes (quotes, grouping,
/// wildcards, operators) and general punctuation.
static RESERVED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["*()\-+/^\\\[\]{}|<>.:;,!?@#$%&=~`']+"#).expect("valid regex")
});

/// Regex to collapse runs of whitespace into a single space.
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Splits text into lowercase alphanumeric tokens.
///
/// Any non-alphanumeric character is a separator, which matches the
/// index tokenizer registered in [`crate::schema::register_tokenizers`].
#[must_use]
pub fn tokenize(input: &str) -> Vec<String> {
    input
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Removes reserved query characters and collapses whitespace.
///
/// Returns an empty string if nothing but reserved characters remain.
#[must_use]
pub fn sanitize_query(input: &str) -> String {
    let stripped = RESERVED_RE.replace_all(input, " ");
    WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

/// Tokens of `input` with administrative tokens removed, in input order.
#[must_use]
pub fn proper_name_tokens(input: &str) -> Vec<String> {
    tokenize(input)
        .into_iter()
        .filter(|t| !synonyms::is_admin_token(t))
        .collect()
}

/// Normalizes an address or name for edit-distance comparison.
///
/// The pipeline:
/// 1. Lowercase
/// 2. Split on punctuation and whitespace
/// 3. Drop administrative tokens (street, avenue, building, ...)
/// 4. Sort the remaining tokens
///
/// Idempotent, and independent of token order.
#[must_use]
pub fn comparison_form(input: &str) -> String {
    let mut tokens = proper_name_tokens(input);
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Expands abbreviations token by token (`"ул арбат"` → `"улица арбат"`).
#[must_use]
pub fn expand_abbreviations(input: &str) -> String {
    tokenize(input)
        .iter()
        .map(|t| synonyms::expand_token(t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns `true` for tokens that look like house numbers (`"10"`,
/// `"10а"`, `"12к1"`).
#[must_use]
pub fn is_house_number(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Builds the composite text that the record prefix index searches.
#[must_use]
pub fn build_search_text(
    city: &str,
    street: &str,
    house_number: &str,
    full_address: &str,
) -> String {
    [city, street, house_number, full_address]
        .iter()
        .copied()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_reserved_characters() {
        assert_eq!(sanitize_query("\"arbat\"* (st.)"), "arbat st");
        assert_eq!(sanitize_query("a-b+c/d"), "a b c d");
    }

    #[test]
    fn sanitizes_to_empty() {
        assert_eq!(sanitize_query("\"*()\""), "");
        assert_eq!(sanitize_query("   "), "");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(sanitize_query("  arbat \t  street  "), "arbat street");
    }

    #[test]
    fn tokenizes_on_punctuation() {
        assert_eq!(tokenize("Moscow, Arbat st., 10"), ["moscow", "arbat", "st", "10"]);
        assert_eq!(tokenize("Алма-Атинская"), ["алма", "атинская"]);
    }

    #[test]
    fn comparison_form_strips_admin_tokens() {
        assert_eq!(comparison_form("Moscow, Arbat Street, 10"), "10 arbat moscow");
        assert_eq!(comparison_form("г. Москва, ул. Арбат, д. 10"), "10 арбат москва");
    }

    #[test]
    fn comparison_form_is_order_invariant() {
        assert_eq!(
            comparison_form("avenue Lenina street"),
            comparison_form("street avenue Lenina")
        );
        assert_eq!(comparison_form("Arbat 10 Moscow"), comparison_form("Moscow Arbat 10"));
    }

    #[test]
    fn comparison_form_is_idempotent() {
        for input in ["Moscow, Arbat Street, 10", "ул. Тверская, д. 7", "Lenin Ave 3"] {
            let once = comparison_form(input);
            assert_eq!(comparison_form(&once), once);
        }
    }

    #[test]
    fn normalize_key_is_idempotent() {
        let once = normalize_key("  Arbat   STREET ");
        assert_eq!(once, "arbat street");
        assert_eq!(normalize_key(&once), once);
    }

    #[test]
    fn expands_abbreviations() {
        assert_eq!(expand_abbreviations("Arbat St."), "arbat street");
        assert_eq!(expand_abbreviations("ул. Арбат"), "улица арбат");
    }

    #[test]
    fn detects_house_numbers() {
        assert!(is_house_number("10"));
        assert!(is_house_number("10а"));
        assert!(!is_house_number("arbat"));
        assert!(!is_house_number(""));
    }

    #[test]
    fn builds_search_text_skipping_empty() {
        assert_eq!(
            build_search_text("Moscow", "", "10", "Moscow, 10"),
            "Moscow 10 Moscow, 10"
        );
    }
}
