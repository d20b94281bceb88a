//! Administrative token tables.
//!
//! Administrative tokens name a structural category (street type,
//! building part, settlement type) rather than a proper name. They are
//! stripped before similarity comparison and skipped when building
//! prefix queries, so `"ул. Арбат"`, `"Arbat St"` and `"Arbat Street"`
//! compare on the proper name alone.
//!
//! All keys are lowercase and punctuation-free, matching the output of
//! [`crate::normalize::tokenize`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

/// Maps street type abbreviations to their canonical full form.
static STREET_TYPES: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    BTreeMap::from([
        ("st", "street"),
        ("str", "street"),
        ("ave", "avenue"),
        ("av", "avenue"),
        ("blvd", "boulevard"),
        ("ln", "lane"),
        ("rd", "road"),
        ("dr", "drive"),
        ("pl", "place"),
        ("sq", "square"),
        ("hwy", "highway"),
        ("emb", "embankment"),
        ("ul", "ulitsa"),
        ("пр", "проспект"),
        ("просп", "проспект"),
        ("пер", "переулок"),
        ("б", "бульвар"),
        ("бул", "бульвар"),
        ("наб", "набережная"),
        ("ш", "шоссе"),
        ("пл", "площадь"),
        ("прд", "проезд"),
        ("туп", "тупик"),
        ("ул", "улица"),
    ])
});

/// Maps building-part abbreviations to their canonical full form.
static BUILDING_TYPES: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    BTreeMap::from([
        ("bldg", "building"),
        ("apt", "apartment"),
        ("no", "number"),
        ("д", "дом"),
        ("зд", "здание"),
        ("стр", "строение"),
        ("к", "корпус"),
        ("корп", "корпус"),
        ("влд", "владение"),
        ("кв", "квартира"),
    ])
});

/// Maps settlement type abbreviations to their canonical full form.
static SETTLEMENT_TYPES: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    BTreeMap::from([("г", "город"), ("пос", "поселок"), ("дер", "деревня")])
});

/// Canonical forms that are administrative without appearing as an
/// abbreviation target above.
static EXTRA_CANONICAL: &[&str] = &["road", "house", "city", "town"];

/// Every administrative token, abbreviated or canonical.
static ADMIN_TOKENS: LazyLock<BTreeSet<&'static str>> = LazyLock::new(|| {
    [&*STREET_TYPES, &*BUILDING_TYPES, &*SETTLEMENT_TYPES]
        .into_iter()
        .flat_map(|table| table.iter().flat_map(|(k, v)| [*k, *v]))
        .chain(EXTRA_CANONICAL.iter().copied())
        .collect()
});

/// Words that carry no address information in free-text queries.
static FILLER_WORDS: &[&str] = &[
    "address", "адрес", "в", "на", "по", "из", "для", "от", "до", "и", "a", "an", "the", "at",
    "of",
];

/// Expands a single lowercase token if it is a known abbreviation.
///
/// Checks street types, then building types, then settlement types.
/// Returns the expanded form or the original token unchanged.
#[must_use]
pub fn expand_token(token: &str) -> &str {
    [&*STREET_TYPES, &*BUILDING_TYPES, &*SETTLEMENT_TYPES]
        .into_iter()
        .find_map(|table| table.get(token).copied())
        .unwrap_or(token)
}

/// Returns `true` if the token is any administrative token.
#[must_use]
pub fn is_admin_token(token: &str) -> bool {
    ADMIN_TOKENS.contains(token)
}

/// Returns `true` if the token is a street type abbreviation or its
/// canonical form.
#[must_use]
pub fn is_street_type(token: &str) -> bool {
    STREET_TYPES.contains_key(token) || STREET_TYPES.values().any(|canonical| *canonical == token)
}

/// Returns `true` for filler words such as prepositions and `"address"`.
#[must_use]
pub fn is_filler_word(token: &str) -> bool {
    FILLER_WORDS.contains(&token)
}
