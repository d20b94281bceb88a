//! Normalized edit-distance similarity.

use address_match_index::normalize;
use address_match_index::synonyms;
use strsim::levenshtein;

/// `1 − distance / max(len(a), len(b), 1)`, counting characters.
///
/// Always in `[0, 1]`; identical strings score 1.0.
#[must_use]
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count()).max(1);
    #[allow(clippy::cast_precision_loss)]
    let score = 1.0 - levenshtein(a, b) as f64 / max_len as f64;
    score.clamp(0.0, 1.0)
}

/// Best similarity of a normalized query against a normalized
/// dictionary name.
///
/// Compares the query with the whole name, the query's proper-name
/// tokens with the name's proper-name tokens, and, for multi-word
/// names, the query with each proper-name word on its own. The last
/// comparison lets a bare `"arbat"` reach `"novy arbat avenue"`.
#[must_use]
pub fn best_part_similarity(query: &str, name: &str) -> f64 {
    let mut best = normalized_similarity(query, name);
    if best >= 1.0 {
        return best;
    }

    let query_proper = normalize::proper_name_tokens(query).join(" ");
    let name_words = normalize::proper_name_tokens(name);
    let name_proper = name_words.join(" ");
    if !query_proper.is_empty() && !name_proper.is_empty() {
        best = best.max(normalized_similarity(&query_proper, &name_proper));
    }

    if name.split_whitespace().count() > 1 {
        for word in name
            .split_whitespace()
            .filter(|w| !synonyms::is_admin_token(w))
        {
            best = best.max(normalized_similarity(query, word));
        }
    }

    best
}
