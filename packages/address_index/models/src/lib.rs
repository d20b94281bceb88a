#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the address dictionary and record store.
//!
//! This crate contains only data types, configuration structs, and simple
//! conversions. It has no heavyweight dependencies (no Tantivy, no I/O).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which reference dictionary an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DictionaryKind {
    /// Distinct street names.
    Street,
    /// Distinct city names.
    City,
}

impl DictionaryKind {
    /// Both dictionaries, in build order.
    pub const ALL: [Self; 2] = [Self::Street, Self::City];

    /// Directory name of this dictionary inside a store directory.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Street => "streets",
            Self::City => "cities",
        }
    }
}

/// Lowercases, trims, and collapses internal whitespace.
///
/// This is the key form of every dictionary entry.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A single deduplicated dictionary entry.
///
/// Built once from the record store and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    /// Name as it appears in the source records.
    pub display_name: String,
    /// [`normalize_name`] of `display_name`; unique per dictionary.
    pub normalized_name: String,
    /// Number of records that use this name.
    pub usage_count: u64,
}

impl DictionaryEntry {
    /// Creates an entry, deriving the normalized key from `display_name`.
    #[must_use]
    pub fn new(display_name: impl Into<String>, usage_count: u64) -> Self {
        let display_name = display_name.into();
        let normalized_name = normalize_name(&display_name);
        Self {
            display_name,
            normalized_name,
            usage_count,
        }
    }
}

/// A geocoded building/address record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// City or locality.
    pub city: Option<String>,
    /// Street name.
    pub street: Option<String>,
    /// House number, possibly with a letter or building suffix.
    pub house_number: Option<String>,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Human-readable one-line address.
    pub full_address: String,
    /// Free-form source tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl AddressRecord {
    /// Joins the present parts as `"city, street, house_number"`.
    #[must_use]
    pub fn compose_full_address(
        city: Option<&str>,
        street: Option<&str>,
        house_number: Option<&str>,
    ) -> String {
        [city, street, house_number]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// City, or `""` when absent.
    #[must_use]
    pub fn city_str(&self) -> &str {
        self.city.as_deref().unwrap_or("")
    }

    /// Street, or `""` when absent.
    #[must_use]
    pub fn street_str(&self) -> &str {
        self.street.as_deref().unwrap_or("")
    }

    /// House number, or `""` when absent.
    #[must_use]
    pub fn house_number_str(&self) -> &str {
        self.house_number.as_deref().unwrap_or("")
    }
}

/// Configuration for building a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Memory budget for each Tantivy `IndexWriter` in bytes.
    /// Defaults to 64 MB.
    #[serde(default = "default_writer_heap")]
    pub writer_heap_bytes: usize,
}

const fn default_writer_heap() -> usize {
    64 * 1024 * 1024
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            writer_heap_bytes: default_writer_heap(),
        }
    }
}

/// Statistics about a freshly built store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of address records indexed.
    pub records: u64,
    /// Number of distinct street names.
    pub streets: u64,
    /// Number of distinct city names.
    pub cities: u64,
    /// Store size on disk in bytes (0 for in-memory stores).
    pub size_bytes: u64,
    /// Time taken to build the store in seconds.
    pub build_time_secs: f64,
}

/// Live document counts of an opened store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of address records.
    pub records: u64,
    /// Number of street dictionary entries.
    pub streets: u64,
    /// Number of city dictionary entries.
    pub cities: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_names() {
        assert_eq!(normalize_name("  Arbat   Street "), "arbat street");
        assert_eq!(normalize_name("МОСКВА"), "москва");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn entry_derives_key() {
        let entry = DictionaryEntry::new("Tverskaya  Street", 12);
        assert_eq!(entry.normalized_name, "tverskaya street");
        assert_eq!(entry.usage_count, 12);
    }

    #[test]
    fn composes_full_address_from_present_parts() {
        assert_eq!(
            AddressRecord::compose_full_address(Some("Moscow"), Some("Arbat Street"), Some("10")),
            "Moscow, Arbat Street, 10"
        );
        assert_eq!(
            AddressRecord::compose_full_address(None, Some("Arbat Street"), Some(" ")),
            "Arbat Street"
        );
    }
}
