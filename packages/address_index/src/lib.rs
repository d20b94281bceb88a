#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tantivy-backed dictionary and record store for address matching.
//!
//! A store is three Tantivy indexes living side by side in one
//! directory:
//!
//! - `records/`: geocoded address records, searchable by exact
//!   lowercase keys and by token-prefix relevance
//! - `streets/`, `cities/`: deduplicated name dictionaries with usage
//!   counters, aggregated from the records at build time
//!
//! # Rebuilds
//!
//! A store is never mutated in place. [`build_store`] writes a complete
//! store into `<dir>.staging` and then renames it over `<dir>`, so a
//! reader opening the directory sees either the old store or the new
//! one.
//!
//! # Usage
//!
//! ```rust,no_run
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use address_match_index::{AddressStore, DictionaryKind};
//!
//! let store = AddressStore::open("data/address_index")?;
//! for (entry, score) in store.dictionary(DictionaryKind::Street).prefix_search("arb", 5)? {
//!     println!("{} ({score:.2})", entry.display_name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod csv_source;
pub mod dictionary;
pub mod normalize;
pub mod progress;
pub mod query;
pub mod records;
pub mod schema;
pub mod synonyms;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

pub use address_match_index_models::{
    AddressRecord, BuildConfig, DictionaryEntry, DictionaryKind, IndexStats, StoreStats,
};
use dictionary::DictionaryIndex;
use progress::ProgressCallback;
use records::RecordIndex;

/// Default store directory, relative to the working directory.
pub const DEFAULT_INDEX_DIR: &str = "data/address_index";

/// Environment variable overriding [`DEFAULT_INDEX_DIR`].
pub const INDEX_DIR_ENV: &str = "ADDRESS_MATCH_INDEX_DIR";

const RECORDS_DIR_NAME: &str = "records";

/// Returns the store directory from [`INDEX_DIR_ENV`], falling back to
/// [`DEFAULT_INDEX_DIR`].
#[must_use]
pub fn default_index_dir() -> PathBuf {
    std::env::var_os(INDEX_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_INDEX_DIR), PathBuf::from)
}

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Tantivy error.
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV record source error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv_source::CsvSourceError),

    /// Store directory not found.
    #[error("Index directory not found: {0}")]
    IndexNotFound(String),

    /// Async task join error.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

/// An opened, read-only address store.
///
/// Safe to share across threads; every query path takes `&self`.
pub struct AddressStore {
    records: RecordIndex,
    streets: DictionaryIndex,
    cities: DictionaryIndex,
}

impl AddressStore {
    /// Opens a store previously built with [`build_store`].
    ///
    /// # Errors
    ///
    /// Returns an error if the directory does not exist or any of its
    /// indexes cannot be opened.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, IndexError> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Err(IndexError::IndexNotFound(dir.display().to_string()));
        }

        log::info!("Opening address store at {}", dir.display());

        let store = Self {
            records: RecordIndex::open(&dir.join(RECORDS_DIR_NAME))?,
            streets: DictionaryIndex::open(&dir.join(DictionaryKind::Street.as_str()))?,
            cities: DictionaryIndex::open(&dir.join(DictionaryKind::City.as_str()))?,
        };

        let stats = store.stats();
        log::info!(
            "Address store opened: {} records, {} streets, {} cities",
            stats.records,
            stats.streets,
            stats.cities
        );

        Ok(store)
    }

    /// Builds a complete store in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if writing any index fails.
    pub fn build_in_ram(records: &[AddressRecord], config: &BuildConfig) -> Result<Self, IndexError> {
        let progress = progress::null_progress();
        let (streets, cities) = aggregate_dictionaries(records);

        Ok(Self {
            records: RecordIndex::create_in_ram(records, config.writer_heap_bytes, &progress)?,
            streets: DictionaryIndex::create_in_ram(&streets, config.writer_heap_bytes)?,
            cities: DictionaryIndex::create_in_ram(&cities, config.writer_heap_bytes)?,
        })
    }

    /// Returns `true` if `dir` looks like a built store.
    #[must_use]
    pub fn is_available(dir: &Path) -> bool {
        dir.join(RECORDS_DIR_NAME).join("meta.json").exists()
    }

    /// The record index.
    #[must_use]
    pub const fn records(&self) -> &RecordIndex {
        &self.records
    }

    /// The street or city dictionary.
    #[must_use]
    pub const fn dictionary(&self, kind: DictionaryKind) -> &DictionaryIndex {
        match kind {
            DictionaryKind::Street => &self.streets,
            DictionaryKind::City => &self.cities,
        }
    }

    /// Live document counts.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            records: self.records.num_docs(),
            streets: self.streets.num_docs(),
            cities: self.cities.num_docs(),
        }
    }
}

/// Aggregates the street and city dictionaries of a record set.
#[must_use]
pub fn aggregate_dictionaries(
    records: &[AddressRecord],
) -> (Vec<DictionaryEntry>, Vec<DictionaryEntry>) {
    let streets = dictionary::aggregate(records.iter().filter_map(|r| r.street.as_deref()));
    let cities = dictionary::aggregate(records.iter().filter_map(|r| r.city.as_deref()));
    (streets, cities)
}

/// Builds a store from `records` and atomically replaces `dir` with it.
///
/// Dispatched to a blocking thread; see [`build_store_sync`].
///
/// # Errors
///
/// Returns an error if building or swapping the store fails.
pub async fn build_store(
    dir: &Path,
    records: Vec<AddressRecord>,
    config: BuildConfig,
    progress: Arc<dyn ProgressCallback>,
) -> Result<IndexStats, IndexError> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || build_store_sync(&dir, &records, &config, &progress))
        .await?
}

/// Synchronous store build.
///
/// 1. Writes all three indexes into `<dir>.staging`
/// 2. Moves any existing `<dir>` aside to `<dir>.old`
/// 3. Renames the staging directory to `<dir>` and removes the old copy
///
/// # Errors
///
/// Returns an error if writing an index or renaming a directory fails.
/// On failure the previous store at `dir` is left in place.
pub fn build_store_sync(
    dir: &Path,
    records: &[AddressRecord],
    config: &BuildConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<IndexStats, IndexError> {
    let start = Instant::now();
    let staging = sibling_path(dir, "staging");
    let old = sibling_path(dir, "old");

    if staging.exists() {
        log::info!("Removing stale staging directory {}", staging.display());
        std::fs::remove_dir_all(&staging)?;
    }
    std::fs::create_dir_all(&staging)?;

    log::info!(
        "Building address store for {} records in {}",
        records.len(),
        staging.display()
    );

    let (streets, cities) = aggregate_dictionaries(records);
    log::info!(
        "Aggregated {} distinct streets and {} distinct cities",
        streets.len(),
        cities.len()
    );

    let heap = config.writer_heap_bytes;
    RecordIndex::create_in_dir(&staging.join(RECORDS_DIR_NAME), records, heap, progress)?;
    DictionaryIndex::create_in_dir(&staging.join(DictionaryKind::Street.as_str()), &streets, heap)?;
    DictionaryIndex::create_in_dir(&staging.join(DictionaryKind::City.as_str()), &cities, heap)?;

    swap_into_place(&staging, dir, &old)?;

    let elapsed = start.elapsed();
    let size_bytes = dir_size(dir).unwrap_or(0);

    #[allow(clippy::cast_precision_loss)]
    let mb = size_bytes as f64 / 1_048_576.0;
    log::info!(
        "Address store built: {} records, {mb:.1} MB, {:.1}s",
        records.len(),
        elapsed.as_secs_f64()
    );

    Ok(IndexStats {
        records: records.len() as u64,
        streets: streets.len() as u64,
        cities: cities.len() as u64,
        size_bytes,
        build_time_secs: elapsed.as_secs_f64(),
    })
}

fn swap_into_place(staging: &Path, dir: &Path, old: &Path) -> Result<(), IndexError> {
    if old.exists() {
        std::fs::remove_dir_all(old)?;
    }

    let had_previous = dir.exists();
    if had_previous {
        std::fs::rename(dir, old)?;
    } else if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    if let Err(e) = std::fs::rename(staging, dir) {
        if had_previous {
            log::error!("Failed to swap in new store, restoring previous: {e}");
            std::fs::rename(old, dir)?;
        }
        return Err(e.into());
    }

    if had_previous {
        std::fs::remove_dir_all(old)?;
    }

    Ok(())
}

/// `<dir>.<suffix>` next to `dir`.
fn sibling_path(dir: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(dir.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Recursively calculates the total size of a directory.
fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut total = 0u64;
    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let ft = entry.file_type()?;
            if ft.is_file() {
                total += entry.metadata()?.len();
            } else if ft.is_dir() {
                total += dir_size(&entry.path())?;
            }
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<AddressRecord> {
        let csv = "CITY,STREET,NUMBER,LAT,LON\n\
                   Moscow,Arbat Street,10,55.7520,37.5930\n\
                   Moscow,Arbat Street,12,55.7515,37.5920\n\
                   Moscow,Tverskaya Street,7,55.7610,37.6090\n\
                   Kazan,Bauman Street,5,55.7890,49.1220\n";
        let mut out = Vec::new();
        csv_source::parse_reader(csv.as_bytes(), &mut |r| out.push(r)).unwrap();
        out
    }

    fn config() -> BuildConfig {
        BuildConfig {
            writer_heap_bytes: 50_000_000,
        }
    }

    #[test]
    fn builds_store_in_ram() {
        let store = AddressStore::build_in_ram(&records(), &config()).unwrap();
        assert_eq!(
            store.stats(),
            StoreStats {
                records: 4,
                streets: 3,
                cities: 2,
            }
        );

        let moscow = store.dictionary(DictionaryKind::City).lookup("moscow").unwrap().unwrap();
        assert_eq!(moscow.usage_count, 3);
    }

    #[test]
    fn sibling_paths_append_suffix() {
        assert_eq!(
            sibling_path(Path::new("data/address_index"), "staging"),
            PathBuf::from("data/address_index.staging")
        );
    }

    #[tokio::test]
    async fn build_open_and_rebuild_on_disk() {
        let tmp = std::env::temp_dir().join("address_match_index_test_rebuild");
        let _ = std::fs::remove_dir_all(&tmp);
        let dir = tmp.join("store");

        let stats = build_store(&dir, records(), config(), progress::null_progress())
            .await
            .unwrap();
        assert_eq!(stats.records, 4);
        assert_eq!(stats.streets, 3);
        assert!(stats.size_bytes > 0);
        assert!(AddressStore::is_available(&dir));
        assert!(!sibling_path(&dir, "staging").exists());

        let store = AddressStore::open(&dir).unwrap();
        assert_eq!(store.stats().records, 4);
        drop(store);

        let smaller: Vec<AddressRecord> = records().into_iter().take(1).collect();
        let stats = build_store(&dir, smaller, config(), progress::null_progress())
            .await
            .unwrap();
        assert_eq!(stats.records, 1);
        assert!(!sibling_path(&dir, "old").exists());

        let store = AddressStore::open(&dir).unwrap();
        assert_eq!(
            store.stats(),
            StoreStats {
                records: 1,
                streets: 1,
                cities: 1,
            }
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn open_missing_directory_fails() {
        let missing = std::env::temp_dir().join("address_match_index_missing");
        assert!(matches!(
            AddressStore::open(&missing),
            Err(IndexError::IndexNotFound(_))
        ));
    }
}
