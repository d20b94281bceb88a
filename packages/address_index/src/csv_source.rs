//! CSV record source.
//!
//! Reads geocoded building records from CSV files with the header
//! `CITY,STREET,NUMBER,LAT,LON[,FULL_ADDRESS][,TAGS]`, where `TAGS` is a
//! JSON object. Accepts a single file or a directory searched
//! recursively for `.csv` files.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use address_match_index_models::AddressRecord;
use serde::Deserialize;

/// A raw row from a record CSV file.
#[derive(Debug, Deserialize)]
pub struct CsvRow {
    /// City name.
    #[serde(rename = "CITY", default)]
    pub city: Option<String>,
    /// Street name.
    #[serde(rename = "STREET", default)]
    pub street: Option<String>,
    /// House number.
    #[serde(rename = "NUMBER", default)]
    pub number: Option<String>,
    /// Latitude (WGS84).
    #[serde(rename = "LAT")]
    pub lat: f64,
    /// Longitude (WGS84).
    #[serde(rename = "LON")]
    pub lon: f64,
    /// One-line address; composed from the parts when absent.
    #[serde(rename = "FULL_ADDRESS", default)]
    pub full_address: Option<String>,
    /// JSON object of free-form tags.
    #[serde(rename = "TAGS", default)]
    pub tags: Option<String>,
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Parses a JSON tag object, stringifying non-string values.
///
/// Malformed JSON yields an empty map.
#[must_use]
pub fn parse_tags(raw: &str) -> BTreeMap<String, String> {
    let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(raw) else {
        return BTreeMap::new();
    };

    map.into_iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, value)
        })
        .collect()
}

impl CsvRow {
    /// Converts this row into an address record.
    ///
    /// Returns `None` if the coordinates are invalid or the row has
    /// neither a street nor a city.
    #[must_use]
    pub fn to_record(&self) -> Option<AddressRecord> {
        if !self.lat.is_finite() || !self.lon.is_finite() {
            return None;
        }

        if self.lat < -90.0 || self.lat > 90.0 || self.lon < -180.0 || self.lon > 180.0 {
            return None;
        }

        let city = non_empty(self.city.as_ref());
        let street = non_empty(self.street.as_ref());
        let house_number = non_empty(self.number.as_ref());

        if city.is_none() && street.is_none() {
            return None;
        }

        let full_address = non_empty(self.full_address.as_ref()).unwrap_or_else(|| {
            AddressRecord::compose_full_address(
                city.as_deref(),
                street.as_deref(),
                house_number.as_deref(),
            )
        });

        let tags = self.tags.as_deref().map(parse_tags).unwrap_or_default();

        Some(AddressRecord {
            city,
            street,
            house_number,
            latitude: self.lat,
            longitude: self.lon,
            full_address,
            tags,
        })
    }
}

/// Loads every record from a CSV file or a directory of CSV files.
///
/// # Errors
///
/// Returns an error if the path does not exist or a file cannot be read.
pub fn load_records(path: &Path) -> Result<Vec<AddressRecord>, CsvSourceError> {
    let mut records = Vec::new();
    parse_path(path, |record| records.push(record))?;
    Ok(records)
}

/// Streams records from a CSV file or a directory of CSV files.
///
/// Unreadable files inside a directory are skipped with a warning.
///
/// # Errors
///
/// Returns an error if the path does not exist, or if `path` is a
/// single file that cannot be read.
pub fn parse_path(
    path: &Path,
    mut on_record: impl FnMut(AddressRecord),
) -> Result<u64, CsvSourceError> {
    if !path.exists() {
        return Err(CsvSourceError::FileNotFound(path.display().to_string()));
    }

    if path.is_file() {
        return parse_single_file(path, &mut on_record);
    }

    let csv_files = collect_csv_files(path)?;
    if csv_files.is_empty() {
        log::warn!("No CSV files found in {}", path.display());
        return Ok(0);
    }

    log::info!("Found {} record CSV files", csv_files.len());

    let mut total = 0u64;
    for csv_path in &csv_files {
        match parse_single_file(csv_path, &mut on_record) {
            Ok(count) => {
                total += count;
                log::debug!("  parsed {} records from {}", count, csv_path.display());
            }
            Err(e) => {
                log::warn!("  skipping {}: {e}", csv_path.display());
            }
        }
    }

    Ok(total)
}

fn parse_single_file(
    path: &Path,
    on_record: &mut impl FnMut(AddressRecord),
) -> Result<u64, CsvSourceError> {
    let file = std::fs::File::open(path).map_err(|e| CsvSourceError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_reader(file, on_record)
}

/// Parses record CSV rows from any `Read` source.
///
/// Malformed rows are skipped.
///
/// # Errors
///
/// Returns an error if the CSV header cannot be read.
pub fn parse_reader(
    reader: impl Read,
    on_record: &mut impl FnMut(AddressRecord),
) -> Result<u64, CsvSourceError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    csv_reader.headers().map_err(|e| CsvSourceError::Csv {
        path: "<reader>".to_string(),
        source: e,
    })?;

    let mut count = 0u64;
    for result in csv_reader.deserialize::<CsvRow>() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                log::trace!("  skipping malformed row: {e}");
                continue;
            }
        };

        if let Some(record) = row.to_record() {
            on_record(record);
            count += 1;
        }
    }

    Ok(count)
}

fn collect_csv_files(dir: &Path) -> Result<Vec<PathBuf>, CsvSourceError> {
    let mut files = Vec::new();
    collect_csv_files_recursive(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_csv_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), CsvSourceError> {
    let io_err = |e| CsvSourceError::Io {
        path: dir.display().to_string(),
        source: e,
    };

    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            collect_csv_files_recursive(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
            files.push(path);
        }
    }

    Ok(())
}

/// Errors from reading record CSV files.
#[derive(Debug, thiserror::Error)]
pub enum CsvSourceError {
    /// CSV parsing error.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path to the CSV file.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// I/O error reading a directory or file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Path does not exist.
    #[error("Record source not found: {0}")]
    FileNotFound(String),
}
