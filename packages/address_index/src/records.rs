//! Geocoded address record index.
//!
//! Supports exact lookups on the lowercase city/street/house keys and
//! token-prefix relevance search over the composite `search_text` field.

use std::path::Path;
use std::sync::Arc;

use address_match_index_models::{AddressRecord, normalize_name};
use tantivy::collector::TopDocs;
use tantivy::schema::Value;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};

use crate::IndexError;
use crate::normalize;
use crate::progress::ProgressCallback;
use crate::query;
use crate::schema::{self, RecordFields};

/// A record returned by a store query.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordHit {
    /// Stable id assigned at build time (position in the source list).
    pub id: u64,
    /// The stored record.
    pub record: AddressRecord,
    /// Raw index relevance score of this hit.
    pub relevance: f32,
}

/// Exact-match keys for a record lookup. Empty keys are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordKeys<'a> {
    /// City.
    pub city: &'a str,
    /// Street.
    pub street: &'a str,
    /// House number.
    pub house_number: &'a str,
}

/// A searchable, read-only record index.
pub struct RecordIndex {
    fields: RecordFields,
    reader: IndexReader,
}

impl RecordIndex {
    /// Builds an in-memory record index.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the index fails.
    pub fn create_in_ram(
        records: &[AddressRecord],
        writer_heap_bytes: usize,
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<Self, IndexError> {
        let index = Index::create_in_ram(schema::build_record_schema());
        populate(&index, records, writer_heap_bytes, progress)?;
        Self::from_index(&index)
    }

    /// Builds a record index in `dir`, which must not already hold an
    /// index.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or writing
    /// the index fails.
    pub fn create_in_dir(
        dir: &Path,
        records: &[AddressRecord],
        writer_heap_bytes: usize,
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<Self, IndexError> {
        std::fs::create_dir_all(dir)?;
        let index = Index::create_in_dir(dir, schema::build_record_schema())?;
        populate(&index, records, writer_heap_bytes, progress)?;
        Self::from_index(&index)
    }

    /// Opens a record index previously built with [`Self::create_in_dir`].
    ///
    /// # Errors
    ///
    /// Returns an error if the directory does not exist or does not
    /// contain a valid record index.
    pub fn open(dir: &Path) -> Result<Self, IndexError> {
        if !dir.exists() {
            return Err(IndexError::IndexNotFound(dir.display().to_string()));
        }
        let index = Index::open_in_dir(dir)?;
        Self::from_index(&index)
    }

    fn from_index(index: &Index) -> Result<Self, IndexError> {
        schema::register_tokenizers(index);
        let fields = RecordFields::from_schema(&index.schema());
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(Self { fields, reader })
    }

    /// Records whose keys equal every non-empty key in `keys`,
    /// case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub fn exact(&self, keys: RecordKeys<'_>, limit: usize) -> Result<Vec<RecordHit>, IndexError> {
        let city = normalize_name(keys.city);
        let street = normalize_name(keys.street);
        let house = normalize_name(keys.house_number);

        let Some(query) = query::build_exact_query(&[
            (self.fields.city_key, city.as_str()),
            (self.fields.street_key, street.as_str()),
            (self.fields.house_key, house.as_str()),
        ]) else {
            return Ok(Vec::new());
        };

        self.collect(query.as_ref(), limit)
    }

    /// Token-prefix relevance search; every term must prefix-match a
    /// token of the record's search text.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub fn prefix_search(&self, terms: &[String], limit: usize) -> Result<Vec<RecordHit>, IndexError> {
        let Some(query) = query::build_prefix_query(self.fields.search_text, terms) else {
            return Ok(Vec::new());
        };
        self.collect(query.as_ref(), limit)
    }

    fn collect(
        &self,
        query: &dyn tantivy::query::Query,
        limit: usize,
    ) -> Result<Vec<RecordHit>, IndexError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let top_docs = searcher.search(query, &TopDocs::with_limit(limit))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let (id, record) = record_from_doc(&doc, &self.fields);
            hits.push(RecordHit {
                id,
                record,
                relevance: score,
            });
        }
        Ok(hits)
    }

    /// Number of live records.
    #[must_use]
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}

fn populate(
    index: &Index,
    records: &[AddressRecord],
    writer_heap_bytes: usize,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<(), IndexError> {
    schema::register_tokenizers(index);
    let fields = RecordFields::from_schema(&index.schema());
    let mut writer: IndexWriter = index.writer(writer_heap_bytes)?;

    progress.set_total(records.len() as u64);
    progress.set_message("Indexing records".to_string());

    for (id, record) in records.iter().enumerate() {
        writer.add_document(record_to_doc(id as u64, record, &fields)?)?;
        progress.inc(1);

        if (id + 1).is_multiple_of(1_000_000) {
            log::info!("  indexed {} records...", id + 1);
        }
    }

    log::info!("Committing record index ({} documents)...", records.len());
    writer.commit()?;
    writer.wait_merging_threads()?;
    progress.finish(format!("Indexed {} records", records.len()));

    Ok(())
}

fn record_to_doc(
    id: u64,
    record: &AddressRecord,
    fields: &RecordFields,
) -> Result<TantivyDocument, IndexError> {
    let mut doc = TantivyDocument::default();
    doc.add_u64(fields.id, id);

    let parts = [
        (record.city.as_deref(), fields.city, fields.city_key),
        (record.street.as_deref(), fields.street, fields.street_key),
        (record.house_number.as_deref(), fields.house_number, fields.house_key),
    ];
    for (value, display_field, key_field) in parts {
        if let Some(value) = value {
            doc.add_text(display_field, value);
            doc.add_text(key_field, normalize_name(value));
        }
    }

    doc.add_f64(fields.lat, record.latitude);
    doc.add_f64(fields.lon, record.longitude);
    doc.add_text(fields.full_address, &record.full_address);

    let tags =
        serde_json::to_string(&record.tags).map_err(|e| IndexError::Other(e.to_string()))?;
    doc.add_text(fields.tags, tags);

    doc.add_text(
        fields.search_text,
        normalize::build_search_text(
            record.city_str(),
            record.street_str(),
            record.house_number_str(),
            &record.full_address,
        ),
    );

    Ok(doc)
}

fn record_from_doc(doc: &TantivyDocument, fields: &RecordFields) -> (u64, AddressRecord) {
    let text = |field| {
        doc.get_first(field)
            .and_then(|v| v.as_str())
            .map(ToString::to_string)
    };
    let float = |field| doc.get_first(field).and_then(|v| v.as_f64()).unwrap_or(0.0);

    let id = doc.get_first(fields.id).and_then(|v| v.as_u64()).unwrap_or(0);
    let tags = text(fields.tags)
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default();

    let record = AddressRecord {
        city: text(fields.city),
        street: text(fields.street),
        house_number: text(fields.house_number),
        latitude: float(fields.lat),
        longitude: float(fields.lon),
        full_address: text(fields.full_address).unwrap_or_default(),
        tags,
    };

    (id, record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::null_progress;

    fn record(city: &str, street: &str, house: &str) -> AddressRecord {
        let house_number = (!house.is_empty()).then(|| house.to_string());
        AddressRecord {
            city: Some(city.to_string()),
            street: Some(street.to_string()),
            full_address: AddressRecord::compose_full_address(
                Some(city),
                Some(street),
                house_number.as_deref(),
            ),
            house_number,
            latitude: 55.75,
            longitude: 37.59,
            tags: [("building".to_string(), "yes".to_string())].into(),
        }
    }

    fn index() -> RecordIndex {
        let records = vec![
            record("Moscow", "Arbat Street", "10"),
            record("Moscow", "Arbat Street", "12"),
            record("Moscow", "Tverskaya Street", "7"),
            record("Saint Petersburg", "Nevsky Avenue", "28"),
        ];
        RecordIndex::create_in_ram(&records, 15_000_000, &null_progress()).unwrap()
    }

    #[test]
    fn exact_lookup_is_case_insensitive() {
        let index = index();
        let hits = index
            .exact(
                RecordKeys {
                    city: "MOSCOW",
                    street: "arbat street",
                    house_number: "10",
                },
                10,
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 0);
        assert_eq!(hits[0].record.full_address, "Moscow, Arbat Street, 10");
    }

    #[test]
    fn exact_lookup_skips_empty_keys() {
        let index = index();
        let hits = index
            .exact(
                RecordKeys {
                    street: "Arbat Street",
                    ..RecordKeys::default()
                },
                10,
            )
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(index.exact(RecordKeys::default(), 10).unwrap().is_empty());
    }

    #[test]
    fn prefix_search_requires_every_term() {
        let index = index();
        let terms = query::prefix_terms("arb 12");
        let hits = index.prefix_search(&terms, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.house_number.as_deref(), Some("12"));
        assert!(hits[0].relevance > 0.0);
    }

    #[test]
    fn prefix_search_round_trips_stored_fields() {
        let index = index();
        let hits = index.prefix_search(&query::prefix_terms("nevsky"), 10).unwrap();
        assert_eq!(hits.len(), 1);

        let record = &hits[0].record;
        assert_eq!(record.city.as_deref(), Some("Saint Petersburg"));
        assert!((record.latitude - 55.75).abs() < f64::EPSILON);
        assert_eq!(record.tags.get("building").map(String::as_str), Some("yes"));
    }

    #[test]
    fn whole_token_matches_outrank_prefix_matches() {
        let records = vec![
            record("Moscow", "Arbatskaya Street", "1"),
            record("Moscow", "Arbat Street", "1"),
        ];
        let index = RecordIndex::create_in_ram(&records, 15_000_000, &null_progress()).unwrap();
        let hits = index.prefix_search(&query::prefix_terms("arbat"), 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.street.as_deref(), Some("Arbat Street"));
    }

    #[test]
    fn zero_limit_returns_nothing() {
        let index = index();
        assert!(index.prefix_search(&query::prefix_terms("arbat"), 0).unwrap().is_empty());
        assert_eq!(index.num_docs(), 4);
    }
}
