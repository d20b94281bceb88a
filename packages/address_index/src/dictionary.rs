//! Street and city dictionaries.
//!
//! A dictionary is a small Tantivy index of deduplicated names with
//! usage counters, plus an in-memory copy of every entry ordered by
//! descending usage for the edit-distance fallback scan.

use std::collections::BTreeMap;
use std::path::Path;

use address_match_index_models::{DictionaryEntry, normalize_name};
use tantivy::collector::{DocSetCollector, TopDocs};
use tantivy::query::AllQuery;
use tantivy::schema::Value;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, doc};

use crate::IndexError;
use crate::query;
use crate::schema::{self, DictionaryFields};

/// Aggregates raw names into deduplicated dictionary entries.
///
/// Names are grouped by their normalized key. Each entry's display name
/// is the most frequent spelling of the key (lexically smallest on
/// ties) and its usage count is the size of the group. Blank names are
/// ignored. The result is ordered by descending usage, then key.
#[must_use]
pub fn aggregate<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<DictionaryEntry> {
    let mut groups: BTreeMap<String, BTreeMap<&'a str, u64>> = BTreeMap::new();

    for name in names {
        let trimmed = name.trim();
        let key = normalize_name(trimmed);
        if key.is_empty() {
            continue;
        }
        *groups.entry(key).or_default().entry(trimmed).or_default() += 1;
    }

    let mut entries: Vec<DictionaryEntry> = groups
        .into_iter()
        .filter_map(|(key, spellings)| {
            let usage_count = spellings.values().sum();
            // First maximum in lexical order.
            let (display, _) = spellings
                .iter()
                .fold(None::<(&str, u64)>, |best, (spelling, count)| match best {
                    Some((_, best_count)) if best_count >= *count => best,
                    _ => Some((spelling, *count)),
                })?;
            Some(DictionaryEntry {
                display_name: display.to_string(),
                normalized_name: key,
                usage_count,
            })
        })
        .collect();

    sort_by_usage(&mut entries);
    entries
}

fn sort_by_usage(entries: &mut [DictionaryEntry]) {
    entries.sort_by(|a, b| {
        b.usage_count
            .cmp(&a.usage_count)
            .then_with(|| a.normalized_name.cmp(&b.normalized_name))
    });
}

/// A searchable, read-only name dictionary.
pub struct DictionaryIndex {
    fields: DictionaryFields,
    reader: IndexReader,
    by_usage: Vec<DictionaryEntry>,
}

impl DictionaryIndex {
    /// Builds an in-memory dictionary.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the index fails.
    pub fn create_in_ram(
        entries: &[DictionaryEntry],
        writer_heap_bytes: usize,
    ) -> Result<Self, IndexError> {
        let index = Index::create_in_ram(schema::build_dictionary_schema());
        Self::populate(&index, entries, writer_heap_bytes)?;
        Self::from_index(&index)
    }

    /// Builds a dictionary in `dir`, which must not already hold an
    /// index.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or writing
    /// the index fails.
    pub fn create_in_dir(
        dir: &Path,
        entries: &[DictionaryEntry],
        writer_heap_bytes: usize,
    ) -> Result<Self, IndexError> {
        std::fs::create_dir_all(dir)?;
        let index = Index::create_in_dir(dir, schema::build_dictionary_schema())?;
        Self::populate(&index, entries, writer_heap_bytes)?;
        Self::from_index(&index)
    }

    /// Opens a dictionary previously built with [`Self::create_in_dir`].
    ///
    /// # Errors
    ///
    /// Returns an error if the directory does not exist or does not
    /// contain a valid dictionary index.
    pub fn open(dir: &Path) -> Result<Self, IndexError> {
        if !dir.exists() {
            return Err(IndexError::IndexNotFound(dir.display().to_string()));
        }
        let index = Index::open_in_dir(dir)?;
        Self::from_index(&index)
    }

    fn populate(
        index: &Index,
        entries: &[DictionaryEntry],
        writer_heap_bytes: usize,
    ) -> Result<(), IndexError> {
        schema::register_tokenizers(index);
        let fields = DictionaryFields::from_schema(&index.schema());
        let mut writer: IndexWriter = index.writer(writer_heap_bytes)?;

        for entry in entries {
            writer.add_document(doc!(
                fields.display_name => entry.display_name.as_str(),
                fields.key => entry.normalized_name.as_str(),
                fields.name_text => entry.display_name.as_str(),
                fields.usage_count => entry.usage_count,
            ))?;
        }

        writer.commit()?;
        writer.wait_merging_threads()?;
        Ok(())
    }

    fn from_index(index: &Index) -> Result<Self, IndexError> {
        schema::register_tokenizers(index);
        let fields = DictionaryFields::from_schema(&index.schema());
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        let by_usage = load_all(&reader, &fields)?;

        Ok(Self {
            fields,
            reader,
            by_usage,
        })
    }

    /// Looks up an entry by exact normalized key.
    ///
    /// `name` is normalized first, so any casing or spacing matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub fn lookup(&self, name: &str) -> Result<Option<DictionaryEntry>, IndexError> {
        let key = normalize_name(name);
        if key.is_empty() {
            return Ok(None);
        }

        let searcher = self.reader.searcher();
        let query = query::build_key_query(self.fields.key, &key);
        let top_docs = searcher.search(query.as_ref(), &TopDocs::with_limit(1))?;

        let Some((_, address)) = top_docs.first() else {
            return Ok(None);
        };
        let doc: TantivyDocument = searcher.doc(*address)?;
        Ok(Some(entry_from_doc(&doc, &self.fields)))
    }

    /// Token-prefix search returning up to `limit` entries with their
    /// relevance scores, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub fn prefix_search(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<(DictionaryEntry, f32)>, IndexError> {
        let terms = query::prefix_terms(text);
        let Some(query) = query::build_prefix_query(self.fields.name_text, &terms) else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let top_docs = searcher.search(query.as_ref(), &TopDocs::with_limit(limit))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            hits.push((entry_from_doc(&doc, &self.fields), score));
        }
        Ok(hits)
    }

    /// Every entry, ordered by descending usage count, then key.
    #[must_use]
    pub fn by_usage(&self) -> &[DictionaryEntry] {
        &self.by_usage
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_usage.len()
    }

    /// Returns `true` if the dictionary has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_usage.is_empty()
    }

    /// Number of live documents in the underlying index.
    #[must_use]
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}

fn load_all(
    reader: &IndexReader,
    fields: &DictionaryFields,
) -> Result<Vec<DictionaryEntry>, IndexError> {
    let searcher = reader.searcher();
    let addresses = searcher.search(&AllQuery, &DocSetCollector)?;

    let mut entries = Vec::with_capacity(addresses.len());
    for address in addresses {
        let doc: TantivyDocument = searcher.doc(address)?;
        entries.push(entry_from_doc(&doc, fields));
    }

    sort_by_usage(&mut entries);
    Ok(entries)
}

fn entry_from_doc(doc: &TantivyDocument, fields: &DictionaryFields) -> DictionaryEntry {
    let text = |field| {
        doc.get_first(field)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };

    DictionaryEntry {
        display_name: text(fields.display_name),
        normalized_name: text(fields.key),
        usage_count: doc
            .get_first(fields.usage_count)
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
    }
}
