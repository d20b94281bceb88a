//! Tantivy schema definitions for the record and dictionary indexes.
//!
//! Record documents carry the display fields (stored only), lowercase
//! exact-match keys for the exact tier, and a composite `search_text`
//! field for prefix/relevance search. Dictionary documents carry the
//! display name, the normalized key, a tokenized copy of the name for
//! prefix search, and the usage counter.

use tantivy::Index;
use tantivy::schema::{
    self, Field, NumericOptions, STORED, STRING, Schema, TextFieldIndexing, TextOptions,
};
use tantivy::tokenizer::TextAnalyzer;

/// Name of the tokenizer used by every tokenized field.
pub const TOKENIZER: &str = "address";

/// Names of all fields in the record schema.
pub struct RecordFieldNames;

impl RecordFieldNames {
    /// Stable record id assigned at build time.
    pub const ID: &'static str = "id";
    /// City as ingested.
    pub const CITY: &'static str = "city";
    /// Street as ingested.
    pub const STREET: &'static str = "street";
    /// House number as ingested.
    pub const HOUSE_NUMBER: &'static str = "house_number";
    /// Lowercase city key, exact match.
    pub const CITY_KEY: &'static str = "city_key";
    /// Lowercase street key, exact match.
    pub const STREET_KEY: &'static str = "street_key";
    /// Lowercase house number key, exact match.
    pub const HOUSE_KEY: &'static str = "house_key";
    /// Latitude (WGS84).
    pub const LAT: &'static str = "lat";
    /// Longitude (WGS84).
    pub const LON: &'static str = "lon";
    /// One-line display address.
    pub const FULL_ADDRESS: &'static str = "full_address";
    /// JSON-encoded tag map.
    pub const TAGS: &'static str = "tags";
    /// Composite field for prefix/relevance search.
    pub const SEARCH_TEXT: &'static str = "search_text";
}

/// Names of all fields in the dictionary schema.
pub struct DictionaryFieldNames;

impl DictionaryFieldNames {
    /// Name as ingested.
    pub const DISPLAY_NAME: &'static str = "display_name";
    /// Normalized name, exact match.
    pub const KEY: &'static str = "key";
    /// Tokenized name for prefix search.
    pub const NAME_TEXT: &'static str = "name_text";
    /// Number of records using the name.
    pub const USAGE_COUNT: &'static str = "usage_count";
}

/// Resolved field handles of the record schema.
#[derive(Debug, Clone)]
pub struct RecordFields {
    /// Record id.
    pub id: Field,
    /// City.
    pub city: Field,
    /// Street.
    pub street: Field,
    /// House number.
    pub house_number: Field,
    /// City key.
    pub city_key: Field,
    /// Street key.
    pub street_key: Field,
    /// House number key.
    pub house_key: Field,
    /// Latitude.
    pub lat: Field,
    /// Longitude.
    pub lon: Field,
    /// Full address.
    pub full_address: Field,
    /// Tags.
    pub tags: Field,
    /// Composite search text.
    pub search_text: Field,
}

impl RecordFields {
    /// Resolves field handles from a schema.
    ///
    /// # Panics
    ///
    /// Panics if the schema was not built by [`build_record_schema`].
    #[must_use]
    pub fn from_schema(schema: &Schema) -> Self {
        let field = |name: &str| {
            schema
                .get_field(name)
                .unwrap_or_else(|_| panic!("record schema missing {name} field"))
        };
        Self {
            id: field(RecordFieldNames::ID),
            city: field(RecordFieldNames::CITY),
            street: field(RecordFieldNames::STREET),
            house_number: field(RecordFieldNames::HOUSE_NUMBER),
            city_key: field(RecordFieldNames::CITY_KEY),
            street_key: field(RecordFieldNames::STREET_KEY),
            house_key: field(RecordFieldNames::HOUSE_KEY),
            lat: field(RecordFieldNames::LAT),
            lon: field(RecordFieldNames::LON),
            full_address: field(RecordFieldNames::FULL_ADDRESS),
            tags: field(RecordFieldNames::TAGS),
            search_text: field(RecordFieldNames::SEARCH_TEXT),
        }
    }
}

/// Resolved field handles of the dictionary schema.
#[derive(Debug, Clone)]
pub struct DictionaryFields {
    /// Display name.
    pub display_name: Field,
    /// Normalized key.
    pub key: Field,
    /// Tokenized name.
    pub name_text: Field,
    /// Usage counter.
    pub usage_count: Field,
}

impl DictionaryFields {
    /// Resolves field handles from a schema.
    ///
    /// # Panics
    ///
    /// Panics if the schema was not built by [`build_dictionary_schema`].
    #[must_use]
    pub fn from_schema(schema: &Schema) -> Self {
        let field = |name: &str| {
            schema
                .get_field(name)
                .unwrap_or_else(|_| panic!("dictionary schema missing {name} field"))
        };
        Self {
            display_name: field(DictionaryFieldNames::DISPLAY_NAME),
            key: field(DictionaryFieldNames::KEY),
            name_text: field(DictionaryFieldNames::NAME_TEXT),
            usage_count: field(DictionaryFieldNames::USAGE_COUNT),
        }
    }
}

fn tokenized_indexing() -> TextFieldIndexing {
    TextFieldIndexing::default()
        .set_tokenizer(TOKENIZER)
        .set_index_option(schema::IndexRecordOption::WithFreqsAndPositions)
}

/// Builds the record schema.
///
/// Fields:
/// - `id`: u64 (stored)
/// - `city`, `street`, `house_number`: stored only
/// - `city_key`, `street_key`, `house_key`: STRING (exact match)
/// - `lat`, `lon`: f64 (stored)
/// - `full_address`, `tags`: stored only
/// - `search_text`: TEXT (tokenized, not stored)
#[must_use]
pub fn build_record_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_u64_field(RecordFieldNames::ID, NumericOptions::default().set_stored());

    builder.add_text_field(RecordFieldNames::CITY, STORED);
    builder.add_text_field(RecordFieldNames::STREET, STORED);
    builder.add_text_field(RecordFieldNames::HOUSE_NUMBER, STORED);

    builder.add_text_field(RecordFieldNames::CITY_KEY, STRING);
    builder.add_text_field(RecordFieldNames::STREET_KEY, STRING);
    builder.add_text_field(RecordFieldNames::HOUSE_KEY, STRING);

    let f64_options = NumericOptions::default().set_stored();
    builder.add_f64_field(RecordFieldNames::LAT, f64_options.clone());
    builder.add_f64_field(RecordFieldNames::LON, f64_options);

    builder.add_text_field(RecordFieldNames::FULL_ADDRESS, STORED);
    builder.add_text_field(RecordFieldNames::TAGS, STORED);

    builder.add_text_field(
        RecordFieldNames::SEARCH_TEXT,
        TextOptions::default().set_indexing_options(tokenized_indexing()),
    );

    builder.build()
}

/// Builds the dictionary schema shared by the street and city
/// dictionaries.
#[must_use]
pub fn build_dictionary_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field(DictionaryFieldNames::DISPLAY_NAME, STORED);
    builder.add_text_field(DictionaryFieldNames::KEY, STRING | STORED);
    builder.add_text_field(
        DictionaryFieldNames::NAME_TEXT,
        TextOptions::default().set_indexing_options(tokenized_indexing()),
    );
    builder.add_u64_field(
        DictionaryFieldNames::USAGE_COUNT,
        NumericOptions::default().set_stored().set_fast(),
    );

    builder.build()
}

/// Registers the [`TOKENIZER`] on the given index.
///
/// Splits on non-alphanumeric characters and lowercases, which matches
/// [`crate::normalize::tokenize`] on the query side.
pub fn register_tokenizers(index: &Index) {
    index.tokenizers().register(
        TOKENIZER,
        TextAnalyzer::builder(tantivy::tokenizer::SimpleTokenizer::default())
            .filter(tantivy::tokenizer::LowerCaser)
            .build(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_schema_has_expected_fields() {
        let schema = build_record_schema();
        for name in [
            RecordFieldNames::ID,
            RecordFieldNames::CITY,
            RecordFieldNames::STREET,
            RecordFieldNames::HOUSE_NUMBER,
            RecordFieldNames::CITY_KEY,
            RecordFieldNames::STREET_KEY,
            RecordFieldNames::HOUSE_KEY,
            RecordFieldNames::LAT,
            RecordFieldNames::LON,
            RecordFieldNames::FULL_ADDRESS,
            RecordFieldNames::TAGS,
            RecordFieldNames::SEARCH_TEXT,
        ] {
            assert!(schema.get_field(name).is_ok(), "missing {name}");
        }
    }

    #[test]
    fn dictionary_fields_resolve_from_schema() {
        let schema = build_dictionary_schema();
        let fields = DictionaryFields::from_schema(&schema);
        assert_ne!(fields.key, fields.name_text);
        assert_ne!(fields.display_name, fields.usage_count);
    }

    #[test]
    fn record_fields_are_distinct() {
        let schema = build_record_schema();
        let fields = RecordFields::from_schema(&schema);
        assert_ne!(fields.city_key, fields.street_key);
        assert_ne!(fields.lat, fields.lon);
    }
}
