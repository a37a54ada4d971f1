use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

// ---------------------------------------------------------------------------
// FieldValue – a single cell in a feature/sample table
// ---------------------------------------------------------------------------

/// A dynamically-typed table cell, classified once at ingestion.
///
/// Anything that is not text or a number (nulls, booleans, nested
/// arrays/objects in the source data) is `Unusable`: such cells are skipped
/// by text and numeric matching rather than treated as empty strings.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Unusable,
}

impl FieldValue {
    /// Normalize the value into searchable text: strings are lower-cased
    /// (and otherwise unchanged), numbers become their decimal string form.
    /// Returns `None` for unusable values.
    pub fn searchable_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s.to_lowercase()),
            FieldValue::Number(n) => Some(format!("{n}")),
            FieldValue::Unusable => None,
        }
    }

    /// Interpret the value as a finite number, if possible. Numeric strings
    /// count; infinities and NaN do not.
    pub fn as_finite_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) if n.is_finite() => Some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Unusable => write!(f, "<unusable>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Rows – one feature or sample, as an ordered field_name → value map
// ---------------------------------------------------------------------------

/// One row of the feature ranking table.
pub type FeatureRow = BTreeMap<String, FieldValue>;

/// One row of the sample metadata table.
pub type SampleRow = BTreeMap<String, FieldValue>;

/// Read a row's identifier field as text. Identifiers are always textual;
/// a missing or non-text identifier yields `None`.
pub fn row_id<'a>(row: &'a BTreeMap<String, FieldValue>, id_field: &str) -> Option<&'a str> {
    match row.get(id_field) {
        Some(FieldValue::Text(s)) => Some(s.as_str()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// FeatureTable – the ranked feature table plus its declared field sets
// ---------------------------------------------------------------------------

/// The feature ranking table: an ordered row sequence plus the two declared
/// field lists that define which names are valid for numeric (ranking) and
/// free-text (metadata) operations. Field lookup is exact-match and
/// case-sensitive.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    /// Name of the feature identifier field.
    pub id_field: String,
    /// All feature rows, in original insertion order.
    rows: Vec<FeatureRow>,
    /// Declared numeric ranking fields, in display order.
    pub ranking_fields: Vec<String>,
    /// Declared free-text metadata fields, in display order.
    pub metadata_fields: Vec<String>,
}

impl FeatureTable {
    pub fn new(
        id_field: impl Into<String>,
        rows: Vec<FeatureRow>,
        ranking_fields: Vec<String>,
        metadata_fields: Vec<String>,
    ) -> Self {
        FeatureTable {
            id_field: id_field.into(),
            rows,
            ranking_fields,
            metadata_fields,
        }
    }

    /// All rows, in original order.
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<FeatureRow> {
        &mut self.rows
    }

    /// Whether `field` is the identifier field or one of the declared
    /// ranking/metadata fields.
    pub fn is_known_field(&self, field: &str) -> bool {
        field == self.id_field
            || self.ranking_fields.iter().any(|f| f == field)
            || self.metadata_fields.iter().any(|f| f == field)
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// SampleTable – sample metadata with a precomputed ID set
// ---------------------------------------------------------------------------

/// The sample metadata table. Keeps a set of known sample IDs so that
/// ratio operations can validate IDs in O(1).
#[derive(Debug, Clone)]
pub struct SampleTable {
    /// Name of the sample identifier field.
    pub id_field: String,
    rows: Vec<SampleRow>,
    ids: HashSet<String>,
}

impl SampleTable {
    /// Build the table and its ID index from loaded rows.
    pub fn new(id_field: impl Into<String>, rows: Vec<SampleRow>) -> Self {
        let id_field = id_field.into();
        let ids = rows
            .iter()
            .filter_map(|r| row_id(r, &id_field).map(String::from))
            .collect();
        SampleTable {
            id_field,
            rows,
            ids,
        }
    }

    pub fn rows(&self) -> &[SampleRow] {
        &self.rows
    }

    /// Whether `id` names a sample in this table.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// AbundanceMatrix – per-feature, per-sample abundances
// ---------------------------------------------------------------------------

/// Feature abundances keyed by an internal column ID per feature, then by
/// sample ID. The matrix is produced externally and only read here; lookups
/// absent from it are 0 rather than errors.
#[derive(Debug, Clone, Default)]
pub struct AbundanceMatrix {
    /// feature ID → internal column ID.
    col_ids: HashMap<String, String>,
    /// column ID → (sample ID → abundance).
    counts: HashMap<String, HashMap<String, f64>>,
}

impl AbundanceMatrix {
    pub fn new(
        col_ids: HashMap<String, String>,
        counts: HashMap<String, HashMap<String, f64>>,
    ) -> Self {
        AbundanceMatrix { col_ids, counts }
    }

    /// Internal column ID for a feature, if the feature is in the matrix.
    pub fn col_id(&self, feature_id: &str) -> Option<&str> {
        self.col_ids.get(feature_id).map(String::as_str)
    }

    /// Abundance for a column/sample pair; 0 when either is absent.
    pub fn count(&self, col_id: &str, sample_id: &str) -> f64 {
        self.counts
            .get(col_id)
            .and_then(|per_sample| per_sample.get(sample_id))
            .copied()
            .unwrap_or(0.0)
    }

    /// Abundance for a feature/sample pair; 0 when the feature is unknown.
    pub fn count_for_feature(&self, feature_id: &str, sample_id: &str) -> f64 {
        match self.col_id(feature_id) {
            Some(col) => self.count(col, sample_id),
            None => 0.0,
        }
    }

    /// Number of feature columns.
    pub fn n_features(&self) -> usize {
        self.col_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn searchable_text_lowercases_strings() {
        assert_eq!(
            FieldValue::Text("abc".into()).searchable_text(),
            Some("abc".into())
        );
        assert_eq!(
            FieldValue::Text("AbC".into()).searchable_text(),
            Some("abc".into())
        );
        assert_eq!(
            FieldValue::Text("   Viruses   ".into()).searchable_text(),
            Some("   viruses   ".into())
        );
        assert_eq!(
            FieldValue::Text("null".into()).searchable_text(),
            Some("null".into())
        );
    }

    #[test]
    fn searchable_text_converts_numbers() {
        assert_eq!(
            FieldValue::Number(3.14).searchable_text(),
            Some("3.14".into())
        );
        assert_eq!(FieldValue::Number(5.0).searchable_text(), Some("5".into()));
    }

    #[test]
    fn searchable_text_rejects_unusable() {
        assert_eq!(FieldValue::Unusable.searchable_text(), None);
    }

    #[test]
    fn as_finite_f64_accepts_numeric_strings() {
        assert_eq!(FieldValue::Number(2.5).as_finite_f64(), Some(2.5));
        assert_eq!(FieldValue::Text("0".into()).as_finite_f64(), Some(0.0));
        assert_eq!(FieldValue::Text(" 4.5 ".into()).as_finite_f64(), Some(4.5));
    }

    #[test]
    fn as_finite_f64_rejects_non_finite() {
        assert_eq!(FieldValue::Number(f64::NAN).as_finite_f64(), None);
        assert_eq!(FieldValue::Number(f64::INFINITY).as_finite_f64(), None);
        assert_eq!(FieldValue::Text("Infinity".into()).as_finite_f64(), None);
        assert_eq!(FieldValue::Text("asdf".into()).as_finite_f64(), None);
        assert_eq!(FieldValue::Unusable.as_finite_f64(), None);
    }

    #[test]
    fn feature_table_knows_its_fields() {
        let table = FeatureTable::new(
            "Feature ID",
            Vec::new(),
            vec!["Rank 0".into()],
            vec!["Taxonomy".into()],
        );
        assert!(table.is_known_field("Feature ID"));
        assert!(table.is_known_field("Rank 0"));
        assert!(table.is_known_field("Taxonomy"));
        // exact-match: case and whitespace matter
        assert!(!table.is_known_field("feature id"));
        assert!(!table.is_known_field("FeatureID"));
        assert!(!table.is_known_field("rank 0"));
    }

    #[test]
    fn abundance_matrix_defaults_to_zero() {
        let mut col_ids = HashMap::new();
        col_ids.insert("TaxonA".to_string(), "0".to_string());
        let mut counts = HashMap::new();
        let mut per_sample = HashMap::new();
        per_sample.insert("S1".to_string(), 7.0);
        counts.insert("0".to_string(), per_sample);
        let matrix = AbundanceMatrix::new(col_ids, counts);

        assert_eq!(matrix.count_for_feature("TaxonA", "S1"), 7.0);
        assert_eq!(matrix.count_for_feature("TaxonA", "S2"), 0.0);
        assert_eq!(matrix.count_for_feature("TaxonB", "S1"), 0.0);
        assert_eq!(matrix.count("1", "S1"), 0.0);
    }
}
