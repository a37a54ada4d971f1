use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value as JsonValue;

use super::model::{
    row_id, AbundanceMatrix, FeatureRow, FeatureTable, FieldValue, SampleRow, SampleTable,
};

/// Field naming conventions of the upstream pipeline's dataset JSON.
pub const FEATURE_ID_FIELD: &str = "Feature ID";
pub const SAMPLE_ID_FIELD: &str = "Sample ID";

const RANK_ORDERING_KEY: &str = "rankscope_rank_ordering";
const FEATURE_METADATA_ORDERING_KEY: &str = "rankscope_feature_metadata_ordering";
const FEATURE_COL_IDS_KEY: &str = "rankscope_feature_col_ids";
const FEATURE_COUNTS_KEY: &str = "rankscope_feature_counts";

// ---------------------------------------------------------------------------
// Dataset JSON – what the upstream pipeline embeds for the two plots
// ---------------------------------------------------------------------------

/// Load the feature ranking table from a rank-plot dataset JSON file.
///
/// Expected shape (only the dataset portion of the plot spec is read):
///
/// ```json
/// {
///   "data": { "name": "data-xyz" },
///   "datasets": {
///     "data-xyz": [ { "Feature ID": "...", "Rank 0": 1.5, ... }, ... ],
///     "rankscope_rank_ordering": ["Rank 0", ...],
///     "rankscope_feature_metadata_ordering": ["Taxonomy", ...]
///   }
/// }
/// ```
pub fn load_rank_plot(path: &Path) -> Result<FeatureTable> {
    let text = std::fs::read_to_string(path).context("reading rank plot JSON file")?;
    let spec: JsonValue = serde_json::from_str(&text).context("parsing rank plot JSON")?;
    parse_rank_plot(&spec)
}

/// Parse an already-deserialized rank-plot spec. See [`load_rank_plot`].
pub fn parse_rank_plot(spec: &JsonValue) -> Result<FeatureTable> {
    let (rows_json, datasets) = active_dataset(spec)?;

    let mut rows = Vec::with_capacity(rows_json.len());
    for (i, rec) in rows_json.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Feature row {i} is not a JSON object"))?;
        let mut row = FeatureRow::new();
        for (key, val) in obj {
            row.insert(key.clone(), json_to_field_value(val));
        }
        rows.push(row);
    }

    let ranking_fields = string_list(datasets, RANK_ORDERING_KEY)?;
    let metadata_fields = string_list(datasets, FEATURE_METADATA_ORDERING_KEY)?;

    log::info!(
        "loaded {} features ({} ranking fields, {} metadata fields)",
        rows.len(),
        ranking_fields.len(),
        metadata_fields.len()
    );
    Ok(FeatureTable::new(
        FEATURE_ID_FIELD,
        rows,
        ranking_fields,
        metadata_fields,
    ))
}

/// Load the sample metadata table and the abundance matrix from a
/// sample-plot dataset JSON file.
///
/// Expected dataset keys: the active dataset (sample metadata rows),
/// `rankscope_feature_col_ids` (feature ID → column ID), and
/// `rankscope_feature_counts` (column ID → sample ID → abundance).
pub fn load_sample_plot(path: &Path) -> Result<(SampleTable, AbundanceMatrix)> {
    let text = std::fs::read_to_string(path).context("reading sample plot JSON file")?;
    let spec: JsonValue = serde_json::from_str(&text).context("parsing sample plot JSON")?;
    parse_sample_plot(&spec)
}

/// Parse an already-deserialized sample-plot spec. See [`load_sample_plot`].
pub fn parse_sample_plot(spec: &JsonValue) -> Result<(SampleTable, AbundanceMatrix)> {
    let (rows_json, datasets) = active_dataset(spec)?;

    let mut rows = Vec::with_capacity(rows_json.len());
    for (i, rec) in rows_json.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Sample row {i} is not a JSON object"))?;
        let mut row = SampleRow::new();
        for (key, val) in obj {
            row.insert(key.clone(), json_to_field_value(val));
        }
        rows.push(row);
    }

    let col_ids_json = datasets
        .get(FEATURE_COL_IDS_KEY)
        .and_then(|v| v.as_object())
        .with_context(|| format!("Missing or invalid '{FEATURE_COL_IDS_KEY}' mapping"))?;
    let mut col_ids = HashMap::with_capacity(col_ids_json.len());
    for (feature_id, col) in col_ids_json {
        let col = col
            .as_str()
            .with_context(|| format!("Column ID for feature '{feature_id}' is not a string"))?;
        col_ids.insert(feature_id.clone(), col.to_string());
    }

    let counts_json = datasets
        .get(FEATURE_COUNTS_KEY)
        .and_then(|v| v.as_object())
        .with_context(|| format!("Missing or invalid '{FEATURE_COUNTS_KEY}' mapping"))?;
    let mut counts = HashMap::with_capacity(counts_json.len());
    for (col, per_sample_json) in counts_json {
        let per_sample_json = per_sample_json
            .as_object()
            .with_context(|| format!("Counts for column '{col}' are not an object"))?;
        let mut per_sample = HashMap::with_capacity(per_sample_json.len());
        for (sample_id, count) in per_sample_json {
            let count = count.as_f64().with_context(|| {
                format!("Count for column '{col}', sample '{sample_id}' is not a number")
            })?;
            per_sample.insert(sample_id.clone(), count);
        }
        counts.insert(col.clone(), per_sample);
    }

    log::info!(
        "loaded {} samples and a {}-feature abundance matrix",
        rows.len(),
        col_ids.len()
    );
    Ok((
        SampleTable::new(SAMPLE_ID_FIELD, rows),
        AbundanceMatrix::new(col_ids, counts),
    ))
}

/// Resolve `spec.data.name` and return the active dataset's row array along
/// with the full dataset map.
fn active_dataset(
    spec: &JsonValue,
) -> Result<(&Vec<JsonValue>, &serde_json::Map<String, JsonValue>)> {
    let name = spec
        .get("data")
        .and_then(|d| d.get("name"))
        .and_then(|n| n.as_str())
        .context("Missing 'data.name' in dataset JSON")?;
    let datasets = spec
        .get("datasets")
        .and_then(|d| d.as_object())
        .context("Missing 'datasets' object in dataset JSON")?;
    let rows = datasets
        .get(name)
        .and_then(|r| r.as_array())
        .with_context(|| format!("Dataset '{name}' missing or not an array"))?;
    Ok((rows, datasets))
}

fn string_list(datasets: &serde_json::Map<String, JsonValue>, key: &str) -> Result<Vec<String>> {
    let list = datasets
        .get(key)
        .and_then(|v| v.as_array())
        .with_context(|| format!("Missing or invalid '{key}' list"))?;
    list.iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_str()
                .map(String::from)
                .with_context(|| format!("'{key}'[{i}] is not a string"))
        })
        .collect()
}

/// Classify a JSON value once at ingestion. Booleans, nulls, and nested
/// structures are unusable for searching, matching the engine's value model.
fn json_to_field_value(val: &JsonValue) -> FieldValue {
    match val {
        JsonValue::String(s) => FieldValue::Text(s.clone()),
        JsonValue::Number(n) => n.as_f64().map_or(FieldValue::Unusable, FieldValue::Number),
        _ => FieldValue::Unusable,
    }
}

// ---------------------------------------------------------------------------
// TSV tables – ranks, metadata, and counts as produced by upstream tools
// ---------------------------------------------------------------------------

/// Load a feature ranks TSV: header `feature-id<TAB>rank...`, one feature
/// per row, every rank cell numeric. All non-ID columns become ranking
/// fields.
pub fn load_feature_ranks_tsv(path: &Path) -> Result<FeatureTable> {
    let file = std::fs::File::open(path).context("opening feature ranks TSV")?;
    read_feature_ranks_tsv(file)
}

/// See [`load_feature_ranks_tsv`].
pub fn read_feature_ranks_tsv<R: Read>(reader: R) -> Result<FeatureTable> {
    let mut reader = tsv_reader(reader);
    let headers = header_row(&mut reader)?;
    if headers.is_empty() {
        bail!("Feature ranks TSV has no columns");
    }
    let ranking_fields: Vec<String> = headers[1..].to_vec();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Feature ranks TSV row {row_no}"))?;
        let feature_id = record.get(0).unwrap_or("").to_string();
        let mut row = FeatureRow::new();
        row.insert(FEATURE_ID_FIELD.to_string(), FieldValue::Text(feature_id));
        for (col_idx, field) in ranking_fields.iter().enumerate() {
            let cell = record.get(col_idx + 1).unwrap_or("");
            let value: f64 = cell.trim().parse().with_context(|| {
                format!("Row {row_no}, ranking '{field}': '{cell}' is not a number")
            })?;
            row.insert(field.clone(), FieldValue::Number(value));
        }
        rows.push(row);
    }
    Ok(FeatureTable::new(
        FEATURE_ID_FIELD,
        rows,
        ranking_fields,
        Vec::new(),
    ))
}

/// Merge a feature metadata TSV (header `feature-id<TAB>field...`) into an
/// existing table by feature ID. New columns are appended to the table's
/// declared metadata fields; metadata rows whose ID matches no feature are
/// skipped with a warning, and features without metadata keep their rows
/// unchanged (their new fields stay absent, i.e. unusable for search).
pub fn attach_feature_metadata<R: Read>(table: &mut FeatureTable, reader: R) -> Result<()> {
    let mut reader = tsv_reader(reader);
    let headers = header_row(&mut reader)?;
    if headers.len() < 2 {
        bail!("Feature metadata TSV needs an ID column and at least one field");
    }
    let fields: Vec<String> = headers[1..].to_vec();

    let mut by_id: HashMap<String, Vec<FieldValue>> = HashMap::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Feature metadata TSV row {row_no}"))?;
        let feature_id = record.get(0).unwrap_or("").to_string();
        let values = (1..headers.len())
            .map(|i| guess_field_value(record.get(i).unwrap_or("")))
            .collect();
        by_id.insert(feature_id, values);
    }

    let id_field = table.id_field.clone();
    let mut matched = 0usize;
    for row in table.rows_mut().iter_mut() {
        let Some(values) = row_id(row, &id_field).and_then(|id| by_id.remove(id)) else {
            continue;
        };
        matched += 1;
        for (field, value) in fields.iter().zip(values) {
            row.insert(field.clone(), value);
        }
    }
    if !by_id.is_empty() {
        log::warn!(
            "{} feature metadata row(s) matched no feature in the table",
            by_id.len()
        );
    }
    log::info!("attached {} metadata field(s) to {matched} feature(s)", fields.len());

    for field in fields {
        if !table.metadata_fields.contains(&field) {
            table.metadata_fields.push(field);
        }
    }
    Ok(())
}

/// Load a sample metadata TSV: header `sample-id<TAB>field...`, one sample
/// per row. Cell types are guessed (empty → unusable, numeric → number,
/// anything else → text).
pub fn load_sample_metadata_tsv(path: &Path) -> Result<SampleTable> {
    let file = std::fs::File::open(path).context("opening sample metadata TSV")?;
    read_sample_metadata_tsv(file)
}

/// See [`load_sample_metadata_tsv`].
pub fn read_sample_metadata_tsv<R: Read>(reader: R) -> Result<SampleTable> {
    let mut reader = tsv_reader(reader);
    let headers = header_row(&mut reader)?;
    if headers.is_empty() {
        bail!("Sample metadata TSV has no columns");
    }

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Sample metadata TSV row {row_no}"))?;
        let mut row = SampleRow::new();
        row.insert(
            SAMPLE_ID_FIELD.to_string(),
            FieldValue::Text(record.get(0).unwrap_or("").to_string()),
        );
        for (col_idx, field) in headers.iter().enumerate().skip(1) {
            row.insert(field.clone(), guess_field_value(record.get(col_idx).unwrap_or("")));
        }
        rows.push(row);
    }
    Ok(SampleTable::new(SAMPLE_ID_FIELD, rows))
}

/// Load a count table TSV (features × samples: header
/// `feature-id<TAB>sample...`, one feature per row) into an abundance
/// matrix. Internal column IDs are assigned from the feature order.
pub fn load_feature_counts_tsv(path: &Path) -> Result<AbundanceMatrix> {
    let file = std::fs::File::open(path).context("opening feature counts TSV")?;
    read_feature_counts_tsv(file)
}

/// See [`load_feature_counts_tsv`].
pub fn read_feature_counts_tsv<R: Read>(reader: R) -> Result<AbundanceMatrix> {
    let mut reader = tsv_reader(reader);
    let headers = header_row(&mut reader)?;
    if headers.len() < 2 {
        bail!("Count TSV needs an ID column and at least one sample");
    }
    let sample_ids: Vec<String> = headers[1..].to_vec();

    let mut col_ids = HashMap::new();
    let mut counts = HashMap::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Count TSV row {row_no}"))?;
        let feature_id = record.get(0).unwrap_or("").to_string();
        let col = row_no.to_string();

        let mut per_sample = HashMap::with_capacity(sample_ids.len());
        for (col_idx, sample_id) in sample_ids.iter().enumerate() {
            let cell = record.get(col_idx + 1).unwrap_or("");
            let value: f64 = cell.trim().parse().with_context(|| {
                format!("Row {row_no}, sample '{sample_id}': '{cell}' is not a number")
            })?;
            per_sample.insert(sample_id.clone(), value);
        }
        col_ids.insert(feature_id, col.clone());
        counts.insert(col, per_sample);
    }
    log::info!(
        "loaded counts for {} features across {} samples",
        col_ids.len(),
        sample_ids.len()
    );
    Ok(AbundanceMatrix::new(col_ids, counts))
}

// -- TSV helpers --

fn tsv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(reader)
}

fn header_row<R: Read>(reader: &mut csv::Reader<R>) -> Result<Vec<String>> {
    Ok(reader
        .headers()
        .context("reading TSV header")?
        .iter()
        .map(|h| h.to_string())
        .collect())
}

/// Guess a TSV cell's type: empty cells are unusable, numeric cells become
/// numbers, everything else stays text.
fn guess_field_value(s: &str) -> FieldValue {
    if s.is_empty() {
        return FieldValue::Unusable;
    }
    if let Ok(f) = s.parse::<f64>() {
        return FieldValue::Number(f);
    }
    FieldValue::Text(s.to_string())
}
