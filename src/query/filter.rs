use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::model::{FeatureRow, FeatureTable, FieldValue};
use crate::error::{RankScopeError, Result};
use crate::query::extreme::extreme_filter_features;
use crate::query::tokenize::text_to_rank_array;

// ---------------------------------------------------------------------------
// Search modes
// ---------------------------------------------------------------------------

/// The fixed set of search modes understood by [`filter_features`].
///
/// Mode tokens are case-sensitive; anything else fails with
/// [`RankScopeError::UnknownSearchType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchType {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "nottext")]
    NotText,
    #[serde(rename = "or")]
    Or,
    #[serde(rename = "rank")]
    Rank,
    #[serde(rename = "lt")]
    Lt,
    #[serde(rename = "gt")]
    Gt,
    #[serde(rename = "lte")]
    Lte,
    #[serde(rename = "gte")]
    Gte,
    #[serde(rename = "autoLiteralTop")]
    AutoLiteralTop,
    #[serde(rename = "autoLiteralBot")]
    AutoLiteralBot,
    #[serde(rename = "autoPercentTop")]
    AutoPercentTop,
    #[serde(rename = "autoPercentBot")]
    AutoPercentBot,
}

impl SearchType {
    /// The canonical mode token, as accepted by [`filter_features`].
    pub fn token(&self) -> &'static str {
        match self {
            SearchType::Text => "text",
            SearchType::NotText => "nottext",
            SearchType::Or => "or",
            SearchType::Rank => "rank",
            SearchType::Lt => "lt",
            SearchType::Gt => "gt",
            SearchType::Lte => "lte",
            SearchType::Gte => "gte",
            SearchType::AutoLiteralTop => "autoLiteralTop",
            SearchType::AutoLiteralBot => "autoLiteralBot",
            SearchType::AutoPercentTop => "autoPercentTop",
            SearchType::AutoPercentBot => "autoPercentBot",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for SearchType {
    type Err = RankScopeError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "text" => SearchType::Text,
            "nottext" => SearchType::NotText,
            "or" => SearchType::Or,
            "rank" => SearchType::Rank,
            "lt" => SearchType::Lt,
            "gt" => SearchType::Gt,
            "lte" => SearchType::Lte,
            "gte" => SearchType::Gte,
            "autoLiteralTop" => SearchType::AutoLiteralTop,
            "autoLiteralBot" => SearchType::AutoLiteralBot,
            "autoPercentTop" => SearchType::AutoPercentTop,
            "autoPercentBot" => SearchType::AutoPercentBot,
            other => return Err(RankScopeError::UnknownSearchType(other.to_string())),
        })
    }
}

// ---------------------------------------------------------------------------
// filter_features – the main query entry point
// ---------------------------------------------------------------------------

/// Return the rows of `table` matching `input_text` on `field` under the
/// given search mode.
///
/// `field` must be the feature identifier field or one of the table's
/// declared ranking/metadata fields, and `search_type` must be a known mode
/// token; both are validated up front. Everything else that goes wrong —
/// empty query text, unparsable numeric input, rows whose field value can't
/// be read — silently shrinks the result instead of raising.
///
/// For all non-auto modes the result is a subsequence of the table in its
/// original row order. The auto-selection modes delegate to
/// [`extreme_filter_features`], whose result follows ranking order.
pub fn filter_features<'a>(
    table: &'a FeatureTable,
    input_text: &str,
    field: &str,
    search_type: &str,
) -> Result<Vec<&'a FeatureRow>> {
    if !table.is_known_field(field) {
        return Err(RankScopeError::FieldNotFound(field.to_string()));
    }
    let search_type: SearchType = search_type.parse()?;
    let rows = table.rows();

    match search_type {
        SearchType::Text => Ok(substring_filter(rows, input_text, field, false)),
        SearchType::NotText => Ok(substring_filter(rows, input_text, field, true)),
        SearchType::Or => Ok(or_filter(rows, input_text, field)),
        SearchType::Rank => Ok(rank_filter(rows, input_text, field)),
        SearchType::Lt | SearchType::Gt | SearchType::Lte | SearchType::Gte => {
            let threshold = match parse_finite(input_text) {
                Some(t) => t,
                None => return Ok(Vec::new()),
            };
            let compare = operator_to_compare_fn(search_type.token(), threshold)?;
            Ok(rows
                .iter()
                .filter(|row| {
                    row.get(field)
                        .and_then(FieldValue::as_finite_f64)
                        .map_or(false, &compare)
                })
                .collect())
        }
        SearchType::AutoLiteralTop
        | SearchType::AutoLiteralBot
        | SearchType::AutoPercentTop
        | SearchType::AutoPercentBot => {
            let requested = match parse_finite(input_text) {
                Some(r) => r,
                None => return Ok(Vec::new()),
            };
            let top = matches!(
                search_type,
                SearchType::AutoLiteralTop | SearchType::AutoPercentTop
            );
            let percent = matches!(
                search_type,
                SearchType::AutoPercentTop | SearchType::AutoPercentBot
            );
            // Percentages become a (sign-preserving, possibly fractional)
            // row count; flooring happens on the magnitude downstream.
            let count = if percent {
                let fraction = requested.abs().min(100.0) / 100.0;
                (fraction * rows.len() as f64).copysign(requested)
            } else {
                requested
            };
            extreme_filter_features(rows, count, field, top)
        }
    }
}

// ---------------------------------------------------------------------------
// Comparison-function factory
// ---------------------------------------------------------------------------

/// Build a threshold predicate from an operator token.
///
/// Only `lt`, `gt`, `lte`, `gte` are valid; anything else fails with
/// [`RankScopeError::UnknownOperator`].
pub fn operator_to_compare_fn(operator: &str, threshold: f64) -> Result<impl Fn(f64) -> bool> {
    #[derive(Clone, Copy)]
    enum Op {
        Lt,
        Gt,
        Lte,
        Gte,
    }
    let op = match operator {
        "lt" => Op::Lt,
        "gt" => Op::Gt,
        "lte" => Op::Lte,
        "gte" => Op::Gte,
        other => return Err(RankScopeError::UnknownOperator(other.to_string())),
    };
    Ok(move |value: f64| match op {
        Op::Lt => value < threshold,
        Op::Gt => value > threshold,
        Op::Lte => value <= threshold,
        Op::Gte => value >= threshold,
    })
}

/// True iff the two slices share at least one element.
pub fn exists_intersection<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.iter().any(|x| b.contains(x))
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

/// Empty or all-whitespace query text means "no search", with one exception:
/// a lone space is a legitimate one-character search term.
fn has_search_term(input_text: &str) -> bool {
    input_text == " " || !input_text.trim().is_empty()
}

fn parse_finite(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn substring_filter<'a>(
    rows: &'a [FeatureRow],
    input_text: &str,
    field: &str,
    negate: bool,
) -> Vec<&'a FeatureRow> {
    if !has_search_term(input_text) {
        return Vec::new();
    }
    let needle = input_text.to_lowercase();
    rows.iter()
        .filter(|row| {
            row.get(field)
                .and_then(FieldValue::searchable_text)
                .map_or(false, |haystack| haystack.contains(&needle) != negate)
        })
        .collect()
}

fn or_filter<'a>(rows: &'a [FeatureRow], input_text: &str, field: &str) -> Vec<&'a FeatureRow> {
    let terms: Vec<String> = input_text
        .split('|')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();
    if terms.is_empty() {
        return Vec::new();
    }
    rows.iter()
        .filter(|row| {
            row.get(field)
                .and_then(FieldValue::searchable_text)
                .map_or(false, |haystack| {
                    terms.iter().any(|term| haystack.contains(term))
                })
        })
        .collect()
}

fn rank_filter<'a>(rows: &'a [FeatureRow], input_text: &str, field: &str) -> Vec<&'a FeatureRow> {
    let query_ranks = text_to_rank_array(&input_text.to_lowercase());
    if query_ranks.is_empty() {
        return Vec::new();
    }
    rows.iter()
        .filter(|row| {
            row.get(field)
                .and_then(FieldValue::searchable_text)
                .map_or(false, |text| {
                    exists_intersection(&text_to_rank_array(&text), &query_ranks)
                })
        })
        .collect()
}
