use crate::data::model::FeatureRow;
use crate::error::{RankScopeError, Result};

// ---------------------------------------------------------------------------
// Extreme selection: top/bottom slices of the ranking order
// ---------------------------------------------------------------------------

/// Select the `count` highest- or lowest-ranked rows by `ranking_field`.
///
/// Every row must carry a finite numeric value for `ranking_field`, else
/// this fails with [`RankScopeError::RankingNotNumeric`]. Rows are
/// stable-sorted ascending by the ranking value (ties keep table order), and
/// the requested slice is taken from the high end (`top`) or the low end.
///
/// `floor(|count|)` rows are selected, clamped to the table size. A negative
/// `count` selects from the opposite end: top with `-k` returns what bottom
/// with `k` would. Callers are expected to have validated `count` as numeric
/// already; the percent-based search modes convert their percentage into a
/// (possibly fractional, sign-preserved) row count before calling this.
pub fn extreme_filter_features<'a>(
    rows: &'a [FeatureRow],
    count: f64,
    ranking_field: &str,
    top: bool,
) -> Result<Vec<&'a FeatureRow>> {
    let mut ranked: Vec<(f64, &FeatureRow)> = Vec::with_capacity(rows.len());
    for row in rows {
        let ranking = row
            .get(ranking_field)
            .and_then(|v| v.as_finite_f64())
            .ok_or_else(|| RankScopeError::RankingNotNumeric(ranking_field.to_string()))?;
        ranked.push((ranking, row));
    }
    // stable: equal rankings keep their original order
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n = ranked.len();
    let size = (count.abs().floor() as usize).min(n);
    let take_top = if count < 0.0 { !top } else { top };

    let slice = if take_top {
        &ranked[n - size..]
    } else {
        &ranked[..size]
    };
    Ok(slice.iter().map(|(_, row)| *row).collect())
}
