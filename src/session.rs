use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::model::{row_id, AbundanceMatrix, FeatureRow, SampleRow, SampleTable};
use crate::error::{RankScopeError, Result};

// ---------------------------------------------------------------------------
// Selection state
// ---------------------------------------------------------------------------

/// Which side of the log ratio the next single-mode pick lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickSide {
    Numerator,
    Denominator,
}

/// One single-mode selected feature: its identifier (used for
/// classification and text display) and, when the feature exists in the
/// abundance matrix, its internal column ID (used for abundance lookups).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFeature {
    pub id: String,
    pub col: Option<String>,
}

/// The current numerator/denominator selection.
///
/// Single mode holds one feature per side, overwritten alternately by
/// successive picks. Multi mode holds two ordered feature-ID sets that are
/// replaced wholesale by each new filter-derived selection; a feature may
/// appear in both sets.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Single {
        awaiting: PickSide,
        high: Option<SelectedFeature>,
        low: Option<SelectedFeature>,
    },
    Multi {
        top: Vec<String>,
        bottom: Vec<String>,
    },
}

impl Selection {
    fn empty_single() -> Self {
        Selection::Single {
            awaiting: PickSide::Numerator,
            high: None,
            low: None,
        }
    }
}

/// Render label describing a feature's relation to the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    None,
    Numerator,
    Denominator,
    Both,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Classification::None => "None",
            Classification::Numerator => "Numerator",
            Classification::Denominator => "Denominator",
            Classification::Both => "Both",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// RatioSession – selection state + per-sample balances
// ---------------------------------------------------------------------------

/// One visualization session: owns the selection state and computes
/// per-sample log ratios and per-feature classifications against the sample
/// table and abundance matrix it was created with.
///
/// All balance math shares one rule: a numerator or denominator abundance
/// (or abundance sum) of exactly 0 makes the balance NaN, never ±infinity.
#[derive(Debug, Clone)]
pub struct RatioSession {
    feature_id_field: String,
    samples: SampleTable,
    matrix: AbundanceMatrix,
    selection: Selection,
    top_display: String,
    bot_display: String,
}

impl RatioSession {
    /// Start a session. The initial selection is an empty single-mode
    /// selection awaiting its numerator.
    pub fn new(
        feature_id_field: impl Into<String>,
        samples: SampleTable,
        matrix: AbundanceMatrix,
    ) -> Self {
        RatioSession {
            feature_id_field: feature_id_field.into(),
            samples,
            matrix,
            selection: Selection::empty_single(),
            top_display: String::new(),
            bot_display: String::new(),
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn samples(&self) -> &SampleTable {
        &self.samples
    }

    /// Fails with [`RankScopeError::InvalidSampleID`] unless `id` names a
    /// sample in the sample table.
    pub fn validate_sample_id(&self, id: &str) -> Result<()> {
        if self.samples.contains(id) {
            Ok(())
        } else {
            Err(RankScopeError::InvalidSampleID(id.to_string()))
        }
    }

    fn sample_id_of<'a>(&self, sample_row: &'a SampleRow) -> Result<&'a str> {
        let id = row_id(sample_row, &self.samples.id_field).ok_or_else(|| {
            RankScopeError::InvalidSampleID(format!("<no {} field>", self.samples.id_field))
        })?;
        self.validate_sample_id(id)?;
        Ok(id)
    }

    // ---- selection operations ----

    /// Confirm a single-feature pick. The pick fills whichever side the
    /// session is awaiting (numerator first) and flips the awaited side, so
    /// alternating picks update the numerator and denominator in turn. Any
    /// active multi selection is discarded.
    pub fn select_single(&mut self, feature_id: impl Into<String>) {
        let id = feature_id.into();
        let picked = SelectedFeature {
            col: self.matrix.col_id(&id).map(String::from),
            id,
        };
        if !matches!(self.selection, Selection::Single { .. }) {
            self.selection = Selection::empty_single();
        }
        if let Selection::Single {
            awaiting,
            high,
            low,
        } = &mut self.selection
        {
            match awaiting {
                PickSide::Numerator => {
                    *high = Some(picked);
                    *awaiting = PickSide::Denominator;
                }
                PickSide::Denominator => {
                    *low = Some(picked);
                    *awaiting = PickSide::Numerator;
                }
            }
        }
    }

    /// Replace the selection with a multi-feature one: `top` becomes the
    /// numerator set and `bottom` the denominator set, wholesale.
    pub fn select_multi(&mut self, top: Vec<String>, bottom: Vec<String>) {
        self.selection = Selection::Multi { top, bottom };
    }

    /// Convenience: multi-select from two filter results, reading each row's
    /// feature identifier.
    pub fn select_multi_from_rows(&mut self, top: &[&FeatureRow], bottom: &[&FeatureRow]) {
        let id_field = self.feature_id_field.clone();
        let collect = |rows: &[&FeatureRow]| {
            rows.iter()
                .filter_map(|r| row_id(r, &id_field).map(String::from))
                .collect()
        };
        let top = collect(top);
        let bottom = collect(bottom);
        self.select_multi(top, bottom);
    }

    // ---- balances ----

    /// Log ratio of the single-mode high/low feature abundances for one
    /// sample. NaN when either abundance is 0 (or a side is unselected).
    pub fn update_balance_single(&self, sample_row: &SampleRow) -> Result<f64> {
        let sample_id = self.sample_id_of(sample_row)?;
        let (high, low) = match &self.selection {
            Selection::Single { high, low, .. } => (high.as_ref(), low.as_ref()),
            Selection::Multi { .. } => (None, None),
        };
        let lookup = |side: Option<&SelectedFeature>| {
            side.and_then(|f| f.col.as_deref())
                .map_or(0.0, |col| self.matrix.count(col, sample_id))
        };
        Ok(log_ratio(lookup(high), lookup(low)))
    }

    /// Log ratio of summed top/bottom abundances for one sample. Empty
    /// feature sets sum to 0 and therefore yield NaN.
    pub fn update_balance_multi(&self, sample_row: &SampleRow) -> Result<f64> {
        let (top, bottom) = match &self.selection {
            Selection::Multi { top, bottom } => (top.as_slice(), bottom.as_slice()),
            Selection::Single { .. } => (&[] as &[String], &[] as &[String]),
        };
        let top_sum = self.sum_abundances_for_sample_features(sample_row, top)?;
        let bot_sum = self.sum_abundances_for_sample_features(sample_row, bottom)?;
        Ok(log_ratio(top_sum, bot_sum))
    }

    /// Sum of matrix abundances over `feature_ids` for one sample. Unknown
    /// features contribute 0; an empty list sums to 0.
    pub fn sum_abundances_for_sample_features(
        &self,
        sample_row: &SampleRow,
        feature_ids: &[String],
    ) -> Result<f64> {
        let sample_id = self.sample_id_of(sample_row)?;
        Ok(feature_ids
            .iter()
            .map(|fid| self.matrix.count_for_feature(fid, sample_id))
            .sum())
    }

    // ---- classification ----

    /// Classify a feature row against the single-mode selection.
    pub fn update_rank_color_single(&self, feature_row: &FeatureRow) -> Classification {
        let fid = row_id(feature_row, &self.feature_id_field);
        let (high, low) = match &self.selection {
            Selection::Single { high, low, .. } => (high.as_ref(), low.as_ref()),
            Selection::Multi { .. } => (None, None),
        };
        let matches = |side: Option<&SelectedFeature>| {
            fid.map_or(false, |fid| side.map_or(false, |f| f.id == fid))
        };
        classify(matches(high), matches(low))
    }

    /// Classify a feature row against the multi-mode selection. Membership
    /// in both sets takes precedence over either single match.
    pub fn update_rank_color_multi(&self, feature_row: &FeatureRow) -> Classification {
        let fid = row_id(feature_row, &self.feature_id_field);
        let (top, bottom) = match &self.selection {
            Selection::Multi { top, bottom } => (top.as_slice(), bottom.as_slice()),
            Selection::Single { .. } => (&[] as &[String], &[] as &[String]),
        };
        let member =
            |set: &[String]| fid.map_or(false, |fid| set.iter().any(|id| id == fid));
        classify(member(top), member(bottom))
    }

    // ---- selection-text projection ----

    /// Refresh the top/bottom selection text from the current selection:
    /// single mode projects the one feature name per side, multi mode the
    /// newline-joined ID lists. `clear` empties both regardless of mode.
    pub fn update_feature_text_displays(&mut self, clear: bool) {
        if clear {
            self.top_display.clear();
            self.bot_display.clear();
            return;
        }
        match &self.selection {
            Selection::Single { high, low, .. } => {
                self.top_display = high.as_ref().map_or_else(String::new, |f| f.id.clone());
                self.bot_display = low.as_ref().map_or_else(String::new, |f| f.id.clone());
            }
            Selection::Multi { top, bottom } => {
                self.top_display = top.join("\n");
                self.bot_display = bottom.join("\n");
            }
        }
    }

    pub fn top_display(&self) -> &str {
        &self.top_display
    }

    pub fn bot_display(&self) -> &str {
        &self.bot_display
    }
}

/// ln(numerator / denominator), with 0 on either side meaning "undefined
/// ratio" (NaN) rather than ±infinity.
fn log_ratio(numerator: f64, denominator: f64) -> f64 {
    if numerator == 0.0 || denominator == 0.0 {
        f64::NAN
    } else {
        (numerator / denominator).ln()
    }
}

fn classify(in_numerator: bool, in_denominator: bool) -> Classification {
    match (in_numerator, in_denominator) {
        (true, true) => Classification::Both,
        (true, false) => Classification::Numerator,
        (false, true) => Classification::Denominator,
        (false, false) => Classification::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::FieldValue;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    /// Mirror of a small two-plot dataset: five taxa, six samples.
    fn matrix() -> AbundanceMatrix {
        let col_ids: HashMap<String, String> = [
            ("Taxon3|Yeet|100", "0"),
            ("Taxon4", "1"),
            ("Taxon5", "2"),
            ("Taxon1", "3"),
            ("Taxon2", "4"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let counts_for = |vals: [(&str, f64); 6]| -> HashMap<String, f64> {
            vals.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
        };
        let mut counts = HashMap::new();
        counts.insert(
            "0".to_string(),
            counts_for([
                ("Sample2", 3.0),
                ("Sample6", 3.0),
                ("Sample5", 4.0),
                ("Sample7", 2.0),
                ("Sample3", 4.0),
                ("Sample1", 2.0),
            ]),
        );
        counts.insert(
            "1".to_string(),
            counts_for([
                ("Sample2", 1.0),
                ("Sample6", 1.0),
                ("Sample5", 1.0),
                ("Sample7", 1.0),
                ("Sample3", 1.0),
                ("Sample1", 1.0),
            ]),
        );
        counts.insert(
            "2".to_string(),
            counts_for([
                ("Sample2", 0.0),
                ("Sample6", 0.0),
                ("Sample5", 2.0),
                ("Sample7", 0.0),
                ("Sample3", 1.0),
                ("Sample1", 0.0),
            ]),
        );
        counts.insert(
            "3".to_string(),
            counts_for([
                ("Sample2", 1.0),
                ("Sample6", 5.0),
                ("Sample5", 4.0),
                ("Sample7", 6.0),
                ("Sample3", 2.0),
                ("Sample1", 0.0),
            ]),
        );
        counts.insert(
            "4".to_string(),
            counts_for([
                ("Sample2", 5.0),
                ("Sample6", 1.0),
                ("Sample5", 2.0),
                ("Sample7", 0.0),
                ("Sample3", 4.0),
                ("Sample1", 6.0),
            ]),
        );
        AbundanceMatrix::new(col_ids, counts)
    }

    fn samples() -> SampleTable {
        let rows = ["Sample1", "Sample2", "Sample3", "Sample5", "Sample6", "Sample7"]
            .iter()
            .map(|id| {
                let mut row = SampleRow::new();
                row.insert("Sample ID".into(), FieldValue::Text(id.to_string()));
                row
            })
            .collect();
        SampleTable::new("Sample ID", rows)
    }

    fn session() -> RatioSession {
        RatioSession::new("Feature ID", samples(), matrix())
    }

    fn sample_row(id: &str) -> SampleRow {
        let mut row = SampleRow::new();
        row.insert("Sample ID".into(), FieldValue::Text(id.into()));
        row
    }

    fn feature_row(id: &str) -> FeatureRow {
        let mut row = FeatureRow::new();
        row.insert("Feature ID".into(), FieldValue::Text(id.into()));
        row
    }

    fn strings(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn new_session_awaits_a_numerator() {
        let s = session();
        assert!(matches!(
            s.selection(),
            Selection::Single {
                awaiting: PickSide::Numerator,
                high: None,
                low: None,
            }
        ));
    }

    #[test]
    fn validates_sample_ids() {
        let s = session();
        assert!(s.validate_sample_id("Sample2").is_ok());
        let err = s.validate_sample_id("SuperFakeSampleName").unwrap_err();
        assert!(matches!(err, RankScopeError::InvalidSampleID(ref id) if id == "SuperFakeSampleName"));
    }

    #[test]
    fn single_balance_is_the_log_ratio() {
        let mut s = session();
        s.select_single("Taxon3|Yeet|100");
        s.select_single("Taxon4");
        assert_relative_eq!(
            s.update_balance_single(&sample_row("Sample6")).unwrap(),
            3.0_f64.ln()
        );
        // flipping numerator and denominator negates the balance
        s.select_single("Taxon4");
        s.select_single("Taxon3|Yeet|100");
        assert_relative_eq!(
            s.update_balance_single(&sample_row("Sample6")).unwrap(),
            -(3.0_f64.ln())
        );
        s.select_single("Taxon1");
        s.select_single("Taxon2");
        assert_relative_eq!(
            s.update_balance_single(&sample_row("Sample5")).unwrap(),
            2.0_f64.ln()
        );
        s.select_single("Taxon2");
        s.select_single("Taxon1");
        assert_relative_eq!(
            s.update_balance_single(&sample_row("Sample5")).unwrap(),
            -(2.0_f64.ln())
        );
    }

    #[test]
    fn single_balance_is_nan_when_a_side_is_zero() {
        let mut s = session();
        // numerator abundance is 0 for Sample1
        s.select_single("Taxon1");
        s.select_single("Taxon2");
        assert!(s.update_balance_single(&sample_row("Sample1")).unwrap().is_nan());
        // both sides 0
        s.select_single("Taxon1");
        s.select_single("Taxon1");
        assert!(s.update_balance_single(&sample_row("Sample1")).unwrap().is_nan());
    }

    #[test]
    fn single_balance_rejects_unknown_samples() {
        let mut s = session();
        s.select_single("Taxon1");
        s.select_single("Taxon2");
        let err = s
            .update_balance_single(&sample_row("lolthisisntreal"))
            .unwrap_err();
        assert!(matches!(err, RankScopeError::InvalidSampleID(_)));
    }

    #[test]
    fn multi_balance_sums_each_side() {
        let mut s = session();
        s.select_multi(
            strings(&["Taxon1", "Taxon3|Yeet|100"]),
            strings(&["Taxon2", "Taxon4"]),
        );
        assert_relative_eq!(
            s.update_balance_multi(&sample_row("Sample1")).unwrap(),
            (2.0_f64 / 7.0).ln()
        );
        // one feature per side reduces to the single-feature ratio
        s.select_multi(strings(&["Taxon3|Yeet|100"]), strings(&["Taxon4"]));
        assert_relative_eq!(
            s.update_balance_multi(&sample_row("Sample1")).unwrap(),
            2.0_f64.ln()
        );
    }

    #[test]
    fn multi_balance_is_nan_for_empty_sides() {
        let mut s = session();
        s.select_multi(Vec::new(), Vec::new());
        assert!(s.update_balance_multi(&sample_row("Sample1")).unwrap().is_nan());
        s.select_multi(Vec::new(), strings(&["Taxon4"]));
        assert!(s.update_balance_multi(&sample_row("Sample1")).unwrap().is_nan());
        s.select_multi(strings(&["Taxon2"]), Vec::new());
        assert!(s.update_balance_multi(&sample_row("Sample1")).unwrap().is_nan());
    }

    #[test]
    fn multi_balance_rejects_unknown_samples() {
        let mut s = session();
        s.select_multi(strings(&["Taxon1"]), strings(&["Taxon2"]));
        let err = s
            .update_balance_multi(&sample_row("lolthisisntreal"))
            .unwrap_err();
        assert!(matches!(err, RankScopeError::InvalidSampleID(_)));
    }

    #[test]
    fn sums_abundances_over_feature_lists() {
        let s = session();
        assert_eq!(
            s.sum_abundances_for_sample_features(&sample_row("Sample1"), &strings(&["Taxon2"]))
                .unwrap(),
            6.0
        );
        assert_eq!(
            s.sum_abundances_for_sample_features(
                &sample_row("Sample1"),
                &strings(&["Taxon2", "Taxon4"])
            )
            .unwrap(),
            7.0
        );
        // Taxon1 contributes 0 in Sample1
        assert_eq!(
            s.sum_abundances_for_sample_features(
                &sample_row("Sample1"),
                &strings(&["Taxon2", "Taxon4", "Taxon1"])
            )
            .unwrap(),
            7.0
        );
        assert_eq!(
            s.sum_abundances_for_sample_features(
                &sample_row("Sample2"),
                &strings(&["Taxon2", "Taxon3|Yeet|100"])
            )
            .unwrap(),
            8.0
        );
    }

    #[test]
    fn empty_feature_list_sums_to_zero() {
        let s = session();
        assert_eq!(
            s.sum_abundances_for_sample_features(&sample_row("Sample3"), &[])
                .unwrap(),
            0.0
        );
    }

    #[test]
    fn sums_reject_unknown_samples() {
        let s = session();
        let err = s
            .sum_abundances_for_sample_features(&sample_row("lolthisisntreal"), &[])
            .unwrap_err();
        assert!(matches!(err, RankScopeError::InvalidSampleID(_)));
    }

    #[test]
    fn classifies_single_selections() {
        let mut s = session();
        s.select_single("FH");
        s.select_single("FL");
        assert_eq!(
            s.update_rank_color_single(&feature_row("FH")),
            Classification::Numerator
        );
        assert_eq!(
            s.update_rank_color_single(&feature_row("FL")),
            Classification::Denominator
        );
        assert_eq!(
            s.update_rank_color_single(&feature_row("FN")),
            Classification::None
        );
        // same feature on both sides
        s.select_single("FH");
        s.select_single("FH");
        assert_eq!(
            s.update_rank_color_single(&feature_row("FH")),
            Classification::Both
        );
    }

    #[test]
    fn classifies_multi_selections() {
        let mut s = session();
        s.select_multi(
            strings(&["Feature1", "Feature2", "Feature3"]),
            strings(&["Feature3", "Feature4"]),
        );
        assert_eq!(
            s.update_rank_color_multi(&feature_row("Feature1")),
            Classification::Numerator
        );
        assert_eq!(
            s.update_rank_color_multi(&feature_row("Feature4")),
            Classification::Denominator
        );
        assert_eq!(
            s.update_rank_color_multi(&feature_row("FeatureN")),
            Classification::None
        );
        assert_eq!(
            s.update_rank_color_multi(&feature_row("Feature3")),
            Classification::Both
        );
    }

    #[test]
    fn classification_labels_render() {
        assert_eq!(Classification::None.to_string(), "None");
        assert_eq!(Classification::Numerator.to_string(), "Numerator");
        assert_eq!(Classification::Denominator.to_string(), "Denominator");
        assert_eq!(Classification::Both.to_string(), "Both");
    }

    #[test]
    fn projects_single_selection_text() {
        let mut s = session();
        s.select_single("New feature name high");
        s.select_single("New feature name low");
        s.update_feature_text_displays(false);
        assert_eq!(s.top_display(), "New feature name high");
        assert_eq!(s.bot_display(), "New feature name low");
        // updating overwrites the previous values
        s.select_single("Thing 1!");
        s.select_single("Thing 2!");
        s.update_feature_text_displays(false);
        assert_eq!(s.top_display(), "Thing 1!");
        assert_eq!(s.bot_display(), "Thing 2!");
    }

    #[test]
    fn projects_multi_selection_text() {
        let mut s = session();
        s.select_multi(
            strings(&["abc", "def", "ghi", "lmno pqrs", "tuv"]),
            strings(&["asdf", "ghjk"]),
        );
        s.update_feature_text_displays(false);
        assert_eq!(s.top_display(), "abc\ndef\nghi\nlmno pqrs\ntuv");
        assert_eq!(s.bot_display(), "asdf\nghjk");

        s.select_multi(strings(&["onlyfeature"]), strings(&["asdf", "ghjk"]));
        s.update_feature_text_displays(false);
        assert_eq!(s.top_display(), "onlyfeature");
        assert_eq!(s.bot_display(), "asdf\nghjk");

        s.select_multi(Vec::new(), Vec::new());
        s.update_feature_text_displays(false);
        assert_eq!(s.top_display(), "");
        assert_eq!(s.bot_display(), "");
    }

    #[test]
    fn clear_empties_both_projections() {
        let mut s = session();
        s.select_single("Thing 1!");
        s.select_single("Thing 2!");
        s.update_feature_text_displays(false);
        assert_ne!(s.top_display(), "");
        s.update_feature_text_displays(true);
        assert_eq!(s.top_display(), "");
        assert_eq!(s.bot_display(), "");
    }

    #[test]
    fn picks_alternate_sides_indefinitely() {
        let mut s = session();
        s.select_single("A");
        assert!(matches!(
            s.selection(),
            Selection::Single { awaiting: PickSide::Denominator, .. }
        ));
        s.select_single("B");
        s.select_single("C");
        s.select_single("D");
        if let Selection::Single { high, low, .. } = s.selection() {
            assert_eq!(high.as_ref().unwrap().id, "C");
            assert_eq!(low.as_ref().unwrap().id, "D");
        } else {
            panic!("expected single selection");
        }
    }

    #[test]
    fn single_pick_replaces_a_multi_selection() {
        let mut s = session();
        s.select_multi(strings(&["Taxon1"]), strings(&["Taxon2"]));
        s.select_single("Taxon5");
        assert!(matches!(
            s.selection(),
            Selection::Single { awaiting: PickSide::Denominator, .. }
        ));
    }
}
