//! Feature-ranking query engine and per-sample log-ratio explorer.
//!
//! Given a ranked feature table (e.g. ranked biological taxa), a sample
//! table, and an abundance matrix, this crate lets a caller interactively
//! isolate feature subsets — by substring, exact taxonomic rank, numeric
//! threshold, or "top/bottom N (%)" of a ranking — and treat the chosen
//! subsets as the numerator and denominator of a per-sample natural-log
//! ratio for exploratory visualization.
//!
//! The typical flow:
//!
//! 1. Ingest tables with [`data::loader`] (dataset JSON or TSV files).
//! 2. Query the feature table with [`query::filter::filter_features`].
//! 3. Promote matches into a [`session::RatioSession`] selection.
//! 4. Read per-sample balances and per-feature [`session::Classification`]
//!    labels back out for rendering.
//!
//! Rendering, event wiring, and the upstream pipeline that produces the
//! tables are deliberately out of scope; this crate only computes.

pub mod data;
pub mod error;
pub mod query;
pub mod session;

pub use data::model::{
    AbundanceMatrix, FeatureRow, FeatureTable, FieldValue, SampleRow, SampleTable,
};
pub use error::{RankScopeError, Result};
pub use query::extreme::extreme_filter_features;
pub use query::filter::{
    exists_intersection, filter_features, operator_to_compare_fn, SearchType,
};
pub use query::tokenize::text_to_rank_array;
pub use session::{Classification, PickSide, RatioSession, SelectedFeature, Selection};
