/// Query layer: the feature search/filter engine.
///
/// [`filter::filter_features`] is the entry point; it validates the field
/// name and mode token, then dispatches to substring/or/rank matching,
/// numeric threshold comparison, or ranking-based extreme selection
/// ([`extreme::extreme_filter_features`]). Taxonomy-style strings are split
/// into exact-match rank tokens by [`tokenize::text_to_rank_array`].
pub mod extreme;
pub mod filter;
pub mod tokenize;
