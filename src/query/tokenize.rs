// ---------------------------------------------------------------------------
// Taxonomy tokenization
// ---------------------------------------------------------------------------

/// Split a taxonomy-like string into its ordered rank tokens.
///
/// Any run of semicolons, commas, or whitespace separates tokens; empty
/// tokens are discarded. Placeholder-looking ranks such as `__` are kept —
/// only literally empty tokens are dropped.
pub fn text_to_rank_array(text: &str) -> Vec<String> {
    text.split(|c: char| c == ';' || c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}
