use thiserror::Error;

/// Fatal errors raised by the query and ratio engines.
///
/// These cover caller misuse (bad field names, bad mode/operator tokens,
/// unusable ranking columns, unknown sample IDs). A query that merely matches
/// nothing — empty search text, unparsable numeric input, unreadable field
/// values in individual rows — returns an empty result instead.
#[derive(Error, Debug)]
pub enum RankScopeError {
    #[error("feature field \"{0}\" not found in data")]
    FieldNotFound(String),

    #[error("unrecognized search type passed: {0}")]
    UnknownSearchType(String),

    #[error("unrecognized operator passed: {0}")]
    UnknownOperator(String),

    #[error("{0} ranking not present and/or numeric for all features")]
    RankingNotNumeric(String),

    #[error("invalid sample ID: {0}")]
    InvalidSampleID(String),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, RankScopeError>;
