/// Data layer: core table types and ingestion.
///
/// Architecture:
/// ```text
///  dataset .json / .tsv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse files → tables + abundance matrix
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ FeatureTable  │  Vec<FeatureRow>, declared ranking/metadata fields
///   │ SampleTable   │  Vec<SampleRow>, sample ID index
///   │ AbundanceMatrix│ feature column → per-sample counts
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  query    │  search/filter the feature rows (see crate::query)
///   └──────────┘
/// ```
pub mod loader;
pub mod model;
