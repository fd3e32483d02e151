/// Data layer: core types, loading, schema mapping and queries.
///
/// Architecture:
/// ```text
///  .json / .csv / .parquet / .html / .ipynb
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → raw records
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  schema   │  column names → Field, tall/wide → Observation
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ CotTable  │  Vec<Observation>, market/date indices
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  bubble / series / extremes queries
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod schema;
