/// Data layer: core types, compensation table, capture files and report.
///
/// Architecture:
/// ```text
///  capture .parquet / .json / .csv        ext_att_compensation.csv
///        │                                        │
///        ▼                                        ▼
///   ┌──────────┐                          ┌──────────────┐
///   │  loader   │  file → Vec<Capture>    │ compensation │  interpolate / merge
///   └──────────┘                          └──────────────┘
///        │                                        │
///        ▼                                        ▼
///   ┌──────────┐      ┌──────────┐        ┌──────────────┐
///   │  model    │ ───▶ │  filter   │ ────▶ │    report    │  append rows
///   └──────────┘      └──────────┘        └──────────────┘
///   Sweep / Peak      carrier vs spur      peak_report.csv
/// ```

pub mod compensation;
pub mod filter;
pub mod loader;
pub mod model;
pub mod report;
