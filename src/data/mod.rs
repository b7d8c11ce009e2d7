/// Data layer: spectrum types, smoothing, file loading and results export.
///
/// Architecture:
/// ```text
///  device read / .csv / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → SampleGrid
///   └──────────┘
///        │
///        ▼
///   ┌──────────────────┐
///   │ SmoothedSpectrum  │  SampleGrid + Gaussian-smoothed intensities
///   └──────────────────┘
///        │
///        ▼  (pipeline)
///   ┌──────────┐
///   │  export   │  run series → one file per sheet
///   └──────────┘
/// ```

pub mod export;
pub mod loader;
pub mod model;
pub mod smoothing;
