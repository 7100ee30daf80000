/// Data layer: store abstraction, backends and label loading.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv          .h5 (feature "hdf5")
///        │                               │
///        ▼                               ▼
///   ┌──────────┐                   ┌───────────┐
///   │  loader   │  → InMemoryStore  │ Hdf5Store │  reads slices on demand
///   └──────────┘                   └───────────┘
///        │                               │
///        └───────────────┬───────────────┘
///                        ▼
///                ┌──────────────┐
///                │ WindowStore   │  index / index_absolute / index_window / features
///                └──────────────┘
/// ```

pub mod loader;
pub mod model;

#[cfg(feature = "hdf5")]
pub mod hdf5;
