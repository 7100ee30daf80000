//! Subject lookup and timeline reconstruction for windowed physiological
//! signals (sleep recordings split into 30-second windows).
//!
//! A store holds every subject's windows concatenated row after row. The
//! accessor functions find the rows of one subject, return its per-window
//! sample blocks, or stitch them into one time-indexed series.
//!
//! # Example
//!
//! ```
//! use sleep_windows::{accessor, FrequencyTable, InMemoryStore};
//!
//! let store = InMemoryStore::new(vec![1, 1, 2, 2, 2], vec![0, 1, 2, 3, 4], vec![0, 1, 0, 1, 2])
//!     .unwrap()
//!     .with_feature("pulse", vec![vec![0.0; 300]; 5])
//!     .unwrap();
//! let frequencies: FrequencyTable = [("pulse", 10)].into_iter().collect();
//!
//! let rows = accessor::get_subject_boundaries(&store, 2, true).unwrap();
//! assert_eq!(rows.as_range(), 2..5);
//!
//! let series =
//!     accessor::get_subject_feature_timeseries(&store, &frequencies, 2, "pulse").unwrap();
//! assert_eq!(series.len(), 10 * 30 * 3);
//! ```

pub mod accessor;
pub mod config;
pub mod console;
pub mod data;
pub mod error;
pub mod timeline;

pub use accessor::Boundaries;
pub use config::{Config, FrequencyTable};
pub use data::model::{
    FeatureSignals, InMemoryStore, LabelTable, SleepStage, TimeSeries, WindowStore,
};
pub use error::{AccessError, Result};
