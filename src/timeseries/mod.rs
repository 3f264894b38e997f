//! Time series feature engineering
//!
//! Turns hourly readings into the feature table used for training:
//! - Calendar fields derived from each timestamp
//! - Lag values and trailing-window statistics
//! - Null-completion filtering of rows without full history
//! - Parquet persistence of the resulting table
//! - Chronological hold-out split

pub mod calendar;
pub mod filter;
pub mod pipeline;
pub mod reading;
pub mod table;
pub mod validation;
pub mod window;

pub use calendar::{format_timestamp, parse_timestamp, CalendarFeatures, TIMESTAMP_FORMAT};
pub use filter::{complete_rows, FeatureRecord, FeatureRow};
pub use pipeline::{sort_by_timestamp, FeatureConfig, FeaturePipeline, StreamingFeatures};
pub use reading::{Reading, ReadingColumns};
pub use table::{feature_columns, FeatureTable, TARGET_COLUMN, TIMESTAMP_COLUMN};
pub use validation::{holdout_split, HoldoutSplit};
pub use window::{WindowAccumulator, WindowConfig, WindowedStatistics, WindowedValues};
