//! Longitudinal comparison of laboratory markers.
//!
//! Raw readings are canonicalized, grouped into per-marker series, and compared
//! oldest-to-latest. The result is offered either as ranked cards for on-screen
//! display ([`view`]) or as a complete aggregate for a printable report
//! ([`report`]). Nothing here performs I/O except the providers and the config
//! and table loaders.

pub mod canonical;
pub mod comparator;
pub mod config;
pub mod dates;
pub mod error;
pub mod lookback;
pub mod model;
pub mod provider_csv;
pub mod provider_json;
pub mod report;
pub mod series;
pub mod trend;
pub mod view;

pub use canonical::{CanonicalTable, Canonicalizer, CategoryRules};
pub use comparator::{ComparisonRequest, TrendComparator};
pub use config::ComparatorConfig;
pub use error::{ComparatorError, Result};
pub use model::{Category, Classification, MarkerReading, MarkerSeries, TrendResult};
pub use report::ComparisonReport;
pub use view::InteractiveView;
