pub mod dataset;
pub mod series;

pub use dataset::{Dataset, EventTargets, Targets};
pub use series::TimeSeries;
