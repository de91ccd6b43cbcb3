//! Deterministic, seeded dataset generators and helpers for preparing
//! benchmark inputs.

pub mod loader;
pub mod sine;
pub mod google_stocks;
pub mod pbc;
pub mod horizons;

pub use loader::DataLoader;
pub use sine::SineDataLoader;
pub use google_stocks::GoogleStocksDataLoader;
pub use pbc::PBCDataLoader;
pub use horizons::{event0_time_percentiles, quantile};
