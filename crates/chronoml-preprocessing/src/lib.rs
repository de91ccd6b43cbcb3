//! Preprocessing plugins: imputation of missing values and feature scaling.

mod common;
pub mod imputation;
pub mod scaling;

pub use common::NoParams;
pub use imputation::{BfillImputer, FfillImputer, MeanImputer};
pub use scaling::{TsMinMaxScaler, TsStandardScaler};

use chronoml_core::Result;
use chronoml_plugins::PluginRegistry;

/// Register every preprocessing plugin.
pub fn register(registry: &mut PluginRegistry) -> Result<()> {
    registry.register_transformer::<FfillImputer>()?;
    registry.register_transformer::<BfillImputer>()?;
    registry.register_transformer::<MeanImputer>()?;
    registry.register_transformer::<TsStandardScaler>()?;
    registry.register_transformer::<TsMinMaxScaler>()?;
    Ok(())
}
