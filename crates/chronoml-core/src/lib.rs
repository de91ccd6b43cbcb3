pub mod tensor;
pub mod error;
pub mod task;

pub use tensor::Tensor;
pub use error::{ChronoError, Result};
pub use task::TaskType;
