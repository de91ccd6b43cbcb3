pub mod activation;
pub mod mlp;
pub mod ode;
pub mod optim;

pub use activation::{sigmoid, softmax, Activation};
pub use mlp::{Dense, Mlp};
pub use ode::{ControlPath, Interpolation, OdeSolver};
pub use optim::Adam;
