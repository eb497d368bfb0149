mod config;
mod error;
pub mod evaluation;
pub mod training;

pub use config::{EvaluatorConfig, TrainerConfig};
pub use error::{HarnessErr, Result};
