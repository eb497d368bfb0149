mod hrcnn;
pub mod layers;
pub mod loss;
mod model;

pub use hrcnn::{EmbeddingMode, HrCnn, HrCnnConfig};
pub use model::{Model, Persist};
