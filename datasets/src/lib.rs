pub mod dataloader;
pub mod dataset;
mod error;
mod name;
pub mod vectors;
pub mod vocab;
pub mod vulas_diff;

pub use dataloader::{Batch, DataLoader};
pub use dataset::{DataSplit, Example};
pub use error::{DataErr, Result};
pub use name::DatasetName;
pub use vulas_diff::{LoadOptions, Splits, VulasDiff};
