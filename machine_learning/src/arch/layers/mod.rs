mod conv;
mod dense;
mod dropout;
mod embedding;

pub use conv::{Conv1d, ConvTrace};
pub use dense::Dense;
pub use dropout::Dropout;
pub use embedding::Embedding;
