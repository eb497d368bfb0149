mod bce;
mod cross_entropy;
mod loss_fn;

pub use bce::{BceWithLogits, sigmoid};
pub use cross_entropy::{CrossEntropy, argmax};
pub use loss_fn::LossFn;
