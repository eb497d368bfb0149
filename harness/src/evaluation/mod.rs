mod diff_token;
mod evaluator;
mod factory;
pub mod metrics;

pub use diff_token::DiffTokenEvaluator;
pub use evaluator::{Evaluator, Scores};
pub use factory::EvaluatorFactory;
