use std::path::Path;

use machine_learning::arch::Model;

use crate::Result;

/// Named metric values, kept in a fixed order.
#[derive(Debug, Clone, PartialEq)]
pub struct Scores {
    pub values: Vec<f64>,
    pub names: Vec<&'static str>,
}

impl Scores {
    /// Returns the value of the metric called `name`.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|&n| n == name)
            .map(|i| self.values[i])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Scores a model over the split it was built for.
pub trait Evaluator {
    /// Runs the model over the whole split without dropout.
    ///
    /// # Arguments
    /// * `model` - The model to score.
    /// * `output_path` - An optional directory to write the scores and the confusion
    ///   matrix into.
    ///
    /// # Returns
    /// The metrics of the model on the split.
    fn get_scores(&self, model: &dyn Model, output_path: Option<&Path>) -> Result<Scores>;
}
