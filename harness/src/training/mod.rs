mod diff_token;
mod early_stopping;
mod factory;
mod trainer;

pub use diff_token::DiffTokenTrainer;
pub use early_stopping::{EarlyStopping, Verdict};
pub use factory::TrainerFactory;
pub use trainer::{EpochSummary, TrainReport, Trainer, TrainerState};
