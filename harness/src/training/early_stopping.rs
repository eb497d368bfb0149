/// What `EarlyStopping::observe` concluded from an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The metric beat the best one seen so far.
    Improved,
    /// The metric did not improve but the patience is not exhausted yet.
    Waiting,
    /// The patience is exhausted.
    Stop,
}

/// Tracks the best value of a metric that should increase.
///
/// The first observation always improves. Afterwards `patience` non-improving
/// observations in a row are tolerated and the next one stops.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best: f64,
    best_epoch: Option<usize>,
    counter: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best: f64::NEG_INFINITY,
            best_epoch: None,
            counter: 0,
        }
    }

    /// Records the metric measured at the end of `epoch`.
    pub fn observe(&mut self, epoch: usize, metric: f64) -> Verdict {
        if metric > self.best {
            self.best = metric;
            self.best_epoch = Some(epoch);
            self.counter = 0;
            return Verdict::Improved;
        }

        self.counter += 1;
        if self.counter > self.patience {
            Verdict::Stop
        } else {
            Verdict::Waiting
        }
    }

    #[inline]
    pub fn best(&self) -> f64 {
        self.best
    }

    #[inline]
    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    #[inline]
    pub fn counter(&self) -> usize {
        self.counter
    }
}
