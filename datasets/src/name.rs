use std::{fmt, path::Path, str::FromStr};

use machine_learning::initialization::UnkVecCache;

use crate::{
    DataErr, Result,
    vulas_diff::{LoadOptions, Splits, VulasDiff},
};

/// Every dataset this crate knows how to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetName {
    VulasDiff,
}

impl DatasetName {
    /// The canonical name, also used as the dataset's directory name.
    pub fn name(&self) -> &'static str {
        match self {
            DatasetName::VulasDiff => VulasDiff::NAME,
        }
    }

    pub fn num_classes(&self) -> usize {
        match self {
            DatasetName::VulasDiff => VulasDiff::NUM_CLASSES,
        }
    }

    pub fn is_multilabel(&self) -> bool {
        match self {
            DatasetName::VulasDiff => VulasDiff::IS_MULTILABEL,
        }
    }

    /// Loads the splits of this dataset out of `data_dir`.
    pub fn load(&self, data_dir: &Path, options: &LoadOptions, unk: &mut UnkVecCache) -> Result<Splits> {
        match self {
            DatasetName::VulasDiff => VulasDiff::splits(data_dir, options, unk),
        }
    }
}

impl FromStr for DatasetName {
    type Err = DataErr;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "VulasDiff" | "VulasDiffToken" => Ok(DatasetName::VulasDiff),
            other => Err(DataErr::UnknownDataset(other.to_string())),
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
