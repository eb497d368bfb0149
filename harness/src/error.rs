use std::{error::Error, fmt, io, path::PathBuf};

use datasets::DataErr;
use machine_learning::MlErr;

/// The harness module's result type.
pub type Result<T> = std::result::Result<T, HarnessErr>;

/// Training and evaluation failures.
#[derive(Debug)]
pub enum HarnessErr {
    UnknownDataset(String),
    InvalidConfig(String),
    Snapshot {
        path: PathBuf,
        msg: String,
    },
    NonFiniteLoss {
        epoch: usize,
        batch: usize,
    },
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Json(serde_json::Error),
    Ml(MlErr),
    Data(DataErr),
}

impl fmt::Display for HarnessErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarnessErr::UnknownDataset(name) => write!(f, "{name} is not implemented."),
            HarnessErr::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            HarnessErr::Snapshot { path, msg } => {
                write!(f, "snapshot error at {}: {msg}", path.display())
            }
            HarnessErr::NonFiniteLoss { epoch, batch } => {
                write!(f, "non-finite loss at epoch {epoch}, batch {batch}")
            }
            HarnessErr::Io { path, source } => write!(f, "io error at {}: {source}", path.display()),
            HarnessErr::Json(e) => write!(f, "json error: {e}"),
            HarnessErr::Ml(e) => write!(f, "{e}"),
            HarnessErr::Data(e) => write!(f, "{e}"),
        }
    }
}

impl Error for HarnessErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HarnessErr::Io { source, .. } => Some(source),
            HarnessErr::Json(e) => Some(e),
            HarnessErr::Ml(e) => Some(e),
            HarnessErr::Data(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for HarnessErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

impl From<DataErr> for HarnessErr {
    fn from(value: DataErr) -> Self {
        match value {
            DataErr::UnknownDataset(name) => Self::UnknownDataset(name),
            other => Self::Data(other),
        }
    }
}

impl From<serde_json::Error> for HarnessErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
