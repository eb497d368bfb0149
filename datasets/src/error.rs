use std::{error::Error, fmt, io, path::PathBuf};

use machine_learning::MlErr;

/// The datasets module's result type.
pub type Result<T> = std::result::Result<T, DataErr>;

/// Dataset loading failures.
#[derive(Debug)]
pub enum DataErr {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Parse {
        path: PathBuf,
        line: usize,
        msg: String,
    },
    EmptySplit {
        path: PathBuf,
    },
    UnknownDataset(String),
    Ml(MlErr),
}

impl fmt::Display for DataErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataErr::Io { path, source } => write!(f, "cannot read {}: {source}", path.display()),
            DataErr::Parse { path, line, msg } => {
                write!(f, "{}:{line}: {msg}", path.display())
            }
            DataErr::EmptySplit { path } => write!(f, "{} holds no examples", path.display()),
            DataErr::UnknownDataset(name) => write!(f, "{name} is not implemented"),
            DataErr::Ml(e) => write!(f, "{e}"),
        }
    }
}

impl Error for DataErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DataErr::Io { source, .. } => Some(source),
            DataErr::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for DataErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}
