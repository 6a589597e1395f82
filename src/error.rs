use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Bad knots, missing hwmon directory, limits violated
    #[error("{0}")]
    Config(String),

    #[error("{path}: {reason}")]
    SensorRead { path: PathBuf, reason: String },

    #[error("{path}: couldn't write {value}: {source}")]
    ControlWrite {
        path: PathBuf,
        value: String,
        source: io::Error,
    },

    #[error("must be run as root")]
    Privilege,

    #[error("couldn't install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn sensor_read(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SensorRead {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
