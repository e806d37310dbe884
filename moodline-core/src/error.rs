use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Config Error - {0}")]
    Config(String),

    #[error("Source Error - {0}")]
    Source(String),

    #[error("Sink Error - {0}")]
    Sink(String),

    #[error("Offset Store Error - {0}")]
    OffsetStore(String),

    #[error("Offset Regression - {0}")]
    OffsetRegression(String),

    #[error("Sink Inconsistency - {0}")]
    Inconsistency(String),
}

impl Error {
    /// Errors that must stop the consumption loop instead of being retried
    /// on the next poll.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::OffsetRegression(_) | Error::Inconsistency(_) | Error::Config(_)
        )
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Sink(e.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Sink(e.to_string())
    }
}
