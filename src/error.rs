pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An allocation made while constructing a runner or strand failed.
    #[error("out of memory")]
    OutOfMemory,

    /// An OS-level primitive (thread-local storage, lock, ...) failed.
    #[error("os error: {0}")]
    Os(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn os<S: Into<String>>(msg: S) -> Self {
        Error::Os(std::io::Error::new(std::io::ErrorKind::Other, msg.into()))
    }

    #[cfg(feature = "telemetry")]
    pub fn telemetry<S: Into<String>>(msg: S) -> Self {
        Error::Other(format!("telemetry: {}", msg.into()))
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::OutOfMemory
    }
}
