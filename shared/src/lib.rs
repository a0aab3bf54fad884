// shared/src/lib.rs

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("wrong type for key '{0}'")]
    WrongType(String),
    #[error("value at '{0}' is not an integer")]
    NotAnInteger(String),
    #[error("invalid utf-8 at '{0}'")]
    InvalidUtf8(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("connection: {0}")]
    Connection(String),
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("remote: {0}")]
    Remote(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Connection(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod config;
