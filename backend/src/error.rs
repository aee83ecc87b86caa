use thiserror::Error;

/// A reporting or data API call that could not produce an answer.
///
/// An empty answer is not an error: sources return `Ok` with no rows for that.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("table '{0}' is not declared")]
    UnknownTable(String),
    #[error("rejected write to '{table}': {reason}")]
    Rejected { table: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}
