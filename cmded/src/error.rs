use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An empty pattern was given to a match without a `name` option.
    #[error("match: a \"name\" option must be supplied with an empty pattern")]
    MissingName,

    #[error("consumed flags ({flags}) do not match the number of tokens ({tokens})")]
    ConsumedLength { tokens: usize, flags: usize },

    #[error("cannot split command line: {0}")]
    BadQuote(String),

    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("handler failed: {0}")]
    Handler(String),

    #[error("value at \"{key}\" has an unexpected shape: {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },

    #[error("help: {0}")]
    Help(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an arbitrary failure raised inside a handler.
    pub fn handler(err: impl std::fmt::Display) -> Self {
        Error::Handler(err.to_string())
    }
}
