use thiserror::Error;

/// A convenience `Result` alias using [`PromptfanError`].
pub type PromptfanResult<T> = Result<T, PromptfanError>;

/// Top-level error type shared by every promptfan crate.
#[derive(Error, Debug)]
pub enum PromptfanError {
    /// A provider answered but produced nothing usable. Displayed verbatim so
    /// that the attempt entry reads `Error: <description>`.
    #[error("{0}")]
    Generation(String),

    /// An outbound HTTP call failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Missing or invalid configuration, including missing credentials.
    #[error("Config error: {0}")]
    Config(String),

    /// No provider is registered under the requested name.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// The logging sink rejected or failed to store a record.
    #[error("Sink error: {0}")]
    Sink(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A TOML configuration parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PromptfanError {
    /// The string recorded in a model's result list when an attempt fails.
    pub fn as_entry(&self) -> String {
        format!("Error: {self}")
    }
}
