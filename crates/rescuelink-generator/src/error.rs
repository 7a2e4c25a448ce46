use std::time::Duration;

use thiserror::Error;

/// Errors returned by candidate generators.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream API answered with a non-success status.
    #[error("upstream returned status {status}: {body}")]
    Status {
        status: u16,
        body: String,
        /// Delay requested by the upstream's `Retry-After` header, if any.
        retry_after: Option<Duration>,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The completion carried no message content.
    #[error("completion response has no content")]
    EmptyCompletion,

    /// The catalog has no providers for the requested place.
    #[error("no providers cover '{0}'")]
    NotCovered(String),

    /// The generator needs a position and none was supplied.
    #[error("a position is required for this generator")]
    NoPosition,

    #[error("generator misconfigured: {0}")]
    Config(String),
}
