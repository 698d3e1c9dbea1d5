use spectree_core::ValidationError;

/// Failures of a remote call. A server that answers with an error envelope
/// is not a failure; see [`crate::Reply::Error`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request or response failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A non-reqwest transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Base URL and route path do not form an absolute URL.
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The route path has a `{name}` placeholder the caller gave no value for.
    #[error("missing path parameter {name:?} for {path}")]
    MissingParam { name: String, path: String },

    /// The request body could not be serialised.
    #[error("could not encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// The reply body was not JSON.
    #[error("could not decode reply (status {status}): {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    /// The reply's `data` does not match the endpoint's response schema.
    #[error("reply breaks the response contract: {0}")]
    ResponseContract(#[source] ValidationError),

    /// No endpoint at the given client tree path.
    #[error("no endpoint at {0:?}")]
    UnknownEndpoint(String),
}
