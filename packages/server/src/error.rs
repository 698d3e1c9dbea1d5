//! Controller-level failures and their HTTP rendering.
//!
//! Every variant serialises to the [`ErrorEnvelope`] JSON format and maps to
//! the status code its [`ErrorKind`] prescribes. Internal failures are logged
//! by the controller before conversion and never carry detail to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use spectree_core::ValidationError;
use spectree_wire::{ErrorEnvelope, ErrorKind};

/// Boxed error returned by handlers and interceptors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A request that the pipeline refused or failed to serve.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Body, query, params or headers did not match the declared schema.
    #[error("{kind}: {source}")]
    InvalidInput {
        kind: ErrorKind,
        #[source]
        source: ValidationError,
    },

    /// The handler returned a value matching its callback error schema.
    #[error("callback error")]
    Callback(serde_json::Value),

    /// Development mode: the handler result does not match the response schema.
    #[error("handler result breaks the response contract: {0}")]
    BrokenContract(#[source] ValidationError),

    /// Anything else that went wrong after input validation.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

/// Failures caught at the pipeline boundary.
#[derive(Debug, thiserror::Error)]
pub enum InternalError {
    #[error("controller callback function is not defined")]
    MissingHandler,

    #[error("interceptor failed: {0}")]
    Interceptor(#[source] BoxError),

    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl ControllerError {
    pub fn invalid(kind: ErrorKind, source: ValidationError) -> Self {
        ControllerError::InvalidInput { kind, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ControllerError::InvalidInput { kind, .. } => *kind,
            ControllerError::Callback(_) => ErrorKind::CallbackError,
            ControllerError::BrokenContract(_) => ErrorKind::BreakingResponseContract,
            ControllerError::Internal(_) => ErrorKind::InternalServerError,
        }
    }
}

impl IntoResponse for ControllerError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let body = match self {
            ControllerError::InvalidInput { source, .. } => Some(source.to_json()),
            ControllerError::Callback(value) => Some(value),
            ControllerError::BrokenContract(_) | ControllerError::Internal(_) => None,
        };
        let status =
            StatusCode::from_u16(kind.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorEnvelope::new(kind, body))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use spectree_core::{Issue, IssueCode};

    async fn render(err: ControllerError) -> (StatusCode, Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn invalid_input_carries_issues() {
        let issue = Issue::new(IssueCode::InvalidType, &[], "Required");
        let err = ControllerError::invalid(ErrorKind::InvalidQuery, ValidationError::single(issue));
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["msg"], "Invalid query");
        assert_eq!(body["error"]["body"][0]["message"], "Required");
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak() {
        let err = ControllerError::from(InternalError::Handler("db password is hunter2".into()));
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": { "msg": "Internal server error" } }));
    }

    #[tokio::test]
    async fn broken_contract_is_500_without_detail() {
        let issue = Issue::new(IssueCode::InvalidType, &[], "Expected string, received number");
        let err = ControllerError::BrokenContract(ValidationError::single(issue));
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({ "error": { "msg": "Internal Breaking response contract" } })
        );
    }
}
