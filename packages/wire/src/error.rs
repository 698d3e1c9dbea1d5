//! Error envelope and the error taxonomy it carries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every failure a compiled controller can report.
///
/// | Kind | `msg` on the wire | HTTP status |
/// |------|-------------------|------------|
/// | [`InvalidBody`](ErrorKind::InvalidBody) | `Invalid body` | 400 |
/// | [`InvalidQuery`](ErrorKind::InvalidQuery) | `Invalid query` | 400 |
/// | [`InvalidParams`](ErrorKind::InvalidParams) | `Invalid params` | 400 |
/// | [`InvalidHeaders`](ErrorKind::InvalidHeaders) | `Invalid headers` | 400 |
/// | [`CallbackError`](ErrorKind::CallbackError) | `Callback error` | 400 |
/// | [`BreakingResponseContract`](ErrorKind::BreakingResponseContract) | `Internal Breaking response contract` | 500 |
/// | [`InternalServerError`](ErrorKind::InternalServerError) | `Internal server error` | 500 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "Invalid body")]
    InvalidBody,
    #[serde(rename = "Invalid query")]
    InvalidQuery,
    #[serde(rename = "Invalid params")]
    InvalidParams,
    #[serde(rename = "Invalid headers")]
    InvalidHeaders,
    #[serde(rename = "Callback error")]
    CallbackError,
    #[serde(rename = "Internal Breaking response contract")]
    BreakingResponseContract,
    #[serde(rename = "Internal server error")]
    InternalServerError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::InvalidBody,
        ErrorKind::InvalidQuery,
        ErrorKind::InvalidParams,
        ErrorKind::InvalidHeaders,
        ErrorKind::CallbackError,
        ErrorKind::BreakingResponseContract,
        ErrorKind::InternalServerError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidBody => "Invalid body",
            ErrorKind::InvalidQuery => "Invalid query",
            ErrorKind::InvalidParams => "Invalid params",
            ErrorKind::InvalidHeaders => "Invalid headers",
            ErrorKind::CallbackError => "Callback error",
            ErrorKind::BreakingResponseContract => "Internal Breaking response contract",
            ErrorKind::InternalServerError => "Internal server error",
        }
    }

    /// HTTP status code the server pairs with this kind.
    pub fn status(self) -> u16 {
        match self {
            ErrorKind::BreakingResponseContract | ErrorKind::InternalServerError => 500,
            _ => 400,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `msg` value outside the built-in taxonomy, e.g. one set by an interceptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown error kind: {0:?}")]
pub struct UnknownErrorKind(pub String);

impl FromStr for ErrorKind {
    type Err = UnknownErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownErrorKind(s.to_string()))
    }
}

/// The object under the `error` key.
///
/// `msg` is kept as a plain string: interceptors own their responses and may
/// use messages outside [`ErrorKind`], and clients return whatever the server
/// sent without rewriting it. Use [`ErrorBody::kind`] to branch on the
/// built-in taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub msg: String,

    /// Validation issues, the handler's callback error value, or absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn new(kind: ErrorKind, body: Option<serde_json::Value>) -> Self {
        Self {
            msg: kind.as_str().to_string(),
            body,
        }
    }

    /// Free-form message, for errors committed outside the controller pipeline.
    pub fn custom(msg: impl Into<String>, body: Option<serde_json::Value>) -> Self {
        Self {
            msg: msg.into(),
            body,
        }
    }

    /// The built-in kind, or `None` for custom messages.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.msg.parse().ok()
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.msg == kind.as_str()
    }
}

/// `{"error": {...}}`, the body of every 400 and 500 response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    pub fn new(kind: ErrorKind, body: Option<serde_json::Value>) -> Self {
        Self {
            error: ErrorBody::new(kind, body),
        }
    }
}

impl From<ErrorBody> for ErrorEnvelope {
    fn from(error: ErrorBody) -> Self {
        Self { error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_body_is_omitted() {
        let env = ErrorEnvelope::new(ErrorKind::InternalServerError, None);
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({ "error": { "msg": "Internal server error" } })
        );
    }

    #[test]
    fn callback_body_kept() {
        let env = ErrorEnvelope::new(ErrorKind::CallbackError, Some(json!({ "code": "gone" })));
        let back: ErrorEnvelope =
            serde_json::from_value(serde_json::to_value(&env).unwrap()).unwrap();
        assert_eq!(back.error.kind(), Some(ErrorKind::CallbackError));
        assert_eq!(back.error.body, Some(json!({ "code": "gone" })));
    }

    #[test]
    fn wire_strings_match_serde_names() {
        for kind in ErrorKind::ALL {
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
            assert_eq!(kind.as_str().parse::<ErrorKind>(), Ok(kind));
        }
    }

    #[test]
    fn custom_messages_have_no_kind() {
        let body = ErrorBody::custom("Rate limit exceeded", None);
        assert_eq!(body.kind(), None);
        assert!(!body.is(ErrorKind::InternalServerError));
    }

    #[test]
    fn statuses() {
        assert_eq!(ErrorKind::InvalidHeaders.status(), 400);
        assert_eq!(ErrorKind::CallbackError.status(), 400);
        assert_eq!(ErrorKind::BreakingResponseContract.status(), 500);
    }
}
