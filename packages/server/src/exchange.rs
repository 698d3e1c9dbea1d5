//! Per-request state threaded through interceptors and the handler.
//!
//! An [`Exchange`] owns the decoded request inputs and the response slot for
//! exactly one request. Input validation replaces `body`, `query`, `params`
//! and `headers` with their parsed values in place, so interceptors and the
//! handler always observe typed data. The response slot accepts a single
//! commit; later attempts are refused and logged.

use std::collections::HashMap;

use axum::{
    body::{self, Body},
    extract::{FromRequestParts, Path, Query, Request},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use spectree_core::{Issue, IssueCode, Map, Value};
use spectree_wire::{ErrorEnvelope, ErrorKind};

/// Largest request body the controller will buffer.
pub const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Decoded request inputs plus a single-use response slot.
pub struct Exchange {
    /// JSON body; `{}` when the request had none.
    pub body: Value,
    /// Query string as an object of strings (repeated keys become arrays).
    pub query: Value,
    /// Path parameters captured by the matched route.
    pub params: Value,
    /// Request headers keyed by lower-case name.
    pub headers: Value,
    request: Parts,
    body_error: Option<Issue>,
    response: Option<Response>,
}

impl Exchange {
    /// Decode `request` into an exchange. Never fails: a body that is not
    /// valid JSON is remembered and surfaces as an `Invalid body` issue if
    /// the endpoint declares a body schema.
    pub async fn from_request(request: Request) -> Self {
        let (mut parts, body) = request.into_parts();

        let params = Path::<HashMap<String, String>>::from_request_parts(&mut parts, &())
            .await
            .map(|Path(p)| {
                Value::Object(p.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
            })
            .unwrap_or_else(|_| Value::Object(Map::new()));

        let query = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map(|Query(pairs)| query_object(pairs))
            .unwrap_or_else(|_| Value::Object(Map::new()));

        let headers = header_object(&parts.headers);

        let (body, body_error) = match decode_body(body).await {
            Ok(v) => (v, None),
            Err(issue) => (Value::Null, Some(issue)),
        };

        Self {
            body,
            query,
            params,
            headers,
            request: parts,
            body_error,
            response: None,
        }
    }

    /// Method, URI, version, headers and extensions of the original request.
    pub fn request(&self) -> &Parts {
        &self.request
    }

    /// The decoding failure for a body that was not valid JSON.
    pub fn body_error(&self) -> Option<&Issue> {
        self.body_error.as_ref()
    }

    pub fn is_committed(&self) -> bool {
        self.response.is_some()
    }

    /// Commit `response` unless one was already committed.
    ///
    /// Returns `false` (and drops `response`) on a second commit.
    pub fn commit(&mut self, response: Response) -> bool {
        if self.response.is_some() {
            tracing::warn!(
                uri = %self.request.uri,
                "response already committed; dropping second response"
            );
            return false;
        }
        self.response = Some(response);
        true
    }

    /// Commit a JSON response with the given status.
    pub fn respond<T: Serialize>(&mut self, status: StatusCode, body: T) -> bool {
        self.commit((status, Json(body)).into_response())
    }

    /// The committed response. An exchange that was never committed yields
    /// a generic internal server error rather than an empty reply.
    pub fn into_response(self) -> Response {
        self.response.unwrap_or_else(|| {
            tracing::error!(uri = %self.request.uri, "exchange finished without a response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorEnvelope::new(ErrorKind::InternalServerError, None)),
            )
                .into_response()
        })
    }
}

// ---------------------------------------------------------------------------
// Decoding helpers
// ---------------------------------------------------------------------------

async fn decode_body(body: Body) -> Result<Value, Issue> {
    let bytes = body::to_bytes(body, BODY_LIMIT)
        .await
        .map_err(|e| Issue::new(IssueCode::InvalidJson, &[], format!("unreadable body: {e}")))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice::<serde_json::Value>(&bytes)
        .map(Value::from)
        .map_err(|e| Issue::new(IssueCode::InvalidJson, &[], format!("malformed JSON: {e}")))
}

fn query_object(pairs: Vec<(String, String)>) -> Value {
    let mut map = Map::new();
    for (key, value) in pairs {
        match map.remove(&key) {
            None => {
                map.insert(key, Value::String(value));
            }
            Some(Value::Array(mut items)) => {
                items.push(Value::String(value));
                map.insert(key, Value::Array(items));
            }
            Some(first) => {
                map.insert(key, Value::Array(vec![first, Value::String(value)]));
            }
        }
    }
    Value::Object(map)
}

fn header_object(headers: &HeaderMap) -> Value {
    let map = headers
        .keys()
        .map(|name| {
            let joined = headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect::<Vec<_>>()
                .join(", ");
            (name.as_str().to_string(), Value::String(joined))
        })
        .collect();
    Value::Object(map)
}
