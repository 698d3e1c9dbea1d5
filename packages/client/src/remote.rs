//! Compiled client functions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use reqwest::Url;
use spectree_core::{DateCoercion, Map, Schema, Value, Verb};
use spectree_wire::ErrorBody;

use crate::{
    error::ClientError,
    transport::{Transport, TransportRequest},
};

/// Inputs of one remote call. Everything is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientArgs {
    pub body: Option<Value>,
    pub query: Map,
    pub params: Map,
    pub headers: BTreeMap<String, String>,
}

impl ClientArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// What the server answered.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `data` of a success envelope, parsed against the response schema.
    Data(Value),
    /// `error` of a failure envelope, exactly as the server sent it.
    ///
    /// Proxies and interceptors may answer with any shape, so this is the raw
    /// JSON; [`Reply::error_body`] reads it as an [`ErrorBody`].
    Error { status: u16, error: serde_json::Value },
}

impl Reply {
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Reply::Data(value) => Some(value),
            Reply::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&serde_json::Value> {
        match self {
            Reply::Error { error, .. } => Some(error),
            Reply::Data(_) => None,
        }
    }

    /// The error as a `{msg, body?}` envelope body. `None` for data replies
    /// and for errors of any other shape.
    pub fn error_body(&self) -> Option<ErrorBody> {
        self.error()
            .and_then(|error| serde_json::from_value(error.clone()).ok())
    }

    pub fn into_data(self) -> Option<Value> {
        match self {
            Reply::Data(value) => Some(value),
            Reply::Error { .. } => None,
        }
    }
}

/// Calls one endpoint of a remote API.
///
/// Built once per leaf by the tree compiler and immutable afterwards; clones
/// share the response schema and the transport.
#[derive(Clone)]
pub struct RemoteFn {
    full_path: String,
    verb: Verb,
    response: Arc<DateCoercion>,
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl RemoteFn {
    pub fn new(
        full_path: impl Into<String>,
        verb: Verb,
        response: Schema,
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            full_path: full_path.into(),
            verb,
            response: Arc::new(DateCoercion::new(response)),
            base_url: base_url.into(),
            transport,
        }
    }

    /// Route path without a leading slash, e.g. `api/users`.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn response_schema(&self) -> &Schema {
        self.response.schema()
    }

    /// `base_url/full_path` with `{name}` segments filled from `params` and
    /// every query entry appended as a string parameter.
    pub fn url(&self, args: &ClientArgs) -> Result<Url, ClientError> {
        let raw = format!("{}/{}", self.base_url.trim_end_matches('/'), self.full_path);
        let invalid = |reason: String| ClientError::InvalidUrl {
            url: raw.clone(),
            reason,
        };

        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| invalid("base URL cannot carry a path".into()))?;
            segments.pop_if_empty();
            for segment in self.full_path.split('/') {
                segments.push(&self.fill(segment, &args.params)?);
            }
        }

        if !args.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &args.query {
                pairs.append_pair(key, &value.to_query_string());
            }
        }
        Ok(url)
    }

    fn fill(&self, segment: &str, params: &Map) -> Result<String, ClientError> {
        let Some(name) = segment
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
        else {
            return Ok(segment.to_string());
        };
        params
            .get(name)
            .map(Value::to_query_string)
            .ok_or_else(|| ClientError::MissingParam {
                name: name.to_string(),
                path: self.full_path.clone(),
            })
    }

    /// Send the request and decode the reply.
    pub async fn call(&self, args: ClientArgs) -> Result<Reply, ClientError> {
        let url = self.url(&args)?;

        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        for (name, value) in args.headers {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
            headers.push((name, value));
        }

        let body = match args.body {
            Some(body) if self.verb.sends_body() => {
                Some(serde_json::to_vec(&body).map_err(ClientError::Encode)?)
            }
            _ => None,
        };

        tracing::debug!(verb = %self.verb.as_method(), %url, "remote call");
        let response = self
            .transport
            .send(TransportRequest {
                verb: self.verb,
                url,
                headers,
                body,
            })
            .await?;

        self.decode(response.status, &response.body)
    }

    fn decode(&self, status: u16, body: &[u8]) -> Result<Reply, ClientError> {
        let json: serde_json::Value = serde_json::from_slice(body)
            .map_err(|source| ClientError::Decode { status, source })?;

        if let Some(error) = json.get("error").filter(|e| !e.is_null()) {
            return Ok(Reply::Error {
                status,
                error: error.clone(),
            });
        }

        let data = json.get("data").cloned().map(Value::from).unwrap_or_default();
        self.response
            .parse(&data)
            .map(Reply::Data)
            .map_err(ClientError::ResponseContract)
    }
}

impl fmt::Debug for RemoteFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFn")
            .field("full_path", &self.full_path)
            .field("verb", &self.verb)
            .field("base_url", &self.base_url)
            .finish()
    }
}
