//! Endpoint descriptors: one route's schemas, handler and interceptors.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use spectree_core::{Schema, Value};

use crate::{error::BoxError, exchange::Exchange, interceptor::Interceptor};

/// Every schema an endpoint declares. `response` and `cb_error` are always
/// present; the input schemas are optional and unchecked when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaBundle {
    pub body: Option<Schema>,
    pub query: Option<Schema>,
    pub params: Option<Schema>,
    pub headers: Option<Schema>,
    pub response: Schema,
    pub cb_error: Schema,
}

impl SchemaBundle {
    pub fn new(response: Schema, cb_error: Schema) -> Self {
        Self {
            body: None,
            query: None,
            params: None,
            headers: None,
            response,
            cb_error,
        }
    }
}

/// The validated inputs a handler works with, detached from the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerInput {
    pub body: Value,
    pub query: Value,
    pub params: Value,
    pub headers: Value,
}

impl HandlerInput {
    pub fn from_exchange(exchange: &Exchange) -> Self {
        Self {
            body: exchange.body.clone(),
            query: exchange.query.clone(),
            params: exchange.params.clone(),
            headers: exchange.headers.clone(),
        }
    }
}

/// Business logic behind one endpoint.
///
/// The returned value is checked against the callback error schema first:
/// a match is answered as a 400 callback error, anything else as
/// `{"data": value}`. Returning `Err` yields a generic 500. A handler may
/// also commit a response on the exchange itself, in which case its return
/// value is ignored.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, exchange: &mut Exchange, schemas: &SchemaBundle)
        -> Result<Value, BoxError>;
}

/// [`Handler`] backed by an async closure over [`HandlerInput`].
pub struct FnHandler<F>(F);

/// Wrap an async closure as a [`Handler`].
///
/// ```rust,ignore
/// let h = handler_fn(|input: HandlerInput| async move {
///     Ok(Value::from(format!("hello {}", input.params.get("name").unwrap())))
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(HandlerInput) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(HandlerInput) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
    async fn call(
        &self,
        exchange: &mut Exchange,
        _schemas: &SchemaBundle,
    ) -> Result<Value, BoxError> {
        let input = HandlerInput::from_exchange(exchange);
        (self.0)(input).await
    }
}

/// One route: schemas, an optional handler, and interceptors run in order
/// before the handler.
///
/// A descriptor without a handler can still be compiled for a client-only
/// API; compiling it for real routing fails.
#[derive(Clone)]
pub struct EndpointDescriptor {
    pub schemas: SchemaBundle,
    pub handler: Option<Arc<dyn Handler>>,
    pub interceptors: Vec<Arc<dyn Interceptor>>,
}

impl EndpointDescriptor {
    pub fn new(response: Schema, cb_error: Schema) -> Self {
        Self {
            schemas: SchemaBundle::new(response, cb_error),
            handler: None,
            interceptors: Vec::new(),
        }
    }

    pub fn body(mut self, schema: Schema) -> Self {
        self.schemas.body = Some(schema);
        self
    }

    pub fn query(mut self, schema: Schema) -> Self {
        self.schemas.query = Some(schema);
        self
    }

    pub fn params(mut self, schema: Schema) -> Self {
        self.schemas.params = Some(schema);
        self
    }

    pub fn headers(mut self, schema: Schema) -> Self {
        self.schemas.headers = Some(schema);
        self
    }

    pub fn handler(mut self, handler: impl Handler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Append an interceptor; interceptors run in the order they are added.
    pub fn intercept(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }
}

impl fmt::Debug for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointDescriptor")
            .field("schemas", &self.schemas)
            .field("has_handler", &self.handler.is_some())
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}
