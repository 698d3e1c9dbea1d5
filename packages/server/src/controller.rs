//! Controller compiler: turns an [`EndpointDescriptor`] into a [`Dispatch`].
//!
//! # Pipeline
//!
//! Each request runs these steps in order, committing exactly one response:
//!
//! 1. body (with date coercion), query, params, headers are validated against
//!    their declared schemas and replaced by the parsed values; the first
//!    failure answers 400 `Invalid <input>` with the issue list;
//! 2. interceptors run in order; one that commits a response ends the
//!    pipeline silently;
//! 3. the handler is invoked;
//! 4. a result matching the callback error schema answers 400 `Callback error`;
//! 5. in development mode, a result violating the response schema answers
//!    500 `Internal Breaking response contract`;
//! 6. anything else answers 200 `{"data": result}`.
//!
//! Failures from step 2 onwards (interceptor errors and panics, a missing
//! handler, handler errors and panics) are logged and answered with a bare 500
//! `Internal server error`.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{extract::Request, http::StatusCode, response::IntoResponse, response::Response};
use futures::FutureExt;
use spectree_core::{DateCoercion, Schema, ValidationError, Value};
use spectree_wire::{DataEnvelope, ErrorKind};

use crate::{
    config::ControllerConfig,
    descriptor::EndpointDescriptor,
    error::{ControllerError, InternalError},
    exchange::Exchange,
};

/// Compile `descriptor` into a dispatch procedure.
///
/// The descriptor is shared, never modified; the body schema is wrapped in
/// its [`DateCoercion`] once, here.
pub fn compile_controller(
    descriptor: Arc<EndpointDescriptor>,
    config: ControllerConfig,
) -> Dispatch {
    let body = descriptor.schemas.body.clone().map(DateCoercion::new);
    Dispatch {
        inner: Arc::new(Controller {
            descriptor,
            body,
            config,
        }),
    }
}

/// A compiled per-request pipeline. Cheap to clone; read-only after
/// compilation, so one instance serves any number of concurrent requests.
#[derive(Clone)]
pub struct Dispatch {
    inner: Arc<Controller>,
}

struct Controller {
    descriptor: Arc<EndpointDescriptor>,
    body: Option<DateCoercion>,
    config: ControllerConfig,
}

/// How the pipeline ended when it did not fail.
enum Outcome {
    /// The handler produced a value to send as `{"data": ...}`.
    Data(Value),
    /// An interceptor or the handler already committed the response.
    Committed,
}

impl Dispatch {
    pub fn descriptor(&self) -> &Arc<EndpointDescriptor> {
        &self.inner.descriptor
    }

    pub fn config(&self) -> ControllerConfig {
        self.inner.config
    }

    /// Serve one request.
    pub async fn handle(&self, request: Request) -> Response {
        let mut exchange = Exchange::from_request(request).await;
        self.run(&mut exchange).await;
        exchange.into_response()
    }

    /// Run the pipeline over an already decoded exchange.
    pub async fn run(&self, exchange: &mut Exchange) {
        match self.inner.pipeline(exchange).await {
            Ok(Outcome::Data(value)) => {
                exchange.respond(StatusCode::OK, DataEnvelope::new(value));
            }
            Ok(Outcome::Committed) => {}
            Err(err) => {
                if let ControllerError::Internal(e) = &err {
                    tracing::error!(
                        uri = %exchange.request().uri,
                        error = %e,
                        "error in controller"
                    );
                }
                exchange.commit(err.into_response());
            }
        }
    }
}

impl Controller {
    async fn pipeline(&self, exchange: &mut Exchange) -> Result<Outcome, ControllerError> {
        self.validate_inputs(exchange)?;

        for interceptor in &self.descriptor.interceptors {
            AssertUnwindSafe(interceptor.intercept(exchange))
                .catch_unwind()
                .await
                .map_err(|payload| InternalError::Panicked(panic_message(payload.as_ref())))?
                .map_err(InternalError::Interceptor)?;
            if exchange.is_committed() {
                return Ok(Outcome::Committed);
            }
        }

        let handler = self
            .descriptor
            .handler
            .as_ref()
            .ok_or(InternalError::MissingHandler)?;
        let schemas = &self.descriptor.schemas;

        let result = AssertUnwindSafe(handler.call(exchange, schemas))
            .catch_unwind()
            .await
            .map_err(|payload| InternalError::Panicked(panic_message(payload.as_ref())))?
            .map_err(InternalError::Handler)?;

        if exchange.is_committed() {
            tracing::warn!(
                uri = %exchange.request().uri,
                "handler committed its own response; discarding its return value"
            );
            return Ok(Outcome::Committed);
        }

        if schemas.cb_error.accepts(&result) {
            return Err(ControllerError::Callback(result.into()));
        }

        if self.config.dev_mode {
            if let Err(e) = schemas.response.parse(&result) {
                tracing::error!(
                    uri = %exchange.request().uri,
                    issues = %e,
                    "Internal Invalid response"
                );
                return Err(ControllerError::BrokenContract(e));
            }
        }

        Ok(Outcome::Data(result))
    }

    fn validate_inputs(&self, exchange: &mut Exchange) -> Result<(), ControllerError> {
        if let Some(body) = &self.body {
            if let Some(issue) = exchange.body_error() {
                return Err(ControllerError::invalid(
                    ErrorKind::InvalidBody,
                    ValidationError::single(issue.clone()),
                ));
            }
            exchange.body = body
                .parse(&exchange.body)
                .map_err(|e| ControllerError::invalid(ErrorKind::InvalidBody, e))?;
        }

        let schemas = &self.descriptor.schemas;
        replace_parsed(schemas.query.as_ref(), &mut exchange.query, ErrorKind::InvalidQuery)?;
        replace_parsed(schemas.params.as_ref(), &mut exchange.params, ErrorKind::InvalidParams)?;
        replace_parsed(schemas.headers.as_ref(), &mut exchange.headers, ErrorKind::InvalidHeaders)?;
        Ok(())
    }
}

fn replace_parsed(
    schema: Option<&Schema>,
    slot: &mut Value,
    kind: ErrorKind,
) -> Result<(), ControllerError> {
    if let Some(schema) = schema {
        *slot = schema
            .parse(slot)
            .map_err(|e| ControllerError::invalid(kind, e))?;
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::body::Body;
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use serde_json::json;

    use super::*;
    use crate::descriptor::{handler_fn, HandlerInput};
    use crate::error::BoxError;
    use crate::interceptor::interceptor_fn;

    fn post(uri: &str, body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn call(
        descriptor: EndpointDescriptor,
        config: ControllerConfig,
        request: Request,
    ) -> (StatusCode, serde_json::Value) {
        let dispatch = compile_controller(Arc::new(descriptor), config);
        let resp = dispatch.handle(request).await;
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn named() -> Schema {
        Schema::object([("name", Schema::String)])
    }

    fn not_found() -> Schema {
        Schema::object([("reason", Schema::literal("not_found"))])
    }

    fn echo_body() -> EndpointDescriptor {
        EndpointDescriptor::new(Schema::Any, not_found())
            .body(named())
            .handler(handler_fn(|input: HandlerInput| async move { Ok(input.body) }))
    }

    #[tokio::test]
    async fn empty_body_fails_body_schema() {
        let (status, body) = call(echo_body(), ControllerConfig::default(), post("/", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["msg"], "Invalid body");
        assert!(!body["error"]["body"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_invalid_body() {
        let (status, body) =
            call(echo_body(), ControllerConfig::default(), post("/", "{\"name\":")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["msg"], "Invalid body");
        assert_eq!(body["error"]["body"][0]["code"], "invalid_json");
    }

    #[tokio::test]
    async fn valid_body_reaches_handler_stripped() {
        let (status, body) = call(
            echo_body(),
            ControllerConfig::default(),
            post("/", r#"{"name":"ada","extra":true}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "data": { "name": "ada" } }));
    }

    #[tokio::test]
    async fn body_dates_are_coerced_before_the_handler() {
        let descriptor = EndpointDescriptor::new(Schema::Bool, not_found())
            .body(Schema::object([("createdAt", Schema::Date.optional())]))
            .handler(handler_fn(|input: HandlerInput| async move {
                let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
                Ok(Value::Bool(
                    input.body.get("createdAt").and_then(Value::as_date) == Some(&expected),
                ))
            }));
        let (status, body) = call(
            descriptor,
            ControllerConfig::development(),
            post("/", r#"{"createdAt":"2024-01-01T00:00:00.000Z"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "data": true }));
    }

    #[tokio::test]
    async fn query_params_and_headers_are_validated_in_order() {
        let descriptor = EndpointDescriptor::new(Schema::Any, not_found())
            .query(Schema::object([("page", Schema::String)]))
            .params(Schema::object([("id", Schema::String)]))
            .headers(Schema::object([("x-api-key", Schema::String)]))
            .handler(handler_fn(|_| async { Ok(Value::Null) }));

        let (status, body) =
            call(descriptor.clone(), ControllerConfig::default(), post("/", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["msg"], "Invalid query");

        // No route matched, so there are no path params to satisfy `id`.
        let (status, body) =
            call(descriptor, ControllerConfig::default(), post("/?page=2", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["msg"], "Invalid params");
        assert_eq!(body["error"]["body"][0]["path"], json!(["id"]));
    }

    #[tokio::test]
    async fn invalid_headers() {
        let descriptor = EndpointDescriptor::new(Schema::Any, not_found())
            .headers(Schema::object([("x-api-key", Schema::String)]))
            .handler(handler_fn(|_| async { Ok(Value::Null) }));
        let (status, body) = call(descriptor, ControllerConfig::default(), post("/", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["msg"], "Invalid headers");
    }

    #[tokio::test]
    async fn callback_error_wins_over_response_schema() {
        let descriptor = EndpointDescriptor::new(Schema::Any, not_found()).handler(handler_fn(
            |_| async { Ok(Value::from(json!({ "reason": "not_found" }))) },
        ));
        let (status, body) =
            call(descriptor, ControllerConfig::development(), post("/", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({ "error": { "msg": "Callback error", "body": { "reason": "not_found" } } })
        );
    }

    fn breaks_contract() -> EndpointDescriptor {
        EndpointDescriptor::new(named(), not_found())
            .handler(handler_fn(|_| async { Ok(Value::from(json!({ "name": 42 }))) }))
    }

    #[tokio::test]
    async fn dev_mode_checks_response_contract() {
        let (status, body) =
            call(breaks_contract(), ControllerConfig::development(), post("/", "")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({ "error": { "msg": "Internal Breaking response contract" } })
        );
    }

    #[tokio::test]
    async fn production_mode_skips_response_contract() {
        let (status, body) =
            call(breaks_contract(), ControllerConfig::production(), post("/", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "data": { "name": 42 } }));
    }

    #[tokio::test]
    async fn committing_interceptor_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let descriptor = EndpointDescriptor::new(Schema::Any, not_found())
            .intercept(interceptor_fn(|ex: &mut Exchange| {
                ex.respond(StatusCode::UNAUTHORIZED, json!({ "error": { "msg": "Unauthorized" } }));
                Ok(())
            }))
            .intercept(interceptor_fn(|_: &mut Exchange| Err("must not run".into())))
            .handler(handler_fn(move |_| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Null)
                }
            }));
        let (status, body) = call(descriptor, ControllerConfig::default(), post("/", "")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": { "msg": "Unauthorized" } }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn interceptors_see_validated_input_and_each_other() {
        let descriptor = EndpointDescriptor::new(Schema::Any, not_found())
            .body(named())
            .intercept(interceptor_fn(|ex: &mut Exchange| {
                let name = ex.body.get("name").and_then(Value::as_str).unwrap_or("");
                let upper = Value::from(name.to_uppercase());
                if let Value::Object(map) = &mut ex.body {
                    map.insert("name".into(), upper);
                }
                Ok(())
            }))
            .intercept(interceptor_fn(|ex: &mut Exchange| {
                if let Value::Object(map) = &mut ex.body {
                    map.insert("checked".into(), Value::Bool(true));
                }
                Ok(())
            }))
            .handler(handler_fn(|input: HandlerInput| async move { Ok(input.body) }));
        let (status, body) = call(
            descriptor,
            ControllerConfig::default(),
            post("/", r#"{"name":"ada"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "data": { "name": "ADA", "checked": true } }));
    }

    #[tokio::test]
    async fn missing_handler_is_internal_error() {
        let descriptor = EndpointDescriptor::new(Schema::Any, not_found());
        let (status, body) = call(descriptor, ControllerConfig::default(), post("/", "")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": { "msg": "Internal server error" } }));
    }

    #[tokio::test]
    async fn handler_error_is_hidden() {
        let descriptor = EndpointDescriptor::new(Schema::Any, not_found()).handler(handler_fn(
            |_| async { Err::<Value, BoxError>("connection refused to 10.0.0.3".into()) },
        ));
        let (status, body) = call(descriptor, ControllerConfig::default(), post("/", "")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": { "msg": "Internal server error" } }));
    }

    #[tokio::test]
    async fn interceptor_error_is_internal_error() {
        let descriptor = EndpointDescriptor::new(Schema::Any, not_found())
            .intercept(interceptor_fn(|_: &mut Exchange| Err("token store offline".into())))
            .handler(handler_fn(|_| async { Ok(Value::Null) }));
        let (status, body) = call(descriptor, ControllerConfig::default(), post("/", "")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["msg"], "Internal server error");
    }

    struct Explodes;

    #[async_trait::async_trait]
    impl crate::descriptor::Handler for Explodes {
        async fn call(
            &self,
            _exchange: &mut Exchange,
            _schemas: &crate::descriptor::SchemaBundle,
        ) -> Result<Value, BoxError> {
            panic!("boom")
        }
    }

    #[tokio::test]
    async fn handler_panic_is_caught() {
        let descriptor = EndpointDescriptor::new(Schema::Any, not_found()).handler(Explodes);
        let (status, body) = call(descriptor, ControllerConfig::default(), post("/", "")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["msg"], "Internal server error");
    }

    #[tokio::test]
    async fn interceptor_panic_is_caught() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let descriptor = EndpointDescriptor::new(Schema::Any, not_found())
            .intercept(interceptor_fn(|_: &mut Exchange| -> Result<(), BoxError> {
                panic!("interceptor boom")
            }))
            .handler(handler_fn(move |_| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Null)
                }
            }));
        let (status, body) = call(descriptor, ControllerConfig::default(), post("/", "")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": { "msg": "Internal server error" } }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    struct Teapot;

    #[async_trait::async_trait]
    impl crate::descriptor::Handler for Teapot {
        async fn call(
            &self,
            exchange: &mut Exchange,
            _schemas: &crate::descriptor::SchemaBundle,
        ) -> Result<Value, BoxError> {
            exchange.respond(StatusCode::IM_A_TEAPOT, json!({ "data": "short and stout" }));
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn handler_committed_response_is_kept() {
        let descriptor = EndpointDescriptor::new(Schema::Any, not_found()).handler(Teapot);
        let (status, body) = call(descriptor, ControllerConfig::default(), post("/", "")).await;
        assert_eq!(status, StatusCode::IM_A_TEAPOT);
        assert_eq!(body, json!({ "data": "short and stout" }));
    }
}
