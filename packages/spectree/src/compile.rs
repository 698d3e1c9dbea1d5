//! The API tree compiler.
//!
//! One depth-first walk produces both halves of an API: every leaf is
//! compiled into a controller registered on a route registrar, and into a
//! [`RemoteFn`] stored at the same key of the [`ClientTree`]. Route paths and
//! client URLs come from the same key path, so the two cannot drift apart.
//!
//! | Tree | Route | Client |
//! |------|-------|--------|
//! | `health_get` | `GET /health` | `health_get` → `GET {base}/health` |
//! | `api` / `users` / `{id}_delete` | `DELETE /api/users/{id}` | `api/users/{id}_delete` |
//! | `users` / `:id_get` | `GET /users/{id}` | `users/:id_get` |
//!
//! Key segments are normalised with [`route_path`], so `:name` parameters
//! route the same as `{name}`. Anything a router could not accept fails
//! compilation with a [`CompileError`].

use std::fmt;
use std::sync::Arc;

use spectree_client::{ClientNode, ClientTree, RemoteFn, ReqwestTransport, Transport};
use spectree_core::{is_param, route_path, RouteKey, RouteKeyError, SegmentError, Verb};
use spectree_server::{
    compile_controller, ControllerConfig, Dispatch, EndpointDescriptor, MockRegistrar, Registrar,
    RegistrarFactory,
};

use crate::tree::{SpecNode, SpecTree};

// ---------------------------------------------------------------------------
// Options and output
// ---------------------------------------------------------------------------

/// Settings shared by every compiled endpoint and client function.
#[derive(Clone)]
pub struct ApiOptions {
    /// Prefix of every client URL, e.g. `http://127.0.0.1:3000`.
    pub base_url: String,
    pub transport: Arc<dyn Transport>,
    pub controller: ControllerConfig,
}

impl ApiOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn controller(mut self, controller: ControllerConfig) -> Self {
        self.controller = controller;
        self
    }
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            transport: Arc::new(ReqwestTransport::default()),
            controller: ControllerConfig::default(),
        }
    }
}

impl fmt::Debug for ApiOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiOptions")
            .field("base_url", &self.base_url)
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

/// One leaf after compilation.
#[derive(Clone)]
pub struct CompiledEndpoint {
    /// Key path with verb suffixes removed, e.g. `api/users/{id}`.
    pub full_path: String,
    pub verb: Verb,
    pub descriptor: Arc<EndpointDescriptor>,
    pub dispatch: Dispatch,
}

impl fmt::Debug for CompiledEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledEndpoint")
            .field("full_path", &self.full_path)
            .field("verb", &self.verb)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Both halves of a compiled tree.
#[derive(Debug)]
pub struct CompiledApi<R> {
    pub client: ClientTree,
    pub router: R,
    /// Every leaf, in walk order.
    pub endpoints: Vec<CompiledEndpoint>,
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("at {path:?}: {source}")]
    InvalidRouteKey {
        path: String,
        #[source]
        source: RouteKeyError,
    },

    #[error("invalid branch key {key:?} at {path:?}: must be a non-empty path segment")]
    InvalidBranchKey { key: String, path: String },

    #[error("at {path:?}: {source}")]
    InvalidSegment {
        path: String,
        #[source]
        source: SegmentError,
    },

    #[error("{} /{path} is declared more than once", verb.as_method())]
    DuplicateRoute { verb: Verb, path: String },

    #[error("/{path} and /{other} name the same path parameter differently")]
    ConflictingParams { path: String, other: String },

    #[error("{} /{path}: controller callback function is not defined", verb.as_method())]
    MissingHandler { verb: Verb, path: String },

    #[error("no leaf at {0:?}")]
    UnknownLeaf(String),
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Compile `tree` into a client tree plus whatever `factory`'s registrars
/// build.
///
/// Fails on the first malformed key, or on the first leaf without a handler
/// when the factory dispatches real requests. The tree itself is never
/// modified.
pub fn compile_api<F: RegistrarFactory>(
    tree: &SpecTree,
    options: &ApiOptions,
    factory: &F,
) -> Result<CompiledApi<F::Registrar>, CompileError> {
    let mut walker = Walker {
        options,
        factory,
        endpoints: Vec::new(),
    };
    let (client, router) = walker.walk(tree, &[], "")?;
    tracing::info!(endpoints = walker.endpoints.len(), "compiled API tree");
    Ok(CompiledApi {
        client,
        router,
        endpoints: walker.endpoints,
    })
}

/// Compile only the client half. Leaves need no handlers.
pub fn compile_client(tree: &SpecTree, options: &ApiOptions) -> Result<ClientTree, CompileError> {
    compile_api(tree, options, &MockRegistrar).map(|api| api.client)
}

struct Walker<'a, F> {
    options: &'a ApiOptions,
    factory: &'a F,
    endpoints: Vec<CompiledEndpoint>,
}

impl<F: RegistrarFactory> Walker<'_, F> {
    /// `prefix` holds the normalised route segments above `tree`, `keys` the
    /// raw key path used in error messages.
    fn walk(
        &mut self,
        tree: &SpecTree,
        prefix: &[String],
        keys: &str,
    ) -> Result<(ClientTree, F::Registrar), CompileError> {
        let mut client = ClientTree::new();
        let mut registrar = self.factory.create();

        for (key, node) in tree.iter() {
            match node {
                SpecNode::Leaf(descriptor) => {
                    let route = RouteKey::parse(key).map_err(|source| {
                        CompileError::InvalidRouteKey {
                            path: join(keys, key),
                            source,
                        }
                    })?;
                    let segment = route_path(&route.segment).map_err(|source| {
                        CompileError::InvalidSegment {
                            path: join(keys, key),
                            source,
                        }
                    })?;
                    let mut parts = prefix.to_vec();
                    parts.push(segment.clone());
                    let full_path = parts.join("/");
                    self.check_unique(route.verb, &full_path)?;

                    if self.factory.requires_handlers() && !descriptor.has_handler() {
                        return Err(CompileError::MissingHandler {
                            verb: route.verb,
                            path: full_path,
                        });
                    }

                    let dispatch =
                        compile_controller(Arc::clone(descriptor), self.options.controller);
                    registrar =
                        registrar.register(route.verb, &format!("/{segment}"), dispatch.clone());
                    tracing::debug!(verb = %route.verb.as_method(), path = %full_path, "endpoint");

                    let remote = RemoteFn::new(
                        full_path.clone(),
                        route.verb,
                        descriptor.schemas.response.clone(),
                        self.options.base_url.clone(),
                        Arc::clone(&self.options.transport),
                    );
                    client.insert(key, ClientNode::Endpoint(remote));

                    self.endpoints.push(CompiledEndpoint {
                        full_path,
                        verb: route.verb,
                        descriptor: Arc::clone(descriptor),
                        dispatch,
                    });
                }
                SpecNode::Branch(sub) => {
                    if sub.is_empty() {
                        tracing::warn!(path = %join(keys, key), "skipping empty branch");
                        continue;
                    }
                    if key.is_empty() || key.contains('/') {
                        return Err(CompileError::InvalidBranchKey {
                            key: key.to_string(),
                            path: keys.to_string(),
                        });
                    }
                    let segment = route_path(key).map_err(|source| {
                        CompileError::InvalidSegment {
                            path: join(keys, key),
                            source,
                        }
                    })?;

                    let mut path = prefix.to_vec();
                    path.push(segment.clone());
                    let (sub_client, sub_registrar) = self.walk(sub, &path, &join(keys, key))?;

                    registrar = registrar.mount(&format!("/{segment}"), sub_registrar);
                    client.insert(key, ClientNode::Branch(sub_client));
                }
            }
        }

        Ok((client, registrar))
    }

    /// Reject a route that collides with one compiled earlier: the same
    /// path and verb twice, or two parameters of different names in the
    /// same position.
    fn check_unique(&self, verb: Verb, full_path: &str) -> Result<(), CompileError> {
        for other in &self.endpoints {
            let mine = full_path.split('/');
            let theirs = other.full_path.split('/');
            match mine.zip(theirs).find(|(a, b)| a != b) {
                Some((a, b)) if is_param(a) && is_param(b) => {
                    return Err(CompileError::ConflictingParams {
                        path: full_path.to_string(),
                        other: other.full_path.clone(),
                    });
                }
                None if full_path == other.full_path && verb == other.verb => {
                    return Err(CompileError::DuplicateRoute {
                        verb,
                        path: full_path.to_string(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn join(keys: &str, key: &str) -> String {
    if keys.is_empty() {
        key.to_string()
    } else {
        format!("{keys}/{key}")
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, extract::Request, http::StatusCode, Router};
    use http_body_util::BodyExt;
    use serde_json::json;
    use spectree_client::ClientArgs;
    use spectree_core::{Schema, Value};
    use spectree_server::{handler_fn, AxumRegistrar, RouteTable};
    use tower::ServiceExt;

    use super::*;

    fn no_errors() -> Schema {
        Schema::object([("never", Schema::literal(true))])
    }

    fn answering(value: &'static str) -> EndpointDescriptor {
        EndpointDescriptor::new(Schema::String, no_errors())
            .handler(handler_fn(move |_| async move { Ok(Value::from(value)) }))
    }

    fn sample() -> SpecTree {
        SpecTree::new()
            .leaf("health_get", answering("ok"))
            .branch(
                "api",
                SpecTree::new()
                    .branch(
                        "users",
                        SpecTree::new()
                            .leaf("list_get", answering("users"))
                            .leaf("{id}_delete", answering("deleted")),
                    )
                    .leaf("users_get", answering("users-flat"))
                    .branch("empty", SpecTree::new()),
            )
    }

    async fn get(app: &Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .clone()
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    #[test]
    fn route_table_mirrors_key_paths() {
        let api = compile_api(&sample(), &ApiOptions::default(), &RouteTable::default()).unwrap();
        let routes: Vec<String> = api
            .router
            .entries()
            .iter()
            .map(|e| format!("{} {}", e.verb.as_method(), e.path))
            .collect();
        assert_eq!(
            routes,
            vec![
                "GET /api/users/list",
                "DELETE /api/users/{id}",
                "GET /api/users",
                "GET /health",
            ]
        );
        let paths: Vec<&str> = api.endpoints.iter().map(|e| e.full_path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["api/users/list", "api/users/{id}", "api/users", "health"]
        );
    }

    #[test]
    fn client_tree_has_same_shape() {
        let client = compile_client(&sample(), &ApiOptions::new("http://api.test")).unwrap();
        assert_eq!(
            client.resolve("api/users/{id}_delete").unwrap().full_path(),
            "api/users/{id}"
        );
        assert_eq!(client.resolve("api/users_get").unwrap().verb(), Verb::Get);
        assert!(client.resolve("health_get").is_some());
        assert!(client.branch("api").unwrap().get("empty").is_none());
    }

    #[tokio::test]
    async fn axum_router_serves_every_leaf() {
        let api = compile_api(&sample(), &ApiOptions::default(), &AxumRegistrar).unwrap();
        let app = api.router;
        assert_eq!(get(&app, "GET", "/health").await.1, json!({ "data": "ok" }));
        assert_eq!(get(&app, "GET", "/api/users").await.1, json!({ "data": "users-flat" }));
        assert_eq!(get(&app, "GET", "/api/users/list").await.1, json!({ "data": "users" }));
        assert_eq!(
            get(&app, "DELETE", "/api/users/42").await.1,
            json!({ "data": "deleted" })
        );
        assert_eq!(get(&app, "POST", "/health").await.0, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn malformed_leaf_key_fails() {
        let tree = SpecTree::new().branch("api", SpecTree::new().leaf("users_fetch", answering("x")));
        let err = compile_client(&tree, &ApiOptions::default()).unwrap_err();
        assert!(matches!(&err, CompileError::InvalidRouteKey { path, .. } if path == "api/users_fetch"));
        assert!(err.to_string().contains("<segment>_<verb>"));
    }

    #[test]
    fn handlers_required_only_for_real_routing() {
        let tree = SpecTree::new().leaf(
            "users_post",
            EndpointDescriptor::new(Schema::Any, no_errors()),
        );
        assert!(compile_client(&tree, &ApiOptions::default()).is_ok());
        assert!(compile_api(&tree, &ApiOptions::default(), &RouteTable::default()).is_ok());

        let err = compile_api(&tree, &ApiOptions::default(), &AxumRegistrar).unwrap_err();
        assert!(matches!(err, CompileError::MissingHandler { verb: Verb::Post, ref path } if path == "users"));
    }

    #[tokio::test]
    async fn colon_params_route_and_fill_like_braces() {
        let tree = SpecTree::new().branch(
            "users",
            SpecTree::new()
                .leaf(":id_get", answering("one"))
                .branch(":id", SpecTree::new().leaf("posts_get", answering("posts"))),
        );
        let api = compile_api(&tree, &ApiOptions::new("http://api.test"), &AxumRegistrar).unwrap();

        let paths: Vec<&str> = api.endpoints.iter().map(|e| e.full_path.as_str()).collect();
        assert_eq!(paths, vec!["users/{id}/posts", "users/{id}"]);
        assert_eq!(get(&api.router, "GET", "/users/7").await.1, json!({ "data": "one" }));
        assert_eq!(get(&api.router, "GET", "/users/7/posts").await.1, json!({ "data": "posts" }));

        let remote = api.client.resolve("users/:id_get").unwrap();
        let url = remote.url(&ClientArgs::new().param("id", "7")).unwrap();
        assert_eq!(url.as_str(), "http://api.test/users/7");
    }

    #[test]
    fn unroutable_segments_fail_instead_of_panicking() {
        for key in ["*rest_get", "{id_get", "{*rest}_get", ":_get"] {
            let tree = SpecTree::new().leaf(key, answering("x"));
            let err = compile_api(&tree, &ApiOptions::default(), &AxumRegistrar).unwrap_err();
            assert!(
                matches!(&err, CompileError::InvalidSegment { path, .. } if path == key),
                "{key}: {err}"
            );
        }

        let tree = SpecTree::new().branch("*all", SpecTree::new().leaf("x_get", answering("x")));
        let err = compile_api(&tree, &ApiOptions::default(), &AxumRegistrar).unwrap_err();
        assert!(matches!(err, CompileError::InvalidSegment { ref path, .. } if path == "*all"));
    }

    #[test]
    fn colliding_routes_fail() {
        let tree = SpecTree::new()
            .leaf("{id}_get", answering("a"))
            .leaf(":id_get", answering("b"));
        let err = compile_api(&tree, &ApiOptions::default(), &AxumRegistrar).unwrap_err();
        assert!(matches!(err, CompileError::DuplicateRoute { verb: Verb::Get, ref path } if path == "{id}"));

        let tree = SpecTree::new()
            .leaf("{id}_get", answering("a"))
            .leaf("{name}_delete", answering("b"));
        let err = compile_api(&tree, &ApiOptions::default(), &AxumRegistrar).unwrap_err();
        assert!(matches!(err, CompileError::ConflictingParams { .. }));

        let tree = SpecTree::new()
            .leaf("{id}_get", answering("a"))
            .leaf("{id}_delete", answering("b"));
        assert!(compile_api(&tree, &ApiOptions::default(), &AxumRegistrar).is_ok());
    }

    #[test]
    fn bad_branch_key_fails() {
        let tree = SpecTree::new().branch("", SpecTree::new().leaf("x_get", answering("x")));
        assert!(matches!(
            compile_client(&tree, &ApiOptions::default()),
            Err(CompileError::InvalidBranchKey { .. })
        ));
    }
}
