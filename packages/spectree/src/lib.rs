//! Compile one declarative API tree into an HTTP router and a matching
//! typed client.
//!
//! A [`SpecTree`] nests [`EndpointDescriptor`]s under `"<segment>_<verb>"`
//! keys. [`compile_api`] walks it once and produces:
//!
//! - a router (via a [`RegistrarFactory`]) whose every endpoint validates its
//!   inputs, runs its interceptors, invokes its handler and answers with the
//!   JSON envelopes of [`spectree_wire`];
//! - a [`ClientTree`] whose every leaf calls the same endpoint over HTTP and
//!   parses the reply back into a [`Value`], dates included.
//!
//! # Crate layout
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | [`spectree_core`] | values, schemas, date coercion, route keys |
//! | [`spectree_wire`] | success and error envelopes |
//! | [`spectree_server`] | descriptors, interceptors, controller pipeline, registrars |
//! | [`spectree_client`] | remote functions and the client tree |
//! | this crate | the spec tree, the tree compiler and a demo API |
//!
//! # Quick start
//!
//! ```rust,ignore
//! let tree = SpecTree::new().branch(
//!     "users",
//!     SpecTree::new().leaf(
//!         "list_get",
//!         EndpointDescriptor::new(Schema::array(Schema::String), no_errors)
//!             .handler(handler_fn(|_| async { Ok(Value::from(vec![Value::from("ada")])) })),
//!     ),
//! );
//!
//! let api = compile_api(&tree, &ApiOptions::new("http://127.0.0.1:3000"), &AxumRegistrar)?;
//! axum::serve(listener, api.router).await?;
//! // elsewhere, from the same tree:
//! let reply = api.client.call("users/list_get", ClientArgs::new()).await?;
//! ```

pub mod compile;
pub mod demo;
pub mod tree;

pub use compile::{compile_api, compile_client, ApiOptions, CompileError, CompiledApi, CompiledEndpoint};
pub use tree::{SpecNode, SpecTree};

pub use spectree_client::{ClientArgs, ClientError, ClientNode, ClientTree, RemoteFn, Reply};
pub use spectree_core::{DateCoercion, Schema, Value, Verb};
pub use spectree_wire::{ErrorBody, ErrorKind};
pub use spectree_server::{
    handler_fn, interceptor_fn, AxumRegistrar, ControllerConfig, EndpointDescriptor, Exchange,
    Handler, HandlerInput, Interceptor, MockRegistrar, RateLimit, Registrar, RegistrarFactory,
    RouteTable,
};
