//! Server half of spectree: turns endpoint descriptors into request handlers.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`descriptor`] | [`EndpointDescriptor`], [`Handler`], [`SchemaBundle`] |
//! | [`exchange`] | [`Exchange`]: decoded inputs plus the response slot |
//! | [`interceptor`] | [`Interceptor`] and the built-in [`RateLimit`] |
//! | [`controller`] | [`compile_controller`]: the validation → interceptors → handler pipeline |
//! | [`registrar`] | [`Registrar`] sinks: axum, route listing, mock |
//! | [`config`] | [`ControllerConfig`] (development mode) |
//! | [`error`] | [`ControllerError`] and its HTTP rendering |

pub mod config;
pub mod controller;
pub mod descriptor;
pub mod error;
pub mod exchange;
pub mod interceptor;
pub mod registrar;

pub use config::ControllerConfig;
pub use controller::{compile_controller, Dispatch};
pub use descriptor::{handler_fn, EndpointDescriptor, Handler, HandlerInput, SchemaBundle};
pub use error::{BoxError, ControllerError, InternalError};
pub use exchange::Exchange;
pub use interceptor::{interceptor_fn, Interceptor, RateLimit};
pub use registrar::{AxumRegistrar, MockRegistrar, Registrar, RegistrarFactory, RouteEntry, RouteTable};
