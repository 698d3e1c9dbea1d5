//! Core building blocks for spectree API trees.
//!
//! This crate is HTTP-free: it holds the value model that handlers and
//! clients exchange, the declarative schemas endpoints are described with,
//! the date coercion transform that keeps dates symmetric across JSON, and
//! the parser for `"<segment>_<verb>"` leaf keys.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`value`] | [`Value`]: JSON plus UTC dates |
//! | [`schema`] | [`Schema`], [`Issue`], [`ValidationError`] |
//! | [`coerce`] | [`DateCoercion`]: string timestamps → dates for declared date fields |
//! | [`route`] | [`RouteKey`], [`Verb`] and [`route_path`] |
//!
//! # Quick start
//!
//! ```rust
//! use spectree_core::{DateCoercion, Schema, Value};
//!
//! let schema = Schema::object([
//!     ("title", Schema::String),
//!     ("created_at", Schema::Date.optional()),
//! ]);
//! let body = Value::from(serde_json::json!({
//!     "title": "hello",
//!     "created_at": "2024-01-01T00:00:00.000Z",
//! }));
//!
//! let parsed = DateCoercion::new(schema).parse(&body).unwrap();
//! assert!(parsed.get("created_at").and_then(Value::as_date).is_some());
//! ```

pub mod coerce;
pub mod route;
pub mod schema;
pub mod value;

pub use coerce::{parse_timestamp, DateCoercion};
pub use route::{is_param, route_path, RouteKey, RouteKeyError, SegmentError, Verb};
pub use schema::{Issue, IssueCode, PathSegment, Schema, ValidationError};
pub use value::{Map, Value};
