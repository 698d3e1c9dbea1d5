//! Route registrars: where compiled controllers get attached.
//!
//! The tree compiler asks a [`RegistrarFactory`] for one fresh registrar per
//! branch, registers that branch's leaves on it at `/segment`, then mounts it
//! into its parent at `/key`. A leaf `users_get` inside branch `api` is
//! therefore served at `/api/users`.
//!
//! | Registrar | Produces | Needs handlers |
//! |-----------|----------|----------------|
//! | [`AxumRegistrar`] | an [`axum::Router`] serving every endpoint | yes |
//! | [`RouteTable`] | a printable `VERB /path` listing | no |
//! | [`MockRegistrar`] | nothing; used to build clients only | no |

use std::fmt;

use axum::{
    extract::Request,
    routing::{on, MethodFilter},
    Router,
};
use spectree_core::Verb;

use crate::controller::Dispatch;

/// A routing sink for compiled controllers.
pub trait Registrar: Sized {
    /// Attach `dispatch` for `verb` requests to `path`, relative to this
    /// registrar's mount point.
    fn register(self, verb: Verb, path: &str, dispatch: Dispatch) -> Self;

    /// Mount a child registrar built for a sub-branch under `prefix`.
    fn mount(self, prefix: &str, child: Self) -> Self;
}

/// Creates an empty registrar for every branch of the tree.
pub trait RegistrarFactory {
    type Registrar: Registrar;

    fn create(&self) -> Self::Registrar;

    /// Whether every endpoint must carry a handler. Registrars that never
    /// dispatch requests return `false` so handler-less trees still compile.
    fn requires_handlers(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// axum
// ---------------------------------------------------------------------------

/// Builds an [`axum::Router`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AxumRegistrar;

impl RegistrarFactory for AxumRegistrar {
    type Registrar = Router;

    fn create(&self) -> Router {
        Router::new()
    }
}

impl Registrar for Router {
    fn register(self, verb: Verb, path: &str, dispatch: Dispatch) -> Self {
        let handler = move |request: Request| {
            let dispatch = dispatch.clone();
            async move { dispatch.handle(request).await }
        };
        // Repeated paths with distinct methods are merged by axum.
        Router::route(self, path, on(method_filter(verb), handler))
    }

    fn mount(self, prefix: &str, child: Self) -> Self {
        self.nest(prefix, child)
    }
}

fn method_filter(verb: Verb) -> MethodFilter {
    match verb {
        Verb::Get => MethodFilter::GET,
        Verb::Post => MethodFilter::POST,
        Verb::Put => MethodFilter::PUT,
        Verb::Delete => MethodFilter::DELETE,
        Verb::Patch => MethodFilter::PATCH,
    }
}

// ---------------------------------------------------------------------------
// Route listing
// ---------------------------------------------------------------------------

/// One registered endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub verb: Verb,
    pub path: String,
}

/// Records `VERB /path` for every endpoint instead of serving it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Registrar for RouteTable {
    fn register(mut self, verb: Verb, path: &str, _dispatch: Dispatch) -> Self {
        self.entries.push(RouteEntry {
            verb,
            path: path.to_string(),
        });
        self
    }

    fn mount(mut self, prefix: &str, child: Self) -> Self {
        self.entries
            .extend(child.entries.into_iter().map(|entry| RouteEntry {
                verb: entry.verb,
                path: format!("{prefix}{}", entry.path),
            }));
        self
    }
}

impl RegistrarFactory for RouteTable {
    type Registrar = RouteTable;

    fn create(&self) -> RouteTable {
        RouteTable::default()
    }

    fn requires_handlers(&self) -> bool {
        false
    }
}

impl fmt::Display for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{:<6} {}", entry.verb.as_method(), entry.path)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

/// Discards every route. Compiling against it yields only the client tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockRegistrar;

impl Registrar for MockRegistrar {
    fn register(self, _verb: Verb, _path: &str, _dispatch: Dispatch) -> Self {
        self
    }

    fn mount(self, _prefix: &str, _child: Self) -> Self {
        self
    }
}

impl RegistrarFactory for MockRegistrar {
    type Registrar = MockRegistrar;

    fn create(&self) -> MockRegistrar {
        MockRegistrar
    }

    fn requires_handlers(&self) -> bool {
        false
    }
}
