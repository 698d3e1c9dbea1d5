use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// HTTP verbs a leaf key may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl Verb {
    pub const ALL: [Verb; 5] = [Verb::Get, Verb::Post, Verb::Put, Verb::Delete, Verb::Patch];

    /// Lower-case form used in leaf keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Delete => "delete",
            Verb::Patch => "patch",
        }
    }

    /// Upper-case form used on the wire.
    pub fn as_method(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
            Verb::Patch => "PATCH",
        }
    }

    /// Whether requests with this verb carry a JSON body.
    pub fn sends_body(self) -> bool {
        self != Verb::Get
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = RouteKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| RouteKeyError(s.to_string()))
    }
}

/// A leaf key that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid route key {0:?}: expected \"<segment>_<verb>\" with verb one of get, post, put, delete, patch")]
pub struct RouteKeyError(pub String);

/// A parsed `"<segment>_<verb>"` leaf key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteKey {
    pub segment: String,
    pub verb: Verb,
}

impl RouteKey {
    /// Split `key` at its last `_<verb>` suffix.
    ///
    /// The segment is everything before the suffix and must be non-empty,
    /// so `users_get` gives `("users", Get)` and `by_id_delete` gives
    /// `("by_id", Delete)`.
    pub fn parse(key: &str) -> Result<Self, RouteKeyError> {
        let caps = ROUTE_KEY_RE
            .captures(key)
            .ok_or_else(|| RouteKeyError(key.to_string()))?;
        let verb = caps[2].parse()?;
        Ok(Self {
            segment: caps[1].to_string(),
            verb,
        })
    }
}

impl FromStr for RouteKey {
    type Err = RouteKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RouteKey::parse(s)
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.segment, self.verb)
    }
}

/// A key segment that cannot become part of a route path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported path segment {segment:?}: {reason}")]
pub struct SegmentError {
    pub segment: String,
    pub reason: &'static str,
}

/// Normalise a key segment into route path form.
///
/// `:name` becomes `{name}`; `{name}` and plain text are kept. Segments may
/// span several `/`-separated parts, each checked on its own. Catch-all
/// parameters, stray braces and empty parts are rejected.
///
/// ```rust
/// use spectree_core::route_path;
///
/// assert_eq!(route_path("users/:id").unwrap(), "users/{id}");
/// assert!(route_path("files/*rest").is_err());
/// ```
pub fn route_path(segment: &str) -> Result<String, SegmentError> {
    let reject = |reason| SegmentError {
        segment: segment.to_string(),
        reason,
    };

    let mut parts = Vec::new();
    for part in segment.split('/') {
        if part.is_empty() {
            return Err(reject("empty path part"));
        }
        if let Some(name) = part.strip_prefix(':') {
            check_param_name(name).map_err(reject)?;
            parts.push(format!("{{{name}}}"));
        } else if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
            if name.starts_with('*') {
                return Err(reject("catch-all parameters are not supported"));
            }
            check_param_name(name).map_err(reject)?;
            parts.push(part.to_string());
        } else if part.starts_with('*') {
            return Err(reject("path parts must not start with '*'"));
        } else if part.contains(['{', '}']) {
            return Err(reject("braces must enclose a whole path part"));
        } else {
            parts.push(part.to_string());
        }
    }
    Ok(parts.join("/"))
}

/// Whether a normalised path part captures a parameter.
pub fn is_param(part: &str) -> bool {
    part.starts_with('{') && part.ends_with('}')
}

fn check_param_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("empty parameter name");
    }
    if name.contains(['{', '}', ':', '*']) {
        return Err("parameter names must not contain '{', '}', ':' or '*'");
    }
    Ok(())
}

/// `^(.+)_(get|post|put|delete|patch)$`
static ROUTE_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+)_(get|post|put|delete|patch)$").expect("invalid route key regex")
});
