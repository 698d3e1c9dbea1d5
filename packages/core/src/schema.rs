//! Declarative schemas and the issues produced when a value fails one.
//!
//! A [`Schema`] is a small tree describing an expected value shape. It is
//! deliberately narrow: it covers exactly what endpoint descriptors need to
//! declare request and response shapes, and what the date coercion transform
//! needs to introspect (object fields and their optional/nullable/default
//! wrappers).
//!
//! Parsing follows the usual object-schema conventions:
//! - unknown object keys are stripped from the output,
//! - a missing key is accepted only by `Optional` (stays missing) or
//!   `Default` (filled with the default),
//! - `Date` accepts [`Value::Date`] only; strings are rejected unless they
//!   were coerced beforehand.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::{Map, Value};

/// Expected shape of a [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Any,
    Null,
    Bool,
    Number,
    String,
    Date,
    Literal(Value),
    Array(Box<Schema>),
    Object(BTreeMap<String, Schema>),
    Optional(Box<Schema>),
    Nullable(Box<Schema>),
    Default(Box<Schema>, Value),
    Union(Vec<Schema>),
}

impl Schema {
    /// Object schema from `(field, schema)` pairs.
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Schema)>,
    {
        Schema::Object(fields.into_iter().map(|(k, s)| (k.into(), s)).collect())
    }

    pub fn array(item: Schema) -> Self {
        Schema::Array(Box::new(item))
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Schema::Literal(value.into())
    }

    pub fn union(variants: impl IntoIterator<Item = Schema>) -> Self {
        Schema::Union(variants.into_iter().collect())
    }

    pub fn optional(self) -> Self {
        Schema::Optional(Box::new(self))
    }

    pub fn nullable(self) -> Self {
        Schema::Nullable(Box::new(self))
    }

    pub fn with_default(self, value: impl Into<Value>) -> Self {
        Schema::Default(Box::new(self), value.into())
    }

    /// Direct fields of an object schema; `None` for every other shape.
    pub fn fields(&self) -> Option<&BTreeMap<String, Schema>> {
        match self {
            Schema::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// `true` when the schema is `Date`, possibly behind
    /// optional/nullable/default wrappers.
    pub fn is_date(&self) -> bool {
        match self {
            Schema::Date => true,
            Schema::Optional(inner) | Schema::Nullable(inner) | Schema::Default(inner, _) => {
                inner.is_date()
            }
            _ => false,
        }
    }

    /// Validate `value`, returning the normalized value or every issue found.
    pub fn parse(&self, value: &Value) -> Result<Value, ValidationError> {
        let mut issues = Vec::new();
        let mut path = Vec::new();
        match self.parse_at(Some(value), &mut path, &mut issues) {
            Some(parsed) if issues.is_empty() => Ok(parsed),
            _ => Err(ValidationError { issues }),
        }
    }

    /// Convenience for callers that only need the verdict.
    pub fn accepts(&self, value: &Value) -> bool {
        self.parse(value).is_ok()
    }

    fn parse_at(
        &self,
        value: Option<&Value>,
        path: &mut Vec<PathSegment>,
        issues: &mut Vec<Issue>,
    ) -> Option<Value> {
        match (self, value) {
            (Schema::Optional(_), None) => None,
            (Schema::Optional(inner), Some(v)) => inner.parse_at(Some(v), path, issues),
            (Schema::Default(inner, default), None) => inner.parse_at(Some(default), path, issues),
            (Schema::Default(inner, _), Some(v)) => inner.parse_at(Some(v), path, issues),
            (Schema::Nullable(_), Some(Value::Null)) => Some(Value::Null),
            (Schema::Nullable(inner), v) => inner.parse_at(v, path, issues),
            (_, None) => {
                issues.push(Issue::new(IssueCode::InvalidType, path, "Required"));
                None
            }
            (schema, Some(v)) => schema.parse_present(v, path, issues),
        }
    }

    fn parse_present(
        &self,
        value: &Value,
        path: &mut Vec<PathSegment>,
        issues: &mut Vec<Issue>,
    ) -> Option<Value> {
        match (self, value) {
            (Schema::Any, v) => Some(v.clone()),
            (Schema::Null, Value::Null)
            | (Schema::Bool, Value::Bool(_))
            | (Schema::Number, Value::Number(_))
            | (Schema::String, Value::String(_))
            | (Schema::Date, Value::Date(_)) => Some(value.clone()),
            (Schema::Literal(expected), v) => {
                if expected == v {
                    Some(v.clone())
                } else {
                    issues.push(Issue::new(
                        IssueCode::InvalidLiteral,
                        path,
                        format!("Invalid literal value, expected {expected}"),
                    ));
                    None
                }
            }
            (Schema::Array(item), Value::Array(items)) => {
                let before = issues.len();
                let mut out = Vec::with_capacity(items.len());
                for (i, v) in items.iter().enumerate() {
                    path.push(PathSegment::Index(i));
                    if let Some(parsed) = item.parse_at(Some(v), path, issues) {
                        out.push(parsed);
                    }
                    path.pop();
                }
                (issues.len() == before).then_some(Value::Array(out))
            }
            (Schema::Object(fields), Value::Object(map)) => {
                let before = issues.len();
                let mut out = Map::new();
                for (key, field) in fields {
                    path.push(PathSegment::Key(key.clone()));
                    if let Some(parsed) = field.parse_at(map.get(key), path, issues) {
                        out.insert(key.clone(), parsed);
                    }
                    path.pop();
                }
                (issues.len() == before).then_some(Value::Object(out))
            }
            (Schema::Union(variants), v) => {
                for variant in variants {
                    let mut scratch = Vec::new();
                    if let Some(parsed) = variant.parse_at(Some(v), path, &mut scratch) {
                        if scratch.is_empty() {
                            return Some(parsed);
                        }
                    }
                }
                issues.push(Issue::new(IssueCode::InvalidUnion, path, "Invalid input"));
                None
            }
            (expected, v) => {
                issues.push(Issue::new(
                    IssueCode::InvalidType,
                    path,
                    format!("Expected {}, received {}", expected.describe(), v.type_name()),
                ));
                None
            }
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Schema::Any => "any",
            Schema::Null => "null",
            Schema::Bool => "boolean",
            Schema::Number => "number",
            Schema::String => "string",
            Schema::Date => "date",
            Schema::Literal(_) => "literal",
            Schema::Array(_) => "array",
            Schema::Object(_) => "object",
            Schema::Optional(inner) | Schema::Nullable(inner) | Schema::Default(inner, _) => {
                inner.describe()
            }
            Schema::Union(_) => "union",
        }
    }
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// Machine-readable issue category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    InvalidType,
    InvalidLiteral,
    InvalidUnion,
    InvalidJson,
}

/// One step into a nested value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => f.write_str(k),
            PathSegment::Index(i) => write!(f, "{i}"),
        }
    }
}

/// A single reason a value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub code: IssueCode,
    pub path: Vec<PathSegment>,
    pub message: String,
}

impl Issue {
    pub fn new(code: IssueCode, path: &[PathSegment], message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.to_vec(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            return f.write_str(&self.message);
        }
        let path: Vec<String> = self.path.iter().map(ToString::to_string).collect();
        write!(f, "{}: {}", path.join("."), self.message)
    }
}

/// Returned by [`Schema::parse`] when a value does not conform.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", describe_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<Issue>,
}

impl ValidationError {
    pub fn single(issue: Issue) -> Self {
        Self { issues: vec![issue] }
    }

    /// The issue list as JSON, ready to be placed in an error envelope.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.issues).unwrap_or(serde_json::Value::Null)
    }
}

fn describe_issues(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
