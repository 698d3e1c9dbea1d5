//! A small in-memory notes API, declared once and implemented separately.
//!
//! [`notes_tree`] is the declaration alone, enough to compile a client.
//! [`notes_api`] attaches handlers backed by a [`NoteStore`].
//!
//! | Key path | Route | Callback error |
//! |----------|-------|----------------|
//! | `health_get` | `GET /health` | |
//! | `notes/list_get` | `GET /notes/list?limit=` | |
//! | `notes/create_post` | `POST /notes/create` | `duplicate_title` |
//! | `notes/{id}_get` | `GET /notes/{id}` | `not_found` |

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use spectree_core::{Map, Schema, Value};
use spectree_server::{handler_fn, EndpointDescriptor, HandlerInput, RateLimit};

use crate::{compile::CompileError, tree::SpecTree};

/// Create requests allowed per client IP and minute.
pub const CREATE_PER_MINUTE: u32 = 30;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Note {
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), Value::from(self.id.as_str()));
        map.insert("title".into(), Value::from(self.title.as_str()));
        map.insert("body".into(), Value::from(self.body.as_str()));
        map.insert("created_at".into(), Value::Date(self.created_at));
        Value::Object(map)
    }
}

/// Notes held in RAM, in creation order. Lost on exit.
#[derive(Debug, Default)]
pub struct NoteStore {
    notes: RwLock<Vec<Note>>,
}

impl NoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self, limit: Option<usize>) -> Vec<Note> {
        let notes = self.notes.read().unwrap_or_else(|p| p.into_inner());
        notes.iter().take(limit.unwrap_or(usize::MAX)).cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Note> {
        let notes = self.notes.read().unwrap_or_else(|p| p.into_inner());
        notes.iter().find(|n| n.id == id).cloned()
    }

    /// Store a new note. Returns `None` when the title is already taken.
    pub fn create(&self, title: &str, body: &str, created_at: DateTime<Utc>) -> Option<Note> {
        let mut notes = self.notes.write().unwrap_or_else(|p| p.into_inner());
        if notes.iter().any(|n| n.title == title) {
            return None;
        }
        let note = Note {
            id: format!("n{}", notes.len() + 1),
            title: title.to_string(),
            body: body.to_string(),
            created_at,
        };
        notes.push(note.clone());
        Some(note)
    }
}

// ---------------------------------------------------------------------------
// Declaration
// ---------------------------------------------------------------------------

pub fn note_schema() -> Schema {
    Schema::object([
        ("id", Schema::String),
        ("title", Schema::String),
        ("body", Schema::String),
        ("created_at", Schema::Date),
    ])
}

fn failure(reason: &str) -> Schema {
    Schema::object([("reason", Schema::literal(reason))])
}

fn failure_value(reason: &str) -> Value {
    let mut map = Map::new();
    map.insert("reason".into(), Value::from(reason));
    Value::Object(map)
}

/// The notes API without handlers.
pub fn notes_tree() -> SpecTree {
    let notes = SpecTree::new()
        .leaf(
            "list_get",
            EndpointDescriptor::new(Schema::array(note_schema()), failure("unavailable"))
                .query(Schema::object([("limit", Schema::String.optional())])),
        )
        .leaf(
            "create_post",
            EndpointDescriptor::new(note_schema(), failure("duplicate_title"))
                .body(Schema::object([
                    ("title", Schema::String),
                    ("body", Schema::String.with_default("")),
                    ("created_at", Schema::Date.optional()),
                ]))
                .intercept(RateLimit::per_minute(CREATE_PER_MINUTE)),
        )
        .leaf(
            "{id}_get",
            EndpointDescriptor::new(
                note_schema(),
                Schema::object([
                    ("reason", Schema::literal("not_found")),
                    ("id", Schema::String),
                ]),
            )
            .params(Schema::object([("id", Schema::String)])),
        );

    SpecTree::new()
        .leaf(
            "health_get",
            EndpointDescriptor::new(
                Schema::object([("status", Schema::literal("ok"))]),
                failure("unavailable"),
            ),
        )
        .branch("notes", notes)
}

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

/// The notes API with every leaf implemented against `store`.
pub fn notes_api(store: Arc<NoteStore>) -> Result<SpecTree, CompileError> {
    let mut tree = notes_tree();

    tree.implement(
        "health_get",
        handler_fn(|_| async {
            let mut map = Map::new();
            map.insert("status".into(), Value::from("ok"));
            Ok(Value::Object(map))
        }),
    )?;

    let list_store = Arc::clone(&store);
    tree.implement(
        "notes/list_get",
        handler_fn(move |input: HandlerInput| {
            let store = Arc::clone(&list_store);
            async move {
                let limit = input
                    .query
                    .get("limit")
                    .and_then(Value::as_str)
                    .and_then(|raw| raw.parse().ok());
                let notes = store.list(limit).iter().map(Note::to_value).collect();
                Ok(Value::Array(notes))
            }
        }),
    )?;

    let create_store = Arc::clone(&store);
    tree.implement(
        "notes/create_post",
        handler_fn(move |input: HandlerInput| {
            let store = Arc::clone(&create_store);
            async move {
                let body = &input.body;
                let title = body.get("title").and_then(Value::as_str).unwrap_or_default();
                let text = body.get("body").and_then(Value::as_str).unwrap_or_default();
                let created_at = body
                    .get("created_at")
                    .and_then(Value::as_date)
                    .copied()
                    .unwrap_or_else(Utc::now);
                Ok(match store.create(title, text, created_at) {
                    Some(note) => {
                        tracing::info!(id = %note.id, "note created");
                        note.to_value()
                    }
                    None => failure_value("duplicate_title"),
                })
            }
        }),
    )?;

    tree.implement(
        "notes/{id}_get",
        handler_fn(move |input: HandlerInput| {
            let store = Arc::clone(&store);
            async move {
                let id = input.params.get("id").and_then(Value::as_str).unwrap_or_default();
                Ok(match store.get(id) {
                    Some(note) => note.to_value(),
                    None => {
                        let mut map = Map::new();
                        map.insert("reason".into(), Value::from("not_found"));
                        map.insert("id".into(), Value::from(id));
                        Value::Object(map)
                    }
                })
            }
        }),
    )?;

    Ok(tree)
}
