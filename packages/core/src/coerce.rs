//! Date coercion over object schemas.
//!
//! JSON carries dates as strings, while [`Schema::Date`] only accepts
//! [`Value::Date`]. [`DateCoercion`] wraps an object schema, remembers which
//! of its direct fields are dates, and converts string timestamps in those
//! fields before validating. Both the server (request bodies) and the client
//! (response data) build one from the same declared schema, so the two ends
//! always agree on which fields are dates.
//!
//! Only top-level fields are inspected; dates inside nested objects or arrays
//! are not coerced.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::schema::{Schema, ValidationError};
use crate::value::Value;

/// An object schema that accepts string timestamps for its date fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DateCoercion {
    schema: Schema,
    date_keys: Vec<String>,
}

impl DateCoercion {
    /// Wrap `schema`. Non-object schemas get an empty date-key set and are
    /// validated as-is.
    pub fn new(schema: Schema) -> Self {
        let date_keys = schema
            .fields()
            .map(|fields| {
                fields
                    .iter()
                    .filter(|(_, field)| field.is_date())
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default();
        Self { schema, date_keys }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Fields that will be converted from strings, in schema order.
    pub fn date_keys(&self) -> &[String] {
        &self.date_keys
    }

    /// Convert date-designated string fields, leaving everything else alone.
    /// Non-object input is returned unchanged.
    pub fn coerce(&self, value: &Value) -> Value {
        let Value::Object(map) = value else {
            return value.clone();
        };
        let mut map = map.clone();
        for key in &self.date_keys {
            if let Some(Value::String(raw)) = map.get(key) {
                if let Some(date) = parse_timestamp(raw) {
                    map.insert(key.clone(), Value::Date(date));
                }
            }
        }
        Value::Object(map)
    }

    /// Coerce, then validate against the wrapped schema.
    pub fn parse(&self, value: &Value) -> Result<Value, ValidationError> {
        self.schema.parse(&self.coerce(value))
    }
}

/// Parse the timestamp forms a JSON client is likely to send.
///
/// Accepts RFC 3339 (any offset, normalized to UTC), a naive
/// `YYYY-MM-DDTHH:MM:SS[.fff]` read as UTC, and a bare `YYYY-MM-DD` read as
/// UTC midnight.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(raw) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(d.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}
