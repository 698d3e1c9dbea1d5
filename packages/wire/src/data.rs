//! Success envelope.

use serde::{Deserialize, Serialize};

/// `{"data": <value>}`, the body of every 200 response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataEnvelope<T> {
    pub data: T,
}

impl<T> DataEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}
