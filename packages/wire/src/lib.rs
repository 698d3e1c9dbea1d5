//! Wire envelopes shared by spectree servers and clients.
//!
//! Every response body is one of two shapes:
//!
//! | Shape | Status | Type |
//! |-------|--------|------|
//! | `{"data": <value>}` | 200 | [`DataEnvelope`] |
//! | `{"error": {"msg": <kind>, "body"?: <detail>}}` | 400 / 500 | [`ErrorEnvelope`] |
//!
//! Keeping both ends on these types is what lets a client hand back the
//! server's error payload verbatim.

pub mod data;
pub mod error;

pub use data::DataEnvelope;
pub use error::{ErrorBody, ErrorEnvelope, ErrorKind, UnknownErrorKind};
