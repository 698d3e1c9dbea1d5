//! Client half of spectree: typed remote invocation over HTTP.
//!
//! A [`ClientTree`] mirrors the shape of the API tree it was compiled from.
//! Every leaf is a [`RemoteFn`] that knows its path, verb and response
//! schema; calling it sends the request through a [`Transport`] and yields a
//! [`Reply`]. Server error envelopes come back as [`Reply::Error`], not as a
//! Rust error: [`ClientError`] is reserved for failures to talk to the server
//! or to make sense of what it answered.
//!
//! ```rust,ignore
//! let reply = api.call("notes/list", ClientArgs::new()).await?;
//! if let Reply::Data(notes) = reply {
//!     println!("{notes}");
//! }
//! ```

pub mod error;
pub mod remote;
pub mod transport;
pub mod tree;

pub use error::ClientError;
pub use remote::{ClientArgs, RemoteFn, Reply};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
pub use tree::{ClientNode, ClientTree};
