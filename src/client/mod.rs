//! The `client` module is the far side of the HTTP surface.
//!
//! [`StreamClient`] subscribes to the text stream and yields delivered
//! messages; [`Producer`] submits narration to the ingestion endpoint. The
//! event-stream framing is handled by [`EventStreamParser`], which is
//! independent of any transport and can be fed arbitrary byte chunks.

pub mod parser;
pub mod producer;
pub mod stream_client;

pub use parser::EventStreamParser;
pub use producer::Producer;
pub use stream_client::StreamClient;
