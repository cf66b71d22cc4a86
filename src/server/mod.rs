//! # Server Module
//!
//! A small HTTP/1.1 server running on `may` coroutines: one listener coroutine accepts, and every
//! accepted connection gets its own coroutine running the request pipeline.
//!
//! - [`request`]: bounded reading of the request line, headers and body
//! - [`response`]: buffered responses and the event-stream head
//! - [`Server`] / [`ServerHandle`]: binding, accepting, stopping
//!
//! Connections are keep-alive per HTTP/1.x rules. Responses always carry `Content-Length`, except
//! event streams, which run until the peer goes away and then close.

mod connection;
mod http_server;
pub mod request;
pub mod response;

pub use http_server::{Server, ServerHandle};
pub use request::{RequestHead, RequestLimits};
pub use response::Response;
