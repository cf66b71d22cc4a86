//! # Dispatcher Module
//!
//! The dispatcher turns a [`Resolved`](crate::router::Resolved) route into a [`Reply`]. It is a
//! single exhaustive `match` over [`ContentVariant`](crate::content::ContentVariant), one arm per
//! variant, with no shared state between requests.
//!
//! ## Method Table
//!
//! | Content | GET | POST | PUT | DELETE |
//! |---|---|---|---|---|
//! | static bytes, file, transform, computed | bytes | 501 | 501 | 501 |
//! | endpoint | its own method only, 501 otherwise |||
//! | stateful object | field snapshot | action protocol | `on_put` hook | `on_delete` hook |
//! | event stream | [`Reply::Events`] | 501 | 501 | 501 |
//!
//! ## Failure Handling
//!
//! Client mistakes come back as protocol [`WebError`](crate::error::WebError)s with a status.
//! Failures inside callbacks (transform, computed producer, endpoint, action, hook) come back as
//! fatal errors; a panicking callback is caught and reported the same way. The pipeline answers
//! the former and drops the connection on the latter.

mod core;

pub use core::{decode_json, dispatch, DispatchRequest, Reply};
