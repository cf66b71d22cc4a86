//! # Router Module
//!
//! The router maps a normalized request path to a [`ContentVariant`](crate::content::ContentVariant)
//! using an ordered [`RouteTable`].
//!
//! ## Matching
//!
//! Routes are scanned in registration order and the first match wins. Each route has one of two
//! pattern kinds:
//!
//! - **Prefix** (`Route::prefix`): a literal string. Leaf content matches only the exact path.
//!   Nested content (a directory, a stateful object, or a custom [`Resolver`]) also matches any
//!   path that starts with the prefix and hands the remainder to the nested resolver.
//! - **Pattern** (`Route::pattern`): a regular expression. Leaf content must match the whole
//!   path; nested content must match a leading part of it. Capture groups become positional
//!   arguments, in group order.
//!
//! A nested resolver that returns `None` *declines*: the scan continues with the next route, and
//! the request is only a 404 once every route has declined or failed to match.
//!
//! ## Example
//!
//! ```rust
//! use webobj::content::{ContentVariant, Endpoint};
//! use webobj::router::{Route, RouteTable};
//! use http::Method;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), webobj::error::RouteError> {
//! let table = RouteTable::new(vec![
//!     Route::prefix("/", ContentVariant::bytes("<html>Hello</html>"))?,
//!     Route::pattern(r"/items/(\d+)", Endpoint::get(1, |c| Ok(json!(c.capture(0)))))?,
//! ]);
//!
//! let hit = table.resolve("/items/42", &Method::GET).unwrap();
//! assert_eq!(hit.captures, vec!["42".to_string()]);
//! assert!(table.resolve("/nope", &Method::GET).is_err());
//! # Ok(())
//! # }
//! ```

mod core;
#[cfg(test)]
mod tests;

pub use core::{Resolution, Resolved, Resolver, Route, RoutePattern, RouteTable};
