//! # webobj
//!
//! **webobj** is an embedded HTTP/1.1 routing and dispatch engine built on `may` coroutines. An
//! application hands it an ordered route table; each route binds a literal prefix or a regular
//! expression to a piece of content, and the engine serves it.
//!
//! ## Content
//!
//! - static bytes and static files, with a content type guessed from the extension
//! - directory mounts that map the rest of the path onto a root, refusing traversal
//! - externally transformed files, recomputed on every request
//! - JSON endpoints for GET, POST and PUT, fed the route's capture groups
//! - stateful objects: named fields, a fixed action table driven by
//!   `POST {"action": name, "args": {...}}`, and an event stream at `<prefix>+events` that pushes
//!   the broadcast fields to subscribers whenever one of them changes
//!
//! ## Architecture
//!
//! - **[`path`]** - target splitting, percent-decoding and `.`/`..` normalisation
//! - **[`content`]** - the [`ContentVariant`] set and content-type inference
//! - **[`router`]** - the ordered [`RouteTable`] with first-match-wins and declining mounts
//! - **[`object`]** - [`StatefulObject`] and its action dispatcher
//! - **[`sse`]** - the per-object event channel
//! - **[`dispatcher`]** - one exhaustive match from resolved content to a reply
//! - **[`server`]** - the per-connection request pipeline and the listener
//! - **[`security`]** - pluggable authentication from the `Authorization` header
//! - **[`config`]**, **[`logging`]**, **[`ids`]**, **[`error`]** - the ambient stack
//! - **[`cli`]** - the `webobj serve` binary
//!
//! ## Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use webobj::content::{ContentVariant, Endpoint};
//! use webobj::object::{ActionOutcome, StatefulObject};
//! use webobj::router::{Route, RouteTable};
//! use webobj::server::Server;
//!
//! # fn main() -> anyhow::Result<()> {
//! let counter = StatefulObject::builder("counter")
//!     .broadcast_field("count", json!(0))
//!     .action("increment", |object, _call| {
//!         let count = object.update("count", |v| json!(v.as_i64().unwrap_or(0) + 1))?;
//!         Ok(ActionOutcome::Value(count))
//!     })
//!     .build();
//!
//! let routes = RouteTable::new(vec![
//!     Route::prefix("/", ContentVariant::bytes("<html>Hello, Flub</html>"))?,
//!     Route::prefix("/counter", counter)?,
//!     Route::pattern(r"/items/(\d+)/json_get", Endpoint::get(1, |call| {
//!         Ok(json!({ "id": call.capture(0) }))
//!     }))?,
//! ]);
//!
//! let handle = Server::new(routes).start()?;
//! handle.wait_ready()?;
//! handle.join().ok();
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod content;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod object;
pub mod path;
pub mod router;
pub mod security;
pub mod server;
pub mod sse;

pub use config::ServerConfig;
pub use content::ContentVariant;
pub use error::{FieldError, RouteError, WebError};
pub use object::{ActionOutcome, StatefulObject};
pub use router::{Route, RouteTable};
pub use security::{Account, Authenticator};
pub use server::{Server, ServerHandle};
