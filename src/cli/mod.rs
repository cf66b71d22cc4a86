//! # CLI Module
//!
//! The `webobj` binary: serve a directory tree through the dispatch engine.
//!
//! ```bash
//! webobj serve --dir ./public --addr 0.0.0.0:8080
//! webobj serve --dir ./assets --mount /assets --config webobj.yaml
//! ```
//!
//! `index.html` in the served directory answers the mount point itself. Logging is configured from
//! `WEBOBJ_LOG_*` (see [`crate::logging`]). The server stops on SIGINT or SIGTERM.

mod commands;


pub use commands::{directory_routes, run_cli, Cli, Commands};
