//! Development server with live reload for lectern sites.
//!
//! Builds the site in development mode, serves the output with a
//! single-page-application fallback, rebuilds on file changes and tells
//! connected browsers to reload.

pub mod server;
pub mod watcher;
pub mod websocket;

pub use server::{dev_router, preview_router, serve_preview, DevServer, DevServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchEvent, DEBOUNCE};
pub use websocket::{reload_client_script, ReloadHub, ReloadMessage, RELOAD_PATH};
