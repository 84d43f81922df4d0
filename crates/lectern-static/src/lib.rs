//! Static site builder for the documentation site.
//!
//! Composes documentation pages into virtual modules, bundles the
//! application, renders the entry document and copies static assets.
//! Output is assembled in memory and written only when every stage succeeded.

pub mod assets;
pub mod builder;
pub mod config;
pub mod html;
pub mod output;
pub mod site;

pub use builder::{BuildError, BuildResult, StaticBuilder};
pub use config::{BuildConfig, CopyRule, Mode, ModeError, DEFAULT_BASE_PATH, DEFAULT_PORT};
pub use html::{inject_head, TemplateEngine};
pub use output::BuildOutput;
pub use site::{NavItem, Site, PAGES_MODULE};
