//! Module bundler for the documentation site.
//!
//! Resolves the module graph from an entry, drops unused side-effect-free
//! modules, splits vendor code from application code and emits
//! content-hashed chunks with a manifest and a source map per chunk.

pub mod bundler;
pub mod codegen;
pub mod graph;
pub mod manifest;
pub mod minify;
pub mod resolve;
pub mod scan;
pub mod shake;
pub mod source;
pub mod source_map;

pub use bundler::{BundleError, BundleOptions, BundleOutput, Bundler, Chunk};
pub use graph::{Module, ModuleGraph, ModuleKind};
pub use manifest::{chunk_file_name, content_hash, Manifest, ManifestEntry};
pub use minify::{minify, Minified};
pub use resolve::Resolver;
pub use source::{ModuleSource, VIRTUAL_PREFIX};
