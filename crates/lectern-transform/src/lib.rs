//! Source transforms for script modules.
//!
//! This crate turns authored modules into plain JavaScript: JSX elements are
//! compiled to factory calls, build-time constants are injected and, for
//! production builds, constant `if` conditions are folded away. Modules are
//! parsed once; every transform edits the original text so positions in the
//! output can be traced back to the source.

pub mod define;
pub mod edit;
pub mod fold;
pub mod jsx;
pub mod rewrite;
pub mod rules;
pub mod traits;

pub use define::Defines;
pub use edit::{splice, Anchor, Edit, SourceMapping};
pub use fold::fold_constants;
pub use jsx::{JsxOptions, JsxTransform};
pub use rewrite::{range, source_type};
pub use rules::{TransformOptions, Transformed, Transformer};
pub use traits::{location, SourceTransform, TransformContext, TransformError};
