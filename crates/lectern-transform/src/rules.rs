//! Per-module transform pipeline.

use regex::Regex;
use tracing::trace;

use crate::define::Defines;
use crate::edit::SourceMapping;
use crate::jsx::JsxOptions;
use crate::rewrite::{rewrite, Passes};
use crate::traits::TransformError;

/// Which modules get the JSX transform and what runs after it.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Directory (module-id prefix) the JSX rule applies to
    pub include_dir: String,

    /// Pattern module ids must match for the JSX rule
    pub include: String,

    pub jsx: JsxOptions,

    /// Constants injected into every script module
    pub defines: Defines,

    /// Fold constant `if` conditions (production)
    pub fold_constants: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            include_dir: "src".to_string(),
            include: r"\.jsx?$".to_string(),
            jsx: JsxOptions::default(),
            defines: Defines::new(),
            fold_constants: false,
        }
    }
}

/// A transformed module and where its text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub code: String,
    pub mapping: SourceMapping,
}

impl Transformed {
    pub fn unchanged(source: &str) -> Self {
        Self {
            code: source.to_string(),
            mapping: SourceMapping::identity(),
        }
    }
}

/// Applies the configured rules to module sources.
#[derive(Debug, Clone)]
pub struct Transformer {
    include_dir: String,
    include: Regex,
    jsx: JsxOptions,
    defines: Defines,
    fold: bool,
}

impl Transformer {
    pub fn new(options: TransformOptions) -> Result<Self, TransformError> {
        let include = Regex::new(&options.include).map_err(|e| TransformError::InvalidPattern {
            pattern: options.include.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            include_dir: options.include_dir.trim_matches('/').to_string(),
            include,
            jsx: options.jsx,
            defines: options.defines,
            fold: options.fold_constants,
        })
    }

    /// Whether the JSX rule applies to `module_id`.
    pub fn matches(&self, module_id: &str) -> bool {
        let in_dir = self.include_dir.is_empty()
            || module_id
                .strip_prefix(self.include_dir.as_str())
                .is_some_and(|rest| rest.starts_with('/'));
        in_dir && self.include.is_match(module_id)
    }

    /// Run the rules over one script module.
    ///
    /// Modules no rule applies to are returned without being parsed.
    pub fn transform_module(&self, module_id: &str, source: &str) -> Result<Transformed, TransformError> {
        let passes = Passes {
            jsx: self.matches(module_id).then_some(&self.jsx),
            defines: self.defines.mentioned_in(source).then_some(&self.defines),
            fold: self.fold,
        };
        if passes.jsx.is_none() && passes.defines.is_none() && !passes.fold {
            return Ok(Transformed::unchanged(source));
        }

        trace!(
            module = module_id,
            jsx = passes.jsx.is_some(),
            defines = passes.defines.is_some(),
            fold = passes.fold,
            "transform"
        );
        let (code, mapping) = rewrite(module_id, source, passes)?;
        Ok(Transformed { code, mapping })
    }
}
