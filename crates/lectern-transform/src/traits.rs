//! Trait definitions for source transforms.

use oxc_diagnostics::OxcDiagnostic;

/// Context for transforming one module.
#[derive(Debug, Clone, Default)]
pub struct TransformContext {
    /// Module id, used in error messages (`src/js/main.jsx`)
    pub file: String,
}

impl TransformContext {
    pub fn new(file: impl Into<String>) -> Self {
        Self { file: file.into() }
    }
}

/// Errors that can occur during transformation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    #[error("{file}:{line}:{column}: {message}")]
    Syntax {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Invalid include pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid define {key:?}: {message}")]
    InvalidDefine { key: String, message: String },
}

impl TransformError {
    /// Syntax error at a byte offset of `source`.
    pub fn syntax(file: &str, source: &str, offset: usize, message: impl Into<String>) -> Self {
        let (line, column) = location(source, offset);
        Self::Syntax {
            file: file.to_string(),
            line,
            column,
            message: message.into(),
        }
    }

    /// Syntax error from a parser diagnostic, located at its first label.
    pub fn from_diagnostic(file: &str, source: &str, diagnostic: &OxcDiagnostic) -> Self {
        let offset = diagnostic
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map_or(0, |label| label.offset());
        Self::syntax(file, source, offset, diagnostic.to_string())
    }
}

/// 1-based line and column of a byte offset.
pub fn location(source: &str, offset: usize) -> (usize, usize) {
    let before = source.get(..offset.min(source.len())).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}

/// A source-to-source rewrite applied to module text.
pub trait SourceTransform: Send + Sync {
    /// Transform identifier (e.g., "jsx", "define")
    fn name(&self) -> &'static str;

    /// Rewrite `source`, returning the new module text.
    fn transform(&self, source: &str, ctx: &TransformContext) -> Result<String, TransformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_offsets() {
        let src = "a\nbé c\n";
        assert_eq!(location(src, 0), (1, 1));
        assert_eq!(location(src, 2), (2, 1));
        assert_eq!(location(src, 6), (2, 4));
        assert_eq!(location(src, 100), (3, 1));
    }
}
