//! Compile-time constant injection.
//!
//! Replaces dotted identifiers such as `process.env.NODE_ENV` with literal
//! expressions. Matching is done on the syntax tree, so strings, comments
//! and property accesses of other objects (`foo.process.env`) are left alone.

use oxc_ast::ast::{Expression, StaticMemberExpression};

use crate::fold::Constant;
use crate::rewrite::{rewrite, Passes};
use crate::traits::{SourceTransform, TransformContext, TransformError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Define {
    segments: Vec<String>,
    pub(crate) value: String,
    /// The value, when it is a JSON literal
    pub(crate) constant: Option<Constant>,
}

/// A set of identifier replacements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Defines {
    entries: Vec<Define>,
}

impl Defines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` (e.g. `process.env.NODE_ENV`) to be replaced by the
    /// JavaScript expression `value`.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) -> Result<(), TransformError> {
        let segments: Vec<String> = key.split('.').map(str::to_string).collect();
        if !segments.iter().all(|s| is_identifier(s)) {
            return Err(TransformError::InvalidDefine {
                key: key.to_string(),
                message: "expected a dotted identifier".to_string(),
            });
        }

        let value = value.into();
        let constant = serde_json::from_str::<serde_json::Value>(&value)
            .ok()
            .and_then(|v| Constant::from_json(&v));

        self.entries.retain(|d| d.segments != segments);
        self.entries.push(Define {
            segments,
            value,
            constant,
        });
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether `source` could reference any define.
    pub fn mentioned_in(&self, source: &str) -> bool {
        self.entries
            .iter()
            .any(|d| source.contains(d.segments[0].as_str()))
    }

    /// Rewrite a module with the defines alone.
    pub fn apply(&self, source: &str) -> Result<String, TransformError> {
        self.transform(source, &TransformContext::default())
    }

    pub(crate) fn identifier(&self, name: &str) -> Option<&Define> {
        self.lookup(&[name])
    }

    pub(crate) fn member(&self, it: &StaticMemberExpression<'_>) -> Option<&Define> {
        self.lookup(&member_path(it)?)
    }

    fn lookup(&self, path: &[&str]) -> Option<&Define> {
        self.entries
            .iter()
            .find(|d| d.segments.len() == path.len() && d.segments.iter().zip(path).all(|(a, b)| a == b))
    }
}

impl SourceTransform for Defines {
    fn name(&self) -> &'static str {
        "define"
    }

    fn transform(&self, source: &str, ctx: &TransformContext) -> Result<String, TransformError> {
        if !self.mentioned_in(source) {
            return Ok(source.to_string());
        }
        let passes = Passes {
            defines: Some(self),
            ..Passes::default()
        };
        rewrite(&ctx.file, source, passes).map(|(code, _)| code)
    }
}

/// `a.b.c` of a member chain rooted at an identifier.
fn member_path<'e>(it: &'e StaticMemberExpression<'_>) -> Option<Vec<&'e str>> {
    let mut path = vec![it.property.name.as_str()];
    let mut object = &it.object;
    loop {
        match object {
            Expression::StaticMemberExpression(member) => {
                path.push(member.property.name.as_str());
                object = &member.object;
            }
            Expression::Identifier(ident) => {
                path.push(ident.name.as_str());
                break;
            }
            _ => return None,
        }
    }
    path.reverse();
    Some(path)
}

/// ASCII-or-Unicode identifier name, as allowed in a define key.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '$' || c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '$' || c == '_' || c.is_alphanumeric())
}
