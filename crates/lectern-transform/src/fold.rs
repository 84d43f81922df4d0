//! Constant-condition folding.
//!
//! After constants are injected, guards like
//! `if (process.env.NODE_ENV !== 'production') { ... }` become decidable at
//! build time. Such statements are replaced by the branch that would run, so
//! a `require` in the dead branch never reaches the module graph.

use oxc_ast::ast::Expression;
use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};

use crate::define::Defines;
use crate::rewrite::{rewrite, Passes};
use crate::traits::TransformError;

/// A primitive value known at build time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Constant {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Undefined,
}

impl Constant {
    pub(crate) fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self::Str(s.clone())),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Num),
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Null => Some(Self::Null),
            _ => None,
        }
    }

    pub(crate) fn truthy(&self) -> bool {
        match self {
            Self::Str(s) => !s.is_empty(),
            Self::Num(n) => *n != 0.0 && !n.is_nan(),
            Self::Bool(b) => *b,
            Self::Null | Self::Undefined => false,
        }
    }

    fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Num(a), Self::Num(b)) => a == b,
            _ => self == other,
        }
    }

    /// `==`, when it can be decided without objects.
    fn loose_equals(&self, other: &Self) -> Option<bool> {
        use Constant::*;
        match (self, other) {
            (Null | Undefined, Null | Undefined) => Some(true),
            (Null | Undefined, _) | (_, Null | Undefined) => Some(false),
            (Str(_), Str(_)) | (Num(_), Num(_)) | (Bool(_), Bool(_)) => {
                Some(self.strict_equals(other))
            }
            (Bool(b), rest) | (rest, Bool(b)) => {
                Num(if *b { 1.0 } else { 0.0 }).loose_equals(rest)
            }
            (Str(s), Num(n)) | (Num(n), Str(s)) => Some(to_number(s) == *n),
        }
    }
}

fn to_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        0.0
    } else {
        s.parse().unwrap_or(f64::NAN)
    }
}

/// Value of `expr` when it only involves literals and literal defines.
pub(crate) fn evaluate(expr: &Expression<'_>, defines: Option<&Defines>) -> Option<Constant> {
    match expr {
        Expression::StringLiteral(s) => Some(Constant::Str(s.value.to_string())),
        Expression::NumericLiteral(n) => Some(Constant::Num(n.value)),
        Expression::BooleanLiteral(b) => Some(Constant::Bool(b.value)),
        Expression::NullLiteral(_) => Some(Constant::Null),
        Expression::Identifier(ident) => {
            let name = ident.name.as_str();
            match defines.and_then(|d| d.identifier(name)) {
                Some(define) => define.constant.clone(),
                None if name == "undefined" => Some(Constant::Undefined),
                None => None,
            }
        }
        Expression::StaticMemberExpression(member) => defines?.member(member)?.constant.clone(),
        Expression::ParenthesizedExpression(inner) => evaluate(&inner.expression, defines),
        Expression::UnaryExpression(unary) if unary.operator == UnaryOperator::LogicalNot => {
            let value = evaluate(&unary.argument, defines)?;
            Some(Constant::Bool(!value.truthy()))
        }
        Expression::BinaryExpression(binary) => {
            let left = evaluate(&binary.left, defines)?;
            let right = evaluate(&binary.right, defines)?;
            let equal = match binary.operator {
                BinaryOperator::StrictEquality => left.strict_equals(&right),
                BinaryOperator::StrictInequality => !left.strict_equals(&right),
                BinaryOperator::Equality => left.loose_equals(&right)?,
                BinaryOperator::Inequality => !left.loose_equals(&right)?,
                _ => return None,
            };
            Some(Constant::Bool(equal))
        }
        Expression::LogicalExpression(logical) => {
            let left = evaluate(&logical.left, defines)?;
            let short_circuits = match logical.operator {
                LogicalOperator::And => !left.truthy(),
                LogicalOperator::Or => left.truthy(),
                LogicalOperator::Coalesce => !matches!(left, Constant::Null | Constant::Undefined),
            };
            if short_circuits {
                Some(left)
            } else {
                evaluate(&logical.right, defines)
            }
        }
        _ => None,
    }
}

/// Fold the constant conditions of a module on their own.
pub fn fold_constants(source: &str) -> Result<String, TransformError> {
    let passes = Passes {
        fold: true,
        ..Passes::default()
    };
    rewrite("", source, passes).map(|(code, _)| code)
}
