//! One pass over the parsed module.
//!
//! JSX compilation, constant injection and condition folding all run in the
//! same visitor. Each produces edits against the original text; nodes it
//! replaces are rewritten by a nested pass over their own range so inner
//! rewrites are kept.

use std::ops::Range;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ConditionalExpression, Expression, ExportNamedDeclaration, IdentifierReference, IfStatement,
    JSXElement, JSXFragment, ObjectProperty, Statement, StaticMemberExpression,
};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};

use crate::define::Defines;
use crate::edit::{splice, splice_range, Edit, SourceMapping};
use crate::fold::evaluate;
use crate::jsx::JsxOptions;
use crate::traits::TransformError;

/// How modules are parsed: module or script decided by content, JSX allowed.
pub fn source_type() -> SourceType {
    SourceType::unambiguous().with_jsx(true)
}

/// Byte range of a span.
pub fn range(span: Span) -> Range<usize> {
    span.start as usize..span.end as usize
}

/// Rewrites enabled for one module.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Passes<'o> {
    pub jsx: Option<&'o JsxOptions>,
    pub defines: Option<&'o Defines>,
    pub fold: bool,
}

/// Parse `source` and apply `passes`.
pub(crate) fn rewrite(
    file: &str,
    source: &str,
    passes: Passes<'_>,
) -> Result<(String, SourceMapping), TransformError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type()).parse();
    if let Some(error) = ret.errors.first() {
        return Err(TransformError::from_diagnostic(file, source, error));
    }

    let mut rewriter = Rewriter::new(source, passes);
    rewriter.visit_program(&ret.program);
    Ok(splice(source, rewriter.edits))
}

pub(crate) struct Rewriter<'s> {
    source: &'s str,
    passes: Passes<'s>,
    edits: Vec<Edit>,
}

impl<'s> Rewriter<'s> {
    fn new(source: &'s str, passes: Passes<'s>) -> Self {
        Self {
            source,
            passes,
            edits: Vec::new(),
        }
    }

    pub(crate) fn slice(&self, span: Span) -> &'s str {
        self.source.get(range(span)).unwrap_or("")
    }

    fn replace(&mut self, span: Span, text: String) {
        self.edits.push(Edit::new(range(span), text));
    }

    /// Text of `span` after a nested pass run by `visit`.
    fn nested(&self, span: Span, visit: impl FnOnce(&mut Rewriter<'s>)) -> String {
        let mut inner = Rewriter::new(self.source, self.passes);
        visit(&mut inner);
        splice_range(self.source, range(span), inner.edits).0
    }

    pub(crate) fn expression(&self, expr: &Expression<'_>) -> String {
        self.nested(expr.span(), |r| r.visit_expression(expr))
    }

    fn statement(&self, stmt: &Statement<'_>) -> String {
        self.nested(stmt.span(), |r| r.visit_statement(stmt))
    }

    fn condition(&self, test: &Expression<'_>) -> Option<bool> {
        if !self.passes.fold {
            return None;
        }
        evaluate(test, self.passes.defines).map(|c| c.truthy())
    }
}

impl<'a> Visit<'a> for Rewriter<'_> {
    fn visit_jsx_element(&mut self, it: &JSXElement<'a>) {
        match self.passes.jsx {
            Some(options) => {
                let text = self.element(options, it);
                self.replace(it.span, text);
            }
            None => walk::walk_jsx_element(self, it),
        }
    }

    fn visit_jsx_fragment(&mut self, it: &JSXFragment<'a>) {
        match self.passes.jsx {
            Some(options) => {
                let text = self.fragment(options, it);
                self.replace(it.span, text);
            }
            None => walk::walk_jsx_fragment(self, it),
        }
    }

    fn visit_static_member_expression(&mut self, it: &StaticMemberExpression<'a>) {
        if let Some(define) = self.passes.defines.and_then(|d| d.member(it)) {
            let value = define.value.clone();
            self.replace(it.span, value);
            return;
        }
        walk::walk_static_member_expression(self, it);
    }

    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        if let Some(define) = self.passes.defines.and_then(|d| d.identifier(it.name.as_str())) {
            let value = define.value.clone();
            self.replace(it.span, value);
        }
    }

    fn visit_object_property(&mut self, it: &ObjectProperty<'a>) {
        if it.shorthand {
            if let Expression::Identifier(ident) = &it.value {
                let name = ident.name.as_str();
                if let Some(define) = self.passes.defines.and_then(|d| d.identifier(name)) {
                    let text = format!("{}: {}", ident.name, define.value);
                    self.replace(it.span, text);
                    return;
                }
            }
        }
        walk::walk_object_property(self, it);
    }

    // Export lists name bindings, not values.
    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        if let Some(declaration) = &it.declaration {
            self.visit_declaration(declaration);
        }
    }

    fn visit_if_statement(&mut self, it: &IfStatement<'a>) {
        let Some(test) = self.condition(&it.test) else {
            walk::walk_if_statement(self, it);
            return;
        };

        let text = match (test, &it.alternate) {
            (true, _) => self.statement(&it.consequent),
            (false, Some(alternate)) => self.statement(alternate),
            (false, None) => ";".to_string(),
        };
        self.replace(it.span, text);
    }

    fn visit_conditional_expression(&mut self, it: &ConditionalExpression<'a>) {
        let Some(test) = self.condition(&it.test) else {
            walk::walk_conditional_expression(self, it);
            return;
        };

        let branch = if test { &it.consequent } else { &it.alternate };
        let text = format!("({})", self.expression(branch));
        self.replace(it.span, text);
    }
}
