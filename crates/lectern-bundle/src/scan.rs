//! Static import/export analysis of a script module.

use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

use lectern_transform::{range, source_type, Edit, TransformError};
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, BindingIdentifier, CallExpression, Declaration, ExportDefaultDeclarationKind,
    ExportNamedDeclaration, Expression, IdentifierReference, ImportDeclaration,
    ImportDeclarationSpecifier, ModuleExportName, ObjectProperty, Statement, TaggedTemplateExpression,
};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_semantic::{Scoping, SemanticBuilder, SymbolId};
use oxc_span::GetSpan;

/// Local name bound to an anonymous `export default` value.
pub const DEFAULT_LOCAL: &str = "__lectern_default__";

/// A binding introduced by an import declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportBinding {
    /// `import x from`
    Default(String),
    /// `import * as x from`
    Namespace(String),
    /// `import { a as x } from`
    Named { imported: String, local: String },
}

impl ImportBinding {
    pub fn local(&self) -> &str {
        match self {
            Self::Default(local) | Self::Namespace(local) => local,
            Self::Named { local, .. } => local,
        }
    }

    /// Export name demanded from the target, `*` for namespaces.
    pub fn imported(&self) -> &str {
        match self {
            Self::Default(_) => "default",
            Self::Namespace(_) => "*",
            Self::Named { imported, .. } => imported,
        }
    }
}

/// `import ... from "specifier"` or `import "specifier"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub specifier: String,
    pub bindings: Vec<ImportBinding>,
}

/// An exported name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Export {
    /// Exported local binding
    Local { exported: String, local: String },
    /// `export { imported as exported } from`; `imported` is `*` for
    /// `export * as exported from`
    From {
        specifier: String,
        imported: String,
        exported: String,
    },
    /// `export * from`
    Star { specifier: String },
}

impl Export {
    pub fn specifier(&self) -> Option<&str> {
        match self {
            Self::Local { .. } => None,
            Self::From { specifier, .. } | Self::Star { specifier } => Some(specifier),
        }
    }
}

/// A `require("specifier")` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Require {
    pub specifier: String,
    /// From `require` through the closing parenthesis
    pub span: Range<usize>,
}

/// Where an imported binding is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Value,
    /// The function of a call or the tag of a template; calling through a
    /// member must not pass the module object as `this`
    Callee,
    /// `{ name }` in an object literal; the range covers the property
    Shorthand,
}

/// One read of an imported binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingReference {
    pub local: String,
    pub range: Range<usize>,
    pub kind: ReferenceKind,
}

/// Everything the bundler needs to know about one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleInfo {
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
    pub requires: Vec<Require>,

    /// Text rewrites that turn the module into a function body:
    /// import/export statements removed, `export` keywords stripped
    pub edits: Vec<Edit>,

    /// Imported bindings the module reads
    pub references: BTreeSet<String>,

    /// Every read of an imported binding, in source order
    pub binding_references: Vec<BindingReference>,
}

impl ModuleInfo {
    /// Uses `import`/`export` syntax.
    pub fn is_esm(&self) -> bool {
        !self.imports.is_empty() || !self.exports.is_empty()
    }

    /// Specifiers in source order, deduplicated.
    pub fn specifiers(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.imports
            .iter()
            .map(|i| i.specifier.as_str())
            .chain(self.exports.iter().filter_map(Export::specifier))
            .chain(self.requires.iter().map(|r| r.specifier.as_str()))
            .filter(|s| seen.insert(*s))
            .collect()
    }
}

/// Scan a module's (already transformed) source.
pub fn scan_module(id: &str, code: &str) -> Result<ModuleInfo, TransformError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, source_type()).parse();
    if let Some(error) = ret.errors.first() {
        return Err(TransformError::from_diagnostic(id, code, error));
    }
    let program = ret.program;
    let semantic = SemanticBuilder::new().build(&program).semantic;

    let mut scanner = Scanner {
        source: code,
        scoping: semantic.scoping(),
        imported: HashMap::new(),
        info: ModuleInfo::default(),
    };
    for statement in &program.body {
        scanner.top_level(statement);
    }
    scanner.visit_program(&program);

    scanner.info.binding_references.sort_by_key(|r| r.range.start);
    Ok(scanner.info)
}

struct Scanner<'s> {
    source: &'s str,
    scoping: &'s Scoping,
    /// Symbols bound by import declarations, with their local names
    imported: HashMap<SymbolId, String>,
    info: ModuleInfo,
}

impl Scanner<'_> {
    fn top_level(&mut self, statement: &Statement<'_>) {
        match statement {
            Statement::ImportDeclaration(decl) => self.import(decl),
            Statement::ExportNamedDeclaration(decl) => self.export_named(decl),
            Statement::ExportDefaultDeclaration(decl) => {
                let start = decl.span.start as usize;
                match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(function) => {
                        let name = function.id.as_ref().map(|id| id.name.to_string());
                        let at = function.params.span.start as usize;
                        let naming = if self.source[..at].ends_with(char::is_whitespace) {
                            Edit::insert(at, format!("{} ", DEFAULT_LOCAL))
                        } else {
                            Edit::insert(at, format!(" {}", DEFAULT_LOCAL))
                        };
                        self.export_default(start, function.span.start as usize, name, naming);
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                        let name = class.id.as_ref().map(|id| id.name.to_string());
                        let at = class.span.start as usize + "class".len();
                        let naming = Edit::insert(at, format!(" {}", DEFAULT_LOCAL));
                        self.export_default(start, class.span.start as usize, name, naming);
                    }
                    expression => {
                        let value_start = expression.span().start as usize;
                        self.local_export("default", DEFAULT_LOCAL);
                        self.info
                            .edits
                            .push(Edit::new(start..value_start, format!("var {} = ", DEFAULT_LOCAL)));
                    }
                }
            }
            Statement::ExportAllDeclaration(decl) => {
                let specifier = decl.source.value.to_string();
                self.info.exports.push(match &decl.exported {
                    Some(exported) => Export::From {
                        specifier,
                        imported: "*".to_string(),
                        exported: exported.name().to_string(),
                    },
                    None => Export::Star { specifier },
                });
                self.info.edits.push(Edit::remove(range(decl.span)));
            }
            _ => {}
        }
    }

    fn import(&mut self, decl: &ImportDeclaration<'_>) {
        let mut bindings = Vec::new();
        for specifier in decl.specifiers.iter().flatten() {
            let (binding, local) = match specifier {
                ImportDeclarationSpecifier::ImportSpecifier(s) => (
                    ImportBinding::Named {
                        imported: s.imported.name().to_string(),
                        local: s.local.name.to_string(),
                    },
                    &s.local,
                ),
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                    (ImportBinding::Default(s.local.name.to_string()), &s.local)
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                    (ImportBinding::Namespace(s.local.name.to_string()), &s.local)
                }
            };
            self.bind(local);
            bindings.push(binding);
        }

        self.info.imports.push(Import {
            specifier: decl.source.value.to_string(),
            bindings,
        });
        self.info.edits.push(Edit::remove(range(decl.span)));
    }

    fn bind(&mut self, local: &BindingIdentifier<'_>) {
        if let Some(symbol) = local.symbol_id.get() {
            self.imported.insert(symbol, local.name.to_string());
        }
    }

    fn export_named(&mut self, decl: &ExportNamedDeclaration<'_>) {
        if let Some(source) = &decl.source {
            for specifier in &decl.specifiers {
                self.info.exports.push(Export::From {
                    specifier: source.value.to_string(),
                    imported: specifier.local.name().to_string(),
                    exported: specifier.exported.name().to_string(),
                });
            }
        } else if let Some(declaration) = &decl.declaration {
            for name in declared_names(declaration) {
                self.local_export(&name, &name);
            }
            let start = decl.span.start as usize;
            self.info
                .edits
                .push(Edit::remove(start..declaration.span().start as usize));
            return;
        } else {
            for specifier in &decl.specifiers {
                let local = specifier.local.name().to_string();
                self.local_export(&specifier.exported.name(), &local);
            }
        }
        self.info.edits.push(Edit::remove(range(decl.span)));
    }

    /// `export default function`/`class`; anonymous ones get a name so the
    /// declaration stays valid without the `export default` prefix.
    fn export_default(
        &mut self,
        start: usize,
        declaration_start: usize,
        name: Option<String>,
        naming: Edit,
    ) {
        let name = match name {
            Some(name) => name,
            None => {
                self.info.edits.push(naming);
                DEFAULT_LOCAL.to_string()
            }
        };
        self.local_export("default", &name);
        self.info.edits.push(Edit::remove(start..declaration_start));
    }

    fn local_export(&mut self, exported: &str, local: &str) {
        self.info.exports.push(Export::Local {
            exported: exported.to_string(),
            local: local.to_string(),
        });
    }

    /// Local name of the import a reference resolves to.
    fn imported_binding(&self, it: &IdentifierReference<'_>) -> Option<String> {
        let reference = it.reference_id.get()?;
        let symbol = self.scoping.get_reference(reference).symbol_id()?;
        self.imported.get(&symbol).cloned()
    }

    fn is_global(&self, it: &IdentifierReference<'_>) -> bool {
        it.reference_id
            .get()
            .is_some_and(|reference| self.scoping.get_reference(reference).symbol_id().is_none())
    }

    fn reference(&mut self, it: &IdentifierReference<'_>, span: Range<usize>, kind: ReferenceKind) -> bool {
        let Some(local) = self.imported_binding(it) else {
            return false;
        };
        self.info.references.insert(local.clone());
        self.info.binding_references.push(BindingReference {
            local,
            range: span,
            kind,
        });
        true
    }

    /// `require("x")` with a plain string and no local `require`.
    fn require_call(&mut self, it: &CallExpression<'_>) -> bool {
        let Expression::Identifier(callee) = &it.callee else {
            return false;
        };
        if callee.name.as_str() != "require" || !self.is_global(callee) || it.arguments.len() != 1 {
            return false;
        }
        let Argument::StringLiteral(specifier) = &it.arguments[0] else {
            return false;
        };
        self.info.requires.push(Require {
            specifier: specifier.value.to_string(),
            span: range(it.span),
        });
        true
    }
}

impl<'a> Visit<'a> for Scanner<'_> {
    fn visit_import_declaration(&mut self, _it: &ImportDeclaration<'a>) {}

    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        if let Some(declaration) = &it.declaration {
            self.visit_declaration(declaration);
            return;
        }
        if it.source.is_some() {
            return;
        }
        // `export { x }` of an import keeps the import in use.
        for specifier in &it.specifiers {
            if let ModuleExportName::IdentifierReference(ident) = &specifier.local {
                if let Some(local) = self.imported_binding(ident) {
                    self.info.references.insert(local);
                }
            }
        }
    }

    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        self.reference(it, range(it.span), ReferenceKind::Value);
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if self.require_call(it) {
            return;
        }
        if let Expression::Identifier(callee) = &it.callee {
            if self.reference(callee, range(callee.span), ReferenceKind::Callee) {
                for argument in &it.arguments {
                    self.visit_argument(argument);
                }
                return;
            }
        }
        walk::walk_call_expression(self, it);
    }

    fn visit_tagged_template_expression(&mut self, it: &TaggedTemplateExpression<'a>) {
        if let Expression::Identifier(tag) = &it.tag {
            if self.reference(tag, range(tag.span), ReferenceKind::Callee) {
                self.visit_template_literal(&it.quasi);
                return;
            }
        }
        walk::walk_tagged_template_expression(self, it);
    }

    fn visit_object_property(&mut self, it: &ObjectProperty<'a>) {
        if it.shorthand {
            if let Expression::Identifier(ident) = &it.value {
                if self.reference(ident, range(it.span), ReferenceKind::Shorthand) {
                    return;
                }
            }
        }
        walk::walk_object_property(self, it);
    }
}

/// Names bound by an exported declaration.
fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(variables) => {
            let mut names = BindingNames::default();
            names.visit_variable_declaration(variables);
            names.0
        }
        Declaration::FunctionDeclaration(function) => {
            function.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(class) => {
            class.id.iter().map(|id| id.name.to_string()).collect()
        }
        _ => Vec::new(),
    }
}

#[derive(Default)]
struct BindingNames(Vec<String>);

impl<'a> Visit<'a> for BindingNames {
    fn visit_binding_identifier(&mut self, it: &BindingIdentifier<'a>) {
        self.0.push(it.name.to_string());
    }

    // Initializers and default values bind nothing.
    fn visit_expression(&mut self, _it: &Expression<'a>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_transform::splice;
    use pretty_assertions::assert_eq;

    fn scan(src: &str) -> ModuleInfo {
        scan_module("src/a.js", src).unwrap()
    }

    fn apply_edits(src: &str, info: &ModuleInfo) -> String {
        splice(src, info.edits.clone()).0
    }

    #[test]
    fn collects_import_forms() {
        let src = "import React, { useState as s, Fragment } from 'react';\nimport * as ns from \"./ns\";\nimport './side.css.js';\nrender(React, s, ns);";
        let info = scan(src);

        assert_eq!(
            info.imports,
            vec![
                Import {
                    specifier: "react".into(),
                    bindings: vec![
                        ImportBinding::Default("React".into()),
                        ImportBinding::Named {
                            imported: "useState".into(),
                            local: "s".into()
                        },
                        ImportBinding::Named {
                            imported: "Fragment".into(),
                            local: "Fragment".into()
                        },
                    ],
                },
                Import {
                    specifier: "./ns".into(),
                    bindings: vec![ImportBinding::Namespace("ns".into())],
                },
                Import {
                    specifier: "./side.css.js".into(),
                    bindings: vec![],
                },
            ]
        );
        assert!(info.references.contains("React"));
        assert!(info.references.contains("s"));
        assert!(!info.references.contains("Fragment"));
        assert!(!info.references.contains("render"));
        assert_eq!(apply_edits(src, &info), "\n\n\nrender(React, s, ns);");
    }

    #[test]
    fn finds_references_in_template_substitutions() {
        let src = "import { version } from './crizmas-meta';\nconsole.log(`crizmas-mvc ${version}`);";
        let info = scan(src);
        assert!(info.references.contains("version"));
        assert_eq!(info.binding_references.len(), 1);
        assert_eq!(&src[info.binding_references[0].range.clone()], "version");
    }

    #[test]
    fn classifies_binding_references() {
        let src = "import f, { g as h } from './f';\nf(1);\nh`x`;\nconst o = { h, k: f };\nfunction local(f) { return f; }";
        let info = scan(src);
        let found: Vec<(&str, &str, ReferenceKind)> = info
            .binding_references
            .iter()
            .map(|r| (r.local.as_str(), &src[r.range.clone()], r.kind))
            .collect();
        assert_eq!(
            found,
            vec![
                ("f", "f", ReferenceKind::Callee),
                ("h", "h", ReferenceKind::Callee),
                ("h", "h", ReferenceKind::Shorthand),
                ("f", "f", ReferenceKind::Value),
            ]
        );
    }

    #[test]
    fn collects_local_exports() {
        let src = "export const a = 1, b = f(1, 2);\nexport let { c, d: e, f = g } = obj\nexport function h() {}\nexport async function i() {}\nexport class J extends K {}\nconst l = 2;\nexport { l, l as m };";
        let info = scan(src);
        let exported: Vec<(&str, &str)> = info
            .exports
            .iter()
            .map(|e| match e {
                Export::Local { exported, local } => (exported.as_str(), local.as_str()),
                _ => panic!("unexpected export {:?}", e),
            })
            .collect();

        assert_eq!(
            exported,
            vec![
                ("a", "a"),
                ("b", "b"),
                ("c", "c"),
                ("e", "e"),
                ("f", "f"),
                ("h", "h"),
                ("i", "i"),
                ("J", "J"),
                ("l", "l"),
                ("m", "l"),
            ]
        );
        assert_eq!(
            apply_edits(src, &info),
            "const a = 1, b = f(1, 2);\nlet { c, d: e, f = g } = obj\nfunction h() {}\nasync function i() {}\nclass J extends K {}\nconst l = 2;\n"
        );
    }

    #[test]
    fn rewrites_default_exports() {
        let info = scan("export default function App() {}");
        assert_eq!(
            info.exports,
            vec![Export::Local {
                exported: "default".into(),
                local: "App".into()
            }]
        );
        assert_eq!(apply_edits("export default function App() {}", &info), "function App() {}");

        let src = "export default function () {}";
        assert_eq!(apply_edits(src, &scan(src)), "function __lectern_default__ () {}");

        let src = "export default function(){}";
        assert_eq!(apply_edits(src, &scan(src)), "function __lectern_default__(){}");

        let src = "export default class extends Base {}";
        assert_eq!(apply_edits(src, &scan(src)), "class __lectern_default__ extends Base {}");

        let src = "export default { pages: [] };";
        assert_eq!(apply_edits(src, &scan(src)), "var __lectern_default__ = { pages: [] };");
    }

    #[test]
    fn collects_reexports() {
        let src = "export { a, default as b } from './a';\nexport * from './c';\nexport * as d from './d';";
        let info = scan(src);

        assert_eq!(
            info.exports,
            vec![
                Export::From {
                    specifier: "./a".into(),
                    imported: "a".into(),
                    exported: "a".into()
                },
                Export::From {
                    specifier: "./a".into(),
                    imported: "default".into(),
                    exported: "b".into()
                },
                Export::Star {
                    specifier: "./c".into()
                },
                Export::From {
                    specifier: "./d".into(),
                    imported: "*".into(),
                    exported: "d".into()
                },
            ]
        );
        assert_eq!(info.specifiers(), vec!["./a", "./c", "./d"]);
        assert_eq!(apply_edits(src, &info), "\n\n");
    }

    #[test]
    fn exported_imports_stay_referenced() {
        let info = scan("import { a } from './a';\nexport { a as b };");
        assert!(info.references.contains("a"));
        assert!(info.binding_references.is_empty());
    }

    #[test]
    fn collects_requires() {
        let src = "if (x) { module.exports = require('./cjs/react.production.min.js'); }\nobj.require('nope'); require(name);";
        let info = scan(src);

        assert_eq!(info.requires.len(), 1);
        assert_eq!(info.requires[0].specifier, "./cjs/react.production.min.js");
        assert_eq!(
            &src[info.requires[0].span.clone()],
            "require('./cjs/react.production.min.js')"
        );
        assert!(!info.is_esm());
    }

    #[test]
    fn ignores_shadowed_require() {
        let info = scan("function f(require) { return require('./x'); }");
        assert!(info.requires.is_empty());
    }

    #[test]
    fn ignores_nested_and_dynamic_forms() {
        let src = "function f() { const x = { export: 1 }; return import('./lazy'); }";
        let info = scan(src);
        assert!(info.imports.is_empty());
        assert!(info.exports.is_empty());
    }

    #[test]
    fn ends_declarations_at_line_breaks() {
        let src = "export const a = () => {\n  return 1\n}\nimport b from './b'\nb(a)";
        let info = scan(src);
        assert_eq!(
            info.exports,
            vec![Export::Local {
                exported: "a".into(),
                local: "a".into()
            }]
        );
        assert_eq!(info.imports.len(), 1);
    }

    #[test]
    fn reports_malformed_imports() {
        let err = scan_module("src/a.js", "import { a from './a';").unwrap_err();
        assert!(err.to_string().starts_with("src/a.js:1:"));
        assert!(scan_module("src/a.js", "import a './a';").is_err());
    }
}
