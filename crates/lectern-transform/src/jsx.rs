//! JSX compiler.
//!
//! Rewrites every JSX element of a module into a factory call
//! (`React.createElement(type, props, ...children)`), leaving the surrounding
//! JavaScript byte for byte intact.

use oxc_ast::ast::{
    JSXAttributeItem, JSXAttributeValue, JSXChild, JSXElement, JSXExpression, JSXFragment,
};
use oxc_span::GetSpan;

use crate::define::is_identifier;
use crate::rewrite::{rewrite, Passes, Rewriter};
use crate::traits::{SourceTransform, TransformContext, TransformError};

/// Options for the JSX compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsxOptions {
    /// Element factory, e.g. `React.createElement`
    pub factory: String,
    /// Fragment component, e.g. `React.Fragment`
    pub fragment: String,
}

impl Default for JsxOptions {
    fn default() -> Self {
        Self {
            factory: "React.createElement".to_string(),
            fragment: "React.Fragment".to_string(),
        }
    }
}

/// JSX to factory-call transform.
#[derive(Debug, Clone, Default)]
pub struct JsxTransform {
    options: JsxOptions,
}

impl JsxTransform {
    pub fn new(options: JsxOptions) -> Self {
        Self { options }
    }
}

impl SourceTransform for JsxTransform {
    fn name(&self) -> &'static str {
        "jsx"
    }

    fn transform(&self, source: &str, ctx: &TransformContext) -> Result<String, TransformError> {
        let passes = Passes {
            jsx: Some(&self.options),
            defines: None,
            fold: false,
        };
        rewrite(&ctx.file, source, passes).map(|(code, _)| code)
    }
}

/// A prop in an opening tag.
enum Prop {
    Named(String, String),
    Spread(String),
}

impl Rewriter<'_> {
    pub(crate) fn element(&self, options: &JsxOptions, it: &JSXElement<'_>) -> String {
        let opening = &it.opening_element;
        let name = compact(self.slice(opening.name.span()));

        let mut props = Vec::with_capacity(opening.attributes.len());
        for item in &opening.attributes {
            match item {
                JSXAttributeItem::Attribute(attr) => {
                    let key = compact(self.slice(attr.name.span()));
                    let value = match &attr.value {
                        Some(value) => self.attribute_value(options, value),
                        None => "true".to_string(),
                    };
                    props.push(Prop::Named(key, value));
                }
                JSXAttributeItem::SpreadAttribute(spread) => {
                    props.push(Prop::Spread(self.expression(&spread.argument)));
                }
            }
        }

        let children = self.children(options, &it.children);
        call(options, &tag_expression(&name), &props, &children)
    }

    pub(crate) fn fragment(&self, options: &JsxOptions, it: &JSXFragment<'_>) -> String {
        let children = self.children(options, &it.children);
        call(options, &options.fragment, &[], &children)
    }

    fn attribute_value(&self, options: &JsxOptions, value: &JSXAttributeValue<'_>) -> String {
        match value {
            JSXAttributeValue::StringLiteral(literal) => {
                let raw = self.slice(literal.span);
                let inner = raw.get(1..raw.len().saturating_sub(1)).unwrap_or("");
                js_string(&decode_entities(inner))
            }
            JSXAttributeValue::ExpressionContainer(container) => self
                .container(&container.expression)
                .unwrap_or_else(|| "true".to_string()),
            JSXAttributeValue::Element(element) => self.element(options, element),
            JSXAttributeValue::Fragment(fragment) => self.fragment(options, fragment),
        }
    }

    /// Rewritten expression of `{...}`; `None` for `{}` and `{/* comment */}`.
    fn container(&self, expression: &JSXExpression<'_>) -> Option<String> {
        expression.as_expression().map(|e| self.expression(e))
    }

    fn children(&self, options: &JsxOptions, children: &[JSXChild<'_>]) -> Vec<String> {
        let mut out = Vec::with_capacity(children.len());
        for child in children {
            match child {
                JSXChild::Text(text) => {
                    let cleaned = clean_jsx_text(self.slice(text.span));
                    if !cleaned.is_empty() {
                        out.push(js_string(&decode_entities(&cleaned)));
                    }
                }
                JSXChild::Element(element) => out.push(self.element(options, element)),
                JSXChild::Fragment(fragment) => out.push(self.fragment(options, fragment)),
                JSXChild::ExpressionContainer(container) => {
                    out.extend(self.container(&container.expression));
                }
                JSXChild::Spread(spread) => {
                    out.push(format!("...{}", self.expression(&spread.expression)));
                }
            }
        }
        out
    }
}

fn call(options: &JsxOptions, tag: &str, props: &[Prop], children: &[String]) -> String {
    let mut out = format!("{}({}, {}", options.factory, tag, props_expression(props));
    for child in children {
        out.push_str(", ");
        out.push_str(child);
    }
    out.push(')');
    out
}

/// Element and attribute names without the whitespace JSX allows around
/// `.` and `:`.
fn compact(name: &str) -> String {
    name.split_whitespace().collect()
}

/// Intrinsic elements become strings, components stay references.
fn tag_expression(name: &str) -> String {
    let intrinsic = name.contains('-')
        || name.contains(':')
        || (!name.contains('.') && name.starts_with(|c: char| c.is_ascii_lowercase()));
    if intrinsic {
        js_string(name)
    } else {
        name.to_string()
    }
}

fn props_expression(props: &[Prop]) -> String {
    if props.is_empty() {
        return "null".to_string();
    }

    let object = |named: &[(&str, &str)]| {
        let fields: Vec<String> = named
            .iter()
            .map(|(k, v)| format!("{}: {}", object_key(k), v))
            .collect();
        format!("{{ {} }}", fields.join(", "))
    };

    if !props.iter().any(|p| matches!(p, Prop::Spread(_))) {
        let named: Vec<(&str, &str)> = props
            .iter()
            .filter_map(|p| match p {
                Prop::Named(k, v) => Some((k.as_str(), v.as_str())),
                Prop::Spread(_) => None,
            })
            .collect();
        return object(&named);
    }

    let mut parts = vec!["{}".to_string()];
    let mut pending: Vec<(&str, &str)> = Vec::new();
    for prop in props {
        match prop {
            Prop::Named(k, v) => pending.push((k, v)),
            Prop::Spread(expr) => {
                if !pending.is_empty() {
                    parts.push(object(&pending));
                    pending.clear();
                }
                parts.push(expr.clone());
            }
        }
    }
    if !pending.is_empty() {
        parts.push(object(&pending));
    }
    format!("Object.assign({})", parts.join(", "))
}

fn object_key(key: &str) -> String {
    if is_identifier(key) {
        key.to_string()
    } else {
        js_string(key)
    }
}

/// Whitespace handling of JSX text: lines are trimmed, blank lines dropped
/// and the rest joined with single spaces.
pub fn clean_jsx_text(raw: &str) -> String {
    let lines: Vec<&str> = raw.split('\n').map(|l| l.trim_end_matches('\r')).collect();
    let last_non_empty = lines
        .iter()
        .rposition(|l| l.chars().any(|c| c != ' ' && c != '\t'));

    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let is_first = i == 0;
        let is_last = i == lines.len() - 1;

        let mut trimmed: &str = line;
        if !is_first {
            trimmed = trimmed.trim_start_matches([' ', '\t']);
        }
        if !is_last {
            trimmed = trimmed.trim_end_matches([' ', '\t']);
        }
        if trimmed.is_empty() {
            continue;
        }
        out.push_str(&trimmed.replace('\t', " "));
        if Some(i) != last_non_empty {
            out.push(' ');
        }
    }
    out
}

/// Decode the HTML entities allowed in JSX text and attribute strings.
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &after[..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                "copy" => Some('\u{a9}'),
                "ndash" => Some('\u{2013}'),
                "mdash" => Some('\u{2014}'),
                "hellip" => Some('\u{2026}'),
                "laquo" => Some('\u{ab}'),
                "raquo" => Some('\u{bb}'),
                _ => {
                    if let Some(hex) = entity
                        .strip_prefix("#x")
                        .or_else(|| entity.strip_prefix("#X"))
                    {
                        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
                    } else if let Some(dec) = entity.strip_prefix('#') {
                        dec.parse::<u32>().ok().and_then(char::from_u32)
                    } else {
                        None
                    }
                }
            };
            c.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Double-quoted JavaScript string literal.
pub fn js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Compile a source with the default options.
pub fn compile(source: &str, file: &str) -> Result<String, TransformError> {
    JsxTransform::default().transform(source, &TransformContext::new(file))
}
