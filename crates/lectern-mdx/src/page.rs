//! Page descriptors and their structural nodes.

use std::path::{Component, Path};

use serde::Serialize;

use crate::codeblock::CodeSample;
use crate::parser::{ParsedDoc, TocEntry};

/// A block-level structural node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Heading {
        level: u8,
        id: String,
        content: Vec<Inline>,
    },
    Paragraph {
        content: Vec<Inline>,
    },
    List {
        ordered: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        start: Option<u64>,
        items: Vec<Vec<Block>>,
    },
    Quote {
        blocks: Vec<Block>,
    },
    Code(CodeSample),
    Html {
        html: String,
    },
    Rule,
}

/// An inline structural node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inline {
    Text { text: String },
    Emphasis { content: Vec<Inline> },
    Strong { content: Vec<Inline> },
    Strikethrough { content: Vec<Inline> },
    Code { text: String },
    Link { href: String, content: Vec<Inline> },
    Image { src: String, alt: String },
    Html { html: String },
    Break,
}

impl Inline {
    /// Concatenated text content, markup stripped.
    pub fn plain_text(nodes: &[Inline]) -> String {
        let mut out = String::new();
        for node in nodes {
            match node {
                Inline::Text { text } | Inline::Code { text } => out.push_str(text),
                Inline::Emphasis { content }
                | Inline::Strong { content }
                | Inline::Strikethrough { content }
                | Inline::Link { content, .. } => out.push_str(&Self::plain_text(content)),
                Inline::Image { alt, .. } => out.push_str(alt),
                Inline::Break => out.push(' '),
                Inline::Html { .. } => {}
            }
        }
        out
    }
}

/// One documentation page, ready to be composed into the site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageDescriptor {
    /// Route/section identifier (`index`, `mvc/api`)
    pub id: String,

    /// Client-side route (`/`, `/mvc/api`)
    pub route: String,

    /// Page title
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Navigation order, lower first
    #[serde(skip)]
    pub order: i32,

    /// Whether the page is listed in navigation
    #[serde(skip)]
    pub nav: bool,

    /// Headings for the page outline
    pub toc: Vec<TocEntry>,

    /// Ordered content blocks
    pub blocks: Vec<Block>,
}

/// Order used for pages without an explicit `order`.
pub const DEFAULT_ORDER: i32 = 999;

impl PageDescriptor {
    /// Build a descriptor from a parsed document and its path relative to
    /// the content directory.
    pub fn new(relative_path: &Path, doc: ParsedDoc) -> Self {
        let frontmatter = doc.frontmatter.unwrap_or_default();

        let id = match frontmatter.slug {
            Some(ref slug) => slug.trim_matches('/').to_string(),
            None => id_from_path(relative_path),
        };
        let id = if id.is_empty() { "index".to_string() } else { id };

        let route = if id == "index" {
            "/".to_string()
        } else {
            format!("/{}", id)
        };

        let title = frontmatter
            .title
            .or_else(|| {
                doc.toc
                    .iter()
                    .find(|entry| entry.level == 1)
                    .map(|entry| entry.title.clone())
            })
            .unwrap_or_else(|| {
                relative_path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("Untitled")
                    .to_string()
            });

        Self {
            id,
            route,
            title,
            description: frontmatter.description,
            order: frontmatter.order.unwrap_or(DEFAULT_ORDER),
            nav: frontmatter.nav,
            toc: doc.toc,
            blocks: doc.blocks,
        }
    }

    /// Code samples in document order, including nested ones.
    pub fn code_samples(&self) -> Vec<&CodeSample> {
        fn walk<'a>(blocks: &'a [Block], out: &mut Vec<&'a CodeSample>) {
            for block in blocks {
                match block {
                    Block::Code(sample) => out.push(sample),
                    Block::Quote { blocks } => walk(blocks, out),
                    Block::List { items, .. } => {
                        for item in items {
                            walk(item, out);
                        }
                    }
                    _ => {}
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.blocks, &mut out);
        out
    }
}

/// `mvc/getting-started.mdx` -> `mvc/getting-started`, `mvc/index.mdx` -> `mvc`.
fn id_from_path(relative: &Path) -> String {
    let mut parts: Vec<String> = relative
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter_map(|c| match c {
                    Component::Normal(s) => s.to_str().map(str::to_string),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let stem = relative
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("index");
    if stem != "index" || parts.is_empty() {
        parts.push(stem.to_string());
    }

    parts.join("/")
}
