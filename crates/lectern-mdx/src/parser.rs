//! Page document parser.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};
use serde::Serialize;

use crate::codeblock::CodeSample;
use crate::frontmatter::{extract_frontmatter, Frontmatter, FrontmatterError};
use crate::page::{Block, Inline};

/// A parsed page document.
#[derive(Debug, Clone)]
pub struct ParsedDoc {
    /// Parsed frontmatter (if present)
    pub frontmatter: Option<Frontmatter>,

    /// Structural content blocks
    pub blocks: Vec<Block>,

    /// Table of contents entries
    pub toc: Vec<TocEntry>,
}

/// A table of contents entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TocEntry {
    /// Heading text
    pub title: String,
    /// Anchor ID
    pub id: String,
    /// Heading level (1-6)
    pub level: u8,
}

/// Errors that can occur when parsing a page.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Frontmatter error: {0}")]
    Frontmatter(#[from] FrontmatterError),
}

impl ParseError {
    /// Source line the error points at (1-indexed).
    pub fn line(&self) -> usize {
        match self {
            Self::Frontmatter(e) => e.line(),
        }
    }
}

/// What an open container on the builder stack is.
#[derive(Debug)]
enum FrameKind {
    Root,
    Heading(u8),
    Paragraph,
    List { ordered: bool, start: Option<u64> },
    Item,
    Quote,
    Emphasis,
    Strong,
    Strikethrough,
    Link(String),
    Image(String),
    Code { info: String, line: usize },
    Html,
    Other,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    blocks: Vec<Block>,
    inlines: Vec<Inline>,
    items: Vec<Vec<Block>>,
    text: String,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            blocks: Vec::new(),
            inlines: Vec::new(),
            items: Vec::new(),
            text: String::new(),
        }
    }

    /// Tight list items carry inlines without a paragraph around them.
    fn flush_inlines(&mut self) {
        if !self.inlines.is_empty() {
            let content = std::mem::take(&mut self.inlines);
            self.blocks.push(Block::Paragraph { content });
        }
    }
}

/// Turns the flat event stream into a block tree.
struct TreeBuilder {
    stack: Vec<Frame>,
    toc: Vec<TocEntry>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Frame::new(FrameKind::Root)],
            toc: Vec::new(),
        }
    }

    fn top(&mut self) -> &mut Frame {
        self.stack
            .last_mut()
            .expect("root frame is never popped")
    }

    fn push_block(&mut self, block: Block) {
        let top = self.top();
        top.flush_inlines();
        top.blocks.push(block);
    }

    fn push_inline(&mut self, inline: Inline) {
        let top = self.top();
        if let (Some(Inline::Text { text: prev }), Inline::Text { text }) =
            (top.inlines.last_mut(), &inline)
        {
            prev.push_str(text);
            return;
        }
        top.inlines.push(inline);
    }

    fn push_text(&mut self, text: &str) {
        let raw = matches!(self.top().kind, FrameKind::Code { .. } | FrameKind::Html);
        if raw {
            self.top().text.push_str(text);
        } else {
            self.push_inline(Inline::Text {
                text: text.to_string(),
            });
        }
    }

    fn open(&mut self, kind: FrameKind) {
        if matches!(
            kind,
            FrameKind::List { .. } | FrameKind::Quote | FrameKind::Code { .. } | FrameKind::Html
        ) {
            self.top().flush_inlines();
        }
        self.stack.push(Frame::new(kind));
    }

    fn close(&mut self) {
        if self.stack.len() == 1 {
            return;
        }
        let Some(mut frame) = self.stack.pop() else {
            return;
        };

        match frame.kind {
            FrameKind::Heading(level) => {
                let title = Inline::plain_text(&frame.inlines);
                let id = self.unique_anchor(&slugify(&title));
                self.toc.push(TocEntry {
                    title,
                    id: id.clone(),
                    level,
                });
                self.push_block(Block::Heading {
                    level,
                    id,
                    content: frame.inlines,
                });
            }
            FrameKind::Paragraph => {
                self.push_block(Block::Paragraph {
                    content: frame.inlines,
                });
            }
            FrameKind::List { ordered, start } => {
                self.push_block(Block::List {
                    ordered,
                    start,
                    items: frame.items,
                });
            }
            FrameKind::Item => {
                frame.flush_inlines();
                self.top().items.push(frame.blocks);
            }
            FrameKind::Quote => {
                frame.flush_inlines();
                self.push_block(Block::Quote {
                    blocks: frame.blocks,
                });
            }
            FrameKind::Emphasis => self.push_inline(Inline::Emphasis {
                content: frame.inlines,
            }),
            FrameKind::Strong => self.push_inline(Inline::Strong {
                content: frame.inlines,
            }),
            FrameKind::Strikethrough => self.push_inline(Inline::Strikethrough {
                content: frame.inlines,
            }),
            FrameKind::Link(href) => self.push_inline(Inline::Link {
                href,
                content: frame.inlines,
            }),
            FrameKind::Image(src) => self.push_inline(Inline::Image {
                src,
                alt: Inline::plain_text(&frame.inlines),
            }),
            FrameKind::Code { info, line } => {
                self.push_block(Block::Code(CodeSample::from_info(&info, frame.text, line)));
            }
            FrameKind::Html => self.push_block(Block::Html { html: frame.text }),
            FrameKind::Root | FrameKind::Other => {
                // Unknown containers are transparent.
                if frame.blocks.is_empty() {
                    for inline in frame.inlines {
                        self.push_inline(inline);
                    }
                } else {
                    frame.flush_inlines();
                    let top = self.top();
                    top.flush_inlines();
                    top.blocks.extend(frame.blocks);
                }
            }
        }
    }

    fn unique_anchor(&self, base: &str) -> String {
        let base = if base.is_empty() { "section" } else { base };
        if !self.toc.iter().any(|e| e.id == base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{}-{}", base, n))
            .find(|candidate| !self.toc.iter().any(|e| &e.id == candidate))
            .unwrap_or_else(|| base.to_string())
    }

    fn finish(mut self) -> (Vec<Block>, Vec<TocEntry>) {
        while self.stack.len() > 1 {
            self.close();
        }
        let mut root = self.stack.remove(0);
        root.flush_inlines();
        (root.blocks, self.toc)
    }
}

/// Parse a page document.
///
/// Extracts frontmatter, builds the structural block tree and the table of
/// contents.
pub fn parse_mdx(source: &str) -> Result<ParsedDoc, ParseError> {
    let (frontmatter, content) = extract_frontmatter(source)?;

    // Lines consumed by the frontmatter block, to report source lines.
    let consumed = source.len() - content.len();
    let line_offset = source[..consumed].matches('\n').count();

    let options = Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(content, options).into_offset_iter();

    let mut builder = TreeBuilder::new();

    for (event, range) in parser {
        match event {
            Event::Start(tag) => {
                let kind = match tag {
                    Tag::Heading { level, .. } => FrameKind::Heading(level as u8),
                    Tag::Paragraph => FrameKind::Paragraph,
                    Tag::List(start) => FrameKind::List {
                        ordered: start.is_some(),
                        start: start.filter(|s| *s != 1),
                    },
                    Tag::Item => FrameKind::Item,
                    Tag::BlockQuote(..) => FrameKind::Quote,
                    Tag::Emphasis => FrameKind::Emphasis,
                    Tag::Strong => FrameKind::Strong,
                    Tag::Strikethrough => FrameKind::Strikethrough,
                    Tag::Link { dest_url, .. } => FrameKind::Link(dest_url.to_string()),
                    Tag::Image { dest_url, .. } => FrameKind::Image(dest_url.to_string()),
                    Tag::CodeBlock(kind) => {
                        let info = match kind {
                            CodeBlockKind::Fenced(info) => info.to_string(),
                            CodeBlockKind::Indented => String::new(),
                        };
                        let line = content[..range.start].matches('\n').count() + 1 + line_offset;
                        FrameKind::Code { info, line }
                    }
                    Tag::HtmlBlock => FrameKind::Html,
                    _ => FrameKind::Other,
                };
                builder.open(kind);
            }
            Event::End(_) => builder.close(),
            Event::Text(text) => builder.push_text(&text),
            Event::Code(text) => builder.push_inline(Inline::Code {
                text: text.to_string(),
            }),
            Event::Html(html) => builder.push_text(&html),
            Event::InlineHtml(html) => builder.push_inline(Inline::Html {
                html: html.to_string(),
            }),
            Event::SoftBreak => builder.push_text(" "),
            Event::HardBreak => builder.push_inline(Inline::Break),
            Event::Rule => builder.push_block(Block::Rule),
            _ => {}
        }
    }

    let (blocks, toc) = builder.finish();

    Ok(ParsedDoc {
        frontmatter,
        blocks,
        toc,
    })
}

/// Convert a heading to a URL-safe slug.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codeblock::Language;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_complete_page() {
        let source = r#"---
title: Getting started
description: Installing the framework
---

## Getting started

The simplest way is the `create-crizmas` command.

```bash
npx create-crizmas -A
```

### Example

```js file=js/models/flowers-model.js
export class Flower {}
```
"#;

        let doc = parse_mdx(source).unwrap();

        let fm = doc.frontmatter.unwrap();
        assert_eq!(fm.title.as_deref(), Some("Getting started"));

        assert_eq!(doc.blocks.len(), 5);
        match &doc.blocks[1] {
            Block::Paragraph { content } => {
                assert!(content.contains(&Inline::Code {
                    text: "create-crizmas".to_string()
                }));
            }
            other => panic!("expected paragraph, got {:?}", other),
        }

        match &doc.blocks[2] {
            Block::Code(sample) => {
                assert_eq!(sample.language, Language::Bash);
                assert_eq!(sample.text, "npx create-crizmas -A\n");
                assert_eq!(sample.line_number, 10);
            }
            other => panic!("expected code, got {:?}", other),
        }

        match &doc.blocks[4] {
            Block::Code(sample) => {
                assert_eq!(sample.filename.as_deref(), Some("js/models/flowers-model.js"));
            }
            other => panic!("expected code, got {:?}", other),
        }

        assert_eq!(doc.toc.len(), 2);
        assert_eq!(doc.toc[0].title, "Getting started");
        assert_eq!(doc.toc[0].level, 2);
        assert_eq!(doc.toc[0].id, "getting-started");
        assert_eq!(doc.toc[1].title, "Example");
        assert_eq!(doc.toc[1].level, 3);
    }

    #[test]
    fn parses_without_frontmatter() {
        let source = "# Just Markdown\n\nNo frontmatter.";

        let doc = parse_mdx(source).unwrap();

        assert!(doc.frontmatter.is_none());
        assert_eq!(doc.toc.len(), 1);
        assert_eq!(doc.toc[0].title, "Just Markdown");
    }

    #[test]
    fn wraps_tight_list_items_in_paragraphs() {
        let doc = parse_mdx("- -R or --router\n- -F or --form\n").unwrap();

        assert_eq!(
            doc.blocks,
            vec![Block::List {
                ordered: false,
                start: None,
                items: vec![
                    vec![Block::Paragraph {
                        content: vec![Inline::Text {
                            text: "-R or --router".to_string()
                        }]
                    }],
                    vec![Block::Paragraph {
                        content: vec![Inline::Text {
                            text: "-F or --form".to_string()
                        }]
                    }],
                ],
            }]
        );
    }

    #[test]
    fn keeps_links_and_emphasis() {
        let doc = parse_mdx("See [webpack](https://webpack.js.org) **now**.").unwrap();

        let Block::Paragraph { content } = &doc.blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            content[1],
            Inline::Link {
                href: "https://webpack.js.org".to_string(),
                content: vec![Inline::Text {
                    text: "webpack".to_string()
                }],
            }
        );
        assert!(matches!(content[3], Inline::Strong { .. }));
    }

    #[test]
    fn deduplicates_heading_anchors() {
        let doc = parse_mdx("## Example\n\n## Example\n\n## Example").unwrap();

        let ids: Vec<_> = doc.toc.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["example", "example-1", "example-2"]);
    }

    #[test]
    fn keeps_block_html() {
        let doc = parse_mdx("<div class=\"note\">\nhello\n</div>\n").unwrap();

        assert!(matches!(&doc.blocks[0], Block::Html { html } if html.contains("note")));
    }

    #[test]
    fn slugify_works() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("API Reference"), "api-reference");
        assert_eq!(slugify("Mvc (constructor)"), "mvc-constructor");
        assert_eq!(slugify("  Multiple   Spaces  "), "multiple-spaces");
    }
}
