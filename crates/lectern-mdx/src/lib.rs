//! Documentation page parser.
//!
//! Parses Markdown/MDX pages with YAML frontmatter into immutable page
//! descriptors: an identifier, a title and an ordered tree of content blocks
//! that serialises to plain structural nodes.

pub mod codeblock;
pub mod frontmatter;
pub mod page;
pub mod parser;

pub use codeblock::{CodeSample, Language};
pub use frontmatter::{Frontmatter, FrontmatterError};
pub use page::{Block, Inline, PageDescriptor};
pub use parser::{parse_mdx, slugify, ParseError, ParsedDoc, TocEntry};
