//! Composition of documentation pages into the site.
//!
//! Pages reach the application through virtual modules:
//!
//! - `lectern:pages/<id>` default-exports one page descriptor;
//! - `lectern:pages` exports the ordered `pages` list and the `nav` tree.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use walkdir::WalkDir;

use lectern_bundle::{ModuleSource, VIRTUAL_PREFIX};
use lectern_mdx::{parse_mdx, PageDescriptor};

use crate::builder::BuildError;

/// Id of the page index module.
pub const PAGES_MODULE: &str = "lectern:pages";

/// A navigation entry: a page, or a section grouping a directory's pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavItem {
    pub title: String,

    /// Route of the page; sections link to their directory
    pub path: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavItem>,
}

/// All pages of the site, in navigation order.
#[derive(Debug, Clone, Default)]
pub struct Site {
    pub pages: Vec<PageDescriptor>,
    pub nav: Vec<NavItem>,
}

impl Site {
    /// Parse every `.md` / `.mdx` file under `content_dir`.
    pub fn load(content_dir: &Path) -> Result<Self, BuildError> {
        if !content_dir.is_dir() {
            return Err(BuildError::ReadError {
                path: content_dir.display().to_string(),
                message: "content directory not found".to_string(),
            });
        }

        let mut pages: Vec<PageDescriptor> = Vec::new();
        let mut sources: BTreeMap<String, String> = BTreeMap::new();

        for entry in WalkDir::new(content_dir).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| BuildError::ReadError {
                path: e
                    .path()
                    .unwrap_or(content_dir)
                    .display()
                    .to_string(),
                message: e.to_string(),
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ext != "mdx" && ext != "md" {
                continue;
            }

            let content = fs::read_to_string(path).map_err(|e| BuildError::ReadError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            let doc = parse_mdx(&content).map_err(|e| BuildError::ParseError {
                path: path.display().to_string(),
                line: e.line(),
                message: e.to_string(),
            })?;

            let relative = path.strip_prefix(content_dir).unwrap_or(path);
            let page = PageDescriptor::new(relative, doc);
            tracing::debug!(page = %page.id, "Parsed {}", relative.display());

            if let Some(first) = sources.insert(page.id.clone(), path.display().to_string()) {
                return Err(BuildError::DuplicatePage {
                    id: page.id,
                    first,
                    second: path.display().to_string(),
                });
            }
            pages.push(page);
        }

        pages.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        let nav = build_navigation(&pages);

        Ok(Self { pages, nav })
    }

    /// Register the page modules with the module source.
    pub fn add_modules(&self, source: &mut ModuleSource) -> Result<(), BuildError> {
        for page in &self.pages {
            let json = to_json(page)?;
            source.add_virtual(page_module(&page.id), format!("export default {};\n", json));
        }
        source.add_virtual(PAGES_MODULE, self.index_module()?);
        Ok(())
    }

    fn index_module(&self) -> Result<String, BuildError> {
        let mut code = String::new();
        for (i, page) in self.pages.iter().enumerate() {
            code.push_str(&format!(
                "import __page{} from {};\n",
                i,
                to_json(&page_module(&page.id))?
            ));
        }

        let list: Vec<String> = (0..self.pages.len()).map(|i| format!("__page{}", i)).collect();
        code.push_str(&format!("export const pages = [{}];\n", list.join(", ")));
        code.push_str(&format!("export const nav = {};\n", to_json(&self.nav)?));
        code.push_str("export default pages;\n");
        Ok(code)
    }
}

/// Virtual module id of a page.
pub fn page_module(id: &str) -> String {
    format!("{}/{}", PAGES_MODULE, id)
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, BuildError> {
    serde_json::to_string(value).map_err(|e| BuildError::WriteError {
        path: VIRTUAL_PREFIX.to_string(),
        message: e.to_string(),
    })
}

/// Group navigable pages by directory. Top-level pages come first, then one
/// section per directory in name order.
fn build_navigation(pages: &[PageDescriptor]) -> Vec<NavItem> {
    let mut nav = Vec::new();
    let mut dirs: BTreeMap<&str, Vec<NavItem>> = BTreeMap::new();

    for page in pages {
        if !page.nav {
            continue;
        }

        let item = NavItem {
            title: page.title.clone(),
            path: page.route.clone(),
            children: Vec::new(),
        };

        match page.id.rsplit_once('/') {
            Some((dir, _)) => dirs.entry(dir).or_default().push(item),
            None => nav.push(item),
        }
    }

    for (dir, items) in dirs {
        let name = dir.rsplit('/').next().unwrap_or(dir);
        nav.push(NavItem {
            title: capitalize(name),
            path: format!("/{}", dir),
            children: items,
        });
    }

    nav
}

/// Capitalize first letter of a string.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
