//! Bundling: graph, pruning, chunking, codegen and naming.

use std::collections::BTreeSet;
use std::time::Instant;

use regex::Regex;

use lectern_transform::{TransformError, Transformer};

use crate::codegen::{render_main_chunk, render_vendor_chunk};
use crate::graph::{Module, ModuleGraph};
use crate::manifest::{chunk_file_name, Manifest};
use crate::minify::minify;
use crate::resolve::Resolver;
use crate::shake::used_modules;
use crate::source::ModuleSource;
use crate::source_map::{chunk_source_map, compose, source_map_comment, to_json};

/// Configuration for a bundle run.
#[derive(Debug, Clone)]
pub struct BundleOptions {
    /// Entry module, relative to the project root
    pub entry: String,

    /// Extensions tried when resolving relative specifiers
    pub extensions: Vec<String>,

    /// Patterns of module ids that may be dropped when unused
    pub side_effect_free: Vec<String>,

    /// Drop unused side-effect-free modules
    pub prune: bool,

    /// Split `node_modules` into a `vendors` chunk
    pub vendor_chunk: bool,

    /// Minify chunk output
    pub minify: bool,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            entry: "src/js/main.jsx".to_string(),
            extensions: vec![".js".into(), ".jsx".into(), ".json".into()],
            side_effect_free: vec!["crizmas-".to_string()],
            prune: false,
            vendor_chunk: true,
            minify: false,
        }
    }
}

/// Errors that can occur during bundling.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("Entry module not found: {0}")]
    EntryNotFound(String),

    #[error("Module not found: cannot resolve {specifier:?} from {importer}")]
    Unresolved { specifier: String, importer: String },

    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Invalid JSON module {module}: {message}")]
    Json { module: String, message: String },

    #[error("Invalid side-effect-free pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },

    #[error("Failed to write source map: {0}")]
    SourceMap(String),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// An emitted chunk.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Logical name (`vendors`, `main`)
    pub name: String,

    /// Hashed output file name
    pub file_name: String,

    /// Chunk text, ending with a link to its source map
    pub code: String,

    /// Source map JSON, emitted as `<file_name>.map`
    pub map: String,

    /// Ids of the modules in the chunk, sorted
    pub modules: Vec<String>,
}

impl Chunk {
    /// `<file_name>.map`
    pub fn map_file_name(&self) -> String {
        format!("{}.map", self.file_name)
    }
}

/// Result of a bundle run.
#[derive(Debug, Clone)]
pub struct BundleOutput {
    /// Chunks in load order
    pub chunks: Vec<Chunk>,

    pub manifest: Manifest,

    /// Modules emitted
    pub modules: usize,

    /// Modules reached but dropped by pruning
    pub pruned: Vec<String>,
}

/// Module bundler.
pub struct Bundler {
    options: BundleOptions,
    resolver: Resolver,
    transformer: Transformer,
    side_effect_free: Vec<Regex>,
}

impl Bundler {
    pub fn new(options: BundleOptions, transformer: Transformer) -> Result<Self, BundleError> {
        let side_effect_free = options
            .side_effect_free
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| BundleError::Pattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            resolver: Resolver::new(options.extensions.clone()),
            options,
            transformer,
            side_effect_free,
        })
    }

    fn is_side_effect_free(&self, id: &str) -> bool {
        self.side_effect_free.iter().any(|re| re.is_match(id))
    }

    /// Bundle the graph reachable from the configured entry.
    pub fn bundle(&self, source: &ModuleSource) -> Result<BundleOutput, BundleError> {
        let start = Instant::now();

        let graph = ModuleGraph::build(&self.options.entry, source, &self.resolver, &self.transformer)?;

        let kept: BTreeSet<String> = if self.options.prune {
            used_modules(&graph, |id| self.is_side_effect_free(id))
        } else {
            graph.modules.keys().cloned().collect()
        };
        let pruned: Vec<String> = graph
            .modules
            .keys()
            .filter(|id| !kept.contains(*id))
            .cloned()
            .collect();

        let (vendors, main): (Vec<&Module>, Vec<&Module>) = graph
            .modules
            .values()
            .filter(|m| kept.contains(&m.id))
            .partition(|m| self.options.vendor_chunk && m.is_vendor());

        let mut rendered = Vec::new();
        if !vendors.is_empty() {
            let chunk = render_vendor_chunk(&vendors, &kept);
            rendered.push(("vendors", vendors, chunk));
        }
        let chunk = render_main_chunk(&main, &kept, &graph.entry);
        rendered.push(("main", main, chunk));

        let mut chunks = Vec::new();
        let mut manifest = Manifest::new();
        for (name, modules, chunk) in rendered {
            let map = chunk_source_map(name, &chunk);
            let (mut code, map) = if self.options.minify {
                let minified = minify(name, &chunk.code)?;
                let map = match &minified.map {
                    Some(inner) => compose(name, inner, &map),
                    None => map,
                };
                (minified.code, map)
            } else {
                (chunk.code, map)
            };
            if !code.ends_with('\n') {
                code.push('\n');
            }

            // The hash covers the code only; the link names the hashed file.
            let file_name = chunk_file_name(name, &code);
            code.push_str(&source_map_comment(&format!("{}.map", file_name)));
            tracing::debug!(chunk = name, file = %file_name, modules = modules.len(), "Emitted chunk");

            manifest.push(name, file_name.clone());
            chunks.push(Chunk {
                name: name.to_string(),
                file_name,
                code,
                map: to_json(&map)?,
                modules: modules.iter().map(|m| m.id.clone()).collect(),
            });
        }

        tracing::info!(
            "Bundled {} modules into {} chunks in {}ms",
            kept.len(),
            chunks.len(),
            start.elapsed().as_millis()
        );

        Ok(BundleOutput {
            chunks,
            manifest,
            modules: kept.len(),
            pruned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_transform::{Defines, TransformOptions};
    use std::fs;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, text) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, text).unwrap();
        }
        dir
    }

    fn bundler(production: bool, side_effect_free: &[&str]) -> Bundler {
        let mut defines = Defines::new();
        let env = if production { "\"production\"" } else { "\"development\"" };
        defines.insert("process.env.NODE_ENV", env).unwrap();

        let transformer = Transformer::new(TransformOptions {
            defines,
            fold_constants: production,
            ..Default::default()
        })
        .unwrap();
        Bundler::new(
            BundleOptions {
                entry: "src/a.js".to_string(),
                side_effect_free: side_effect_free.iter().map(|s| s.to_string()).collect(),
                prune: production,
                minify: production,
                ..Default::default()
            },
            transformer,
        )
        .unwrap()
    }

    fn chain() -> TempDir {
        project(&[
            ("src/a.js", "import { b } from './b';\nb();"),
            ("src/b.js", "import { c } from './c';\nexport function b() { return 1; }"),
            ("src/c.js", "export const c = 'unused';"),
        ])
    }

    #[test]
    fn production_omits_unused_side_effect_free_module() {
        let dir = chain();
        let source = ModuleSource::new(dir.path());

        let prod = bundler(true, &[r"c\.js$"]).bundle(&source).unwrap();
        assert_eq!(prod.pruned, vec!["src/c.js"]);
        assert_eq!(prod.chunks.len(), 1);
        assert!(!prod.chunks[0].code.contains("src/c.js"));
        assert!(!prod.chunks[0].code.contains("unused"));

        let dev = bundler(false, &[r"c\.js$"]).bundle(&source).unwrap();
        assert!(dev.pruned.is_empty());
        assert!(dev.chunks[0].code.contains("\"src/c.js\""));
        assert!(dev.chunks[0].code.contains("unused"));
    }

    #[test]
    fn output_is_deterministic() {
        let dir = chain();
        let source = ModuleSource::new(dir.path());
        let b = bundler(true, &[]);

        let first = b.bundle(&source).unwrap();
        let second = b.bundle(&source).unwrap();
        assert_eq!(first.manifest, second.manifest);
        assert_eq!(first.chunks[0].code, second.chunks[0].code);
    }

    #[test]
    fn splits_vendors_with_stable_hash() {
        let dir = project(&[
            ("src/a.js", "import lib from 'lib';\nlib('one');"),
            ("node_modules/lib/package.json", r#"{"main": "lib.js"}"#),
            (
                "node_modules/lib/lib.js",
                "if (process.env.NODE_ENV !== 'production') { console.warn('dev'); }\nmodule.exports = function (x) { return x; };",
            ),
        ]);
        let source = ModuleSource::new(dir.path());
        let b = bundler(true, &[]);

        let before = b.bundle(&source).unwrap();
        let names: Vec<&str> = before.chunks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["vendors", "main"]);
        assert_eq!(before.chunks[0].modules, vec!["node_modules/lib/lib.js"]);
        assert!(!before.chunks[0].code.contains("console.warn"));

        fs::write(dir.path().join("src/a.js"), "import lib from 'lib';\nlib('two');").unwrap();
        let after = b.bundle(&source).unwrap();

        assert_eq!(before.manifest.get("vendors"), after.manifest.get("vendors"));
        assert_ne!(before.manifest.get("main"), after.manifest.get("main"));
    }

    #[test]
    fn names_chunks_by_content_hash() {
        let dir = chain();
        let source = ModuleSource::new(dir.path());
        let out = bundler(false, &[]).bundle(&source).unwrap();

        let chunk = &out.chunks[0];
        let link = source_map_comment(&chunk.map_file_name());
        let code = chunk.code.strip_suffix(link.as_str()).unwrap();
        assert_eq!(chunk.file_name, chunk_file_name("main", code));
        assert_eq!(out.manifest.get("main"), Some(chunk.file_name.as_str()));
    }

    #[test]
    fn links_every_chunk_to_its_map() {
        let dir = project(&[
            ("src/a.js", "import lib from 'lib';
const a = 1;
lib(a);"),
            ("node_modules/lib/index.js", "module.exports = function (x) { return x; };"),
        ]);
        let source = ModuleSource::new(dir.path());

        for production in [false, true] {
            let out = bundler(production, &[]).bundle(&source).unwrap();
            assert_eq!(out.chunks.len(), 2);
            for chunk in &out.chunks {
                let link = format!("//# sourceMappingURL={}.map\n", chunk.file_name);
                assert!(chunk.code.ends_with(&link), "{}", chunk.code);

                let map = sourcemap::SourceMap::from_slice(chunk.map.as_bytes()).unwrap();
                let sources: Vec<&str> = map.sources().collect();
                assert_eq!(sources, chunk.modules);
                assert!(map.get_token_count() > 0);
            }
            let main = &out.chunks[1];
            let map = sourcemap::SourceMap::from_slice(main.map.as_bytes()).unwrap();
            assert_eq!(map.get_source_contents(0), Some("import lib from 'lib';\nconst a = 1;\nlib(a);"));
        }
    }

    #[test]
    fn minifies_regex_after_parenthesized_condition() {
        let dir = project(&[(
            "src/a.js",
            "var s = 'a  b';\nvar n = 0;\nif (s) / {2}/.test(s) && n++;\nconsole.log(n);\n",
        )]);
        let source = ModuleSource::new(dir.path());
        let out = bundler(true, &[]).bundle(&source).unwrap();
        assert!(out.chunks[0].code.contains("console.log"));
    }

    #[test]
    fn keeps_modules_used_only_in_templates() {
        let dir = project(&[
            (
                "src/a.js",
                "import { version } from './crizmas-meta';\nconsole.log(`crizmas-mvc ${version}`);",
            ),
            ("src/crizmas-meta.js", "export const version = '1.0.0';"),
        ]);
        let source = ModuleSource::new(dir.path());
        let out = bundler(true, &["crizmas-"]).bundle(&source).unwrap();
        assert!(out.pruned.is_empty());
        assert_eq!(out.chunks[0].modules, vec!["src/a.js", "src/crizmas-meta.js"]);
        assert!(out.chunks[0].code.contains("1.0.0"));
    }

    #[test]
    fn rejects_invalid_patterns() {
        let transformer = Transformer::new(TransformOptions::default()).unwrap();
        let result = Bundler::new(
            BundleOptions {
                side_effect_free: vec!["(".to_string()],
                ..Default::default()
            },
            transformer,
        );
        assert!(matches!(result, Err(BundleError::Pattern { .. })));
    }
}
