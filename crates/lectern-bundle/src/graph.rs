//! Module graph construction.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use tracing::debug;

use lectern_transform::{SourceMapping, Transformer};

use crate::bundler::BundleError;
use crate::resolve::Resolver;
use crate::scan::{scan_module, ModuleInfo};
use crate::source::ModuleSource;

/// How a module's text is turned into code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Script,
    Json,
}

/// A loaded, transformed and scanned module.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: String,
    pub kind: ModuleKind,

    /// Text as read, for source maps
    pub source: String,

    /// Transformed source
    pub code: String,

    /// Transformed code back to `source`
    pub mapping: SourceMapping,

    pub info: ModuleInfo,

    /// Specifier -> resolved module id
    pub resolved: BTreeMap<String, String>,
}

impl Module {
    pub fn target(&self, specifier: &str) -> Option<&str> {
        self.resolved.get(specifier).map(String::as_str)
    }

    pub fn is_vendor(&self) -> bool {
        self.id.starts_with("node_modules/")
    }
}

/// All modules reachable from the entry, keyed (and so ordered) by id.
#[derive(Debug, Clone)]
pub struct ModuleGraph {
    pub entry: String,
    pub modules: BTreeMap<String, Module>,
}

impl ModuleGraph {
    /// Walk the graph from `entry` breadth-first. Each frontier is loaded in
    /// parallel; results are merged in id order.
    pub fn build(
        entry: &str,
        source: &ModuleSource,
        resolver: &Resolver,
        transformer: &Transformer,
    ) -> Result<Self, BundleError> {
        let specifier = if entry.starts_with("./")
            || entry.starts_with("../")
            || ModuleSource::is_virtual(entry)
        {
            entry.to_string()
        } else {
            format!("./{}", entry.trim_start_matches('/'))
        };
        let entry_id = resolver
            .resolve(source, &specifier, "")
            .ok_or_else(|| BundleError::EntryNotFound(entry.to_string()))?;

        let mut modules = BTreeMap::new();
        let mut seen = BTreeSet::from([entry_id.clone()]);
        let mut frontier = vec![entry_id.clone()];

        while !frontier.is_empty() {
            let loaded: Vec<Result<Module, BundleError>> = frontier
                .par_iter()
                .map(|id| load_module(id, source, resolver, transformer))
                .collect();

            let mut next = BTreeSet::new();
            for module in loaded {
                let module = module?;
                for target in module.resolved.values() {
                    if seen.insert(target.clone()) {
                        next.insert(target.clone());
                    }
                }
                modules.insert(module.id.clone(), module);
            }
            frontier = next.into_iter().collect();
        }

        debug!(entry = %entry_id, modules = modules.len(), "Built module graph");

        Ok(Self {
            entry: entry_id,
            modules,
        })
    }

    pub fn get(&self, id: &str) -> Option<&Module> {
        self.modules.get(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

fn load_module(
    id: &str,
    source: &ModuleSource,
    resolver: &Resolver,
    transformer: &Transformer,
) -> Result<Module, BundleError> {
    let text = source.read(id)?;

    let (kind, code, mapping, info) = if id.ends_with(".json") {
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| BundleError::Json {
                module: id.to_string(),
                message: e.to_string(),
            })?;
        (
            ModuleKind::Json,
            format!("module.exports = {};", value),
            SourceMapping::generated(),
            ModuleInfo::default(),
        )
    } else {
        let transformed = transformer.transform_module(id, &text)?;
        let info = scan_module(id, &transformed.code)?;
        (ModuleKind::Script, transformed.code, transformed.mapping, info)
    };

    let mut resolved = BTreeMap::new();
    for specifier in info.specifiers() {
        let target = resolver
            .resolve(source, specifier, id)
            .ok_or_else(|| BundleError::Unresolved {
                specifier: specifier.to_string(),
                importer: id.to_string(),
            })?;
        resolved.insert(specifier.to_string(), target);
    }

    debug!(module = id, dependencies = resolved.len(), "Loaded module");

    Ok(Module {
        id: id.to_string(),
        kind,
        source: text,
        code,
        mapping,
        info,
        resolved,
    })
}
