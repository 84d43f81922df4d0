//! Removal of unused side-effect-free modules.
//!
//! A module marked side-effect-free only matters for the bindings it provides,
//! so it is kept only when some kept module actually uses one of them.
//! Unmarked modules are kept as soon as a kept module imports them.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use crate::graph::ModuleGraph;
use crate::scan::Export;

/// Export names demanded from a module; `*` means all of them.
type Demands = BTreeSet<String>;

struct Shaker<'g, F> {
    graph: &'g ModuleGraph,
    side_effect_free: F,
    kept: BTreeSet<String>,
    demands: BTreeMap<String, Demands>,
    queue: VecDeque<String>,
}

impl<'g, F: Fn(&str) -> bool> Shaker<'g, F> {
    /// Record that `target` is reached with `names` demanded; schedules it
    /// when it becomes kept or a kept module gains demands.
    fn reach(&mut self, target: &str, names: impl IntoIterator<Item = String>) {
        let entry = self.demands.entry(target.to_string()).or_default();
        let mut grew = false;
        for name in names {
            grew |= entry.insert(name);
        }

        let wanted = !(self.side_effect_free)(target) || !entry.is_empty();
        if !wanted {
            return;
        }
        if self.kept.insert(target.to_string()) || grew {
            self.queue.push_back(target.to_string());
        }
    }

    fn visit(&mut self, id: &str) {
        let graph = self.graph;
        let Some(module) = graph.get(id) else {
            return;
        };
        let own = self.demands.get(id).cloned().unwrap_or_default();
        let all = own.contains("*");

        for import in &module.info.imports {
            let Some(target) = module.target(&import.specifier) else {
                continue;
            };
            let used: Vec<String> = import
                .bindings
                .iter()
                .filter(|b| module.info.references.contains(b.local()))
                .map(|b| b.imported().to_string())
                .collect();
            self.reach(target, used);
        }

        for require in &module.info.requires {
            if let Some(target) = module.target(&require.specifier) {
                self.reach(target, ["*".to_string()]);
            }
        }

        // Names a star re-export cannot provide.
        let named: BTreeSet<&str> = module
            .info
            .exports
            .iter()
            .filter_map(|e| match e {
                Export::Local { exported, .. } | Export::From { exported, .. } => {
                    Some(exported.as_str())
                }
                Export::Star { .. } => None,
            })
            .collect();

        for export in &module.info.exports {
            match export {
                Export::Local { .. } => {}
                Export::From {
                    specifier,
                    imported,
                    exported,
                } => {
                    let Some(target) = module.target(specifier) else {
                        continue;
                    };
                    let names = if all || own.contains(exported) {
                        vec![imported.clone()]
                    } else {
                        vec![]
                    };
                    self.reach(target, names);
                }
                Export::Star { specifier } => {
                    let Some(target) = module.target(specifier) else {
                        continue;
                    };
                    let names: Vec<String> = if all {
                        vec!["*".to_string()]
                    } else {
                        own.iter()
                            .filter(|n| *n != "default" && !named.contains(n.as_str()))
                            .cloned()
                            .collect()
                    };
                    self.reach(target, names);
                }
            }
        }
    }
}

/// Ids of the modules that survive pruning.
pub fn used_modules(graph: &ModuleGraph, side_effect_free: impl Fn(&str) -> bool) -> BTreeSet<String> {
    let mut shaker = Shaker {
        graph,
        side_effect_free,
        kept: BTreeSet::new(),
        demands: BTreeMap::new(),
        queue: VecDeque::new(),
    };

    shaker
        .demands
        .insert(graph.entry.clone(), BTreeSet::from(["*".to_string()]));
    shaker.kept.insert(graph.entry.clone());
    shaker.queue.push_back(graph.entry.clone());

    while let Some(id) = shaker.queue.pop_front() {
        shaker.visit(&id);
    }

    for id in graph.modules.keys() {
        if !shaker.kept.contains(id) {
            debug!(module = %id, "Pruned side-effect-free module");
        }
    }

    shaker.kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::Resolver;
    use crate::source::ModuleSource;
    use lectern_transform::{TransformOptions, Transformer};
    use std::fs;
    use tempfile::TempDir;

    fn graph(files: &[(&str, &str)]) -> (TempDir, ModuleGraph) {
        let dir = TempDir::new().unwrap();
        for (path, text) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, text).unwrap();
        }
        let source = ModuleSource::new(dir.path());
        let transformer = Transformer::new(TransformOptions::default()).unwrap();
        let graph =
            ModuleGraph::build("src/a.js", &source, &Resolver::default(), &transformer).unwrap();
        (dir, graph)
    }

    fn sef(id: &str) -> bool {
        id.contains("crizmas-")
    }

    fn kept(files: &[(&str, &str)]) -> Vec<String> {
        let (_dir, graph) = graph(files);
        used_modules(&graph, sef).into_iter().collect()
    }

    #[test]
    fn prunes_unused_side_effect_free_modules() {
        let kept = kept(&[
            ("src/a.js", "import { b } from './b';\nb();"),
            ("src/b.js", "import { c } from './crizmas-c';\nexport function b() {}"),
            ("src/crizmas-c.js", "export const c = 1;"),
        ]);
        assert_eq!(kept, vec!["src/a.js", "src/b.js"]);
    }

    #[test]
    fn keeps_used_side_effect_free_modules() {
        let kept = kept(&[
            ("src/a.js", "import { b } from './b';\nb();"),
            ("src/b.js", "import { c } from './crizmas-c';\nexport function b() { return c; }"),
            ("src/crizmas-c.js", "export const c = 1;"),
        ]);
        assert_eq!(kept, vec!["src/a.js", "src/b.js", "src/crizmas-c.js"]);
    }

    #[test]
    fn keeps_modules_read_in_template_substitutions() {
        let kept = kept(&[
            (
                "src/a.js",
                "import { version } from './crizmas-meta';\nconsole.log(`crizmas-mvc ${version}`);",
            ),
            ("src/crizmas-meta.js", "export const version = '1.0.0';"),
        ]);
        assert_eq!(kept, vec!["src/a.js", "src/crizmas-meta.js"]);
    }

    #[test]
    fn ignores_shadowed_import_names() {
        let kept = kept(&[
            (
                "src/a.js",
                "import { c } from './crizmas-c';\nfunction f(c) { return c; }\nf(1);",
            ),
            ("src/crizmas-c.js", "export const c = 1;"),
        ]);
        assert_eq!(kept, vec!["src/a.js"]);
    }

    #[test]
    fn keeps_unmarked_side_effect_imports() {
        let kept = kept(&[
            ("src/a.js", "import './polyfill';\nimport './crizmas-x';"),
            ("src/polyfill.js", "window.x = 1;"),
            ("src/crizmas-x.js", "export const x = 1;"),
        ]);
        assert_eq!(kept, vec!["src/a.js", "src/polyfill.js"]);
    }

    #[test]
    fn follows_used_reexports() {
        let kept = kept(&[
            ("src/a.js", "import { used } from './crizmas-index';\nused();"),
            (
                "src/crizmas-index.js",
                "export { used } from './crizmas-used';\nexport { unused } from './crizmas-unused';\nexport * from './crizmas-star';",
            ),
            ("src/crizmas-used.js", "export function used() {}"),
            ("src/crizmas-unused.js", "export function unused() {}"),
            ("src/crizmas-star.js", "export function other() {}"),
        ]);
        assert!(!kept.contains(&"src/crizmas-unused.js".to_string()));
        assert_eq!(
            kept,
            vec!["src/a.js", "src/crizmas-index.js", "src/crizmas-used.js"]
        );
    }

    #[test]
    fn required_modules_are_always_kept() {
        let kept = kept(&[
            ("src/a.js", "const c = require('./crizmas-c');"),
            ("src/crizmas-c.js", "module.exports = 1;"),
        ]);
        assert_eq!(kept, vec!["src/a.js", "src/crizmas-c.js"]);
    }
}
