//! Chunk code generation.
//!
//! Every module becomes a function in a module table keyed by id. The main
//! chunk carries a small runtime that installs all tables pushed onto
//! `self.__lectern_chunks` and then requires the entry.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Range;

use lectern_transform::{splice, Edit, SourceMapping};

use crate::graph::{Module, ModuleKind};
use crate::scan::{Export, ImportBinding, ReferenceKind};

pub const REQUIRE: &str = "__lectern_require__";

const RUNTIME: &str = r#"  var modules = {};
  var cache = {};
  function __lectern_require__(id) {
    var cached = cache[id];
    if (cached !== undefined) {
      return cached.exports;
    }
    if (!(id in modules)) {
      throw new Error("Cannot find module '" + id + "'");
    }
    var module = (cache[id] = { exports: {} });
    modules[id].call(module.exports, module, module.exports, __lectern_require__);
    return module.exports;
  }
  __lectern_require__.r = function (exports) {
    Object.defineProperty(exports, "__esModule", { value: true });
  };
  __lectern_require__.d = function (exports, getters) {
    for (var key in getters) {
      if (!Object.prototype.hasOwnProperty.call(exports, key)) {
        Object.defineProperty(exports, key, { enumerable: true, get: getters[key] });
      }
    }
  };
  __lectern_require__.n = function (module) {
    return module && module.__esModule ? module["default"] : module;
  };
  __lectern_require__.s = function (exports, source) {
    Object.keys(source).forEach(function (key) {
      if (key !== "default" && !Object.prototype.hasOwnProperty.call(exports, key)) {
        Object.defineProperty(exports, key, {
          enumerable: true,
          get: function () {
            return source[key];
          }
        });
      }
    });
  };
  var chunks = (self.__lectern_chunks = self.__lectern_chunks || []);
  function install(table) {
    for (var id in table) {
      modules[id] = table[id];
    }
  }
  chunks.forEach(install);
  chunks.push = function (table) {
    install(table);
  };
"#;

fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn member(object: &str, name: &str) -> String {
    let plain = name.starts_with(|c: char| c.is_alphabetic() || c == '_' || c == '$')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if plain {
        format!("{}.{}", object, name)
    } else {
        format!("{}[{}]", object, quote(name))
    }
}

/// A module rendered as a module-table function.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub code: String,
    /// Rendered text back to the module's transformed code
    pub mapping: SourceMapping,
}

/// A module's place in a chunk.
#[derive(Debug, Clone)]
pub struct Placement<'m> {
    pub module: &'m Module,
    /// Byte range of the rendered module in the chunk
    pub range: Range<usize>,
    /// Rendered text back to the module's source
    pub mapping: SourceMapping,
}

/// Chunk text and where each module landed in it.
#[derive(Debug, Clone)]
pub struct RenderedChunk<'m> {
    pub code: String,
    pub placements: Vec<Placement<'m>>,
}

/// Render one module as a module-table function.
///
/// Imports and re-exports of modules not in `kept` are dropped.
pub fn render_module(module: &Module, kept: &BTreeSet<String>) -> Rendered {
    let (body, mut mapping) = match module.kind {
        ModuleKind::Json => (module.code.clone(), SourceMapping::identity()),
        ModuleKind::Script => render_script(module, kept),
    };
    let head = format!("function (module, exports, {}) {{\n", REQUIRE);
    mapping.prepend(head.len());
    Rendered {
        code: format!("{}{}\n}}", head, body.trim_end()),
        mapping,
    }
}

fn render_script(module: &Module, kept: &BTreeSet<String>) -> (String, SourceMapping) {
    let info = &module.info;
    let mut header = Vec::new();

    // Kept targets of import/export declarations, numbered in source order.
    let mut vars: BTreeMap<&str, String> = BTreeMap::new();
    let mut order: Vec<&str> = Vec::new();
    let declared = info
        .imports
        .iter()
        .map(|i| i.specifier.as_str())
        .chain(info.exports.iter().filter_map(Export::specifier));
    for specifier in declared {
        let Some(target) = module.target(specifier) else {
            continue;
        };
        if !kept.contains(target) || vars.contains_key(target) {
            continue;
        }
        vars.insert(target, format!("__lectern_m{}", order.len()));
        order.push(target);
    }
    let var_for = |specifier: &str| module.target(specifier).and_then(|t| vars.get(t));

    // Imported bindings read through the target's exports at each use, so
    // cycles and later reassignments see the current value.
    let mut bindings: HashMap<&str, String> = HashMap::new();
    for import in &info.imports {
        let Some(var) = var_for(&import.specifier) else {
            continue;
        };
        for binding in &import.bindings {
            let value = match binding {
                ImportBinding::Default(_) => format!("{}.n({})", REQUIRE, var),
                ImportBinding::Namespace(_) => var.clone(),
                ImportBinding::Named { imported, .. } => member(var, imported),
            };
            bindings.insert(binding.local(), value);
        }
    }

    if info.is_esm() {
        header.push(format!("{}.r(exports);", REQUIRE));
    }

    let mut getters = Vec::new();
    let mut stars = Vec::new();
    for export in &info.exports {
        match export {
            Export::Local { exported, local } => {
                let value = bindings.get(local.as_str()).unwrap_or(local);
                getters.push(format!("{}: () => {}", quote(exported), value));
            }
            Export::From {
                specifier,
                imported,
                exported,
            } => {
                let Some(var) = var_for(specifier) else {
                    continue;
                };
                let value = match imported.as_str() {
                    "*" => var.clone(),
                    "default" => format!("{}.n({})", REQUIRE, var),
                    name => member(var, name),
                };
                getters.push(format!("{}: () => {}", quote(exported), value));
            }
            Export::Star { specifier } => {
                if let Some(var) = var_for(specifier) {
                    stars.push(format!("{}.s(exports, {});", REQUIRE, var));
                }
            }
        }
    }
    if !getters.is_empty() {
        header.push(format!("{}.d(exports, {{ {} }});", REQUIRE, getters.join(", ")));
    }

    for target in &order {
        header.push(format!(
            "var {} = {}({});",
            vars[target],
            REQUIRE,
            quote(target)
        ));
    }
    header.extend(stars);

    let mut edits = info.edits.clone();
    for require in &info.requires {
        if let Some(target) = module.target(&require.specifier) {
            edits.push(Edit::new(
                require.span.clone(),
                format!("{}({})", REQUIRE, quote(target)),
            ));
        }
    }
    for reference in &info.binding_references {
        let Some(value) = bindings.get(reference.local.as_str()) else {
            continue;
        };
        let text = match reference.kind {
            ReferenceKind::Value => value.clone(),
            ReferenceKind::Callee => format!("(0, {})", value),
            ReferenceKind::Shorthand => format!("{}: {}", reference.local, value),
        };
        edits.push(Edit::new(reference.range.clone(), text));
    }

    let mut head = String::new();
    for line in &header {
        head.push_str(line);
        head.push('\n');
    }
    let (code, mut mapping) = splice(&module.code, edits);
    mapping.prepend(head.len());
    (head + &code, mapping)
}

fn module_table<'m>(out: &mut String, placements: &mut Vec<Placement<'m>>, modules: &[&'m Module], kept: &BTreeSet<String>) {
    out.push_str("{\n");
    for &module in modules {
        out.push_str(&quote(&module.id));
        out.push_str(": ");
        let rendered = render_module(module, kept);
        let start = out.len();
        out.push_str(&rendered.code);
        placements.push(Placement {
            module,
            range: start..out.len(),
            mapping: rendered.mapping.then(&module.mapping),
        });
        out.push_str(",\n");
    }
    out.push('}');
}

/// A chunk without runtime, registering its modules when loaded.
pub fn render_vendor_chunk<'m>(modules: &[&'m Module], kept: &BTreeSet<String>) -> RenderedChunk<'m> {
    let mut code = String::from("(self.__lectern_chunks = self.__lectern_chunks || []).push(");
    let mut placements = Vec::with_capacity(modules.len());
    module_table(&mut code, &mut placements, modules, kept);
    code.push_str(");\n");
    RenderedChunk { code, placements }
}

/// The chunk that boots the application.
pub fn render_main_chunk<'m>(modules: &[&'m Module], kept: &BTreeSet<String>, entry: &str) -> RenderedChunk<'m> {
    let mut code = format!("(function () {{\n{}  install(", RUNTIME);
    let mut placements = Vec::with_capacity(modules.len());
    module_table(&mut code, &mut placements, modules, kept);
    code.push_str(&format!(");\n  {}({});\n}})();\n", REQUIRE, quote(entry)));
    RenderedChunk { code, placements }
}
