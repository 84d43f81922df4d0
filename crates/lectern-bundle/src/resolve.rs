//! Module specifier resolution.

use serde::Deserialize;

use crate::source::ModuleSource;

/// Fields of `package.json` used to find a package entry.
#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    module: Option<String>,
    main: Option<String>,
}

/// Resolves import specifiers to module ids.
#[derive(Debug, Clone)]
pub struct Resolver {
    extensions: Vec<String>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(vec![".js".into(), ".jsx".into(), ".json".into()])
    }
}

impl Resolver {
    pub fn new(extensions: Vec<String>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|ext| {
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{}", ext)
                }
            })
            .collect();
        Self { extensions }
    }

    /// Resolve `specifier` imported from `importer` (a module id, or `""`
    /// for the project root).
    pub fn resolve(&self, source: &ModuleSource, specifier: &str, importer: &str) -> Option<String> {
        if ModuleSource::is_virtual(specifier) {
            return source.is_file(specifier).then(|| specifier.to_string());
        }

        if specifier.starts_with("./") || specifier.starts_with("../") || specifier == "." {
            let base = join(parent(importer), specifier)?;
            return self.resolve_path(source, &base);
        }

        if specifier.starts_with('/') {
            return None;
        }

        self.resolve_package(source, specifier, importer)
    }

    /// File as is, with each extension, then as a directory index.
    fn resolve_path(&self, source: &ModuleSource, base: &str) -> Option<String> {
        if !base.is_empty() && source.is_file(base) {
            return Some(base.to_string());
        }
        for ext in &self.extensions {
            let candidate = format!("{}{}", base, ext);
            if source.is_file(&candidate) {
                return Some(candidate);
            }
        }
        for ext in &self.extensions {
            let candidate = if base.is_empty() {
                format!("index{}", ext)
            } else {
                format!("{}/index{}", base, ext)
            };
            if source.is_file(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Bare specifier: nearest `node_modules/<pkg>` walking up from the importer.
    fn resolve_package(&self, source: &ModuleSource, specifier: &str, importer: &str) -> Option<String> {
        let (package, subpath) = split_package(specifier);

        let mut dir = if ModuleSource::is_virtual(importer) {
            String::new()
        } else {
            parent(importer).to_string()
        };
        loop {
            let package_dir = if dir.is_empty() {
                format!("node_modules/{}", package)
            } else {
                format!("{}/node_modules/{}", dir, package)
            };

            if source.is_dir(&package_dir) {
                return match subpath {
                    Some(sub) => self.resolve_path(source, &format!("{}/{}", package_dir, sub)),
                    None => self.resolve_package_entry(source, &package_dir),
                };
            }

            if dir.is_empty() {
                return None;
            }
            dir = parent(&dir).to_string();
        }
    }

    fn resolve_package_entry(&self, source: &ModuleSource, package_dir: &str) -> Option<String> {
        let manifest_id = format!("{}/package.json", package_dir);
        let manifest: PackageJson = source
            .read(&manifest_id)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();

        for entry in [manifest.module, manifest.main].into_iter().flatten() {
            if let Some(base) = join(package_dir, &entry) {
                if let Some(found) = self.resolve_path(source, &base) {
                    return Some(found);
                }
            }
        }

        let index = format!("{}/index.js", package_dir);
        source.is_file(&index).then_some(index)
    }
}

/// `@scope/pkg/a/b` -> (`@scope/pkg`, Some(`a/b`)), `react` -> (`react`, None).
fn split_package(specifier: &str) -> (&str, Option<&str>) {
    let mut parts = specifier.splitn(if specifier.starts_with('@') { 3 } else { 2 }, '/');
    let first = parts.next().unwrap_or("");
    let (package_len, rest) = if specifier.starts_with('@') {
        let name = parts.next().unwrap_or("");
        (first.len() + 1 + name.len(), parts.next())
    } else {
        (first.len(), parts.next())
    };
    let package = &specifier[..package_len.min(specifier.len())];
    (package, rest.filter(|r| !r.is_empty()))
}

/// Directory part of a module id.
pub fn parent(id: &str) -> &str {
    match id.rfind('/') {
        Some(i) => &id[..i],
        None => "",
    }
}

/// Join a relative path onto a directory id, normalizing `.` and `..`.
/// Returns `None` when the path escapes the project root.
pub fn join(dir: &str, relative: &str) -> Option<String> {
    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s => segments.push(s),
        }
    }
    Some(segments.join("/"))
}
