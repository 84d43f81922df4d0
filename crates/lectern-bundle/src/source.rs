//! Where module text comes from.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::bundler::BundleError;

/// Prefix of ids that never touch the filesystem.
pub const VIRTUAL_PREFIX: &str = "lectern:";

/// Project files under a root directory plus in-memory virtual modules.
///
/// Module ids are root-relative paths with `/` separators
/// (`src/js/main.jsx`, `node_modules/react/index.js`) or `lectern:` ids.
#[derive(Debug, Clone)]
pub struct ModuleSource {
    root: PathBuf,
    virtual_modules: BTreeMap<String, String>,
}

impl ModuleSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            virtual_modules: BTreeMap::new(),
        }
    }

    /// Project root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register a virtual module. The id must start with `lectern:`.
    pub fn add_virtual(&mut self, id: impl Into<String>, code: impl Into<String>) {
        self.virtual_modules.insert(id.into(), code.into());
    }

    pub fn is_virtual(id: &str) -> bool {
        id.starts_with(VIRTUAL_PREFIX)
    }

    pub fn virtual_ids(&self) -> impl Iterator<Item = &str> {
        self.virtual_modules.keys().map(String::as_str)
    }

    /// Filesystem path of a module id.
    pub fn path_of(&self, id: &str) -> PathBuf {
        id.split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    pub fn is_file(&self, id: &str) -> bool {
        if Self::is_virtual(id) {
            return self.virtual_modules.contains_key(id);
        }
        self.path_of(id).is_file()
    }

    pub fn is_dir(&self, id: &str) -> bool {
        !Self::is_virtual(id) && self.path_of(id).is_dir()
    }

    /// Read a module's text.
    pub fn read(&self, id: &str) -> Result<String, BundleError> {
        if Self::is_virtual(id) {
            return self
                .virtual_modules
                .get(id)
                .cloned()
                .ok_or_else(|| BundleError::Read {
                    path: id.to_string(),
                    message: "no such virtual module".to_string(),
                });
        }

        let path = self.path_of(id);
        fs::read_to_string(&path).map_err(|e| BundleError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_files_and_virtual_modules() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/js")).unwrap();
        fs::write(dir.path().join("src/js/a.js"), "export const a = 1;").unwrap();

        let mut source = ModuleSource::new(dir.path());
        source.add_virtual("lectern:pages", "export default [];");

        assert!(source.is_file("src/js/a.js"));
        assert!(source.is_dir("src/js"));
        assert!(!source.is_file("src/js/b.js"));
        assert!(source.is_file("lectern:pages"));
        assert_eq!(source.read("src/js/a.js").unwrap(), "export const a = 1;");
        assert_eq!(source.read("lectern:pages").unwrap(), "export default [];");
        assert!(matches!(
            source.read("lectern:missing"),
            Err(BundleError::Read { .. })
        ));
    }
}
