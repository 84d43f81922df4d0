//! In-memory build output and its atomic write.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use lectern_bundle::Manifest;

use crate::builder::BuildError;

/// Everything a build emits, keyed by output-relative `/`-separated path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    pub files: BTreeMap<String, Vec<u8>>,
    pub manifest: Manifest,
}

impl BuildOutput {
    pub fn new(manifest: Manifest) -> Self {
        Self {
            files: BTreeMap::new(),
            manifest,
        }
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Replace `dir` with the output.
    ///
    /// Files are written to a sibling staging directory first; `dir` is only
    /// removed once the staging copy is complete.
    pub fn write_to(&self, dir: &Path) -> Result<(), BuildError> {
        let staging = staging_dir(dir);
        if staging.exists() {
            remove_dir(&staging)?;
        }

        if let Err(e) = self.write_files(&staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        if dir.exists() {
            remove_dir(dir)?;
        }
        fs::rename(&staging, dir).map_err(|e| BuildError::WriteError {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;

        tracing::debug!("Wrote {} files to {}", self.files.len(), dir.display());
        Ok(())
    }

    fn write_files(&self, root: &Path) -> Result<(), BuildError> {
        create_dir(root)?;
        for (relative, bytes) in &self.files {
            let path = root.join(relative);
            if let Some(parent) = path.parent() {
                create_dir(parent)?;
            }
            fs::write(&path, bytes).map_err(|e| BuildError::WriteError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }
}

fn staging_dir(dir: &Path) -> PathBuf {
    let name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("out");
    let parent = dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    parent.join(format!(".{}.staging", name))
}

fn create_dir(path: &Path) -> Result<(), BuildError> {
    fs::create_dir_all(path).map_err(|e| BuildError::WriteError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn remove_dir(path: &Path) -> Result<(), BuildError> {
    fs::remove_dir_all(path).map_err(|e| BuildError::WriteError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
