//! Content hashes and the chunk manifest.

use serde::ser::{Serialize, SerializeMap, Serializer};
use sha2::{Digest, Sha256};

/// Hex digits of the SHA-256 digest kept in file names.
pub const HASH_LENGTH: usize = 20;

/// Content hash used in output file names.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    digest[..HASH_LENGTH].to_string()
}

/// `<name>.bundle-<hash>.js`
pub fn chunk_file_name(name: &str, code: &str) -> String {
    format!("{}.bundle-{}.js", name, content_hash(code.as_bytes()))
}

/// A chunk's logical name and its emitted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub file: String,
}

/// Chunk name -> file name, in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, file: impl Into<String>) {
        self.entries.push(ManifestEntry {
            name: name.into(),
            file: file.into(),
        });
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// File names in load order.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.file.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.file.as_str())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for Manifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.name, &entry.file)?;
        }
        map.end()
    }
}
