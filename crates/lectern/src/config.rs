//! `lectern.toml` loading.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lectern_static::{BuildConfig, CopyRule, Mode, DEFAULT_BASE_PATH, DEFAULT_PORT};
use serde::Deserialize;

/// Configuration file structure (lectern.toml).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    site: SiteConfig,
    #[serde(default)]
    content: ContentConfig,
    #[serde(default)]
    transform: TransformConfig,
    #[serde(default)]
    bundle: BundleConfig,
    #[serde(default)]
    assets: AssetsConfig,
    #[serde(default)]
    server: ServerConfig,
    /// Extra build-time constants, dotted identifier -> value
    #[serde(default)]
    define: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SiteConfig {
    #[serde(default = "default_title")]
    title: String,
    /// Deployment base of production builds
    #[serde(default = "default_base_path")]
    base_path: String,
    #[serde(default = "default_entry")]
    entry: String,
    #[serde(default = "default_template")]
    template: PathBuf,
    #[serde(default = "default_favicon")]
    favicon: PathBuf,
    #[serde(default = "default_output")]
    output: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ContentConfig {
    #[serde(default = "default_content_dir")]
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TransformConfig {
    #[serde(default = "default_include_dir")]
    include_dir: String,
    #[serde(default = "default_include")]
    include: String,
    #[serde(default = "default_jsx_factory")]
    jsx_factory: String,
    #[serde(default = "default_jsx_fragment")]
    jsx_fragment: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BundleConfig {
    #[serde(default = "default_extensions")]
    extensions: Vec<String>,
    #[serde(default = "default_side_effect_free")]
    side_effect_free: Vec<String>,
    #[serde(default = "default_true")]
    vendor_chunk: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AssetsConfig {
    #[serde(default = "default_copies")]
    copy: Vec<CopyConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct CopyConfig {
    from: PathBuf,
    to: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerConfig {
    #[serde(default = "default_port")]
    port: u16,
}

fn default_title() -> String {
    "Documentation".to_string()
}
fn default_base_path() -> String {
    DEFAULT_BASE_PATH.to_string()
}
fn default_entry() -> String {
    "src/js/main.jsx".to_string()
}
fn default_template() -> PathBuf {
    PathBuf::from("src/index.html")
}
fn default_favicon() -> PathBuf {
    PathBuf::from("src/img/favicon.ico")
}
fn default_output() -> PathBuf {
    PathBuf::from("dist")
}
fn default_content_dir() -> PathBuf {
    PathBuf::from("docs")
}
fn default_include_dir() -> String {
    "src".to_string()
}
fn default_include() -> String {
    r"\.jsx?$".to_string()
}
fn default_jsx_factory() -> String {
    "React.createElement".to_string()
}
fn default_jsx_fragment() -> String {
    "React.Fragment".to_string()
}
fn default_extensions() -> Vec<String> {
    vec![".js".to_string(), ".jsx".to_string(), ".json".to_string()]
}
fn default_side_effect_free() -> Vec<String> {
    vec!["crizmas-".to_string()]
}
fn default_true() -> bool {
    true
}
fn default_copies() -> Vec<CopyConfig> {
    vec![CopyConfig {
        from: PathBuf::from("src/css"),
        to: PathBuf::from("css"),
    }]
}
fn default_port() -> u16 {
    DEFAULT_PORT
}

// Serde only consults the field defaults when a section is present, so
// missing sections go through these.
impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            base_path: default_base_path(),
            entry: default_entry(),
            template: default_template(),
            favicon: default_favicon(),
            output: default_output(),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            dir: default_content_dir(),
        }
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            include_dir: default_include_dir(),
            include: default_include(),
            jsx_factory: default_jsx_factory(),
            jsx_fragment: default_jsx_fragment(),
        }
    }
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            side_effect_free: default_side_effect_free(),
            vendor_chunk: true,
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            copy: default_copies(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl ConfigFile {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve into the build configuration for `mode`, with paths
    /// relative to `root`.
    pub fn into_build_config(self, root: PathBuf, mode: Mode) -> BuildConfig {
        let mut config = BuildConfig::new(root, mode);

        config.title = self.site.title;
        config.set_base_path(&self.site.base_path);
        config.entry = self.site.entry;
        config.template = self.site.template;
        config.favicon = self.site.favicon;
        config.output_dir = self.site.output;

        config.content_dir = self.content.dir;

        config.include_dir = self.transform.include_dir;
        config.include = self.transform.include;
        config.jsx.factory = self.transform.jsx_factory;
        config.jsx.fragment = self.transform.jsx_fragment;

        config.extensions = self.bundle.extensions;
        config.side_effect_free = self.bundle.side_effect_free;
        config.vendor_chunk = self.bundle.vendor_chunk;

        config.copies = self
            .assets
            .copy
            .into_iter()
            .map(|c| CopyRule {
                from: c.from,
                to: c.to,
            })
            .collect();

        config.port = self.server.port;
        config.defines = self.define;

        config
    }
}

/// Load the build configuration from `path` if it exists, else defaults.
/// The project root is the directory holding the config file.
/// Returns an error if the config file exists but is malformed.
pub fn load(path: &Path, mode: Mode) -> Result<BuildConfig> {
    let root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let file = if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file = ConfigFile::parse(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        file
    } else {
        tracing::debug!("No {}, using defaults", path.display());
        ConfigFile::default()
    };

    Ok(file.into_build_config(root, mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_sections_use_defaults() {
        let config = ConfigFile::parse("")
            .unwrap()
            .into_build_config(PathBuf::from("/site"), Mode::Development);

        assert_eq!(config.entry, "src/js/main.jsx");
        assert_eq!(config.content_dir, PathBuf::from("docs"));
        assert_eq!(config.output_dir, PathBuf::from("dist"));
        assert_eq!(config.side_effect_free, vec!["crizmas-"]);
        assert_eq!(config.copies.len(), 1);
        assert_eq!(config.port, 5555);
        assert_eq!(config.public_path, "/");
    }

    #[test]
    fn reads_every_section() {
        let content = r#"
[site]
title = "crizmas-mvc"
base_path = "/docs-site/"
output = "public"

[content]
dir = "pages"

[transform]
jsx_factory = "h"

[bundle]
side_effect_free = ["crizmas-", "smart-mix"]
vendor_chunk = false

[assets]
copy = [{ from = "styles", to = "assets/css" }]

[server]
port = 8080

[define]
"process.env.VERSION" = "1.4.0"
__DEBUG__ = false
"#;
        let config = ConfigFile::parse(content)
            .unwrap()
            .into_build_config(PathBuf::from("/site"), Mode::Production);

        assert_eq!(config.title, "crizmas-mvc");
        assert_eq!(config.public_path, "/docs-site/");
        assert_eq!(config.base_path.as_deref(), Some("docs-site"));
        assert_eq!(config.output_dir, PathBuf::from("public"));
        assert_eq!(config.content_dir, PathBuf::from("pages"));
        assert_eq!(config.jsx.factory, "h");
        assert_eq!(config.jsx.fragment, "React.Fragment");
        assert_eq!(config.side_effect_free, vec!["crizmas-", "smart-mix"]);
        assert!(!config.vendor_chunk);
        assert_eq!(
            config.copies,
            vec![CopyRule {
                from: PathBuf::from("styles"),
                to: PathBuf::from("assets/css"),
            }]
        );
        assert_eq!(config.port, 8080);
        assert_eq!(config.defines["process.env.VERSION"], serde_json::json!("1.4.0"));
        assert_eq!(config.defines["__DEBUG__"], serde_json::json!(false));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(ConfigFile::parse("[site]\nbase_url = \"/\"\n").is_err());
        assert!(ConfigFile::parse("[theme]\n").is_err());
        assert!(ConfigFile::parse("[site\n").is_err());
    }

    #[test]
    fn loads_relative_to_config_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("lectern.toml");
        fs::write(&path, "[site]\ntitle = \"Docs\"\n").unwrap();

        let config = load(&path, Mode::ProductionTest).unwrap();
        assert_eq!(config.root, temp.path());
        assert_eq!(config.title, "Docs");
        assert_eq!(config.public_path, "/");
    }

    #[test]
    fn missing_file_means_defaults() {
        let temp = tempdir().unwrap();
        let config = load(&temp.path().join("lectern.toml"), Mode::Production).unwrap();
        assert_eq!(config.public_path, "/crizmas-mvc-docs/");
    }
}
