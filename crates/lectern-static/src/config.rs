//! Build configuration shared by every stage.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use lectern_bundle::BundleOptions;
use lectern_transform::{Defines, JsxOptions, TransformError, TransformOptions};

use crate::builder::BuildError;

/// Base path of the production deployment.
pub const DEFAULT_BASE_PATH: &str = "crizmas-mvc-docs";

/// Port of the development server.
pub const DEFAULT_PORT: u16 = 5555;

/// Build mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Development,
    Production,
    /// Production output served from the root path
    ProductionTest,
}

impl Mode {
    /// Minify, prune and copy stylesheets.
    pub fn is_production_like(self) -> bool {
        !matches!(self, Mode::Development)
    }

    /// Value injected as `process.env.NODE_ENV`.
    pub fn node_env(self) -> &'static str {
        if self.is_production_like() {
            "production"
        } else {
            "development"
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
            Mode::ProductionTest => "production-test",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown mode {0:?} (expected development, production or production-test)")]
pub struct ModeError(pub String);

impl FromStr for Mode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "development" => Ok(Mode::Development),
            "production" => Ok(Mode::Production),
            "production-test" => Ok(Mode::ProductionTest),
            other => Err(ModeError(other.to_string())),
        }
    }
}

/// A directory copied verbatim into the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRule {
    /// Source directory, relative to the project root
    pub from: PathBuf,

    /// Destination, relative to the output directory
    pub to: PathBuf,
}

/// Configuration for one build.
///
/// Paths are relative to `root` unless stated otherwise.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub mode: Mode,

    /// Project root
    pub root: PathBuf,

    /// Entry module
    pub entry: String,

    /// Page template
    pub template: PathBuf,

    pub favicon: PathBuf,

    /// Documentation pages
    pub content_dir: PathBuf,

    pub output_dir: PathBuf,

    /// Prefix of every emitted script URL
    pub public_path: String,

    /// Prefix for template asset links
    pub assets_prefix: String,

    /// Deployment base, injected as `process.env.basePath`
    pub base_path: Option<String>,

    /// Site title passed to the template
    pub title: String,

    /// Transform modules under this directory
    pub include_dir: String,

    /// ... whose id matches this pattern
    pub include: String,

    pub jsx: JsxOptions,

    /// Extensions tried when resolving relative imports
    pub extensions: Vec<String>,

    /// Regexes of module ids that are safe to drop when unused
    pub side_effect_free: Vec<String>,

    /// Directories copied in production-like modes
    pub copies: Vec<CopyRule>,

    /// Additional build-time constants
    pub defines: BTreeMap<String, serde_json::Value>,

    /// Split `node_modules` into its own chunk
    pub vendor_chunk: bool,

    /// Development server port
    pub port: u16,
}

impl BuildConfig {
    /// Defaults for a project at `root` built in `mode`.
    pub fn new(root: impl Into<PathBuf>, mode: Mode) -> Self {
        let bundle = BundleOptions::default();
        let transform = TransformOptions::default();

        let mut config = Self {
            mode,
            root: root.into(),
            entry: bundle.entry,
            template: PathBuf::from("src/index.html"),
            favicon: PathBuf::from("src/img/favicon.ico"),
            content_dir: PathBuf::from("docs"),
            output_dir: PathBuf::from("dist"),
            public_path: String::new(),
            assets_prefix: String::new(),
            base_path: None,
            title: "Documentation".to_string(),
            include_dir: transform.include_dir,
            include: transform.include,
            jsx: transform.jsx,
            extensions: bundle.extensions,
            side_effect_free: bundle.side_effect_free,
            copies: vec![CopyRule {
                from: PathBuf::from("src/css"),
                to: PathBuf::from("css"),
            }],
            defines: BTreeMap::new(),
            vendor_chunk: bundle.vendor_chunk,
            port: DEFAULT_PORT,
        };
        config.set_base_path(DEFAULT_BASE_PATH);
        config
    }

    /// Set the deployment base. Only production builds are served under it.
    pub fn set_base_path(&mut self, base: &str) {
        let base = base.trim_matches('/');
        if self.mode == Mode::Production && !base.is_empty() {
            self.public_path = format!("/{}/", base);
            self.assets_prefix = format!("/{}", base);
            self.base_path = Some(base.to_string());
        } else {
            self.public_path = "/".to_string();
            self.assets_prefix = String::new();
            self.base_path = None;
        }
    }

    /// Resolve a project-relative path.
    pub fn path(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    pub fn output_path(&self) -> PathBuf {
        self.path(&self.output_dir)
    }

    /// The output directory, once it is known not to hold any build input.
    ///
    /// Writing replaces the whole directory, so it may not be the project
    /// root or contain the sources, the pages, the template or a copied
    /// directory.
    pub fn checked_output_path(&self) -> Result<PathBuf, BuildError> {
        let output = self.output_path();
        let unsafe_output = |reason: String| BuildError::UnsafeOutput {
            path: output.display().to_string(),
            reason,
        };
        let normalized = absolute(&output).map_err(|e| unsafe_output(e.to_string()))?;

        let mut inputs = vec![
            ("project root", self.root.clone()),
            ("source directory", self.root.join(&self.include_dir)),
            ("content directory", self.path(&self.content_dir)),
        ];
        if let Some(dir) = self.path(&self.template).parent() {
            inputs.push(("template directory", dir.to_path_buf()));
        }
        for rule in &self.copies {
            inputs.push(("copied directory", self.path(&rule.from)));
        }

        for (what, input) in inputs {
            let input = absolute(&input).map_err(|e| unsafe_output(e.to_string()))?;
            if input.starts_with(&normalized) {
                return Err(unsafe_output(format!(
                    "it would replace the {} {}",
                    what,
                    input.display()
                )));
            }
        }
        Ok(output)
    }

    /// Build-time constants: `process.env.NODE_ENV`, `process.env.basePath`,
    /// the `process.env` object itself and any configured extras.
    pub fn defines(&self) -> Result<Defines, TransformError> {
        let node_env = serde_json::Value::from(self.mode.node_env());
        let base_path = match &self.base_path {
            Some(base) => serde_json::Value::from(base.as_str()),
            None => serde_json::Value::Null,
        };
        let env = serde_json::json!({
            "NODE_ENV": node_env,
            "basePath": base_path,
        });

        let mut defines = Defines::new();
        defines.insert("process.env", format!("({})", env))?;
        defines.insert("process.env.NODE_ENV", node_env.to_string())?;
        defines.insert("process.env.basePath", base_path.to_string())?;
        for (key, value) in &self.defines {
            defines.insert(key, value.to_string())?;
        }
        Ok(defines)
    }

    pub fn transform_options(&self) -> Result<TransformOptions, TransformError> {
        Ok(TransformOptions {
            include_dir: self.include_dir.clone(),
            include: self.include.clone(),
            jsx: self.jsx.clone(),
            defines: self.defines()?,
            fold_constants: self.mode.is_production_like(),
        })
    }

    pub fn bundle_options(&self) -> BundleOptions {
        let production = self.mode.is_production_like();
        BundleOptions {
            entry: self.entry.clone(),
            extensions: self.extensions.clone(),
            side_effect_free: self.side_effect_free.clone(),
            prune: production,
            vendor_chunk: self.vendor_chunk,
            minify: production,
        }
    }
}

/// Absolute form of `path` with `.` and `..` resolved lexically.
fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in std::path::absolute(path)?.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}
