//! Static site builder.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use lectern_bundle::{BundleError, Bundler, ModuleSource};
use lectern_transform::{TransformError, Transformer};

use crate::assets::copy_assets;
use crate::config::BuildConfig;
use crate::html::TemplateEngine;
use crate::output::BuildOutput;
use crate::site::Site;

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of pages composed
    pub pages: usize,

    /// Number of modules bundled
    pub modules: usize,

    /// Emitted chunk files, in load order
    pub chunks: Vec<String>,

    /// Number of files written
    pub files: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to read {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("Failed to parse {path}:{line}: {message}")]
    ParseError {
        path: String,
        line: usize,
        message: String,
    },

    #[error("Duplicate page id {id:?}: {first} and {second}")]
    DuplicatePage {
        id: String,
        first: String,
        second: String,
    },

    #[error(transparent)]
    TransformError(#[from] TransformError),

    #[error(transparent)]
    BundleError(#[from] BundleError),

    #[error("Failed to render template {path}: {message}")]
    TemplateError { path: String, message: String },

    #[error("Failed to copy {path}: {message}")]
    CopyError { path: String, message: String },

    #[error("Failed to write {path}: {message}")]
    WriteError { path: String, message: String },

    #[error("Refusing to write output to {path}: {reason}")]
    UnsafeOutput { path: String, reason: String },
}

/// Static site builder.
pub struct StaticBuilder<'a> {
    config: &'a BuildConfig,
}

impl<'a> StaticBuilder<'a> {
    pub fn new(config: &'a BuildConfig) -> Self {
        Self { config }
    }

    /// Build the site and replace the output directory with it.
    ///
    /// Nothing is written unless every stage succeeds.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        let output_dir = self.config.checked_output_path()?;
        let (site, output, modules) = self.render()?;
        output.write_to(&output_dir)?;

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Built {} pages ({} mode) into {} in {}ms",
            site.pages.len(),
            self.config.mode,
            output_dir.display(),
            duration_ms
        );

        Ok(BuildResult {
            pages: site.pages.len(),
            modules,
            chunks: output.manifest.files().map(str::to_string).collect(),
            files: output.files.len(),
            duration_ms,
            output_dir,
        })
    }

    /// Run every stage in memory.
    pub fn render(&self) -> Result<(Site, BuildOutput, usize), BuildError> {
        let config = self.config;

        let site = Site::load(&config.path(&config.content_dir))?;
        tracing::debug!("Loaded {} pages", site.pages.len());

        let mut source = ModuleSource::new(&config.root);
        site.add_modules(&mut source)?;

        let transformer = Transformer::new(config.transform_options()?)?;
        let bundler = Bundler::new(config.bundle_options(), transformer)?;
        let bundle = bundler.bundle(&source)?;
        if !bundle.pruned.is_empty() {
            tracing::info!("Pruned {} unused modules", bundle.pruned.len());
        }

        let template_path = config.path(&config.template);
        let template = fs::read_to_string(&template_path).map_err(|e| BuildError::ReadError {
            path: template_path.display().to_string(),
            message: e.to_string(),
        })?;
        let template_error = |e: minijinja::Error| BuildError::TemplateError {
            path: template_path.display().to_string(),
            message: e.to_string(),
        };
        let engine = TemplateEngine::new(template).map_err(template_error)?;

        let mut output = BuildOutput::new(bundle.manifest.clone());
        let has_favicon = copy_assets(config, &mut output)?;

        let html = engine
            .render(config, &bundle.manifest, has_favicon)
            .map_err(template_error)?;
        output.insert("index.html", html);

        for chunk in bundle.chunks {
            output.insert(chunk.map_file_name(), chunk.map);
            output.insert(chunk.file_name, chunk.code);
        }

        let manifest = bundle.manifest.to_json().map_err(|e| BuildError::WriteError {
            path: "manifest.json".to_string(),
            message: e.to_string(),
        })?;
        output.insert("manifest.json", manifest);

        Ok((site, output, bundle.modules))
    }
}
