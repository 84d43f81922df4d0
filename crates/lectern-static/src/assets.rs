//! Static asset copy stage.

use std::fs;
use std::path::{Component, Path};

use walkdir::WalkDir;

use crate::builder::BuildError;
use crate::config::BuildConfig;
use crate::output::BuildOutput;

/// Output path of the favicon.
pub const FAVICON: &str = "favicon.ico";

/// Copy the favicon (every mode) and the configured directories
/// (production-like modes) into `output`, byte for byte.
///
/// Returns whether a favicon was copied.
pub fn copy_assets(config: &BuildConfig, output: &mut BuildOutput) -> Result<bool, BuildError> {
    let favicon = config.path(&config.favicon);
    let has_favicon = favicon.is_file();
    if has_favicon {
        output.insert(FAVICON, read(&favicon)?);
    } else {
        tracing::debug!("No favicon at {}", favicon.display());
    }

    if !config.mode.is_production_like() {
        return Ok(has_favicon);
    }

    for rule in &config.copies {
        let from = config.path(&rule.from);
        if !from.is_dir() {
            return Err(BuildError::CopyError {
                path: from.display().to_string(),
                message: "source directory not found".to_string(),
            });
        }
        let to = destination(&rule.to)?;
        let copied = copy_dir(&from, &to, output)?;
        tracing::info!("Copied {} files from {}", copied, rule.from.display());
    }

    Ok(has_favicon)
}

fn copy_dir(from: &Path, to: &str, output: &mut BuildOutput) -> Result<usize, BuildError> {
    let mut copied = 0;
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| BuildError::CopyError {
            path: from.display().to_string(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let relative = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect::<Vec<_>>()
            .join("/");
        let target = if to.is_empty() {
            relative
        } else {
            format!("{}/{}", to, relative)
        };
        output.insert(target, read(entry.path())?);
        copied += 1;
    }
    Ok(copied)
}

fn read(path: &Path) -> Result<Vec<u8>, BuildError> {
    fs::read(path).map_err(|e| BuildError::CopyError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Output-relative `/`-separated form of a copy destination.
fn destination(to: &Path) -> Result<String, BuildError> {
    let mut parts = Vec::new();
    for component in to.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy()),
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(BuildError::CopyError {
                    path: to.display().to_string(),
                    message: "destination must stay inside the output directory".to_string(),
                })
            }
        }
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn project() -> tempfile::TempDir {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("src/css/theme")).unwrap();
        fs::create_dir_all(root.join("src/img")).unwrap();
        fs::write(root.join("src/css/main.css"), "body { margin: 0; }\n").unwrap();
        fs::write(root.join("src/css/theme/dark.css"), [0xEF, 0xBB, 0xBF, b'a']).unwrap();
        fs::write(root.join("src/img/favicon.ico"), [0u8, 0, 1, 0]).unwrap();
        temp
    }

    #[test]
    fn copies_stylesheets_in_production() {
        let temp = project();
        let config = BuildConfig::new(temp.path(), Mode::Production);
        let mut output = BuildOutput::default();

        assert!(copy_assets(&config, &mut output).unwrap());
        assert_eq!(
            output.paths().collect::<Vec<_>>(),
            vec!["css/main.css", "css/theme/dark.css", "favicon.ico"]
        );
        assert_eq!(output.get("css/theme/dark.css"), Some(&[0xEF, 0xBB, 0xBF, b'a'][..]));
        assert_eq!(output.get("favicon.ico"), Some(&[0u8, 0, 1, 0][..]));
    }

    #[test]
    fn development_copies_only_the_favicon() {
        let temp = project();
        let config = BuildConfig::new(temp.path(), Mode::Development);
        let mut output = BuildOutput::default();

        copy_assets(&config, &mut output).unwrap();
        assert_eq!(output.paths().collect::<Vec<_>>(), vec!["favicon.ico"]);
    }

    #[test]
    fn missing_favicon_is_not_an_error() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src/css")).unwrap();
        let config = BuildConfig::new(temp.path(), Mode::ProductionTest);
        let mut output = BuildOutput::default();

        assert!(!copy_assets(&config, &mut output).unwrap());
        assert_eq!(output.paths().count(), 0);
    }

    #[test]
    fn missing_copy_source_is_an_error() {
        let temp = tempdir().unwrap();
        let config = BuildConfig::new(temp.path(), Mode::Production);
        let mut output = BuildOutput::default();

        let err = copy_assets(&config, &mut output).unwrap_err();
        assert!(matches!(err, BuildError::CopyError { ref path, .. } if path.ends_with("css")));
    }

    #[test]
    fn destinations_stay_in_the_output() {
        assert_eq!(destination(Path::new("./css/")).unwrap(), "css");
        assert_eq!(destination(Path::new("/static/css")).unwrap(), "static/css");
        assert_eq!(destination(Path::new("")).unwrap(), "");

        let temp = project();
        let mut config = BuildConfig::new(temp.path(), Mode::Production);
        config.copies[0].to = PathBuf::from("../../outside");
        let mut output = BuildOutput::default();

        let err = copy_assets(&config, &mut output).unwrap_err();
        assert!(err.to_string().contains("inside the output directory"));
        assert!(output.paths().all(|p| !p.contains("..")));
    }
}
