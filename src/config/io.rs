use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Maximum size for a settings or resource file (10 MB).
pub const MAX_CONFIG_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Serialization format of a file on disk, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
    Toml,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") | Some("json5") => Some(Self::Json),
            Some("yaml") | Some("yml") => Some(Self::Yaml),
            Some("toml") => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Read a file as text, refusing anything above `MAX_CONFIG_FILE_BYTES`.
pub fn read_config_file(path: &Path) -> Result<String> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Cannot stat config file '{}'", path.display()))?;

    if metadata.len() > MAX_CONFIG_FILE_BYTES {
        bail!(
            "Config file '{}' is {} bytes, exceeds limit of {} bytes",
            path.display(),
            metadata.len(),
            MAX_CONFIG_FILE_BYTES,
        );
    }

    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))
}

/// Decode a string in the given format.
pub fn decode_str<T: DeserializeOwned>(content: &str, format: FileFormat) -> Result<T> {
    let value = match format {
        FileFormat::Yaml => serde_yaml::from_str(content)?,
        FileFormat::Toml => toml::from_str(content)?,
        // Try JSON5 first, then regular JSON for the better error message
        FileFormat::Json => match json5::from_str(content) {
            Ok(value) => value,
            Err(_) => serde_json::from_str(content)?,
        },
    };
    Ok(value)
}

/// Read and decode a file, choosing the format by extension.
pub fn decode_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let Some(format) = FileFormat::from_path(path) else {
        bail!("unsupported file format: '{}'", path.display());
    };
    let content = read_config_file(path)?;
    decode_str(&content, format).with_context(|| format!("Failed to parse '{}'", path.display()))
}

/// List the files matching `pattern` inside each directory, in order.
///
/// Every entry of `dirs` must be an existing directory.
pub fn find_files_in_directories(dirs: &[PathBuf], pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for dir in dirs {
        if !dir.is_dir() {
            bail!("'{}' is not a directory", dir.display());
        }

        let glob_pattern = dir.join(pattern);
        let glob_pattern = glob_pattern.to_string_lossy();
        let paths = glob::glob(&glob_pattern)
            .with_context(|| format!("Invalid glob filter '{pattern}'"))?;

        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(path) => debug!(path = %path.display(), "Skipping non-file entry"),
                Err(e) => warn!(error = %e, "Failed to read directory entry"),
            }
        }
    }

    Ok(files)
}

// ============================================================================
// Tests
// ============================================================================
