//! Building a [`ResourceSet`] from files and directories on disk.

use super::{PolicyFile, ResourceFile, ResourceSet};
use crate::config::{self, FileFormat};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where to look for resource and policy files.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_files: Vec<PathBuf>,
    pub config_dirs: Vec<PathBuf>,
    pub config_glob: String,
    pub policy_dirs: Vec<PathBuf>,
    pub policy_glob: String,
}

impl ResourceSet {
    /// Parse and merge every resource file, then collect policy files.
    ///
    /// Explicit files come first, followed by directory matches in the order
    /// the directories were given.
    pub fn load(options: &LoadOptions) -> Result<Self> {
        let mut set = ResourceSet::new();

        let mut files = options.config_files.clone();
        files.extend(config::find_files_in_directories(
            &options.config_dirs,
            &options.config_glob,
        )?);

        for file in &files {
            set.merge(load_resource_file(file)?);
        }

        for path in config::find_files_in_directories(&options.policy_dirs, &options.policy_glob)? {
            match PolicyFile::from_path(&path) {
                Some(policy) => set.policies.push(policy),
                None => debug!(path = %path.display(), "Skipping policy file without a name"),
            }
        }

        info!(
            files = files.len(),
            auths = set.auths.len(),
            policies = set.policies.len(),
            users = set.users.len(),
            backends = set.backends.len(),
            secrets = set.secrets.len(),
            "Loaded resources"
        );

        Ok(set)
    }
}

/// Parse one resource file. Only JSON and YAML are accepted.
pub fn load_resource_file(path: &Path) -> Result<ResourceFile> {
    match FileFormat::from_path(path) {
        Some(FileFormat::Json) | Some(FileFormat::Yaml) => {}
        _ => bail!("unsupported file format: '{}'", path.display()),
    }
    debug!(path = %path.display(), "Parsing resource file");
    config::decode_file(path).with_context(|| format!("Invalid resource file '{}'", path.display()))
}
