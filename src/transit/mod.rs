//! File encryption and decryption through a transit engine.

use crate::config;
use crate::vault::VaultClient;
use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Mode applied to every file of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitMode {
    Encrypt,
    Decrypt,
}

/// Options of a transit run.
#[derive(Debug, Clone)]
pub struct TransitOptions {
    pub mode: TransitMode,
    /// Mount path of the transit engine.
    pub mount: String,
    /// Name of the key inside the engine.
    pub key: String,
    pub files: Vec<PathBuf>,
    pub dirs: Vec<PathBuf>,
    pub glob_filter: String,
    /// Extension appended to encrypted files and stripped when decrypting.
    pub extension: String,
    /// Print results instead of writing files.
    pub stdout: bool,
    /// Remove each source file once its output is written.
    pub delete_files: bool,
}

impl TransitOptions {
    pub fn validate(&self) -> Result<()> {
        if self.mount.trim().is_empty() {
            bail!("you have not specified a transit path");
        }
        if self.key.trim().is_empty() {
            bail!("you have not specified a transit key");
        }
        if self.extension.is_empty() {
            bail!("the file extension for encrypted files cannot be empty");
        }
        Ok(())
    }

    /// Where the result for `source` is written.
    pub fn target_path(&self, source: &Path) -> Result<PathBuf> {
        match self.mode {
            TransitMode::Encrypt => {
                let mut name = OsString::from(source.as_os_str());
                name.push(&self.extension);
                Ok(PathBuf::from(name))
            }
            TransitMode::Decrypt => {
                let name = source.to_string_lossy();
                match name.strip_suffix(self.extension.as_str()) {
                    Some(stripped) if !stripped.is_empty() => Ok(PathBuf::from(stripped)),
                    _ => bail!(
                        "'{}' does not end with '{}', refusing to overwrite it",
                        source.display(),
                        self.extension
                    ),
                }
            }
        }
    }

    fn wants(&self, path: &Path) -> bool {
        let encrypted = path.to_string_lossy().ends_with(self.extension.as_str());
        match self.mode {
            TransitMode::Encrypt => !encrypted,
            TransitMode::Decrypt => encrypted,
        }
    }

    /// Explicit files followed by the matching files of each directory.
    pub fn collect_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = self.files.clone();
        for path in config::find_files_in_directories(&self.dirs, &self.glob_filter)? {
            if self.wants(&path) {
                files.push(path);
            } else {
                debug!(path = %path.display(), "Skipping file");
            }
        }
        Ok(files)
    }
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitOutcome {
    pub source: PathBuf,
    /// `None` when the result went to the output stream.
    pub target: Option<PathBuf>,
}

/// Encrypt or decrypt every selected file. With `stdout` set, results are
/// written to `out` instead of the filesystem.
pub async fn run<W: Write>(
    client: &VaultClient,
    options: &TransitOptions,
    out: &mut W,
) -> Result<Vec<TransitOutcome>> {
    options.validate()?;

    let files = options.collect_files()?;
    if files.is_empty() {
        bail!("no files to process, specify files or directories");
    }

    let mut outcomes = Vec::with_capacity(files.len());
    for source in files {
        let target = options.target_path(&source)?;
        let content = tokio::fs::read(&source)
            .await
            .with_context(|| format!("Failed to read '{}'", source.display()))?;

        let output = match options.mode {
            TransitMode::Encrypt => client
                .encrypt(&options.mount, &options.key, &content)
                .await
                .with_context(|| format!("Failed to encrypt '{}'", source.display()))?
                .into_bytes(),
            TransitMode::Decrypt => {
                let ciphertext = String::from_utf8_lossy(&content);
                client
                    .decrypt(&options.mount, &options.key, &ciphertext)
                    .await
                    .with_context(|| format!("Failed to decrypt '{}'", source.display()))?
            }
        };

        if options.stdout {
            out.write_all(&output)?;
            out.flush()?;
            outcomes.push(TransitOutcome {
                source,
                target: None,
            });
            continue;
        }

        info!("saving the content from: {}, to: {}", source.display(), target.display());
        write_private(&target, &output).await?;

        if options.delete_files {
            tokio::fs::remove_file(&source)
                .await
                .with_context(|| format!("Failed to delete '{}'", source.display()))?;
        }

        outcomes.push(TransitOutcome {
            source,
            target: Some(target),
        });
    }

    Ok(outcomes)
}

/// Write `content`, readable by owner and group only.
async fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write '{}'", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o640)).await?;
    }

    Ok(())
}
