use crate::config::VaultSettings;
use crate::sync::ReconcilerConfig;
use crate::transit::TransitMode;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "vaultsync",
    version,
    about = "Synchronize auth backends, secret engines, policies, users and secrets into Vault"
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Path to a settings file
    #[arg(long, env = "VAULTSYNC_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    #[command(flatten)]
    pub vault: VaultOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize the users, policies, secrets and backends
    #[command(alias = "sync")]
    Synchronize(SyncOpts),
    /// Encrypt or decrypt files using a transit backend
    #[command(aliases = ["tr", "trans"])]
    Transit(TransitOpts),
    Version,
}

/// Connection options, taking precedence over environment and settings.
#[derive(Args, Default)]
pub struct VaultOpts {
    /// The vault address, e.g. https://vault.example.com:8200
    #[arg(short = 'A', long = "vault-addr")]
    pub address: Option<String>,

    /// The vault username to log in with
    #[arg(short, long)]
    pub username: Option<String>,

    /// The vault password to log in with
    #[arg(short, long)]
    pub password: Option<String>,

    /// A vault token to use instead of logging in
    #[arg(long)]
    pub token: Option<String>,

    /// A file holding the username and password
    #[arg(short = 'c', long)]
    pub credentials: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub skip_tls_verify: bool,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl VaultOpts {
    /// Overlay the options given on the command line.
    pub fn apply(&self, settings: &mut VaultSettings) {
        if let Some(address) = &self.address {
            settings.address = address.clone();
        }
        if let Some(username) = &self.username {
            settings.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            settings.password = Some(password.clone());
        }
        if let Some(token) = &self.token {
            settings.token = Some(token.clone());
        }
        if let Some(credentials) = &self.credentials {
            settings.credentials = Some(credentials.clone());
        }
        if self.skip_tls_verify {
            settings.skip_tls_verify = true;
        }
        if let Some(timeout) = self.timeout {
            settings.timeout_secs = timeout;
        }
    }
}

#[derive(Args)]
pub struct SyncOpts {
    /// A configuration file containing auths, users, backends and or secrets
    #[arg(short, long = "config")]
    pub config: Vec<PathBuf>,

    /// A directory containing one or more configuration files
    #[arg(short = 'C', long = "config-dir")]
    pub config_dir: Vec<PathBuf>,

    /// A directory containing one or more policy files
    #[arg(short, long = "policies")]
    pub policies: Vec<PathBuf>,

    /// Report resources in vault that are no longer declared
    #[arg(long)]
    pub sync_full: bool,

    /// Delete undeclared resources; requires --sync-full
    #[arg(long)]
    pub delete: bool,

    #[arg(long)]
    pub skip_auths: bool,

    #[arg(long)]
    pub skip_policies: bool,

    #[arg(long)]
    pub skip_users: bool,

    #[arg(long)]
    pub skip_backends: bool,

    #[arg(long)]
    pub skip_secrets: bool,

    /// Skip failing items and attempt to finish regardless
    #[arg(long, alias = "skip-errors")]
    pub ignore_errors: bool,

    /// Glob used to find policy files in policy directories
    #[arg(long)]
    pub policy_extension: Option<String>,

    /// Glob used to find configuration files in configuration directories
    #[arg(long)]
    pub config_extension: Option<String>,
}

impl SyncOpts {
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            skip_auths: self.skip_auths,
            skip_policies: self.skip_policies,
            skip_users: self.skip_users,
            skip_backends: self.skip_backends,
            skip_secrets: self.skip_secrets,
            full_sync: self.sync_full,
            delete: self.delete,
            ignore_errors: self.ignore_errors,
        }
    }
}

#[derive(Args)]
pub struct TransitOpts {
    /// Encrypt the contents of the files
    #[arg(short, long)]
    pub encrypt: bool,

    /// Decrypt the contents of the files
    #[arg(short, long)]
    pub decrypt: bool,

    /// The transit backend mount
    #[arg(short, long)]
    pub transit: String,

    /// The name of the key in the transit backend
    #[arg(short, long)]
    pub key: String,

    /// A file to process
    #[arg(short, long = "file")]
    pub files: Vec<PathBuf>,

    /// A directory containing files to process
    #[arg(short = 'D', long = "directory")]
    pub directories: Vec<PathBuf>,

    /// Print the output rather than saving it to files
    #[arg(short = 'O', long)]
    pub stdout: bool,

    /// Delete the source files once processed
    #[arg(long)]
    pub delete_files: bool,

    /// Glob used to find files in directories
    #[arg(long)]
    pub glob_filter: Option<String>,

    /// Extension added to encrypted files
    #[arg(long)]
    pub file_extension: Option<String>,
}

impl TransitOpts {
    /// Exactly one of encrypt and decrypt must be chosen.
    pub fn mode(&self) -> anyhow::Result<TransitMode> {
        match (self.encrypt, self.decrypt) {
            (true, false) => Ok(TransitMode::Encrypt),
            (false, true) => Ok(TransitMode::Decrypt),
            _ => anyhow::bail!("you have to choose encryption or decryption"),
        }
    }
}
