/// Default configuration constants used across the system.

/// Default Vault address.
pub const DEFAULT_VAULT_ADDR: &str = "http://127.0.0.1:8200";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Default glob filter for resource files inside config directories.
pub const DEFAULT_CONFIG_GLOB: &str = "*.yml";

/// Default glob filter for policy files inside policy directories.
pub const DEFAULT_POLICY_GLOB: &str = "*.hcl";

/// Default extension appended to encrypted files.
pub const DEFAULT_TRANSIT_EXTENSION: &str = ".enc";

/// Default glob filter for files inside transit directories.
pub const DEFAULT_TRANSIT_GLOB: &str = "*.yml";

/// Settings file names looked up in the working directory.
pub const SETTINGS_FILE_NAMES: &[&str] = &[
    "vaultsync.toml",
    "vaultsync.yaml",
    "vaultsync.yml",
    "vaultsync.json",
];

/// Settings directory under the user's home.
pub const SETTINGS_HOME_DIR: &str = ".vaultsync";

/// Environment variables recognised as overrides.
pub const ENV_VAULT_ADDR: &str = "VAULT_ADDR";
pub const ENV_VAULT_TOKEN: &str = "VAULT_TOKEN";
pub const ENV_VAULT_USERNAME: &str = "VAULT_USERNAME";
pub const ENV_VAULT_PASSWORD: &str = "VAULT_PASSWORD";
pub const ENV_VAULT_CREDENTIALS: &str = "VAULT_CREDENTIALS";
pub const ENV_VAULT_SKIP_VERIFY: &str = "VAULT_SKIP_VERIFY";
