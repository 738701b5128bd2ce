use super::Settings;
use anyhow::Result;
use tracing::warn;

/// Validation errors for settings.
#[derive(Debug, Clone)]
pub struct SettingsValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for SettingsValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Validate a settings object.
pub fn validate_settings(settings: &Settings) -> Vec<SettingsValidationError> {
    let mut errors = Vec::new();

    match url::Url::parse(&settings.vault.address) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            if url.scheme() == "http" && settings.vault.skip_tls_verify {
                warn!("TLS verification skip has no effect on a plain http address");
            }
        }
        Ok(url) => errors.push(SettingsValidationError {
            path: "vault.address".to_string(),
            message: format!("Unsupported scheme '{}', expected http or https", url.scheme()),
        }),
        Err(e) => errors.push(SettingsValidationError {
            path: "vault.address".to_string(),
            message: format!("Invalid URL '{}': {e}", settings.vault.address),
        }),
    }

    if settings.vault.timeout_secs == 0 {
        errors.push(SettingsValidationError {
            path: "vault.timeoutSecs".to_string(),
            message: "Timeout must be greater than 0".to_string(),
        });
    }

    if settings.sync.config_glob.trim().is_empty() {
        errors.push(SettingsValidationError {
            path: "sync.configGlob".to_string(),
            message: "Glob filter must not be empty".to_string(),
        });
    }

    if settings.sync.policy_glob.trim().is_empty() {
        errors.push(SettingsValidationError {
            path: "sync.policyGlob".to_string(),
            message: "Glob filter must not be empty".to_string(),
        });
    }

    errors
}

/// Validate settings and return Result.
pub fn validate_settings_object(settings: &Settings) -> Result<()> {
    let errors = validate_settings(settings);
    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Settings validation failed: {}", messages.join("; "));
    }
}
