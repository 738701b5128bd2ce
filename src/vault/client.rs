use super::*;
use crate::config::{self, VaultSettings};
use crate::resources::UserCredentials;
use anyhow::{bail, Context};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

const API_VERSION: &str = "v1";
const TOKEN_HEADER: &str = "X-Vault-Token";

/// HTTP client for the Vault API.
pub struct VaultClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl VaultClient {
    pub fn new(address: &str, timeout: Duration, skip_tls_verify: bool) -> Result<Self, VaultError> {
        let url = url::Url::parse(address).map_err(|e| VaultError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(VaultError::InvalidAddress {
                address: address.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(skip_tls_verify)
            .build()?;

        Ok(Self {
            base_url: address.trim_end_matches('/').to_string(),
            token: None,
            client,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.set_token(token);
        self
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            API_VERSION,
            path.trim_start_matches('/')
        )
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, VaultError> {
        debug!(%method, path, "Vault request");
        let mut request = self.client.request(method, self.endpoint(path));
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Send a request and decode the JSON answer; `204` yields `Null`.
    async fn request_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, VaultError> {
        let resp = self.send(method.clone(), path, body).await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(VaultError::Status {
                method,
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| VaultError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    // ------------------------------------------------------------------------
    // Login and transit
    // ------------------------------------------------------------------------

    /// Exchange username and password for a client token.
    pub async fn login_userpass(&self, credentials: &UserCredentials) -> Result<String, VaultError> {
        debug!(username = %credentials.username, "Logging into vault");
        let path = format!("auth/userpass/login/{}", credentials.username);
        let body = json!({ "password": credentials.password });
        let response = self.request_json(Method::POST, &path, Some(&body)).await?;

        response
            .pointer("/auth/client_token")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or(VaultError::MissingField {
                path,
                field: "auth.client_token",
            })
    }

    /// Encrypt `plaintext` with the named key of a transit engine.
    pub async fn encrypt(&self, mount: &str, key: &str, plaintext: &[u8]) -> Result<String, VaultError> {
        let path = format!("{}/encrypt/{}", mount.trim_matches('/'), key);
        let body = json!({ "plaintext": STANDARD.encode(plaintext) });
        let response = self.request_json(Method::POST, &path, Some(&body)).await?;

        response
            .pointer("/data/ciphertext")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or(VaultError::MissingField {
                path,
                field: "ciphertext",
            })
    }

    /// Decrypt a transit ciphertext back to raw bytes.
    pub async fn decrypt(&self, mount: &str, key: &str, ciphertext: &str) -> Result<Vec<u8>, VaultError> {
        let path = format!("{}/decrypt/{}", mount.trim_matches('/'), key);
        let body = json!({ "ciphertext": ciphertext.trim() });
        let response = self.request_json(Method::POST, &path, Some(&body)).await?;

        let encoded = response
            .pointer("/data/plaintext")
            .and_then(Value::as_str)
            .ok_or_else(|| VaultError::MissingField {
                path: path.clone(),
                field: "plaintext",
            })?;

        STANDARD.decode(encoded).map_err(|e| VaultError::Decode {
            path,
            reason: e.to_string(),
        })
    }
}

// ============================================================================
// VaultApi Implementation
// ============================================================================

#[async_trait]
impl VaultApi for VaultClient {
    async fn list_auth_mounts(&self) -> Result<Mounts, VaultError> {
        let response = self.request_json(Method::GET, "sys/auth", None).await?;
        parse_mounts("sys/auth", response)
    }

    async fn mount_auth(&self, path: &str, kind: &str, description: &str) -> Result<(), VaultError> {
        let body = json!({ "type": kind, "description": description });
        self.request_json(Method::POST, &format!("sys/auth/{path}"), Some(&body))
            .await?;
        Ok(())
    }

    async fn unmount_auth(&self, path: &str) -> Result<(), VaultError> {
        self.request_json(Method::DELETE, &format!("sys/auth/{path}"), None)
            .await?;
        Ok(())
    }

    async fn list_secret_mounts(&self) -> Result<Mounts, VaultError> {
        let response = self.request_json(Method::GET, "sys/mounts", None).await?;
        parse_mounts("sys/mounts", response)
    }

    async fn mount_secret(
        &self,
        path: &str,
        kind: &str,
        description: &str,
        ttl: MountTtl,
    ) -> Result<(), VaultError> {
        let body = json!({
            "type": kind,
            "description": description,
            "config": {
                "default_lease_ttl": MountTtl::render(ttl.default_lease),
                "max_lease_ttl": MountTtl::render(ttl.max_lease),
            },
        });
        self.request_json(Method::POST, &format!("sys/mounts/{path}"), Some(&body))
            .await?;
        Ok(())
    }

    async fn unmount_secret(&self, path: &str) -> Result<(), VaultError> {
        self.request_json(Method::DELETE, &format!("sys/mounts/{path}"), None)
            .await?;
        Ok(())
    }

    async fn apply_config(
        &self,
        method: Method,
        path: &str,
        body: &BTreeMap<String, String>,
    ) -> Result<ApiResponse, VaultError> {
        debug!(path, keys = ?body.keys().collect::<Vec<_>>(), "Applying configuration");
        let body = serde_json::to_value(body).map_err(|e| VaultError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let resp = self.send(method, path, Some(&body)).await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(ApiResponse { status, body })
    }

    async fn list_policies(&self) -> Result<Vec<String>, VaultError> {
        let response = self.request_json(Method::GET, "sys/policy", None).await?;
        parse_policies(&response).ok_or(VaultError::MissingField {
            path: "sys/policy".to_string(),
            field: "policies",
        })
    }

    async fn set_policy(&self, name: &str, content: &str) -> Result<(), VaultError> {
        let body = json!({ "rules": content });
        self.request_json(Method::PUT, &format!("sys/policy/{name}"), Some(&body))
            .await?;
        Ok(())
    }

    async fn delete_policy(&self, name: &str) -> Result<(), VaultError> {
        self.request_json(Method::DELETE, &format!("sys/policy/{name}"), None)
            .await?;
        Ok(())
    }

    async fn upsert_user(
        &self,
        mount: &str,
        auth: UserAuth<'_>,
        policies: &[String],
    ) -> Result<(), VaultError> {
        let (path, body) = match auth {
            UserAuth::UserPass(creds) => (
                format!("auth/{mount}/users/{}", creds.username),
                json!({
                    "password": creds.password,
                    "policies": policies.join(","),
                }),
            ),
            UserAuth::Token(token) => {
                let mut body = json!({
                    "display_name": token.display_name,
                    "policies": policies,
                    "num_uses": token.max_uses,
                });
                if let Some(id) = &token.id {
                    body["id"] = json!(id);
                }
                if !token.ttl.is_zero() {
                    body["ttl"] = json!(format!("{}s", token.ttl.as_secs()));
                }
                (format!("auth/{mount}/create"), body)
            }
        };

        self.request_json(Method::POST, &path, Some(&body)).await?;
        Ok(())
    }

    async fn write_secret(
        &self,
        path: &str,
        values: &serde_json::Map<String, Value>,
    ) -> Result<(), VaultError> {
        debug!(path, keys = ?values.keys().collect::<Vec<_>>(), "Writing secret");
        let body = Value::Object(values.clone());
        self.request_json(Method::PUT, path, Some(&body)).await?;
        Ok(())
    }
}

/// Mount listings are keyed by path; newer servers wrap them in `data`.
fn parse_mounts(path: &str, response: Value) -> Result<Mounts, VaultError> {
    let Value::Object(mut map) = response else {
        return Err(VaultError::Decode {
            path: path.to_string(),
            reason: "expected an object".to_string(),
        });
    };
    let entries = match map.remove("data") {
        Some(Value::Object(data)) => data,
        _ => map,
    };

    let mut mounts = Mounts::new();
    for (key, value) in entries {
        if !value.get("type").is_some_and(Value::is_string) {
            continue;
        }
        let info: MountInfo = serde_json::from_value(value).map_err(|e| VaultError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        mounts.insert(key.trim_matches('/').to_string(), info);
    }
    Ok(mounts)
}

fn parse_policies(response: &Value) -> Option<Vec<String>> {
    let list = response
        .get("policies")
        .or_else(|| response.pointer("/data/policies"))
        .or_else(|| response.get("keys"))?
        .as_array()?;
    Some(
        list.iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
    )
}

/// Build a client for `settings` and log in.
///
/// A credentials file wins over a username and password, which win over a
/// plain token.
pub async fn connect(settings: &VaultSettings) -> anyhow::Result<VaultClient> {
    let mut client = VaultClient::new(
        &settings.address,
        Duration::from_secs(settings.timeout_secs),
        settings.skip_tls_verify,
    )?;

    let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

    let token = if let Some(file) = &settings.credentials {
        let creds: UserCredentials = config::decode_file(file)
            .with_context(|| format!("Invalid credentials file '{}'", file.display()))?;
        creds.check()?;
        client
            .login_userpass(&creds)
            .await
            .context("Failed to log in with credentials file")?
    } else if let (Some(username), Some(password)) =
        (non_empty(&settings.username), non_empty(&settings.password))
    {
        client
            .login_userpass(&UserCredentials { username, password })
            .await
            .context("Failed to log in with username and password")?
    } else if let Some(token) = non_empty(&settings.token) {
        token
    } else {
        bail!("no vault credentials: set a token, a username and password, or a credentials file");
    };

    client.set_token(token);
    info!(address = %settings.address, "Connected to vault");
    Ok(client)
}
