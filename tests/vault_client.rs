//! Integration tests for the HTTP client and the transit command.
//!
//! A wiremock server stands in for Vault so that request paths, headers and
//! bodies can be checked without a running server.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vaultsync::config::VaultSettings;
use vaultsync::resources::{ResourceSet, Secret, TokenSpec, User, UserAuth, UserCredentials};
use vaultsync::sync::{ReconcilerConfig, Synchronizer};
use vaultsync::transit::{self, TransitMode, TransitOptions};
use vaultsync::vault::{self, Method, MountTtl, VaultApi, VaultClient, VaultError};

const TOKEN: &str = "s.test-token";

fn client(server: &MockServer) -> VaultClient {
    VaultClient::new(&server.uri(), Duration::from_secs(5), false)
        .unwrap()
        .with_token(TOKEN)
}

// ============================================================================
// VaultApi over HTTP
// ============================================================================

#[tokio::test]
async fn lists_mounts_with_token_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/mounts"))
        .and(header("X-Vault-Token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "secret/": {"type": "kv", "description": "key/value secret storage"},
            "pki/": {"type": "pki", "description": "ca"},
            "data": {
                "secret/": {"type": "kv", "description": "key/value secret storage"},
                "pki/": {"type": "pki", "description": "ca"},
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mounts = client(&server).list_secret_mounts().await.unwrap();
    assert_eq!(mounts.keys().cloned().collect::<Vec<_>>(), vec!["pki", "secret"]);
    assert_eq!(mounts["pki"].kind, "pki");
}

#[tokio::test]
async fn mounts_secret_engine_with_lease_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sys/mounts/mysql"))
        .and(body_partial_json(json!({
            "type": "mysql",
            "description": "db",
            "config": {"default_lease_ttl": "3600s", "max_lease_ttl": "system"},
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let ttl = MountTtl {
        default_lease: Duration::from_secs(3600),
        max_lease: Duration::ZERO,
    };
    client(&server)
        .mount_secret("mysql", "mysql", "db", ttl)
        .await
        .unwrap();
}

#[tokio::test]
async fn apply_config_returns_non_success_status() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/mysql/config/connection"))
        .and(body_partial_json(json!({"connection_url": "dsn"})))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"errors": ["bad connection"]})),
        )
        .mount(&server)
        .await;

    let mut body = BTreeMap::new();
    body.insert("connection_url".to_string(), "dsn".to_string());
    let response = client(&server)
        .apply_config(Method::PUT, "mysql/config/connection", &body)
        .await
        .unwrap();

    assert_eq!(response.status, 400);
    assert!(response.body.contains("bad connection"));
}

#[tokio::test]
async fn failed_request_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/policy/read"))
        .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
        .mount(&server)
        .await;

    let err = client(&server)
        .set_policy("read", "path \"*\" {}")
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(403));
    match err {
        VaultError::Status { body, path, .. } => {
            assert_eq!(path, "sys/policy/read");
            assert_eq!(body, "permission denied");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn policies_written_as_rules_and_listed() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/policy/read"))
        .and(body_partial_json(json!({"rules": "path \"secret/*\" {}"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/policy"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"policies": ["default", "read", "root"]})),
        )
        .mount(&server)
        .await;

    let client = client(&server);
    client.set_policy("read", "path \"secret/*\" {}").await.unwrap();
    assert_eq!(
        client.list_policies().await.unwrap(),
        vec!["default", "read", "root"]
    );
}

#[tokio::test]
async fn upserts_userpass_user_with_joined_policies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/userpass/users/alice"))
        .and(body_partial_json(json!({"password": "x", "policies": "read,write"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let creds = UserCredentials {
        username: "alice".into(),
        password: "x".into(),
    };
    client(&server)
        .upsert_user(
            "userpass",
            UserAuth::UserPass(&creds),
            &["read".to_string(), "write".to_string()],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn creates_token_user_with_ttl_and_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/create"))
        .and(header("X-Vault-Token", TOKEN))
        .and(body_json(json!({
            "display_name": "ci",
            "policies": ["deploy"],
            "num_uses": 5,
            "id": "s.fixed-id",
            "ttl": "3600s",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "auth": {"client_token": "s.fixed-id"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = TokenSpec {
        id: Some("s.fixed-id".into()),
        display_name: "ci".into(),
        ttl: Duration::from_secs(3600),
        max_uses: 5,
    };
    client(&server)
        .upsert_user("token", UserAuth::Token(&token), &["deploy".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn synchronizer_creates_token_user_with_default_policy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/create"))
        .and(body_json(json!({
            "display_name": "ci",
            "policies": ["none"],
            "num_uses": 0,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "auth": {"client_token": "s.generated"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ReconcilerConfig {
        skip_auths: true,
        skip_policies: true,
        skip_backends: true,
        skip_secrets: true,
        ..Default::default()
    };
    let client: Arc<dyn VaultApi> = Arc::new(client(&server));
    let sync = Synchronizer::new(client, config).unwrap();

    let mut resources = ResourceSet {
        users: vec![User {
            token: Some(TokenSpec {
                display_name: "ci".into(),
                ..Default::default()
            }),
            ..Default::default()
        }],
        ..Default::default()
    };
    let report = sync.run(&mut resources).await.unwrap();
    assert_eq!(report.applied(), 1);
}

// ============================================================================
// Login
// ============================================================================

async fn mount_login(server: &MockServer, username: &str, password: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/v1/auth/userpass/login/{username}")))
        .and(body_partial_json(json!({"password": password})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "auth": {"client_token": "s.from-login", "policies": ["default"]}
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/policy"))
        .and(header("X-Vault-Token", "s.from-login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"policies": ["default"]})))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn connect_logs_in_with_username_and_password() {
    let server = MockServer::start().await;
    mount_login(&server, "admin", "hunter2").await;

    let settings = VaultSettings {
        address: server.uri(),
        username: Some("admin".into()),
        password: Some("hunter2".into()),
        token: Some("ignored".into()),
        ..Default::default()
    };
    let client = vault::connect(&settings).await.unwrap();
    client.list_policies().await.unwrap();
}

#[tokio::test]
async fn connect_prefers_credentials_file() {
    let server = MockServer::start().await;
    mount_login(&server, "robot", "from-file").await;

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("creds.yml");
    fs::write(&file, "username: robot\npassword: from-file\n").unwrap();

    let settings = VaultSettings {
        address: server.uri(),
        username: Some("admin".into()),
        password: Some("hunter2".into()),
        credentials: Some(file),
        ..Default::default()
    };
    let client = vault::connect(&settings).await.unwrap();
    client.list_policies().await.unwrap();
}

#[tokio::test]
async fn connect_rejects_incomplete_credentials_file() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("creds.json");
    fs::write(&file, r#"{"username": "robot"}"#).unwrap();

    let settings = VaultSettings {
        credentials: Some(file),
        ..Default::default()
    };
    let err = vault::connect(&settings).await.unwrap_err();
    assert!(format!("{err:#}").contains("password"));
}

// ============================================================================
// Synchronizer over HTTP
// ============================================================================

#[tokio::test]
async fn synchronizer_writes_secret_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/secret/app"))
        .and(header("X-Vault-Token", TOKEN))
        .and(body_partial_json(json!({"username": "app", "port": 5432})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let config = ReconcilerConfig {
        skip_auths: true,
        skip_policies: true,
        skip_users: true,
        ..Default::default()
    };
    let client: Arc<dyn VaultApi> = Arc::new(client(&server));
    let sync = Synchronizer::new(client, config).unwrap();

    let mut resources = ResourceSet {
        secrets: vec![Secret {
            path: "secret/app".into(),
            values: serde_json::from_value(json!({"username": "app", "port": 5432})).unwrap(),
        }],
        ..Default::default()
    };
    let report = sync.run(&mut resources).await.unwrap();
    assert_eq!(report.applied(), 1);
}

// ============================================================================
// Transit
// ============================================================================

fn transit_options(mode: TransitMode) -> TransitOptions {
    TransitOptions {
        mode,
        mount: "transit".into(),
        key: "app".into(),
        files: Vec::new(),
        dirs: Vec::new(),
        glob_filter: "*.yml".into(),
        extension: ".enc".into(),
        stdout: false,
        delete_files: false,
    }
}

#[tokio::test]
async fn transit_encrypts_to_file_and_deletes_source() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/transit/encrypt/app"))
        .and(body_partial_json(json!({"plaintext": "cGFzc3dvcmQ6IGh1bnRlcjIK"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"ciphertext": "vault:v1:abc"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let source = dir.path().join("app.yml");
    fs::write(&source, "password: hunter2\n").unwrap();

    let mut options = transit_options(TransitMode::Encrypt);
    options.dirs = vec![dir.path().to_path_buf()];
    options.delete_files = true;

    let mut out = Vec::new();
    let outcomes = transit::run(&client(&server), &options, &mut out).await.unwrap();

    let target = dir.path().join("app.yml.enc");
    assert_eq!(outcomes[0].target.as_deref(), Some(target.as_path()));
    assert_eq!(fs::read_to_string(&target).unwrap(), "vault:v1:abc");
    assert!(!source.exists());
    assert!(out.is_empty());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }
}

#[tokio::test]
async fn transit_decrypts_to_stdout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/transit/decrypt/app"))
        .and(body_partial_json(json!({"ciphertext": "vault:v1:abc"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"plaintext": "cGFzc3dvcmQ6IGh1bnRlcjIK"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let source = dir.path().join("app.yml.enc");
    fs::write(&source, "vault:v1:abc\n").unwrap();

    let mut options = transit_options(TransitMode::Decrypt);
    options.files = vec![source.clone()];
    options.stdout = true;

    let mut out = Vec::new();
    let outcomes = transit::run(&client(&server), &options, &mut out).await.unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "password: hunter2\n");
    assert_eq!(outcomes[0].target, None);
    assert!(!dir.path().join("app.yml").exists());
    assert!(source.exists());
}

#[tokio::test]
async fn transit_refuses_to_decrypt_without_extension() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("app.yml");
    fs::write(&source, "vault:v1:abc").unwrap();

    let mut options = transit_options(TransitMode::Decrypt);
    options.files = vec![source];

    let mut out = Vec::new();
    let err = transit::run(&client(&server), &options, &mut out).await.unwrap_err();
    assert!(err.to_string().contains("refusing to overwrite"));
}
