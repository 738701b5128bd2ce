//! Structural validation of declared resources.
//!
//! Validation of auth backends and secret engines also expands file
//! references: any attribute value of the form `@<path>` is replaced by the
//! content of that file. The expansion happens once per attribute.

use super::{Auth, Attribute, Backend, ResourceKind, Secret, User, UserAuth, UserCredentials};
use std::path::Path;
use std::time::Duration;

/// Prefix marking an attribute value as a reference to a local file.
pub const FILE_REFERENCE_PREFIX: char = '@';

/// Secret engine types accepted in backend declarations.
pub const SUPPORTED_BACKEND_TYPES: &[&str] = &[
    "aws",
    "generic",
    "pki",
    "transit",
    "cassandra",
    "consul",
    "cubbyhole",
    "mysql",
    "postgres",
    "ssh",
    "custom",
];

/// Auth backend types accepted in auth declarations.
pub const SUPPORTED_AUTH_TYPES: &[&str] =
    &["userpass", "ldap", "token", "appid", "github", "mfa", "tls"];

/// A declared resource violates a structural constraint.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{kind} must have a path")]
    MissingPath { kind: ResourceKind },

    #[error("{kind}: {path}, path should not end with /")]
    TrailingSlash { kind: ResourceKind, path: String },

    #[error("{kind}: {path}, must have a {field}")]
    MissingField {
        kind: ResourceKind,
        path: String,
        field: &'static str,
    },

    #[error("{kind}: {path}, unsupported type: {value}, supported types are: {supported}")]
    UnsupportedType {
        kind: ResourceKind,
        path: String,
        value: String,
        supported: String,
    },

    #[error("backend: {path}, max lease ttl ({max:?}) cannot be less than the default ({default:?})")]
    LeaseTtlOrder {
        path: String,
        default: Duration,
        max: Duration,
    },

    #[error("{kind}: {path}, attribute {index} must have a uri")]
    MissingUri {
        kind: ResourceKind,
        path: String,
        index: usize,
    },

    #[error("{kind}: {path}, file referenced in config: {reference} does not exist")]
    FileNotFound {
        kind: ResourceKind,
        path: String,
        reference: String,
    },

    #[error("{kind}: {path}, unable to read file referenced in config: {reference}")]
    FileUnreadable {
        kind: ResourceKind,
        path: String,
        reference: String,
        #[source]
        source: std::io::Error,
    },

    #[error("user: {name}, has no authentication method (userpass or token)")]
    NoAuthentication { name: String },

    #[error("user: {name}, only one authentication method may be given")]
    MultipleAuthentication { name: String },

    #[error("user: {name}, {reason}")]
    InvalidCredentials { name: String, reason: &'static str },

    #[error("secret: {path}, must have some values")]
    EmptyValues { path: String },
}

/// Checks a declared resource before it is applied.
pub trait Validate {
    fn validate(&mut self) -> Result<(), ValidationError>;
}

impl Validate for Auth {
    fn validate(&mut self) -> Result<(), ValidationError> {
        let kind = ResourceKind::Auth;
        check_path(kind, &self.path)?;
        if self.kind.is_empty() {
            return Err(ValidationError::MissingField {
                kind,
                path: self.path.clone(),
                field: "type",
            });
        }
        check_supported(kind, &self.path, &self.kind, SUPPORTED_AUTH_TYPES)?;
        check_attributes(kind, &self.path, &self.attributes)?;
        expand_file_references(kind, &self.path, &mut self.attributes)
    }
}

impl Validate for Backend {
    fn validate(&mut self) -> Result<(), ValidationError> {
        let kind = ResourceKind::Backend;
        check_path(kind, &self.path)?;
        if self.kind.is_empty() {
            return Err(ValidationError::MissingField {
                kind,
                path: self.path.clone(),
                field: "type",
            });
        }
        if self.description.is_empty() {
            return Err(ValidationError::MissingField {
                kind,
                path: self.path.clone(),
                field: "description",
            });
        }
        if self.max_lease_ttl < self.default_lease_ttl {
            return Err(ValidationError::LeaseTtlOrder {
                path: self.path.clone(),
                default: self.default_lease_ttl,
                max: self.max_lease_ttl,
            });
        }
        check_supported(kind, &self.path, &self.kind, SUPPORTED_BACKEND_TYPES)?;
        check_attributes(kind, &self.path, &self.attributes)?;
        expand_file_references(kind, &self.path, &mut self.attributes)
    }
}

impl Validate for User {
    fn validate(&mut self) -> Result<(), ValidationError> {
        if self.path.ends_with('/') {
            return Err(ValidationError::TrailingSlash {
                kind: ResourceKind::User,
                path: self.path.clone(),
            });
        }
        match self.auth()? {
            UserAuth::UserPass(creds) => check_credentials(&self.name(), creds),
            UserAuth::Token(token) if token.display_name.is_empty() => {
                Err(ValidationError::InvalidCredentials {
                    name: self.name(),
                    reason: "token does not have a display name",
                })
            }
            UserAuth::Token(_) => Ok(()),
        }
    }
}

impl User {
    /// The single authentication method this user carries.
    pub fn auth(&self) -> Result<UserAuth<'_>, ValidationError> {
        match (&self.userpass, &self.token) {
            (Some(creds), None) => Ok(UserAuth::UserPass(creds)),
            (None, Some(token)) => Ok(UserAuth::Token(token)),
            (Some(_), Some(_)) => Err(ValidationError::MultipleAuthentication { name: self.name() }),
            (None, None) => Err(ValidationError::NoAuthentication { name: self.name() }),
        }
    }
}

impl UserCredentials {
    /// Both a username and a password must be present.
    pub fn check(&self) -> Result<(), ValidationError> {
        check_credentials(&self.username, self)
    }
}

impl Validate for Secret {
    fn validate(&mut self) -> Result<(), ValidationError> {
        if self.path.is_empty() {
            return Err(ValidationError::MissingPath {
                kind: ResourceKind::Secret,
            });
        }
        if self.values.is_empty() {
            return Err(ValidationError::EmptyValues {
                path: self.path.clone(),
            });
        }
        Ok(())
    }
}

fn check_path(kind: ResourceKind, path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(ValidationError::MissingPath { kind });
    }
    if path.ends_with('/') {
        return Err(ValidationError::TrailingSlash {
            kind,
            path: path.to_string(),
        });
    }
    Ok(())
}

fn check_supported(
    kind: ResourceKind,
    path: &str,
    value: &str,
    supported: &[&str],
) -> Result<(), ValidationError> {
    if supported.contains(&value) {
        return Ok(());
    }
    Err(ValidationError::UnsupportedType {
        kind,
        path: path.to_string(),
        value: value.to_string(),
        supported: supported.join(","),
    })
}

fn check_attributes(
    kind: ResourceKind,
    path: &str,
    attributes: &[Attribute],
) -> Result<(), ValidationError> {
    match attributes.iter().position(|a| a.target_uri.trim().is_empty()) {
        Some(index) => Err(ValidationError::MissingUri {
            kind,
            path: path.to_string(),
            index,
        }),
        None => Ok(()),
    }
}

fn check_credentials(name: &str, creds: &UserCredentials) -> Result<(), ValidationError> {
    if creds.username.is_empty() {
        return Err(ValidationError::InvalidCredentials {
            name: name.to_string(),
            reason: "does not have a username",
        });
    }
    if creds.password.is_empty() {
        return Err(ValidationError::InvalidCredentials {
            name: name.to_string(),
            reason: "does not have a password",
        });
    }
    Ok(())
}

/// Replace `@<file>` values with the file's content. An attribute is only
/// updated once every reference in it has been read.
fn expand_file_references(
    kind: ResourceKind,
    path: &str,
    attributes: &mut [Attribute],
) -> Result<(), ValidationError> {
    for attribute in attributes.iter_mut().filter(|a| !a.is_expanded()) {
        let mut values = attribute.values.clone();
        for value in values.values_mut() {
            let Some(file) = value.strip_prefix(FILE_REFERENCE_PREFIX) else {
                continue;
            };
            let file = Path::new(file);
            if !file.is_file() {
                return Err(ValidationError::FileNotFound {
                    kind,
                    path: path.to_string(),
                    reference: value.clone(),
                });
            }
            let content =
                std::fs::read_to_string(file).map_err(|source| ValidationError::FileUnreadable {
                    kind,
                    path: path.to_string(),
                    reference: value.clone(),
                    source,
                })?;
            *value = content;
        }
        attribute.values = values;
        attribute.mark_expanded();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::TokenSpec;
    use std::fs;
    use tempfile::TempDir;

    fn backend(path: &str, kind: &str, description: &str) -> Backend {
        Backend {
            path: path.into(),
            kind: kind.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    #[test]
    fn backend_cases() {
        let cases: Vec<(Backend, bool)> = vec![
            (Backend::default(), false),
            (backend("mysql", "", ""), false),
            (backend("mysql", "mysql", ""), false),
            (backend("mysql", "test", "db"), false),
            (backend("mysql/", "mysql", "db"), false),
            (backend("mysql", "mysql", "db"), true),
            (
                Backend {
                    attributes: vec![Attribute::new("")],
                    ..backend("mysql", "mysql", "db")
                },
                false,
            ),
            (
                Backend {
                    attributes: vec![Attribute::new("config/lease")],
                    ..backend("mysql", "mysql", "db")
                },
                true,
            ),
            (
                Backend {
                    default_lease_ttl: Duration::from_secs(3600),
                    max_lease_ttl: Duration::from_secs(60),
                    ..backend("mysql", "mysql", "db")
                },
                false,
            ),
        ];

        for (i, (mut b, ok)) in cases.into_iter().enumerate() {
            let result = b.validate();
            assert_eq!(result.is_ok(), ok, "case {i}: {result:?}");
        }
    }

    #[test]
    fn unsupported_backend_lists_supported_set() {
        let err = backend("mysql", "bogus", "db").validate().unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, ValidationError::UnsupportedType { .. }));
        assert!(message.contains("bogus"));
        assert!(message.contains("aws,generic,pki"));
    }

    #[test]
    fn auth_cases() {
        let mut ok = Auth {
            path: "github".into(),
            kind: "github".into(),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let mut bad_type = Auth {
            kind: "kerberos".into(),
            ..ok.clone()
        };
        assert!(bad_type.validate().is_err());

        let mut trailing = Auth {
            path: "github/".into(),
            ..ok.clone()
        };
        assert!(matches!(
            trailing.validate(),
            Err(ValidationError::TrailingSlash { .. })
        ));

        let mut no_uri = Auth {
            attributes: vec![Attribute::new(" ").with_value("organization", "acme")],
            ..ok
        };
        assert!(matches!(
            no_uri.validate(),
            Err(ValidationError::MissingUri { index: 0, .. })
        ));
    }

    #[test]
    fn user_cases() {
        let creds = |u: &str, p: &str| UserCredentials {
            username: u.into(),
            password: p.into(),
        };
        let cases: Vec<(User, bool)> = vec![
            (User::default(), false),
            (
                User {
                    userpass: Some(creds("test", "")),
                    ..Default::default()
                },
                false,
            ),
            (
                User {
                    userpass: Some(creds("test", "password")),
                    ..Default::default()
                },
                true,
            ),
            (
                User {
                    userpass: Some(creds("test", "pass")),
                    policies: vec!["pol".into()],
                    ..Default::default()
                },
                true,
            ),
            (
                User {
                    userpass: Some(creds("test", "pass")),
                    token: Some(TokenSpec {
                        display_name: "ci".into(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                false,
            ),
            (
                User {
                    token: Some(TokenSpec::default()),
                    ..Default::default()
                },
                false,
            ),
            (
                User {
                    token: Some(TokenSpec {
                        display_name: "ci".into(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                true,
            ),
        ];

        for (i, (mut user, ok)) in cases.into_iter().enumerate() {
            let result = user.validate();
            assert_eq!(result.is_ok(), ok, "case {i}: {result:?}");
        }
    }

    #[test]
    fn secret_cases() {
        let mut empty = Secret::default();
        assert!(empty.validate().is_err());

        let mut no_values = Secret {
            path: "secret/app".into(),
            ..Default::default()
        };
        assert!(matches!(
            no_values.validate(),
            Err(ValidationError::EmptyValues { .. })
        ));

        let mut ok = Secret {
            path: "secret/app".into(),
            values: serde_json::from_value(serde_json::json!({"uri": "/config"})).unwrap(),
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn file_reference_is_expanded() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("x");
        fs::write(&file, "secretvalue").unwrap();

        let mut b = Backend {
            attributes: vec![Attribute::new("config/connection")
                .with_value("connection_url", format!("@{}", file.display()))
                .with_value("plain", "value")],
            ..backend("mysql", "mysql", "db")
        };
        b.validate().unwrap();

        let attribute = &b.attributes[0];
        assert_eq!(attribute.values["connection_url"], "secretvalue");
        assert_eq!(attribute.values["plain"], "value");
        assert!(attribute.is_expanded());
    }

    #[test]
    fn file_reference_expands_once() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        fs::write(&second, "never read").unwrap();
        fs::write(&first, format!("@{}", second.display())).unwrap();

        let mut b = Backend {
            attributes: vec![
                Attribute::new("config").with_value("key", format!("@{}", first.display()))
            ],
            ..backend("mysql", "mysql", "db")
        };
        b.validate().unwrap();
        b.validate().unwrap();

        assert_eq!(
            b.attributes[0].values["key"],
            format!("@{}", second.display())
        );
    }

    #[test]
    fn missing_file_reference_names_backend() {
        let mut b = Backend {
            attributes: vec![Attribute::new("config").with_value("key", "@/does/not/exist")],
            ..backend("mysql", "mysql", "db")
        };
        let err = b.validate().unwrap_err();
        assert!(matches!(err, ValidationError::FileNotFound { .. }));
        let message = err.to_string();
        assert!(message.contains("mysql"));
        assert!(message.contains("@/does/not/exist"));
    }

    #[test]
    fn failed_expansion_leaves_attribute_untouched() {
        let dir = TempDir::new().unwrap();
        let found = dir.path().join("found");
        fs::write(&found, "@/looks/like/a/reference").unwrap();
        let reference = format!("@{}", found.display());

        let mut b = Backend {
            attributes: vec![Attribute::new("config")
                .with_value("a_found", reference.clone())
                .with_value("b_missing", "@/does/not/exist")],
            ..backend("mysql", "mysql", "db")
        };
        assert!(b.validate().is_err());

        let attribute = &b.attributes[0];
        assert_eq!(attribute.values["a_found"], reference);
        assert_eq!(attribute.values["b_missing"], "@/does/not/exist");
        assert!(!attribute.is_expanded());
    }

    #[test]
    fn auth_attributes_expand_file_references() {
        let dir = TempDir::new().unwrap();
        let cert = dir.path().join("ca.pem");
        fs::write(&cert, "PEM").unwrap();

        let mut auth = Auth {
            path: "cert".into(),
            kind: "tls".into(),
            attributes: vec![
                Attribute::new("certs/web").with_value("certificate", format!("@{}", cert.display()))
            ],
            ..Default::default()
        };
        auth.validate().unwrap();
        assert_eq!(auth.attributes[0].values["certificate"], "PEM");
    }
}
