//! Connection configuration.
//!
//! Settings come from a JSON file or from `ETCD_*` environment variables.
//! [`ProviderConfig::connection_plan`] decides how to reach the store: with
//! credentials when username, password and every endpoint are given, and
//! anonymously against `localhost:2379` otherwise.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Endpoint used when no complete credential set is configured.
pub const DEFAULT_ENDPOINT: &str = "localhost:2379";

pub const ENV_USERNAME: &str = "ETCD_USERNAME";
pub const ENV_PASSWORD: &str = "ETCD_PASSWORD";
pub const ENV_ENDPOINTS: &str = "ETCD_ENDPOINTS";
pub const ENV_TLS: &str = "ETCD_TLS";
pub const ENV_CA_FILE: &str = "ETCD_CA_FILE";

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub endpoints: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    /// CA bundle for TLS; the system roots are used when absent.
    pub trusted_ca_file: Option<PathBuf>,
    pub dial_timeout_ms: u64,
    /// Deadline applied to every store call.
    pub request_timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            username: None,
            password: None,
            tls: false,
            trusted_ca_file: None,
            dial_timeout_ms: 5_000,
            request_timeout_ms: 5_000,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("endpoints", &self.endpoints)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("tls", &self.tls)
            .field("trusted_ca_file", &self.trusted_ca_file)
            .field("dial_timeout_ms", &self.dial_timeout_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl ProviderConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_env() -> Result<Self> {
        Self::from_env_vars(|name| std::env::var(name).ok())
    }

    /// Build a config from a variable lookup. Unset variables keep defaults.
    pub fn from_env_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoints = lookup(ENV_ENDPOINTS)
            .map(|raw| raw.split(',').map(|e| e.trim().to_string()).collect())
            .unwrap_or_default();
        let tls = match lookup(ENV_TLS) {
            Some(raw) => parse_bool(&raw).with_context(|| format!("invalid {ENV_TLS}"))?,
            None => false,
        };

        Ok(Self {
            endpoints,
            username: lookup(ENV_USERNAME),
            password: lookup(ENV_PASSWORD),
            tls,
            trusted_ca_file: lookup(ENV_CA_FILE).map(PathBuf::from),
            ..Self::default()
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    /// Resolve how to connect.
    pub fn connection_plan(&self) -> ConnectionPlan {
        let username = self.username.as_deref().filter(|u| !u.is_empty());
        let password = self.password.as_deref().filter(|p| !p.is_empty());
        let endpoints_complete =
            !self.endpoints.is_empty() && self.endpoints.iter().all(|e| !e.is_empty());

        match (username, password) {
            (Some(username), Some(password)) if endpoints_complete => {
                ConnectionPlan::Authenticated {
                    endpoints: self.endpoints.clone(),
                    username: username.to_string(),
                    password: password.to_string(),
                    tls: self.tls.then(|| TlsSettings {
                        trusted_ca_file: self.trusted_ca_file.clone(),
                    }),
                }
            }
            _ => {
                tracing::info!(
                    endpoint = DEFAULT_ENDPOINT,
                    "incomplete credentials, connecting anonymously"
                );
                ConnectionPlan::Anonymous {
                    endpoints: vec![DEFAULT_ENDPOINT.to_string()],
                }
            }
        }
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}

/// TLS settings for an authenticated connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    pub trusted_ca_file: Option<PathBuf>,
}

/// How a connector should reach the store.
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectionPlan {
    Authenticated {
        endpoints: Vec<String>,
        username: String,
        password: String,
        tls: Option<TlsSettings>,
    },
    Anonymous {
        endpoints: Vec<String>,
    },
}

impl ConnectionPlan {
    pub fn endpoints(&self) -> &[String] {
        match self {
            ConnectionPlan::Authenticated { endpoints, .. } => endpoints,
            ConnectionPlan::Anonymous { endpoints } => endpoints,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, ConnectionPlan::Authenticated { .. })
    }
}

impl fmt::Debug for ConnectionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionPlan::Authenticated {
                endpoints,
                username,
                tls,
                ..
            } => f
                .debug_struct("Authenticated")
                .field("endpoints", endpoints)
                .field("username", username)
                .field("tls", tls)
                .finish_non_exhaustive(),
            ConnectionPlan::Anonymous { endpoints } => f
                .debug_struct("Anonymous")
                .field("endpoints", endpoints)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert!(!config.tls);
    }

    #[test]
    fn test_full_credentials_authenticate() {
        let config = ProviderConfig::from_env_vars(env(&[
            (ENV_USERNAME, "root"),
            (ENV_PASSWORD, "pw"),
            (ENV_ENDPOINTS, "a:2379, b:2379"),
            (ENV_TLS, "true"),
            (ENV_CA_FILE, "/etc/ca.pem"),
        ]))
        .unwrap();

        let plan = config.connection_plan();
        assert!(plan.is_authenticated());
        assert_eq!(plan.endpoints(), ["a:2379", "b:2379"]);
        match plan {
            ConnectionPlan::Authenticated { tls: Some(tls), .. } => {
                assert_eq!(tls.trusted_ca_file, Some(PathBuf::from("/etc/ca.pem")));
            }
            other => panic!("unexpected plan {other:?}"),
        }
    }

    #[test]
    fn test_incomplete_credentials_fall_back_to_localhost() {
        for pairs in [
            vec![(ENV_USERNAME, "root"), (ENV_ENDPOINTS, "a:2379")],
            vec![(ENV_USERNAME, "root"), (ENV_PASSWORD, "pw")],
            vec![
                (ENV_USERNAME, "root"),
                (ENV_PASSWORD, "pw"),
                (ENV_ENDPOINTS, "a:2379,"),
            ],
        ] {
            let plan = ProviderConfig::from_env_vars(env(&pairs))
                .unwrap()
                .connection_plan();
            assert_eq!(
                plan,
                ConnectionPlan::Anonymous {
                    endpoints: vec![DEFAULT_ENDPOINT.to_string()]
                }
            );
        }
    }

    #[test]
    fn test_bad_tls_flag_is_rejected() {
        let err = ProviderConfig::from_env_vars(env(&[(ENV_TLS, "maybe")])).unwrap_err();
        assert!(format!("{err:#}").contains(ENV_TLS));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ProviderConfig {
            username: Some("root".into()),
            password: Some("hunter2".into()),
            endpoints: vec!["a:2379".into()],
            ..Default::default()
        };
        assert!(!format!("{config:?}").contains("hunter2"));
        assert!(!format!("{:?}", config.connection_plan()).contains("hunter2"));
    }
}
