//! jobgrid.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobgridConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub matchmaking: EndpointConfig,
    pub policy_manager: EndpointConfig,
    pub lease: LeaseSettings,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/jobgrid"),
        }
    }
}

impl StorageConfig {
    /// Path of the redb database file inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("jobgrid.redb")
    }
}

/// An outbound collaborator: base URL plus request timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 30,
        }
    }
}

impl EndpointConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseSettings {
    /// Seconds after which a `Progressing` job may be re-claimed by its owner.
    pub duration_secs: u64,
}

impl Default for LeaseSettings {
    fn default() -> Self {
        Self { duration_secs: 300 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Identity provider public key. Carried for the edge proxy; tokens
    /// are forwarded, not verified, by this service.
    pub public_key: Option<String>,
}

impl JobgridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: JobgridConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// A starter configuration pointing at local collaborators.
    pub fn scaffold() -> Self {
        JobgridConfig {
            matchmaking: EndpointConfig {
                url: Some("http://localhost:8081".to_string()),
                ..EndpointConfig::default()
            },
            policy_manager: EndpointConfig {
                url: Some("http://localhost:8082".to_string()),
                ..EndpointConfig::default()
            },
            ..JobgridConfig::default()
        }
    }

    /// Check the inputs the service cannot start without.
    pub fn validate(&self) -> anyhow::Result<()> {
        check_url("matchmaking.url", self.matchmaking.url.as_deref())?;
        check_url("policy_manager.url", self.policy_manager.url.as_deref())?;
        if self.lease.duration_secs == 0 {
            anyhow::bail!("lease.duration_secs must be greater than zero");
        }
        Ok(())
    }
}

fn check_url(field: &str, url: Option<&str>) -> anyhow::Result<()> {
    let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
        anyhow::bail!("{field} is required");
    };
    let uri: http::Uri = url
        .parse()
        .map_err(|e| anyhow::anyhow!("{field} is not a valid URI: {e}"))?;
    match uri.scheme_str() {
        Some("http") | Some("https") if uri.authority().is_some() => Ok(()),
        _ => anyhow::bail!("{field} must be an absolute http(s) URL, got {url}"),
    }
}
