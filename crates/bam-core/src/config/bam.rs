//! Daemon configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;

/// Default local top-level domain
pub const DEFAULT_TLD: &str = "app";

/// Configuration for the bam daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BamConfig {
    /// Directory scanned (one level deep) for apps
    pub apps_dir: PathBuf,

    /// Local top-level domain apps are reachable under
    pub tld: String,

    /// Start every app when the console starts
    pub auto_start: bool,

    /// Console port; 0 picks a free port
    pub console_port: u16,

    /// HTTP proxy port
    pub proxy_port: u16,

    /// UDP DNS port; 0 disables the resolver
    pub dns_port: u16,

    /// How long a stopping process app may take before it is killed
    #[serde(with = "duration_secs")]
    pub grace_period: Duration,

    /// Externally managed services, `name -> port`
    pub aliases: BTreeMap<String, u16>,

    /// Public sharing settings
    pub share: ShareConfig,
}

impl Default for BamConfig {
    fn default() -> Self {
        Self {
            apps_dir: super::default_config_dir().join("apps"),
            tld: DEFAULT_TLD.to_string(),
            auto_start: false,
            console_port: 0,
            proxy_port: 42042,
            dns_port: 42053,
            grace_period: Duration::from_secs(3),
            aliases: BTreeMap::new(),
            share: ShareConfig::default(),
        }
    }
}

impl BamConfig {
    /// Get the proxy address (all interfaces)
    pub fn proxy_address(&self) -> String {
        format!("0.0.0.0:{}", self.proxy_port)
    }

    /// Whether the DNS resolver should run
    pub fn dns_enabled(&self) -> bool {
        self.dns_port != 0
    }

    /// Reject values no listener or hostname could use
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tld = self.tld.trim_matches('.');
        let valid_tld = !tld.is_empty()
            && tld.split('.').all(|label| {
                !label.is_empty()
                    && label
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-')
            });
        if !valid_tld {
            return Err(ConfigError::Invalid(format!("tld {:?} is not a domain", self.tld)));
        }

        if self.proxy_port == 0 {
            return Err(ConfigError::Invalid("proxy_port must not be 0".to_string()));
        }

        if let Some((name, _)) = self.aliases.iter().find(|(_, port)| **port == 0) {
            return Err(ConfigError::Invalid(format!("alias {} has port 0", name)));
        }

        Ok(())
    }
}

/// Tunnel service used to share apps publicly
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Base URL of a localtunnel-compatible server
    pub server: String,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            server: "https://localtunnel.me".to_string(),
        }
    }
}
