//! Gateway configuration: the ambient knobs (port, timeouts, log level) plus
//! the [`ConfigSource`] boundary that supplies enabled child launch specs.
//!
//! `GatewayConfig` is resolved the same way the rest of the ambient stack
//! prefers: compiled defaults, overridden by an optional TOML file, overridden
//! by `HYDRA_*` environment variables. The concrete source of child specs is
//! deliberately thin — the desktop shell that owns the real template
//! expansion is out of scope here (see `ConfigSource`).

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_port() -> u16 {
    3999
}

fn default_startup_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolved gateway settings: the port the HTTP front end binds and the two
/// timeouts that govern supervisor startup and per-request calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            startup_timeout_secs: default_startup_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl GatewayConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load from an optional TOML file, then apply `HYDRA_*` environment
    /// overrides. A missing file is not an error; the compiled defaults apply.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let text = std::fs::read_to_string(p)?;
                toml::from_str(&text)?
            }
            _ => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("HYDRA_PORT") {
            if let Ok(p) = v.parse() {
                self.port = p;
            }
        }
        if let Ok(v) = std::env::var("HYDRA_STARTUP_TIMEOUT_SECS") {
            if let Ok(s) = v.parse() {
                self.startup_timeout_secs = s;
            }
        }
        if let Ok(v) = std::env::var("HYDRA_REQUEST_TIMEOUT_SECS") {
            if let Ok(s) = v.parse() {
                self.request_timeout_secs = s;
            }
        }
        if let Ok(v) = std::env::var("HYDRA_LOG") {
            if !v.is_empty() {
                self.log_level = v;
            }
        }
    }
}

/// A child server launch spec as supplied by the config source.
///
/// Immutable from the supervisor's point of view once handed to `start()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildSpec {
    /// Stable opaque identifier; does not need to be human-readable.
    pub id: String,
    /// Display name; the basis for the tool namespace prefix.
    pub name: String,
    /// Executable to spawn.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// External collaborator supplying the ordered list of enabled child specs.
///
/// The gateway treats this purely as a query; the concrete expansion from
/// user-facing settings (the desktop shell's template layer) lives outside
/// this crate. [`StaticConfigSource`] below is the minimal default
/// implementation used by the `serve` binary and by tests.
pub trait ConfigSource: Send + Sync {
    fn enabled_specs(&self) -> anyhow::Result<Vec<ChildSpec>>;
}

/// A `ConfigSource` backed by an in-memory list, optionally loaded from a
/// TOML file of `[[child]]` tables.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    specs: Vec<ChildSpec>,
}

impl StaticConfigSource {
    pub fn new(specs: Vec<ChildSpec>) -> Self {
        Self { specs }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        #[derive(Deserialize)]
        struct File {
            #[serde(default, rename = "child")]
            children: Vec<ChildSpec>,
        }
        let text = std::fs::read_to_string(path)?;
        let file: File = toml::from_str(&text)?;
        Ok(Self {
            specs: file.children,
        })
    }
}

impl ConfigSource for StaticConfigSource {
    fn enabled_specs(&self) -> anyhow::Result<Vec<ChildSpec>> {
        Ok(self.specs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_constants() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, 3999);
        assert_eq!(config.startup_timeout_secs, 10);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn static_config_source_returns_specs_in_order() {
        let specs = vec![
            ChildSpec {
                id: "a".into(),
                name: "Child A".into(),
                command: "echo".into(),
                args: vec![],
                env: HashMap::new(),
            },
            ChildSpec {
                id: "b".into(),
                name: "Child B".into(),
                command: "echo".into(),
                args: vec![],
                env: HashMap::new(),
            },
        ];
        let source = StaticConfigSource::new(specs);
        let resolved = source.enabled_specs().unwrap();
        assert_eq!(resolved[0].id, "a");
        assert_eq!(resolved[1].id, "b");
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let config = GatewayConfig::load(None).unwrap();
        assert_eq!(config.port, 3999);
    }
}
