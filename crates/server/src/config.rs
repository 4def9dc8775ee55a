use std::path::Path;
use std::time::Duration;

use orchestrator::provider::DEFAULT_BASE_URL;
use orchestrator::{OrchestratorConfig, ProviderPricing};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_FILE: &str = "roundtable.toml";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

const DEFAULT_TURN_TIMEOUT_SECS: u64 = 120;
const DEFAULT_DEBATE_TTL_SECS: u64 = 3600;
const DEFAULT_EVICTION_INTERVAL_SECS: u64 = 60;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderSection {
    /// Chat completions API root, e.g. `https://openrouter.ai/api/v1`
    pub base_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Fallback pricing in USD per 1000 tokens, used when the API reports no cost
    pub prompt_cost_per_1k: f64,
    pub completion_cost_per_1k: f64,
    /// Send OpenRouter's `usage` request field. Disable for other
    /// OpenAI-compatible endpoints that reject unknown parameters.
    pub include_usage: bool,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            prompt_cost_per_1k: 0.0,
            completion_cost_per_1k: 0.0,
            include_usage: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorSection {
    pub turn_timeout_secs: u64,
    /// Idle time after which a debate is evicted from memory
    pub debate_ttl_secs: u64,
    pub eviction_interval_secs: u64,
    pub auto_advance: bool,
    pub event_channel_capacity: usize,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            turn_timeout_secs: DEFAULT_TURN_TIMEOUT_SECS,
            debate_ttl_secs: DEFAULT_DEBATE_TTL_SECS,
            eviction_interval_secs: DEFAULT_EVICTION_INTERVAL_SECS,
            auto_advance: false,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

/// Server configuration read from `roundtable.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub provider: ProviderSection,
    pub orchestrator: OrchestratorSection,
}

impl ServerConfig {
    /// Read config from `path`, falling back to defaults
    pub async fn read(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "Config file does not exist, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path).await {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    debug!(path = %path.display(), "Config loaded successfully");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                Self::default()
            }
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn pricing(&self) -> ProviderPricing {
        ProviderPricing {
            prompt_per_1k: self.provider.prompt_cost_per_1k,
            completion_per_1k: self.provider.completion_cost_per_1k,
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            turn_timeout: Duration::from_secs(self.orchestrator.turn_timeout_secs),
            auto_advance: self.orchestrator.auto_advance,
            ..OrchestratorConfig::default()
        }
    }

    pub fn debate_ttl(&self) -> Duration {
        Duration::from_secs(self.orchestrator.debate_ttl_secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.orchestrator.eviction_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let config = ServerConfig::read(&temp_dir.path().join(DEFAULT_CONFIG_FILE)).await;
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_address(), "0.0.0.0:3001");
        assert_eq!(config.provider.api_key_env, "OPENROUTER_API_KEY");
        assert!(config.provider.include_usage);
    }

    #[tokio::test]
    async fn test_config_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
[server]
port = 8080

[provider]
completion_cost_per_1k = 0.002
include_usage = false

[orchestrator]
turn_timeout_secs = 30
auto_advance = true
"#,
        )
        .unwrap();

        let config = ServerConfig::read(&path).await;
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.pricing().completion_per_1k, 0.002);
        assert!(!config.provider.include_usage);
        assert_eq!(config.debate_ttl(), Duration::from_secs(3600));

        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.turn_timeout, Duration::from_secs(30));
        assert!(orchestrator.auto_advance);
    }

    #[tokio::test]
    async fn test_config_malformed_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "[server\nport = ").unwrap();

        let config = ServerConfig::read(&path).await;
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = ServerConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("[orchestrator]"));
        let parsed: ServerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
