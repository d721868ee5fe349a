use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ROOT: &str = "games";
pub const ROOT_ENV_VAR: &str = "DUET_STORE_ROOT";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// First path segment under which every couple's session lives.
    pub root: String,
    pub max_retries: usize,
    pub initial_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            max_retries: 3,
            initial_delay_ms: 200,
        }
    }
}

impl StoreConfig {
    pub fn from_cli_or_env_or_yaml(cli_root: Option<String>, yaml_config: Option<StoreConfig>) -> Self {
        let base = yaml_config.unwrap_or_default();
        let root = if let Some(arg) = cli_root {
            arg
        } else if let Ok(env) = std::env::var(ROOT_ENV_VAR) {
            env
        } else {
            base.root
        };

        Self { root, ..base }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_root_wins_over_yaml() {
        let yaml = StoreConfig {
            root: "from_yaml".to_string(),
            max_retries: 7,
            initial_delay_ms: 5,
        };
        let config = StoreConfig::from_cli_or_env_or_yaml(Some("from_cli".to_string()), Some(yaml));
        assert_eq!(config.root, "from_cli");
        assert_eq!(config.max_retries, 7);
    }

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"maxRetries": 1}"#).unwrap();
        assert_eq!(config.root, DEFAULT_ROOT);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.initial_delay(), Duration::from_millis(200));
    }
}
