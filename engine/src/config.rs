use std::time::Duration;

use serde::{Deserialize, Serialize};
use store::StoreConfig;
use types::TodMode;

pub const REACTION_DELAY_ENV_VAR: &str = "DUET_REACTION_DELAY_MS";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub store: StoreConfig,
    /// How long the answerer lingers on a reaction before the next round.
    pub reaction_delay_ms: u64,
    pub questions_per_game: usize,
    pub tod_mode: TodMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            reaction_delay_ms: 1500,
            questions_per_game: 10,
            tod_mode: TodMode::Classic,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    pub fn from_cli_or_env_or_yaml(
        cli_reaction_delay_ms: Option<u64>,
        cli_store_root: Option<String>,
        yaml_config: Option<EngineConfig>,
    ) -> Self {
        let base = yaml_config.unwrap_or_default();
        let reaction_delay_ms = if let Some(arg) = cli_reaction_delay_ms {
            arg
        } else if let Some(env) = std::env::var(REACTION_DELAY_ENV_VAR)
            .ok()
            .and_then(|raw| raw.parse().ok())
        {
            env
        } else {
            base.reaction_delay_ms
        };
        let store = StoreConfig::from_cli_or_env_or_yaml(cli_store_root, Some(base.store));

        Self {
            store,
            reaction_delay_ms,
            ..base
        }
    }

    pub fn reaction_delay(&self) -> Duration {
        Duration::from_millis(self.reaction_delay_ms)
    }
}
