pub mod duel;
pub mod game_file;

use engine::EngineError;
use thiserror::Error;

pub use crate::duel::{run_duel, DuelSettings, DuelSummary, DUEL_COUPLE};
pub use crate::game_file::{default_catalog, GameFile};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Unable to read game file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid game file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Duel stalled with nothing left to do: {0}")]
    Stalled(String),
}
