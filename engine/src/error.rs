use store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No couple identity available")]
    NotPaired,

    #[error("No game session to join")]
    NoSessionFound,

    #[error("Session already has two players")]
    SessionFull,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Stale write to {key}: currently at {current}")]
    StaleWrite { key: String, current: u32 },

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Corrupt session data: {0}")]
    CorruptSession(#[from] serde_json::Error),
}

impl EngineError {
    /// Text shown to the player for lifecycle failures.
    pub fn user_message(&self) -> &'static str {
        match self {
            EngineError::NotPaired => "Pair with your partner before starting a game.",
            EngineError::NoSessionFound => {
                "No game yet. Ask your partner to start one, or create it yourself."
            }
            EngineError::SessionFull => "This game already has two players.",
            EngineError::StoreUnavailable(_) => {
                "We couldn't reach the server. Check your connection and try again."
            }
            EngineError::StaleWrite { .. } | EngineError::InvalidAction(_) => {
                "That move isn't available right now."
            }
            EngineError::CorruptSession(_) => "This game can't be loaded. Start a new one.",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::NoSessionFound | EngineError::StoreUnavailable(_)
        )
    }
}
