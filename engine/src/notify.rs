use std::sync::Mutex;

use async_trait::async_trait;
use types::{CoupleId, GameType, PlayerId};

pub type NotifyError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone, Debug, PartialEq)]
pub enum PartnerEvent {
    SessionCreated {
        from: PlayerId,
        from_name: String,
        game_type: GameType,
    },
    Answered {
        from: PlayerId,
        key: String,
    },
}

/// Push delivery to the partner's device. Best effort: failures are logged
/// by the caller and never affect the game.
#[async_trait]
pub trait PartnerNotifier: Send + Sync {
    async fn notify(&self, couple_id: &CoupleId, event: PartnerEvent) -> Result<(), NotifyError>;
}

pub struct NoopNotifier;

#[async_trait]
impl PartnerNotifier for NoopNotifier {
    async fn notify(&self, _couple_id: &CoupleId, _event: PartnerEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Keeps every event it is handed; optionally fails after recording.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(CoupleId, PartnerEvent)>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<(CoupleId, PartnerEvent)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PartnerNotifier for RecordingNotifier {
    async fn notify(&self, couple_id: &CoupleId, event: PartnerEvent) -> Result<(), NotifyError> {
        if let Ok(mut events) = self.events.lock() {
            events.push((couple_id.clone(), event));
        }
        if self.failing {
            return Err("push gateway rejected the request".into());
        }
        Ok(())
    }
}
