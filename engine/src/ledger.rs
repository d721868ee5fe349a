use std::collections::HashSet;

/// Per-session record of reactions already performed, so repeated or stale
/// notifications never trigger the same action twice.
#[derive(Clone, Debug, Default)]
pub struct IdempotencyLedger {
    consumed: HashSet<String>,
}

impl IdempotencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// True exactly once per marker.
    pub fn try_consume(&mut self, marker: impl Into<String>) -> bool {
        let marker = marker.into();
        let fresh = self.consumed.insert(marker.clone());
        if !fresh {
            log::trace!("Marker {marker} already consumed");
        }
        fresh
    }

    pub fn is_consumed(&self, marker: &str) -> bool {
        self.consumed.contains(marker)
    }

    pub fn len(&self) -> usize {
        self.consumed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumed.is_empty()
    }
}

pub mod markers {
    use types::{GameType, SessionStatus};

    pub fn answer(game_type: GameType, index: u32) -> String {
        format!("answer_{game_type}_{index}")
    }

    pub fn ready(game_type: GameType, index: u32) -> String {
        format!("ready_{game_type}_{index}")
    }

    pub fn validation(game_type: GameType, index: u32) -> String {
        format!("validation_{game_type}_{index}")
    }

    pub fn choice(round: u32) -> String {
        format!("choice_{round}")
    }

    pub fn question(round: u32) -> String {
        format!("question_{round}")
    }

    pub fn response(round: u32) -> String {
        format!("response_{round}")
    }

    pub fn reaction(round: u32) -> String {
        format!("reaction_{round}")
    }

    pub fn ready_tod(round: u32) -> String {
        format!("ready_tod_{round}")
    }

    pub fn partner_joined() -> String {
        "partner_joined".to_string()
    }

    pub fn status(status: SessionStatus) -> String {
        format!("status_{status}")
    }
}
