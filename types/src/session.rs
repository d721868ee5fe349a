use std::{collections::BTreeMap, fmt::Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AnswerKey, GameType, PendingGameInvite, PlayerId, SessionId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Waiting,
    Ready,
    Playing,
    Finished,
}

impl SessionStatus {
    /// Status only moves forward while a session lives.
    pub fn can_advance_to(self, next: SessionStatus) -> bool {
        next > self
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Waiting => write!(f, "waiting"),
            SessionStatus::Ready => write!(f, "ready"),
            SessionStatus::Playing => write!(f, "playing"),
            SessionStatus::Finished => write!(f, "finished"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntry {
    pub display_name: String,
    pub ready: bool,
    pub joined_at: DateTime<Utc>,
}

impl PlayerEntry {
    pub fn joining_now(display_name: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            ready: true,
            joined_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    pub value: Value,
    pub timestamp: DateTime<Utc>,
    pub author_name: String,
}

impl AnswerPayload {
    pub fn now(value: Value, author_name: &str) -> Self {
        Self {
            value,
            timestamp: Utc::now(),
            author_name: author_name.to_string(),
        }
    }
}

/// Both players' entries for one answer key.
pub type AnswerSlot = BTreeMap<PlayerId, AnswerPayload>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub session_id: SessionId,
    pub game_type: GameType,
    pub status: SessionStatus,
    pub created_by: PlayerId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub players: BTreeMap<PlayerId, PlayerEntry>,
    #[serde(default)]
    pub current_question: u32,
    #[serde(default)]
    pub answers: BTreeMap<String, AnswerSlot>,
}

impl GameSession {
    pub fn new(game_type: GameType, creator: PlayerId, display_name: &str) -> Self {
        let mut players = BTreeMap::new();
        players.insert(creator.clone(), PlayerEntry::joining_now(display_name));
        Self {
            session_id: SessionId::new(),
            game_type,
            status: SessionStatus::Waiting,
            created_by: creator,
            created_at: Utc::now(),
            players,
            current_question: 0,
            answers: BTreeMap::new(),
        }
    }

    pub fn has_partner(&self) -> bool {
        self.players.len() >= 2
    }

    pub fn is_member(&self, player: &PlayerId) -> bool {
        self.players.contains_key(player)
    }

    pub fn is_creator(&self, player: &PlayerId) -> bool {
        &self.created_by == player
    }

    pub fn partner_of(&self, me: &PlayerId) -> Option<&PlayerId> {
        self.players.keys().find(|id| *id != me)
    }

    /// The member who is not the creator.
    pub fn joiner(&self) -> Option<&PlayerId> {
        self.partner_of(&self.created_by)
    }

    pub fn display_name(&self, player: &PlayerId) -> Option<&str> {
        self.players.get(player).map(|p| p.display_name.as_str())
    }

    pub fn answer(&self, key: &AnswerKey, player: &PlayerId) -> Option<&AnswerPayload> {
        self.answers.get(&key.to_string())?.get(player)
    }

    pub fn partner_answer(
        &self,
        key: &AnswerKey,
        me: &PlayerId,
    ) -> Option<(&PlayerId, &AnswerPayload)> {
        self.answers
            .get(&key.to_string())?
            .iter()
            .find(|(player, _)| *player != me)
    }

    pub fn both_answered(&self, key: &AnswerKey, me: &PlayerId) -> bool {
        self.answer(key, me).is_some() && self.partner_answer(key, me).is_some()
    }

    /// Pending invite as seen by `me`: someone else's session that is still
    /// waiting and that `me` has not joined.
    pub fn pending_invite_for(&self, me: &PlayerId) -> Option<PendingGameInvite> {
        if self.is_creator(me) || self.is_member(me) || self.status != SessionStatus::Waiting {
            return None;
        }
        Some(PendingGameInvite {
            session_id: self.session_id,
            game_type: self.game_type,
            from: self.created_by.clone(),
            from_name: self
                .display_name(&self.created_by)
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// Folds an observed snapshot of the same session into this local view.
    ///
    /// Answers and players are unioned, status and current question take the
    /// max, and entries authored by `me` keep their local value.
    pub fn merge_from(&mut self, observed: GameSession, me: &PlayerId) {
        debug_assert_eq!(self.session_id, observed.session_id);
        self.status = self.status.max(observed.status);
        self.current_question = self.current_question.max(observed.current_question);
        for (player, entry) in observed.players {
            if &player == me {
                self.players.entry(player).or_insert(entry);
            } else {
                self.players.insert(player, entry);
            }
        }
        for (key, slot) in observed.answers {
            let local = self.answers.entry(key).or_default();
            for (player, payload) in slot {
                if &player == me {
                    local.entry(player).or_insert(payload);
                } else {
                    local.insert(player, payload);
                }
            }
        }
    }
}
