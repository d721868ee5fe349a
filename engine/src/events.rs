use std::collections::BTreeMap;

use serde_json::Value;
use types::{
    AnswerKey, GameType, PendingGameInvite, PlayerId, Role, SessionId, SessionStatus, ThreadEntry,
};

use crate::notify::PartnerEvent;

/// Everything a client reports to its UI as it happens.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    SessionCreated {
        session_id: SessionId,
        game_type: GameType,
    },
    PartnerJoined {
        player: PlayerId,
        display_name: String,
    },
    InviteReceived(PendingGameInvite),
    InviteWithdrawn,
    Started {
        session_id: SessionId,
        game_type: GameType,
    },
    Revealed {
        index: u32,
        mine: Value,
        partner: Value,
        /// `None` until the subject validates a free-text guess.
        matched: Option<bool>,
    },
    PointAwarded {
        player: PlayerId,
        index: u32,
        total: u32,
    },
    AgreementCounted {
        index: u32,
        total: u32,
    },
    GuessValidated {
        index: u32,
        correct: bool,
    },
    Advanced {
        index: u32,
    },
    Finished {
        scores: BTreeMap<PlayerId, u32>,
        agreements: u32,
    },
    ThreadUpdated(ThreadEntry),
    RoundAdvanced {
        round: u32,
        role: Role,
    },
    SessionEnded,
}

/// Output of the round engines, carried out by the client.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Write `value` under the key's slot for the local player.
    Write { key: AnswerKey, value: Value },
    SetCurrentQuestion(u32),
    SetStatus(SessionStatus),
    Emit(EngineEvent),
    Notify(PartnerEvent),
}
