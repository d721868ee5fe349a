use crate::{GameType, PlayerId, SessionId};

/// A partner's session this player could join. Derived from the session
/// node, never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingGameInvite {
    pub session_id: SessionId,
    pub game_type: GameType,
    pub from: PlayerId,
    pub from_name: String,
}
