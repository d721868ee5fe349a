use types::{
    AnswerKey, AnswerPayload, GameSession, PendingGameInvite, PlayerEntry, PlayerId, SessionStatus,
};

/// What a store snapshot did to the local view.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Observation {
    /// Nothing stored and nothing held locally.
    Absent,
    /// The session held locally was deleted.
    Ended,
    /// A session with a new identity replaced the local one.
    Fresh,
    /// Same session, folded into the local view.
    Merged,
    /// Older than what is held locally; ignored.
    Stale,
}

/// Local merged view of the couple's session node.
///
/// The view only grows: snapshots are joined into it, and optimistic local
/// writes are recorded before they reach the store.
#[derive(Clone, Debug, Default)]
pub struct SessionMirror {
    current: Option<GameSession>,
    /// Set once the store has echoed the current session back.
    confirmed: bool,
    invite: Option<PendingGameInvite>,
}

impl SessionMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&GameSession> {
        self.current.as_ref()
    }

    pub fn invite(&self) -> Option<&PendingGameInvite> {
        self.invite.as_ref()
    }

    /// Takes `session` as the local view. Returns true when its identity
    /// differs from the one held before.
    pub fn adopt(&mut self, session: GameSession, me: &PlayerId) -> bool {
        match self.current.as_mut() {
            Some(current) if current.session_id == session.session_id => {
                current.merge_from(session, me);
                false
            }
            _ => {
                self.current = Some(session);
                self.confirmed = false;
                true
            }
        }
    }

    /// Like `adopt`, for a session just read back from the store. A later
    /// empty snapshot then means the session was deleted.
    pub fn adopt_stored(&mut self, session: GameSession, me: &PlayerId) -> bool {
        let fresh = self.adopt(session, me);
        self.confirmed = true;
        fresh
    }

    pub fn observe(&mut self, snapshot: Option<GameSession>, me: &PlayerId) -> Observation {
        let Some(observed) = snapshot else {
            if self.current.is_none() {
                return Observation::Absent;
            }
            if !self.confirmed {
                return Observation::Stale;
            }
            self.clear();
            return Observation::Ended;
        };
        if self.current.is_none() {
            self.current = Some(observed);
            self.confirmed = true;
            return Observation::Fresh;
        }
        let Some(current) = self.current.as_mut() else {
            return Observation::Absent;
        };
        if observed.session_id == current.session_id {
            current.merge_from(observed, me);
            self.confirmed = true;
            return Observation::Merged;
        }
        if !self.confirmed && observed.created_at < current.created_at {
            log::debug!(
                "Ignoring snapshot of older session {} while {} is pending",
                observed.session_id,
                current.session_id
            );
            return Observation::Stale;
        }
        self.current = Some(observed);
        self.confirmed = true;
        Observation::Fresh
    }

    pub fn record_answer(&mut self, key: &AnswerKey, player: &PlayerId, payload: AnswerPayload) {
        if let Some(current) = self.current.as_mut() {
            current
                .answers
                .entry(key.to_string())
                .or_default()
                .entry(player.clone())
                .or_insert(payload);
        }
    }

    pub fn record_status(&mut self, status: SessionStatus) {
        if let Some(current) = self.current.as_mut() {
            current.status = current.status.max(status);
        }
    }

    pub fn record_current_question(&mut self, index: u32) {
        if let Some(current) = self.current.as_mut() {
            current.current_question = current.current_question.max(index);
        }
    }

    pub fn record_player(&mut self, player: &PlayerId, entry: PlayerEntry) {
        if let Some(current) = self.current.as_mut() {
            current.players.entry(player.clone()).or_insert(entry);
        }
    }

    /// Re-derives the invite; returns the new value when it changed.
    pub fn refresh_invite(&mut self, me: &PlayerId) -> Option<Option<PendingGameInvite>> {
        let next = self
            .current
            .as_ref()
            .and_then(|session| session.pending_invite_for(me));
        if next == self.invite {
            return None;
        }
        self.invite = next.clone();
        Some(next)
    }

    /// Drops the session. The invite is left for `refresh_invite` to withdraw.
    pub fn clear(&mut self) {
        self.current = None;
        self.confirmed = false;
    }
}
