use serde_json::Value;
use store::Subscription;
use types::{CoupleId, PlayerId, SessionId};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerKey {
    pub couple_id: CoupleId,
    pub player_id: PlayerId,
}

/// Holds the single session subscription of a client.
#[derive(Debug, Default)]
pub struct ListenerSlot {
    active: Option<(ListenerKey, Subscription)>,
}

impl ListenerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(&self) -> Option<&ListenerKey> {
        self.active.as_ref().map(|(key, _)| key)
    }

    pub fn is_attached_to(&self, key: &ListenerKey) -> bool {
        self.key() == Some(key)
    }

    /// Replaces whatever subscription was installed before.
    pub fn install(&mut self, key: ListenerKey, subscription: Subscription) {
        self.detach();
        log::debug!(
            "Listening on {} for {}",
            subscription.path(),
            key.player_id
        );
        self.active = Some((key, subscription));
    }

    pub fn detach(&mut self) {
        if let Some((key, mut subscription)) = self.active.take() {
            subscription.unsubscribe();
            log::debug!("Stopped listening for {}", key.player_id);
        }
    }

    /// Latest snapshot if one arrived since the last poll.
    pub fn poll(&mut self) -> Option<Option<Value>> {
        self.active
            .as_mut()
            .and_then(|(_, subscription)| subscription.try_next())
    }

    /// Waits for the next snapshot; `None` when nothing is attached.
    pub async fn changed(&mut self) -> Option<Option<Value>> {
        match self.active.as_mut() {
            Some((_, subscription)) => subscription.next().await,
            None => None,
        }
    }
}

/// Ensures "start playing" runs at most once per session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StartGuard {
    started: Option<SessionId>,
}

impl StartGuard {
    pub fn try_start(&mut self, session_id: SessionId) -> bool {
        if self.started == Some(session_id) {
            return false;
        }
        self.started = Some(session_id);
        true
    }

    pub fn has_started(&self, session_id: SessionId) -> bool {
        self.started == Some(session_id)
    }

    pub fn reset(&mut self) {
        self.started = None;
    }
}
