use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use store::{retry_with_backoff, SharedStore, StoreConfig, StorePath, Subscription};
use types::{AnswerKey, AnswerPayload, CoupleId, GameSession, PlayerEntry, PlayerId, SessionStatus};

use crate::EngineError;

/// Every store path a couple's session uses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionPaths {
    session: StorePath,
}

impl SessionPaths {
    pub fn new(root: &str, couple_id: &CoupleId) -> Result<Self, EngineError> {
        let session = StorePath::parse(root)?
            .child(couple_id.as_str())
            .child("session");
        session.validate()?;
        Ok(Self { session })
    }

    pub fn session(&self) -> &StorePath {
        &self.session
    }

    pub fn player(&self, player: &PlayerId) -> StorePath {
        self.session.child("players").child(player.as_str())
    }

    pub fn status(&self) -> StorePath {
        self.session.child("status")
    }

    pub fn current_question(&self) -> StorePath {
        self.session.child("currentQuestion")
    }

    pub fn answer(&self, key: &AnswerKey, player: &PlayerId) -> StorePath {
        self.session
            .child("answers")
            .child(key.to_string())
            .child(player.as_str())
    }
}

/// Typed reads and writes of one couple's session node.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn SharedStore>,
    paths: SessionPaths,
    config: StoreConfig,
}

impl SessionStore {
    pub fn new(store: Arc<dyn SharedStore>, paths: SessionPaths, config: StoreConfig) -> Self {
        Self {
            store,
            paths,
            config,
        }
    }

    pub fn paths(&self) -> &SessionPaths {
        &self.paths
    }

    /// A node without session metadata is what a write racing a delete
    /// leaves behind. It counts as no session at all.
    pub fn decode(raw: Value) -> Result<Option<GameSession>, EngineError> {
        if raw.get("sessionId").is_none() {
            log::warn!("Ignoring session node without a session id");
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(raw)?))
    }

    pub async fn read_session(&self) -> Result<Option<GameSession>, EngineError> {
        match self.store.read(self.paths.session()).await? {
            Some(raw) => Self::decode(raw),
            None => Ok(None),
        }
    }

    pub async fn write_session(&self, session: &GameSession) -> Result<(), EngineError> {
        self.put(self.paths.session().clone(), session).await
    }

    pub async fn delete_session(&self) -> Result<(), EngineError> {
        self.store.delete(self.paths.session()).await?;
        Ok(())
    }

    pub async fn write_player(
        &self,
        player: &PlayerId,
        entry: &PlayerEntry,
    ) -> Result<(), EngineError> {
        self.put(self.paths.player(player), entry).await
    }

    pub async fn write_status(&self, status: SessionStatus) -> Result<(), EngineError> {
        self.put(self.paths.status(), &status).await
    }

    pub async fn write_current_question(&self, index: u32) -> Result<(), EngineError> {
        self.put(self.paths.current_question(), &index).await
    }

    pub async fn write_answer(
        &self,
        key: &AnswerKey,
        player: &PlayerId,
        payload: &AnswerPayload,
    ) -> Result<(), EngineError> {
        self.put(self.paths.answer(key, player), payload).await
    }

    pub async fn subscribe(&self) -> Result<Subscription, EngineError> {
        Ok(self.store.subscribe(self.paths.session()).await?)
    }

    /// Overwrites are idempotent, so every write goes through the retry loop.
    async fn put<T: Serialize>(&self, path: StorePath, value: &T) -> Result<(), EngineError> {
        let value = serde_json::to_value(value)?;
        let store = &self.store;
        let target = &path;
        let payload = &value;
        retry_with_backoff(
            move || async move { store.write(target, payload.clone()).await },
            self.config.max_retries,
            self.config.initial_delay(),
        )
        .await?;
        Ok(())
    }
}
