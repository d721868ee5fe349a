use std::{collections::VecDeque, sync::Arc};

use serde_json::Value;
use store::SharedStore;
use tokio::{
    sync::{broadcast, watch},
    time::Instant,
};
use types::{
    AnswerKey, AnswerPayload, ConversationThread, CoupleId, GameSession, GameType,
    PendingGameInvite, PlayerEntry, PlayerId, QuestionCatalog, SessionId, SessionStatus, TodKind,
    TodMode,
};

use crate::{
    adapter::{SessionPaths, SessionStore},
    barrier::RoundBarrier,
    conversation::ConversationEngine,
    events::{Effect, EngineEvent},
    identity::IdentitySources,
    ledger::{markers, IdempotencyLedger},
    lifecycle::{Observation, SessionMirror},
    listener::{ListenerKey, ListenerSlot, StartGuard},
    notify::{NoopNotifier, PartnerEvent, PartnerNotifier},
    EngineConfig, EngineError,
};

const MAX_RECONCILE_PASSES: usize = 8;
const EVENT_CAPACITY: usize = 256;

/// The round engine that runs once both players are in.
#[derive(Clone, Debug)]
pub enum RoundEngine {
    Barrier(RoundBarrier),
    Conversation(ConversationEngine),
}

impl RoundEngine {
    fn reconcile(
        &mut self,
        view: &GameSession,
        ledger: &mut IdempotencyLedger,
        now: Instant,
    ) -> Vec<Effect> {
        match self {
            RoundEngine::Barrier(barrier) => barrier.reconcile(view, ledger),
            RoundEngine::Conversation(conversation) => conversation.reconcile(view, ledger, now),
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        match self {
            RoundEngine::Barrier(_) => None,
            RoundEngine::Conversation(conversation) => conversation.next_deadline(),
        }
    }
}

/// A write that has been applied locally but not yet confirmed by the store.
#[derive(Clone, Debug, PartialEq)]
enum PendingWrite {
    Answer { key: AnswerKey, payload: AnswerPayload },
    Status(SessionStatus),
    CurrentQuestion(u32),
}

enum Wake {
    Snapshot(Option<Option<Value>>),
    Deadline,
}

/// One player's device.
///
/// Every call is applied to the local view first, then written to the
/// store. Snapshots from the store are merged into the local view and the
/// round engine is re-run after each of them, so the client can be driven
/// by `pump` or `next_change` from a single task.
pub struct GameClient {
    player_id: PlayerId,
    display_name: String,
    sources: IdentitySources,
    store: Arc<dyn SharedStore>,
    config: EngineConfig,
    catalog: Arc<QuestionCatalog>,
    notifier: Arc<dyn PartnerNotifier>,
    couple_id: Option<CoupleId>,
    adapter: Option<SessionStore>,
    listener: ListenerSlot,
    mirror: SessionMirror,
    ledger: IdempotencyLedger,
    start_guard: StartGuard,
    engine: Option<RoundEngine>,
    outbox: VecDeque<PendingWrite>,
    session_tx: watch::Sender<Option<GameSession>>,
    thread_tx: watch::Sender<ConversationThread>,
    invite_tx: watch::Sender<Option<PendingGameInvite>>,
    events: broadcast::Sender<EngineEvent>,
}

impl GameClient {
    pub fn new(
        player_id: PlayerId,
        display_name: &str,
        store: Arc<dyn SharedStore>,
        config: EngineConfig,
        catalog: Arc<QuestionCatalog>,
    ) -> Self {
        let (session_tx, _) = watch::channel(None);
        let (thread_tx, _) = watch::channel(ConversationThread::new());
        let (invite_tx, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            player_id,
            display_name: display_name.to_string(),
            sources: IdentitySources::default(),
            store,
            config,
            catalog,
            notifier: Arc::new(NoopNotifier),
            couple_id: None,
            adapter: None,
            listener: ListenerSlot::new(),
            mirror: SessionMirror::new(),
            ledger: IdempotencyLedger::new(),
            start_guard: StartGuard::default(),
            engine: None,
            outbox: VecDeque::new(),
            session_tx,
            thread_tx,
            invite_tx,
            events,
        }
    }

    pub fn with_identity(mut self, sources: IdentitySources) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn PartnerNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    pub fn couple_id(&self) -> Option<&CoupleId> {
        self.couple_id.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.mirror.current()
    }

    pub fn invite(&self) -> Option<&PendingGameInvite> {
        self.mirror.invite()
    }

    pub fn engine(&self) -> Option<&RoundEngine> {
        self.engine.as_ref()
    }

    pub fn barrier(&self) -> Option<&RoundBarrier> {
        match self.engine.as_ref()? {
            RoundEngine::Barrier(barrier) => Some(barrier),
            RoundEngine::Conversation(_) => None,
        }
    }

    pub fn conversation(&self) -> Option<&ConversationEngine> {
        match self.engine.as_ref()? {
            RoundEngine::Conversation(conversation) => Some(conversation),
            RoundEngine::Barrier(_) => None,
        }
    }

    pub fn ledger(&self) -> &IdempotencyLedger {
        &self.ledger
    }

    pub fn pending_writes(&self) -> usize {
        self.outbox.len()
    }

    pub fn is_listening(&self) -> bool {
        self.listener.key().is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.engine.as_ref()?.next_deadline()
    }

    pub fn watch_session(&self) -> watch::Receiver<Option<GameSession>> {
        self.session_tx.subscribe()
    }

    pub fn watch_thread(&self) -> watch::Receiver<ConversationThread> {
        self.thread_tx.subscribe()
    }

    pub fn watch_invite(&self) -> watch::Receiver<Option<PendingGameInvite>> {
        self.invite_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Attaches the session listener for the current identity and applies
    /// the first snapshot.
    pub async fn connect(&mut self) -> Result<(), EngineError> {
        self.ensure_listener().await?;
        self.pump().await?;
        Ok(())
    }

    /// Switches identity; a different couple tears down everything derived
    /// from the old one before listening again.
    pub async fn set_identity(&mut self, sources: IdentitySources) -> Result<(), EngineError> {
        self.sources = sources;
        match self.sources.resolve() {
            Ok(couple_id) if self.couple_id.as_ref() == Some(&couple_id) => Ok(()),
            Ok(couple_id) => {
                log::info!("{} switching to couple {couple_id}", self.player_id);
                self.teardown();
                self.connect().await
            }
            Err(e) => {
                self.teardown();
                Err(e)
            }
        }
    }

    pub fn disconnect(&mut self) {
        self.teardown();
    }

    pub async fn create_session(
        &mut self,
        game_type: GameType,
        display_name: &str,
    ) -> Result<SessionId, EngineError> {
        let adapter = self.ensure_listener().await?;
        self.display_name = display_name.to_string();

        let session = GameSession::new(game_type, self.player_id.clone(), display_name);
        let session_id = session.session_id;
        adapter
            .delete_session()
            .await
            .map_err(|e| self.failed("create a session", e))?;
        adapter
            .write_session(&session)
            .await
            .map_err(|e| self.failed("create a session", e))?;
        log::info!("{} created {game_type} session {session_id}", self.player_id);

        self.enter(session, false);
        self.emit(EngineEvent::SessionCreated {
            session_id,
            game_type,
        });
        self.notify_partner(PartnerEvent::SessionCreated {
            from: self.player_id.clone(),
            from_name: self.display_name.clone(),
            game_type,
        })
        .await;
        self.reconcile().await;
        Ok(session_id)
    }

    pub async fn join_session(&mut self, display_name: &str) -> Result<(), EngineError> {
        let adapter = self.ensure_listener().await?;
        self.display_name = display_name.to_string();

        let Some(session) = adapter
            .read_session()
            .await
            .map_err(|e| self.failed("join", e))?
        else {
            return Err(self.failed("join", EngineError::NoSessionFound));
        };
        if session.is_member(&self.player_id) {
            log::debug!("{} already joined {}", self.player_id, session.session_id);
            self.enter(session, true);
            self.reconcile().await;
            return Ok(());
        }
        if session.has_partner() {
            return Err(self.failed("join", EngineError::SessionFull));
        }

        let entry = PlayerEntry::joining_now(display_name);
        adapter
            .write_player(&self.player_id, &entry)
            .await
            .map_err(|e| self.failed("join", e))?;
        let mut joined = session;
        joined.players.insert(self.player_id.clone(), entry);
        let completes_pair = joined.has_partner() && joined.status == SessionStatus::Waiting;
        log::info!("{} joined session {}", self.player_id, joined.session_id);
        self.enter(joined, true);

        if completes_pair && self.ledger.try_consume(markers::status(SessionStatus::Ready)) {
            self.mirror.record_status(SessionStatus::Ready);
            adapter
                .write_status(SessionStatus::Ready)
                .await
                .map_err(|e| self.failed("mark the session ready", e))?;
        }
        self.reconcile().await;
        Ok(())
    }

    /// Deletes the session and forgets everything derived from it.
    pub async fn end_session(&mut self) -> Result<(), EngineError> {
        let adapter = match self.ensure_listener().await {
            Ok(adapter) => adapter,
            Err(EngineError::NotPaired) => {
                log::debug!("{} has no couple, nothing to end", self.player_id);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let had_session = self.mirror.current().is_some();
        adapter
            .delete_session()
            .await
            .map_err(|e| self.failed("end the session", e))?;
        self.mirror.clear();
        self.reset_session_state();
        if had_session {
            log::info!("{} ended the session", self.player_id);
            self.emit(EngineEvent::SessionEnded);
        }
        self.publish();
        Ok(())
    }

    pub async fn submit_answer(&mut self, value: Value) -> Result<(), EngineError> {
        let view = self.view()?;
        let effects = self.barrier_mut()?.submit_answer(&view, value)?;
        self.apply(effects).await
    }

    pub async fn validate_guess(&mut self, index: u32, correct: bool) -> Result<(), EngineError> {
        let view = self.view()?;
        let effects = self.barrier_mut()?.validate_guess(&view, index, correct)?;
        self.apply(effects).await
    }

    pub async fn signal_ready_for_next(&mut self) -> Result<(), EngineError> {
        let view = self.view()?;
        let effects = self.barrier_mut()?.signal_ready_for_next(&view)?;
        self.apply(effects).await
    }

    pub fn select_mode(&mut self, mode: TodMode) -> Result<(), EngineError> {
        self.conversation_mut()?.select_mode(mode)
    }

    pub async fn choose_type(&mut self, kind: TodKind) -> Result<(), EngineError> {
        let effects = self.conversation_mut()?.choose_type(kind)?;
        self.apply(effects).await
    }

    pub fn classic_prompt(&self) -> Option<String> {
        self.conversation()?.classic_prompt().map(str::to_string)
    }

    pub async fn ask_question(&mut self, text: &str) -> Result<(), EngineError> {
        let effects = self.conversation_mut()?.ask_question(text)?;
        self.apply(effects).await
    }

    pub async fn respond(&mut self, text: &str) -> Result<(), EngineError> {
        let effects = self.conversation_mut()?.respond(text)?;
        self.apply(effects).await
    }

    pub async fn skip_dare(&mut self) -> Result<(), EngineError> {
        let effects = self.conversation_mut()?.skip_dare()?;
        self.apply(effects).await
    }

    pub async fn react(&mut self, emoji: &str) -> Result<(), EngineError> {
        let effects = self.conversation_mut()?.react(emoji)?;
        self.apply(effects).await
    }

    /// Handles whatever is ready without waiting: parked writes, the latest
    /// snapshot and an elapsed timer. Returns how many of those did work.
    pub async fn pump(&mut self) -> Result<usize, EngineError> {
        let mut handled = match self.flush_outbox().await {
            Ok(flushed) => flushed,
            Err(e) => {
                log::warn!("{} still has {} parked writes: {e}", self.player_id, self.outbox.len());
                0
            }
        };
        if let Some(snapshot) = self.listener.poll() {
            self.apply_snapshot(snapshot).await?;
            handled += 1;
        }
        if self.next_deadline().is_some_and(|at| Instant::now() >= at) {
            self.reconcile().await;
            handled += 1;
        }
        Ok(handled)
    }

    /// Waits for the next snapshot or timer and handles it. False when no
    /// listener is attached.
    pub async fn next_change(&mut self) -> Result<bool, EngineError> {
        if let Err(e) = self.flush_outbox().await {
            log::warn!("{} still has {} parked writes: {e}", self.player_id, self.outbox.len());
        }
        let wake = match self.next_deadline() {
            Some(at) => tokio::select! {
                snapshot = self.listener.changed() => Wake::Snapshot(snapshot),
                _ = tokio::time::sleep_until(at) => Wake::Deadline,
            },
            None => Wake::Snapshot(self.listener.changed().await),
        };
        match wake {
            Wake::Snapshot(Some(snapshot)) => {
                self.apply_snapshot(snapshot).await?;
                Ok(true)
            }
            Wake::Snapshot(None) => Ok(false),
            Wake::Deadline => {
                self.reconcile().await;
                Ok(true)
            }
        }
    }

    /// Folds one store snapshot of the session node into the local state.
    pub async fn apply_snapshot(&mut self, raw: Option<Value>) -> Result<(), EngineError> {
        let snapshot = match raw {
            Some(raw) => {
                SessionStore::decode(raw).map_err(|e| self.failed("read the session", e))?
            }
            None => None,
        };
        match self.mirror.observe(snapshot, &self.player_id) {
            Observation::Fresh => {
                if let Some(session) = self.mirror.current() {
                    log::info!(
                        "{} now following {} session {}",
                        self.player_id,
                        session.game_type,
                        session.session_id
                    );
                }
                self.reset_session_state();
            }
            Observation::Ended => {
                log::info!("{} saw the session end", self.player_id);
                self.reset_session_state();
                self.emit(EngineEvent::SessionEnded);
            }
            Observation::Stale => log::debug!("{} ignored a stale snapshot", self.player_id),
            Observation::Absent | Observation::Merged => {}
        }
        self.reconcile().await;
        Ok(())
    }

    async fn ensure_listener(&mut self) -> Result<SessionStore, EngineError> {
        let couple_id = self
            .sources
            .resolve()
            .map_err(|e| self.failed("resolve the couple", e))?;
        let key = ListenerKey {
            couple_id: couple_id.clone(),
            player_id: self.player_id.clone(),
        };
        if self.listener.is_attached_to(&key) {
            if let Some(adapter) = &self.adapter {
                return Ok(adapter.clone());
            }
        }
        if self.listener.key().is_some() {
            self.teardown();
        }

        let paths = SessionPaths::new(&self.config.store.root, &couple_id)?;
        let adapter = SessionStore::new(self.store.clone(), paths, self.config.store.clone());
        let subscription = adapter
            .subscribe()
            .await
            .map_err(|e| self.failed("listen for the session", e))?;
        self.listener.install(key, subscription);
        self.couple_id = Some(couple_id);
        self.adapter = Some(adapter.clone());
        Ok(adapter)
    }

    fn teardown(&mut self) {
        self.listener.detach();
        self.adapter = None;
        self.couple_id = None;
        self.mirror.clear();
        self.reset_session_state();
        self.publish();
    }

    fn reset_session_state(&mut self) {
        self.ledger = IdempotencyLedger::new();
        self.start_guard.reset();
        self.engine = None;
        self.outbox.clear();
    }

    /// Makes `session` the local view, resetting per-session state when its
    /// identity is new. `stored` marks a session read back from the store
    /// rather than one this client just wrote.
    fn enter(&mut self, session: GameSession, stored: bool) {
        let fresh = if stored {
            self.mirror.adopt_stored(session, &self.player_id)
        } else {
            self.mirror.adopt(session, &self.player_id)
        };
        if fresh {
            self.reset_session_state();
        }
    }

    fn view(&self) -> Result<GameSession, EngineError> {
        self.mirror
            .current()
            .cloned()
            .ok_or_else(|| EngineError::InvalidAction("no active session".to_string()))
    }

    fn barrier_mut(&mut self) -> Result<&mut RoundBarrier, EngineError> {
        match self.engine.as_mut() {
            Some(RoundEngine::Barrier(barrier)) => Ok(barrier),
            _ => Err(EngineError::InvalidAction(
                "no question game in progress".to_string(),
            )),
        }
    }

    fn conversation_mut(&mut self) -> Result<&mut ConversationEngine, EngineError> {
        match self.engine.as_mut() {
            Some(RoundEngine::Conversation(conversation)) => Ok(conversation),
            _ => Err(EngineError::InvalidAction(
                "no truth or dare game in progress".to_string(),
            )),
        }
    }

    fn build_engine(&self, view: &GameSession) -> Option<RoundEngine> {
        let me = self.player_id.clone();
        let partner = view.partner_of(&me)?.clone();
        let created_by = view.created_by.clone();
        log::info!("{me} starting {} with {partner}", view.game_type);
        let engine = match view.game_type {
            GameType::TruthOrDare => RoundEngine::Conversation(ConversationEngine::new(
                me,
                partner,
                created_by,
                self.config.tod_mode,
                self.config.reaction_delay(),
                self.catalog.prompts_for(view.session_id),
            )),
            game_type => RoundEngine::Barrier(RoundBarrier::starting_at(
                game_type,
                me,
                created_by,
                self.catalog
                    .deck_for(game_type, view.session_id, self.config.questions_per_game),
                view.current_question,
            )),
        };
        Some(engine)
    }

    /// Lifecycle and round decisions for the current view.
    fn plan(&mut self) -> Vec<Effect> {
        let Some(view) = self.mirror.current().cloned() else {
            return Vec::new();
        };
        let me = self.player_id.clone();
        let mut effects = Vec::new();
        if !view.is_member(&me) {
            return effects;
        }

        if view.is_creator(&me)
            && view.has_partner()
            && self.ledger.try_consume(markers::partner_joined())
        {
            if let Some(partner) = view.joiner() {
                effects.push(Effect::Emit(EngineEvent::PartnerJoined {
                    player: partner.clone(),
                    display_name: view.display_name(partner).unwrap_or_default().to_string(),
                }));
            }
        }

        if view.is_creator(&me)
            && view.has_partner()
            && view.status == SessionStatus::Waiting
            && self.ledger.try_consume(markers::status(SessionStatus::Ready))
        {
            log::info!("{me} sees the pair complete, marking the session ready");
            effects.push(Effect::SetStatus(SessionStatus::Ready));
        }

        if view.has_partner()
            && matches!(view.status, SessionStatus::Ready | SessionStatus::Playing)
            && self.start_guard.try_start(view.session_id)
        {
            self.engine = self.build_engine(&view);
            effects.push(Effect::Emit(EngineEvent::Started {
                session_id: view.session_id,
                game_type: view.game_type,
            }));
            if view.is_creator(&me)
                && view.status == SessionStatus::Ready
                && self.ledger.try_consume(markers::status(SessionStatus::Playing))
            {
                effects.push(Effect::SetStatus(SessionStatus::Playing));
            }
        }

        if let Some(engine) = self.engine.as_mut() {
            effects.extend(engine.reconcile(&view, &mut self.ledger, Instant::now()));
        }
        effects
    }

    /// Runs `plan` until it settles and re-publishes the views. Returns the
    /// number of effects carried out.
    async fn reconcile(&mut self) -> usize {
        let mut applied = 0;
        for _ in 0..MAX_RECONCILE_PASSES {
            let effects = self.plan();
            if effects.is_empty() {
                break;
            }
            applied += effects.len();
            if let Err(e) = self.run_effects(effects).await {
                log::warn!("{} parked writes: {e}", self.player_id);
            }
        }
        self.publish();
        applied
    }

    async fn apply(&mut self, effects: Vec<Effect>) -> Result<(), EngineError> {
        let result = self.run_effects(effects).await;
        self.reconcile().await;
        result
    }

    async fn run_effects(&mut self, effects: Vec<Effect>) -> Result<(), EngineError> {
        for effect in effects {
            match effect {
                Effect::Write { key, value } => {
                    let payload = AnswerPayload::now(value, &self.display_name);
                    self.mirror
                        .record_answer(&key, &self.player_id, payload.clone());
                    self.outbox.push_back(PendingWrite::Answer { key, payload });
                }
                Effect::SetStatus(status) => {
                    self.mirror.record_status(status);
                    self.outbox.push_back(PendingWrite::Status(status));
                }
                Effect::SetCurrentQuestion(index) => {
                    self.mirror.record_current_question(index);
                    self.outbox.push_back(PendingWrite::CurrentQuestion(index));
                }
                Effect::Emit(event) => self.emit(event),
                Effect::Notify(event) => self.notify_partner(event).await,
            }
        }
        self.flush_outbox().await.map(|_| ())
    }

    /// Sends parked writes in order, stopping at the first failure.
    async fn flush_outbox(&mut self) -> Result<usize, EngineError> {
        let Some(adapter) = self.adapter.clone() else {
            return Ok(0);
        };
        let mut flushed = 0;
        while let Some(write) = self.outbox.front() {
            let result = match write {
                PendingWrite::Answer { key, payload } => {
                    adapter.write_answer(key, &self.player_id, payload).await
                }
                PendingWrite::Status(status) => adapter.write_status(*status).await,
                PendingWrite::CurrentQuestion(index) => adapter.write_current_question(*index).await,
            };
            if let Err(e) = result {
                log::warn!(
                    "{} could not write, {} writes parked: {e}",
                    self.player_id,
                    self.outbox.len()
                );
                return Err(e);
            }
            self.outbox.pop_front();
            flushed += 1;
        }
        Ok(flushed)
    }

    async fn notify_partner(&self, event: PartnerEvent) {
        let Some(couple_id) = self.couple_id.as_ref() else {
            return;
        };
        if let Err(e) = self.notifier.notify(couple_id, event).await {
            log::warn!("{} could not notify partner: {e}", self.player_id);
        }
    }

    fn emit(&self, event: EngineEvent) {
        log::debug!("{} event {event:?}", self.player_id);
        if self.events.send(event).is_err() {
            log::trace!("No one is listening for events");
        }
    }

    fn publish(&mut self) {
        if let Some(invite) = self.mirror.refresh_invite(&self.player_id) {
            match invite {
                Some(invite) => self.emit(EngineEvent::InviteReceived(invite)),
                None => self.emit(EngineEvent::InviteWithdrawn),
            }
        }
        let session = self.mirror.current().cloned();
        self.session_tx
            .send_if_modified(|current| replace_if_changed(current, session));
        let invite = self.mirror.invite().cloned();
        self.invite_tx
            .send_if_modified(|current| replace_if_changed(current, invite));
        let thread = self
            .conversation()
            .map(|conversation| conversation.thread().clone())
            .unwrap_or_default();
        self.thread_tx
            .send_if_modified(|current| replace_if_changed(current, thread));
    }

    fn failed(&self, action: &str, error: EngineError) -> EngineError {
        log::error!("{} failed to {action}: {error}", self.player_id);
        error
    }
}

fn replace_if_changed<T: PartialEq>(slot: &mut T, next: T) -> bool {
    if *slot == next {
        return false;
    }
    *slot = next;
    true
}
