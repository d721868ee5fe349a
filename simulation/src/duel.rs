use std::{collections::BTreeMap, fmt::Display, sync::Arc, time::Duration};

use engine::{BarrierPhase, EngineConfig, GameClient, IdentitySources, RoundEngine, TodPhase};
use itertools::Itertools;
use store::MemoryStore;
use types::{
    ConversationThread, EntryKind, GameType, PlayerId, QuestionCatalog, QuizRole, Role, Strategy,
    TodKind,
};

use crate::SimulationError;

/// Couple both simulated players belong to.
pub const DUEL_COUPLE: &str = "duel";
const MAX_SETTLE_PASSES: usize = 64;

#[derive(Clone, Debug)]
pub struct DuelSettings {
    pub game_type: GameType,
    pub engine: EngineConfig,
    /// Truth-or-Dare rounds to play; barrier games run through their deck.
    pub rounds: u32,
    /// Pause before each move, for watching a duel unfold.
    pub delay_ms: Option<u64>,
}

impl DuelSettings {
    pub fn new(game_type: GameType) -> Self {
        Self {
            game_type,
            engine: EngineConfig::default(),
            rounds: 4,
            delay_ms: None,
        }
    }
}

/// Outcome as seen by the creator's device.
#[derive(Clone, Debug)]
pub struct DuelSummary {
    pub game_type: GameType,
    pub questions: usize,
    pub scores: BTreeMap<PlayerId, u32>,
    pub agreements: u32,
    pub rounds: u32,
    pub thread: ConversationThread,
}

impl Display for DuelSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.game_type {
            GameType::TruthOrDare => write!(
                f,
                "{} rounds of truth or dare:\n{}",
                self.rounds, self.thread
            ),
            GameType::Quiz => write!(
                f,
                "Quiz over after {} questions. Scores: {}",
                self.questions,
                self.scores
                    .iter()
                    .map(|(player, score)| format!("{player} {score}"))
                    .join(", ")
            ),
            _ => write!(
                f,
                "{} over: agreed on {} of {} questions",
                self.game_type, self.agreements, self.questions
            ),
        }
    }
}

/// A device plus whoever is holding it.
struct Seat {
    client: GameClient,
    partner: PlayerId,
    strategy: Box<dyn Strategy>,
}

impl Seat {
    fn new(
        store: &MemoryStore,
        (id, name): (&str, &str),
        partner: &str,
        engine: &EngineConfig,
        catalog: Arc<QuestionCatalog>,
        strategy: Box<dyn Strategy>,
    ) -> Self {
        let client = GameClient::new(
            PlayerId::new(id),
            name,
            Arc::new(store.clone()),
            engine.clone(),
            catalog,
        )
        .with_identity(IdentitySources::paired(DUEL_COUPLE));
        Self {
            client,
            partner: PlayerId::new(partner),
            strategy,
        }
    }

    fn is_done(&self, rounds: u32) -> bool {
        match self.client.engine() {
            Some(RoundEngine::Barrier(barrier)) => barrier.is_finished(),
            Some(RoundEngine::Conversation(conversation)) => conversation.round() >= rounds,
            None => false,
        }
    }

    /// Makes the move the current phase calls for, if any.
    async fn act(&mut self, rounds: u32) -> Result<bool, SimulationError> {
        let in_conversation = match self.client.engine() {
            Some(RoundEngine::Barrier(_)) => false,
            Some(RoundEngine::Conversation(c)) if c.round() < rounds => true,
            _ => return Ok(false),
        };
        if in_conversation {
            self.act_in_conversation().await
        } else {
            self.act_on_barrier().await
        }
    }

    async fn act_on_barrier(&mut self) -> Result<bool, SimulationError> {
        let Some(barrier) = self.client.barrier() else {
            return Ok(false);
        };
        let me = self.client.player_id().clone();
        match barrier.phase() {
            BarrierPhase::Answering => {
                let Some(mut question) = barrier.question().cloned() else {
                    return Ok(false);
                };
                if barrier.game_type() == GameType::WhoIsMore {
                    question.options = vec![self.partner.to_string(), me.to_string()];
                }
                let answer = self.strategy.answer(&question, &me, &self.partner);
                log::info!("{me} answers {:?} with {answer}", question.prompt);
                self.client.submit_answer(answer).await?;
            }
            BarrierPhase::Revealed => {
                let index = barrier.index();
                let judging = barrier.needs_validation()
                    && barrier.role() == QuizRole::Subject
                    && barrier.verdict().is_none();
                match (judging, barrier.question().cloned(), barrier.reveal().cloned()) {
                    (true, Some(question), Some(reveal)) => {
                        let correct =
                            self.strategy
                                .judge_guess(&question, &reveal.mine, &reveal.partner);
                        log::info!("{me} judges the guess {}: {correct}", reveal.partner);
                        self.client.validate_guess(index, correct).await?;
                    }
                    _ => {
                        log::debug!("{me} is ready after question {index}");
                        self.client.signal_ready_for_next().await?;
                    }
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    async fn act_in_conversation(&mut self) -> Result<bool, SimulationError> {
        let Some(conversation) = self.client.conversation() else {
            return Ok(false);
        };
        let me = self.client.player_id().clone();
        let round = conversation.round();
        match (conversation.role(), conversation.phase()) {
            (Role::Asker, TodPhase::ModeSelect | TodPhase::Choose) => {
                let kind = self.strategy.choose_kind(round);
                log::info!("{me} picks {kind} for round {round}");
                self.client.choose_type(kind).await?;
            }
            (Role::Asker, TodPhase::WriteQuestion) => {
                let kind = conversation.choice().unwrap_or(TodKind::Truth);
                let suggestion = self.client.classic_prompt();
                let text = self.strategy.write_question(kind, suggestion.as_deref());
                log::info!("{me} asks: {text}");
                self.client.ask_question(&text).await?;
            }
            (Role::Answerer, TodPhase::Answer) => {
                let Some(question) = conversation.question().cloned() else {
                    return Ok(false);
                };
                match self.strategy.respond(&question) {
                    None if question.kind == TodKind::Dare => {
                        log::info!("{me} skips the dare");
                        self.client.skip_dare().await?;
                    }
                    response => {
                        let text = response.unwrap_or_else(|| "I'd rather not say".to_string());
                        log::info!("{me} responds: {text}");
                        self.client.respond(&text).await?;
                    }
                }
            }
            (Role::Asker, TodPhase::React) => {
                let response = conversation
                    .thread()
                    .round_entries(round)
                    .find_map(|entry| match &entry.kind {
                        EntryKind::Response { skipped: true, .. } => Some("(skipped)".to_string()),
                        EntryKind::Response { text, .. } => Some(text.clone()),
                        _ => None,
                    })
                    .unwrap_or_default();
                let emoji = self.strategy.react(&response);
                log::info!("{me} reacts {emoji}");
                self.client.react(&emoji).await?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Pumps both devices until neither has anything left to handle.
async fn settle(a: &mut Seat, b: &mut Seat) -> Result<usize, SimulationError> {
    let mut total = 0;
    for _ in 0..MAX_SETTLE_PASSES {
        let handled = a.client.pump().await? + b.client.pump().await?;
        if handled == 0 {
            return Ok(total);
        }
        total += handled;
    }
    Ok(total)
}

/// Plays one game between two strategies over an in-memory store, the
/// first creating the session and the second joining it.
pub async fn run_duel(
    settings: &DuelSettings,
    catalog: QuestionCatalog,
    creator: Box<dyn Strategy>,
    joiner: Box<dyn Strategy>,
) -> Result<DuelSummary, SimulationError> {
    let store = MemoryStore::new();
    let catalog = Arc::new(catalog);
    let mut alice = Seat::new(
        &store,
        ("alice", "Alice"),
        "bob",
        &settings.engine,
        catalog.clone(),
        creator,
    );
    let mut bob = Seat::new(
        &store,
        ("bob", "Bob"),
        "alice",
        &settings.engine,
        catalog,
        joiner,
    );

    alice.client.connect().await?;
    bob.client.connect().await?;
    alice
        .client
        .create_session(settings.game_type, "Alice")
        .await?;
    settle(&mut alice, &mut bob).await?;
    bob.client.join_session("Bob").await?;
    settle(&mut alice, &mut bob).await?;

    while !(alice.is_done(settings.rounds) && bob.is_done(settings.rounds)) {
        if let Some(ms) = settings.delay_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        let mut acted = alice.act(settings.rounds).await?;
        acted |= bob.act(settings.rounds).await?;
        let handled = settle(&mut alice, &mut bob).await?;
        if acted || handled > 0 {
            continue;
        }
        let deadline = [alice.client.next_deadline(), bob.client.next_deadline()]
            .into_iter()
            .flatten()
            .min();
        let Some(deadline) = deadline else {
            return Err(SimulationError::Stalled(format!(
                "alice: {:?}, bob: {:?}",
                alice.client.engine(),
                bob.client.engine()
            )));
        };
        log::debug!("Waiting for the reaction to linger");
        tokio::time::sleep_until(deadline).await;
    }

    Ok(summarize(settings.game_type, &alice.client))
}

fn summarize(game_type: GameType, client: &GameClient) -> DuelSummary {
    let mut summary = DuelSummary {
        game_type,
        questions: 0,
        scores: BTreeMap::new(),
        agreements: 0,
        rounds: 0,
        thread: ConversationThread::new(),
    };
    match client.engine() {
        Some(RoundEngine::Barrier(barrier)) => {
            summary.questions = barrier.deck().len();
            summary.scores = barrier.scores().clone();
            summary.agreements = barrier.agreements();
        }
        Some(RoundEngine::Conversation(conversation)) => {
            summary.rounds = conversation.round();
            summary.thread = conversation.thread().clone();
        }
        None => {}
    }
    summary
}
