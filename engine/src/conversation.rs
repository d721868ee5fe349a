use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::time::Instant;
use types::{
    turn_owner, AnswerKey, ConversationThread, GameSession, PlayerId, Role, ThreadEntry, TodChoice,
    TodKind, TodMode, TodPrompts, TodQuestion, TodReaction, TodResponse, SKIP_SENTINEL,
};

use crate::{
    events::{Effect, EngineEvent},
    ledger::{markers, IdempotencyLedger},
    EngineError,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TodPhase {
    ModeSelect,
    Choose,
    WriteQuestion,
    WaitQuestion,
    Answer,
    WaitAnswer,
    React,
    WaitReaction,
    AwaitAdvance,
}

/// Alternating Truth-or-Dare exchange. The asker picks and writes a
/// question, the answerer responds, the asker reacts, then roles swap.
#[derive(Clone, Debug)]
pub struct ConversationEngine {
    me: PlayerId,
    partner: PlayerId,
    created_by: PlayerId,
    mode: TodMode,
    round: u32,
    phase: TodPhase,
    choice: Option<TodKind>,
    question: Option<TodQuestion>,
    advance_at: Option<Instant>,
    reaction_delay: Duration,
    thread: ConversationThread,
    prompts: TodPrompts,
}

impl ConversationEngine {
    pub fn new(
        me: PlayerId,
        partner: PlayerId,
        created_by: PlayerId,
        mode: TodMode,
        reaction_delay: Duration,
        prompts: TodPrompts,
    ) -> Self {
        let phase = match turn_owner(0, &created_by, &me) {
            Role::Asker => TodPhase::ModeSelect,
            Role::Answerer => TodPhase::WaitQuestion,
        };
        Self {
            me,
            partner,
            created_by,
            mode,
            round: 0,
            phase,
            choice: None,
            question: None,
            advance_at: None,
            reaction_delay,
            thread: ConversationThread::new(),
            prompts,
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn phase(&self) -> TodPhase {
        self.phase
    }

    pub fn mode(&self) -> TodMode {
        self.mode
    }

    pub fn role(&self) -> Role {
        turn_owner(self.round, &self.created_by, &self.me)
    }

    pub fn is_my_turn_to_ask(&self) -> bool {
        self.role() == Role::Asker
    }

    pub fn choice(&self) -> Option<TodKind> {
        self.choice
    }

    pub fn question(&self) -> Option<&TodQuestion> {
        self.question.as_ref()
    }

    pub fn thread(&self) -> &ConversationThread {
        &self.thread
    }

    /// When the answerer may move on after a reaction.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.advance_at
    }

    /// Classic prompt for the chosen kind this round.
    pub fn classic_prompt(&self) -> Option<&str> {
        self.prompts.draw(self.choice?, self.round)
    }

    fn ensure(&self, role: Role, phases: &[TodPhase], action: &str) -> Result<(), EngineError> {
        if self.role() != role || !phases.contains(&self.phase) {
            return Err(EngineError::InvalidAction(format!(
                "cannot {action} as {} while in {:?}",
                self.role(),
                self.phase
            )));
        }
        Ok(())
    }

    fn record(&mut self, entry: ThreadEntry, effects: &mut Vec<Effect>) {
        if self.thread.append(entry.clone()) {
            effects.push(Effect::Emit(EngineEvent::ThreadUpdated(entry)));
        }
    }

    pub fn select_mode(&mut self, mode: TodMode) -> Result<(), EngineError> {
        self.ensure(
            Role::Asker,
            &[TodPhase::ModeSelect, TodPhase::Choose],
            "select a mode",
        )?;
        self.mode = mode;
        self.phase = TodPhase::Choose;
        Ok(())
    }

    pub fn choose_type(&mut self, kind: TodKind) -> Result<Vec<Effect>, EngineError> {
        self.ensure(
            Role::Asker,
            &[TodPhase::ModeSelect, TodPhase::Choose],
            "choose truth or dare",
        )?;
        let choice = TodChoice {
            kind,
            chosen_by: self.me.clone(),
            round: self.round,
        };
        let mut effects = Vec::new();
        if self.mode == TodMode::Custom {
            effects.push(Effect::Write {
                key: AnswerKey::TodChoice(self.round),
                value: serde_json::to_value(&choice)?,
            });
        }
        self.record(ThreadEntry::choice(&choice), &mut effects);
        self.choice = Some(kind);
        self.phase = TodPhase::WriteQuestion;
        Ok(effects)
    }

    pub fn ask_question(&mut self, text: &str) -> Result<Vec<Effect>, EngineError> {
        self.ensure(Role::Asker, &[TodPhase::WriteQuestion], "ask")?;
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::InvalidAction("question is empty".to_string()));
        }
        let Some(kind) = self.choice else {
            return Err(EngineError::InvalidAction("choose truth or dare first".to_string()));
        };
        let question = TodQuestion {
            kind,
            text: text.to_string(),
            asked_by: self.me.clone(),
            must_answer_by: self.partner.clone(),
            round: self.round,
        };
        let mut effects = vec![Effect::Write {
            key: AnswerKey::TodQuestion(self.round),
            value: serde_json::to_value(&question)?,
        }];
        self.record(ThreadEntry::question(&question), &mut effects);
        self.question = Some(question);
        self.phase = TodPhase::WaitAnswer;
        Ok(effects)
    }

    pub fn respond(&mut self, text: &str) -> Result<Vec<Effect>, EngineError> {
        self.ensure(Role::Answerer, &[TodPhase::Answer], "respond")?;
        let text = text.trim();
        if text.is_empty() || text == SKIP_SENTINEL {
            return Err(EngineError::InvalidAction("response is empty".to_string()));
        }
        self.write_response(text)
    }

    /// Declines the current dare.
    pub fn skip_dare(&mut self) -> Result<Vec<Effect>, EngineError> {
        self.ensure(Role::Answerer, &[TodPhase::Answer], "skip")?;
        if self.question.as_ref().map(|q| q.kind) != Some(TodKind::Dare) {
            return Err(EngineError::InvalidAction("only dares can be skipped".to_string()));
        }
        self.write_response(SKIP_SENTINEL)
    }

    fn write_response(&mut self, text: &str) -> Result<Vec<Effect>, EngineError> {
        let response = TodResponse {
            text: text.to_string(),
            responded_by: self.me.clone(),
            round: self.round,
        };
        let mut effects = vec![Effect::Write {
            key: AnswerKey::TodResponse(self.round),
            value: serde_json::to_value(&response)?,
        }];
        self.record(ThreadEntry::response(&response), &mut effects);
        self.phase = TodPhase::WaitReaction;
        Ok(effects)
    }

    /// Reacts to the response and signals readiness for the next round.
    pub fn react(&mut self, emoji: &str) -> Result<Vec<Effect>, EngineError> {
        self.ensure(Role::Asker, &[TodPhase::React], "react")?;
        let reaction = TodReaction {
            emoji: emoji.to_string(),
            reacted_by: self.me.clone(),
            round: self.round,
        };
        let mut effects = vec![
            Effect::Write {
                key: AnswerKey::TodReaction(self.round),
                value: serde_json::to_value(&reaction)?,
            },
            Effect::Write {
                key: AnswerKey::TodReadyNext(self.round),
                value: json!(true),
            },
        ];
        self.thread.attach_reaction(self.round, emoji);
        self.record(ThreadEntry::reaction(&reaction), &mut effects);
        self.phase = TodPhase::AwaitAdvance;
        Ok(effects)
    }

    pub fn reconcile(
        &mut self,
        view: &GameSession,
        ledger: &mut IdempotencyLedger,
        now: Instant,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        loop {
            let round = self.round;
            match (self.role(), self.phase) {
                (Role::Answerer, TodPhase::WaitQuestion) => {
                    if let Some(choice) = self.partner_payload::<TodChoice>(view, AnswerKey::TodChoice(round)) {
                        if ledger.try_consume(markers::choice(round)) {
                            self.choice = Some(choice.kind);
                            self.record(ThreadEntry::choice(&choice), &mut effects);
                        }
                    }
                    let Some(question) =
                        self.partner_payload::<TodQuestion>(view, AnswerKey::TodQuestion(round))
                    else {
                        break;
                    };
                    if question.must_answer_by != self.me || question.round != round {
                        log::warn!(
                            "{} ignoring question for {} in round {} while in round {round}",
                            self.me,
                            question.must_answer_by,
                            question.round
                        );
                        break;
                    }
                    if !ledger.try_consume(markers::question(round)) {
                        break;
                    }
                    let choice = TodChoice {
                        kind: question.kind,
                        chosen_by: question.asked_by.clone(),
                        round,
                    };
                    self.record(ThreadEntry::choice(&choice), &mut effects);
                    self.record(ThreadEntry::question(&question), &mut effects);
                    self.choice = Some(question.kind);
                    self.question = Some(question);
                    self.phase = TodPhase::Answer;
                }
                (Role::Asker, TodPhase::WaitAnswer) => {
                    let Some(response) =
                        self.partner_payload::<TodResponse>(view, AnswerKey::TodResponse(round))
                    else {
                        break;
                    };
                    if !ledger.try_consume(markers::response(round)) {
                        break;
                    }
                    self.record(ThreadEntry::response(&response), &mut effects);
                    self.phase = TodPhase::React;
                }
                (Role::Answerer, TodPhase::WaitReaction) => {
                    let Some(reaction) =
                        self.partner_payload::<TodReaction>(view, AnswerKey::TodReaction(round))
                    else {
                        break;
                    };
                    if !ledger.try_consume(markers::reaction(round)) {
                        break;
                    }
                    self.thread.attach_reaction(round, &reaction.emoji);
                    self.record(ThreadEntry::reaction(&reaction), &mut effects);
                    effects.push(Effect::Write {
                        key: AnswerKey::TodReadyNext(round),
                        value: json!(true),
                    });
                    self.advance_at = Some(now + self.reaction_delay);
                    self.phase = TodPhase::AwaitAdvance;
                }
                (_, TodPhase::AwaitAdvance) => {
                    let key = AnswerKey::TodReadyNext(round);
                    if self.advance_at.is_some_and(|at| now >= at) {
                        self.advance_at = None;
                    }
                    if self.advance_at.is_some() || !view.both_answered(&key, &self.me) {
                        break;
                    }
                    if !ledger.try_consume(markers::ready_tod(round)) {
                        break;
                    }
                    self.advance(&mut effects);
                }
                _ => break,
            }
        }
        effects
    }

    fn advance(&mut self, effects: &mut Vec<Effect>) {
        self.round += 1;
        self.choice = None;
        self.question = None;
        self.advance_at = None;
        let role = self.role();
        self.phase = match role {
            Role::Asker => TodPhase::Choose,
            Role::Answerer => TodPhase::WaitQuestion,
        };
        log::debug!("Truth or dare round {} as {role}", self.round);
        effects.push(Effect::Emit(EngineEvent::RoundAdvanced {
            round: self.round,
            role,
        }));
    }

    /// The partner's payload under a conversation key, if well-formed.
    fn partner_payload<T: DeserializeOwned>(&self, view: &GameSession, key: AnswerKey) -> Option<T> {
        let (_, payload) = view.partner_answer(&key, &self.me)?;
        serde_json::from_value(payload.value.clone())
            .map_err(|err| log::warn!("Ignoring malformed {key} from {}: {err}", self.partner))
            .ok()
    }
}
