use std::collections::BTreeMap;

use serde_json::{json, Value};
use types::{
    quiz_role, AnswerKey, GameSession, GameType, PlayerId, Question, QuestionDeck, QuizRole,
};

use crate::{
    events::{Effect, EngineEvent},
    ledger::{markers, IdempotencyLedger},
    notify::PartnerEvent,
    EngineError,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BarrierPhase {
    Answering,
    WaitingForPartner,
    Revealed,
    WaitingForPartnerNext,
    Finished,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reveal {
    pub index: u32,
    pub mine: Value,
    pub partner: Value,
    pub matched: Option<bool>,
}

/// Answer, reveal and ready barrier shared by the quiz, Who-Is-More and
/// Would-You-Rather.
///
/// Operations only compute the writes to make; `reconcile` moves the
/// barrier forward from the merged session view and is safe to call after
/// every change, any number of times.
#[derive(Clone, Debug)]
pub struct RoundBarrier {
    game_type: GameType,
    me: PlayerId,
    created_by: PlayerId,
    deck: QuestionDeck,
    index: u32,
    phase: BarrierPhase,
    reveal: Option<Reveal>,
    verdict: Option<bool>,
    scores: BTreeMap<PlayerId, u32>,
    agreements: u32,
}

impl RoundBarrier {
    pub fn new(game_type: GameType, me: PlayerId, created_by: PlayerId, deck: QuestionDeck) -> Self {
        Self::starting_at(game_type, me, created_by, deck, 0)
    }

    pub fn starting_at(
        game_type: GameType,
        me: PlayerId,
        created_by: PlayerId,
        deck: QuestionDeck,
        index: u32,
    ) -> Self {
        let scores = [me.clone(), created_by.clone()]
            .into_iter()
            .map(|player| (player, 0))
            .collect();
        Self {
            game_type,
            me,
            created_by,
            deck,
            index,
            phase: BarrierPhase::Answering,
            reveal: None,
            verdict: None,
            scores,
            agreements: 0,
        }
    }

    pub fn game_type(&self) -> GameType {
        self.game_type
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn phase(&self) -> BarrierPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == BarrierPhase::Finished
    }

    pub fn question(&self) -> Option<&Question> {
        self.deck.get(self.index)
    }

    pub fn deck(&self) -> &QuestionDeck {
        &self.deck
    }

    pub fn role(&self) -> QuizRole {
        quiz_role(self.index, &self.created_by, &self.me)
    }

    pub fn reveal(&self) -> Option<&Reveal> {
        self.reveal.as_ref()
    }

    pub fn verdict(&self) -> Option<bool> {
        self.verdict
    }

    pub fn scores(&self) -> &BTreeMap<PlayerId, u32> {
        &self.scores
    }

    pub fn score_of(&self, player: &PlayerId) -> u32 {
        self.scores.get(player).copied().unwrap_or_default()
    }

    pub fn agreements(&self) -> u32 {
        self.agreements
    }

    /// Free-text quiz questions are judged by the subject instead of compared.
    pub fn needs_validation(&self) -> bool {
        self.game_type.awards_points() && self.question().is_some_and(Question::is_free_text)
    }

    fn answer_key(&self) -> AnswerKey {
        AnswerKey::Answer {
            game_type: self.game_type,
            index: self.index,
        }
    }

    fn validation_key(&self, index: u32) -> AnswerKey {
        AnswerKey::Validation {
            game_type: self.game_type,
            index,
        }
    }

    fn ready_key(&self) -> AnswerKey {
        AnswerKey::ReadyNext {
            game_type: self.game_type,
            index: self.index,
        }
    }

    pub fn submit_answer(&self, view: &GameSession, value: Value) -> Result<Vec<Effect>, EngineError> {
        let Some(question) = self.question() else {
            return Err(EngineError::InvalidAction("the game is over".to_string()));
        };
        let key = self.answer_key();
        if view.answer(&key, &self.me).is_some() {
            log::debug!("Already answered {key}, ignoring");
            return Ok(Vec::new());
        }
        self.check_answer(view, question, &value)?;
        Ok(vec![
            Effect::Write { key, value },
            Effect::Notify(PartnerEvent::Answered {
                from: self.me.clone(),
                key: key.to_string(),
            }),
        ])
    }

    fn check_answer(&self, view: &GameSession, question: &Question, value: &Value) -> Result<(), EngineError> {
        let text = value.as_str().map(str::trim).unwrap_or_default();
        if self.game_type == GameType::WhoIsMore {
            if !view.is_member(&PlayerId::new(text)) {
                return Err(EngineError::InvalidAction(format!(
                    "{value} is not one of the players"
                )));
            }
            return Ok(());
        }
        if text.is_empty() {
            return Err(EngineError::InvalidAction("answer is empty".to_string()));
        }
        if !question.accepts(text) {
            return Err(EngineError::InvalidAction(format!(
                "{text} is not an option of {}",
                question.id
            )));
        }
        Ok(())
    }

    /// The subject's verdict on a free-text guess.
    pub fn validate_guess(
        &self,
        view: &GameSession,
        index: u32,
        correct: bool,
    ) -> Result<Vec<Effect>, EngineError> {
        let key = self.validation_key(index);
        if index != self.index {
            log::warn!("Dropping verdict for {key}: question {} is current", self.index);
            return Err(EngineError::StaleWrite {
                key: key.to_string(),
                current: self.index,
            });
        }
        if self.role() != QuizRole::Subject {
            return Err(EngineError::InvalidAction(
                "only the subject judges the guess".to_string(),
            ));
        }
        if !self.needs_validation() {
            return Err(EngineError::InvalidAction(
                "only free-text guesses are judged".to_string(),
            ));
        }
        if self.reveal.is_none() {
            return Err(EngineError::InvalidAction(
                "answers are not revealed yet".to_string(),
            ));
        }
        if view.answer(&key, &self.me).is_some() {
            return Ok(Vec::new());
        }
        Ok(vec![Effect::Write {
            key,
            value: json!(correct),
        }])
    }

    pub fn signal_ready_for_next(&self, view: &GameSession) -> Result<Vec<Effect>, EngineError> {
        if !matches!(
            self.phase,
            BarrierPhase::Revealed | BarrierPhase::WaitingForPartnerNext
        ) {
            return Err(EngineError::InvalidAction(
                "answers are not revealed yet".to_string(),
            ));
        }
        if self.needs_validation() && self.role() == QuizRole::Subject && self.verdict.is_none() {
            return Err(EngineError::InvalidAction(
                "judge the guess before moving on".to_string(),
            ));
        }
        let key = self.ready_key();
        if view.answer(&key, &self.me).is_some() {
            return Ok(Vec::new());
        }
        Ok(vec![Effect::Write {
            key,
            value: json!(true),
        }])
    }

    pub fn reconcile(&mut self, view: &GameSession, ledger: &mut IdempotencyLedger) -> Vec<Effect> {
        let mut effects = Vec::new();
        loop {
            if self.phase == BarrierPhase::Finished {
                break;
            }
            if self.index as usize >= self.deck.len() {
                self.finish(&mut effects);
                break;
            }

            let key = self.answer_key();
            let mine = view.answer(&key, &self.me);
            let partner = view.partner_answer(&key, &self.me);
            let (Some(mine), Some((partner_id, partner))) = (mine, partner) else {
                self.phase = if mine.is_some() {
                    BarrierPhase::WaitingForPartner
                } else {
                    BarrierPhase::Answering
                };
                break;
            };

            if self.reveal.is_none() {
                let first = ledger.try_consume(markers::answer(self.game_type, self.index));
                self.open_reveal(&mine.value, &partner.value, partner_id, first, &mut effects);
            }
            if matches!(
                self.phase,
                BarrierPhase::Answering | BarrierPhase::WaitingForPartner
            ) {
                self.phase = BarrierPhase::Revealed;
            }

            if self.needs_validation() && self.verdict.is_none() {
                self.apply_verdict(view, partner_id, ledger, &mut effects);
            }

            let ready = self.ready_key();
            let mine_ready = view.answer(&ready, &self.me).is_some();
            let partner_ready = view.partner_answer(&ready, &self.me).is_some();
            if mine_ready && partner_ready {
                if ledger.try_consume(markers::ready(self.game_type, self.index)) {
                    self.advance(&mut effects);
                    continue;
                }
                break;
            }
            if mine_ready {
                self.phase = BarrierPhase::WaitingForPartnerNext;
            }
            break;
        }
        effects
    }

    fn guesser(&self, partner_id: &PlayerId) -> PlayerId {
        match self.role() {
            QuizRole::Guesser => self.me.clone(),
            QuizRole::Subject => partner_id.clone(),
        }
    }

    fn subject(&self, partner_id: &PlayerId) -> PlayerId {
        match self.role() {
            QuizRole::Subject => self.me.clone(),
            QuizRole::Guesser => partner_id.clone(),
        }
    }

    fn open_reveal(
        &mut self,
        mine: &Value,
        partner: &Value,
        partner_id: &PlayerId,
        first: bool,
        effects: &mut Vec<Effect>,
    ) {
        let matched = if self.needs_validation() {
            None
        } else {
            Some(values_match(mine, partner))
        };
        self.reveal = Some(Reveal {
            index: self.index,
            mine: mine.clone(),
            partner: partner.clone(),
            matched,
        });
        if !first {
            return;
        }
        log::debug!("Revealed {} question {}", self.game_type, self.index);
        effects.push(Effect::Emit(EngineEvent::Revealed {
            index: self.index,
            mine: mine.clone(),
            partner: partner.clone(),
            matched,
        }));
        if matched == Some(true) {
            self.credit_match(partner_id, effects);
        }
    }

    fn apply_verdict(
        &mut self,
        view: &GameSession,
        partner_id: &PlayerId,
        ledger: &mut IdempotencyLedger,
        effects: &mut Vec<Effect>,
    ) {
        let subject = self.subject(partner_id);
        let key = self.validation_key(self.index);
        let Some(correct) = view.answer(&key, &subject).and_then(|p| p.value.as_bool()) else {
            return;
        };
        if !ledger.try_consume(markers::validation(self.game_type, self.index)) {
            return;
        }
        self.verdict = Some(correct);
        if let Some(reveal) = self.reveal.as_mut() {
            reveal.matched = Some(correct);
        }
        effects.push(Effect::Emit(EngineEvent::GuessValidated {
            index: self.index,
            correct,
        }));
        if correct {
            self.credit_match(partner_id, effects);
        }
    }

    fn credit_match(&mut self, partner_id: &PlayerId, effects: &mut Vec<Effect>) {
        if self.game_type.awards_points() {
            let guesser = self.guesser(partner_id);
            let total = self.scores.entry(guesser.clone()).or_insert(0);
            *total += 1;
            effects.push(Effect::Emit(EngineEvent::PointAwarded {
                player: guesser,
                index: self.index,
                total: *total,
            }));
        } else {
            self.agreements += 1;
            effects.push(Effect::Emit(EngineEvent::AgreementCounted {
                index: self.index,
                total: self.agreements,
            }));
        }
    }

    fn advance(&mut self, effects: &mut Vec<Effect>) {
        self.index += 1;
        self.reveal = None;
        self.verdict = None;
        log::debug!("Advancing {} to question {}", self.game_type, self.index);
        effects.push(Effect::Emit(EngineEvent::Advanced { index: self.index }));
        if self.me == self.created_by {
            effects.push(Effect::SetCurrentQuestion(self.index));
        }
        if self.index as usize >= self.deck.len() {
            self.finish(effects);
        } else {
            self.phase = BarrierPhase::Answering;
        }
    }

    fn finish(&mut self, effects: &mut Vec<Effect>) {
        self.phase = BarrierPhase::Finished;
        log::info!(
            "{} finished after {} questions with scores {:?}",
            self.game_type,
            self.index,
            self.scores
        );
        effects.push(Effect::Emit(EngineEvent::Finished {
            scores: self.scores.clone(),
            agreements: self.agreements,
        }));
        if self.me == self.created_by {
            effects.push(Effect::SetStatus(types::SessionStatus::Finished));
        }
    }
}

/// Strings match case-insensitively after trimming; anything else must be equal.
pub fn values_match(a: &Value, b: &Value) -> bool {
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => a.trim().to_lowercase() == b.trim().to_lowercase(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{AnswerPayload, PlayerEntry, SessionStatus};

    fn alice() -> PlayerId {
        PlayerId::new("alice")
    }

    fn bob() -> PlayerId {
        PlayerId::new("bob")
    }

    fn session(game_type: GameType) -> GameSession {
        let mut session = GameSession::new(game_type, alice(), "Alice");
        session.players.insert(bob(), PlayerEntry::joining_now("Bob"));
        session.status = SessionStatus::Playing;
        session
    }

    fn put(view: &mut GameSession, key: AnswerKey, player: &PlayerId, value: Value) {
        view.answers
            .entry(key.to_string())
            .or_default()
            .insert(player.clone(), AnswerPayload::now(value, player.as_str()));
    }

    fn apply_writes(view: &mut GameSession, player: &PlayerId, effects: &[Effect]) {
        for effect in effects {
            if let Effect::Write { key, value } = effect {
                put(view, *key, player, value.clone());
            }
        }
    }

    fn choice_deck() -> QuestionDeck {
        QuestionDeck::new(vec![
            Question::choice("color", "Favorite color?", &["Rouge", "Bleu"]),
            Question::choice("season", "Favorite season?", &["Winter", "Summer"]),
        ])
    }

    fn answer(index: u32) -> AnswerKey {
        AnswerKey::Answer {
            game_type: GameType::Quiz,
            index,
        }
    }

    fn ready(index: u32) -> AnswerKey {
        AnswerKey::ReadyNext {
            game_type: GameType::Quiz,
            index,
        }
    }

    fn emitted(effects: &[Effect]) -> Vec<&EngineEvent> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Emit(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_reveal_and_point_happen_once() {
        let mut view = session(GameType::Quiz);
        let mut barrier = RoundBarrier::new(GameType::Quiz, bob(), alice(), choice_deck());
        let mut ledger = IdempotencyLedger::new();

        put(&mut view, answer(0), &bob(), json!("rouge "));
        assert!(barrier.reconcile(&view, &mut ledger).is_empty());
        assert_eq!(barrier.phase(), BarrierPhase::WaitingForPartner);

        put(&mut view, answer(0), &alice(), json!("Rouge"));
        let effects = barrier.reconcile(&view, &mut ledger);
        assert_eq!(barrier.phase(), BarrierPhase::Revealed);
        assert!(matches!(
            emitted(&effects)[..],
            [
                EngineEvent::Revealed { matched: Some(true), .. },
                EngineEvent::PointAwarded { total: 1, .. }
            ]
        ));
        // Bob guesses on even questions.
        assert_eq!(barrier.score_of(&bob()), 1);

        assert!(barrier.reconcile(&view, &mut ledger).is_empty());
        assert_eq!(barrier.score_of(&bob()), 1);
    }

    #[test]
    fn test_second_submit_is_noop() {
        let mut view = session(GameType::Quiz);
        let barrier = RoundBarrier::new(GameType::Quiz, alice(), alice(), choice_deck());

        let effects = barrier.submit_answer(&view, json!("Bleu")).unwrap();
        assert_eq!(effects.len(), 2);
        apply_writes(&mut view, &alice(), &effects);
        assert!(barrier.submit_answer(&view, json!("Rouge")).unwrap().is_empty());
    }

    #[test]
    fn test_answer_outside_options_rejected() {
        let view = session(GameType::Quiz);
        let barrier = RoundBarrier::new(GameType::Quiz, alice(), alice(), choice_deck());
        assert!(matches!(
            barrier.submit_answer(&view, json!("Vert")),
            Err(EngineError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_free_text_waits_for_subject_verdict() {
        let deck = QuestionDeck::new(vec![Question::free_text("dream", "Dream trip?")]);
        let mut view = session(GameType::Quiz);
        let mut subject = RoundBarrier::new(GameType::Quiz, alice(), alice(), deck.clone());
        let mut guesser = RoundBarrier::new(GameType::Quiz, bob(), alice(), deck);
        let mut subject_ledger = IdempotencyLedger::new();
        let mut guesser_ledger = IdempotencyLedger::new();

        put(&mut view, answer(0), &alice(), json!("Japan"));
        put(&mut view, answer(0), &bob(), json!("Tokyo"));
        subject.reconcile(&view, &mut subject_ledger);
        guesser.reconcile(&view, &mut guesser_ledger);
        assert_eq!(subject.reveal().unwrap().matched, None);

        assert!(matches!(
            subject.signal_ready_for_next(&view),
            Err(EngineError::InvalidAction(_))
        ));
        assert!(matches!(
            guesser.validate_guess(&view, 0, true),
            Err(EngineError::InvalidAction(_))
        ));
        assert!(matches!(
            subject.validate_guess(&view, 3, true),
            Err(EngineError::StaleWrite { current: 0, .. })
        ));

        let effects = subject.validate_guess(&view, 0, true).unwrap();
        apply_writes(&mut view, &alice(), &effects);
        subject.reconcile(&view, &mut subject_ledger);
        let events = guesser.reconcile(&view, &mut guesser_ledger);

        assert_eq!(subject.verdict(), Some(true));
        assert_eq!(guesser.verdict(), Some(true));
        assert_eq!(subject.score_of(&bob()), 1);
        assert_eq!(guesser.score_of(&bob()), 1);
        assert!(emitted(&events)
            .iter()
            .any(|e| matches!(e, EngineEvent::GuessValidated { correct: true, .. })));
        assert!(subject.signal_ready_for_next(&view).is_ok());
    }

    #[test]
    fn test_advance_needs_both_ready_and_creator_mirrors_index() {
        let mut view = session(GameType::Quiz);
        let mut creator = RoundBarrier::new(GameType::Quiz, alice(), alice(), choice_deck());
        let mut joiner = RoundBarrier::new(GameType::Quiz, bob(), alice(), choice_deck());
        let mut creator_ledger = IdempotencyLedger::new();
        let mut joiner_ledger = IdempotencyLedger::new();

        put(&mut view, answer(0), &alice(), json!("Rouge"));
        put(&mut view, answer(0), &bob(), json!("Bleu"));
        creator.reconcile(&view, &mut creator_ledger);
        joiner.reconcile(&view, &mut joiner_ledger);

        let effects = creator.signal_ready_for_next(&view).unwrap();
        apply_writes(&mut view, &alice(), &effects);
        creator.reconcile(&view, &mut creator_ledger);
        assert_eq!(creator.phase(), BarrierPhase::WaitingForPartnerNext);
        assert_eq!(creator.index(), 0);

        put(&mut view, ready(0), &bob(), json!(true));
        let creator_effects = creator.reconcile(&view, &mut creator_ledger);
        let joiner_effects = joiner.reconcile(&view, &mut joiner_ledger);

        assert_eq!(creator.index(), 1);
        assert_eq!(joiner.index(), 1);
        assert!(creator_effects.contains(&Effect::SetCurrentQuestion(1)));
        assert!(!joiner_effects
            .iter()
            .any(|e| matches!(e, Effect::SetCurrentQuestion(_))));
        assert_eq!(creator.phase(), BarrierPhase::Answering);
    }

    #[test]
    fn test_last_question_finishes_and_creator_writes_status() {
        let deck = QuestionDeck::new(vec![Question::choice("c", "?", &["a", "b"])]);
        let mut view = session(GameType::Quiz);
        let mut creator = RoundBarrier::new(GameType::Quiz, alice(), alice(), deck);
        let mut ledger = IdempotencyLedger::new();
        for player in [alice(), bob()] {
            put(&mut view, answer(0), &player, json!("a"));
            put(&mut view, ready(0), &player, json!(true));
        }

        let effects = creator.reconcile(&view, &mut ledger);
        assert!(creator.is_finished());
        assert!(effects.contains(&Effect::SetStatus(SessionStatus::Finished)));
        assert!(matches!(
            emitted(&effects).last(),
            Some(EngineEvent::Finished { .. })
        ));
        assert!(creator.reconcile(&view, &mut ledger).is_empty());
        assert!(creator.submit_answer(&view, json!("a")).is_err());
    }

    #[test]
    fn test_who_is_more_counts_agreements() {
        let deck = QuestionDeck::new(vec![Question::free_text("late", "Who is always late?")]);
        let mut view = session(GameType::WhoIsMore);
        let mut barrier = RoundBarrier::new(GameType::WhoIsMore, alice(), alice(), deck);
        let mut ledger = IdempotencyLedger::new();

        assert!(barrier.submit_answer(&view, json!("carol")).is_err());
        let key = AnswerKey::Answer {
            game_type: GameType::WhoIsMore,
            index: 0,
        };
        put(&mut view, key, &alice(), json!("bob"));
        put(&mut view, key, &bob(), json!("bob"));

        barrier.reconcile(&view, &mut ledger);
        assert_eq!(barrier.agreements(), 1);
        assert_eq!(barrier.score_of(&alice()), 0);
        assert!(!barrier.needs_validation());
    }

    #[test]
    fn test_values_match_rules() {
        assert!(values_match(&json!(" Paris"), &json!("paris ")));
        assert!(!values_match(&json!("1"), &json!(1)));
        assert!(values_match(&json!(true), &json!(true)));
    }
}
