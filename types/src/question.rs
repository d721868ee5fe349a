use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{GameType, SessionId, TodKind};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    /// Empty for free-text questions.
    #[serde(default)]
    pub options: Vec<String>,
}

impl Question {
    pub fn choice(id: &str, prompt: &str, options: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    pub fn free_text(id: &str, prompt: &str) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            options: Vec::new(),
        }
    }

    pub fn is_free_text(&self) -> bool {
        self.options.is_empty()
    }

    pub fn accepts(&self, answer: &str) -> bool {
        self.is_free_text() || self.options.iter().any(|o| o == answer)
    }
}

/// Every question pool the client ships with.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuestionCatalog {
    pub quiz: Vec<Question>,
    pub who_is_more: Vec<Question>,
    pub would_you_rather: Vec<Question>,
    pub truths: Vec<String>,
    pub dares: Vec<String>,
}

impl QuestionCatalog {
    pub fn pool(&self, game_type: GameType) -> &[Question] {
        match game_type {
            GameType::Quiz => &self.quiz,
            GameType::WhoIsMore => &self.who_is_more,
            GameType::WouldYouRather => &self.would_you_rather,
            GameType::TruthOrDare => &[],
        }
    }

    /// The deck both clients of `session_id` agree on.
    pub fn deck_for(&self, game_type: GameType, session_id: SessionId, limit: usize) -> QuestionDeck {
        QuestionDeck::shuffled(self.pool(game_type).to_vec(), session_id.seed(), limit)
    }

    pub fn prompts_for(&self, session_id: SessionId) -> TodPrompts {
        TodPrompts::shuffled(self.truths.clone(), self.dares.clone(), session_id.seed())
    }
}

/// Pre-shuffled question list, identical on both clients of a session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuestionDeck {
    questions: Vec<Question>,
}

impl QuestionDeck {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn shuffled(mut questions: Vec<Question>, seed: u64, limit: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        questions.shuffle(&mut rng);
        questions.truncate(limit);
        log::debug!("Dealt deck of {} questions", questions.len());
        Self { questions }
    }

    pub fn get(&self, index: u32) -> Option<&Question> {
        self.questions.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }
}

/// Prompts offered to the asker in classic Truth-or-Dare.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TodPrompts {
    truths: Vec<String>,
    dares: Vec<String>,
}

impl TodPrompts {
    pub fn shuffled(mut truths: Vec<String>, mut dares: Vec<String>, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        truths.shuffle(&mut rng);
        dares.shuffle(&mut rng);
        Self { truths, dares }
    }

    pub fn draw(&self, kind: TodKind, round: u32) -> Option<&str> {
        let pool = match kind {
            TodKind::Truth => &self.truths,
            TodKind::Dare => &self.dares,
        };
        if pool.is_empty() {
            return None;
        }
        pool.get(round as usize % pool.len()).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> QuestionCatalog {
        QuestionCatalog {
            quiz: (0..20)
                .map(|i| Question::free_text(&format!("q{i}"), &format!("Question {i}")))
                .collect(),
            truths: vec!["t1".into(), "t2".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_same_session_yields_same_deck() {
        let catalog = catalog();
        let session = SessionId::new();
        let first = catalog.deck_for(GameType::Quiz, session, 10);
        let second = catalog.deck_for(GameType::Quiz, session, 10);
        assert_eq!(first, second);
        assert_eq!(first.len(), 10);
    }

    #[test]
    fn test_choice_question_only_accepts_its_options() {
        let question = Question::choice("c", "Color?", &["Rouge", "Bleu"]);
        assert!(question.accepts("Rouge"));
        assert!(!question.accepts("Vert"));
        assert!(Question::free_text("f", "Why?").accepts("anything"));
    }

    #[test]
    fn test_draw_from_empty_pool_is_none() {
        let prompts = catalog().prompts_for(SessionId::new());
        assert!(prompts.draw(TodKind::Dare, 0).is_none());
        assert!(prompts.draw(TodKind::Truth, 5).is_some());
    }
}
