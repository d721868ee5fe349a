pub mod input_strategy;

use rand::{rngs::ThreadRng, seq::SliceRandom, Rng};
use serde_json::{json, Value};
use types::{PlayerId, Question, Strategy, TodKind, TodQuestion};

pub use crate::input_strategy::InputStrategy;

const FREE_TEXT_ANSWERS: &[&str] = &["Pizza", "Paris", "Blue", "The beach", "Dancing"];
const CUSTOM_TRUTHS: &[&str] = &[
    "What's your favorite memory of us?",
    "What did you think of me on our first date?",
];
const CUSTOM_DARES: &[&str] = &["Do your best impression of me", "Sing the chorus of our song"];
const REACTIONS: &[&str] = &["❤️", "😂", "😮", "🔥"];

/// Loose equality used to judge free-text guesses.
pub fn same_answer(a: &Value, b: &Value) -> bool {
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
        _ => a == b,
    }
}

#[derive(Debug, Default)]
pub struct RandomStrategy {
    rng: ThreadRng,
}

impl Strategy for RandomStrategy {
    fn answer(&mut self, question: &Question, me: &PlayerId, partner: &PlayerId) -> Value {
        if question.is_free_text() {
            return json!(FREE_TEXT_ANSWERS.choose(&mut self.rng).unwrap_or(&"Pizza"));
        }
        question
            .options
            .choose(&mut self.rng)
            .map(|o| json!(o))
            .unwrap_or_else(|| json!(if self.rng.gen() { me } else { partner }))
    }

    fn judge_guess(&mut self, _question: &Question, _own: &Value, _guess: &Value) -> bool {
        self.rng.gen_bool(0.5)
    }

    fn choose_kind(&mut self, _round: u32) -> TodKind {
        if self.rng.gen() {
            TodKind::Truth
        } else {
            TodKind::Dare
        }
    }

    fn write_question(&mut self, kind: TodKind, suggestion: Option<&str>) -> String {
        if let Some(suggestion) = suggestion {
            return suggestion.to_string();
        }
        let pool = match kind {
            TodKind::Truth => CUSTOM_TRUTHS,
            TodKind::Dare => CUSTOM_DARES,
        };
        pool.choose(&mut self.rng).unwrap_or(&"Tell me a secret").to_string()
    }

    fn respond(&mut self, question: &TodQuestion) -> Option<String> {
        if question.kind == TodKind::Dare && self.rng.gen_bool(0.25) {
            return None;
        }
        Some(
            FREE_TEXT_ANSWERS
                .choose(&mut self.rng)
                .unwrap_or(&"Pizza")
                .to_string(),
        )
    }

    fn react(&mut self, _response: &str) -> String {
        REACTIONS.choose(&mut self.rng).unwrap_or(&"❤️").to_string()
    }
}

/// Predictable player: first option, names the partner, always answers.
#[derive(Debug, Default)]
pub struct DefaultStrategy {}

impl Strategy for DefaultStrategy {
    fn answer(&mut self, question: &Question, _me: &PlayerId, partner: &PlayerId) -> Value {
        if question.is_free_text() {
            return json!(FREE_TEXT_ANSWERS[0]);
        }
        question
            .options
            .first()
            .map(|o| json!(o))
            .unwrap_or_else(|| json!(partner))
    }

    fn judge_guess(&mut self, _question: &Question, own: &Value, guess: &Value) -> bool {
        same_answer(own, guess)
    }

    fn choose_kind(&mut self, round: u32) -> TodKind {
        // alternate, starting with a truth
        if round % 4 < 2 {
            TodKind::Truth
        } else {
            TodKind::Dare
        }
    }

    fn write_question(&mut self, kind: TodKind, suggestion: Option<&str>) -> String {
        suggestion
            .map(str::to_string)
            .unwrap_or_else(|| match kind {
                TodKind::Truth => CUSTOM_TRUTHS[0].to_string(),
                TodKind::Dare => CUSTOM_DARES[0].to_string(),
            })
    }

    fn respond(&mut self, question: &TodQuestion) -> Option<String> {
        Some(match question.kind {
            TodKind::Truth => format!("Honestly? {}", FREE_TEXT_ANSWERS[0]),
            TodKind::Dare => "Done!".to_string(),
        })
    }

    fn react(&mut self, _response: &str) -> String {
        REACTIONS[0].to_string()
    }
}
