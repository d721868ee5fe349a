use std::fmt::Debug;

use serde_json::Value;

use crate::{PlayerId, Question, TodKind, TodQuestion};

/// Decision-making for a simulated or interactive player. The engine never
/// calls this; drivers consult it to pick which operation to issue next.
pub trait Strategy: Debug {
    /// Answer for a barrier question. Who-Is-More answers are player ids.
    fn answer(&mut self, question: &Question, me: &PlayerId, partner: &PlayerId) -> Value;

    /// Subject's verdict on the guesser's free-text answer.
    fn judge_guess(&mut self, question: &Question, own: &Value, guess: &Value) -> bool;

    fn choose_kind(&mut self, round: u32) -> TodKind;

    /// Question text to ask; `suggestion` is the classic prompt, if any.
    fn write_question(&mut self, kind: TodKind, suggestion: Option<&str>) -> String;

    /// `None` declines the dare.
    fn respond(&mut self, question: &TodQuestion) -> Option<String>;

    fn react(&mut self, response: &str) -> String;
}
