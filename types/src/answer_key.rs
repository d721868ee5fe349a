use std::fmt::Display;

use crate::GameType;

/// One single-shot, two-party exchange slot under `answers/`.
///
/// Every key carries the question index or round it belongs to, so a write
/// can be checked against the round the writer is currently in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnswerKey {
    Answer { game_type: GameType, index: u32 },
    Validation { game_type: GameType, index: u32 },
    ReadyNext { game_type: GameType, index: u32 },
    TodChoice(u32),
    TodQuestion(u32),
    TodResponse(u32),
    TodReaction(u32),
    TodReadyNext(u32),
}

const READY_NEXT: &str = "ready_next_";
const VALIDATION: &str = "validation_";
const TOD_CHOICE: &str = "tod_choice_";
const TOD_QUESTION: &str = "tod_question_";
const TOD_RESPONSE: &str = "tod_response_";
const TOD_REACTION: &str = "tod_reaction_";
const TOD: &str = "tod";

impl AnswerKey {
    /// Question index or conversation round the key belongs to.
    pub fn index(&self) -> u32 {
        match *self {
            AnswerKey::Answer { index, .. }
            | AnswerKey::Validation { index, .. }
            | AnswerKey::ReadyNext { index, .. } => index,
            AnswerKey::TodChoice(round)
            | AnswerKey::TodQuestion(round)
            | AnswerKey::TodResponse(round)
            | AnswerKey::TodReaction(round)
            | AnswerKey::TodReadyNext(round) => round,
        }
    }

    pub fn is_conversation(&self) -> bool {
        matches!(
            self,
            AnswerKey::TodChoice(_)
                | AnswerKey::TodQuestion(_)
                | AnswerKey::TodResponse(_)
                | AnswerKey::TodReaction(_)
                | AnswerKey::TodReadyNext(_)
        )
    }

    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(rest) = raw.strip_prefix(READY_NEXT) {
            let (prefix, index) = split_index(rest)?;
            if prefix == TOD {
                return Some(AnswerKey::TodReadyNext(index));
            }
            let game_type = prefix.parse().ok()?;
            return Some(AnswerKey::ReadyNext { game_type, index });
        }
        if let Some(rest) = raw.strip_prefix(VALIDATION) {
            let (prefix, index) = split_index(rest)?;
            let game_type = prefix.parse().ok()?;
            return Some(AnswerKey::Validation { game_type, index });
        }
        for (prefix, build) in [
            (TOD_CHOICE, AnswerKey::TodChoice as fn(u32) -> AnswerKey),
            (TOD_QUESTION, AnswerKey::TodQuestion),
            (TOD_RESPONSE, AnswerKey::TodResponse),
            (TOD_REACTION, AnswerKey::TodReaction),
        ] {
            if let Some(rest) = raw.strip_prefix(prefix) {
                return rest.parse().ok().map(build);
            }
        }
        let (prefix, index) = split_index(raw)?;
        let game_type = prefix.parse().ok()?;
        Some(AnswerKey::Answer { game_type, index })
    }
}

fn split_index(raw: &str) -> Option<(&str, u32)> {
    let (prefix, index) = raw.rsplit_once('_')?;
    Some((prefix, index.parse().ok()?))
}

impl Display for AnswerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerKey::Answer { game_type, index } => write!(f, "{game_type}_{index}"),
            AnswerKey::Validation { game_type, index } => {
                write!(f, "{VALIDATION}{game_type}_{index}")
            }
            AnswerKey::ReadyNext { game_type, index } => {
                write!(f, "{READY_NEXT}{game_type}_{index}")
            }
            AnswerKey::TodChoice(round) => write!(f, "{TOD_CHOICE}{round}"),
            AnswerKey::TodQuestion(round) => write!(f, "{TOD_QUESTION}{round}"),
            AnswerKey::TodResponse(round) => write!(f, "{TOD_RESPONSE}{round}"),
            AnswerKey::TodReaction(round) => write!(f, "{TOD_REACTION}{round}"),
            AnswerKey::TodReadyNext(round) => write!(f, "{READY_NEXT}{TOD}_{round}"),
        }
    }
}
