use std::fmt::Display;

use crate::PlayerId;

/// Who drives a Truth-or-Dare round.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Asker,
    Answerer,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Asker => write!(f, "Asker"),
            Role::Answerer => write!(f, "Answerer"),
        }
    }
}

/// The creator asks on even rounds, the joiner on odd rounds.
pub fn turn_owner(round: u32, created_by: &PlayerId, me: &PlayerId) -> Role {
    let creator_asks = round % 2 == 0;
    if creator_asks == (created_by == me) {
        Role::Asker
    } else {
        Role::Answerer
    }
}

/// Role in a quiz question: the subject answers about themself, the
/// guesser tries to match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum QuizRole {
    Subject,
    Guesser,
}

impl Display for QuizRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuizRole::Subject => write!(f, "Subject"),
            QuizRole::Guesser => write!(f, "Guesser"),
        }
    }
}

/// Even indices make the creator the subject, odd indices the joiner.
pub fn quiz_role(index: u32, created_by: &PlayerId, me: &PlayerId) -> QuizRole {
    match turn_owner(index, created_by, me) {
        Role::Asker => QuizRole::Subject,
        Role::Answerer => QuizRole::Guesser,
    }
}
