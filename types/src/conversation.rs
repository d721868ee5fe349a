use std::{collections::BTreeSet, fmt::Display, mem::discriminant};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{AnswerKey, GameSession, PlayerId};

/// Response text standing for a declined dare.
pub const SKIP_SENTINEL: &str = "__skipped__";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TodKind {
    Truth,
    Dare,
}

impl Display for TodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TodKind::Truth => write!(f, "truth"),
            TodKind::Dare => write!(f, "dare"),
        }
    }
}

/// Classic mode draws questions from the shipped prompts and folds the
/// truth/dare choice into the question write; custom mode lets the asker
/// author the question and writes the choice separately.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TodMode {
    #[default]
    Classic,
    Custom,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodChoice {
    #[serde(rename = "type")]
    pub kind: TodKind,
    pub chosen_by: PlayerId,
    pub round: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodQuestion {
    #[serde(rename = "type")]
    pub kind: TodKind,
    pub text: String,
    pub asked_by: PlayerId,
    pub must_answer_by: PlayerId,
    pub round: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodResponse {
    pub text: String,
    pub responded_by: PlayerId,
    pub round: u32,
}

impl TodResponse {
    pub fn is_skip(&self) -> bool {
        self.text == SKIP_SENTINEL
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodReaction {
    pub emoji: String,
    pub reacted_by: PlayerId,
    pub round: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EntryKind {
    Choice(TodKind),
    Question {
        kind: TodKind,
        text: String,
    },
    Response {
        text: String,
        skipped: bool,
        reaction: Option<String>,
    },
    Reaction(String),
}

impl EntryKind {
    fn rank(&self) -> u8 {
        match self {
            EntryKind::Choice(_) => 0,
            EntryKind::Question { .. } => 1,
            EntryKind::Response { .. } => 2,
            EntryKind::Reaction(_) => 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ThreadEntry {
    pub round: u32,
    pub author: PlayerId,
    pub kind: EntryKind,
}

impl ThreadEntry {
    pub fn choice(choice: &TodChoice) -> Self {
        Self {
            round: choice.round,
            author: choice.chosen_by.clone(),
            kind: EntryKind::Choice(choice.kind),
        }
    }

    pub fn question(question: &TodQuestion) -> Self {
        Self {
            round: question.round,
            author: question.asked_by.clone(),
            kind: EntryKind::Question {
                kind: question.kind,
                text: question.text.clone(),
            },
        }
    }

    pub fn response(response: &TodResponse) -> Self {
        Self {
            round: response.round,
            author: response.responded_by.clone(),
            kind: EntryKind::Response {
                text: response.text.clone(),
                skipped: response.is_skip(),
                reaction: None,
            },
        }
    }

    pub fn reaction(reaction: &TodReaction) -> Self {
        Self {
            round: reaction.round,
            author: reaction.reacted_by.clone(),
            kind: EntryKind::Reaction(reaction.emoji.clone()),
        }
    }

    fn sort_key(&self) -> (u32, u8) {
        (self.round, self.kind.rank())
    }
}

impl Display for ThreadEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            EntryKind::Choice(kind) => write!(f, "[{}] {} picked {kind}", self.round, self.author),
            EntryKind::Question { kind, text } => {
                write!(f, "[{}] {} asks ({kind}): {text}", self.round, self.author)
            }
            EntryKind::Response {
                skipped: true,
                ..
            } => write!(f, "[{}] {} skipped", self.round, self.author),
            EntryKind::Response { text, reaction, .. } => write!(
                f,
                "[{}] {} answers: {text}{}",
                self.round,
                self.author,
                reaction.as_ref().map(|r| format!(" {r}")).unwrap_or_default()
            ),
            EntryKind::Reaction(emoji) => {
                write!(f, "[{}] {} reacts {emoji}", self.round, self.author)
            }
        }
    }
}

/// Client-local Truth-or-Dare transcript.
///
/// Entries are only ever added, at most one of each kind per round, and are
/// kept ordered by round then by protocol step, so two clients observing the
/// same writes in different orders hold identical threads.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConversationThread {
    entries: Vec<ThreadEntry>,
}

impl ConversationThread {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the round already has an entry of this kind.
    pub fn append(&mut self, entry: ThreadEntry) -> bool {
        let duplicate = self
            .entries
            .iter()
            .any(|e| e.round == entry.round && discriminant(&e.kind) == discriminant(&entry.kind));
        if duplicate {
            return false;
        }
        let position = self
            .entries
            .iter()
            .rposition(|e| e.sort_key() <= entry.sort_key())
            .map_or(0, |idx| idx + 1);
        self.entries.insert(position, entry);
        true
    }

    /// Attaches a reaction to the round's response; false if there is no
    /// response yet or it already carries one.
    pub fn attach_reaction(&mut self, round: u32, emoji: &str) -> bool {
        let response = self.entries.iter_mut().rev().find(|e| {
            e.round == round && matches!(e.kind, EntryKind::Response { .. })
        });
        match response {
            Some(ThreadEntry {
                kind: EntryKind::Response { reaction, .. },
                ..
            }) if reaction.is_none() => {
                *reaction = Some(emoji.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn entries(&self) -> &[ThreadEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&ThreadEntry> {
        self.entries.last()
    }

    pub fn round_entries(&self, round: u32) -> impl Iterator<Item = &ThreadEntry> {
        self.entries.iter().filter(move |e| e.round == round)
    }

    /// Rebuilds the thread from the conversation keys stored in `session`.
    pub fn replay(session: &GameSession) -> Self {
        let rounds: BTreeSet<u32> = session
            .answers
            .keys()
            .filter_map(|raw| AnswerKey::parse(raw))
            .filter(AnswerKey::is_conversation)
            .map(|key| key.index())
            .collect();

        let mut thread = Self::new();
        for round in rounds {
            let question: Option<TodQuestion> = decode_any(session, AnswerKey::TodQuestion(round));
            let choice = decode_any::<TodChoice>(session, AnswerKey::TodChoice(round)).or_else(|| {
                question.as_ref().map(|q| TodChoice {
                    kind: q.kind,
                    chosen_by: q.asked_by.clone(),
                    round,
                })
            });
            if let Some(choice) = choice {
                thread.append(ThreadEntry::choice(&choice));
            }
            if let Some(question) = question {
                thread.append(ThreadEntry::question(&question));
            }
            if let Some(response) = decode_any::<TodResponse>(session, AnswerKey::TodResponse(round)) {
                thread.append(ThreadEntry::response(&response));
            }
            if let Some(reaction) = decode_any::<TodReaction>(session, AnswerKey::TodReaction(round)) {
                thread.attach_reaction(round, &reaction.emoji);
                thread.append(ThreadEntry::reaction(&reaction));
            }
        }
        thread
    }
}

impl Display for ConversationThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.entries.iter().join("\n"))
    }
}

/// Decodes the single writer's payload for a conversation key.
fn decode_any<T: serde::de::DeserializeOwned>(session: &GameSession, key: AnswerKey) -> Option<T> {
    let slot = session.answers.get(&key.to_string())?;
    slot.values().find_map(|payload| {
        serde_json::from_value(payload.value.clone())
            .map_err(|err| log::warn!("Ignoring malformed {key} payload: {err}"))
            .ok()
    })
}
