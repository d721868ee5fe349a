use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameType {
    Quiz,
    TruthOrDare,
    WhoIsMore,
    WouldYouRather,
}

impl GameType {
    pub const ALL: [GameType; 4] = [
        GameType::Quiz,
        GameType::TruthOrDare,
        GameType::WhoIsMore,
        GameType::WouldYouRather,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GameType::Quiz => "quiz",
            GameType::TruthOrDare => "truthOrDare",
            GameType::WhoIsMore => "whoIsMore",
            GameType::WouldYouRather => "wouldYouRather",
        }
    }

    /// Quiz, Who-Is-More and Would-You-Rather share the answer/reveal/ready barrier.
    pub fn uses_round_barrier(self) -> bool {
        !matches!(self, GameType::TruthOrDare)
    }

    /// Only the quiz awards points to the guesser; the other barrier games
    /// count agreements instead.
    pub fn awards_points(self) -> bool {
        matches!(self, GameType::Quiz)
    }
}

impl Display for GameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GameType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameType::ALL
            .into_iter()
            .find(|game_type| game_type.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown game type: {s}"))
    }
}
