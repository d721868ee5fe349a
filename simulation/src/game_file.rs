use std::{fs, path::Path};

use engine::EngineConfig;
use serde::Deserialize;
use types::{Question, QuestionCatalog};

use crate::SimulationError;

/// YAML file describing a duel: engine settings plus an optional question
/// catalog replacing the built-in one.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameFile {
    pub engine: EngineConfig,
    pub questions: Option<QuestionCatalog>,
}

impl GameFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimulationError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let file = Self::from_yaml_str(&raw)?;
        log::info!("Loaded game file {}", path.display());
        Ok(file)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, SimulationError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn catalog(&self) -> QuestionCatalog {
        self.questions.clone().unwrap_or_else(default_catalog)
    }
}

/// Questions shipped with the client.
pub fn default_catalog() -> QuestionCatalog {
    QuestionCatalog {
        quiz: vec![
            Question::choice("morning", "Am I a morning person?", &["Yes", "No"]),
            Question::choice(
                "vacation",
                "My ideal vacation?",
                &["Beach", "City", "Mountains", "Staycation"],
            ),
            Question::choice("pet", "Cats or dogs?", &["Cats", "Dogs"]),
            Question::free_text("food", "What's my comfort food?"),
            Question::free_text("song", "Which song always gets me dancing?"),
            Question::choice("movie", "Comedy or horror?", &["Comedy", "Horror"]),
        ],
        who_is_more: vec![
            Question::free_text("late", "Who is more likely to be late?"),
            Question::free_text("cry", "Who cries more at movies?"),
            Question::free_text("plan", "Who plans the dates?"),
        ],
        would_you_rather: vec![
            Question::choice("fly", "Fly or be invisible?", &["Fly", "Be invisible"]),
            Question::choice("time", "Visit the past or the future?", &["Past", "Future"]),
            Question::choice("cook", "Cook or clean?", &["Cook", "Clean"]),
        ],
        truths: vec![
            "What's the most embarrassing thing you've done in front of me?".to_string(),
            "What did you first notice about me?".to_string(),
            "What's a secret you've never told anyone?".to_string(),
        ],
        dares: vec![
            "Send me your funniest selfie".to_string(),
            "Do your best impression of me".to_string(),
            "Sing the first song that comes to mind".to_string(),
        ],
    }
}
