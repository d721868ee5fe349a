use std::io::{self, Write};

use itertools::Itertools;
use regex::Regex;
use serde_json::{json, Value};
use types::{PlayerId, Question, Strategy, TodKind, TodQuestion};

use crate::DefaultStrategy;

/// Asks a human on stdin. Falls back to [`DefaultStrategy`] once stdin closes.
#[derive(Debug, Default)]
pub struct InputStrategy {
    fallback: DefaultStrategy,
    closed: bool,
}

impl InputStrategy {
    /// Prompts until `parse` accepts a line; `None` once stdin is closed.
    fn ask<T>(&mut self, prompt: &str, parse: impl Fn(&str) -> Result<T, String>) -> Option<T> {
        let mut buf = String::new();
        while !self.closed {
            print!("{prompt} >> ");
            let _ = io::stdout().flush();
            buf.clear();
            match io::stdin().read_line(&mut buf) {
                Ok(0) => {
                    log::warn!("stdin closed, playing automatically from now on");
                    self.closed = true;
                }
                Ok(_) => match parse(&buf) {
                    Ok(value) => return Some(value),
                    Err(err) => log::error!("Error parsing message from stdin: {err}"),
                },
                Err(err) => log::error!("Error reading line from stdin: {err}"),
            }
        }
        None
    }
}

impl Strategy for InputStrategy {
    fn answer(&mut self, question: &Question, me: &PlayerId, partner: &PlayerId) -> Value {
        println!("{}", question.prompt);
        if !question.is_free_text() {
            println!(
                "Options: {}",
                question
                    .options
                    .iter()
                    .enumerate()
                    .map(|(i, o)| format!("{}) {o}", i + 1))
                    .join(" || ")
            );
        }
        self.ask("Your answer?", |input| answer_from_str(input, question))
            .unwrap_or_else(|| self.fallback.answer(question, me, partner))
    }

    fn judge_guess(&mut self, question: &Question, own: &Value, guess: &Value) -> bool {
        println!("{}\nYou said {own}, your partner guessed {guess}", question.prompt);
        self.ask("Was that right? (y/n)", verdict_from_str)
            .unwrap_or_else(|| self.fallback.judge_guess(question, own, guess))
    }

    fn choose_kind(&mut self, round: u32) -> TodKind {
        println!("Round {}: your turn to ask", round + 1);
        self.ask("Truth or dare? (t/d)", kind_from_str)
            .unwrap_or_else(|| self.fallback.choose_kind(round))
    }

    fn write_question(&mut self, kind: TodKind, suggestion: Option<&str>) -> String {
        if let Some(suggestion) = suggestion {
            println!("Suggested {kind}: {suggestion} (leave empty to use it)");
        }
        self.ask(&format!("Your {kind}?"), |input| {
            question_from_str(input, suggestion)
        })
        .unwrap_or_else(|| self.fallback.write_question(kind, suggestion))
    }

    fn respond(&mut self, question: &TodQuestion) -> Option<String> {
        println!("{} asks: {}", question.asked_by, question.text);
        let prompt = match question.kind {
            TodKind::Truth => "Your answer?",
            TodKind::Dare => "What did you do? (\"skip\" to decline)",
        };
        match self.ask(prompt, |input| response_from_str(input, question.kind)) {
            Some(response) => response,
            None => self.fallback.respond(question),
        }
    }

    fn react(&mut self, response: &str) -> String {
        println!("Your partner says: {response}");
        self.ask("Reaction?", |input| {
            let input = input.trim();
            if input.is_empty() {
                Err("Reaction is empty".to_string())
            } else {
                Ok(input.to_string())
            }
        })
        .unwrap_or_else(|| self.fallback.react(response))
    }
}

/// An option by number or by text, or any text for free-text questions.
fn answer_from_str(input: &str, question: &Question) -> Result<Value, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("Answer is empty".to_string());
    }
    if question.is_free_text() {
        return Ok(json!(input));
    }
    if let Ok(number) = input.parse::<usize>() {
        return question
            .options
            .get(number.wrapping_sub(1))
            .map(|o| json!(o))
            .ok_or_else(|| format!("No option number {number}"));
    }
    question
        .options
        .iter()
        .find(|o| o.eq_ignore_ascii_case(input))
        .map(|o| json!(o))
        .ok_or_else(|| format!("{input:?} is not one of the options"))
}

fn verdict_from_str(input: &str) -> Result<bool, String> {
    let input = input.trim().to_lowercase();
    let yes = Regex::new(r"^(y|yes|right|correct)$").expect("Valid yes regex");
    let no = Regex::new(r"^(n|no|wrong|nope)$").expect("Valid no regex");
    if yes.is_match(&input) {
        Ok(true)
    } else if no.is_match(&input) {
        Ok(false)
    } else {
        Err(format!("Expected yes or no, got {input:?}"))
    }
}

fn kind_from_str(input: &str) -> Result<TodKind, String> {
    let re = Regex::new(r"^(?:(?<truth>t|truth)|(?<dare>d|dare))$").expect("Valid kind regex");
    let input = input.trim().to_lowercase();
    let Some(caps) = re.captures(&input) else {
        return Err(format!("Expected truth or dare, got {input:?}"));
    };
    if caps.name("truth").is_some() {
        Ok(TodKind::Truth)
    } else {
        Ok(TodKind::Dare)
    }
}

fn question_from_str(input: &str, suggestion: Option<&str>) -> Result<String, String> {
    match (input.trim(), suggestion) {
        ("", Some(suggestion)) => Ok(suggestion.to_string()),
        ("", None) => Err("Question is empty".to_string()),
        (text, _) => Ok(text.to_string()),
    }
}

fn response_from_str(input: &str, kind: TodKind) -> Result<Option<String>, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("Response is empty".to_string());
    }
    let skip = Regex::new(r"(?i)^skip$").expect("Valid skip regex");
    match (skip.is_match(input), kind) {
        (true, TodKind::Dare) => Ok(None),
        (true, TodKind::Truth) => Err("Truths can't be skipped".to_string()),
        (false, _) => Ok(Some(input.to_string())),
    }
}
