//! Planner boundary
//!
//! A planner turns a natural-language request into a `Plan`. The engine only
//! depends on the `Planner` trait; `KeywordPlanner` is an offline rule-based
//! implementation good enough for the common single-step requests.

use crate::plan::{Plan, PlanError, Step};
use crate::substitution::PRONOUN_TOKEN;
use crate::slog_debug;

pub trait Planner {
    fn plan(&self, request: &str) -> Result<Plan, PlanError>;
}

/// Words that refer back to the files found by the previous request
pub const PRONOUN_WORDS: &[&str] = &["them", "those", "those files", "it"];

pub fn is_pronoun(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    PRONOUN_WORDS.contains(&lower.as_str())
}

const KEYWORD_ASSUMPTION: &str = "Planned offline from keywords; paths are taken literally from the request.";

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordPlanner;

/// Request split into original-case words plus their lowercase forms
struct Words<'a> {
    original: Vec<&'a str>,
    lower: Vec<String>,
}

impl<'a> Words<'a> {
    fn new(request: &'a str) -> Self {
        let original: Vec<&str> = request.split_whitespace().collect();
        let lower = original.iter().map(|w| w.to_lowercase()).collect();
        Self { original, lower }
    }

    fn text(&self) -> String {
        self.lower.join(" ")
    }

    fn has(&self, word: &str) -> bool {
        self.lower.iter().any(|w| w == word)
    }

    fn position(&self, word: &str) -> Option<usize> {
        self.position_from(word, 0)
    }

    fn position_from(&self, word: &str, start: usize) -> Option<usize> {
        self.lower
            .iter()
            .skip(start)
            .position(|w| w == word)
            .map(|i| i + start)
    }

    /// Words `start..end` joined, quotes stripped; None when empty
    fn span(&self, start: usize, end: usize) -> Option<String> {
        if start >= end || end > self.original.len() {
            return None;
        }
        let joined = self.original[start..end].join(" ");
        let trimmed = joined.trim_matches(|c: char| c == '\'' || c == '"').trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn rest(&self, start: usize) -> Option<String> {
        self.span(start, self.original.len())
    }
}

/// Pronouns become the file-list token; anything else is a literal path
fn path_arg(text: String) -> String {
    if is_pronoun(&text) {
        PRONOUN_TOKEN.to_string()
    } else {
        text
    }
}

impl KeywordPlanner {
    pub fn new() -> Self {
        Self
    }

    fn find_files(w: &Words) -> Option<Step> {
        let named = w.position("named")?;
        let pattern = w.span(named + 1, named + 2)?;
        let root = match w.position_from("in", named + 2) {
            Some(i) => w.rest(i + 1)?,
            None => ".".to_string(),
        };
        Some(Step::new(
            "find_files",
            vec![pattern, root],
            "To find files matching the specified pattern in the given directory.",
        ))
    }

    fn search(w: &Words) -> Option<Step> {
        let start = w.position("for")? + 1;
        let (content, root) = match w.position_from("in", start) {
            Some(i) => (w.span(start, i)?, w.rest(i + 1).unwrap_or_else(|| ".".to_string())),
            None => (w.rest(start)?, ".".to_string()),
        };
        Some(Step::new(
            "search_in_files",
            vec![content, root],
            "To search for content in files in the specified directory.",
        ))
    }

    fn transfer(w: &Words, verb: &str, idx: usize, why: &str) -> Option<Step> {
        let to = w.position_from("to", idx + 1)?;
        let src = path_arg(w.span(idx + 1, to)?);
        let dest = w.rest(to + 1)?;
        Some(Step::new(verb, vec![src, dest], why))
    }

    fn single_path(w: &Words, verb: &str, after: usize, why: &str) -> Option<Step> {
        let mut start = after + 1;
        if matches!(w.lower.get(start).map(String::as_str), Some("named") | Some("called")) {
            start += 1;
        }
        let path = path_arg(w.rest(start)?);
        Some(Step::new(verb, vec![path], why))
    }

    fn list(w: &Words) -> Option<Step> {
        let path = w
            .position("in")
            .and_then(|i| w.rest(i + 1))
            .unwrap_or_else(|| ".".to_string());
        Some(Step::new("ls", vec![path], "To list files in the specified directory."))
    }

    fn change_dir(w: &Words) -> Option<Step> {
        let after = w
            .position("to")
            .or_else(|| w.position("directory"))
            .or_else(|| w.position("cd"))?;
        let path = w.rest(after + 1)?;
        Some(Step::new("cd", vec![path], "To change the current directory."))
    }

    fn step_for(w: &Words) -> Option<Step> {
        let text = w.text();
        // Ordered by specificity
        if text.contains("find files") {
            Self::find_files(w)
        } else if text.contains("search for") {
            Self::search(w)
        } else if let Some(i) = w.position("copy").or_else(|| w.position("cp")) {
            Self::transfer(w, "cp", i, "To copy a file or directory.")
        } else if let Some(i) = w.position("move").or_else(|| w.position("mv")) {
            Self::transfer(w, "mv", i, "To move a file or directory.")
        } else if let Some(i) = w
            .position("remove")
            .or_else(|| w.position("delete"))
            .or_else(|| w.position("rm"))
        {
            Self::single_path(w, "rm", i, "To remove a file or directory.")
        } else if (w.has("make") && w.has("directory")) || w.has("mkdir") {
            let i = w.position("directory").or_else(|| w.position("mkdir"))?;
            Self::single_path(w, "mkdir", i, "To create a directory.")
        } else if (w.has("create") && w.has("file")) || w.has("touch") {
            let i = w.position("file").or_else(|| w.position("touch"))?;
            Self::single_path(w, "touch", i, "To create a file.")
        } else if w.has("list") || w.has("ls") {
            Self::list(w)
        } else if w.has("cd") || text.contains("go to") || text.contains("change directory") {
            Self::change_dir(w)
        } else if text == "pwd" || text.contains("where am i") {
            Some(Step::new("pwd", vec![], "To show the current directory."))
        } else {
            None
        }
    }
}

impl Planner for KeywordPlanner {
    fn plan(&self, request: &str) -> Result<Plan, PlanError> {
        let words = Words::new(request);
        let step = Self::step_for(&words)
            .ok_or_else(|| PlanError::NotUnderstood(request.trim().to_string()))?;

        slog_debug!("PLANNER", "planned", serde_json::json!({
            "request": request,
            "cmd": step.cmd,
            "args": step.args,
        }));

        Ok(Plan::new(vec![KEYWORD_ASSUMPTION.to_string()], vec![step]))
    }
}
