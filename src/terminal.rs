//! Terminal interaction seam
//!
//! All user-facing text and every blocking yes/no prompt go through
//! `Terminal`, so the engine can run against a real TTY or a scripted
//! transcript in tests.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

pub trait Terminal {
    /// Print a line of output
    fn say(&mut self, text: &str);

    /// Show `prompt` and block until a line of input arrives.
    /// End of input reads as an empty answer.
    fn ask(&mut self, prompt: &str) -> String;

    /// Yes/no prompt: only `y` (any case, surrounding whitespace ignored) is yes
    fn confirm(&mut self, prompt: &str) -> bool {
        is_affirmative(&self.ask(prompt))
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// Stdout/stdin terminal used by the CLI
#[derive(Debug, Default)]
pub struct StdTerminal;

impl Terminal for StdTerminal {
    fn say(&mut self, text: &str) {
        println!("{}", text);
    }

    fn ask(&mut self, prompt: &str) -> String {
        print!("{}", prompt);
        let _ = io::stdout().flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(_) => line,
            Err(_) => String::new(),
        }
    }
}

/// Pre-scripted answers with a captured transcript
#[derive(Debug, Default)]
pub struct ScriptedTerminal {
    answers: VecDeque<String>,
    pub transcript: Vec<String>,
    pub prompts: Vec<String>,
}

impl ScriptedTerminal {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            transcript: Vec::new(),
            prompts: Vec::new(),
        }
    }

    /// Everything said, joined by newlines
    pub fn output(&self) -> String {
        self.transcript.join("\n")
    }

    pub fn remaining_answers(&self) -> usize {
        self.answers.len()
    }
}

impl Terminal for ScriptedTerminal {
    fn say(&mut self, text: &str) {
        self.transcript.push(text.to_string());
    }

    fn ask(&mut self, prompt: &str) -> String {
        self.prompts.push(prompt.to_string());
        self.answers.pop_front().unwrap_or_default()
    }
}
