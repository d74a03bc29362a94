//! Cross-step argument rewriting
//!
//! Two passes over a step's arguments, in order:
//! 1. `result_of_step_<N>` / `{result_of_step_<N>}` is replaced by the
//!    recorded output of step N (a file list expands in place).
//! 2. `$results.last` is replaced by the most recent file enumeration.

use lazy_static::lazy_static;
use regex::Regex;

use crate::session::{SessionState, StepOutput};

pub const PRONOUN_TOKEN: &str = "$results.last";

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"^\{?result_of_step_(\d+)\}?$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubstitutionError {
    #[error("Used a pronoun like 'them' but the previous step produced no files.")]
    EmptyPronoun,
}

/// Step index named by `arg`, if it is a well-formed placeholder
pub fn placeholder_index(arg: &str) -> Option<usize> {
    PLACEHOLDER
        .captures(arg.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn substitute(args: &[String], session: &SessionState) -> Result<Vec<String>, SubstitutionError> {
    let expanded = expand_placeholders(args, session);
    expand_pronoun(expanded, &session.last_file_list)
}

fn expand_placeholders(args: &[String], session: &SessionState) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        let recorded = placeholder_index(arg).and_then(|n| session.output_of_step(n));
        match recorded {
            Some(StepOutput::FileList(files)) => out.extend(files.iter().cloned()),
            Some(StepOutput::Scalar(text)) => out.push(text.clone()),
            Some(StepOutput::Absent) | None => out.push(arg.clone()),
        }
    }
    out
}

fn expand_pronoun(args: Vec<String>, last_files: &[String]) -> Result<Vec<String>, SubstitutionError> {
    if !args.iter().any(|a| a == PRONOUN_TOKEN) {
        return Ok(args);
    }
    if last_files.is_empty() {
        return Err(SubstitutionError::EmptyPronoun);
    }

    let mut out = Vec::with_capacity(args.len() + last_files.len());
    for arg in args {
        if arg == PRONOUN_TOKEN {
            out.extend(last_files.iter().cloned());
        } else {
            out.push(arg);
        }
    }
    Ok(out)
}
