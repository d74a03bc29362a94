//! Conversation memory between plan runs
//!
//! Keeps what the previous request did so the next one continues in the same
//! directory and "them" can refer to the files it found.

use std::path::{Path, PathBuf};

use crate::executor::{ExecutionResult, RunReport};
use crate::plan::Plan;
use crate::planner;
use crate::session::SessionState;

#[derive(Debug, Clone)]
pub struct Memory {
    last_plan: Option<Plan>,
    last_results: Vec<ExecutionResult>,
    last_files: Vec<String>,
    last_working_directory: PathBuf,
}

impl Memory {
    pub fn new(working_directory: PathBuf) -> Self {
        Self {
            last_plan: None,
            last_results: Vec::new(),
            last_files: Vec::new(),
            last_working_directory: working_directory,
        }
    }

    /// Store the outcome of a finished (or cancelled) run
    pub fn remember(&mut self, plan: &Plan, report: &RunReport) {
        self.last_plan = Some(plan.clone());
        self.last_results = report.results.clone();
        self.last_working_directory = report.final_directory.clone();
        if !report.cancelled {
            self.last_files = report.last_file_list.clone();
        }
    }

    pub fn last_plan(&self) -> Option<&Plan> {
        self.last_plan.as_ref()
    }

    pub fn last_results(&self) -> &[ExecutionResult] {
        &self.last_results
    }

    pub fn last_files(&self) -> &[String] {
        &self.last_files
    }

    pub fn last_working_directory(&self) -> &Path {
        &self.last_working_directory
    }

    /// Files a pronoun word refers to; None for anything that is not a pronoun
    pub fn resolve_pronoun(&self, word: &str) -> Option<&[String]> {
        if planner::is_pronoun(word) {
            Some(&self.last_files)
        } else {
            None
        }
    }

    /// Fresh session for the next run, continuing where the last one stopped
    pub fn session(&self) -> SessionState {
        let mut session = SessionState::new(Some(self.last_working_directory.clone()));
        session.last_file_list = self.last_files.clone();
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(dir: &Path, files: &[&str], cancelled: bool) -> RunReport {
        RunReport {
            run_id: "test".to_string(),
            summary: String::new(),
            cancelled,
            results: Vec::new(),
            final_directory: dir.to_path_buf(),
            last_file_list: files.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn test_remember_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let mut memory = Memory::new(PathBuf::from("/"));
        memory.remember(&Plan::default(), &report(dir.path(), &["/a.pdf", "/b.pdf"], false));

        assert_eq!(memory.last_working_directory(), dir.path());
        assert_eq!(memory.resolve_pronoun("Those Files").unwrap().len(), 2);
        assert_eq!(memory.resolve_pronoun("banana"), None);
        assert!(memory.last_plan().is_some());
    }

    #[test]
    fn test_cancelled_run_keeps_previous_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut memory = Memory::new(dir.path().to_path_buf());
        memory.remember(&Plan::default(), &report(dir.path(), &["/a.pdf"], false));
        memory.remember(&Plan::default(), &report(dir.path(), &[], true));

        assert_eq!(memory.last_files(), &["/a.pdf".to_string()]);
    }

    #[test]
    fn test_session_continues_in_last_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut memory = Memory::new(PathBuf::from("/"));
        memory.remember(&Plan::default(), &report(dir.path(), &["/x"], false));

        let session = memory.session();
        assert_eq!(session.working_directory(), dir.path().canonicalize().unwrap());
        assert_eq!(session.last_file_list, vec!["/x".to_string()]);
        assert!(session.step_outputs.is_empty());
    }
}
