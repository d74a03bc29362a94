//! ExecutionLoop - preview, confirm, run and summarize a plan
//!
//! Steps run strictly in order against one `SessionState`. The first failing
//! step stops the run. Every failure, including a panic inside a handler, is
//! turned into an `ExecutionResult` and never escapes `run`.

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

use crate::commands::{CommandOutcome, Dispatcher, ErrorKind, Status, Verb};
use crate::config::EngineConfig;
use crate::fuzzy::MatchKind;
use crate::plan::{Plan, Step};
use crate::session::{SessionState, StepOutput};
use crate::substitution;
use crate::terminal::Terminal;
use crate::undo_log::UndoLogger;
use crate::{slog_debug, slog_error, slog_info, slog_warn};

pub const PROCEED_PROMPT: &str = "\nShould I proceed with this plan? (y/n): ";
pub const SUMMARY_FINISHED: &str = "Plan execution finished.";
pub const SUMMARY_CANCELLED: &str = "User cancelled.";
pub const STOPPING_MESSAGE: &str = "Stopping execution due to error.";

const PERMISSION_HINT: &str = " Suggestion: Try running with 'sudo' or check file permissions.";

/// Where the loop is in its lifecycle. Step numbers are 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Previewing,
    AwaitingConfirmation,
    Cancelled,
    Executing(usize),
    StepSucceeded(usize),
    StepFailed(usize),
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: Status,
    pub kind: Option<ErrorKind>,
    pub output: String,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    fn failure(kind: ErrorKind, output: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            kind: Some(kind),
            output: output.into(),
        }
    }
}

impl From<&CommandOutcome> for ExecutionResult {
    fn from(outcome: &CommandOutcome) -> Self {
        Self {
            status: outcome.status,
            kind: outcome.kind,
            output: outcome.output.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub summary: String,
    pub cancelled: bool,
    pub results: Vec<ExecutionResult>,
    /// Session directory once the run ended
    pub final_directory: PathBuf,
    /// Most recent file enumeration at the end of the run
    pub last_file_list: Vec<String>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        !self.cancelled && self.results.iter().all(ExecutionResult::is_success)
    }
}

pub struct ExecutionLoop {
    dispatcher: Dispatcher,
    undo: UndoLogger,
    state: RunState,
    history: Vec<RunState>,
}

impl ExecutionLoop {
    pub fn new(dispatcher: Dispatcher, undo: UndoLogger) -> Self {
        Self {
            dispatcher,
            undo,
            state: RunState::Pending,
            history: vec![RunState::Pending],
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Dispatcher::from_config(config),
            UndoLogger::new_with_path(&config.undo_log_path),
        )
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state entered during the last run, in order
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    pub fn undo_logger(&self) -> &UndoLogger {
        &self.undo
    }

    fn transition(&mut self, run_id: &str, next: RunState) {
        slog_debug!("EXECUTOR", "state", serde_json::json!({
            "run_id": run_id,
            "from": self.state,
            "to": next,
        }));
        self.state = next;
        self.history.push(next);
    }

    /// Print the plan in human-readable form
    pub fn preview(&self, plan: &Plan, terminal: &mut dyn Terminal) {
        terminal.say(&render_preview(plan));
    }

    /// Single proceed prompt for the whole plan
    pub fn confirm(&self, terminal: &mut dyn Terminal) -> bool {
        terminal.confirm(PROCEED_PROMPT)
    }

    /// Preview, confirm and execute `plan` in `session`
    pub async fn run(&mut self, plan: &Plan, session: &mut SessionState, terminal: &mut dyn Terminal) -> RunReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        self.state = RunState::Pending;
        self.history = vec![RunState::Pending];

        slog_info!("EXECUTOR", "run_started", serde_json::json!({
            "run_id": run_id,
            "steps": plan.steps.len(),
            "cwd": session.cwd_string(),
        }));

        self.transition(&run_id, RunState::Previewing);
        self.preview(plan, terminal);

        self.transition(&run_id, RunState::AwaitingConfirmation);
        if !self.confirm(terminal) {
            self.transition(&run_id, RunState::Cancelled);
            terminal.say("Execution cancelled by user.");
            slog_info!("EXECUTOR", "run_cancelled", serde_json::json!({ "run_id": run_id }));
            return RunReport {
                run_id,
                summary: SUMMARY_CANCELLED.to_string(),
                cancelled: true,
                results: Vec::new(),
                final_directory: session.working_directory().to_path_buf(),
                last_file_list: session.last_file_list.clone(),
            };
        }

        let mut results = Vec::with_capacity(plan.steps.len());
        for (idx, step) in plan.steps.iter().enumerate() {
            let number = idx + 1;
            self.transition(&run_id, RunState::Executing(number));

            let result = self.run_step(&run_id, number, step, session, terminal).await;
            let failed = !result.is_success();
            results.push(result);

            if failed {
                self.transition(&run_id, RunState::StepFailed(number));
                terminal.say(STOPPING_MESSAGE);
                break;
            }
            self.transition(&run_id, RunState::StepSucceeded(number));
        }

        self.transition(&run_id, RunState::Finished);
        slog_info!("EXECUTOR", "run_finished", serde_json::json!({
            "run_id": run_id,
            "executed": results.len(),
            "failed": results.iter().any(|r| !r.is_success()),
        }));

        RunReport {
            run_id,
            summary: SUMMARY_FINISHED.to_string(),
            cancelled: false,
            results,
            final_directory: session.working_directory().to_path_buf(),
            last_file_list: session.last_file_list.clone(),
        }
    }

    /// substitute -> dispatch -> recover -> record -> undo-log
    async fn run_step(
        &self,
        run_id: &str,
        number: usize,
        step: &Step,
        session: &mut SessionState,
        terminal: &mut dyn Terminal,
    ) -> ExecutionResult {
        let args = match substitution::substitute(&step.args, session) {
            Ok(args) => args,
            Err(e) => {
                slog_warn!("EXECUTOR", "substitution_failed", serde_json::json!({
                    "run_id": run_id,
                    "step": number,
                    "error": e.to_string(),
                }));
                session.record(StepOutput::Absent);
                session.last_file_list.clear();
                let result = ExecutionResult::failure(ErrorKind::SubstitutionError, e.to_string());
                terminal.say(&result.output);
                return result;
            }
        };

        let verb = Verb::parse(&step.cmd);
        let dispatched = AssertUnwindSafe(self.dispatcher.dispatch_named(
            &step.cmd,
            &args,
            &step.options,
            session,
            terminal,
        ))
        .catch_unwind()
        .await;

        let mut outcome = match dispatched {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                slog_error!("EXECUTOR", "step_panicked", serde_json::json!({
                    "run_id": run_id,
                    "step": number,
                    "verb": step.cmd,
                    "panic": message,
                }));
                CommandOutcome::error(
                    ErrorKind::Critical,
                    format!(
                        "An unexpected critical error occurred executing '{}': {}",
                        step.cmd, message
                    ),
                )
            }
        };

        if !outcome.is_success() {
            self.recover(verb, &args, session, &mut outcome);
        }
        terminal.say(&outcome.output);

        self.record(verb, &args, &outcome, session);

        if outcome.is_success() {
            if let Err(e) = self.undo.append(&step.cmd, &args, &step.options).await {
                slog_warn!("UNDO", "append_failed", serde_json::json!({
                    "run_id": run_id,
                    "error": e.to_string(),
                }));
            }
        } else {
            slog_warn!("EXECUTOR", "step_failed", serde_json::json!({
                "run_id": run_id,
                "step": number,
                "verb": step.cmd,
                "kind": outcome.kind,
            }));
        }

        ExecutionResult::from(&outcome)
    }

    /// Add a hint to a failed outcome. Status and kind are never changed.
    fn recover(&self, verb: Option<Verb>, args: &[String], session: &SessionState, outcome: &mut CommandOutcome) {
        match outcome.kind {
            Some(ErrorKind::NotFound) if !outcome.output.contains("Did you mean") => {
                let path_arg = match verb {
                    Some(Verb::FindFiles) | Some(Verb::SearchInFiles) => args.get(1),
                    Some(v) if v.takes_paths() => args.first(),
                    _ => None,
                };
                let Some(raw) = path_arg else { return };
                let missing = session.resolve(raw);
                let kind = match verb {
                    Some(Verb::Cd) | Some(Verb::Ls) | Some(Verb::FindFiles) | Some(Verb::SearchInFiles) => {
                        MatchKind::Directory
                    }
                    _ => MatchKind::Any,
                };
                if let Some(name) = self.dispatcher.matcher().suggest_for_path(&missing, kind) {
                    outcome
                        .output
                        .push_str(&format!(" Suggestion: Did you mean '{}'?", name));
                }
            }
            Some(ErrorKind::PermissionDenied) => outcome.output.push_str(PERMISSION_HINT),
            _ => {}
        }
    }

    fn record(&self, verb: Option<Verb>, args: &[String], outcome: &CommandOutcome, session: &mut SessionState) {
        if !outcome.is_success() {
            session.record(StepOutput::Absent);
            session.last_file_list.clear();
            return;
        }

        match verb {
            Some(Verb::FindFiles) => {
                let files = outcome.files.clone().unwrap_or_default();
                session.last_file_list = files.clone();
                session.record(StepOutput::FileList(files));
            }
            Some(Verb::Cp) | Some(Verb::Mv) => {
                session.last_file_list.clear();
                session.record(StepOutput::FileList(args.to_vec()));
            }
            _ => {
                session.last_file_list.clear();
                session.record(StepOutput::Scalar(outcome.output.clone()));
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Human-readable plan preview
pub fn render_preview(plan: &Plan) -> String {
    let mut lines = vec!["I understand. Here is the plan:".to_string()];
    if !plan.assumptions.is_empty() {
        lines.push("Based on these assumptions:".to_string());
        for assumption in &plan.assumptions {
            lines.push(format!("  - {}", assumption));
        }
    }

    lines.push("\nI will perform the following steps:".to_string());
    for (i, step) in plan.steps.iter().enumerate() {
        let args = step
            .args
            .iter()
            .map(|a| format!("\"{}\"", a))
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(format!("{}. {} {}", i + 1, step.cmd, args).trim_end().to_string());
        lines.push(format!("   Reason: {}", step.why));
    }
    lines.join("\n")
}

/// Summary block: header, summary line, one line per executed step
pub fn summarize(report: &RunReport) -> String {
    let mut lines = vec!["--- Execution Summary ---".to_string(), report.summary.clone()];
    for (i, result) in report.results.iter().enumerate() {
        lines.push(format!(
            "Step {} [{}]: {}",
            i + 1,
            result.status.as_str().to_uppercase(),
            result.output
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::ScriptedTerminal;

    fn engine(dir: &std::path::Path) -> ExecutionLoop {
        ExecutionLoop::new(
            Dispatcher::default(),
            UndoLogger::new_with_path(dir.join("undo.log")),
        )
    }

    #[test]
    fn test_render_preview() {
        let plan = Plan::new(
            vec!["Desktop is ~/Desktop".to_string()],
            vec![
                Step::new("mkdir", vec!["reports".to_string()], "Hold the reports"),
                Step::new("pwd", vec![], "Show where we are"),
            ],
        );
        let text = render_preview(&plan);
        assert_eq!(
            text,
            "I understand. Here is the plan:\n\
             Based on these assumptions:\n  - Desktop is ~/Desktop\n\
             \nI will perform the following steps:\n\
             1. mkdir \"reports\"\n   Reason: Hold the reports\n\
             2. pwd\n   Reason: Show where we are"
        );
    }

    #[tokio::test]
    async fn test_state_history_for_cancelled_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = SessionState::new(Some(dir.path().to_path_buf()));
        let mut engine = engine(dir.path());
        let mut term = ScriptedTerminal::new(["n"]);

        let plan = Plan::new(vec![], vec![Step::new("pwd", vec![], "where")]);
        let report = engine.run(&plan, &mut session, &mut term).await;

        assert!(report.cancelled);
        assert_eq!(engine.state(), RunState::Cancelled);
        assert_eq!(
            engine.history(),
            &[
                RunState::Pending,
                RunState::Previewing,
                RunState::AwaitingConfirmation,
                RunState::Cancelled
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_step_recorded_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = SessionState::new(Some(dir.path().to_path_buf()));
        let mut engine = engine(dir.path());
        let mut term = ScriptedTerminal::new(["y"]);

        let plan = Plan::new(
            vec![],
            vec![
                Step::new("cd", vec!["missing".to_string()], "go"),
                Step::new("pwd", vec![], "never runs"),
            ],
        );
        let report = engine.run(&plan, &mut session, &mut term).await;

        assert_eq!(report.results.len(), 1);
        assert_eq!(session.step_outputs, vec![StepOutput::Absent]);
        assert_eq!(engine.state(), RunState::Finished);
        assert!(engine.history().contains(&RunState::StepFailed(1)));
        assert!(term.output().contains(STOPPING_MESSAGE));
    }

    #[tokio::test]
    async fn test_not_found_gains_suggestion() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.txt"), "").unwrap();
        let mut session = SessionState::new(Some(dir.path().to_path_buf()));
        let mut engine = engine(dir.path());
        let mut term = ScriptedTerminal::new(["y"]);

        let plan = Plan::new(
            vec![],
            vec![Step::new("cp", vec!["reprot.txt".to_string(), "copy.txt".to_string()], "copy")],
        );
        let report = engine.run(&plan, &mut session, &mut term).await;
        let result = &report.results[0];

        assert_eq!(result.kind, Some(ErrorKind::NotFound));
        assert!(result.output.contains("Did you mean 'report.txt'?"));
    }

    #[test]
    fn test_summarize() {
        let report = RunReport {
            run_id: "r".to_string(),
            summary: SUMMARY_FINISHED.to_string(),
            cancelled: false,
            results: vec![
                ExecutionResult {
                    status: Status::Success,
                    kind: None,
                    output: "Current directory: /tmp".to_string(),
                },
                ExecutionResult::failure(ErrorKind::NotFound, "Error: Directory not found at '/x'."),
            ],
            final_directory: PathBuf::from("/tmp"),
            last_file_list: Vec::new(),
        };

        assert_eq!(
            summarize(&report),
            "--- Execution Summary ---\nPlan execution finished.\n\
             Step 1 [SUCCESS]: Current directory: /tmp\n\
             Step 2 [ERROR]: Error: Directory not found at '/x'."
        );
        assert!(!report.succeeded());
    }
}
