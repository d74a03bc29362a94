//! samantha_core - plan execution engine for the Samantha file assistant
//!
//! A planner turns a request into a `Plan`; this crate previews it, asks for
//! confirmation, runs each step against the filesystem and shell, recovers
//! with suggestions where it can, and summarizes what happened.
//!
//! Modules:
//! - plan: Plan/Step data model and boundary validation
//! - executor: Preview, confirm, sequential run, summary
//! - commands: Verb set and per-verb handlers
//! - substitution: Step placeholders and the `$results.last` pronoun
//! - session: Per-run working directory and step outputs
//! - safety: Dangerous paths and destructive-verb confirmation
//! - search: Filtered file search and keyword content search
//! - fuzzy: "Did you mean" suggestions
//! - path_resolver: Home expansion and lexical normalisation
//! - shell: `execute_bash` process boundary
//! - undo_log: Append-only audit trail
//! - terminal: Output and prompt seam
//! - planner: Planner trait and offline keyword planner
//! - memory: State carried between runs
//! - suggestions: Proactive desktop cleanup
//! - config: YAML engine configuration
//! - structured_log: JSON logging

pub mod structured_log;
pub mod config;
pub mod plan;
pub mod path_resolver;
pub mod session;
pub mod fuzzy;
pub mod terminal;
pub mod safety;
pub mod search;
pub mod shell;
pub mod undo_log;
pub mod commands;
pub mod substitution;
pub mod executor;
pub mod planner;
pub mod memory;
pub mod suggestions;

// Re-export key types for convenience
pub use plan::{Plan, PlanError, Step};

pub use executor::{
    render_preview, summarize, ExecutionLoop, ExecutionResult, RunReport, RunState,
};

pub use commands::{CommandOutcome, Dispatcher, ErrorKind, Status, Verb};

pub use session::{SessionState, StepOutput};

pub use substitution::{SubstitutionError, PRONOUN_TOKEN};

pub use safety::SafetyGuard;

pub use search::{SearchError, SearchFilters};

pub use fuzzy::{FuzzyMatcher, MatchKind};

pub use terminal::{ScriptedTerminal, StdTerminal, Terminal};

pub use undo_log::{UndoLogEntry, UndoLogError, UndoLogger};

pub use planner::{KeywordPlanner, Planner};

pub use memory::Memory;

pub use suggestions::{suggest_desktop_cleanup, ProactiveSuggestion};

pub use config::{ConfigError, EngineConfig};
