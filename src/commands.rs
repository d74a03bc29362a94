//! CommandDispatch - the closed set of verbs a plan step may invoke
//!
//! Every handler reports through a structured `CommandOutcome`; success or
//! failure is decided by the handler, never read back out of message text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use walkdir::WalkDir;

use crate::config::EngineConfig;
use crate::fuzzy::{FuzzyMatcher, MatchKind};
use crate::path_resolver::real_path;
use crate::safety::SafetyGuard;
use crate::search::{self, SearchError, SearchFilters};
use crate::session::SessionState;
use crate::shell::{self, ShellOpts};
use crate::terminal::Terminal;
use crate::slog_info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    Ls,
    Cd,
    Pwd,
    Mkdir,
    Touch,
    Cp,
    Mv,
    Rm,
    FindFiles,
    SearchInFiles,
    ExecuteBash,
}

impl Verb {
    pub const ALL: [Verb; 11] = [
        Verb::Ls,
        Verb::Cd,
        Verb::Pwd,
        Verb::Mkdir,
        Verb::Touch,
        Verb::Cp,
        Verb::Mv,
        Verb::Rm,
        Verb::FindFiles,
        Verb::SearchInFiles,
        Verb::ExecuteBash,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Verb::Ls => "ls",
            Verb::Cd => "cd",
            Verb::Pwd => "pwd",
            Verb::Mkdir => "mkdir",
            Verb::Touch => "touch",
            Verb::Cp => "cp",
            Verb::Mv => "mv",
            Verb::Rm => "rm",
            Verb::FindFiles => "find_files",
            Verb::SearchInFiles => "search_in_files",
            Verb::ExecuteBash => "execute_bash",
        }
    }

    pub fn parse(name: &str) -> Option<Verb> {
        Verb::ALL.iter().copied().find(|v| v.name() == name.trim())
    }

    /// Verbs whose arguments are plain paths (used for recovery hints)
    pub fn takes_paths(&self) -> bool {
        !matches!(self, Verb::Pwd | Verb::FindFiles | Verb::SearchInFiles | Verb::ExecuteBash)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Error => "error",
        }
    }
}

/// Why a step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    InvalidArgument,
    UnknownCommand,
    UserCancelled,
    SubstitutionError,
    PartialFailure,
    AlreadyExists,
    DangerousPath,
    ShellFailure,
    Critical,
    Io,
}

impl ErrorKind {
    pub fn from_io(e: &io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
            _ => ErrorKind::Io,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub status: Status,
    pub kind: Option<ErrorKind>,
    pub output: String,
    /// File enumeration produced by this command, if it produces one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

impl CommandOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            kind: None,
            output: output.into(),
            files: None,
        }
    }

    pub fn file_list(output: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            status: Status::Success,
            kind: None,
            output: output.into(),
            files: Some(files),
        }
    }

    pub fn error(kind: ErrorKind, output: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            kind: Some(kind),
            output: output.into(),
            files: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Per-item results for multi-target verbs (cp, mv, rm)
#[derive(Debug, Default)]
struct ItemReport {
    successes: usize,
    errors: Vec<String>,
    first_error_kind: Option<ErrorKind>,
}

impl ItemReport {
    fn ok(&mut self) {
        self.successes += 1;
    }

    fn fail(&mut self, kind: ErrorKind, message: String) {
        self.first_error_kind.get_or_insert(kind);
        self.errors.push(message);
    }

    /// One outcome for the whole step; any item error makes it an error
    fn into_outcome(self, success_line: String, nothing_done: &str) -> CommandOutcome {
        let mut output = Vec::new();
        if self.successes > 0 {
            output.push(success_line);
        }
        if !self.errors.is_empty() {
            output.push(format!("Errors occurred:\n{}", self.errors.join("\n")));
        }
        let text = if output.is_empty() {
            nothing_done.to_string()
        } else {
            output.join("\n")
        };

        if self.errors.is_empty() {
            CommandOutcome::success(text)
        } else if self.successes > 0 {
            CommandOutcome::error(ErrorKind::PartialFailure, text)
        } else {
            CommandOutcome::error(self.first_error_kind.unwrap_or(ErrorKind::Io), text)
        }
    }
}

/// Executes verbs against a session. Holds the collaborators every handler
/// may need; per-run state lives in `SessionState`.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    guard: SafetyGuard,
    matcher: FuzzyMatcher,
    shell: String,
    shell_timeout_ms: u64,
    confirm_shell: bool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl Dispatcher {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            guard: SafetyGuard::new(config.extra_dangerous_paths.clone()),
            matcher: FuzzyMatcher::new(config.fuzzy_cutoff),
            shell: config.shell.clone(),
            shell_timeout_ms: config.shell_timeout_ms,
            confirm_shell: config.confirm_shell,
        }
    }

    pub fn matcher(&self) -> &FuzzyMatcher {
        &self.matcher
    }

    pub fn guard(&self) -> &SafetyGuard {
        &self.guard
    }

    /// Dispatch by name; unknown names never execute anything
    pub async fn dispatch_named(
        &self,
        name: &str,
        args: &[String],
        options: &BTreeMap<String, String>,
        session: &mut SessionState,
        terminal: &mut dyn Terminal,
    ) -> CommandOutcome {
        match Verb::parse(name) {
            Some(verb) => self.dispatch(verb, args, options, session, terminal).await,
            None => CommandOutcome::error(
                ErrorKind::UnknownCommand,
                format!("Unknown command: '{}'.", name),
            ),
        }
    }

    pub async fn dispatch(
        &self,
        verb: Verb,
        args: &[String],
        options: &BTreeMap<String, String>,
        session: &mut SessionState,
        terminal: &mut dyn Terminal,
    ) -> CommandOutcome {
        slog_info!("DISPATCH", "dispatch", serde_json::json!({
            "verb": verb.name(),
            "args": args,
            "cwd": session.cwd_string(),
        }));

        match verb {
            Verb::Ls => self.ls(args, session).await,
            Verb::Cd => self.cd(args, session).await,
            Verb::Pwd => CommandOutcome::success(format!("Current directory: {}", session.cwd_string())),
            Verb::Mkdir => self.mkdir(args, session).await,
            Verb::Touch => self.touch(args, session).await,
            Verb::Cp => self.cp(args, session).await,
            Verb::Mv => self.mv(args, session, terminal).await,
            Verb::Rm => self.rm(args, session, terminal).await,
            Verb::FindFiles => self.find_files(args, options, session),
            Verb::SearchInFiles => self.search_in_files(args, session),
            Verb::ExecuteBash => self.execute_bash(args, session, terminal).await,
        }
    }

    fn hint(&self, path: &Path, kind: MatchKind) -> String {
        self.matcher.hint_for_path(path, kind)
    }

    fn reject_dangerous(&self, paths: &[PathBuf]) -> Option<CommandOutcome> {
        self.guard.first_dangerous(paths).map(|p| {
            CommandOutcome::error(
                ErrorKind::DangerousPath,
                format!("Error: Operation on dangerous path '{}' is not allowed.", p.display()),
            )
        })
    }

    fn dir_not_found(&self, path: &Path) -> CommandOutcome {
        CommandOutcome::error(
            ErrorKind::NotFound,
            format!(
                "Error: Directory not found at '{}'.{}",
                path.display(),
                self.hint(path, MatchKind::Directory)
            ),
        )
    }

    async fn ls(&self, args: &[String], session: &SessionState) -> CommandOutcome {
        let path = match args.first() {
            Some(raw) => session.resolve(raw),
            None => session.working_directory().to_path_buf(),
        };
        if !path.is_dir() {
            return self.dir_not_found(&path);
        }

        let mut entries = match fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) => {
                return CommandOutcome::error(
                    ErrorKind::from_io(&e),
                    format!("Error listing directory '{}': {}", path.display(), e),
                )
            }
        };

        let mut items = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name().to_string_lossy().to_string();
                    if entry.path().is_dir() {
                        items.push(format!("{}/", name));
                    } else {
                        items.push(name);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    return CommandOutcome::error(
                        ErrorKind::from_io(&e),
                        format!("Error listing directory '{}': {}", path.display(), e),
                    )
                }
            }
        }
        items.sort();

        CommandOutcome::success(format!("Contents of '{}':\n{}", path.display(), items.join("\n")))
    }

    async fn cd(&self, args: &[String], session: &mut SessionState) -> CommandOutcome {
        let Some(raw) = args.first() else {
            return CommandOutcome::error(
                ErrorKind::InvalidArgument,
                "Error: 'cd' requires a destination directory.",
            );
        };
        let path = session.resolve(raw);
        if !path.is_dir() {
            return self.dir_not_found(&path);
        }

        match session.change_directory(&path).await {
            Ok(cwd) => CommandOutcome::success(format!("Current directory is now: {}", cwd.display())),
            Err(e) => CommandOutcome::error(
                ErrorKind::from_io(&e),
                format!("Error changing directory to '{}': {}", path.display(), e),
            ),
        }
    }

    async fn mkdir(&self, args: &[String], session: &SessionState) -> CommandOutcome {
        let Some(raw) = args.first() else {
            return CommandOutcome::error(
                ErrorKind::InvalidArgument,
                "Error: 'mkdir' requires a directory name.",
            );
        };
        let path = session.resolve(raw);
        if let Some(rejected) = self.reject_dangerous(std::slice::from_ref(&path)) {
            return rejected;
        }

        if path.is_dir() {
            return CommandOutcome::error(
                ErrorKind::AlreadyExists,
                format!("Directory already exists: '{}'", path.display()),
            );
        }
        if path.exists() {
            return CommandOutcome::error(
                ErrorKind::AlreadyExists,
                format!("Error: '{}' exists and is not a directory.", path.display()),
            );
        }

        match fs::create_dir_all(&path).await {
            Ok(()) => CommandOutcome::success(format!("Directory created: '{}'", path.display())),
            Err(e) => CommandOutcome::error(
                ErrorKind::from_io(&e),
                format!("Error creating directory '{}': {}", path.display(), e),
            ),
        }
    }

    async fn touch(&self, args: &[String], session: &SessionState) -> CommandOutcome {
        let Some(raw) = args.first() else {
            return CommandOutcome::error(
                ErrorKind::InvalidArgument,
                "Error: 'touch' requires a filename.",
            );
        };
        let path = session.resolve(raw);
        if let Some(rejected) = self.reject_dangerous(std::slice::from_ref(&path)) {
            return rejected;
        }

        match touch_file(&path).await {
            Ok(()) => CommandOutcome::success(format!("File created or updated: '{}'", path.display())),
            Err(e) => CommandOutcome::error(
                ErrorKind::from_io(&e),
                format!("Error touching file '{}': {}", path.display(), e),
            ),
        }
    }

    /// Shared validation for cp/mv: (sources, destination) or a failure
    fn sources_and_dest(
        &self,
        verb: Verb,
        args: &[String],
        session: &SessionState,
    ) -> Result<(Vec<PathBuf>, PathBuf), CommandOutcome> {
        let Some((dest, sources)) = args.split_last().filter(|(_, s)| !s.is_empty()) else {
            return Err(CommandOutcome::error(
                ErrorKind::InvalidArgument,
                format!("Error: '{}' requires at least one source and a destination.", verb),
            ));
        };
        let dest = session.resolve(dest);
        let sources: Vec<PathBuf> = sources.iter().map(|s| session.resolve(s)).collect();

        let mut all = sources.clone();
        all.push(dest.clone());
        if let Some(rejected) = self.reject_dangerous(&all) {
            return Err(rejected);
        }

        if sources.len() > 1 && !dest.is_dir() {
            let action = if verb == Verb::Cp { "copying" } else { "moving" };
            return Err(CommandOutcome::error(
                ErrorKind::InvalidArgument,
                format!(
                    "Error: Destination '{}' is not a directory, which is required for {} multiple items.",
                    dest.display(),
                    action
                ),
            ));
        }
        Ok((sources, dest))
    }

    async fn cp(&self, args: &[String], session: &SessionState) -> CommandOutcome {
        let (sources, dest) = match self.sources_and_dest(Verb::Cp, args, session) {
            Ok(v) => v,
            Err(outcome) => return outcome,
        };

        let mut report = ItemReport::default();
        for src in &sources {
            if fs::symlink_metadata(src).await.is_err() {
                report.fail(
                    ErrorKind::NotFound,
                    format!("Source '{}' not found.{}", src.display(), self.hint(src, MatchKind::Any)),
                );
                continue;
            }
            let target = target_for(src, &dest);
            if is_same_file(src, &target) {
                report.fail(ErrorKind::InvalidArgument, same_file_message(src, &target));
                continue;
            }
            let result = if src.is_dir() {
                copy_tree(src, &target)
            } else {
                fs::copy(src, &target).await.map(|_| ())
            };
            match result {
                Ok(()) => report.ok(),
                Err(e) => report.fail(
                    ErrorKind::from_io(&e),
                    format!("Failed to copy '{}': {}", src.display(), e),
                ),
            }
        }

        let line = format!("Successfully copied {} item(s) to '{}'.", report.successes, dest.display());
        report.into_outcome(line, "No items were copied.")
    }

    async fn mv(&self, args: &[String], session: &SessionState, terminal: &mut dyn Terminal) -> CommandOutcome {
        let (sources, dest) = match self.sources_and_dest(Verb::Mv, args, session) {
            Ok(v) => v,
            Err(outcome) => return outcome,
        };

        let detail = format!("mv {}", args.join(" "));
        if !self.guard.confirm_destructive(Verb::Mv.name(), &detail, terminal) {
            return CommandOutcome::error(
                ErrorKind::UserCancelled,
                format!("Move of {} item(s) cancelled.", sources.len()),
            );
        }

        let mut report = ItemReport::default();
        for src in &sources {
            if fs::symlink_metadata(src).await.is_err() {
                report.fail(
                    ErrorKind::NotFound,
                    format!("Source '{}' not found.{}", src.display(), self.hint(src, MatchKind::Any)),
                );
                continue;
            }
            let target = target_for(src, &dest);
            if is_same_file(src, &target) {
                report.fail(ErrorKind::InvalidArgument, same_file_message(src, &target));
                continue;
            }
            match move_path(src, &target).await {
                Ok(()) => report.ok(),
                Err(e) => report.fail(
                    ErrorKind::from_io(&e),
                    format!("Failed to move '{}': {}", src.display(), e),
                ),
            }
        }

        let line = format!("Successfully moved {} item(s) to '{}'.", report.successes, dest.display());
        report.into_outcome(line, "No items were moved.")
    }

    async fn rm(&self, args: &[String], session: &SessionState, terminal: &mut dyn Terminal) -> CommandOutcome {
        if args.is_empty() {
            return CommandOutcome::error(
                ErrorKind::InvalidArgument,
                "Error: 'rm' requires at least one target path.",
            );
        }
        let paths: Vec<PathBuf> = args.iter().map(|a| session.resolve(a)).collect();
        if let Some(rejected) = self.reject_dangerous(&paths) {
            return rejected;
        }

        let mut report = ItemReport::default();
        let mut existing = Vec::new();
        for path in paths {
            if fs::symlink_metadata(&path).await.is_ok() {
                if !existing.contains(&path) {
                    existing.push(path);
                }
            } else {
                report.fail(
                    ErrorKind::NotFound,
                    format!("Path '{}' not found.{}", path.display(), self.hint(&path, MatchKind::Any)),
                );
            }
        }

        if existing.is_empty() {
            return report.into_outcome(String::new(), "No items were removed.");
        }

        let listing = existing
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!("Are you sure you want to permanently delete:\n{}\n(y/n): ", listing);
        if !terminal.confirm(&prompt) {
            return CommandOutcome::error(
                ErrorKind::UserCancelled,
                format!("Deletion of {} item(s) cancelled.", existing.len()),
            );
        }

        for path in &existing {
            match remove_path(path).await {
                Ok(()) => report.ok(),
                Err(e) => report.fail(
                    ErrorKind::from_io(&e),
                    format!("Error removing '{}': {}", path.display(), e),
                ),
            }
        }

        let line = format!("Successfully removed {} item(s).", report.successes);
        report.into_outcome(line, "No items were removed.")
    }

    fn find_files(&self, args: &[String], options: &BTreeMap<String, String>, session: &SessionState) -> CommandOutcome {
        let Some(pattern) = args.first() else {
            return CommandOutcome::error(
                ErrorKind::InvalidArgument,
                "Error: 'find_files' requires at least a name pattern.",
            );
        };
        let root = match args.get(1) {
            Some(raw) => session.resolve(raw),
            None => session.working_directory().to_path_buf(),
        };
        let filters = match SearchFilters::from_options(options) {
            Ok(f) => f,
            Err(e) => return CommandOutcome::error(ErrorKind::InvalidArgument, format!("Error: {}", e)),
        };

        match search::find_files(pattern, &root, &filters) {
            Ok(matches) if matches.is_empty() => {
                let mut text = format!("No files found matching '{}' in '{}'", pattern, root.display());
                if !options.is_empty() {
                    let described = options
                        .iter()
                        .map(|(k, v)| format!("{}='{}'", k, v))
                        .collect::<Vec<_>>()
                        .join(", ");
                    text.push_str(&format!(" with filters: {}", described));
                }
                text.push('.');
                CommandOutcome::file_list(text, matches)
            }
            Ok(matches) => CommandOutcome::file_list(format!("Found files:\n{}", matches.join("\n")), matches),
            Err(e) => self.search_failure(&root, e),
        }
    }

    fn search_in_files(&self, args: &[String], session: &SessionState) -> CommandOutcome {
        let Some(pattern) = args.first() else {
            return CommandOutcome::error(
                ErrorKind::InvalidArgument,
                "Error: 'search_in_files' requires a content pattern.",
            );
        };
        let root = match args.get(1) {
            Some(raw) => session.resolve(raw),
            None => session.working_directory().to_path_buf(),
        };

        match search::search_in_files(pattern, &root) {
            Ok(matches) if matches.is_empty() => CommandOutcome::success(format!(
                "No content matching '{}' found in files in '{}'.",
                pattern,
                root.display()
            )),
            Ok(matches) => CommandOutcome::success(format!("Found content:\n{}", matches.join("\n"))),
            Err(e) => self.search_failure(&root, e),
        }
    }

    fn search_failure(&self, root: &Path, e: SearchError) -> CommandOutcome {
        match e {
            SearchError::RootNotFound(_) => self.dir_not_found(root),
            other => CommandOutcome::error(ErrorKind::InvalidArgument, format!("Error: {}", other)),
        }
    }

    async fn execute_bash(&self, args: &[String], session: &SessionState, terminal: &mut dyn Terminal) -> CommandOutcome {
        let command = args.join(" ");
        if command.trim().is_empty() {
            return CommandOutcome::error(
                ErrorKind::InvalidArgument,
                "Error: 'execute_bash' requires a command to run.",
            );
        }

        let targets = self.guard.dangerous_shell_targets(&command, session.working_directory());
        if let Some(rejected) = self.reject_dangerous(&targets) {
            return rejected;
        }

        if self.confirm_shell {
            terminal.say(&format!("You are about to run a shell command: '{}'", command));
            if !terminal.confirm("Are you sure you want to continue? (y/n): ") {
                return CommandOutcome::error(
                    ErrorKind::UserCancelled,
                    format!("Shell command cancelled: '{}'", command),
                );
            }
        }

        let opts = ShellOpts {
            shell: self.shell.clone(),
            cwd: session.working_directory().to_path_buf(),
            timeout_ms: self.shell_timeout_ms,
        };
        let result = shell::run_shell(&command, &opts).await;

        if result.success() {
            return CommandOutcome::success(result.stdout.trim().to_string());
        }
        match (&result.error, result.timed_out) {
            (Some(err), true) => CommandOutcome::error(
                ErrorKind::ShellFailure,
                format!("Error executing command '{}': {}", command, err),
            ),
            (Some(err), false) => CommandOutcome::error(
                ErrorKind::ShellFailure,
                format!("Failed to execute bash command '{}': {}", command, err),
            ),
            (None, _) => CommandOutcome::error(
                ErrorKind::ShellFailure,
                format!("Error executing command '{}':\n{}", command, result.combined_output()),
            ),
        }
    }
}

/// Where `src` lands when copied or moved to `dest`
fn target_for(src: &Path, dest: &Path) -> PathBuf {
    match src.file_name() {
        Some(name) if dest.is_dir() => dest.join(name),
        _ => dest.to_path_buf(),
    }
}

/// Source and target name the same existing entry (`cp a.txt .` inside its own dir)
fn is_same_file(src: &Path, target: &Path) -> bool {
    target.exists() && real_path(src) == real_path(target)
}

fn same_file_message(src: &Path, target: &Path) -> String {
    format!("'{}' and '{}' are the same file.", src.display(), target.display())
}

async fn touch_file(path: &Path) -> io::Result<()> {
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let file = file.into_std().await;
    file.set_modified(SystemTime::now())
}

/// Recursive directory copy; refuses to copy a directory into itself
fn copy_tree(src: &Path, target: &Path) -> io::Result<()> {
    if target.starts_with(src) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "cannot copy a directory into itself",
        ));
    }
    if target.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("destination '{}' already exists", target.display()),
        ));
    }

    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let destination = target.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&destination)?;
        } else {
            std::fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn is_cross_device(e: &io::Error) -> bool {
    // EXDEV
    e.raw_os_error() == Some(18)
}

#[cfg(not(unix))]
fn is_cross_device(_e: &io::Error) -> bool {
    false
}

async fn move_path(src: &Path, target: &Path) -> io::Result<()> {
    match fs::rename(src, target).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            if src.is_dir() {
                copy_tree(src, target)?;
                fs::remove_dir_all(src).await
            } else {
                fs::copy(src, target).await?;
                fs::remove_file(src).await
            }
        }
        Err(e) => Err(e),
    }
}

async fn remove_path(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path).await?;
    if metadata.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::ScriptedTerminal;

    fn setup() -> (tempfile::TempDir, SessionState, Dispatcher) {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionState::new(Some(dir.path().to_path_buf()));
        let mut config = EngineConfig::default();
        config.confirm_shell = false;
        (dir, session, Dispatcher::from_config(&config))
    }

    fn s(items: &[&str]) -> Vec<String> {
        items.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_verb_names_round_trip() {
        for verb in Verb::ALL {
            assert_eq!(Verb::parse(verb.name()), Some(verb));
        }
        assert_eq!(Verb::parse("echo"), None);
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (_dir, mut session, dispatcher) = setup();
        let mut term = ScriptedTerminal::default();
        let outcome = dispatcher
            .dispatch_named("format_disk", &[], &BTreeMap::new(), &mut session, &mut term)
            .await;
        assert_eq!(outcome.kind, Some(ErrorKind::UnknownCommand));
        assert_eq!(outcome.output, "Unknown command: 'format_disk'.");
    }

    #[tokio::test]
    async fn test_ls_marks_directories() {
        let (dir, mut session, dispatcher) = setup();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        let mut term = ScriptedTerminal::default();

        let outcome = dispatcher.dispatch(Verb::Ls, &[], &BTreeMap::new(), &mut session, &mut term).await;
        assert!(outcome.is_success());
        let lines: Vec<&str> = outcome.output.lines().skip(1).collect();
        assert_eq!(lines, vec!["a.txt", "sub/"]);
    }

    #[tokio::test]
    async fn test_ls_missing_suggests_directory() {
        let (dir, mut session, dispatcher) = setup();
        std::fs::create_dir(dir.path().join("Documents")).unwrap();
        let mut term = ScriptedTerminal::default();

        let outcome = dispatcher
            .dispatch(Verb::Ls, &s(&["Documnts"]), &BTreeMap::new(), &mut session, &mut term)
            .await;
        assert_eq!(outcome.kind, Some(ErrorKind::NotFound));
        assert!(outcome.output.starts_with("Error: Directory not found at"));
        assert!(outcome.output.ends_with("Did you mean 'Documents'?"));
    }

    #[tokio::test]
    async fn test_cd_and_pwd() {
        let (dir, mut session, dispatcher) = setup();
        std::fs::create_dir(dir.path().join("inner")).unwrap();
        let mut term = ScriptedTerminal::default();

        let outcome = dispatcher.dispatch(Verb::Cd, &s(&["inner"]), &BTreeMap::new(), &mut session, &mut term).await;
        assert!(outcome.is_success(), "{}", outcome.output);
        assert!(session.working_directory().ends_with("inner"));

        let pwd = dispatcher.dispatch(Verb::Pwd, &[], &BTreeMap::new(), &mut session, &mut term).await;
        assert!(pwd.output.ends_with("inner"));

        let missing = dispatcher.dispatch(Verb::Cd, &s(&["nowhere"]), &BTreeMap::new(), &mut session, &mut term).await;
        assert_eq!(missing.kind, Some(ErrorKind::NotFound));
        assert!(session.working_directory().ends_with("inner"));

        let no_arg = dispatcher.dispatch(Verb::Cd, &[], &BTreeMap::new(), &mut session, &mut term).await;
        assert_eq!(no_arg.kind, Some(ErrorKind::InvalidArgument));
    }

    #[tokio::test]
    async fn test_mkdir_existing_is_distinct() {
        let (_dir, mut session, dispatcher) = setup();
        let mut term = ScriptedTerminal::default();

        let first = dispatcher.dispatch(Verb::Mkdir, &s(&["new"]), &BTreeMap::new(), &mut session, &mut term).await;
        assert!(first.is_success());
        let second = dispatcher.dispatch(Verb::Mkdir, &s(&["new"]), &BTreeMap::new(), &mut session, &mut term).await;
        assert_eq!(second.kind, Some(ErrorKind::AlreadyExists));
        assert!(second.output.starts_with("Directory already exists"));
    }

    #[tokio::test]
    async fn test_dangerous_targets_rejected() {
        let (_dir, mut session, dispatcher) = setup();
        let mut term = ScriptedTerminal::new(["y", "y"]);

        let rm = dispatcher.dispatch(Verb::Rm, &s(&["/etc"]), &BTreeMap::new(), &mut session, &mut term).await;
        assert_eq!(rm.kind, Some(ErrorKind::DangerousPath));
        let touch = dispatcher.dispatch(Verb::Touch, &s(&["/"]), &BTreeMap::new(), &mut session, &mut term).await;
        assert_eq!(touch.kind, Some(ErrorKind::DangerousPath));
        assert!(term.prompts.is_empty());
    }

    #[tokio::test]
    async fn test_cp_partial_failure() {
        let (dir, mut session, dispatcher) = setup();
        std::fs::create_dir(dir.path().join("dest")).unwrap();
        std::fs::write(dir.path().join("one.txt"), "1").unwrap();
        let mut term = ScriptedTerminal::default();

        let outcome = dispatcher
            .dispatch(Verb::Cp, &s(&["one.txt", "ghost.txt", "dest"]), &BTreeMap::new(), &mut session, &mut term)
            .await;
        assert_eq!(outcome.kind, Some(ErrorKind::PartialFailure));
        assert!(outcome.output.contains("Successfully copied 1 item(s)"));
        assert!(outcome.output.contains("Source '"));
        assert!(dir.path().join("dest/one.txt").exists());
    }

    #[tokio::test]
    async fn test_cp_directory_tree() {
        let (dir, mut session, dispatcher) = setup();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::write(dir.path().join("src/nested/file.txt"), "data").unwrap();
        std::fs::create_dir(dir.path().join("backup")).unwrap();
        let mut term = ScriptedTerminal::default();

        let outcome = dispatcher
            .dispatch(Verb::Cp, &s(&["src", "backup"]), &BTreeMap::new(), &mut session, &mut term)
            .await;
        assert!(outcome.is_success(), "{}", outcome.output);
        let copied = std::fs::read_to_string(dir.path().join("backup/src/nested/file.txt")).unwrap();
        assert_eq!(copied, "data");
    }

    #[tokio::test]
    async fn test_cp_multi_source_requires_directory() {
        let (dir, mut session, dispatcher) = setup();
        std::fs::write(dir.path().join("a"), "").unwrap();
        std::fs::write(dir.path().join("b"), "").unwrap();
        let mut term = ScriptedTerminal::default();

        let outcome = dispatcher
            .dispatch(Verb::Cp, &s(&["a", "b", "not_a_dir"]), &BTreeMap::new(), &mut session, &mut term)
            .await;
        assert_eq!(outcome.kind, Some(ErrorKind::InvalidArgument));

        let too_few = dispatcher.dispatch(Verb::Cp, &s(&["a"]), &BTreeMap::new(), &mut session, &mut term).await;
        assert_eq!(too_few.kind, Some(ErrorKind::InvalidArgument));
    }

    #[tokio::test]
    async fn test_cp_onto_itself_keeps_content() {
        let (dir, mut session, dispatcher) = setup();
        std::fs::write(dir.path().join("a.txt"), "precious data").unwrap();
        let mut term = ScriptedTerminal::default();

        let outcome = dispatcher
            .dispatch(Verb::Cp, &s(&["a.txt", "."]), &BTreeMap::new(), &mut session, &mut term)
            .await;
        assert_eq!(outcome.kind, Some(ErrorKind::InvalidArgument));
        assert!(outcome.output.contains("are the same file"), "{}", outcome.output);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "precious data");

        let explicit = dispatcher
            .dispatch(Verb::Cp, &s(&["a.txt", "./a.txt"]), &BTreeMap::new(), &mut session, &mut term)
            .await;
        assert_eq!(explicit.kind, Some(ErrorKind::InvalidArgument));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "precious data");
    }

    #[tokio::test]
    async fn test_mv_onto_itself_is_rejected() {
        let (dir, mut session, dispatcher) = setup();
        std::fs::write(dir.path().join("a.txt"), "keep").unwrap();
        let mut term = ScriptedTerminal::new(["y"]);

        let outcome = dispatcher
            .dispatch(Verb::Mv, &s(&["a.txt", "."]), &BTreeMap::new(), &mut session, &mut term)
            .await;
        assert_eq!(outcome.kind, Some(ErrorKind::InvalidArgument));
        assert!(outcome.output.contains("are the same file"), "{}", outcome.output);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "keep");
    }

    #[tokio::test]
    async fn test_mv_requires_confirmation() {
        let (dir, mut session, dispatcher) = setup();
        std::fs::write(dir.path().join("old.txt"), "x").unwrap();

        let mut decline = ScriptedTerminal::new(["n"]);
        let outcome = dispatcher
            .dispatch(Verb::Mv, &s(&["old.txt", "new.txt"]), &BTreeMap::new(), &mut session, &mut decline)
            .await;
        assert_eq!(outcome.kind, Some(ErrorKind::UserCancelled));
        assert!(dir.path().join("old.txt").exists());

        let mut accept = ScriptedTerminal::new(["y"]);
        let outcome = dispatcher
            .dispatch(Verb::Mv, &s(&["old.txt", "new.txt"]), &BTreeMap::new(), &mut session, &mut accept)
            .await;
        assert!(outcome.is_success(), "{}", outcome.output);
        assert!(dir.path().join("new.txt").exists());
        assert!(!dir.path().join("old.txt").exists());
    }

    #[tokio::test]
    async fn test_rm_lists_paths_and_respects_decline() {
        let (dir, mut session, dispatcher) = setup();
        std::fs::write(dir.path().join("keep.txt"), "").unwrap();
        std::fs::create_dir_all(dir.path().join("tree/inner")).unwrap();

        let mut decline = ScriptedTerminal::new(["no"]);
        let outcome = dispatcher
            .dispatch(Verb::Rm, &s(&["keep.txt", "tree"]), &BTreeMap::new(), &mut session, &mut decline)
            .await;
        assert_eq!(outcome.kind, Some(ErrorKind::UserCancelled));
        assert!(dir.path().join("keep.txt").exists());
        let prompt = &decline.prompts[0];
        assert!(prompt.contains(&session.resolve("keep.txt").display().to_string()));
        assert!(prompt.contains(&session.resolve("tree").display().to_string()));

        let mut accept = ScriptedTerminal::new(["y"]);
        let outcome = dispatcher
            .dispatch(Verb::Rm, &s(&["keep.txt", "tree"]), &BTreeMap::new(), &mut session, &mut accept)
            .await;
        assert!(outcome.is_success());
        assert!(!dir.path().join("tree").exists());
    }

    #[tokio::test]
    async fn test_rm_all_missing_never_prompts() {
        let (_dir, mut session, dispatcher) = setup();
        let mut term = ScriptedTerminal::default();
        let outcome = dispatcher.dispatch(Verb::Rm, &s(&["ghost"]), &BTreeMap::new(), &mut session, &mut term).await;
        assert_eq!(outcome.kind, Some(ErrorKind::NotFound));
        assert!(term.prompts.is_empty());
    }

    #[tokio::test]
    async fn test_find_files_invalid_filter() {
        let (_dir, mut session, dispatcher) = setup();
        let mut term = ScriptedTerminal::default();
        let mut options = BTreeMap::new();
        options.insert("size".to_string(), "huge".to_string());

        let outcome = dispatcher.dispatch(Verb::FindFiles, &s(&["*"]), &options, &mut session, &mut term).await;
        assert_eq!(outcome.kind, Some(ErrorKind::InvalidArgument));

        let mut options = BTreeMap::new();
        options.insert("modified".to_string(), ">1000000000d".to_string());
        let outcome = dispatcher.dispatch(Verb::FindFiles, &s(&["*"]), &options, &mut session, &mut term).await;
        assert_eq!(outcome.kind, Some(ErrorKind::InvalidArgument));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_bash_runs_in_session_dir() {
        let (dir, mut session, dispatcher) = setup();
        std::fs::write(dir.path().join("here.txt"), "").unwrap();
        let mut term = ScriptedTerminal::default();

        let outcome = dispatcher.dispatch(Verb::ExecuteBash, &s(&["ls"]), &BTreeMap::new(), &mut session, &mut term).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.output, "here.txt");

        let failing = dispatcher
            .dispatch(Verb::ExecuteBash, &s(&["echo", "oops", "1>&2;", "exit", "1"]), &BTreeMap::new(), &mut session, &mut term)
            .await;
        assert_eq!(failing.kind, Some(ErrorKind::ShellFailure));
        assert!(failing.output.ends_with("oops"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_bash_confirmation_gate() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = SessionState::new(Some(dir.path().to_path_buf()));
        let dispatcher = Dispatcher::default();
        let mut term = ScriptedTerminal::new(["n"]);

        let outcome = dispatcher
            .dispatch(Verb::ExecuteBash, &s(&["touch", "made.txt"]), &BTreeMap::new(), &mut session, &mut term)
            .await;
        assert_eq!(outcome.kind, Some(ErrorKind::UserCancelled));
        assert!(!dir.path().join("made.txt").exists());

        let rejected = dispatcher
            .dispatch(Verb::ExecuteBash, &s(&["rm", "-rf", "/"]), &BTreeMap::new(), &mut session, &mut term)
            .await;
        assert_eq!(rejected.kind, Some(ErrorKind::DangerousPath));
    }
}
