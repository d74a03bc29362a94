//! SafetyGuard - dangerous path deny-list and destructive-verb confirmation
//!
//! A dangerous target is always a hard rejection. Destructive verbs are
//! allowed only after an explicit `y` at the terminal.

use std::path::{Path, PathBuf};

use crate::path_resolver;
use crate::terminal::Terminal;
use crate::slog_warn;

/// Verbs that need a yes/no before they run
pub const DESTRUCTIVE_VERBS: &[&str] = &["rm", "mv", "chmod", "chown"];

#[cfg(unix)]
fn builtin_dangerous_paths() -> Vec<PathBuf> {
    ["/", "/etc", "/boot", "/usr"].iter().map(PathBuf::from).collect()
}

#[cfg(windows)]
fn builtin_dangerous_paths() -> Vec<PathBuf> {
    ["C:\\", "C:\\Windows", "C:\\Windows\\System32", "C:\\Program Files"]
        .iter()
        .map(PathBuf::from)
        .collect()
}

#[derive(Debug, Clone)]
pub struct SafetyGuard {
    dangerous: Vec<PathBuf>,
}

impl Default for SafetyGuard {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl SafetyGuard {
    pub fn new(extra_dangerous: Vec<PathBuf>) -> Self {
        let mut dangerous = builtin_dangerous_paths();
        dangerous.extend(extra_dangerous.iter().map(|p| path_resolver::normalize(p)));
        Self { dangerous }
    }

    pub fn dangerous_paths(&self) -> &[PathBuf] {
        &self.dangerous
    }

    /// True when `path` is one of the protected roots (after symlinks are
    /// followed for existing paths). Children of a protected root are not
    /// themselves protected.
    pub fn is_dangerous(&self, path: &Path) -> bool {
        let lexical = path_resolver::normalize(path);
        let real = path_resolver::real_path(path);
        self.dangerous
            .iter()
            .any(|d| *d == lexical || *d == real)
    }

    /// First dangerous path among `paths`, if any
    pub fn first_dangerous<'a>(&self, paths: &'a [PathBuf]) -> Option<&'a PathBuf> {
        paths.iter().find(|p| self.is_dangerous(p))
    }

    pub fn is_destructive(verb: &str) -> bool {
        DESTRUCTIVE_VERBS.contains(&verb)
    }

    /// Ask before running a destructive verb. Non-destructive verbs pass
    /// without a prompt.
    pub fn confirm_destructive(&self, verb: &str, detail: &str, terminal: &mut dyn Terminal) -> bool {
        if !Self::is_destructive(verb) {
            return true;
        }

        terminal.say(&format!(
            "You are about to run a potentially destructive command: '{}'",
            detail.trim()
        ));
        let confirmed = terminal.confirm("Are you sure you want to continue? (y/n): ");
        if !confirmed {
            slog_warn!("SAFETY", "destructive_declined", serde_json::json!({ "verb": verb }));
        }
        confirmed
    }

    /// Dangerous targets named by a raw shell command whose segments start
    /// with a destructive verb (optionally behind `sudo`). Flags are skipped;
    /// every other word is treated as a candidate path.
    pub fn dangerous_shell_targets(&self, command: &str, cwd: &Path) -> Vec<PathBuf> {
        let mut hits = Vec::new();
        for segment in command.split(|c: char| c == ';' || c == '|' || c == '&' || c == '\n') {
            let mut words = segment.split_whitespace().peekable();
            if words.peek() == Some(&"sudo") {
                words.next();
            }
            let Some(verb) = words.next() else { continue };
            if !Self::is_destructive(verb) {
                continue;
            }
            for word in words {
                if word.starts_with('-') {
                    continue;
                }
                let word = word.trim_matches(|c: char| c == '"' || c == '\'');
                let resolved = path_resolver::resolve(word, cwd);
                if self.is_dangerous(&resolved) && !hits.contains(&resolved) {
                    hits.push(resolved);
                }
            }
        }
        hits
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::terminal::ScriptedTerminal;

    #[test]
    fn test_dangerous_roots() {
        let guard = SafetyGuard::default();
        assert!(guard.is_dangerous(Path::new("/")));
        assert!(guard.is_dangerous(Path::new("/etc")));
        assert!(guard.is_dangerous(Path::new("/etc/")));
        assert!(guard.is_dangerous(Path::new("/usr/local/..")));
        assert!(!guard.is_dangerous(Path::new("/etc/hosts")));
        assert!(!guard.is_dangerous(Path::new("/tmp")));
    }

    #[test]
    fn test_extra_paths() {
        let guard = SafetyGuard::new(vec![PathBuf::from("/srv/data")]);
        assert!(guard.is_dangerous(Path::new("/srv/data")));
        assert!(!guard.is_dangerous(Path::new("/srv")));
    }

    #[test]
    fn test_first_dangerous() {
        let guard = SafetyGuard::default();
        let paths = vec![PathBuf::from("/tmp/a"), PathBuf::from("/boot")];
        assert_eq!(guard.first_dangerous(&paths), Some(&PathBuf::from("/boot")));
    }

    #[test]
    fn test_confirm_destructive_only_prompts_for_destructive() {
        let guard = SafetyGuard::default();
        let mut term = ScriptedTerminal::new(Vec::<String>::new());
        assert!(guard.confirm_destructive("ls", "ls", &mut term));
        assert!(term.prompts.is_empty());

        let mut term = ScriptedTerminal::new(["Y"]);
        assert!(guard.confirm_destructive("mv", "mv a b", &mut term));
        assert_eq!(term.prompts.len(), 1);

        let mut term = ScriptedTerminal::new(["yes please"]);
        assert!(!guard.confirm_destructive("chmod", "chmod 777 x", &mut term));
    }

    #[test]
    fn test_dangerous_shell_targets() {
        let guard = SafetyGuard::default();
        let cwd = Path::new("/tmp");

        let hits = guard.dangerous_shell_targets("sudo rm -rf /", cwd);
        assert_eq!(hits, vec![PathBuf::from("/")]);

        let hits = guard.dangerous_shell_targets("echo hi && chown me /etc", cwd);
        assert_eq!(hits, vec![PathBuf::from("/etc")]);

        assert!(guard.dangerous_shell_targets("ls /", cwd).is_empty());
        assert!(guard.dangerous_shell_targets("rm -rf build", cwd).is_empty());
    }
}
