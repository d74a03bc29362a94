//! Proactive suggestions
//!
//! Heuristics that look at the filesystem unprompted and offer a ready-made
//! plan. The plan goes through the normal preview/confirm flow.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::plan::{Plan, Step};
use crate::slog_debug;

pub const SCREENSHOT_PATTERNS: &[&str] = &["Screen Shot *.png", "Screenshot_*.png"];
pub const DEFAULT_SCREENSHOT_THRESHOLD: usize = 5;
const SCREENSHOTS_FOLDER: &str = "Screenshots";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Organizational,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProactiveSuggestion {
    pub kind: SuggestionKind,
    pub title: String,
    pub message: String,
    pub plan: Plan,
}

/// Default desktop location for the current user
pub fn default_desktop() -> PathBuf {
    dirs::desktop_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Desktop")))
        .unwrap_or_else(|| PathBuf::from("Desktop"))
}

/// Screenshots directly inside `desktop`, sorted
pub fn find_screenshots(desktop: &Path) -> Vec<PathBuf> {
    let base = glob::Pattern::escape(&desktop.to_string_lossy());
    let mut found: Vec<PathBuf> = SCREENSHOT_PATTERNS
        .iter()
        .filter_map(|pattern| glob::glob(&format!("{}/{}", base, pattern)).ok())
        .flat_map(|paths| paths.filter_map(Result::ok))
        .filter(|p| p.is_file())
        .collect();
    found.sort();
    found.dedup();
    found
}

/// Offer to move screenshots into a `Screenshots` folder once there are at
/// least `threshold` of them
pub fn suggest_desktop_cleanup(desktop: &Path, threshold: usize) -> Option<ProactiveSuggestion> {
    if !desktop.is_dir() {
        return None;
    }

    let screenshots = find_screenshots(desktop);
    slog_debug!("PLANNER", "desktop_scan", serde_json::json!({
        "desktop": desktop.display().to_string(),
        "screenshots": screenshots.len(),
        "threshold": threshold,
    }));
    if screenshots.is_empty() || screenshots.len() < threshold {
        return None;
    }

    let folder = desktop.join(SCREENSHOTS_FOLDER).display().to_string();
    let mut mv_args: Vec<String> = screenshots.iter().map(|p| p.display().to_string()).collect();
    mv_args.push(folder.clone());

    let mut steps = Vec::new();
    if !desktop.join(SCREENSHOTS_FOLDER).is_dir() {
        steps.push(Step::new(
            "mkdir",
            vec![folder],
            "To create a dedicated folder for screenshots on the Desktop.",
        ));
    }
    steps.push(Step::new(
        "mv",
        mv_args,
        "To move all detected screenshots into the new folder.",
    ));

    Some(ProactiveSuggestion {
        kind: SuggestionKind::Organizational,
        title: "Desktop Cleanup Suggestion".to_string(),
        message: format!(
            "You have {} screenshots on your Desktop. Would you like to move them to a '{}' folder?",
            screenshots.len(),
            SCREENSHOTS_FOLDER
        ),
        plan: Plan::new(
            vec![
                "The user wants to organize their desktop.".to_string(),
                format!(
                    "A '{}' folder will be created on the Desktop if it doesn't exist.",
                    SCREENSHOTS_FOLDER
                ),
            ],
            steps,
        ),
    })
}
