//! Fuzzy name matching for "did you mean" recovery
//!
//! Suggests the closest existing entry when a step names a path that does
//! not exist. Scores are normalized Levenshtein similarity (0.0 - 1.0);
//! anything under the cutoff is not worth suggesting.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::path_resolver;

pub const DEFAULT_CUTOFF: f64 = 0.6;

/// Which entries may be offered as a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchKind {
    /// Only directories (`cd`, `ls`)
    Directory,
    /// Files or directories
    Any,
}

/// A named directory entry offered to the matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub is_dir: bool,
}

impl Candidate {
    pub fn file(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_dir: false }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_dir: true }
    }
}

/// A scored suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    cutoff: f64,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_CUTOFF)
    }
}

impl FuzzyMatcher {
    pub fn new(cutoff: f64) -> Self {
        Self {
            cutoff: cutoff.clamp(0.0, 1.0),
        }
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Best candidate for `missing`, or nothing if none clears the cutoff.
    /// Candidates are considered in name order so ties resolve the same way
    /// on every run regardless of directory listing order.
    pub fn suggest(&self, missing: &str, candidates: &[Candidate], kind: MatchKind) -> Option<Suggestion> {
        let mut eligible: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| kind == MatchKind::Any || c.is_dir)
            .collect();
        eligible.sort_by(|a, b| a.name.cmp(&b.name));

        let mut best: Option<Suggestion> = None;
        for candidate in eligible {
            let score = similarity(missing, &candidate.name);
            if score < self.cutoff {
                continue;
            }
            let better = match &best {
                Some(current) => score > current.score,
                None => true,
            };
            if better {
                best = Some(Suggestion {
                    name: candidate.name.clone(),
                    score,
                });
            }
        }
        best
    }

    /// Plain-string variant used by the search engine
    pub fn best_match(&self, query: &str, candidates: &[String]) -> Option<String> {
        let candidates: Vec<Candidate> = candidates.iter().map(Candidate::file).collect();
        self.suggest(query, &candidates, MatchKind::Any).map(|s| s.name)
    }

    /// Look next to a missing path for a similarly named entry.
    /// Returns the name only; unreadable parents yield nothing.
    pub fn suggest_for_path(&self, missing: &Path, kind: MatchKind) -> Option<String> {
        let (parent, name) = path_resolver::split_parent(missing)?;
        let entries = std::fs::read_dir(&parent).ok()?;

        let candidates: Vec<Candidate> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| Candidate {
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir: entry.path().is_dir(),
            })
            .collect();

        self.suggest(&name, &candidates, kind).map(|s| s.name)
    }

    /// `" Did you mean 'x'?"` hint text for a missing path, or empty
    pub fn hint_for_path(&self, missing: &Path, kind: MatchKind) -> String {
        self.suggest_for_path(missing, kind)
            .map(|name| format!(" Did you mean '{}'?", name))
            .unwrap_or_default()
    }
}

/// Normalized edit similarity in 0.0..=1.0
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}
