//! SearchEngine - name and content search over a directory tree
//!
//! - find_files: shell-glob on file names, optional size/modified/type filters
//! - search_in_files: all keywords must appear somewhere in a file
//! - best_match: fuzzy lookup shared with error recovery
//!
//! Entries that disappear or cannot be read mid-walk are skipped, never fatal.

use chrono::{DateTime, Duration, Local};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::fuzzy::FuzzyMatcher;
use crate::slog_debug;

/// Extensions never scanned by content search
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "heic", "pdf", "zip", "gz",
    "tgz", "bz2", "xz", "7z", "rar", "tar", "exe", "dll", "so", "dylib", "bin", "o", "a",
    "class", "jar", "pyc", "mp3", "wav", "flac", "ogg", "mp4", "mov", "avi", "mkv", "webm",
    "woff", "woff2", "ttf", "otf", "sqlite", "db", "iso", "dmg",
];

lazy_static::lazy_static! {
    static ref SIZE_FILTER: Regex =
        Regex::new(r"(?i)^\s*([<>=])\s*(\d+(?:\.\d+)?)\s*(B|KB|MB|GB|TB)?\s*$").unwrap();
    static ref AGE_FILTER: Regex = Regex::new(r"(?i)^\s*([<>=])\s*(\d+)\s*([dwmy])\s*$").unwrap();
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search root '{0}' does not exist")]
    RootNotFound(String),
    #[error("Invalid name pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("Invalid size filter '{0}' (expected e.g. '>500KB', '<2MB', '=10B')")]
    InvalidSize(String),
    #[error("Invalid modified filter '{0}' (expected e.g. '<7d', '>2w', '>1y')")]
    InvalidAge(String),
    #[error("Unknown file type '{0}' (known: images, documents, spreadsheets, archives, audio, video, logs)")]
    UnknownFileType(String),
    #[error("Unknown filter option '{0}' (known: size, modified, file_type)")]
    UnknownOption(String),
    #[error("Search pattern must not be empty")]
    EmptyPattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Greater,
    Less,
    Equal,
}

impl Comparison {
    fn parse(op: &str) -> Option<Self> {
        match op {
            ">" => Some(Comparison::Greater),
            "<" => Some(Comparison::Less),
            "=" => Some(Comparison::Equal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeFilter {
    pub op: Comparison,
    pub bytes: u64,
}

impl SizeFilter {
    /// Parse `>500B`, `<1.5KB`, `=2MB`; units are binary multiples of 1024
    pub fn parse(text: &str) -> Result<Self, SearchError> {
        let caps = SIZE_FILTER
            .captures(text)
            .ok_or_else(|| SearchError::InvalidSize(text.to_string()))?;

        let op = Comparison::parse(&caps[1]).ok_or_else(|| SearchError::InvalidSize(text.to_string()))?;
        let number: f64 = caps[2]
            .parse()
            .map_err(|_| SearchError::InvalidSize(text.to_string()))?;
        let unit = caps
            .get(3)
            .map(|m| m.as_str().to_ascii_uppercase())
            .unwrap_or_else(|| "B".to_string());
        let multiplier: u64 = match unit.as_str() {
            "B" => 1,
            "KB" => 1 << 10,
            "MB" => 1 << 20,
            "GB" => 1 << 30,
            "TB" => 1 << 40,
            _ => return Err(SearchError::InvalidSize(text.to_string())),
        };

        let bytes = (number * multiplier as f64).round();
        if !bytes.is_finite() || bytes > u64::MAX as f64 {
            return Err(SearchError::InvalidSize(text.to_string()));
        }

        Ok(Self { op, bytes: bytes as u64 })
    }

    pub fn matches(&self, size: u64) -> bool {
        match self.op {
            Comparison::Greater => size > self.bytes,
            Comparison::Less => size < self.bytes,
            Comparison::Equal => size == self.bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeFilter {
    pub op: Comparison,
    pub age: Duration,
}

impl AgeFilter {
    /// Parse `<2d`, `>3w`, `>6m` (30 days), `<1y` (365 days)
    pub fn parse(text: &str) -> Result<Self, SearchError> {
        let invalid = || SearchError::InvalidAge(text.to_string());
        let caps = AGE_FILTER.captures(text).ok_or_else(invalid)?;

        let op = Comparison::parse(&caps[1]).ok_or_else(invalid)?;
        let count: i64 = caps[2].parse().map_err(|_| invalid())?;
        let days_per_unit = match caps[3].to_ascii_lowercase().as_str() {
            "d" => 1,
            "w" => 7,
            "m" => 30,
            "y" => 365,
            _ => return Err(invalid()),
        };
        let age = count
            .checked_mul(days_per_unit)
            .and_then(Duration::try_days)
            .ok_or_else(invalid)?;
        // The threshold must be a representable date
        Local::now().checked_sub_signed(age).ok_or_else(invalid)?;

        Ok(Self { op, age })
    }

    /// `>` = modified before now - age, `<` = modified after it,
    /// `=` = modified on that calendar day
    pub fn matches(&self, modified: SystemTime, now: DateTime<Local>) -> bool {
        let modified: DateTime<Local> = modified.into();
        let Some(threshold) = now.checked_sub_signed(self.age) else {
            return false;
        };
        match self.op {
            Comparison::Greater => modified < threshold,
            Comparison::Less => modified > threshold,
            Comparison::Equal => modified.date_naive() == threshold.date_naive(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Images,
    Documents,
    Spreadsheets,
    Archives,
    Audio,
    Video,
    Logs,
}

impl FileType {
    pub fn parse(name: &str) -> Result<Self, SearchError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "images" | "image" => Ok(FileType::Images),
            "documents" | "document" | "docs" => Ok(FileType::Documents),
            "spreadsheets" | "spreadsheet" => Ok(FileType::Spreadsheets),
            "archives" | "archive" => Ok(FileType::Archives),
            "audio" => Ok(FileType::Audio),
            "video" | "videos" => Ok(FileType::Video),
            "logs" | "log" => Ok(FileType::Logs),
            _ => Err(SearchError::UnknownFileType(name.to_string())),
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            FileType::Images => &["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "tiff", "heic"],
            FileType::Documents => &["txt", "pdf", "doc", "docx", "odt", "rtf", "md", "pages"],
            FileType::Spreadsheets => &["xls", "xlsx", "csv", "ods", "numbers"],
            FileType::Archives => &["zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar"],
            FileType::Audio => &["mp3", "wav", "flac", "aac", "ogg", "m4a"],
            FileType::Video => &["mp4", "mov", "avi", "mkv", "webm", "wmv", "flv"],
            FileType::Logs => &["log"],
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .map(|ext| self.extensions().contains(&ext.as_str()))
            .unwrap_or(false)
    }
}

/// Optional filters for `find_files`; all present filters must match
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub size: Option<SizeFilter>,
    pub modified: Option<AgeFilter>,
    pub file_type: Option<FileType>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.size.is_none() && self.modified.is_none() && self.file_type.is_none()
    }

    /// Build filters from step options (`size`, `modified`, `file_type`/`type`)
    pub fn from_options(options: &BTreeMap<String, String>) -> Result<Self, SearchError> {
        let mut filters = SearchFilters::default();
        for (key, value) in options {
            match key.as_str() {
                "size" => filters.size = Some(SizeFilter::parse(value)?),
                "modified" => filters.modified = Some(AgeFilter::parse(value)?),
                "file_type" | "type" => filters.file_type = Some(FileType::parse(value)?),
                other => return Err(SearchError::UnknownOption(other.to_string())),
            }
        }
        Ok(filters)
    }

    fn accepts(&self, path: &Path, metadata: &std::fs::Metadata, now: DateTime<Local>) -> bool {
        if let Some(file_type) = &self.file_type {
            if !file_type.matches(path) {
                return false;
            }
        }
        if let Some(size) = &self.size {
            if !size.matches(metadata.len()) {
                return false;
            }
        }
        if let Some(age) = &self.modified {
            match metadata.modified() {
                Ok(modified) if age.matches(modified, now) => {}
                _ => return false,
            }
        }
        true
    }
}

fn ensure_root(root: &Path) -> Result<(), SearchError> {
    if root.exists() {
        Ok(())
    } else {
        Err(SearchError::RootNotFound(root.display().to_string()))
    }
}

/// Recursively find files whose *name* matches `name_pattern`
pub fn find_files(
    name_pattern: &str,
    root: &Path,
    filters: &SearchFilters,
) -> Result<Vec<String>, SearchError> {
    ensure_root(root)?;
    let pattern = Pattern::new(name_pattern).map_err(|e| SearchError::InvalidPattern {
        pattern: name_pattern.to_string(),
        reason: e.to_string(),
    })?;
    let now = Local::now();

    let mut matches = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !pattern.matches(&name) {
            continue;
        }
        // Raced with a delete or permission change: skip
        let Ok(metadata) = entry.metadata() else { continue };
        if filters.accepts(entry.path(), &metadata, now) {
            matches.push(entry.path().display().to_string());
        }
    }

    matches.sort();
    slog_debug!("SEARCH", "find_files", serde_json::json!({
        "pattern": name_pattern,
        "root": root.display().to_string(),
        "matches": matches.len(),
    }));
    Ok(matches)
}

fn is_binary(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .map(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Files containing every whitespace-separated keyword (case-insensitive).
/// Each hit is `path:line:text` for the first line holding any keyword.
pub fn search_in_files(content_pattern: &str, root: &Path) -> Result<Vec<String>, SearchError> {
    let keywords: Vec<String> = content_pattern
        .split_whitespace()
        .map(|k| k.to_lowercase())
        .collect();
    if keywords.is_empty() {
        return Err(SearchError::EmptyPattern);
    }
    ensure_root(root)?;

    let mut matches = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() || is_binary(entry.path()) {
            continue;
        }

        let bytes = match std::fs::read(entry.path()) {
            Ok(b) => b,
            Err(e) => {
                slog_debug!("SEARCH", "skip_unreadable", serde_json::json!({
                    "path": entry.path().display().to_string(),
                    "error": e.to_string(),
                }));
                continue;
            }
        };
        let content = String::from_utf8_lossy(&bytes);
        let lowered = content.to_lowercase();
        if !keywords.iter().all(|k| lowered.contains(k.as_str())) {
            continue;
        }

        let hit = content.lines().enumerate().find(|(_, line)| {
            let line = line.to_lowercase();
            keywords.iter().any(|k| line.contains(k.as_str()))
        });
        if let Some((idx, line)) = hit {
            matches.push(format!("{}:{}:{}", entry.path().display(), idx + 1, line.trim()));
        }
    }

    matches.sort();
    Ok(matches)
}

/// Closest candidate to `query` (cutoff 0.6), if any
pub fn best_match(query: &str, candidates: &[String]) -> Option<String> {
    FuzzyMatcher::default().best_match(query, candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_parse() {
        assert_eq!(SizeFilter::parse(">500B").unwrap(), SizeFilter { op: Comparison::Greater, bytes: 500 });
        assert_eq!(SizeFilter::parse("<1.5kb").unwrap().bytes, 1536);
        assert_eq!(SizeFilter::parse("=2MB").unwrap().bytes, 2 * 1024 * 1024);
        assert_eq!(SizeFilter::parse("> 10").unwrap().bytes, 10);
        assert!(SizeFilter::parse("500B").is_err());
        assert!(SizeFilter::parse(">5PB").is_err());
    }

    #[test]
    fn test_age_parse() {
        assert_eq!(AgeFilter::parse("<2d").unwrap().age, Duration::days(2));
        assert_eq!(AgeFilter::parse(">3w").unwrap().age, Duration::days(21));
        assert_eq!(AgeFilter::parse(">1m").unwrap().age, Duration::days(30));
        assert_eq!(AgeFilter::parse(">1Y").unwrap().age, Duration::days(365));
        assert!(AgeFilter::parse("2d").is_err());
        assert!(AgeFilter::parse(">2h").is_err());
    }

    #[test]
    fn test_out_of_range_magnitudes_are_invalid() {
        assert!(matches!(AgeFilter::parse(">1000000000d"), Err(SearchError::InvalidAge(_))));
        assert!(matches!(AgeFilter::parse(">99999999999999999y"), Err(SearchError::InvalidAge(_))));
        assert!(matches!(
            AgeFilter::parse(">99999999999999999999999d"),
            Err(SearchError::InvalidAge(_))
        ));
        assert!(matches!(
            SizeFilter::parse(">99999999999999999999999TB"),
            Err(SearchError::InvalidSize(_))
        ));
        assert!(AgeFilter::parse(">100y").is_ok());
    }

    #[test]
    fn test_age_matches() {
        let now = Local::now();
        let yesterday: SystemTime = (now - Duration::days(1)).into();
        let last_week: SystemTime = (now - Duration::days(7)).into();

        let recent = AgeFilter::parse("<2d").unwrap();
        assert!(recent.matches(yesterday, now));
        assert!(!recent.matches(last_week, now));

        let old = AgeFilter::parse(">3d").unwrap();
        assert!(old.matches(last_week, now));
        assert!(!old.matches(yesterday, now));

        let exact = AgeFilter::parse("=7d").unwrap();
        assert!(exact.matches(last_week, now));
    }

    #[test]
    fn test_file_type_case_insensitive() {
        assert!(FileType::Images.matches(Path::new("/x/Photo.JPG")));
        assert!(FileType::Logs.matches(Path::new("app.log")));
        assert!(!FileType::Logs.matches(Path::new("README")));
        assert!(FileType::parse("Spreadsheets").is_ok());
        assert!(FileType::parse("holograms").is_err());
    }

    #[test]
    fn test_filters_from_options() {
        let mut options = BTreeMap::new();
        options.insert("size".to_string(), ">1KB".to_string());
        options.insert("type".to_string(), "logs".to_string());
        let filters = SearchFilters::from_options(&options).unwrap();
        assert_eq!(filters.size.unwrap().bytes, 1024);
        assert_eq!(filters.file_type, Some(FileType::Logs));
        assert!(filters.modified.is_none());

        options.insert("color".to_string(), "blue".to_string());
        assert!(matches!(
            SearchFilters::from_options(&options),
            Err(SearchError::UnknownOption(_))
        ));
    }

    #[test]
    fn test_find_files_matches_names_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("reports.pdf")).unwrap();
        std::fs::write(dir.path().join("reports.pdf").join("q1.pdf"), "x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let found = find_files("*.pdf", dir.path(), &SearchFilters::default()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("q1.pdf"));
    }

    #[test]
    fn test_find_files_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_files("*", &dir.path().join("gone"), &SearchFilters::default()).unwrap_err();
        assert!(matches!(err, SearchError::RootNotFound(_)));
    }

    #[test]
    fn test_search_skips_binary_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("image.png"), "hello world").unwrap();
        std::fs::write(dir.path().join("greeting.txt"), "Hello\nbig World").unwrap();

        let hits = search_in_files("hello world", dir.path()).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].ends_with("greeting.txt:1:Hello"));
    }

    #[test]
    fn test_search_empty_pattern() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(search_in_files("   ", dir.path()), Err(SearchError::EmptyPattern)));
    }

    #[test]
    fn test_best_match_delegates() {
        let candidates = vec!["apple".to_string(), "banana".to_string()];
        assert_eq!(best_match("bannana", &candidates), Some("banana".to_string()));
    }
}
