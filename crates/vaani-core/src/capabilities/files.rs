//! File locator: fuzzy search over a few well-known user directories

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

use super::{Capability, json_schema, str_field};
use crate::error::RouterError;
use crate::types::{CapabilityKind, CapabilityResult, FileMatch};
use crate::workflow::extract_file_query;

pub const DEFAULT_ROOTS: &[&str] = &[
    "~/Documents",
    "~/Desktop",
    "~/Downloads",
    "~/Pictures",
    "~/Videos",
    "~/Music",
];
pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_MAX_RESULTS: usize = 15;

/// Words dropped when a bare utterance is used as the query
const UTTERANCE_FILLER: &[&str] = &[
    "find", "search", "open", "locate", "show", "look", "where", "is", "are", "my", "the", "a",
    "an", "me", "for", "file", "files", "please", "can", "you",
];

pub(crate) fn shellexpand(s: &str) -> PathBuf {
    let mut result = s.to_string();
    if result.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            result = format!("{}{}", home.display(), &result[1..]);
        }
    }
    PathBuf::from(result)
}

/// Score a file name against a query: exact 1.0, contains 0.8, otherwise
/// 0.6 scaled by the share of query words found in the name
pub fn fuzzy_score(query: &str, file_name: &str) -> f64 {
    let query = query.trim().to_lowercase();
    let name = file_name.to_lowercase();
    if query.is_empty() {
        return 0.0;
    }
    if query == name {
        return 1.0;
    }
    if name.contains(&query) {
        return 0.8;
    }

    let name_words: Vec<&str> = name
        .split(|c: char| c == '.' || c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect();
    let query_words: Vec<&str> = query.split_whitespace().collect();

    let matching = query_words
        .iter()
        .filter(|q| name_words.iter().any(|w| w.contains(*q)))
        .count();

    if matching == 0 {
        0.0
    } else {
        0.6 * (matching as f64 / query_words.len() as f64)
    }
}

fn is_glob(query: &str) -> bool {
    query.contains('*') || query.contains('?')
}

struct Candidate {
    file: FileMatch,
    score: f64,
    modified: SystemTime,
}

/// Searches the configured roots for files matching a query
pub struct FileLocator {
    roots: Vec<PathBuf>,
    max_depth: usize,
    max_results: usize,
}

impl FileLocator {
    /// `roots` may use `~/`; missing directories are skipped at search time
    pub fn new(roots: Vec<String>) -> Self {
        Self {
            roots: roots.iter().map(|r| shellexpand(r)).collect(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_default_roots() -> Self {
        Self::new(DEFAULT_ROOTS.iter().map(|r| r.to_string()).collect())
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    /// Roots that currently exist on disk
    pub fn existing_roots(&self) -> Vec<&Path> {
        self.roots
            .iter()
            .filter(|r| r.is_dir())
            .map(|r| r.as_path())
            .collect()
    }

    /// Ranked matches, best first
    pub fn search(&self, query: &str) -> Vec<FileMatch> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let pattern = if is_glob(query) {
            match glob::Pattern::new(&query.to_lowercase()) {
                Ok(p) => Some(p),
                Err(e) => {
                    debug!("Invalid glob {:?}, using fuzzy match: {}", query, e);
                    None
                }
            }
        } else {
            None
        };

        let score = |name: &str| -> f64 {
            match &pattern {
                Some(p) if p.matches(&name.to_lowercase()) => 1.0,
                Some(_) => 0.0,
                None => fuzzy_score(query, name),
            }
        };

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for root in self.existing_roots() {
            walk(root, 0, self.max_depth, &score, &mut seen, &mut candidates);
        }

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.modified.cmp(&a.modified))
        });
        candidates.truncate(self.max_results);

        debug!("File search {:?} found {} matches", query, candidates.len());
        candidates.into_iter().map(|c| c.file).collect()
    }
}

fn walk(
    dir: &Path,
    depth: usize,
    max_depth: usize,
    score: &dyn Fn(&str) -> f64,
    seen: &mut HashSet<PathBuf>,
    out: &mut Vec<Candidate>,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to read directory {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }

        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let path = entry.path();

        if metadata.is_dir() {
            if depth < max_depth {
                walk(&path, depth + 1, max_depth, score, seen, out);
            }
            continue;
        }

        let s = score(&name);
        if s <= 0.0 {
            continue;
        }

        let key = path.canonicalize().unwrap_or_else(|_| path.clone());
        if !seen.insert(key) {
            continue;
        }

        out.push(Candidate {
            file: FileMatch {
                name,
                path: path.display().to_string(),
                size_bytes: metadata.len(),
            },
            score: s,
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }
}

/// Pull a search query out of a free-text request
pub fn query_from_utterance(utterance: &str) -> String {
    if let Some(query) = extract_file_query(utterance) {
        return query;
    }
    utterance
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '*' && c != '?'))
        .filter(|w| !w.is_empty() && !UTTERANCE_FILLER.contains(&w.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Capability for FileLocator {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::FileLocator
    }

    fn description(&self) -> &str {
        "Find files in your Documents, Desktop, Downloads and media folders by name or glob pattern"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "query": {
                    "type": "string",
                    "description": "File name, words from it, or a glob such as '*.pdf'"
                },
                "utterance": {
                    "type": "string",
                    "description": "Free-text request, used when no query is given"
                }
            }),
            vec![],
        )
    }

    async fn execute(&self, input: Value) -> Result<CapabilityResult> {
        let query = match str_field(&input, "query") {
            Some(q) => q.to_string(),
            None => query_from_utterance(str_field(&input, "utterance").unwrap_or("")),
        };

        if query.is_empty() {
            return Ok(CapabilityResult::failed(
                "What file should I look for?",
                "empty file query",
            )
            .with_payload("matches", Vec::<Value>::new()));
        }

        let matches = self.search(&query);
        let listed = serde_json::to_value(&matches)?;

        if matches.is_empty() {
            let err = RouterError::CapabilityNotFound(format!("file matching '{}'", query));
            return Ok(
                CapabilityResult::failed(format!("No files found matching '{}'", query), err.to_string())
                    .with_payload("query", query.as_str())
                    .with_payload("matches", listed),
            );
        }

        let mut message = format!("Found {} file(s) matching '{}':", matches.len(), query);
        for (i, m) in matches.iter().take(5).enumerate() {
            message.push_str(&format!("\n{}. {}", i + 1, m.label()));
        }

        Ok(CapabilityResult::ok(message)
            .with_payload("query", query.as_str())
            .with_payload("matches", listed))
    }
}
