//! Composite workflow plans and the parsing that feeds them

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::cues::CueSet;
use crate::types::CapabilityKind;

/// Fixed vocabulary of multi-step workflows
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowType {
    /// Locate a file, then compose a message about it
    FileToMessage,
    /// Locate files and list them for sharing
    SearchAndShare,
    /// Compose a message without a file lookup
    MessageOnly,
}

impl WorkflowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileToMessage => "file-to-message",
            Self::SearchAndShare => "search-and-share",
            Self::MessageOnly => "message-only",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace('_', "-").as_str() {
            "file-to-message" | "file-to-whatsapp" => Some(Self::FileToMessage),
            "search-and-share" => Some(Self::SearchAndShare),
            "message-only" => Some(Self::MessageOnly),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fields pulled out of the structured-extraction reply. Missing or malformed
/// lines leave the field empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub workflow: Option<WorkflowType>,
    pub file_query: String,
    pub recipient: Option<String>,
    pub message: Option<String>,
}

fn is_placeholder(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v.is_empty()
        || matches!(v.as_str(), "none" | "empty" | "n/a" | "na" | "null" | "-")
        || (v.starts_with('[') && v.ends_with(']'))
}

fn clean_value(value: &str) -> Option<String> {
    let v = value.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if is_placeholder(v) {
        None
    } else {
        Some(v.to_string())
    }
}

/// Return the text after `label:` if `line` starts with it (case-insensitive)
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let line = line.trim_start_matches(|c: char| c.is_whitespace() || c == '-' || c == '*');
    if line.len() > label.len()
        && line.is_char_boundary(label.len())
        && line[..label.len()].eq_ignore_ascii_case(label)
        && line[label.len()..].starts_with(':')
    {
        Some(&line[label.len() + 1..])
    } else {
        None
    }
}

/// Parse `WORKFLOW:` / `FILE:` / `RECIPIENT:` / `MESSAGE:` lines.
///
/// A recipient that is a closed-class stop word ("to", "for", ...) is treated
/// as no recipient.
pub fn parse_extraction(text: &str, cues: &CueSet) -> Extraction {
    let mut extraction = Extraction::default();

    for line in text.lines() {
        if let Some(v) = strip_label(line, "WORKFLOW") {
            extraction.workflow = clean_value(v).and_then(|w| WorkflowType::from_name(&w));
        } else if let Some(v) = strip_label(line, "FILE") {
            extraction.file_query = clean_value(v).unwrap_or_default();
        } else if let Some(v) = strip_label(line, "RECIPIENT") {
            extraction.recipient = clean_value(v).filter(|r| !cues.is_stop_word(r));
        } else if let Some(v) = strip_label(line, "MESSAGE") {
            extraction.message = clean_value(v);
        }
    }

    extraction
}

/// One capability invocation in a plan
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowStep {
    pub capability: CapabilityKind,
    pub params: Map<String, Value>,
}

impl WorkflowStep {
    fn new(capability: CapabilityKind, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { capability, params }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }
}

/// Transient, built once per composite utterance and executed once
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowPlan {
    pub workflow: WorkflowType,
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowPlan {
    /// Locate `file_query`, then message `recipient`
    pub fn file_to_message(file_query: &str, recipient: &str, message: Option<&str>) -> Self {
        let mut compose = json!({ "recipient": recipient });
        if let Some(m) = message {
            compose["message"] = json!(m);
        }
        Self {
            workflow: WorkflowType::FileToMessage,
            steps: vec![
                WorkflowStep::new(CapabilityKind::FileLocator, json!({ "query": file_query })),
                WorkflowStep::new(CapabilityKind::MessageComposer, compose),
            ],
        }
    }

    pub fn search_and_share(file_query: &str, recipient: Option<&str>) -> Self {
        let mut locate = json!({ "query": file_query });
        if let Some(r) = recipient {
            locate["recipient"] = json!(r);
        }
        Self {
            workflow: WorkflowType::SearchAndShare,
            steps: vec![WorkflowStep::new(CapabilityKind::FileLocator, locate)],
        }
    }

    pub fn message_only(utterance: &str, recipient: Option<&str>, message: Option<&str>) -> Self {
        let params = match (recipient, message) {
            (Some(r), Some(m)) => json!({ "recipient": r, "message": m }),
            _ => json!({ "utterance": utterance }),
        };
        Self {
            workflow: WorkflowType::MessageOnly,
            steps: vec![WorkflowStep::new(CapabilityKind::MessageComposer, params)],
        }
    }

    /// Build a plan from an extraction. `None` when the extraction is not
    /// usable, so a plan never has zero steps.
    pub fn from_extraction(extraction: &Extraction, utterance: &str) -> Option<Self> {
        let query = extraction.file_query.trim();
        match extraction.workflow? {
            WorkflowType::FileToMessage => {
                let recipient = extraction.recipient.as_deref()?;
                if query.is_empty() {
                    return None;
                }
                Some(Self::file_to_message(
                    query,
                    recipient,
                    extraction.message.as_deref(),
                ))
            }
            WorkflowType::SearchAndShare => {
                if query.is_empty() {
                    return None;
                }
                Some(Self::search_and_share(query, extraction.recipient.as_deref()))
            }
            WorkflowType::MessageOnly => Some(Self::message_only(
                utterance,
                extraction.recipient.as_deref(),
                extraction.message.as_deref(),
            )),
        }
    }
}

fn clean_word(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '_' && c != '-')
        .trim_end_matches('.')
}

/// The word immediately following a recipient preposition ("to", "for"),
/// skipping candidates that are themselves stop words
pub fn candidate_recipient(utterance: &str, cues: &CueSet) -> Option<String> {
    let words: Vec<&str> = utterance.split_whitespace().collect();
    words.windows(2).find_map(|pair| {
        let preposition = clean_word(pair[0]);
        let candidate = clean_word(pair[1]);
        if cues.is_recipient_preposition(preposition)
            && !candidate.is_empty()
            && !cues.is_stop_word(candidate)
        {
            Some(candidate.to_string())
        } else {
            None
        }
    })
}

const QUERY_VERBS: &[&str] = &["send", "share", "find", "search", "open", "locate", "get", "forward"];
const QUERY_BREAKS: &[&str] = &["to", "with", "for", "on", "via", "and", "then"];
const QUERY_FILLER: &[&str] = &["my", "the", "a", "an", "file", "files", "me", "please", "for"];

/// Looks like `name.ext` with a short extension
fn has_extension(word: &str) -> bool {
    match word.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// Best-effort file query: a token with an extension wins, otherwise the
/// words after the first send/share/find verb up to the next preposition.
pub fn extract_file_query(utterance: &str) -> Option<String> {
    let words: Vec<&str> = utterance.split_whitespace().map(clean_word).collect();

    if let Some(named) = words.iter().find(|w| has_extension(w)) {
        return Some(named.to_string());
    }

    let start = words
        .iter()
        .position(|w| QUERY_VERBS.contains(&w.to_lowercase().as_str()))?;

    let query: Vec<&str> = words[start + 1..]
        .iter()
        .take_while(|w| !QUERY_BREAKS.contains(&w.to_lowercase().as_str()))
        .filter(|w| !w.is_empty() && !QUERY_FILLER.contains(&w.to_lowercase().as_str()))
        .copied()
        .collect();

    if query.is_empty() {
        None
    } else {
        Some(query.join(" "))
    }
}
