//! Shared types for vaani-core

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Step marker set when the file lookup of a file-to-message workflow finds nothing
pub const STEP_FILE_SEARCH_FAILED: &str = "file_search_failed";
/// Step marker set when the file was located but the message could not be composed
pub const STEP_MESSAGE_FAILED: &str = "whatsapp_failed";

/// A named handler implementing one user-facing task
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityKind {
    MessageComposer,
    FileLocator,
    ConversationalResponder,
}

impl CapabilityKind {
    /// All capabilities, in the order they are presented to users
    pub const ALL: [CapabilityKind; 3] = [
        Self::MessageComposer,
        Self::FileLocator,
        Self::ConversationalResponder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageComposer => "message-composer",
            Self::FileLocator => "file-locator",
            Self::ConversationalResponder => "conversational-responder",
        }
    }

    /// Parse a wire name, also accepting the legacy agent labels
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace('_', "-").as_str() {
            "message-composer" | "whatsapp" | "message" => Some(Self::MessageComposer),
            "file-locator" | "filesearch" | "file-search" => Some(Self::FileLocator),
            "conversational-responder" | "conversation" => Some(Self::ConversationalResponder),
            _ => None,
        }
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The classifier's decision for one utterance. Decided once, never revised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Capability(CapabilityKind),
    Composite,
    Unclassified,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capability(kind) => kind.as_str(),
            Self::Composite => "composite",
            Self::Unclassified => "unclassified",
        }
    }

    /// Value reported as `capability_used` when this intent is dispatched
    pub fn capability_label(&self) -> &'static str {
        match self {
            Self::Capability(kind) => kind.as_str(),
            Self::Composite => "multi_agent",
            Self::Unclassified => "none",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of exactly one capability invocation (or of a resolved workflow)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CapabilityResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl CapabilityResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            payload: Map::new(),
        }
    }

    pub fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.into()),
            payload: Map::new(),
        }
    }

    pub fn with_payload(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    /// Step marker recorded by a workflow, if any
    pub fn step(&self) -> Option<&str> {
        self.payload.get("step").and_then(|v| v.as_str())
    }

    /// File matches carried in the payload. Malformed entries are skipped.
    pub fn matches(&self) -> Vec<FileMatch> {
        self.payload
            .get("matches")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| serde_json::from_value(m.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Descriptor of one located file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileMatch {
    pub name: String,
    pub path: String,
    pub size_bytes: u64,
}

impl FileMatch {
    pub fn size_mib(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    /// `name (x.yMB)`
    pub fn label(&self) -> String {
        format!("{} ({:.1}MB)", self.name, self.size_mib())
    }
}

/// The coordinator's external contract, the only entity crossing the boundary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutedResponse {
    pub success: bool,
    pub message: String,
    pub intent: String,
    pub capability_used: String,
    pub error: Option<String>,
    pub payload: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_kind_names() {
        for kind in CapabilityKind::ALL {
            assert_eq!(CapabilityKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(
            CapabilityKind::from_name("WhatsApp"),
            Some(CapabilityKind::MessageComposer)
        );
        assert_eq!(
            CapabilityKind::from_name("conversational_responder"),
            Some(CapabilityKind::ConversationalResponder)
        );
        assert_eq!(CapabilityKind::from_name("weather"), None);
    }

    #[test]
    fn test_capability_kind_serde() {
        let json = serde_json::to_string(&CapabilityKind::FileLocator).unwrap();
        assert_eq!(json, "\"file-locator\"");
    }

    #[test]
    fn test_intent_labels() {
        assert_eq!(Intent::Composite.as_str(), "composite");
        assert_eq!(Intent::Composite.capability_label(), "multi_agent");
        assert_eq!(Intent::Unclassified.capability_label(), "none");
        let direct = Intent::Capability(CapabilityKind::MessageComposer);
        assert_eq!(direct.as_str(), "message-composer");
        assert_eq!(direct.capability_label(), "message-composer");
    }

    #[test]
    fn test_result_matches_skips_malformed() {
        let result = CapabilityResult::ok("found").with_payload(
            "matches",
            serde_json::json!([
                {"name": "a.pdf", "path": "/tmp/a.pdf", "size_bytes": 10},
                {"name": "broken"}
            ]),
        );
        let matches = result.matches();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "a.pdf");
    }

    #[test]
    fn test_file_match_label() {
        let m = FileMatch {
            name: "report.pdf".to_string(),
            path: "/home/u/report.pdf".to_string(),
            size_bytes: 2_097_152,
        };
        assert_eq!(m.label(), "report.pdf (2.0MB)");
    }

    #[test]
    fn test_failed_result_step() {
        let result = CapabilityResult::failed("nope", "missing")
            .with_payload("step", STEP_FILE_SEARCH_FAILED);
        assert!(!result.success);
        assert_eq!(result.step(), Some(STEP_FILE_SEARCH_FAILED));
    }
}
