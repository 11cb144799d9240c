//! Gateway HTTP protocol: JSON bodies exchanged with clients

use serde::{Deserialize, Serialize};
use vaani_core::{CapabilityInfo, RoutedResponse};

/// Client → Gateway command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    /// Accepted for client compatibility; requests are not isolated per user
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Gateway → Client routed result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(flatten)]
    pub response: RoutedResponse,
    pub request_id: String,
    /// RFC 3339
    pub timestamp: String,
}

impl CommandResponse {
    pub fn new(response: RoutedResponse) -> Self {
        Self {
            response,
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Registered capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsResponse {
    pub agents: Vec<CapabilityInfo>,
}

/// Liveness report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub capabilities: usize,
}

// ── Well-known routes ──

pub mod routes {
    pub const PROCESS_COMMAND: &str = "/process-command";
    pub const AGENTS: &str = "/agents";
    pub const HEALTH: &str = "/health";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn routed() -> RoutedResponse {
        RoutedResponse {
            success: true,
            message: "ok".to_string(),
            intent: "message-composer".to_string(),
            capability_used: "message-composer".to_string(),
            error: None,
            payload: Map::new(),
        }
    }

    #[test]
    fn test_request_deserialize() {
        let json = r#"{"command":"hello"}"#;
        let req: CommandRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.command, "hello");
        assert!(req.user_id.is_none());
    }

    #[test]
    fn test_request_with_user() {
        let json = r#"{"command":"hello","user_id":"u1"}"#;
        let req: CommandRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn test_response_is_flattened() {
        let resp = CommandResponse::new(routed());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["capability_used"], "message-composer");
        assert!(json.get("response").is_none());
        assert!(json["request_id"].as_str().unwrap().len() == 36);
        assert!(chrono::DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = CommandResponse::new(routed());
        let b = CommandResponse::new(routed());
        assert_ne!(a.request_id, b.request_id);
    }
}
