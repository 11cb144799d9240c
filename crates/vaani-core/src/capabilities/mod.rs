//! Capability registry and handler trait

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::RouterError;
use crate::types::{CapabilityKind, CapabilityResult};

pub mod conversation;
pub mod files;
pub mod messaging;

/// A single user-facing task handler. Handlers never call each other; any
/// chaining goes through the resolver.
#[async_trait]
pub trait Capability: Send + Sync {
    fn kind(&self) -> CapabilityKind;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;

    /// Run the capability. A domain miss (unknown contact, no file) is a
    /// failed `CapabilityResult`; `Err` is reserved for unexpected failures.
    async fn execute(&self, input: Value) -> Result<CapabilityResult>;
}

/// Name and description of a registered capability, for guidance text and transports
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityInfo {
    pub name: String,
    pub description: String,
}

/// Registry of available capabilities
pub struct CapabilityRegistry {
    capabilities: HashMap<CapabilityKind, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    /// Register a capability, replacing any previous handler of the same kind
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let kind = capability.kind();
        debug!("Registering capability: {}", kind);
        self.capabilities.insert(kind, capability);
    }

    pub fn get(&self, kind: CapabilityKind) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(&kind).cloned()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Registered capabilities in presentation order
    pub fn list(&self) -> Vec<CapabilityInfo> {
        CapabilityKind::ALL
            .iter()
            .filter_map(|kind| self.capabilities.get(kind))
            .map(|c| CapabilityInfo {
                name: c.kind().as_str().to_string(),
                description: c.description().to_string(),
            })
            .collect()
    }

    /// Execute a capability by kind, mapping failures onto the router taxonomy
    pub async fn invoke(
        &self,
        kind: CapabilityKind,
        input: Value,
    ) -> Result<CapabilityResult, RouterError> {
        let capability = self
            .capabilities
            .get(&kind)
            .ok_or(RouterError::Unregistered(kind))?;

        debug!("Invoking capability {} with input: {}", kind, input);

        match capability.execute(input).await {
            Ok(result) => {
                debug!("Capability {} returned success={}", kind, result.success);
                Ok(result)
            }
            Err(e) => {
                warn!("Capability {} failed: {:#}", kind, e);
                Err(RouterError::execution(kind, e))
            }
        }
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper function to create a JSON schema for capability input
pub fn json_schema(properties: Value, required: Vec<&str>) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Read a non-empty, trimmed string field from a capability input
pub(crate) fn str_field<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct EchoCapability;

    #[async_trait]
    impl Capability for EchoCapability {
        fn kind(&self) -> CapabilityKind {
            CapabilityKind::ConversationalResponder
        }

        fn description(&self) -> &str {
            "Echoes the utterance back"
        }

        fn input_schema(&self) -> Value {
            json_schema(
                serde_json::json!({
                    "utterance": { "type": "string", "description": "Text to echo" }
                }),
                vec!["utterance"],
            )
        }

        async fn execute(&self, input: Value) -> Result<CapabilityResult> {
            let text = str_field(&input, "utterance").unwrap_or("...");
            Ok(CapabilityResult::ok(text))
        }
    }

    struct BrokenCapability;

    #[async_trait]
    impl Capability for BrokenCapability {
        fn kind(&self) -> CapabilityKind {
            CapabilityKind::FileLocator
        }

        fn description(&self) -> &str {
            "Always errors"
        }

        fn input_schema(&self) -> Value {
            json_schema(serde_json::json!({}), vec![])
        }

        async fn execute(&self, _input: Value) -> Result<CapabilityResult> {
            Err(anyhow!("disk on fire"))
        }
    }

    #[tokio::test]
    async fn test_registry_invoke() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(EchoCapability));
        assert_eq!(registry.len(), 1);

        let result = registry
            .invoke(
                CapabilityKind::ConversationalResponder,
                serde_json::json!({"utterance": "hi"}),
            )
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.message, "hi");
    }

    #[tokio::test]
    async fn test_unregistered_capability() {
        let registry = CapabilityRegistry::new();
        let err = registry
            .invoke(CapabilityKind::MessageComposer, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RouterError::Unregistered(CapabilityKind::MessageComposer)
        ));
    }

    #[tokio::test]
    async fn test_execution_error_is_wrapped() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(BrokenCapability));
        let err = registry
            .invoke(CapabilityKind::FileLocator, serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "file-locator failed: disk on fire");
    }

    #[test]
    fn test_list_follows_presentation_order() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(EchoCapability));
        registry.register(Arc::new(BrokenCapability));
        let names: Vec<String> = registry.list().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["file-locator", "conversational-responder"]);
    }

    #[test]
    fn test_str_field_trims_and_rejects_empty() {
        let input = serde_json::json!({"a": "  x ", "b": "   ", "c": 3});
        assert_eq!(str_field(&input, "a"), Some("x"));
        assert_eq!(str_field(&input, "b"), None);
        assert_eq!(str_field(&input, "c"), None);
        assert_eq!(str_field(&input, "d"), None);
    }
}
