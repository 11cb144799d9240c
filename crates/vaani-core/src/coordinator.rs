//! Top-level entry point: classify, dispatch, normalize

use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::capabilities::{CapabilityInfo, CapabilityRegistry};
use crate::classifier::IntentClassifier;
use crate::resolver::CompositeResolver;
use crate::types::{CapabilityKind, CapabilityResult, Intent, RoutedResponse};

const GENERIC_SUCCESS: &str = "Done.";
const GENERIC_FAILURE: &str = "Sorry, I couldn't complete that request.";

/// Owns the classifier, the resolver and the capability registry. Stateless
/// across calls; conversation history lives inside the conversational
/// responder.
pub struct Coordinator {
    classifier: IntentClassifier,
    resolver: CompositeResolver,
    registry: Arc<CapabilityRegistry>,
}

impl Coordinator {
    pub fn new(
        classifier: IntentClassifier,
        resolver: CompositeResolver,
        registry: Arc<CapabilityRegistry>,
    ) -> Self {
        Self {
            classifier,
            resolver,
            registry,
        }
    }

    /// Handle one utterance. Always returns a well-formed response.
    pub async fn handle(&self, utterance: &str) -> RoutedResponse {
        let utterance = utterance.trim();
        let intent = self.classifier.classify(utterance).await;

        let result = match intent {
            Intent::Capability(kind) => self.dispatch(kind, utterance).await,
            Intent::Composite => self.resolver.resolve(utterance).await,
            Intent::Unclassified => self.guidance(),
        };

        let response = normalize(intent, result);
        info!(
            "Routed {:?}: intent={} capability={} success={}",
            utterance, response.intent, response.capability_used, response.success
        );
        response
    }

    /// Registered capabilities, for transports and guidance
    pub fn capabilities(&self) -> Vec<CapabilityInfo> {
        self.registry.list()
    }

    async fn dispatch(&self, kind: CapabilityKind, utterance: &str) -> CapabilityResult {
        match self
            .registry
            .invoke(kind, json!({ "utterance": utterance }))
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!("Dispatch to {} failed: {}", kind, e);
                CapabilityResult::failed(
                    format!("Sorry, something went wrong while handling that with {}.", kind),
                    e.to_string(),
                )
            }
        }
    }

    /// Static help listing the known capabilities. Never fails.
    fn guidance(&self) -> CapabilityResult {
        let mut message =
            String::from("Hi! I'm Vaani. I'm not sure what you need yet. Here is what I can do:");
        for capability in self.registry.list() {
            message.push_str(&format!(
                "\n- {}: {}",
                capability.name, capability.description
            ));
        }
        message.push_str("\n\nTry 'Send WhatsApp to [name]: [message]' or 'Find file [filename]'.");
        CapabilityResult::ok(message)
    }
}

/// Project a sub-result onto the external response shape.
///
/// `success` is false exactly when an error is present, and a failed
/// response always carries a non-empty error.
pub fn normalize(intent: Intent, result: CapabilityResult) -> RoutedResponse {
    let error = result
        .error
        .clone()
        .filter(|e| !e.trim().is_empty());
    let success = result.success && error.is_none();

    let error = if success {
        None
    } else {
        Some(error.unwrap_or_else(|| match result.step() {
            Some(step) => step.to_string(),
            None => format!("{} did not complete", intent.capability_label()),
        }))
    };

    let message = if result.message.trim().is_empty() {
        (if success { GENERIC_SUCCESS } else { GENERIC_FAILURE }).to_string()
    } else {
        result.message
    };

    RoutedResponse {
        success,
        message,
        intent: intent.as_str().to_string(),
        capability_used: intent.capability_label().to_string(),
        error,
        payload: result.payload,
    }
}
