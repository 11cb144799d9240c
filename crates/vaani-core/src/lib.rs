//! vaani-core - Natural-language command routing for the Vaani assistant
//!
//! This crate provides:
//! - Intent classifier (keyword rules first, language model fallback)
//! - Composite workflow resolver chaining file search into message composition
//! - Coordinator exposing a single `handle(utterance)` entry point
//! - Capabilities: message composer, file locator, conversational responder
//! - OpenAI-compatible chat completions client

pub mod api;
pub mod capabilities;
pub mod classifier;
pub mod coordinator;
pub mod cues;
pub mod error;
pub mod history;
pub mod model;
pub mod resolver;
pub mod types;
pub mod workflow;

// Re-export main types for convenience
pub use api::{ApiClient, ApiMessage};
pub use capabilities::conversation::{ConversationTopic, ConversationalResponder};
pub use capabilities::files::FileLocator;
pub use capabilities::messaging::{ContactDirectory, MessageComposer};
pub use capabilities::{Capability, CapabilityInfo, CapabilityRegistry};
pub use classifier::{ClassifierConfig, IntentClassifier};
pub use coordinator::Coordinator;
pub use cues::CueSet;
pub use error::RouterError;
pub use history::{ConversationHistory, Exchange};
pub use model::LanguageModel;
pub use resolver::CompositeResolver;
pub use types::{CapabilityKind, CapabilityResult, FileMatch, Intent, RoutedResponse};
pub use workflow::{WorkflowPlan, WorkflowType};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        // Just verify that all main types are exported
        let _ = std::mem::size_of::<Coordinator>();
        let _ = std::mem::size_of::<ApiClient>();
        let _ = std::mem::size_of::<CapabilityRegistry>();
        let _ = std::mem::size_of::<RoutedResponse>();
        let _ = std::mem::size_of::<WorkflowPlan>();
    }
}
