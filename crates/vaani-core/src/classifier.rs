//! Intent classification
//!
//! Layered decision procedure, first matching rule wins:
//! 1. file-reference cue + communication cue → composite
//! 2. communication cue alone (unless phrased as a question, or an explicit
//!    message command) → message-composer; file-operation cue not phrased as
//!    a question → file-locator
//! 3. capability / factual question or conversational cue → conversational-responder
//! 4. fallback model call constrained to the known labels; anything it returns
//!    that is not a label becomes conversational-responder, and a failed call
//!    becomes unclassified
//!
//! `classify` never fails.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cues::CueSet;
use crate::error::RouterError;
use crate::model::LanguageModel;
use crate::types::{CapabilityKind, Intent};

const CLASSIFIER_PROMPT: &str = "You are the intent router of Vaani, a personal assistant.\n\
Classify the user's request into exactly one label:\n\
- message-composer: sending a WhatsApp message to a contact (\"tell mom I'm coming\")\n\
- file-locator: finding, searching or opening files (\"where is my report\")\n\
- conversational-responder: greetings, help, questions, small talk\n\
- composite: a file AND a communication step (\"send my report to boss on whatsapp\")\n\
If unsure, answer conversational-responder.\n\
Return ONLY the label. Nothing else.";

/// Configuration for the intent classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Whether rule 4 may call the model when no heuristic rule fires
    #[serde(default = "default_true")]
    pub use_model_fallback: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            use_model_fallback: true,
        }
    }
}

/// Heuristic rule that decided an intent, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    CompositePattern,
    DirectCapability,
    CapabilityQuestion,
    ModelFallback,
}

pub struct IntentClassifier {
    cues: Arc<CueSet>,
    model: Option<Arc<dyn LanguageModel>>,
    config: ClassifierConfig,
}

impl IntentClassifier {
    pub fn new(
        cues: Arc<CueSet>,
        model: Option<Arc<dyn LanguageModel>>,
        config: ClassifierConfig,
    ) -> Self {
        Self {
            cues,
            model,
            config,
        }
    }

    /// Classify an utterance. Always terminates with a defined intent.
    pub async fn classify(&self, utterance: &str) -> Intent {
        let trimmed = utterance.trim();
        if trimmed.is_empty() {
            debug!("Empty utterance, unclassified");
            return Intent::Unclassified;
        }

        if let Some((intent, rule)) = self.classify_heuristic(trimmed) {
            debug!("Rule {:?} classified {:?} as {}", rule, trimmed, intent);
            return intent;
        }

        match self.classify_with_model(trimmed).await {
            Ok((intent, rule)) => {
                debug!("Rule {:?} classified {:?} as {}", rule, trimmed, intent);
                intent
            }
            Err(e) => {
                warn!("Falling back to unclassified: {}", e);
                Intent::Unclassified
            }
        }
    }

    /// Rules 1 to 3. `None` when no rule fires.
    pub fn classify_heuristic(&self, utterance: &str) -> Option<(Intent, Rule)> {
        let lower = utterance.trim().to_lowercase();
        let cues = &self.cues;

        let file_reference = cues.has_file_reference(&lower);
        let communication = cues.has_communication(&lower);
        let question = cues.is_question(&lower);

        if file_reference && communication {
            return Some((Intent::Composite, Rule::CompositePattern));
        }

        if communication && (cues.has_message_command(&lower) || !question) {
            return Some((
                Intent::Capability(CapabilityKind::MessageComposer),
                Rule::DirectCapability,
            ));
        }

        if cues.has_file_operation(&lower) && !question {
            return Some((
                Intent::Capability(CapabilityKind::FileLocator),
                Rule::DirectCapability,
            ));
        }

        if question || cues.is_conversational(&lower) {
            return Some((
                Intent::Capability(CapabilityKind::ConversationalResponder),
                Rule::CapabilityQuestion,
            ));
        }

        None
    }

    /// Rule 4. Errors when the fallback is disabled, missing or fails.
    async fn classify_with_model(&self, utterance: &str) -> Result<(Intent, Rule), RouterError> {
        if !self.config.use_model_fallback {
            return Err(RouterError::Classification(
                "model fallback disabled".to_string(),
            ));
        }
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| RouterError::Classification("no model configured".to_string()))?;

        let raw = model
            .complete(CLASSIFIER_PROMPT, utterance)
            .await
            .map_err(|e| RouterError::Classification(e.to_string()))?;

        Ok((parse_label(&raw), Rule::ModelFallback))
    }
}

/// Map the model's answer onto an intent. Unknown tokens are coerced to the
/// conversational responder.
pub fn parse_label(raw: &str) -> Intent {
    let token = raw
        .trim()
        .lines()
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
        .to_lowercase();

    match token.as_str() {
        "composite" | "multi_agent" | "multi-agent" => Intent::Composite,
        other => match CapabilityKind::from_name(other) {
            Some(kind) => Intent::Capability(kind),
            None => {
                debug!("Unrecognised classifier token {:?}", raw);
                Intent::Capability(CapabilityKind::ConversationalResponder)
            }
        },
    }
}
