//! Conversational responder: small talk, help and capability questions

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Capability, json_schema, str_field};
use crate::history::{ConversationHistory, Exchange};
use crate::model::LanguageModel;
use crate::types::{CapabilityKind, CapabilityResult};

const PERSONA: &str = "You are Vaani, a friendly and intelligent AI assistant for task automation. \
You are warm, helpful and clear. You can send WhatsApp messages to contacts and search for files \
on this device, and you are happy to chat. Keep replies to a few sentences.";

const QUESTION_OPENERS: &[&str] = &[
    "what", "why", "how", "when", "where", "who", "explain", "is", "are", "does", "do",
];

/// What a conversational utterance is about
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationTopic {
    Greeting,
    Introduction,
    Gratitude,
    Farewell,
    Help,
    Question,
    Casual,
}

impl ConversationTopic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Introduction => "introduction",
            Self::Gratitude => "gratitude",
            Self::Farewell => "farewell",
            Self::Help => "help",
            Self::Question => "question",
            Self::Casual => "casual",
        }
    }

    /// Keyword topic detection; the first matching topic in this order wins
    pub fn detect(utterance: &str) -> Self {
        let lower = utterance.trim().to_lowercase();
        let words: String = lower
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
            .collect();
        let padded = format!(" {} ", words.split_whitespace().collect::<Vec<_>>().join(" "));
        let has = |phrases: &[&str]| phrases.iter().any(|p| padded.contains(&format!(" {} ", p)));

        if has(&["bye", "goodbye", "see you", "exit", "quit", "good night"]) {
            Self::Farewell
        } else if has(&["thank", "thanks", "thank you", "appreciate", "appreciate it"]) {
            Self::Gratitude
        } else if has(&[
            "who are you",
            "what can you do",
            "what are you",
            "your capabilities",
            "tell me about yourself",
            "can you",
            "are you able",
            "what can you",
        ]) {
            Self::Introduction
        } else if has(&["help", "help me", "commands", "how do i", "usage"]) {
            Self::Help
        } else if has(&[
            "hi",
            "hello",
            "hey",
            "good morning",
            "good afternoon",
            "good evening",
            "how are you",
            "what's up",
            "namaste",
        ]) {
            Self::Greeting
        } else if lower.ends_with('?')
            || QUESTION_OPENERS
                .iter()
                .any(|w| padded.starts_with(&format!(" {} ", w)))
        {
            Self::Question
        } else {
            Self::Casual
        }
    }

    /// Guidance appended to the persona when a model writes the reply
    fn guidance(&self) -> &'static str {
        match self {
            Self::Greeting => "Respond to the greeting warmly and mention you can help with WhatsApp messages and file searches.",
            Self::Introduction => "Introduce yourself and explain your capabilities: sending WhatsApp messages, finding files, and combining the two. End by asking how you can help.",
            Self::Gratitude => "Respond warmly to the thanks and offer further help. Keep it brief.",
            Self::Farewell => "Say goodbye warmly and mention you're always here to help.",
            Self::Help => "Explain the commands you understand: 'Send WhatsApp to [name]: [message]', 'Find file [name]', 'Send [file] to [contact] on WhatsApp'. Mention you understand natural language.",
            Self::Question => "Answer the question concisely and accurately.",
            Self::Casual => "Engage in brief, friendly conversation while gently steering toward how you can help.",
        }
    }

    /// Reply used when no model is configured or the model call fails
    pub fn template(&self) -> &'static str {
        match self {
            Self::Greeting => "Hello! I'm Vaani, your AI assistant. I can send WhatsApp messages, find your files, or just chat. What can I do for you?",
            Self::Introduction => "I'm Vaani, a task automation assistant. I can:\n- send WhatsApp messages to your contacts\n- search for files on this device\n- combine the two, like sending a report to your boss\nHow can I help?",
            Self::Gratitude => "You're welcome! Let me know if there's anything else I can do.",
            Self::Farewell => "Goodbye! I'm always here if you need a hand.",
            Self::Help => "Here is what you can ask me:\n- \"Send WhatsApp to [name]: [message]\"\n- \"Find file [filename]\"\n- \"Send [filename] to [contact] on WhatsApp\"\nPlain language works too.",
            Self::Question => "Good question! I'm best at messages and files. Try \"Send WhatsApp to Jay: Hello\" or \"Find file report.pdf\".",
            Self::Casual => "I'm here and ready to help. Ask me to send a WhatsApp message or find a file.",
        }
    }
}

impl std::fmt::Display for ConversationTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Friendly responder backed by an optional language model
pub struct ConversationalResponder {
    model: Option<Arc<dyn LanguageModel>>,
    history: Arc<ConversationHistory>,
    context_turns: usize,
}

impl ConversationalResponder {
    pub fn new(model: Option<Arc<dyn LanguageModel>>, history: Arc<ConversationHistory>) -> Self {
        Self {
            model,
            history,
            context_turns: 3,
        }
    }

    /// How many past exchanges are shown to the model
    pub fn with_context_turns(mut self, turns: usize) -> Self {
        self.context_turns = turns;
        self
    }

    pub fn history(&self) -> &Arc<ConversationHistory> {
        &self.history
    }

    async fn system_prompt(&self, topic: ConversationTopic) -> String {
        let mut prompt = format!(
            "{}\n\n{}\n\n{}.",
            PERSONA,
            topic.guidance(),
            self.history.summary().await
        );
        let recent = self.history.recent(self.context_turns).await;
        if !recent.is_empty() {
            prompt.push_str("\n\nRecent conversation:");
            for exchange in &recent {
                prompt.push_str(&format!(
                    "\nUser: {}\nVaani: {}",
                    exchange.user_input, exchange.response
                ));
            }
        }
        prompt
    }

    async fn reply(&self, utterance: &str, topic: ConversationTopic) -> String {
        let Some(model) = &self.model else {
            return topic.template().to_string();
        };
        if utterance.is_empty() {
            return topic.template().to_string();
        }

        let system = self.system_prompt(topic).await;
        match model.complete(&system, utterance).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("Model {} returned an empty reply", model.model_name());
                topic.template().to_string()
            }
            Err(e) => {
                warn!("Conversational model call failed, using template: {}", e);
                topic.template().to_string()
            }
        }
    }
}

#[async_trait]
impl Capability for ConversationalResponder {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::ConversationalResponder
    }

    fn description(&self) -> &str {
        "Chat, answer questions and explain what Vaani can do"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "utterance": {
                    "type": "string",
                    "description": "What the user said"
                }
            }),
            vec!["utterance"],
        )
    }

    async fn execute(&self, input: Value) -> Result<CapabilityResult> {
        let utterance = str_field(&input, "utterance").unwrap_or("");
        let topic = ConversationTopic::detect(utterance);
        debug!("Conversation topic: {}", topic);

        let response = self.reply(utterance, topic).await;
        self.history
            .record(Exchange::new(utterance, topic, &response))
            .await;

        Ok(CapabilityResult::ok(response.clone())
            .with_payload("topic", topic.as_str())
            .with_payload("history_len", self.history.len().await))
    }
}
