//! Lexical cue lists used by the heuristic routing rules
//!
//! The lists are data, not logic: they deserialize from the `[router.cues]`
//! config table and every field falls back to its default independently.
//! Matching is case-insensitive substring matching, which is ambiguous on
//! purpose ("intelligence" contains "tell"); the rule order in the classifier
//! decides what wins.

use serde::{Deserialize, Serialize};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_file_reference() -> Vec<String> {
    strings(&[
        "file", "document", "folder", "pdf", "doc", "excel", "spreadsheet", "presentation",
        "report", "photo", "picture", "image", "video", "music", "song", ".txt", ".csv",
    ])
}

fn default_file_operation() -> Vec<String> {
    strings(&["find", "search", "open", "locate", "show me", "look for", "where is"])
}

fn default_communication() -> Vec<String> {
    strings(&[
        "whatsapp", "message", "send", "tell", "text", "share", "let know", "inform", "chat",
    ])
}

fn default_message_command() -> Vec<String> {
    strings(&["send whatsapp", "whatsapp to", "message to", "text to"])
}

fn default_capability_question() -> Vec<String> {
    strings(&[
        "can you", "could you", "are you able", "do you", "what can", "how do", "how does",
        "how can", "tell me about", "what is", "what are", "explain", "why ", "who are you",
        "when ", "where are",
    ])
}

fn default_conversational() -> Vec<String> {
    strings(&[
        "hello", "hi ", "hey", "good morning", "good afternoon", "good evening", "how are you",
        "what's up", "thank", "appreciate", "bye", "see you", "help me", "vaani",
    ])
}

fn default_stop_words() -> Vec<String> {
    strings(&[
        "to", "for", "with", "about", "on", "in", "at", "of", "from", "by", "via", "the", "a",
        "an", "and", "or", "my", "me", "it", "this", "that", "whatsapp",
    ])
}

fn default_recipient_prepositions() -> Vec<String> {
    strings(&["to", "for"])
}

/// Closed keyword lists driving the classifier and the generic workflow handler
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CueSet {
    /// Nouns denoting documents and media
    #[serde(default = "default_file_reference")]
    pub file_reference: Vec<String>,
    /// Verbs asking for a file to be found or opened
    #[serde(default = "default_file_operation")]
    pub file_operation: Vec<String>,
    /// Terms denoting sending, telling or sharing
    #[serde(default = "default_communication")]
    pub communication: Vec<String>,
    /// Explicit messaging commands that outrank the capability-question guard
    #[serde(default = "default_message_command")]
    pub message_command: Vec<String>,
    /// Phrasings asking about abilities or open factual questions
    #[serde(default = "default_capability_question")]
    pub capability_question: Vec<String>,
    /// Greetings, thanks, farewells
    #[serde(default = "default_conversational")]
    pub conversational: Vec<String>,
    /// Closed-class words that are never a recipient or a file query
    #[serde(default = "default_stop_words")]
    pub stop_words: Vec<String>,
    /// Prepositions whose following word is taken as a candidate recipient
    #[serde(default = "default_recipient_prepositions")]
    pub recipient_prepositions: Vec<String>,
}

impl Default for CueSet {
    fn default() -> Self {
        Self {
            file_reference: default_file_reference(),
            file_operation: default_file_operation(),
            communication: default_communication(),
            message_command: default_message_command(),
            capability_question: default_capability_question(),
            conversational: default_conversational(),
            stop_words: default_stop_words(),
            recipient_prepositions: default_recipient_prepositions(),
        }
    }
}

/// True if any cue is a substring of `lower` (which must already be lowercased)
pub fn contains_any(lower: &str, cues: &[String]) -> bool {
    cues.iter()
        .any(|cue| !cue.is_empty() && lower.contains(cue.to_lowercase().as_str()))
}

impl CueSet {
    pub fn has_file_reference(&self, lower: &str) -> bool {
        contains_any(lower, &self.file_reference)
    }

    pub fn has_file_operation(&self, lower: &str) -> bool {
        contains_any(lower, &self.file_operation)
    }

    pub fn has_communication(&self, lower: &str) -> bool {
        contains_any(lower, &self.communication)
    }

    pub fn has_message_command(&self, lower: &str) -> bool {
        contains_any(lower, &self.message_command)
    }

    /// Capability or open factual question. A trailing `?` counts too.
    pub fn is_question(&self, lower: &str) -> bool {
        lower.trim_end().ends_with('?') || contains_any(lower, &self.capability_question)
    }

    pub fn is_conversational(&self, lower: &str) -> bool {
        // "hi" is only a greeting as a whole word
        let padded = format!("{} ", lower.trim());
        contains_any(&padded, &self.conversational)
    }

    /// Whole-token, case-insensitive stop word check
    pub fn is_stop_word(&self, word: &str) -> bool {
        let word = word.trim().to_lowercase();
        self.stop_words.iter().any(|s| s.eq_ignore_ascii_case(&word))
    }

    pub fn is_recipient_preposition(&self, word: &str) -> bool {
        self.recipient_prepositions
            .iter()
            .any(|p| p.eq_ignore_ascii_case(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cues_detect_file_and_communication() {
        let cues = CueSet::default();
        let text = "send the report to jay";
        assert!(cues.has_file_reference(text));
        assert!(cues.has_communication(text));
        assert!(!cues.has_message_command(text));
    }

    #[test]
    fn test_question_detection() {
        let cues = CueSet::default();
        assert!(cues.is_question("can you search files?"));
        assert!(cues.is_question("is it raining?"));
        assert!(cues.is_question("what is artificial intelligence"));
        assert!(!cues.is_question("find my report.pdf"));
    }

    #[test]
    fn test_conversational_whole_word_hi() {
        let cues = CueSet::default();
        assert!(cues.is_conversational("hi"));
        assert!(cues.is_conversational("hi there"));
        assert!(!cues.is_conversational("archive this"));
        assert!(cues.is_conversational("thank you so much"));
    }

    #[test]
    fn test_stop_words_are_whole_token() {
        let cues = CueSet::default();
        assert!(cues.is_stop_word("To"));
        assert!(cues.is_stop_word(" about "));
        assert!(!cues.is_stop_word("tom"));
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let cues: CueSet = toml::from_str(r#"communication = ["ping"]"#).unwrap();
        assert_eq!(cues.communication, vec!["ping".to_string()]);
        assert_eq!(cues.file_reference, CueSet::default().file_reference);
    }
}
