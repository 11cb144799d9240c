//! Message composer: resolves a contact and builds a click-to-chat link

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use url::Url;

use super::{Capability, json_schema, str_field};
use crate::error::RouterError;
use crate::types::{CapabilityKind, CapabilityResult};

pub const DEFAULT_LINK_BASE: &str = "https://wa.me";

const USAGE_HINT: &str = "Please try: 'Send WhatsApp to [name]: [message]'";

/// Mock address book, name (lowercase) to phone number
#[derive(Debug, Clone)]
pub struct ContactDirectory {
    contacts: BTreeMap<String, String>,
}

/// A resolved contact
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub name: String,
    pub phone: String,
}

impl Contact {
    /// Phone number reduced to its digits, as used in chat links
    pub fn digits(&self) -> String {
        self.phone.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}

impl Default for ContactDirectory {
    fn default() -> Self {
        let seed = [
            ("jay", "+919321781905"),
            ("vijay", "+919876543211"),
            ("mom", "+919876543212"),
            ("dad", "+919876543213"),
            ("john", "+919876543214"),
            ("alice", "+919876543215"),
            ("boss", "+919876543216"),
        ];
        Self {
            contacts: seed
                .iter()
                .map(|(n, p)| (n.to_string(), p.to_string()))
                .collect(),
        }
    }
}

impl ContactDirectory {
    pub fn empty() -> Self {
        Self {
            contacts: BTreeMap::new(),
        }
    }

    /// Add or override contacts, e.g. from the `[contacts]` config table
    pub fn with_contacts(mut self, extra: &HashMap<String, String>) -> Self {
        for (name, phone) in extra {
            self.insert(name, phone);
        }
        self
    }

    pub fn insert(&mut self, name: &str, phone: &str) {
        self.contacts
            .insert(name.trim().to_lowercase(), phone.trim().to_string());
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Exact match first, then a prefix match in either direction
    /// ("mo" finds mom, "jays" finds jay)
    pub fn lookup(&self, name: &str) -> Option<Contact> {
        let key = name.trim().trim_start_matches('@').to_lowercase();
        if key.is_empty() {
            return None;
        }

        if let Some(phone) = self.contacts.get(&key) {
            return Some(Contact {
                name: key,
                phone: phone.clone(),
            });
        }

        if key.len() < 2 {
            return None;
        }

        self.contacts
            .iter()
            .filter(|(known, _)| known.starts_with(&key) || key.starts_with(known.as_str()))
            .min_by_key(|(known, _)| known.len().abs_diff(key.len()))
            .map(|(known, phone)| {
                debug!("Fuzzy contact match {:?} -> {:?}", key, known);
                Contact {
                    name: known.clone(),
                    phone: phone.clone(),
                }
            })
    }
}

/// Recipient and body pulled out of a messaging command
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    pub recipient: String,
    pub message: String,
}

/// Words that surround the recipient in a command head and are not part of it
const HEAD_FILLER: &[&str] = &[
    "send", "a", "whatsapp", "message", "text", "to", "on", "tell", "please", "msg",
];

/// Command prefixes after which the next word is the recipient
const RECIPIENT_PREFIXES: &[&str] = &[
    "send a whatsapp message to",
    "send a whatsapp to",
    "send whatsapp message to",
    "send whatsapp to",
    "send a message to",
    "send message to",
    "whatsapp to",
    "message to",
    "text to",
    "whatsapp",
    "message",
    "text",
    "tell",
];

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        let rest = &text[prefix.len()..];
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return Some(rest.trim_start());
        }
    }
    None
}

fn clean_name(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric()).to_string()
}

/// Parse the supported command shapes:
/// `Send WhatsApp to X: msg`, `Message X on WhatsApp: msg`, `WhatsApp X: msg`,
/// `Tell X msg`, `Send WhatsApp to X msg`, `Send msg to X`
pub fn parse_message_command(utterance: &str) -> Option<ParsedMessage> {
    let text = utterance.trim();

    if let Some((head, body)) = text.split_once(':') {
        let message = body.trim();
        let recipient: Vec<String> = head
            .split_whitespace()
            .filter(|w| !HEAD_FILLER.contains(&w.to_lowercase().as_str()))
            .map(clean_name)
            .filter(|w| !w.is_empty())
            .collect();
        if !message.is_empty() && !recipient.is_empty() {
            return Some(ParsedMessage {
                recipient: recipient.join(" "),
                message: message.to_string(),
            });
        }
    }

    for prefix in RECIPIENT_PREFIXES {
        if let Some(rest) = strip_prefix_ci(text, prefix) {
            let mut words = rest.splitn(2, char::is_whitespace);
            let recipient = words.next().map(clean_name).unwrap_or_default();
            let message = words
                .next()
                .map(|m| {
                    let m = m.trim();
                    strip_prefix_ci(m, "that").unwrap_or(m)
                })
                .unwrap_or("");
            if !recipient.is_empty()
                && !message.is_empty()
                && !HEAD_FILLER.contains(&recipient.to_lowercase().as_str())
            {
                return Some(ParsedMessage {
                    recipient,
                    message: message.to_string(),
                });
            }
        }
    }

    // "send <msg> to <name> [on whatsapp]"
    // ASCII lowercasing keeps byte offsets valid for slicing `rest`
    if let Some(rest) = strip_prefix_ci(text, "send") {
        let lower = rest.to_ascii_lowercase();
        let rest = match lower.rfind(" on whatsapp") {
            Some(i) => &rest[..i],
            None => rest,
        };
        let lower = rest.to_ascii_lowercase();
        if let Some(i) = lower.rfind(" to ") {
            let message = rest[..i].trim();
            let recipient = clean_name(rest[i + 4..].trim());
            let only_filler = message
                .split_whitespace()
                .all(|w| HEAD_FILLER.contains(&w.to_lowercase().as_str()));
            if !only_filler && !recipient.is_empty() {
                return Some(ParsedMessage {
                    recipient,
                    message: message.to_string(),
                });
            }
        }
    }

    None
}

/// Build `<base>/<digits>?text=<percent-encoded message>`
pub fn chat_link(base: &Url, digits: &str, message: &str) -> String {
    format!(
        "{}/{}?text={}",
        base.as_str().trim_end_matches('/'),
        digits,
        urlencoding::encode(message)
    )
}

/// Composes a WhatsApp message for a known contact
pub struct MessageComposer {
    directory: ContactDirectory,
    link_base: String,
}

impl MessageComposer {
    pub fn new(directory: ContactDirectory) -> Self {
        Self {
            directory,
            link_base: DEFAULT_LINK_BASE.to_string(),
        }
    }

    pub fn with_link_base(mut self, link_base: String) -> Self {
        self.link_base = link_base;
        self
    }

    pub fn directory(&self) -> &ContactDirectory {
        &self.directory
    }

    fn compose(&self, recipient: &str, message: &str) -> Result<CapabilityResult> {
        let Some(contact) = self.directory.lookup(recipient) else {
            let err = RouterError::CapabilityNotFound(format!("contact '{}'", recipient));
            return Ok(CapabilityResult::failed(
                format!(
                    "Contact '{}' not found in your contacts. Please add the contact first.",
                    recipient
                ),
                err.to_string(),
            )
            .with_payload("recipient", recipient));
        };

        let base = Url::parse(&self.link_base)
            .with_context(|| format!("Invalid message link base: {}", self.link_base))?;
        let link = chat_link(&base, &contact.digits(), message);

        debug!("Composed message link for {}", contact.name);

        Ok(CapabilityResult::ok(format!(
            "WhatsApp message ready for {}! Click the link to send: {}",
            recipient, link
        ))
        .with_payload("recipient", recipient)
        .with_payload("phone", contact.phone.as_str())
        .with_payload("message", message)
        .with_payload("link", link))
    }
}

#[async_trait]
impl Capability for MessageComposer {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::MessageComposer
    }

    fn description(&self) -> &str {
        "Send WhatsApp messages to your contacts, e.g. 'Send WhatsApp to Jay: Hello'"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "recipient": {
                    "type": "string",
                    "description": "Contact name"
                },
                "message": {
                    "type": "string",
                    "description": "Message body"
                },
                "utterance": {
                    "type": "string",
                    "description": "Free-text command, parsed when recipient/message are absent"
                }
            }),
            vec![],
        )
    }

    async fn execute(&self, input: Value) -> Result<CapabilityResult> {
        if let Some(recipient) = str_field(&input, "recipient") {
            return match str_field(&input, "message") {
                Some(message) => self.compose(recipient, message),
                None => Ok(CapabilityResult::failed(
                    format!("What should I tell {}? {}", recipient, USAGE_HINT),
                    "missing message",
                )),
            };
        }

        let utterance = str_field(&input, "utterance").unwrap_or("");
        match parse_message_command(utterance) {
            Some(parsed) => self.compose(&parsed.recipient, &parsed.message),
            None => Ok(CapabilityResult::failed(
                format!("Could not understand the WhatsApp command. {}", USAGE_HINT),
                "unparsable message command",
            )),
        }
    }
}
