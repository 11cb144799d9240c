//! Composite workflow resolution
//!
//! Turns a composite utterance into a [`WorkflowPlan`] (via the structured
//! extraction call, or the keyword fallback when that yields nothing usable)
//! and runs it. Every path ends in a `CapabilityResult`; sub-capability errors
//! are converted, never propagated.

use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::capabilities::CapabilityRegistry;
use crate::capabilities::files::query_from_utterance;
use crate::cues::CueSet;
use crate::error::RouterError;
use crate::model::LanguageModel;
use crate::types::{
    CapabilityKind, CapabilityResult, FileMatch, STEP_FILE_SEARCH_FAILED, STEP_MESSAGE_FAILED,
};
use crate::workflow::{
    Extraction, WorkflowPlan, WorkflowStep, WorkflowType, candidate_recipient,
    extract_file_query, parse_extraction,
};

const EXTRACTION_PROMPT: &str = "Analyze this command to determine the multi-step workflow needed.\n\
\n\
WORKFLOW TYPES:\n\
1. file-to-message: find a file and send it to someone via WhatsApp\n\
2. search-and-share: search for files and prepare them for sharing\n\
3. message-only: just send a WhatsApp message, no file involved\n\
\n\
Examples:\n\
- \"Send report.pdf to boss on WhatsApp\" -> file-to-message, report.pdf, boss\n\
- \"Find my photos and share with mom\" -> search-and-share, photos, mom\n\
- \"Tell jay the meeting moved\" -> message-only, jay, the meeting moved\n\
\n\
Return exactly these lines:\n\
WORKFLOW: [type]\n\
FILE: [file name or search words, or empty]\n\
RECIPIENT: [person, or empty]\n\
MESSAGE: [message content, or empty]";

/// How many matches a search-and-share reply lists
const SHARE_LIST_LIMIT: usize = 3;

pub struct CompositeResolver {
    registry: Arc<CapabilityRegistry>,
    cues: Arc<CueSet>,
    model: Option<Arc<dyn LanguageModel>>,
}

impl CompositeResolver {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        cues: Arc<CueSet>,
        model: Option<Arc<dyn LanguageModel>>,
    ) -> Self {
        Self {
            registry,
            cues,
            model,
        }
    }

    /// Resolve and run a composite utterance
    pub async fn resolve(&self, utterance: &str) -> CapabilityResult {
        let plan = match self.extract(utterance).await {
            Ok(extraction) => {
                debug!("Extraction for {:?}: {:?}", utterance, extraction);
                WorkflowPlan::from_extraction(&extraction, utterance)
            }
            Err(e) => {
                warn!("{}; using keyword workflow", e);
                None
            }
        };

        match plan {
            Some(plan) => {
                info!("Running {} workflow", plan.workflow);
                self.execute_plan(&plan).await
            }
            None => self.resolve_generic(utterance).await,
        }
    }

    async fn extract(&self, utterance: &str) -> Result<Extraction, RouterError> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| RouterError::Extraction("no model configured".to_string()))?;

        let raw = model
            .complete(EXTRACTION_PROMPT, utterance)
            .await
            .map_err(|e| RouterError::Extraction(e.to_string()))?;

        Ok(parse_extraction(&raw, &self.cues))
    }

    /// Run a plan built by [`WorkflowPlan`]
    pub async fn execute_plan(&self, plan: &WorkflowPlan) -> CapabilityResult {
        let result = match (plan.workflow, plan.steps.as_slice()) {
            (WorkflowType::FileToMessage, [locate, compose]) => {
                self.file_to_message(locate, compose).await
            }
            (WorkflowType::SearchAndShare, [locate]) => self.search_and_share(locate).await,
            (WorkflowType::MessageOnly, [compose]) => {
                self.invoke(compose.capability, Value::Object(compose.params.clone()))
                    .await
            }
            (workflow, steps) => CapabilityResult::failed(
                "I had trouble planning that request. Could you try breaking it down?",
                format!("{} plan has {} steps", workflow, steps.len()),
            ),
        };
        result.with_payload("workflow", plan.workflow.as_str())
    }

    /// Keyword fallback when extraction produced no usable plan
    async fn resolve_generic(&self, utterance: &str) -> CapabilityResult {
        let lower = utterance.to_lowercase();
        let named_file = extract_file_query(utterance);
        let has_file = self.cues.has_file_reference(&lower) || named_file.is_some();
        let recipient = candidate_recipient(utterance, &self.cues);

        if has_file {
            let query = named_file.unwrap_or_else(|| query_from_utterance(utterance));
            if !query.is_empty() {
                let plan = match &recipient {
                    Some(r) => WorkflowPlan::file_to_message(&query, r, None),
                    None => WorkflowPlan::search_and_share(&query, None),
                };
                debug!("Keyword workflow {} for {:?}", plan.workflow, utterance);
                return self.execute_plan(&plan).await;
            }
        }

        let fallback = if self.cues.has_communication(&lower) {
            CapabilityKind::MessageComposer
        } else {
            CapabilityKind::ConversationalResponder
        };
        debug!("Keyword workflow delegating {:?} to {}", utterance, fallback);
        self.invoke(fallback, json!({ "utterance": utterance })).await
    }

    async fn file_to_message(&self, locate: &WorkflowStep, compose: &WorkflowStep) -> CapabilityResult {
        let query = locate.param("query").unwrap_or_default();
        let recipient = compose.param("recipient").unwrap_or_default().to_string();

        let found = self
            .registry
            .invoke(locate.capability, Value::Object(locate.params.clone()))
            .await;
        let (found, search_error) = match found {
            Ok(r) => {
                let error = r.error.clone();
                (r.matches(), error)
            }
            Err(e) => (Vec::new(), Some(e.to_string())),
        };

        let Some(best) = found.into_iter().next() else {
            return CapabilityResult::failed(
                format!(
                    "I couldn't find '{}'. Please check the filename and try again.",
                    query
                ),
                search_error.unwrap_or_else(|| {
                    RouterError::CapabilityNotFound(format!("file matching '{}'", query)).to_string()
                }),
            )
            .with_payload("step", STEP_FILE_SEARCH_FAILED);
        };

        // Feed the located file into the compose step
        let mut params = compose.params.clone();
        if !params.contains_key("message") {
            params.insert(
                "message".to_string(),
                json!(format!("Sharing file: {}", best.label())),
            );
        }

        let file = file_value(&best);
        match self
            .registry
            .invoke(compose.capability, Value::Object(params))
            .await
        {
            Ok(sent) if sent.success => {
                let mut result = CapabilityResult::ok(format!(
                    "Found '{}' and prepared a WhatsApp message for {}!\nFile: {}\n{}",
                    best.name,
                    recipient,
                    best.label(),
                    sent.message
                ))
                .with_payload("recipient", recipient.as_str())
                .with_payload("file", file);
                if let Some(link) = sent.payload.get("link") {
                    result = result.with_payload("link", link.clone());
                }
                result
            }
            Ok(sent) => CapabilityResult::failed(
                format!(
                    "I found '{}' but couldn't create the WhatsApp message: {}",
                    best.name, sent.message
                ),
                sent.error
                    .unwrap_or_else(|| format!("{} did not complete", compose.capability)),
            )
            .with_payload("step", STEP_MESSAGE_FAILED)
            .with_payload("recipient", recipient.as_str())
            .with_payload("file", file),
            Err(e) => CapabilityResult::failed(
                format!(
                    "I found '{}' but couldn't create the WhatsApp message.",
                    best.name
                ),
                e.to_string(),
            )
            .with_payload("step", STEP_MESSAGE_FAILED)
            .with_payload("recipient", recipient.as_str())
            .with_payload("file", file),
        }
    }

    async fn search_and_share(&self, locate: &WorkflowStep) -> CapabilityResult {
        let query = locate.param("query").unwrap_or_default();
        let recipient = locate.param("recipient");

        let search = json!({ "query": query });
        let (matches, error) = match self.registry.invoke(locate.capability, search).await {
            Ok(r) => {
                let error = r.error.clone();
                (r.matches(), error)
            }
            Err(e) => (Vec::new(), Some(e.to_string())),
        };

        if matches.is_empty() {
            return CapabilityResult::failed(
                format!(
                    "No files found matching '{}'. Try a different search term.",
                    query
                ),
                error.unwrap_or_else(|| {
                    RouterError::CapabilityNotFound(format!("file matching '{}'", query)).to_string()
                }),
            )
            .with_payload("matches", Vec::<Value>::new());
        }

        let mut message = format!(
            "Found {} file(s) matching '{}' ready for sharing:\n",
            matches.len(),
            query
        );
        for (i, m) in matches.iter().take(SHARE_LIST_LIMIT).enumerate() {
            message.push_str(&format!("\n{}. {}", i + 1, m.label()));
        }
        message.push_str(&format!(
            "\n\nSay 'Send [filename] to {} on WhatsApp' to share!",
            recipient.unwrap_or("[contact]")
        ));

        let listed: Vec<Value> = matches.iter().map(file_value).collect();
        let mut result = CapabilityResult::ok(message).with_payload("matches", listed);
        if let Some(r) = recipient {
            result = result.with_payload("recipient", r);
        }
        result
    }

    /// Invoke one capability, converting any error into a failed result
    async fn invoke(&self, kind: CapabilityKind, input: Value) -> CapabilityResult {
        match self.registry.invoke(kind, input).await {
            Ok(result) => result,
            Err(e) => CapabilityResult::failed(
                "Sorry, I had trouble with that request. Could you try breaking it down?",
                e.to_string(),
            ),
        }
    }
}

fn file_value(file: &FileMatch) -> Value {
    json!({
        "name": file.name,
        "path": file.path,
        "size_bytes": file.size_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{Capability, json_schema};
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every input and answers from a fixed script
    struct Stub {
        kind: CapabilityKind,
        reply: Box<dyn Fn(&Value) -> Result<CapabilityResult> + Send + Sync>,
        calls: Mutex<Vec<Value>>,
    }

    impl Stub {
        fn new(
            kind: CapabilityKind,
            reply: impl Fn(&Value) -> Result<CapabilityResult> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                kind,
                reply: Box::new(reply),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Value> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Capability for Stub {
        fn kind(&self) -> CapabilityKind {
            self.kind
        }

        fn description(&self) -> &str {
            "stub"
        }

        fn input_schema(&self) -> Value {
            json_schema(json!({}), vec![])
        }

        async fn execute(&self, input: Value) -> Result<CapabilityResult> {
            self.calls.lock().unwrap().push(input.clone());
            (self.reply)(&input)
        }
    }

    struct Scripted(&'static str);

    #[async_trait]
    impl LanguageModel for Scripted {
        async fn complete(&self, _system: &str, _input: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn one_match(name: &str, size: u64) -> Result<CapabilityResult> {
        Ok(CapabilityResult::ok("found").with_payload(
            "matches",
            json!([{ "name": name, "path": format!("/home/u/{}", name), "size_bytes": size }]),
        ))
    }

    fn no_match() -> Result<CapabilityResult> {
        Ok(CapabilityResult::failed("nothing", "not found: file").with_payload("matches", json!([])))
    }

    fn composed(input: &Value) -> Result<CapabilityResult> {
        Ok(CapabilityResult::ok("ready").with_payload(
            "link",
            format!("https://wa.me/1?text={}", input["message"].as_str().unwrap_or("")),
        ))
    }

    struct Fixture {
        files: Arc<Stub>,
        composer: Arc<Stub>,
        chat: Arc<Stub>,
    }

    impl Fixture {
        fn new(files: Arc<Stub>) -> Self {
            Self {
                files,
                composer: Stub::new(CapabilityKind::MessageComposer, composed),
                chat: Stub::new(CapabilityKind::ConversationalResponder, |_| {
                    Ok(CapabilityResult::ok("let's chat"))
                }),
            }
        }

        fn with_composer(mut self, composer: Arc<Stub>) -> Self {
            self.composer = composer;
            self
        }

        fn resolver(&self, model: Option<&'static str>) -> CompositeResolver {
            let mut registry = CapabilityRegistry::new();
            registry.register(self.files.clone());
            registry.register(self.composer.clone());
            registry.register(self.chat.clone());
            CompositeResolver::new(
                Arc::new(registry),
                Arc::new(CueSet::default()),
                model.map(|m| Arc::new(Scripted(m)) as Arc<dyn LanguageModel>),
            )
        }
    }

    #[tokio::test]
    async fn test_file_to_message_success() {
        let fx = Fixture::new(Stub::new(CapabilityKind::FileLocator, |_| {
            one_match("report.pdf", 2_097_152)
        }));
        let resolver = fx.resolver(Some(
            "WORKFLOW: file-to-message\nFILE: report.pdf\nRECIPIENT: boss\nMESSAGE: empty",
        ));

        let result = resolver.resolve("Send report.pdf to boss on WhatsApp").await;
        assert!(result.success);
        assert!(result.message.contains("2.0MB"));
        assert!(result.message.contains("boss"));
        assert_eq!(result.payload["workflow"], "file-to-message");
        assert_eq!(result.payload["file"]["name"], "report.pdf");
        assert!(result.payload.contains_key("link"));

        let sent = fx.composer.calls();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["recipient"], "boss");
        assert_eq!(sent[0]["message"], "Sharing file: report.pdf (2.0MB)");
    }

    #[tokio::test]
    async fn test_custom_message_overrides_summary() {
        let fx = Fixture::new(Stub::new(CapabilityKind::FileLocator, |_| {
            one_match("deck.pptx", 10)
        }));
        let resolver = fx.resolver(Some(
            "WORKFLOW: file-to-message\nFILE: deck\nRECIPIENT: jay\nMESSAGE: final version attached",
        ));
        resolver.resolve("send the deck to jay, final version").await;
        assert_eq!(fx.composer.calls()[0]["message"], "final version attached");
    }

    #[tokio::test]
    async fn test_zero_matches_never_invokes_composer() {
        let fx = Fixture::new(Stub::new(CapabilityKind::FileLocator, |_| no_match()));
        let resolver = fx.resolver(Some(
            "WORKFLOW: file-to-message\nFILE: ghost.pdf\nRECIPIENT: boss",
        ));

        let result = resolver.resolve("send ghost.pdf to boss").await;
        assert!(!result.success);
        assert_eq!(result.step(), Some(STEP_FILE_SEARCH_FAILED));
        assert!(result.error.is_some());
        assert!(fx.composer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_locator_error_is_search_failure() {
        let fx = Fixture::new(Stub::new(CapabilityKind::FileLocator, |_| {
            Err(anyhow!("permission denied"))
        }));
        let resolver = fx.resolver(Some(
            "WORKFLOW: file-to-message\nFILE: report.pdf\nRECIPIENT: boss",
        ));

        let result = resolver.resolve("send report.pdf to boss").await;
        assert_eq!(result.step(), Some(STEP_FILE_SEARCH_FAILED));
        assert!(result.error.unwrap().contains("permission denied"));
        assert!(fx.composer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_message_failure_keeps_file_metadata() {
        let fx = Fixture::new(Stub::new(CapabilityKind::FileLocator, |_| {
            one_match("report.pdf", 1024)
        }))
        .with_composer(Stub::new(CapabilityKind::MessageComposer, |_| {
            Ok(CapabilityResult::failed(
                "Contact 'sarah' not found",
                "not found: contact 'sarah'",
            ))
        }));
        let resolver = fx.resolver(Some(
            "WORKFLOW: file-to-message\nFILE: report.pdf\nRECIPIENT: sarah",
        ));

        let result = resolver.resolve("send report.pdf to sarah").await;
        assert!(!result.success);
        assert_eq!(result.step(), Some(STEP_MESSAGE_FAILED));
        assert_eq!(result.payload["file"]["name"], "report.pdf");
        assert_eq!(result.error.as_deref(), Some("not found: contact 'sarah'"));
    }

    #[tokio::test]
    async fn test_composer_error_is_message_failure() {
        let fx = Fixture::new(Stub::new(CapabilityKind::FileLocator, |_| {
            one_match("report.pdf", 1024)
        }))
        .with_composer(Stub::new(CapabilityKind::MessageComposer, |_| {
            Err(anyhow!("link base invalid"))
        }));
        let resolver = fx.resolver(Some(
            "WORKFLOW: file-to-message\nFILE: report.pdf\nRECIPIENT: boss",
        ));

        let result = resolver.resolve("send report.pdf to boss").await;
        assert_eq!(result.step(), Some(STEP_MESSAGE_FAILED));
        assert!(result.error.unwrap().contains("link base invalid"));
    }

    #[tokio::test]
    async fn test_search_and_share_lists_top_three() {
        let fx = Fixture::new(Stub::new(CapabilityKind::FileLocator, |_| {
            Ok(CapabilityResult::ok("found").with_payload(
                "matches",
                json!([
                    {"name": "beach.jpg", "path": "/p/beach.jpg", "size_bytes": 1048576},
                    {"name": "hills.jpg", "path": "/p/hills.jpg", "size_bytes": 1048576},
                    {"name": "city.jpg", "path": "/p/city.jpg", "size_bytes": 1048576},
                    {"name": "lake.jpg", "path": "/p/lake.jpg", "size_bytes": 1048576}
                ]),
            ))
        }));
        let resolver = fx.resolver(Some(
            "WORKFLOW: search-and-share\nFILE: photos\nRECIPIENT: mom",
        ));

        let result = resolver.resolve("find my photos and share with mom").await;
        assert!(result.success);
        assert!(result.message.contains("1. beach.jpg (1.0MB)"));
        assert!(result.message.contains("3. city.jpg"));
        assert!(!result.message.contains("lake.jpg"));
        assert!(result.message.contains("to mom on WhatsApp"));
        assert_eq!(result.payload["matches"].as_array().unwrap().len(), 4);
        assert!(fx.composer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_message_only_bypasses_file_lookup() {
        let fx = Fixture::new(Stub::new(CapabilityKind::FileLocator, |_| no_match()));
        let resolver = fx.resolver(Some(
            "WORKFLOW: message-only\nFILE:\nRECIPIENT: jay\nMESSAGE: running late",
        ));

        let result = resolver.resolve("text jay that I'm running late").await;
        assert!(result.success);
        assert!(fx.files.calls().is_empty());
        assert_eq!(fx.composer.calls()[0]["message"], "running late");
    }

    #[tokio::test]
    async fn test_stop_word_recipient_falls_back_to_keywords() {
        // "RECIPIENT: to" is discarded, so the plan is unusable and the
        // keyword handler picks "boss" from the utterance instead
        let fx = Fixture::new(Stub::new(CapabilityKind::FileLocator, |_| {
            one_match("report.pdf", 2_097_152)
        }));
        let resolver = fx.resolver(Some(
            "WORKFLOW: file-to-message\nFILE: report.pdf\nRECIPIENT: to",
        ));

        let result = resolver.resolve("Send report.pdf to boss on WhatsApp").await;
        assert!(result.success);
        assert_eq!(fx.composer.calls()[0]["recipient"], "boss");
    }

    #[tokio::test]
    async fn test_generic_without_model_file_and_recipient() {
        let fx = Fixture::new(Stub::new(CapabilityKind::FileLocator, |_| {
            one_match("report.pdf", 2_097_152)
        }));
        let result = fx.resolver(None).resolve("send the report to jay").await;
        assert!(result.success);
        assert_eq!(fx.files.calls()[0]["query"], "report");
        assert_eq!(fx.composer.calls()[0]["recipient"], "jay");
    }

    #[tokio::test]
    async fn test_generic_file_only_searches() {
        let fx = Fixture::new(Stub::new(CapabilityKind::FileLocator, |_| {
            one_match("budget.xlsx", 2048)
        }));
        let result = fx.resolver(None).resolve("share the budget spreadsheet").await;
        assert!(result.success);
        assert_eq!(result.payload["workflow"], "search-and-share");
        assert!(fx.composer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_generic_communication_only_delegates_to_composer() {
        let fx = Fixture::new(Stub::new(CapabilityKind::FileLocator, |_| no_match()));
        fx.resolver(Some("I don't know")).resolve("tell jay hi").await;
        assert!(fx.files.calls().is_empty());
        assert_eq!(fx.composer.calls()[0]["utterance"], "tell jay hi");
    }

    #[tokio::test]
    async fn test_generic_last_resort_is_conversation() {
        let fx = Fixture::new(Stub::new(CapabilityKind::FileLocator, |_| no_match()));
        let result = fx.resolver(None).resolve("do the thing").await;
        assert_eq!(result.message, "let's chat");
        assert_eq!(fx.chat.calls().len(), 1);
    }
}
