//! Language model seam used for intent classification, workflow extraction
//! and conversational replies

use anyhow::Result;
use async_trait::async_trait;

/// A text-in, text-out model call: `(system_instructions, input) -> text`.
///
/// Callers must tolerate arbitrary output. Timeouts and retries belong to the
/// implementation, never to the router.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, system: &str, input: &str) -> Result<String>;

    /// Model identifier, for logging
    fn model_name(&self) -> &str {
        "unknown"
    }
}
