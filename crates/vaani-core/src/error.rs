//! Error taxonomy for the routing core
//!
//! None of these ever escape `Coordinator::handle`; they are rendered into the
//! `error` field of a failed result so the raw description stays available.

use thiserror::Error;

use crate::types::CapabilityKind;

#[derive(Debug, Error)]
pub enum RouterError {
    /// The fallback classifier call failed or returned something unusable
    #[error("classification failed: {0}")]
    Classification(String),

    /// The structured-extraction call failed or its output was malformed
    #[error("workflow extraction failed: {0}")]
    Extraction(String),

    /// A capability ran but the entity it was asked for does not exist
    #[error("not found: {0}")]
    CapabilityNotFound(String),

    /// A dispatched capability returned an error
    #[error("{capability} failed: {source}")]
    CapabilityExecution {
        capability: CapabilityKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("capability '{0}' is not registered")]
    Unregistered(CapabilityKind),
}

impl RouterError {
    pub fn execution(capability: CapabilityKind, source: anyhow::Error) -> Self {
        Self::CapabilityExecution { capability, source }
    }
}
