//! Reasoning capability traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// A schema-constrained completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredRequest {
    /// System instruction (safety rules plus retrieved context).
    pub system_prompt: String,
    /// The user's mission text.
    pub user_prompt: String,
    /// Name of the response schema.
    pub schema_name: String,
    /// JSON schema the response must satisfy.
    pub schema: Value,
}

/// Reasoning capability: structured completion and embedding generation.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Request a structured response. `Ok(None)` means the capability produced no content.
    async fn structured_complete(&self, request: &StructuredRequest) -> Result<Option<Value>>;

    /// Generate an embedding for text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
