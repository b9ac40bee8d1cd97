//! Error types for the swarm mission system.

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type shared by every layer.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Planning Errors
    // =========================================================================
    /// A plan failed the hard safety gate. Fatal for the mission.
    #[error("Plan validation failed: {0}")]
    Validation(String),

    #[error("Planning error: {0}")]
    Planning(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    // =========================================================================
    // Memory Errors
    // =========================================================================
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // =========================================================================
    // External Capability Errors
    // =========================================================================
    #[error("Actuation error: {0}")]
    Actuation(String),

    #[error("Model provider error: {0}")]
    ModelProvider(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a planning error.
    pub fn planning(msg: impl Into<String>) -> Self {
        Self::Planning(msg.into())
    }

    /// Create an embedding error.
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Create a storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an actuation error.
    pub fn actuation(msg: impl Into<String>) -> Self {
        Self::Actuation(msg.into())
    }

    /// Create a model provider error.
    pub fn model_provider(msg: impl Into<String>) -> Self {
        Self::ModelProvider(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error must abort the mission before execution.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Raised when a reasoning response does not match the strict plan schema.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("response does not match plan schema: {0}")]
    Mismatch(#[from] serde_json::Error),

    #[error("response is not a JSON object")]
    NotAnObject,

    #[error("response content is not valid JSON: {0}")]
    InvalidJson(String),
}
