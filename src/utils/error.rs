//! Engine error taxonomy
//!
//! Errors are named by condition, not by transport. The hosting process
//! maps them to status codes (`ValidationError` → 400,
//! `ReferenceNotFound` → 404, everything else → 500).

use crate::graph::GraphError;
use serde::Serialize;
use thiserror::Error;

/// Errors that abort a search request
#[derive(Debug, Error)]
pub enum EngineError {
    /// Request failed semantic validation. Carries the offending path.
    #[error("validation failed at `{path}`: {message}")]
    Validation { path: String, message: String },

    /// Similarity mode was requested against an engineer that does not exist.
    #[error("reference engineer not found: {0}")]
    ReferenceNotFound(String),

    /// A graph query failed after its single retry.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Configuration was rejected at load time.
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { path: path.into(), message: message.into() }
    }

    /// Stable machine-readable code for the hosting process.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::ReferenceNotFound(_) => "REFERENCE_NOT_FOUND",
            Self::Graph(_) => "GRAPH_QUERY_FAILED",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Wire form carried to the caller on failure.
    pub fn to_payload(&self) -> ErrorPayload {
        let path = match self {
            Self::Validation { path, .. } => Some(path.clone()),
            _ => None,
        };
        ErrorPayload { code: self.code(), message: self.to_string(), path }
    }
}

/// User-visible failure shape: always `code`, `message`, offending path.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
