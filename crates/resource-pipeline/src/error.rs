//! # Pipeline Errors
//!
//! This module defines the error types shared by the pipeline engine, the step catalog and the
//! storage adapters. Steps return [`PipelineError`] and the engine hands the first one back to
//! the caller untouched; mapping onto a wire status is the transport's job, which is what
//! [`PipelineError::code`] is for.

use std::fmt;

/// Transport-neutral status code for a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    NotFound,
    AlreadyExists,
    InvalidArgument,
    Internal,
    Cancelled,
    DeadlineExceeded,
    Unimplemented,
    Unavailable,
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Code::NotFound => "not_found",
            Code::AlreadyExists => "already_exists",
            Code::InvalidArgument => "invalid_argument",
            Code::Internal => "internal",
            Code::Cancelled => "cancelled",
            Code::DeadlineExceeded => "deadline_exceeded",
            Code::Unimplemented => "unimplemented",
            Code::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// Errors produced while executing a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },
    #[error("{kind} with slug '{slug}' already exists: {id}")]
    AlreadyExists {
        kind: String,
        slug: String,
        id: String,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("internal error: {0}")]
    Internal(String),
    /// A step read a slot that no earlier step filled.
    #[error("{0} is not set on the request context")]
    StateNotSet(&'static str),
    #[error("pipeline '{pipeline}' is misconfigured: step '{step}' requires {requirement}")]
    Misconfigured {
        pipeline: String,
        step: &'static str,
        requirement: &'static str,
    },
    #[error("request cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("operation not implemented: {0}")]
    Unimplemented(&'static str),
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl PipelineError {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn code(&self) -> Code {
        match self {
            PipelineError::NotFound { .. } => Code::NotFound,
            PipelineError::AlreadyExists { .. } => Code::AlreadyExists,
            PipelineError::InvalidArgument(_) => Code::InvalidArgument,
            PipelineError::Internal(_)
            | PipelineError::StateNotSet(_)
            | PipelineError::Misconfigured { .. } => Code::Internal,
            PipelineError::Cancelled => Code::Cancelled,
            PipelineError::DeadlineExceeded => Code::DeadlineExceeded,
            PipelineError::Unimplemented(_) => Code::Unimplemented,
            PipelineError::Unavailable(_) => Code::Unavailable,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Code::NotFound
    }
}

/// Errors surfaced by a [`ResourceStore`](crate::store::ResourceStore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("key not found: {key}")]
    NotFound { key: String },
    #[error("invalid key segment: {0}")]
    InvalidKey(String),
    #[error("serialization failure: {0}")]
    Serialization(String),
    #[error("storage I/O failure: {0}")]
    Io(String),
    #[error("storage failure: {0}")]
    Internal(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl StoreError {
    /// Converts a store failure into the pipeline taxonomy. A missing key becomes `NotFound`
    /// for the given kind and id, a rejected key `InvalidArgument`, anything else `Internal`.
    pub fn into_pipeline(self, kind: &str, id: &str) -> PipelineError {
        match self {
            StoreError::NotFound { .. } => PipelineError::not_found(kind, id),
            StoreError::InvalidKey(msg) => PipelineError::InvalidArgument(msg),
            other => PipelineError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(PipelineError::not_found("Agent", "agt-1").code(), Code::NotFound);
        assert_eq!(PipelineError::StateNotSet("new_state").code(), Code::Internal);
        assert_eq!(
            StoreError::Io("disk".into())
                .into_pipeline("Agent", "agt-1")
                .code(),
            Code::Internal
        );
        assert_eq!(
            StoreError::NotFound { key: "Agent/agt-1".into() }.into_pipeline("Agent", "agt-1"),
            PipelineError::not_found("Agent", "agt-1")
        );
    }
}
