//! Common error infrastructure for stats-core.
//!
//! Domain errors (see [`crate::graph::GraphError`]) implement [`StatsError`] so
//! callers can decide how to react without matching every variant.
//!
//! # Design Principles
//!
//! - **No partial state**: a rejected topology change leaves the graph untouched
//! - **Unresolved is not failure**: a path that currently leads nowhere is the
//!   normal "waiting for a link" state, surfaced only by explicit lookups
//! - **Degrade, don't crash**: malformed declarative input becomes a neutral
//!   modifier plus a diagnostic

/// Severity level of an error, used for categorization and recovery strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Transient condition that resolves once topology allows.
    ///
    /// Examples: path not linked yet, pointer target not resolved yet
    Recoverable,

    /// Invalid request, rejected without any state change.
    ///
    /// Examples: self pointer, alias cycle, unknown processor
    Validation,

    /// Unexpected state inconsistency. Indicates a bug.
    Internal,
}

impl ErrorSeverity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
        }
    }

    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal)
    }
}

/// Common trait for all stats-core errors.
pub trait StatsError: core::fmt::Display + core::fmt::Debug {
    fn severity(&self) -> ErrorSeverity;

    /// Static identifier for the error variant (for metrics and tests).
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}
