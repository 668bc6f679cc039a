//! Errors surfaced by graph mutations and lookups.

use crate::error::{ErrorSeverity, StatsError};
use crate::ids::{AttributeKey, LinkPath, ProcessorId};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("processor {0} does not exist")]
    UnknownProcessor(ProcessorId),

    #[error("attribute `{key}` on {processor} cannot point to itself")]
    SelfReference {
        processor: ProcessorId,
        key: AttributeKey,
    },

    #[error("pointer `{alias}` -> `{target}` (path {path:?}) on {processor} would close an alias cycle")]
    CircularPointer {
        processor: ProcessorId,
        alias: AttributeKey,
        target: AttributeKey,
        path: LinkPath,
    },

    #[error("pointer `{key}` on {processor} has no resolved target")]
    InvalidTarget {
        processor: ProcessorId,
        key: AttributeKey,
    },

    #[error("path {path:?} from {root} does not resolve")]
    UnresolvedPath { root: ProcessorId, path: LinkPath },

    #[error("unknown modifier logic type `{0}`")]
    UnknownModifierType(String),
}

impl StatsError for GraphError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnknownProcessor(_)
            | Self::SelfReference { .. }
            | Self::CircularPointer { .. }
            | Self::UnknownModifierType(_) => ErrorSeverity::Validation,
            Self::InvalidTarget { .. } | Self::UnresolvedPath { .. } => ErrorSeverity::Recoverable,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownProcessor(_) => "UNKNOWN_PROCESSOR",
            Self::SelfReference { .. } => "SELF_REFERENCE",
            Self::CircularPointer { .. } => "CIRCULAR_POINTER",
            Self::InvalidTarget { .. } => "INVALID_TARGET",
            Self::UnresolvedPath { .. } => "UNRESOLVED_PATH",
            Self::UnknownModifierType(_) => "UNKNOWN_MODIFIER_TYPE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_errors_are_validation_failures() {
        let error = GraphError::CircularPointer {
            processor: ProcessorId(1),
            alias: "A".into(),
            target: "B".into(),
            path: LinkPath::new(),
        };
        assert_eq!(error.severity(), ErrorSeverity::Validation);
        assert_eq!(error.error_code(), "CIRCULAR_POINTER");

        let pending = GraphError::UnresolvedPath {
            root: ProcessorId(1),
            path: crate::ids::path(["Owner"]),
        };
        assert!(pending.severity().is_recoverable());
    }
}
