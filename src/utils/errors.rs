//! Error types for the polyhedral code generator.
//!
//! One crate-level error enum covers the whole pipeline, from literal
//! parsing through schedule transformation to back-end emission. Every
//! variant carries a textual detail suitable for display.

use thiserror::Error;

/// Top-level error type for the framework.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad text in a set or relation literal.
    #[error("malformed literal near `{text}`: {detail}")]
    MalformedLiteral {
        /// The offending substring.
        text: String,
        /// What was expected instead.
        detail: String,
    },

    /// Composing relations or sets whose tuple names or arities disagree.
    #[error("space mismatch: {0}")]
    SpaceMismatch(String),

    /// Loop-level index out of range for a schedule.
    #[error("invalid loop level {level} for a schedule with {arity} output dimensions")]
    InvalidLevel {
        /// The requested level.
        level: usize,
        /// The schedule's output arity.
        arity: usize,
    },

    /// Non-positive tile or split factor.
    #[error("invalid factor {0}: tile and split factors must be positive")]
    InvalidFactor(i64),

    /// Two computations share a loop but request incompatible tags.
    #[error("conflicting tags at loop level {level}: `{first}` requests {first_tag} while `{second}` requests {second_tag}")]
    ConflictingTag {
        /// Loop level of the shared loop.
        level: usize,
        /// First computation involved.
        first: String,
        /// Tag requested by the first computation.
        first_tag: String,
        /// Second computation involved.
        second: String,
        /// Tag requested by the second computation.
        second_tag: String,
    },

    /// Code generation requested with no scheduled computation.
    #[error("program `{0}` has no scheduled computation")]
    EmptyProgram(String),

    /// Code generation requested for a computation without an access relation.
    #[error("computation `{0}` has no access relation")]
    MissingAccess(String),

    /// Object emission failed; the message is opaque back-end detail.
    #[error("back-end failure: {0}")]
    BackEnd(String),

    /// Invariant breach inside the framework.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MalformedLiteral {
            text: "S0[i".to_string(),
            detail: "expected `]`".to_string(),
        };
        let s = format!("{}", err);
        assert!(s.contains("S0[i"));
        assert!(s.contains("expected `]`"));
    }

    #[test]
    fn test_invalid_level_display() {
        let err = Error::InvalidLevel { level: 3, arity: 2 };
        assert!(format!("{}", err).contains("level 3"));
    }
}
