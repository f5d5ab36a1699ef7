//! Error types for compiling patterns and running them.

use thiserror::Error;

/// What went wrong while parsing a pattern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    #[error("unbalanced parenthesis")]
    UnbalancedParen,
    #[error("missing ), unterminated subpattern")]
    MissingParen,
    #[error("nothing to repeat")]
    NothingToRepeat,
    #[error("multiple repeat")]
    MultipleRepeat,
    #[error("min repeat greater than max repeat")]
    BadRepeatBounds,
    #[error("repetition count too large")]
    RepeatTooLarge,
    #[error("pattern too large once repeats are expanded")]
    PatternTooLarge,
    #[error("unterminated character set")]
    UnterminatedClass,
    #[error("bad character range {0}-{1}")]
    BadRange(char, char),
    /// A range whose upper end is a shorthand class, as in `[a-\d]`.
    #[error("bad character range {0}-\\{1}")]
    BadRangeEnd(char, char),
    #[error("bad escape \\{0}")]
    BadEscape(char),
    #[error("bad escape (end of pattern)")]
    TrailingBackslash,
    #[error("backreferences are not supported in patterns (\\{0})")]
    UnsupportedBackreference(char),
    #[error("unknown extension ?{0}")]
    UnsupportedGroup(char),
}

/// Main error type for the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The pattern text is malformed.
    #[error("{kind} at position {position}")]
    Syntax {
        kind: SyntaxErrorKind,
        position: usize,
    },

    /// A replacement template refers to a group the pattern does not have.
    #[error("invalid group reference {group} (pattern has {group_count} groups)")]
    UnknownGroup { group: usize, group_count: usize },

    /// A replacement template is malformed.
    #[error("bad replacement template at position {position}: {reason}")]
    Template { position: usize, reason: String },

    /// The backtracking matcher ran out of its step budget.
    #[error("backtracking step limit of {limit} exceeded")]
    StepLimitExceeded { limit: usize },
}

impl Error {
    pub(crate) fn syntax(kind: SyntaxErrorKind, position: usize) -> Self {
        Error::Syntax { kind, position }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
