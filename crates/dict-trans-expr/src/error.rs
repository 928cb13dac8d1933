//! Error types for expression and condition parsing.

use thiserror::Error;

/// Errors that can occur while parsing an expression or a condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// Blank input provided.
    #[error("empty expression")]
    EmptyExpression,

    /// Parentheses do not pair up.
    #[error("unbalanced parentheses at position {position}")]
    UnbalancedParentheses {
        /// Byte offset of the offending parenthesis.
        position: usize,
    },

    /// Property path without segments.
    #[error("property path has no segments")]
    EmptyPropertyPath,

    /// Condition does not match `<property> == '<literal>'` or `!=`.
    #[error("invalid condition: {0}")]
    InvalidCondition(String),
}

/// Result type for expression parsing.
pub type ExprResult<T> = std::result::Result<T, ExprError>;
