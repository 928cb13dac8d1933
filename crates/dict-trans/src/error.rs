//! Error types for dictionary translation.

use thiserror::Error;

/// Errors that can occur while configuring or running translations.
///
/// Most runtime misses never surface as errors: dictionary misses and absent
/// properties degrade to `None`. Errors are reserved for configuration bugs
/// (bad expressions, unknown properties) and for boundary failures that the
/// engine itself downgrades.
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Expression or condition parse error.
    #[error("expression parse error: {0}")]
    Parse(#[from] dict_trans_expr::ExprError),

    /// Property is not declared on the entity type.
    #[error("unknown property '{property}' on type '{type_name}'")]
    UnknownProperty {
        /// Entity type name.
        type_name: String,
        /// Requested property.
        property: String,
    },

    /// Property exists but cannot hold the supplied value.
    #[error("invalid value for property '{property}': {message}")]
    InvalidPropertyValue {
        /// Property being written.
        property: String,
        /// Description of the mismatch.
        message: String,
    },

    /// Error reported by the translation data source.
    #[error("data source error: {0}")]
    DataSource(String),

    /// Evaluation code could not be generated for an invalid expression.
    #[error("cannot generate code for '{expression}': {}", errors.join("; "))]
    CodeGeneration {
        /// Source expression.
        expression: String,
        /// Validation errors.
        errors: Vec<String>,
    },

    /// The background context build failed to complete.
    #[error("async context build failed: {0}")]
    AsyncBuild(String),
}

/// Result type for translation operations.
pub type TranslationResult<T> = std::result::Result<T, TranslationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unknown_property() {
        let err = TranslationError::UnknownProperty {
            type_name: "User".to_string(),
            property: "missing".to_string(),
        };
        assert_eq!(err.to_string(), "unknown property 'missing' on type 'User'");
    }

    #[test]
    fn test_error_display_code_generation() {
        let err = TranslationError::CodeGeneration {
            expression: "entity.x".to_string(),
            errors: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "cannot generate code for 'entity.x': a; b");
    }

    #[test]
    fn test_error_from_expr_error() {
        let err: TranslationError = dict_trans_expr::ExprError::EmptyExpression.into();
        assert!(matches!(err, TranslationError::Parse(_)));
    }
}
