//! Configuration types for the translation engine.

use std::time::Duration;

/// Constructs flagged by expression validation as potentially unsafe.
pub const DEFAULT_UNSAFE_PATTERNS: &[&str] = &[
    "System.",
    "Runtime.",
    "ProcessBuilder",
    "Class.forName",
    "getClass",
    "exec(",
    "eval(",
    "T(",
    "new ",
    "std::process",
    "std::fs",
    "unsafe",
];

/// Configuration for the whole engine.
///
/// # Example
///
/// ```rust
/// use dict_trans::{CacheConfig, EngineConfig};
/// use std::time::Duration;
///
/// let config = EngineConfig::builder()
///     .with_max_depth(5)
///     .with_circular_reference_detection(true)
///     .with_max_expression_length(200)
///     .with_cache(CacheConfig {
///         max_entries: 1_000,
///         ttl: Duration::from_secs(60),
///     })
///     .build();
///
/// assert_eq!(config.recursion.max_depth, 5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Graph traversal limits.
    pub recursion: RecursionConfig,
    /// Expression validation and caching.
    pub expression: ExpressionConfig,
    /// Context builder result cache.
    pub cache: CacheConfig,
}

impl EngineConfig {
    /// Creates a new builder for EngineConfig.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for EngineConfig.
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Sets the maximum traversal depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.config.recursion.max_depth = max_depth;
        self
    }

    /// Enables or disables per-path cycle detection.
    pub fn with_circular_reference_detection(mut self, enabled: bool) -> Self {
        self.config.recursion.circular_reference_detection = enabled;
        self
    }

    /// Sets the length above which validation warns.
    pub fn with_max_expression_length(mut self, max_len: usize) -> Self {
        self.config.expression.max_expression_length = max_len;
        self
    }

    /// Sets the evaluation context cache capacity.
    pub fn with_context_cache_size(mut self, size: usize) -> Self {
        self.config.expression.context_cache_size = size;
        self
    }

    /// Replaces the unsafe-construct deny-list.
    pub fn with_unsafe_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.expression.unsafe_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the result cache configuration.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    /// Builds the EngineConfig.
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

/// Limits for the recursive graph walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursionConfig {
    /// Nodes at this depth or deeper are left untouched (root is depth 0).
    pub max_depth: usize,
    /// Whether to stop at an object already on the current path.
    pub circular_reference_detection: bool,
}

impl Default for RecursionConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            circular_reference_detection: true,
        }
    }
}

/// Expression processor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionConfig {
    /// Expressions longer than this produce a validation warning.
    pub max_expression_length: usize,
    /// Capacity of the evaluation context cache.
    pub context_cache_size: usize,
    /// Substrings reported as potentially unsafe.
    pub unsafe_patterns: Vec<String>,
}

impl Default for ExpressionConfig {
    fn default() -> Self {
        Self {
            max_expression_length: 500,
            context_cache_size: 256,
            unsafe_patterns: DEFAULT_UNSAFE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// Configuration for the context builder result cache.
///
/// # Example
///
/// ```rust
/// use dict_trans::CacheConfig;
/// use std::time::Duration;
///
/// let cache = CacheConfig {
///     max_entries: 10_000,
///     ttl: Duration::from_secs(300),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of cached dictionary fetches.
    pub max_entries: usize,
    /// Time-to-live for cached entries.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.recursion.max_depth, 10);
        assert!(config.recursion.circular_reference_detection);
        assert_eq!(config.expression.max_expression_length, 500);
        assert!(config
            .expression
            .unsafe_patterns
            .iter()
            .any(|p| p == "System."));
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::builder()
            .with_max_depth(3)
            .with_circular_reference_detection(false)
            .with_context_cache_size(8)
            .with_unsafe_patterns(["danger"])
            .build();

        assert_eq!(config.recursion.max_depth, 3);
        assert!(!config.recursion.circular_reference_detection);
        assert_eq!(config.expression.context_cache_size, 8);
        assert_eq!(config.expression.unsafe_patterns, vec!["danger".to_string()]);
    }

    #[test]
    fn test_cache_config_default() {
        let cache = CacheConfig::default();
        assert_eq!(cache.max_entries, 10_000);
        assert_eq!(cache.ttl, Duration::from_secs(300));
    }
}
