//! # dict-trans
//!
//! Metadata-driven dictionary translation for entity graphs.
//!
//! Given a root object and a description of which of its fields hold coded
//! values, `dict-trans` batch-loads the dictionaries it needs and walks the
//! graph, writing human-readable names next to the codes. Graphs may be
//! self-referential; traversal is bounded by depth and by path-scoped cycle
//! detection.
//!
//! ## Key Features
//!
//! - **Batched loading** - one data-source call per dictionary, never per field
//! - **Cycle-safe traversal** - self references and mutual references terminate
//! - **Micro expressions** - `#dict`, `#table`, property paths and literals
//! - **Result caching** - LRU cache with TTL shared across builders
//! - **Async build** - `build_async` on the tokio blocking pool (`async` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use dict_trans::{
//!     CodeName, DynamicEntity, EntityMetadata, RecursiveTranslationProcessor,
//!     TranslationContextBuilder, TranslationDataSource, TranslationResult, Value,
//! };
//!
//! struct Dictionaries;
//!
//! impl TranslationDataSource for Dictionaries {
//!     fn translate_dict_batch_code2name(
//!         &self,
//!         dict_code: &str,
//!         _codes: &str,
//!     ) -> TranslationResult<Vec<CodeName>> {
//!         Ok(match dict_code {
//!             "user_status" => vec![CodeName::new("1", "Active")],
//!             _ => Vec::new(),
//!         })
//!     }
//!
//!     fn translate_table_dict_batch_code2name(
//!         &self,
//!         _table: &str,
//!         _code_column: &str,
//!         _name_column: &str,
//!         _codes: &str,
//!         _condition: Option<&str>,
//!     ) -> TranslationResult<Vec<CodeName>> {
//!         Ok(vec![CodeName::new("10", "Engineering")])
//!     }
//! }
//!
//! let metadata = EntityMetadata::new("User")
//!     .system_dict("status", "statusText", "user_status")
//!     .table_dict("deptId", "deptName", "sys_dept", "id", "name")
//!     .expression("label", "#dict('user_status', entity.status)");
//!
//! let user = DynamicEntity::new("User")
//!     .with("status", "1")
//!     .with("deptId", 10)
//!     .into_ref();
//!
//! // Load only the codes that occur in the graph
//! let context = TranslationContextBuilder::new(Dictionaries)
//!     .collect_codes(&user, &metadata)
//!     .build();
//!
//! let mut processor = RecursiveTranslationProcessor::new();
//! processor.process_nested_translation(&user, &metadata, &context);
//!
//! assert_eq!(user.get_property("statusText"), Some(Value::from("Active")));
//! assert_eq!(user.get_property("deptName"), Some(Value::from("Engineering")));
//! assert_eq!(user.get_property("label"), Some(Value::from("Active")));
//! ```
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`TranslationContextBuilder`] | Collects requests, fetches dictionaries in batches |
//! | [`TranslationContext`] | Immutable snapshot of loaded dictionaries plus statistics |
//! | [`RecursiveTranslationProcessor`] | Walks the graph and applies field translations |
//! | [`MicroExpressionProcessor`] | Parses, validates and evaluates expressions |
//! | [`DynamicLookupGenerator`] | Builds conditional translation functions |
//! | [`CircularReferenceDetector`] | Reachability checks over a reference graph |
//! | [`CollectionIterationProcessor`] | Iterates list and map values |
//!
//! ## Feature Flags
//!
//! - `async` (default) - `TranslationContextBuilder::build_async` via tokio
//! - `parallel` - loads system and table dictionaries concurrently using rayon
//! - `serde` - Serialize/Deserialize for metadata, rules and statistics
//!
//! ## Logging
//!
//! Events are emitted through `tracing`; install any subscriber to see them.
//! Skipped fields, depth and cycle stops, failed fetches and failed conditions
//! are logged at `warn`.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod builder;
mod cache;
mod collection;
mod config;
mod context;
mod detector;
mod entity;
mod error;
mod expression;
mod lookup;
mod metadata;
mod recursive;
mod statistics;
mod traits;
mod value;

// Public re-exports
pub use builder::{TableDictRequest, TranslationContextBuilder};
pub use cache::{normalize_codes, CacheKey, CacheStats, DictionaryCache};
pub use collection::{CollectionIterationProcessor, CollectionKind};
pub use config::{
    CacheConfig, EngineConfig, EngineConfigBuilder, ExpressionConfig, RecursionConfig,
    DEFAULT_UNSAFE_PATTERNS,
};
pub use context::{table_key, Dictionary, TranslationContext};
pub use detector::CircularReferenceDetector;
pub use entity::{DynamicEntity, Entity, EntityId, EntityRef, EntityType};
pub use error::{TranslationError, TranslationResult};
pub use expression::{
    CompiledExpression, EvaluationContext, ExpressionCacheStatistics, ExpressionComponent,
    MicroExpressionProcessor, ValidationResult,
};
pub use lookup::{ConditionalTranslation, DynamicLookupGenerator, LookupFn, TranslationRule};
pub use metadata::{
    EntityMetadata, ExpressionField, NestedField, NestedMetadata, SystemDictField, TableDictField,
};
pub use recursive::{NestedProcessingStatistics, RecursiveTranslationProcessor, TranslationWarning};
pub use statistics::{ProcessingStatistics, StatisticsSnapshot};
pub use traits::{CodeName, TranslationDataSource, ALL_CODES};
pub use value::Value;

// Re-export commonly used types from the expression crate for convenience
pub use dict_trans_expr::{ComponentType, ExprError, PropertyPath};
