//! Depth- and cycle-bounded translation of entity graphs.
//!
//! The walk is a pre-order depth-first traversal. At each node every direct
//! translation field is applied, then nested fields are followed. Cycle
//! detection is path-scoped: a node shared by two branches is translated on
//! both visits, but a node that is its own ancestor is skipped.

use std::collections::HashSet;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::warn;

use crate::collection::CollectionIterationProcessor;
use crate::config::{EngineConfig, RecursionConfig};
use crate::context::TranslationContext;
use crate::entity::{EntityId, EntityRef};
use crate::error::{TranslationError, TranslationResult};
use crate::expression::MicroExpressionProcessor;
use crate::metadata::{
    EntityMetadata, ExpressionField, NestedField, SystemDictField, TableDictField,
};
use crate::value::Value;

/// A structural anomaly met during traversal. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationWarning {
    /// A node sat at or beyond the depth limit; it and its subtree were skipped.
    DepthLimitReached {
        /// Type of the skipped node.
        type_name: String,
        /// Depth of the skipped node.
        depth: usize,
        /// Configured limit.
        max_depth: usize,
    },
    /// A node was already on the current path.
    CircularReference {
        /// Type of the skipped node.
        type_name: String,
        /// Identity of the skipped node.
        entity: EntityId,
    },
    /// One translation field could not be applied.
    FieldFailed {
        /// Type of the node.
        type_name: String,
        /// Target field.
        field: String,
        /// Cause.
        message: String,
    },
    /// A nested field could not be read.
    NestedFieldFailed {
        /// Type of the node.
        type_name: String,
        /// Nested field.
        field: String,
        /// Cause.
        message: String,
    },
}

impl fmt::Display for TranslationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslationWarning::DepthLimitReached {
                type_name,
                depth,
                max_depth,
            } => write!(
                f,
                "depth limit {} reached at {} (depth {}), subtree skipped",
                max_depth, type_name, depth
            ),
            TranslationWarning::CircularReference { type_name, entity } => {
                write!(f, "circular reference to {} ({}) skipped", type_name, entity)
            }
            TranslationWarning::FieldFailed {
                type_name,
                field,
                message,
            } => write!(f, "failed to translate {}.{}: {}", type_name, field, message),
            TranslationWarning::NestedFieldFailed {
                type_name,
                field,
                message,
            } => write!(
                f,
                "failed to read nested field {}.{}: {}",
                type_name, field, message
            ),
        }
    }
}

/// Counters accumulated across calls until [`RecursiveTranslationProcessor::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NestedProcessingStatistics {
    /// Nodes whose fields were translated.
    pub processed_object_count: usize,
    /// Deepest translated node (root is 0).
    pub max_depth_reached: usize,
    /// Configured depth limit.
    pub max_depth_limit: usize,
    /// Whether cycle detection is on.
    pub circular_reference_detection_enabled: bool,
}

/// Visited path and depth of one top-level call.
#[derive(Debug, Default)]
struct PassState {
    visited: HashSet<EntityId>,
    depth: usize,
}

/// Marks a node as being on the current path until dropped.
struct PathGuard<'a> {
    state: &'a mut PassState,
    id: EntityId,
    inserted: bool,
}

impl<'a> PathGuard<'a> {
    fn enter(state: &'a mut PassState, id: EntityId) -> Self {
        let inserted = state.visited.insert(id);
        state.depth += 1;
        Self {
            state,
            id,
            inserted,
        }
    }
}

impl Deref for PathGuard<'_> {
    type Target = PassState;

    fn deref(&self) -> &PassState {
        self.state
    }
}

impl DerefMut for PathGuard<'_> {
    fn deref_mut(&mut self) -> &mut PassState {
        self.state
    }
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        if self.inserted {
            self.state.visited.remove(&self.id);
        }
        self.state.depth -= 1;
    }
}

/// Applies entity metadata to a whole object graph, in place.
///
/// # Example
///
/// ```rust
/// use dict_trans::{DynamicEntity, EntityMetadata, RecursiveTranslationProcessor, TranslationContext, Value};
/// use std::collections::HashMap;
///
/// let roles: HashMap<String, String> = [("admin".to_string(), "Administrator".to_string())].into();
/// let context = TranslationContext::new().with_system_dict("role_type", roles);
///
/// let role_meta = EntityMetadata::new("Role").system_dict("type", "typeName", "role_type");
/// let user_meta = EntityMetadata::new("User").nested("role", role_meta);
///
/// let role = DynamicEntity::new("Role").with("type", "admin").into_ref();
/// let user = DynamicEntity::new("User").with("role", role.clone()).into_ref();
///
/// let mut processor = RecursiveTranslationProcessor::new();
/// processor.process_nested_translation(&user, &user_meta, &context);
///
/// assert_eq!(role.get_property("typeName"), Some(Value::from("Administrator")));
/// ```
#[derive(Debug)]
pub struct RecursiveTranslationProcessor {
    config: RecursionConfig,
    expressions: Arc<MicroExpressionProcessor>,
    collections: CollectionIterationProcessor,
    processed_object_count: usize,
    max_depth_reached: usize,
    warnings: Vec<TranslationWarning>,
}

impl Default for RecursiveTranslationProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl RecursiveTranslationProcessor {
    /// Creates a processor with default limits.
    pub fn new() -> Self {
        Self::with_config(RecursionConfig::default())
    }

    /// Creates a processor with custom limits and its own expression processor.
    pub fn with_config(config: RecursionConfig) -> Self {
        Self::with_expression_processor(config, Arc::new(MicroExpressionProcessor::new()))
    }

    /// Creates a processor sharing an expression processor (and its caches).
    pub fn with_expression_processor(
        config: RecursionConfig,
        expressions: Arc<MicroExpressionProcessor>,
    ) -> Self {
        Self {
            config,
            expressions,
            collections: CollectionIterationProcessor::new(),
            processed_object_count: 0,
            max_depth_reached: 0,
            warnings: Vec::new(),
        }
    }

    /// Creates a processor from the engine configuration.
    pub fn from_engine_config(config: &EngineConfig) -> Self {
        Self::with_expression_processor(
            config.recursion,
            Arc::new(MicroExpressionProcessor::with_config(config.expression.clone())),
        )
    }

    /// Limits in use.
    pub fn config(&self) -> &RecursionConfig {
        &self.config
    }

    /// The expression processor used for expression fields.
    pub fn expression_processor(&self) -> &Arc<MicroExpressionProcessor> {
        &self.expressions
    }

    /// Translates `root` and everything reachable through nested fields.
    ///
    /// The graph is mutated in place. Running twice with the same context
    /// gives the same result as running once.
    pub fn process_nested_translation(
        &mut self,
        root: &EntityRef,
        metadata: &EntityMetadata,
        context: &TranslationContext,
    ) {
        let mut state = PassState::default();
        self.process_node(root, metadata, context, &mut state);
    }

    /// Translates every entity of a collection, each as its own root.
    pub fn process_nested_collection(
        &mut self,
        items: &[EntityRef],
        metadata: &EntityMetadata,
        context: &TranslationContext,
    ) {
        for item in items {
            self.process_nested_translation(item, metadata, context);
        }
    }

    /// Counters accumulated since creation or the last reset.
    pub fn processing_statistics(&self) -> NestedProcessingStatistics {
        NestedProcessingStatistics {
            processed_object_count: self.processed_object_count,
            max_depth_reached: self.max_depth_reached,
            max_depth_limit: self.config.max_depth,
            circular_reference_detection_enabled: self.config.circular_reference_detection,
        }
    }

    /// Warnings accumulated since creation or the last reset.
    pub fn warnings(&self) -> &[TranslationWarning] {
        &self.warnings
    }

    /// Clears counters and warnings.
    pub fn reset(&mut self) {
        self.processed_object_count = 0;
        self.max_depth_reached = 0;
        self.warnings.clear();
    }

    fn record(&mut self, warning: TranslationWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    fn process_node(
        &mut self,
        node: &EntityRef,
        metadata: &EntityMetadata,
        context: &TranslationContext,
        state: &mut PassState,
    ) {
        let depth = state.depth;
        if depth >= self.config.max_depth {
            self.record(TranslationWarning::DepthLimitReached {
                type_name: node.type_name(),
                depth,
                max_depth: self.config.max_depth,
            });
            return;
        }

        let id = node.id();
        if self.config.circular_reference_detection && state.visited.contains(&id) {
            self.record(TranslationWarning::CircularReference {
                type_name: node.type_name(),
                entity: id,
            });
            return;
        }

        let mut guard = PathGuard::enter(state, id);
        self.processed_object_count += 1;
        self.max_depth_reached = self.max_depth_reached.max(depth);

        for field in &metadata.system_dict_fields {
            let outcome = translate_system_field(node, field, context);
            self.check_field(node, &field.target_field, outcome);
        }
        for field in &metadata.table_dict_fields {
            let outcome = translate_table_field(node, field, context);
            self.check_field(node, &field.target_field, outcome);
        }
        for field in &metadata.expression_fields {
            let outcome = self.translate_expression_field(node, field, context);
            self.check_field(node, &field.target_field, outcome);
        }

        for nested in &metadata.nested_fields {
            self.process_nested_field(node, nested, metadata, context, &mut guard);
        }
    }

    fn check_field(&mut self, node: &EntityRef, field: &str, outcome: TranslationResult<()>) {
        if let Err(e) = outcome {
            self.record(TranslationWarning::FieldFailed {
                type_name: node.type_name(),
                field: field.to_string(),
                message: e.to_string(),
            });
        }
    }

    fn translate_expression_field(
        &self,
        node: &EntityRef,
        field: &ExpressionField,
        context: &TranslationContext,
    ) -> TranslationResult<()> {
        if let Some(value) = self
            .expressions
            .evaluate_expression(&field.expression, node, context)
        {
            node.set_property(&field.target_field, value)?;
        }
        Ok(())
    }

    fn process_nested_field(
        &mut self,
        node: &EntityRef,
        nested: &NestedField,
        parent: &EntityMetadata,
        context: &TranslationContext,
        state: &mut PassState,
    ) {
        let Some(value) = node.get_property(&nested.field_name) else {
            self.record(TranslationWarning::NestedFieldFailed {
                type_name: node.type_name(),
                field: nested.field_name.clone(),
                message: "no such property".to_string(),
            });
            return;
        };

        let metadata = nested.resolve(parent);
        match &value {
            Value::Null => {}
            Value::Entity(child) => self.process_node(child, metadata, context, state),
            Value::List(_) | Value::Map(_) => {
                let mut children = Vec::with_capacity(self.collections.collection_size(&value));
                self.collections.process_collection(&value, |element| {
                    if let Value::Entity(child) = element {
                        children.push(child.clone());
                    }
                });
                for child in &children {
                    self.process_node(child, metadata, context, state);
                }
            }
            scalar => self.record(TranslationWarning::NestedFieldFailed {
                type_name: node.type_name(),
                field: nested.field_name.clone(),
                message: format!("expected an entity or a collection, found {:?}", scalar),
            }),
        }
    }
}

fn read_source(node: &EntityRef, property: &str) -> TranslationResult<Value> {
    node.get_property(property)
        .ok_or_else(|| TranslationError::UnknownProperty {
            type_name: node.type_name(),
            property: property.to_string(),
        })
}

fn translate_system_field(
    node: &EntityRef,
    field: &SystemDictField,
    context: &TranslationContext,
) -> TranslationResult<()> {
    let code = read_source(node, &field.source_field)?;
    if let Some(name) = context.get_system_dict_translation(&field.dict_code, &code) {
        node.set_property(&field.target_field, Value::Text(name))?;
    }
    Ok(())
}

fn translate_table_field(
    node: &EntityRef,
    field: &TableDictField,
    context: &TranslationContext,
) -> TranslationResult<()> {
    let code = read_source(node, &field.source_field)?;
    if let Some(name) = context.get_table_dict_translation(
        &field.table,
        &field.code_column,
        &field.name_column,
        &code,
    ) {
        node.set_property(&field.target_field, Value::Text(name))?;
    }
    Ok(())
}
