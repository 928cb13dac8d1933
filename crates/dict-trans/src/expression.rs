//! Micro expression processing: parse, cache, validate and evaluate.
//!
//! Four shapes are understood (see [`dict_trans_expr`]):
//!
//! | Shape | Example | Result |
//! |-------|---------|--------|
//! | Dictionary lookup | `#dict('user_status', entity.status)` | name from a system dictionary |
//! | Table lookup | `#table('sys_dept', 'id', 'name', entity.deptId)` | name from a table dictionary |
//! | Property access | `entity.role.type` | property value |
//! | Literal | `'N/A'` | the text |
//!
//! Anything else parses as `Complex`. Validation rejects it and evaluation
//! yields `None`.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use dict_trans_expr::{ComponentType, Expr, ExprResult, Operand, PropertyPath};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::config::ExpressionConfig;
use crate::context::TranslationContext;
use crate::entity::{EntityId, EntityRef, EntityType};
use crate::error::{TranslationError, TranslationResult};
use crate::value::Value;

/// Classification and source of a compiled expression.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExpressionComponent {
    /// Recognized shape.
    pub component_type: ComponentType,
    /// Trimmed source text.
    pub raw_text: String,
}

/// A parsed expression, shared through the processor cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledExpression {
    source: String,
    component: ExpressionComponent,
    expr: Expr,
}

impl CompiledExpression {
    /// Exact text the expression was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The single component of this expression.
    pub fn component(&self) -> &ExpressionComponent {
        &self.component
    }

    /// Shorthand for `component().component_type`.
    pub fn component_type(&self) -> ComponentType {
        self.component.component_type
    }

    /// Parsed syntax tree.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

/// One entity paired with the dictionaries it is evaluated against.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    entity: EntityRef,
    context: TranslationContext,
}

impl EvaluationContext {
    /// Pairs an entity with a translation context.
    pub fn new(entity: EntityRef, context: TranslationContext) -> Self {
        Self { entity, context }
    }

    /// The entity being evaluated.
    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    /// The dictionaries available to lookups.
    pub fn translation_context(&self) -> &TranslationContext {
        &self.context
    }

    /// Reads a property of the entity.
    pub fn get_property(&self, name: &str) -> Option<Value> {
        self.entity.get_property(name)
    }

    /// Writes a property of the entity.
    pub fn set_property(&self, name: &str, value: Value) -> TranslationResult<()> {
        self.entity.set_property(name, value)
    }

    /// Follows a dotted path from the entity.
    pub fn get_path(&self, path: &PropertyPath) -> Option<Value> {
        self.entity.get_path(path)
    }
}

/// Outcome of static expression validation.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// True when `errors` is empty.
    pub is_valid: bool,
    /// Problems that make the expression unusable.
    pub errors: Vec<String>,
    /// Suspicious but usable constructs.
    pub warnings: Vec<String>,
    /// Compiled form, when the text parsed.
    pub expression: Option<Arc<CompiledExpression>>,
}

/// Sizes and keys of the processor caches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExpressionCacheStatistics {
    /// Compiled expressions held.
    pub expression_cache_size: usize,
    /// Evaluation contexts held.
    pub context_cache_size: usize,
    /// Source texts of the compiled expressions, sorted.
    pub cached_expressions: Vec<String>,
}

/// Parses, caches, validates and evaluates micro expressions.
///
/// The processor is `Sync` and meant to be shared (`Arc`) by every component
/// that evaluates expressions.
///
/// # Example
///
/// ```rust
/// use dict_trans::{DynamicEntity, MicroExpressionProcessor, TranslationContext, Value};
/// use std::collections::HashMap;
///
/// let processor = MicroExpressionProcessor::new();
/// let statuses: HashMap<String, String> = [("1".to_string(), "Active".to_string())].into();
/// let context = TranslationContext::new().with_system_dict("user_status", statuses);
/// let user = DynamicEntity::new("User").with("status", "1").into_ref();
///
/// let value = processor.evaluate_expression("#dict('user_status', entity.status)", &user, &context);
/// assert_eq!(value, Some(Value::from("Active")));
/// ```
pub struct MicroExpressionProcessor {
    config: ExpressionConfig,
    expression_cache: RwLock<HashMap<String, Arc<CompiledExpression>>>,
    context_cache: Mutex<LruCache<EntityId, Arc<EvaluationContext>>>,
}

impl Default for MicroExpressionProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MicroExpressionProcessor {
    /// Creates a processor with default settings.
    pub fn new() -> Self {
        Self::with_config(ExpressionConfig::default())
    }

    /// Creates a processor with custom settings.
    pub fn with_config(config: ExpressionConfig) -> Self {
        let capacity =
            NonZeroUsize::new(config.context_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            expression_cache: RwLock::new(HashMap::new()),
            context_cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Settings in use.
    pub fn config(&self) -> &ExpressionConfig {
        &self.config
    }

    /// Parses an expression, reusing the cached result for identical text.
    ///
    /// # Errors
    ///
    /// `EmptyExpression` for blank text and `UnbalancedParentheses` when the
    /// parentheses outside quotes do not pair up. Failures are not cached.
    pub fn parse_expression(&self, text: &str) -> ExprResult<Arc<CompiledExpression>> {
        if let Some(compiled) = self.expression_cache.read().get(text) {
            return Ok(Arc::clone(compiled));
        }

        let expr = dict_trans_expr::parse(text)?;
        let compiled = Arc::new(CompiledExpression {
            source: text.to_string(),
            component: ExpressionComponent {
                component_type: expr.component_type(),
                raw_text: text.trim().to_string(),
            },
            expr,
        });

        let mut cache = self.expression_cache.write();
        let cached = cache
            .entry(text.to_string())
            .or_insert_with(|| Arc::clone(&compiled));
        Ok(Arc::clone(cached))
    }

    /// Evaluates an expression against one entity.
    ///
    /// Misses, missing properties, parse failures and `Complex` expressions
    /// all yield `None`. Every call counts as one evaluation in the context
    /// statistics.
    pub fn evaluate_expression(
        &self,
        text: &str,
        entity: &EntityRef,
        context: &TranslationContext,
    ) -> Option<Value> {
        context.statistics().record_expression_evaluation();

        let compiled = match self.parse_expression(text) {
            Ok(compiled) => compiled,
            Err(e) => {
                debug!("Failed to evaluate '{}': {}", text, e);
                return None;
            }
        };

        let evaluation = self.evaluation_context(entity, context);
        self.evaluate_compiled(&compiled, &evaluation)
    }

    /// Evaluates an already compiled expression.
    pub fn evaluate_compiled(
        &self,
        compiled: &CompiledExpression,
        evaluation: &EvaluationContext,
    ) -> Option<Value> {
        let dictionaries = evaluation.translation_context();

        match compiled.expr() {
            Expr::DictLookup {
                dict_code,
                argument,
            } => {
                let code = operand_value(argument, evaluation)?;
                dictionaries
                    .get_system_dict_translation(dict_code, &code)
                    .map(Value::Text)
            }
            Expr::TableLookup {
                table,
                code_column,
                name_column,
                argument,
            } => {
                let code = operand_value(argument, evaluation)?;
                dictionaries
                    .get_table_dict_translation(table, code_column, name_column, &code)
                    .map(Value::Text)
            }
            Expr::PropertyAccess(path) => evaluation.get_path(path).filter(|v| !v.is_null()),
            Expr::Literal(text) => Some(Value::Text(text.clone())),
            Expr::Complex(raw) => {
                debug!("Complex expression '{}' is not evaluated", raw);
                None
            }
        }
    }

    fn evaluation_context(
        &self,
        entity: &EntityRef,
        context: &TranslationContext,
    ) -> Arc<EvaluationContext> {
        let mut cache = self.context_cache.lock();
        if let Some(existing) = cache.get(&entity.id()) {
            if existing.context.id() == context.id() {
                return Arc::clone(existing);
            }
        }

        let created = Arc::new(EvaluationContext::new(entity.clone(), context.clone()));
        cache.put(entity.id(), Arc::clone(&created));
        created
    }

    /// Checks an expression against a target type without evaluating it.
    pub fn validate_expression(&self, text: &str, target_type: &EntityType) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let expression = match self.parse_expression(text) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                errors.push(format!("Syntax error: {}", e));
                None
            }
        };

        if let Some(compiled) = &expression {
            if compiled.component_type() == ComponentType::Complex {
                errors.push(format!(
                    "Unsupported expression '{}'",
                    compiled.component().raw_text
                ));
            }

            for path in compiled.expr().property_references() {
                if !target_type.has_property(path.root()) {
                    errors.push(format!(
                        "Unknown property '{}' on type '{}'",
                        path.root(),
                        target_type.name()
                    ));
                }
            }
        }

        for pattern in &self.config.unsafe_patterns {
            if text.contains(pattern.as_str()) {
                warnings.push(format!("Potentially unsafe construct '{}'", pattern));
            }
        }

        let length = text.chars().count();
        if length > self.config.max_expression_length {
            warnings.push(format!(
                "Expression is very long ({} characters, limit {})",
                length, self.config.max_expression_length
            ));
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            expression,
        }
    }

    /// Emits a Rust function that evaluates `text` and stores the result in
    /// `target_field`.
    ///
    /// # Errors
    ///
    /// `CodeGeneration` with the validation errors when the expression is
    /// invalid for `target_type`.
    pub fn generate_evaluation_code(
        &self,
        text: &str,
        target_type: &EntityType,
        target_field: &str,
    ) -> TranslationResult<String> {
        let validation = self.validate_expression(text, target_type);
        if !validation.is_valid {
            return Err(TranslationError::CodeGeneration {
                expression: text.to_string(),
                errors: validation.errors,
            });
        }

        let function_name = format!(
            "evaluate_{}_{}",
            to_snake_case(target_type.name()),
            to_snake_case(target_field)
        );

        Ok(format!(
            "pub fn {name}(\n    \
                 processor: &dict_trans::MicroExpressionProcessor,\n    \
                 entity: &dict_trans::EntityRef,\n    \
                 context: &dict_trans::TranslationContext,\n\
             ) -> dict_trans::TranslationResult<()> {{\n    \
                 if let Some(value) = processor.evaluate_expression({text:?}, entity, context) {{\n        \
                     entity.set_property({field:?}, value)?;\n    \
                 }}\n    \
                 Ok(())\n\
             }}\n",
            name = function_name,
            text = text,
            field = target_field,
        ))
    }

    /// Empties both caches.
    pub fn clear_caches(&self) {
        self.expression_cache.write().clear();
        self.context_cache.lock().clear();
    }

    /// Current cache sizes and cached expression texts.
    pub fn cache_statistics(&self) -> ExpressionCacheStatistics {
        let expressions = self.expression_cache.read();
        let mut cached_expressions: Vec<String> = expressions.keys().cloned().collect();
        cached_expressions.sort();

        ExpressionCacheStatistics {
            expression_cache_size: expressions.len(),
            context_cache_size: self.context_cache.lock().len(),
            cached_expressions,
        }
    }
}

impl fmt::Debug for MicroExpressionProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.cache_statistics();
        f.debug_struct("MicroExpressionProcessor")
            .field("expression_cache_size", &stats.expression_cache_size)
            .field("context_cache_size", &stats.context_cache_size)
            .finish()
    }
}

fn operand_value(operand: &Operand, evaluation: &EvaluationContext) -> Option<Value> {
    match operand {
        Operand::Property(path) => evaluation.get_path(path).filter(|v| !v.is_null()),
        Operand::Literal(text) => Some(Value::Text(text.clone())),
    }
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if ch.is_ascii_uppercase() && prev_lower {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        } else {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        }
    }

    out.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::DynamicEntity;
    use dict_trans_expr::ExprError;

    fn status_context() -> TranslationContext {
        let statuses = [
            ("1".to_string(), "Active".to_string()),
            ("0".to_string(), "Inactive".to_string()),
        ]
        .into_iter()
        .collect();
        let depts = [("10".to_string(), "Engineering".to_string())]
            .into_iter()
            .collect();
        TranslationContext::new()
            .with_system_dict("user_status", statuses)
            .with_table_dict("sys_dept", "id", "name", depts)
    }

    fn user_type() -> EntityType {
        EntityType::new("User", ["status", "deptId", "name", "role"])
    }

    #[test]
    fn test_parse_caches_by_exact_text() {
        let processor = MicroExpressionProcessor::new();
        let a = processor.parse_expression("entity.status").unwrap();
        let b = processor.parse_expression("entity.status").unwrap();
        let c = processor.parse_expression(" entity.status").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(c.component().raw_text, "entity.status");
        assert_eq!(processor.cache_statistics().expression_cache_size, 2);
    }

    #[test]
    fn test_parse_errors_are_not_cached() {
        let processor = MicroExpressionProcessor::new();
        assert!(matches!(
            processor.parse_expression("   "),
            Err(ExprError::EmptyExpression)
        ));
        assert!(matches!(
            processor.parse_expression("#dict('a', entity.b"),
            Err(ExprError::UnbalancedParentheses { .. })
        ));
        assert_eq!(processor.cache_statistics().expression_cache_size, 0);
    }

    #[test]
    fn test_component_types() {
        let processor = MicroExpressionProcessor::new();
        let cases = [
            ("#dict('user_status', entity.status)", ComponentType::DictLookup),
            ("#table('sys_dept', 'id', 'name', entity.deptId)", ComponentType::TableLookup),
            ("entity.name", ComponentType::PropertyAccess),
            ("'N/A'", ComponentType::Literal),
            ("entity.a + entity.b", ComponentType::Complex),
        ];
        for (text, expected) in cases {
            assert_eq!(processor.parse_expression(text).unwrap().component_type(), expected);
        }
    }

    #[test]
    fn test_evaluate_dict_and_table_lookups() {
        let processor = MicroExpressionProcessor::new();
        let context = status_context();
        let user = DynamicEntity::new("User")
            .with("status", "1")
            .with("deptId", 10)
            .into_ref();

        assert_eq!(
            processor.evaluate_expression("#dict('user_status', entity.status)", &user, &context),
            Some(Value::from("Active"))
        );
        assert_eq!(
            processor.evaluate_expression(
                "#table('sys_dept', 'id', 'name', entity.deptId)",
                &user,
                &context
            ),
            Some(Value::from("Engineering"))
        );
        assert_eq!(
            processor.evaluate_expression("#dict('user_status', '0')", &user, &context),
            Some(Value::from("Inactive"))
        );
        assert_eq!(context.statistics().expression_evaluations(), 3);
    }

    #[test]
    fn test_evaluate_misses_yield_none() {
        let processor = MicroExpressionProcessor::new();
        let context = status_context();
        let user = DynamicEntity::new("User").with("status", "9").into_ref();

        assert_eq!(
            processor.evaluate_expression("#dict('user_status', entity.status)", &user, &context),
            None
        );
        assert_eq!(
            processor.evaluate_expression("#dict('user_status', entity.missing)", &user, &context),
            None
        );
        assert_eq!(processor.evaluate_expression("entity.missing", &user, &context), None);
        assert_eq!(processor.evaluate_expression("", &user, &context), None);
        assert_eq!(processor.evaluate_expression("entity.a + 1", &user, &context), None);
    }

    #[test]
    fn test_evaluate_property_and_literal() {
        let processor = MicroExpressionProcessor::new();
        let context = TranslationContext::new();
        let role = DynamicEntity::new("Role").with("type", "admin").into_ref();
        let user = DynamicEntity::new("User").with("role", role).into_ref();

        assert_eq!(
            processor.evaluate_expression("entity.role.type", &user, &context),
            Some(Value::from("admin"))
        );
        assert_eq!(
            processor.evaluate_expression("'N/A'", &user, &context),
            Some(Value::from("N/A"))
        );
    }

    #[test]
    fn test_context_cache_follows_context_identity() {
        let processor = MicroExpressionProcessor::new();
        let user = DynamicEntity::new("User").with("status", "1").into_ref();
        let empty = TranslationContext::new();
        let loaded = status_context();

        let text = "#dict('user_status', entity.status)";
        assert_eq!(processor.evaluate_expression(text, &user, &empty), None);
        assert_eq!(
            processor.evaluate_expression(text, &user, &loaded),
            Some(Value::from("Active"))
        );
        assert_eq!(processor.cache_statistics().context_cache_size, 1);
    }

    #[test]
    fn test_validate_valid_expression() {
        let processor = MicroExpressionProcessor::new();
        let result =
            processor.validate_expression("#dict('user_status', entity.status)", &user_type());

        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
        assert!(result.expression.is_some());
    }

    #[test]
    fn test_validate_unknown_property() {
        let processor = MicroExpressionProcessor::new();
        let result = processor.validate_expression("entity.nickname", &user_type());

        assert!(!result.is_valid);
        assert_eq!(
            result.errors,
            vec!["Unknown property 'nickname' on type 'User'".to_string()]
        );
    }

    #[test]
    fn test_validate_syntax_error() {
        let processor = MicroExpressionProcessor::new();
        let result = processor.validate_expression("#dict('a', entity.status", &user_type());

        assert!(!result.is_valid);
        assert!(result.errors[0].starts_with("Syntax error:"));
        assert!(result.expression.is_none());
    }

    #[test]
    fn test_validate_complex_and_unsafe() {
        let processor = MicroExpressionProcessor::new();
        let result = processor.validate_expression("System.exit(0)", &user_type());

        assert!(!result.is_valid);
        assert!(result.errors[0].starts_with("Unsupported expression"));
        assert_eq!(
            result.warnings,
            vec!["Potentially unsafe construct 'System.'".to_string()]
        );
    }

    #[test]
    fn test_validate_long_expression_warns() {
        let config = ExpressionConfig {
            max_expression_length: 10,
            ..ExpressionConfig::default()
        };
        let processor = MicroExpressionProcessor::with_config(config);
        let result = processor.validate_expression("'a long literal value'", &user_type());

        assert!(result.is_valid);
        assert!(result.warnings[0].starts_with("Expression is very long"));
    }

    #[test]
    fn test_generate_evaluation_code() {
        let processor = MicroExpressionProcessor::new();
        let code = processor
            .generate_evaluation_code(
                "#dict('user_status', entity.status)",
                &user_type(),
                "statusText",
            )
            .unwrap();

        assert!(code.starts_with("pub fn evaluate_user_status_text("));
        assert!(code.contains(
            r##"processor.evaluate_expression("#dict('user_status', entity.status)", entity, context)"##
        ));
        assert!(code.contains(r#"entity.set_property("statusText", value)?;"#));
    }

    #[test]
    fn test_generate_evaluation_code_rejects_invalid() {
        let processor = MicroExpressionProcessor::new();
        let err = processor
            .generate_evaluation_code("entity.nickname", &user_type(), "label")
            .unwrap_err();

        match err {
            TranslationError::CodeGeneration { expression, errors } => {
                assert_eq!(expression, "entity.nickname");
                assert_eq!(errors.len(), 1);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_clear_caches() {
        let processor = MicroExpressionProcessor::new();
        let user = DynamicEntity::new("User").into_ref();
        processor.evaluate_expression("'x'", &user, &TranslationContext::new());

        let stats = processor.cache_statistics();
        assert_eq!(stats.cached_expressions, vec!["'x'".to_string()]);
        assert_eq!(stats.context_cache_size, 1);

        processor.clear_caches();
        assert_eq!(processor.cache_statistics(), ExpressionCacheStatistics::default());
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("statusText"), "status_text");
        assert_eq!(to_snake_case("User"), "user");
        assert_eq!(to_snake_case("dept-name"), "dept_name");
    }
}
