//! Conditional translation functions built at runtime.

use std::fmt;
use std::sync::Arc;

use dict_trans_expr::{parse_condition, Condition};
use tracing::warn;

use crate::context::TranslationContext;
use crate::entity::EntityRef;
use crate::expression::MicroExpressionProcessor;

/// A way of producing display text for an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TranslationRule {
    /// Translate a property through a system dictionary.
    SystemDict {
        /// Property holding the code.
        source_field: String,
        /// Dictionary code.
        dict_code: String,
    },
    /// Translate a property through a table dictionary.
    TableDict {
        /// Property holding the code.
        source_field: String,
        /// Source table.
        table: String,
        /// Column holding codes.
        code_column: String,
        /// Column holding names.
        name_column: String,
    },
    /// Fixed text.
    Literal(String),
    /// Micro expression.
    Expression(String),
}

/// One branch of a multi-condition lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConditionalTranslation {
    /// Condition text, e.g. `entity.type == 'admin'`.
    pub condition: String,
    /// Rule applied when the condition holds.
    pub translation: TranslationRule,
}

impl ConditionalTranslation {
    /// Creates a branch.
    pub fn new(condition: impl Into<String>, translation: TranslationRule) -> Self {
        Self {
            condition: condition.into(),
            translation,
        }
    }
}

/// A generated translation function.
pub type LookupFn = Box<dyn Fn(&EntityRef, &TranslationContext) -> Option<String> + Send + Sync>;

/// A condition parsed once, at generation time.
struct CompiledCondition {
    source: String,
    parsed: Result<Condition, String>,
}

impl CompiledCondition {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            parsed: parse_condition(source).map_err(|e| e.to_string()),
        }
    }

    /// Unparseable conditions never hold.
    fn holds(&self, entity: &EntityRef) -> bool {
        match &self.parsed {
            Ok(condition) => {
                let actual = entity
                    .get_path(&condition.property)
                    .and_then(|value| value.as_code());
                condition.matches(actual.as_deref())
            }
            Err(message) => {
                warn!("Condition '{}' treated as false: {}", self.source, message);
                false
            }
        }
    }
}

impl fmt::Debug for CompiledCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledCondition")
            .field("source", &self.source)
            .field("valid", &self.parsed.is_ok())
            .finish()
    }
}

/// Builds conditional and multi-branch translation functions.
///
/// # Example
///
/// ```rust
/// use dict_trans::{DynamicEntity, DynamicLookupGenerator, TranslationContext, TranslationRule};
///
/// let generator = DynamicLookupGenerator::new();
/// let lookup = generator.generate_conditional_lookup(
///     "entity.type == 'admin'",
///     TranslationRule::Literal("Administrator".to_string()),
///     Some(TranslationRule::Literal("Member".to_string())),
/// );
///
/// let admin = DynamicEntity::new("Role").with("type", "admin").into_ref();
/// let guest = DynamicEntity::new("Role").with("type", "guest").into_ref();
/// let context = TranslationContext::new();
///
/// assert_eq!(lookup(&admin, &context), Some("Administrator".to_string()));
/// assert_eq!(lookup(&guest, &context), Some("Member".to_string()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct DynamicLookupGenerator {
    expressions: Arc<MicroExpressionProcessor>,
}

impl DynamicLookupGenerator {
    /// Creates a generator with its own expression processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a generator sharing an expression processor.
    pub fn with_expression_processor(expressions: Arc<MicroExpressionProcessor>) -> Self {
        Self { expressions }
    }

    /// Returns a function applying `true_rule` when `condition` holds and
    /// `false_rule` (if any) otherwise.
    pub fn generate_conditional_lookup(
        &self,
        condition: &str,
        true_rule: TranslationRule,
        false_rule: Option<TranslationRule>,
    ) -> LookupFn {
        let condition = CompiledCondition::new(condition);
        let expressions = Arc::clone(&self.expressions);

        Box::new(move |entity, context| {
            if condition.holds(entity) {
                apply_rule(&expressions, &true_rule, entity, context)
            } else {
                false_rule
                    .as_ref()
                    .and_then(|rule| apply_rule(&expressions, rule, entity, context))
            }
        })
    }

    /// Returns a function applying the rule of the first branch whose
    /// condition holds, or `None` if none does.
    pub fn generate_multi_condition_lookup(
        &self,
        conditions: Vec<ConditionalTranslation>,
    ) -> LookupFn {
        let branches: Vec<(CompiledCondition, TranslationRule)> = conditions
            .into_iter()
            .map(|branch| (CompiledCondition::new(&branch.condition), branch.translation))
            .collect();
        let expressions = Arc::clone(&self.expressions);

        Box::new(move |entity, context| {
            branches
                .iter()
                .find(|(condition, _)| condition.holds(entity))
                .and_then(|(_, rule)| apply_rule(&expressions, rule, entity, context))
        })
    }

    /// Applies one rule to an entity.
    pub fn apply_translation_rule(
        &self,
        rule: &TranslationRule,
        entity: &EntityRef,
        context: &TranslationContext,
    ) -> Option<String> {
        apply_rule(&self.expressions, rule, entity, context)
    }
}

fn apply_rule(
    expressions: &MicroExpressionProcessor,
    rule: &TranslationRule,
    entity: &EntityRef,
    context: &TranslationContext,
) -> Option<String> {
    match rule {
        TranslationRule::SystemDict {
            source_field,
            dict_code,
        } => {
            let code = entity.get_property(source_field)?;
            context.get_system_dict_translation(dict_code, &code)
        }
        TranslationRule::TableDict {
            source_field,
            table,
            code_column,
            name_column,
        } => {
            let code = entity.get_property(source_field)?;
            context.get_table_dict_translation(table, code_column, name_column, &code)
        }
        TranslationRule::Literal(text) => Some(text.clone()),
        TranslationRule::Expression(text) => expressions
            .evaluate_expression(text, entity, context)
            .and_then(|value| value.as_code()),
    }
}
