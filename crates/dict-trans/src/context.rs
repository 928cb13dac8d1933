//! Preloaded dictionary data for one translation batch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::statistics::ProcessingStatistics;
use crate::value::Value;

/// Code to name map of one dictionary.
pub type Dictionary = HashMap<String, String>;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_context_id() -> u64 {
    NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Builds the key under which a table dictionary is stored.
///
/// ```rust
/// assert_eq!(dict_trans::table_key("sys_dept", "id", "name"), "sys_dept:id:name");
/// ```
pub fn table_key(table: &str, code_column: &str, name_column: &str) -> String {
    format!("{}:{}:{}", table, code_column, name_column)
}

/// Snapshot of dictionary data used while translating one batch.
///
/// A context is never mutated after construction. The `with_*` methods return
/// a new context that shares every untouched dictionary, the bindings and the
/// statistics with the receiver.
///
/// # Example
///
/// ```rust
/// use dict_trans::{TranslationContext, Value};
/// use std::collections::HashMap;
///
/// let base = TranslationContext::new();
/// let statuses: HashMap<String, String> =
///     [("1".to_string(), "Active".to_string())].into_iter().collect();
/// let ctx = base.with_system_dict("user_status", statuses);
///
/// assert!(!base.has_system_dict("user_status"));
/// assert_eq!(
///     ctx.get_system_dict_translation("user_status", &Value::Int(1)),
///     Some("Active".to_string())
/// );
/// ```
#[derive(Debug, Clone)]
pub struct TranslationContext {
    id: u64,
    system_dicts: HashMap<String, Arc<Dictionary>>,
    table_dicts: HashMap<String, Arc<Dictionary>>,
    bindings: Arc<HashMap<String, Value>>,
    statistics: Arc<ProcessingStatistics>,
}

impl Default for TranslationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TranslationContext {
    /// Creates an empty context with fresh statistics.
    pub fn new() -> Self {
        Self::from_parts(
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            Arc::new(ProcessingStatistics::new()),
        )
    }

    pub(crate) fn from_parts(
        system_dicts: HashMap<String, Arc<Dictionary>>,
        table_dicts: HashMap<String, Arc<Dictionary>>,
        bindings: HashMap<String, Value>,
        statistics: Arc<ProcessingStatistics>,
    ) -> Self {
        Self {
            id: next_context_id(),
            system_dicts,
            table_dicts,
            bindings: Arc::new(bindings),
            statistics,
        }
    }

    /// Identity of this snapshot; every derived context gets a new one.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Translates a code through a system dictionary.
    ///
    /// Returns `None` for a null code, an unknown dictionary or a code that
    /// is not a key. Codes are compared by their string form.
    pub fn get_system_dict_translation(&self, dict_code: &str, code: &Value) -> Option<String> {
        let key = code.as_code()?;
        self.statistics.record_system_lookup();
        let name = self
            .system_dicts
            .get(dict_code)
            .and_then(|dict| dict.get(&key))
            .cloned();
        self.statistics.record_outcome(name.is_some());
        name
    }

    /// Translates a code through a table dictionary.
    pub fn get_table_dict_translation(
        &self,
        table: &str,
        code_column: &str,
        name_column: &str,
        code: &Value,
    ) -> Option<String> {
        let key = code.as_code()?;
        self.statistics.record_table_lookup();
        let name = self
            .table_dicts
            .get(&table_key(table, code_column, name_column))
            .and_then(|dict| dict.get(&key))
            .cloned();
        self.statistics.record_outcome(name.is_some());
        name
    }

    /// Returns true if the system dictionary was loaded.
    pub fn has_system_dict(&self, dict_code: &str) -> bool {
        self.system_dicts.contains_key(dict_code)
    }

    /// Returns true if the table dictionary was loaded.
    pub fn has_table_dict(&self, table: &str, code_column: &str, name_column: &str) -> bool {
        self.table_dicts
            .contains_key(&table_key(table, code_column, name_column))
    }

    /// Loaded system dictionary codes, sorted.
    pub fn available_system_dicts(&self) -> Vec<String> {
        let mut names: Vec<String> = self.system_dicts.keys().cloned().collect();
        names.sort();
        names
    }

    /// Loaded table dictionary keys (`table:code:name`), sorted.
    pub fn available_table_dicts(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table_dicts.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns an auxiliary binding.
    pub fn binding(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Counters shared by this context and its derivatives.
    pub fn statistics(&self) -> &ProcessingStatistics {
        &self.statistics
    }

    /// Returns a context with one more system dictionary.
    ///
    /// An existing dictionary with the same code is replaced in the new
    /// context only.
    pub fn with_system_dict(&self, dict_code: impl Into<String>, dict: Dictionary) -> Self {
        let mut system_dicts = self.system_dicts.clone();
        system_dicts.insert(dict_code.into(), Arc::new(dict));
        Self {
            id: next_context_id(),
            system_dicts,
            ..self.clone()
        }
    }

    /// Returns a context with one more table dictionary.
    pub fn with_table_dict(
        &self,
        table: &str,
        code_column: &str,
        name_column: &str,
        dict: Dictionary,
    ) -> Self {
        let mut table_dicts = self.table_dicts.clone();
        table_dicts.insert(table_key(table, code_column, name_column), Arc::new(dict));
        Self {
            id: next_context_id(),
            table_dicts,
            ..self.clone()
        }
    }

    /// Returns a context with one more auxiliary binding.
    pub fn with_binding(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut bindings = (*self.bindings).clone();
        bindings.insert(name.into(), value.into());
        Self {
            id: next_context_id(),
            bindings: Arc::new(bindings),
            ..self.clone()
        }
    }

    #[cfg(test)]
    pub(crate) fn shares_system_dict(&self, other: &Self, dict_code: &str) -> bool {
        match (self.system_dicts.get(dict_code), other.system_dicts.get(dict_code)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
