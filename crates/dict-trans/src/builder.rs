//! Batched construction of translation contexts.
//!
//! The builder gathers every dictionary a batch needs, then asks the data
//! source once per dictionary instead of once per entity field.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use dict_trans_expr::{Expr, Operand};
use tracing::{debug, warn};

use crate::cache::{normalize_codes, CacheKey, CacheStats, DictionaryCache};
use crate::collection::CollectionIterationProcessor;
use crate::config::EngineConfig;
use crate::context::{table_key, Dictionary, TranslationContext};
use crate::entity::{EntityId, EntityRef};
use crate::metadata::EntityMetadata;
use crate::statistics::ProcessingStatistics;
use crate::traits::{CodeName, TranslationDataSource};
use crate::value::Value;

#[cfg(feature = "async")]
use crate::error::{TranslationError, TranslationResult};

/// A table dictionary to preload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TableDictRequest {
    /// Source table.
    pub table: String,
    /// Column holding codes.
    pub code_column: String,
    /// Column holding names.
    pub name_column: String,
    /// Optional row filter forwarded to the data source.
    pub condition: Option<String>,
}

impl TableDictRequest {
    /// Creates an unfiltered request.
    pub fn new(
        table: impl Into<String>,
        code_column: impl Into<String>,
        name_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            code_column: code_column.into(),
            name_column: name_column.into(),
            condition: None,
        }
    }

    /// Adds a row filter.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Key of the resulting dictionary in a [`TranslationContext`].
    pub fn context_key(&self) -> String {
        table_key(&self.table, &self.code_column, &self.name_column)
    }
}

/// Codes requested for one dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RequestedCodes {
    /// Whole dictionary.
    All,
    /// Only these codes.
    Only(BTreeSet<String>),
}

impl RequestedCodes {
    fn add(&mut self, code: String) {
        if let RequestedCodes::Only(codes) = self {
            codes.insert(code);
        }
    }

    fn batch_argument(&self) -> String {
        match self {
            RequestedCodes::All => normalize_codes(Vec::<String>::new()),
            RequestedCodes::Only(codes) => normalize_codes(codes),
        }
    }
}

/// Accumulates dictionary requests and builds a [`TranslationContext`].
///
/// # Example
///
/// ```rust
/// use dict_trans::{
///     CodeName, DynamicEntity, EntityMetadata, TranslationContextBuilder,
///     TranslationDataSource, TranslationResult,
/// };
///
/// struct Source;
///
/// impl TranslationDataSource for Source {
///     fn translate_dict_batch_code2name(&self, _: &str, _: &str) -> TranslationResult<Vec<CodeName>> {
///         Ok(vec![CodeName::new("1", "Active")])
///     }
///
///     fn translate_table_dict_batch_code2name(
///         &self, _: &str, _: &str, _: &str, _: &str, _: Option<&str>,
///     ) -> TranslationResult<Vec<CodeName>> {
///         Ok(Vec::new())
///     }
/// }
///
/// let metadata = EntityMetadata::new("User").system_dict("status", "statusText", "user_status");
/// let user = DynamicEntity::new("User").with("status", "1").into_ref();
///
/// let context = TranslationContextBuilder::new(Source)
///     .collect_codes(&user, &metadata)
///     .build();
///
/// assert!(context.has_system_dict("user_status"));
/// ```
#[derive(Clone)]
pub struct TranslationContextBuilder {
    data_source: Arc<dyn TranslationDataSource>,
    cache: Arc<DictionaryCache>,
    system_requests: BTreeMap<String, RequestedCodes>,
    table_requests: BTreeMap<TableDictRequest, RequestedCodes>,
    bindings: HashMap<String, Value>,
    max_depth: usize,
    collections: CollectionIterationProcessor,
}

impl TranslationContextBuilder {
    /// Creates a builder with default configuration.
    pub fn new<S: TranslationDataSource + 'static>(data_source: S) -> Self {
        Self::with_config(data_source, &EngineConfig::default())
    }

    /// Creates a builder whose cache and collection depth follow `config`.
    pub fn with_config<S: TranslationDataSource + 'static>(
        data_source: S,
        config: &EngineConfig,
    ) -> Self {
        Self::from_parts(
            Arc::new(data_source),
            Arc::new(DictionaryCache::new(config.cache.clone())),
            config.recursion.max_depth,
        )
    }

    /// Creates a builder around an existing data source and cache.
    pub fn from_parts(
        data_source: Arc<dyn TranslationDataSource>,
        cache: Arc<DictionaryCache>,
        max_depth: usize,
    ) -> Self {
        Self {
            data_source,
            cache,
            system_requests: BTreeMap::new(),
            table_requests: BTreeMap::new(),
            bindings: HashMap::new(),
            max_depth,
            collections: CollectionIterationProcessor::new(),
        }
    }

    /// Declares whole system dictionaries to preload.
    pub fn with_system_dictionaries<I, S>(mut self, dict_codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dict_code in dict_codes {
            self.system_requests
                .insert(dict_code.into(), RequestedCodes::All);
        }
        self
    }

    /// Declares whole table dictionaries to preload.
    pub fn with_table_dictionaries<I>(mut self, requests: I) -> Self
    where
        I: IntoIterator<Item = TableDictRequest>,
    {
        for request in requests {
            self.table_requests.insert(request, RequestedCodes::All);
        }
        self
    }

    /// Declares one whole system dictionary.
    pub fn require_system_dict(self, dict_code: impl Into<String>) -> Self {
        self.with_system_dictionaries([dict_code.into()])
    }

    /// Declares one whole table dictionary.
    pub fn require_table_dict(self, request: TableDictRequest) -> Self {
        self.with_table_dictionaries([request])
    }

    /// Adds an auxiliary binding to the built context.
    pub fn with_binding(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    /// Declares every dictionary `metadata` uses, limited to the codes found
    /// in the graph under `root`.
    ///
    /// The walk follows nested fields with the same depth limit as
    /// translation. Each (entity, metadata) pair is walked again only when it
    /// is reached at a smaller depth than before, so cyclic graphs terminate
    /// and a node reached deep first still has its subtree collected through
    /// a shorter path.
    pub fn collect_codes(mut self, root: &EntityRef, metadata: &EntityMetadata) -> Self {
        let mut visited = HashMap::new();
        self.collect_node(root, metadata, 0, &mut visited);
        self
    }

    /// Collects codes from every entity of a collection.
    pub fn collect_collection_codes(
        mut self,
        items: &[EntityRef],
        metadata: &EntityMetadata,
    ) -> Self {
        let mut visited = HashMap::new();
        for item in items {
            self.collect_node(item, metadata, 0, &mut visited);
        }
        self
    }

    fn collect_node(
        &mut self,
        node: &EntityRef,
        metadata: &EntityMetadata,
        depth: usize,
        visited: &mut HashMap<(EntityId, usize), usize>,
    ) {
        if depth >= self.max_depth {
            return;
        }
        let marker = (node.id(), metadata as *const EntityMetadata as usize);
        match visited.get(&marker) {
            Some(&seen) if seen <= depth => return,
            _ => {
                visited.insert(marker, depth);
            }
        }

        for field in &metadata.system_dict_fields {
            let code = node.get_property(&field.source_field).and_then(|v| v.as_code());
            self.add_system_code(&field.dict_code, code);
        }

        for field in &metadata.table_dict_fields {
            let request = TableDictRequest {
                table: field.table.clone(),
                code_column: field.code_column.clone(),
                name_column: field.name_column.clone(),
                condition: field.condition.clone(),
            };
            let code = node.get_property(&field.source_field).and_then(|v| v.as_code());
            self.add_table_code(request, code);
        }

        for field in &metadata.expression_fields {
            self.collect_expression(node, &field.expression);
        }

        for nested in &metadata.nested_fields {
            let Some(value) = node.get_property(&nested.field_name) else {
                continue;
            };
            let nested_metadata = nested.resolve(metadata);
            let mut children = Vec::new();
            match &value {
                Value::Entity(child) => children.push(child.clone()),
                other => {
                    self.collections.process_collection(other, |element| {
                        if let Value::Entity(child) = element {
                            children.push(child.clone());
                        }
                    });
                }
            }
            for child in &children {
                self.collect_node(child, nested_metadata, depth + 1, visited);
            }
        }
    }

    fn collect_expression(&mut self, node: &EntityRef, expression: &str) {
        let expr = match dict_trans_expr::parse(expression) {
            Ok(expr) => expr,
            Err(e) => {
                debug!("Skipping code collection for '{}': {}", expression, e);
                return;
            }
        };

        let code_of = |operand: &Operand| match operand {
            Operand::Property(path) => node.get_path(path).and_then(|v| v.as_code()),
            Operand::Literal(text) => Some(text.clone()),
        };

        match &expr {
            Expr::DictLookup {
                dict_code,
                argument,
            } => {
                let code = code_of(argument);
                self.add_system_code(dict_code, code);
            }
            Expr::TableLookup {
                table,
                code_column,
                name_column,
                argument,
            } => {
                let code = code_of(argument);
                self.add_table_code(TableDictRequest::new(table, code_column, name_column), code);
            }
            Expr::PropertyAccess(_) | Expr::Literal(_) | Expr::Complex(_) => {}
        }
    }

    fn add_system_code(&mut self, dict_code: &str, code: Option<String>) {
        let entry = self
            .system_requests
            .entry(dict_code.to_string())
            .or_insert_with(|| RequestedCodes::Only(BTreeSet::new()));
        if let Some(code) = code {
            entry.add(code);
        }
    }

    fn add_table_code(&mut self, request: TableDictRequest, code: Option<String>) {
        let entry = self
            .table_requests
            .entry(request)
            .or_insert_with(|| RequestedCodes::Only(BTreeSet::new()));
        if let Some(code) = code {
            entry.add(code);
        }
    }

    /// Declared system dictionary codes, sorted.
    pub fn requested_system_dicts(&self) -> Vec<String> {
        self.system_requests.keys().cloned().collect()
    }

    /// Declared table dictionary requests, sorted.
    pub fn requested_table_dicts(&self) -> Vec<TableDictRequest> {
        self.table_requests.keys().cloned().collect()
    }

    /// Fetches every declared dictionary and returns the context.
    ///
    /// Each request not already cached costs exactly one data-source call. A
    /// failing request becomes an empty dictionary; the others are unaffected.
    pub fn build(&self) -> TranslationContext {
        let statistics = Arc::new(ProcessingStatistics::new());

        #[cfg(feature = "parallel")]
        let (system_dicts, table_dicts) = rayon::join(
            || self.load_system_dicts(&statistics),
            || self.load_table_dicts(&statistics),
        );

        #[cfg(not(feature = "parallel"))]
        let (system_dicts, table_dicts) = (
            self.load_system_dicts(&statistics),
            self.load_table_dicts(&statistics),
        );

        debug!(
            "Built translation context: {} system dicts, {} table dicts ({} cache hits, {} misses)",
            system_dicts.len(),
            table_dicts.len(),
            statistics.cache_hits(),
            statistics.cache_misses()
        );

        TranslationContext::from_parts(
            system_dicts,
            table_dicts,
            self.bindings.clone(),
            statistics,
        )
    }

    /// Runs [`build`](Self::build) on the tokio blocking pool.
    ///
    /// Must be awaited inside a tokio runtime.
    #[cfg(feature = "async")]
    pub async fn build_async(&self) -> TranslationResult<TranslationContext> {
        let builder = self.copy();
        tokio::task::spawn_blocking(move || builder.build())
            .await
            .map_err(|e| TranslationError::AsyncBuild(e.to_string()))
    }

    fn load_system_dicts(
        &self,
        statistics: &ProcessingStatistics,
    ) -> HashMap<String, Arc<Dictionary>> {
        let mut dicts = HashMap::with_capacity(self.system_requests.len());

        for (dict_code, requested) in &self.system_requests {
            let codes = requested.batch_argument();
            let key = CacheKey::System {
                dict_code: dict_code.clone(),
                codes: codes.clone(),
            };

            let dict = self.cached_or_fetch(key, statistics, || {
                self.data_source
                    .translate_dict_batch_code2name(dict_code, &codes)
            });
            dicts.insert(dict_code.clone(), dict);
        }

        dicts
    }

    fn load_table_dicts(
        &self,
        statistics: &ProcessingStatistics,
    ) -> HashMap<String, Arc<Dictionary>> {
        let mut dicts: HashMap<String, Arc<Dictionary>> =
            HashMap::with_capacity(self.table_requests.len());

        for (request, requested) in &self.table_requests {
            let codes = requested.batch_argument();
            let key = CacheKey::Table {
                table: request.table.clone(),
                code_column: request.code_column.clone(),
                name_column: request.name_column.clone(),
                condition: request.condition.clone(),
                codes: codes.clone(),
            };

            let dict = self.cached_or_fetch(key, statistics, || {
                self.data_source.translate_table_dict_batch_code2name(
                    &request.table,
                    &request.code_column,
                    &request.name_column,
                    &codes,
                    request.condition.as_deref(),
                )
            });

            // Requests differing only by condition share one context entry.
            match dicts.get_mut(&request.context_key()) {
                Some(existing) => Arc::make_mut(existing)
                    .extend(dict.iter().map(|(c, n)| (c.clone(), n.clone()))),
                None => {
                    dicts.insert(request.context_key(), dict);
                }
            }
        }

        dicts
    }

    fn cached_or_fetch<F>(
        &self,
        key: CacheKey,
        statistics: &ProcessingStatistics,
        fetch: F,
    ) -> Arc<Dictionary>
    where
        F: FnOnce() -> crate::error::TranslationResult<Vec<CodeName>>,
    {
        if let Some(dict) = self.cache.get(&key) {
            debug!("Cache hit for {}", key);
            statistics.record_cache_hit();
            return dict;
        }
        statistics.record_cache_miss();

        match fetch() {
            Ok(rows) => {
                let dict: Arc<Dictionary> = Arc::new(
                    rows.into_iter()
                        .map(|CodeName { code, name }| (code, name))
                        .collect(),
                );
                self.cache.set(key, Arc::clone(&dict));
                dict
            }
            Err(e) => {
                warn!("Dictionary fetch for {} failed, using empty dictionary: {}", key, e);
                Arc::new(Dictionary::new())
            }
        }
    }

    /// Returns an independent builder with the same requests and bindings.
    ///
    /// The copy shares the data source and result cache.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Result cache statistics.
    pub fn cache_statistics(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drops every cached dictionary.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

impl std::fmt::Debug for TranslationContextBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationContextBuilder")
            .field("system_requests", &self.system_requests.len())
            .field("table_requests", &self.table_requests.len())
            .field("bindings", &self.bindings.len())
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::DynamicEntity;
    use crate::error::{TranslationError, TranslationResult};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSource {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingSource {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl TranslationDataSource for RecordingSource {
        fn translate_dict_batch_code2name(
            &self,
            dict_code: &str,
            codes: &str,
        ) -> TranslationResult<Vec<CodeName>> {
            self.calls.lock().push(format!("dict:{}:{}", dict_code, codes));
            match dict_code {
                "user_status" => Ok(vec![
                    CodeName::new("1", "Active"),
                    CodeName::new("0", "Inactive"),
                ]),
                "broken" => Err(TranslationError::DataSource("boom".to_string())),
                _ => Ok(Vec::new()),
            }
        }

        fn translate_table_dict_batch_code2name(
            &self,
            table: &str,
            _code_column: &str,
            _name_column: &str,
            codes: &str,
            condition: Option<&str>,
        ) -> TranslationResult<Vec<CodeName>> {
            self.calls.lock().push(format!(
                "table:{}:{}:{}",
                table,
                codes,
                condition.unwrap_or("-")
            ));
            Ok(vec![CodeName::new("10", "Engineering")])
        }
    }

    fn builder(source: &Arc<RecordingSource>) -> TranslationContextBuilder {
        TranslationContextBuilder::new(Arc::clone(source))
    }

    #[test]
    fn test_required_dicts_use_wildcard() {
        let source = Arc::new(RecordingSource::default());
        let context = builder(&source)
            .require_system_dict("user_status")
            .require_table_dict(TableDictRequest::new("sys_dept", "id", "name"))
            .build();

        assert_eq!(
            source.calls(),
            vec!["dict:user_status:%", "table:sys_dept:%:-"]
        );
        assert_eq!(
            context.get_system_dict_translation("user_status", &Value::from("0")),
            Some("Inactive".to_string())
        );
        assert!(context.has_table_dict("sys_dept", "id", "name"));
    }

    #[test]
    fn test_collect_codes_limits_fetch() {
        let source = Arc::new(RecordingSource::default());
        let metadata = EntityMetadata::new("User")
            .system_dict("status", "statusText", "user_status")
            .nested_self("manager");
        let manager = DynamicEntity::new("User").with("status", "0").into_ref();
        let user = DynamicEntity::new("User")
            .with("status", 1)
            .with("manager", manager)
            .into_ref();

        builder(&source).collect_codes(&user, &metadata).build();

        assert_eq!(source.calls(), vec!["dict:user_status:0,1"]);
    }

    #[test]
    fn test_collect_codes_from_expressions_and_conditions() {
        let source = Arc::new(RecordingSource::default());
        let metadata = EntityMetadata::new("User")
            .expression("label", "#dict('gender', entity.gender)")
            .table_dict_where(crate::metadata::TableDictField {
                source_field: "deptId".to_string(),
                target_field: "deptName".to_string(),
                table: "sys_dept".to_string(),
                code_column: "id".to_string(),
                name_column: "name".to_string(),
                condition: Some("deleted = 0".to_string()),
            });
        let user = DynamicEntity::new("User")
            .with("gender", "m")
            .with("deptId", 10)
            .into_ref();

        builder(&source).collect_codes(&user, &metadata).build();

        assert_eq!(
            source.calls(),
            vec!["dict:gender:m", "table:sys_dept:10:deleted = 0"]
        );
    }

    #[test]
    fn test_collect_codes_terminates_on_cycle() {
        let source = Arc::new(RecordingSource::default());
        let metadata = EntityMetadata::new("Node")
            .system_dict("status", "statusText", "user_status")
            .nested_self("next");
        let node = DynamicEntity::new("Node").with("status", "1").into_ref();
        node.set_property("next", Value::Entity(node.clone())).unwrap();

        let builder = builder(&source).collect_codes(&node, &metadata);
        assert_eq!(builder.requested_system_dicts(), vec!["user_status"]);
    }

    #[test]
    fn test_collect_codes_rewalks_node_reached_by_shorter_path() {
        let source = Arc::new(RecordingSource::default());
        let config = EngineConfig::builder().with_max_depth(3).build();
        let metadata = EntityMetadata::new("Node")
            .system_dict("status", "statusText", "user_status")
            .nested_self("a")
            .nested_self("b");

        // r.a -> x.a -> s.a -> c and r.b -> s: c sits at depth 3 on the
        // first path but at depth 2 through r.b.
        let c = DynamicEntity::new("Node").with("status", "c").into_ref();
        let s = DynamicEntity::new("Node")
            .with("status", "s")
            .with("a", c)
            .into_ref();
        let x = DynamicEntity::new("Node")
            .with("status", "x")
            .with("a", s.clone())
            .into_ref();
        let r = DynamicEntity::new("Node")
            .with("status", "r")
            .with("a", x)
            .with("b", s)
            .into_ref();

        TranslationContextBuilder::with_config(Arc::clone(&source), &config)
            .collect_codes(&r, &metadata)
            .build();

        assert_eq!(source.calls(), vec!["dict:user_status:c,r,s,x"]);
    }

    #[test]
    fn test_failed_request_degrades_alone() {
        let source = Arc::new(RecordingSource::default());
        let context = builder(&source)
            .with_system_dictionaries(["broken", "user_status"])
            .build();

        assert!(context.has_system_dict("broken"));
        assert_eq!(
            context.get_system_dict_translation("broken", &Value::from("1")),
            None
        );
        assert_eq!(
            context.get_system_dict_translation("user_status", &Value::from("1")),
            Some("Active".to_string())
        );
    }

    #[test]
    fn test_cache_reused_and_failures_not_cached() {
        let source = Arc::new(RecordingSource::default());
        let builder = builder(&source).with_system_dictionaries(["broken", "user_status"]);

        builder.build();
        let second = builder.build();

        assert_eq!(
            source.calls(),
            vec![
                "dict:broken:%",
                "dict:user_status:%",
                "dict:broken:%",
            ]
        );
        assert_eq!(second.statistics().cache_hits(), 1);
        assert_eq!(second.statistics().cache_misses(), 1);
        assert_eq!(builder.cache_statistics().total_entries, 1);

        builder.clear_cache();
        assert_eq!(builder.cache_statistics().total_entries, 0);
    }

    #[test]
    fn test_copy_is_independent_but_shares_cache() {
        let source = Arc::new(RecordingSource::default());
        let original = builder(&source).require_system_dict("user_status");
        let copy = original.copy().require_system_dict("gender");

        assert_eq!(original.requested_system_dicts(), vec!["user_status"]);
        assert_eq!(copy.requested_system_dicts(), vec!["gender", "user_status"]);

        original.build();
        let context = copy.build();
        assert_eq!(context.statistics().cache_hits(), 1);
    }

    #[test]
    fn test_bindings_reach_context() {
        let source = Arc::new(RecordingSource::default());
        let context = builder(&source).with_binding("tenant", "acme").build();
        assert_eq!(context.binding("tenant"), Some(&Value::from("acme")));
        assert!(source.calls().is_empty());
    }

    #[test]
    fn test_table_requests_with_different_conditions_merge() {
        let source = Arc::new(RecordingSource::default());
        let context = builder(&source)
            .with_table_dictionaries([
                TableDictRequest::new("sys_dept", "id", "name"),
                TableDictRequest::new("sys_dept", "id", "name").with_condition("deleted = 0"),
            ])
            .build();

        assert_eq!(source.calls().len(), 2);
        assert_eq!(context.available_table_dicts(), vec!["sys_dept:id:name"]);
    }
}
