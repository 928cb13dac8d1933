//! Per-type translation metadata.
//!
//! Metadata is produced outside the engine (build-time generation, hand
//! written tables, or JSON with the `serde` feature) and is read-only here.

use std::sync::Arc;

/// A field translated through a system dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SystemDictField {
    /// Field holding the code.
    pub source_field: String,
    /// Field receiving the name.
    pub target_field: String,
    /// Dictionary code.
    pub dict_code: String,
}

/// A field translated through a table dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TableDictField {
    /// Field holding the code.
    pub source_field: String,
    /// Field receiving the name.
    pub target_field: String,
    /// Source table.
    pub table: String,
    /// Column holding codes.
    pub code_column: String,
    /// Column holding names.
    pub name_column: String,
    /// Optional row filter passed through to the data source.
    #[cfg_attr(feature = "serde", serde(default))]
    pub condition: Option<String>,
}

/// A field computed from a micro expression.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExpressionField {
    /// Field receiving the result.
    pub target_field: String,
    /// Expression text, e.g. `#dict('user_status', entity.status)`.
    pub expression: String,
}

/// Metadata used for the values of a nested field.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NestedMetadata {
    /// Explicit metadata for the nested type.
    Declared(Arc<EntityMetadata>),
    /// The nested type is the enclosing type (e.g. `Department.parent`).
    SameAsParent,
}

/// A field holding a nested entity or a container of entities.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NestedField {
    /// Field holding the nested value.
    pub field_name: String,
    /// How to translate the nested value.
    pub metadata: NestedMetadata,
}

impl NestedField {
    /// Resolves the metadata to apply, given the enclosing type's metadata.
    pub fn resolve<'a>(&'a self, parent: &'a EntityMetadata) -> &'a EntityMetadata {
        match &self.metadata {
            NestedMetadata::Declared(metadata) => metadata.as_ref(),
            NestedMetadata::SameAsParent => parent,
        }
    }
}

/// Translation description of one entity type.
///
/// # Example
///
/// ```rust
/// use dict_trans::EntityMetadata;
///
/// let role = EntityMetadata::new("Role").system_dict("type", "typeName", "role_type");
/// let user = EntityMetadata::new("User")
///     .system_dict("status", "statusText", "user_status")
///     .table_dict("deptId", "deptName", "sys_dept", "id", "name")
///     .expression("label", "#dict('user_status', entity.status)")
///     .nested("role", role);
///
/// assert_eq!(user.nested_fields.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EntityMetadata {
    /// Entity type name.
    pub type_name: String,
    /// System dictionary fields.
    pub system_dict_fields: Vec<SystemDictField>,
    /// Table dictionary fields.
    pub table_dict_fields: Vec<TableDictField>,
    /// Expression fields.
    pub expression_fields: Vec<ExpressionField>,
    /// Nested entity fields.
    pub nested_fields: Vec<NestedField>,
}

impl EntityMetadata {
    /// Creates empty metadata for a type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Adds a system dictionary field.
    pub fn system_dict(
        mut self,
        source_field: impl Into<String>,
        target_field: impl Into<String>,
        dict_code: impl Into<String>,
    ) -> Self {
        self.system_dict_fields.push(SystemDictField {
            source_field: source_field.into(),
            target_field: target_field.into(),
            dict_code: dict_code.into(),
        });
        self
    }

    /// Adds a table dictionary field.
    pub fn table_dict(
        mut self,
        source_field: impl Into<String>,
        target_field: impl Into<String>,
        table: impl Into<String>,
        code_column: impl Into<String>,
        name_column: impl Into<String>,
    ) -> Self {
        self.table_dict_fields.push(TableDictField {
            source_field: source_field.into(),
            target_field: target_field.into(),
            table: table.into(),
            code_column: code_column.into(),
            name_column: name_column.into(),
            condition: None,
        });
        self
    }

    /// Adds a table dictionary field with a row filter.
    pub fn table_dict_where(mut self, field: TableDictField) -> Self {
        self.table_dict_fields.push(field);
        self
    }

    /// Adds an expression field.
    pub fn expression(
        mut self,
        target_field: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        self.expression_fields.push(ExpressionField {
            target_field: target_field.into(),
            expression: expression.into(),
        });
        self
    }

    /// Adds a nested field with its own metadata.
    pub fn nested(mut self, field_name: impl Into<String>, metadata: EntityMetadata) -> Self {
        self.nested_fields.push(NestedField {
            field_name: field_name.into(),
            metadata: NestedMetadata::Declared(Arc::new(metadata)),
        });
        self
    }

    /// Adds a nested field with shared metadata.
    pub fn nested_shared(
        mut self,
        field_name: impl Into<String>,
        metadata: Arc<EntityMetadata>,
    ) -> Self {
        self.nested_fields.push(NestedField {
            field_name: field_name.into(),
            metadata: NestedMetadata::Declared(metadata),
        });
        self
    }

    /// Adds a nested field of the same type as this one.
    pub fn nested_self(mut self, field_name: impl Into<String>) -> Self {
        self.nested_fields.push(NestedField {
            field_name: field_name.into(),
            metadata: NestedMetadata::SameAsParent,
        });
        self
    }

    /// Returns true if this type declares any field to translate directly.
    pub fn has_translations(&self) -> bool {
        !self.system_dict_fields.is_empty()
            || !self.table_dict_fields.is_empty()
            || !self.expression_fields.is_empty()
    }
}
