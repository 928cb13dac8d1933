//! Syntax tree types for micro expressions and conditions.

use std::fmt;

use crate::error::{ExprError, ExprResult};

/// Classification of a parsed expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComponentType {
    /// `#dict('<code>', <operand>)`
    DictLookup,
    /// `#table('<table>', '<codeCol>', '<nameCol>', <operand>)`
    TableLookup,
    /// `entity.<name>`
    PropertyAccess,
    /// `'<text>'`
    Literal,
    /// Anything else.
    Complex,
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentType::DictLookup => "DICT_LOOKUP",
            ComponentType::TableLookup => "TABLE_LOOKUP",
            ComponentType::PropertyAccess => "PROPERTY_ACCESS",
            ComponentType::Literal => "LITERAL",
            ComponentType::Complex => "COMPLEX",
        };
        f.write_str(name)
    }
}

/// A dotted property path rooted at the entity, e.g. `entity.role.type`.
///
/// The `entity.` prefix is not stored; `segments` holds `["role", "type"]`.
///
/// Serialized as the plain segment list; an empty list is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "Vec<String>", into = "Vec<String>")
)]
pub struct PropertyPath {
    segments: Vec<String>,
}

impl PropertyPath {
    /// Creates a path from its segments.
    ///
    /// Returns `None` when `segments` is empty.
    pub fn new<I, S>(segments: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    /// The property read directly on the root entity.
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    /// All segments in traversal order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns true if the path names a single property.
    pub fn is_simple(&self) -> bool {
        self.segments.len() == 1
    }
}

impl TryFrom<Vec<String>> for PropertyPath {
    type Error = ExprError;

    fn try_from(segments: Vec<String>) -> ExprResult<Self> {
        Self::new(segments).ok_or(ExprError::EmptyPropertyPath)
    }
}

impl From<PropertyPath> for Vec<String> {
    fn from(path: PropertyPath) -> Self {
        path.segments
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity.{}", self.segments.join("."))
    }
}

/// Argument of a lookup function.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// Value read from the entity.
    Property(PropertyPath),
    /// Fixed text.
    Literal(String),
}

/// A parsed micro expression.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expr {
    /// System dictionary lookup.
    DictLookup {
        /// Dictionary code.
        dict_code: String,
        /// Value to translate.
        argument: Operand,
    },
    /// Table dictionary lookup.
    TableLookup {
        /// Source table.
        table: String,
        /// Column holding codes.
        code_column: String,
        /// Column holding display names.
        name_column: String,
        /// Value to translate.
        argument: Operand,
    },
    /// Plain property read.
    PropertyAccess(PropertyPath),
    /// Single-quoted literal.
    Literal(String),
    /// Text outside the recognized grammar, kept verbatim.
    Complex(String),
}

impl Expr {
    /// Returns the classification of this expression.
    pub fn component_type(&self) -> ComponentType {
        match self {
            Expr::DictLookup { .. } => ComponentType::DictLookup,
            Expr::TableLookup { .. } => ComponentType::TableLookup,
            Expr::PropertyAccess(_) => ComponentType::PropertyAccess,
            Expr::Literal(_) => ComponentType::Literal,
            Expr::Complex(_) => ComponentType::Complex,
        }
    }

    /// Property paths this expression reads from the entity.
    pub fn property_references(&self) -> Vec<&PropertyPath> {
        match self {
            Expr::DictLookup { argument, .. } | Expr::TableLookup { argument, .. } => {
                match argument {
                    Operand::Property(path) => vec![path],
                    Operand::Literal(_) => Vec::new(),
                }
            }
            Expr::PropertyAccess(path) => vec![path],
            Expr::Literal(_) | Expr::Complex(_) => Vec::new(),
        }
    }
}

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConditionOperator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionOperator::Equal => write!(f, "=="),
            ConditionOperator::NotEqual => write!(f, "!="),
        }
    }
}

/// A `<property> (==|!=) '<literal>'` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Condition {
    /// Property compared on the entity.
    pub property: PropertyPath,
    /// Comparison operator.
    pub operator: ConditionOperator,
    /// Literal compared against.
    pub value: String,
}

impl Condition {
    /// Applies the comparison to the stringified property value.
    ///
    /// A missing value never equals a literal.
    pub fn matches(&self, actual: Option<&str>) -> bool {
        let equal = actual == Some(self.value.as_str());
        match self.operator {
            ConditionOperator::Equal => equal,
            ConditionOperator::NotEqual => !equal,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} '{}'", self.property, self.operator, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_path_display() {
        let path = PropertyPath::new(["role", "type"]).unwrap();
        assert_eq!(path.to_string(), "entity.role.type");
        assert_eq!(path.root(), "role");
        assert!(!path.is_simple());
        assert!(PropertyPath::new(Vec::<String>::new()).is_none());
    }

    #[test]
    fn test_property_references() {
        let status = PropertyPath::new(["status"]).unwrap();
        let expr = Expr::DictLookup {
            dict_code: "user_status".to_string(),
            argument: Operand::Property(status.clone()),
        };
        assert_eq!(expr.property_references(), vec![&status]);
        assert!(Expr::Literal("x".to_string()).property_references().is_empty());
    }

    #[test]
    fn test_condition_matches() {
        let condition = Condition {
            property: PropertyPath::new(["type"]).unwrap(),
            operator: ConditionOperator::Equal,
            value: "admin".to_string(),
        };
        assert!(condition.matches(Some("admin")));
        assert!(!condition.matches(Some("user")));
        assert!(!condition.matches(None));

        let negated = Condition {
            operator: ConditionOperator::NotEqual,
            ..condition
        };
        assert!(negated.matches(None));
        assert!(!negated.matches(Some("admin")));
    }

    #[test]
    fn test_component_type_display() {
        assert_eq!(ComponentType::DictLookup.to_string(), "DICT_LOOKUP");
        assert_eq!(ComponentType::Complex.to_string(), "COMPLEX");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_expr_serde_roundtrip() {
        let expr = crate::parse("#table('sys_dept', 'id', 'name', entity.deptId)").unwrap();
        let json = serde_json::to_string(&expr).unwrap();
        let back: Expr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, expr);
    }

    #[test]
    fn test_property_path_try_from() {
        let path = PropertyPath::try_from(vec!["role".to_string(), "type".to_string()]).unwrap();
        assert_eq!(path.root(), "role");
        assert_eq!(
            PropertyPath::try_from(Vec::<String>::new()),
            Err(ExprError::EmptyPropertyPath)
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_empty_property_path_rejected_on_deserialize() {
        assert!(serde_json::from_str::<PropertyPath>("[]").is_err());
        assert!(serde_json::from_str::<Operand>(r#"{"Property":[]}"#).is_err());

        let path: PropertyPath = serde_json::from_str(r#"["role","type"]"#).unwrap();
        assert_eq!(path.segments(), ["role", "type"]);
    }
}
