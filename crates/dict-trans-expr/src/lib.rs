//! # dict-trans-expr
//!
//! Grammar for the micro expression language used by `dict-trans` to compute
//! translated fields, plus the condition grammar used by dynamic lookups.
//!
//! ## Expression Usage
//!
//! ```rust
//! use dict_trans_expr::{parse, ComponentType, Expr};
//!
//! // System dictionary lookup
//! let expr = parse("#dict('user_status', entity.status)").unwrap();
//! assert_eq!(expr.component_type(), ComponentType::DictLookup);
//!
//! // Table dictionary lookup
//! let expr = parse("#table('sys_dept', 'id', 'name', entity.deptId)").unwrap();
//! assert_eq!(expr.component_type(), ComponentType::TableLookup);
//!
//! // Literal
//! assert_eq!(parse("'Fixed'").unwrap(), Expr::Literal("Fixed".to_string()));
//! ```
//!
//! ## Syntax Quick Reference
//!
//! | Shape | Example | Classification |
//! |-------|---------|----------------|
//! | Dict lookup | `#dict('user_status', entity.status)` | `DictLookup` |
//! | Table lookup | `#table('sys_dept', 'id', 'name', entity.deptId)` | `TableLookup` |
//! | Property access | `entity.name`, `entity.role.type` | `PropertyAccess` |
//! | Literal | `'Fixed Value'` | `Literal` |
//! | Anything else | `entity.a + entity.b` | `Complex` |
//!
//! Conditions have the form `entity.type == 'admin'` or `status != '1'`.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod ast;
mod error;
mod parser;

pub use ast::{ComponentType, Condition, ConditionOperator, Expr, Operand, PropertyPath};
pub use error::{ExprError, ExprResult};
pub use parser::{parse, parse_condition};
