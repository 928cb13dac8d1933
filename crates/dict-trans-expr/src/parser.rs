//! Expression and condition parser implementation using nom.
//!
//! The expression grammar knows four shapes:
//!
//! ```text
//! expression  := dict | table | property | literal
//! dict        := "#dict" "(" literal "," operand ")"
//! table       := "#table" "(" literal "," literal "," literal "," operand ")"
//! property    := "entity" "." ident ("." ident)*
//! literal     := "'" [^']* "'"
//! operand     := property | literal
//! ```
//!
//! Text that fails this grammar but is otherwise well formed is classified as
//! [`Expr::Complex`]. Conditions follow `path ("==" | "!=") literal`, where the
//! `entity.` prefix of the path is optional.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, opt, recognize, value},
    error::{Error as NomError, ErrorKind},
    multi::separated_list1,
    sequence::{delimited, pair, preceded},
    IResult,
};

use crate::ast::{Condition, ConditionOperator, Expr, Operand, PropertyPath};
use crate::error::{ExprError, ExprResult};

/// Parse a micro expression.
///
/// # Errors
///
/// * [`ExprError::EmptyExpression`] for blank input
/// * [`ExprError::UnbalancedParentheses`] when parentheses outside quotes do not pair up
///
/// # Examples
///
/// ```rust
/// use dict_trans_expr::{parse, ComponentType};
///
/// let expr = parse("#dict('user_status', entity.status)").unwrap();
/// assert_eq!(expr.component_type(), ComponentType::DictLookup);
///
/// let expr = parse("entity.name.length()").unwrap();
/// assert_eq!(expr.component_type(), ComponentType::Complex);
/// ```
pub fn parse(input: &str) -> ExprResult<Expr> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ExprError::EmptyExpression);
    }
    let offset = input.len() - input.trim_start().len();
    check_parentheses(trimmed, offset)?;

    match all_consuming(expression)(trimmed) {
        Ok((_, expr)) => Ok(expr),
        Err(_) => Ok(Expr::Complex(trimmed.to_string())),
    }
}

/// Parse a condition such as `entity.type == 'admin'`.
///
/// # Examples
///
/// ```rust
/// use dict_trans_expr::{parse_condition, ConditionOperator};
///
/// let condition = parse_condition("entity.type != 'a == b'").unwrap();
/// assert_eq!(condition.operator, ConditionOperator::NotEqual);
/// assert_eq!(condition.value, "a == b");
/// ```
pub fn parse_condition(input: &str) -> ExprResult<Condition> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ExprError::EmptyExpression);
    }

    all_consuming(condition)(trimmed)
        .map(|(_, condition)| condition)
        .map_err(|_| ExprError::InvalidCondition(trimmed.to_string()))
}

/// Verifies that every parenthesis outside a quoted literal is paired.
fn check_parentheses(input: &str, offset: usize) -> ExprResult<()> {
    let mut open = Vec::new();
    let mut in_literal = false;

    for (idx, ch) in input.char_indices() {
        match ch {
            '\'' => in_literal = !in_literal,
            '(' if !in_literal => open.push(idx),
            ')' if !in_literal => {
                if open.pop().is_none() {
                    return Err(ExprError::UnbalancedParentheses {
                        position: offset + idx,
                    });
                }
            }
            _ => {}
        }
    }

    match open.first() {
        Some(idx) => Err(ExprError::UnbalancedParentheses {
            position: offset + idx,
        }),
        None => Ok(()),
    }
}

// ============================================================================
// Expressions
// ============================================================================

fn expression(input: &str) -> IResult<&str, Expr> {
    delimited(
        ws,
        alt((
            dict_lookup,
            table_lookup,
            map(property_path, Expr::PropertyAccess),
            map(quoted, |s: &str| Expr::Literal(s.to_string())),
        )),
        ws,
    )(input)
}

fn dict_lookup(input: &str) -> IResult<&str, Expr> {
    let (input, _) = tag("#dict")(input)?;
    let (input, _) = open_paren(input)?;
    let (input, dict_code) = quoted(input)?;
    let (input, _) = comma(input)?;
    let (input, argument) = operand(input)?;
    let (input, _) = close_paren(input)?;

    Ok((
        input,
        Expr::DictLookup {
            dict_code: dict_code.to_string(),
            argument,
        },
    ))
}

fn table_lookup(input: &str) -> IResult<&str, Expr> {
    let (input, _) = tag("#table")(input)?;
    let (input, _) = open_paren(input)?;
    let (input, table) = quoted(input)?;
    let (input, _) = comma(input)?;
    let (input, code_column) = quoted(input)?;
    let (input, _) = comma(input)?;
    let (input, name_column) = quoted(input)?;
    let (input, _) = comma(input)?;
    let (input, argument) = operand(input)?;
    let (input, _) = close_paren(input)?;

    Ok((
        input,
        Expr::TableLookup {
            table: table.to_string(),
            code_column: code_column.to_string(),
            name_column: name_column.to_string(),
            argument,
        },
    ))
}

fn operand(input: &str) -> IResult<&str, Operand> {
    alt((
        map(property_path, Operand::Property),
        map(quoted, |s: &str| Operand::Literal(s.to_string())),
    ))(input)
}

/// `entity.a.b`
fn property_path(input: &str) -> IResult<&str, PropertyPath> {
    preceded(pair(tag("entity"), char('.')), path_segments)(input)
}

fn path_segments(input: &str) -> IResult<&str, PropertyPath> {
    let (rest, segments) = separated_list1(char('.'), identifier)(input)?;
    match PropertyPath::new(segments) {
        Some(path) => Ok((rest, path)),
        None => Err(nom::Err::Error(NomError::new(input, ErrorKind::SeparatedList))),
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('\''), take_while(|c| c != '\''), char('\''))(input)
}

fn open_paren(input: &str) -> IResult<&str, char> {
    delimited(ws, char('('), ws)(input)
}

fn close_paren(input: &str) -> IResult<&str, char> {
    preceded(ws, char(')'))(input)
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(ws, char(','), ws)(input)
}

/// Optional whitespace
fn ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}

// ============================================================================
// Conditions
// ============================================================================

fn condition(input: &str) -> IResult<&str, Condition> {
    let (input, property) = preceded(opt(pair(tag("entity"), char('.'))), path_segments)(input)?;
    let (input, operator) = delimited(
        ws,
        alt((
            value(ConditionOperator::Equal, tag("==")),
            value(ConditionOperator::NotEqual, tag("!=")),
        )),
        ws,
    )(input)?;
    let (input, literal) = quoted(input)?;

    Ok((
        input,
        Condition {
            property,
            operator,
            value: literal.to_string(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ComponentType;

    fn path(segments: &[&str]) -> PropertyPath {
        PropertyPath::new(segments.iter().copied()).unwrap()
    }

    #[test]
    fn test_parse_property_access() {
        let expr = parse("entity.name").unwrap();
        assert_eq!(expr, Expr::PropertyAccess(path(&["name"])));
    }

    #[test]
    fn test_parse_nested_property_access() {
        let expr = parse("entity.role.type").unwrap();
        assert_eq!(expr, Expr::PropertyAccess(path(&["role", "type"])));
    }

    #[test]
    fn test_parse_dict_lookup() {
        let expr = parse("#dict('user_status', entity.status)").unwrap();
        assert_eq!(
            expr,
            Expr::DictLookup {
                dict_code: "user_status".to_string(),
                argument: Operand::Property(path(&["status"])),
            }
        );
    }

    #[test]
    fn test_parse_dict_lookup_with_whitespace() {
        let expr = parse("  #dict ( 'user_status' ,entity.status )  ").unwrap();
        assert_eq!(expr.component_type(), ComponentType::DictLookup);
    }

    #[test]
    fn test_parse_dict_lookup_with_literal_argument() {
        let expr = parse("#dict('user_status', '1')").unwrap();
        assert_eq!(
            expr,
            Expr::DictLookup {
                dict_code: "user_status".to_string(),
                argument: Operand::Literal("1".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_table_lookup() {
        let expr = parse("#table('sys_dept', 'id', 'name', entity.deptId)").unwrap();
        assert_eq!(
            expr,
            Expr::TableLookup {
                table: "sys_dept".to_string(),
                code_column: "id".to_string(),
                name_column: "name".to_string(),
                argument: Operand::Property(path(&["deptId"])),
            }
        );
    }

    #[test]
    fn test_parse_literal() {
        let expr = parse("'Fixed Value'").unwrap();
        assert_eq!(expr, Expr::Literal("Fixed Value".to_string()));
    }

    #[test]
    fn test_parse_literal_with_parentheses() {
        let expr = parse("'a (b'").unwrap();
        assert_eq!(expr, Expr::Literal("a (b".to_string()));
    }

    #[test]
    fn test_parse_complex() {
        for text in ["System.exit(0)", "entity.name + 'x'", "#dict('only_one')", "name"] {
            let expr = parse(text).unwrap();
            assert_eq!(expr, Expr::Complex(text.to_string()), "for {text}");
        }
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse(""), Err(ExprError::EmptyExpression));
        assert_eq!(parse("   "), Err(ExprError::EmptyExpression));
    }

    #[test]
    fn test_parse_unbalanced_missing_close() {
        let err = parse("#dict('user_status', entity.status").unwrap_err();
        assert_eq!(err, ExprError::UnbalancedParentheses { position: 5 });
    }

    #[test]
    fn test_parse_unbalanced_extra_close() {
        let err = parse("#dict('user_status', entity.status))").unwrap_err();
        assert!(matches!(err, ExprError::UnbalancedParentheses { position: 35 }));
    }

    #[test]
    fn test_parse_unbalanced_position_accounts_for_leading_whitespace() {
        let err = parse("  unbalanced(").unwrap_err();
        assert_eq!(err, ExprError::UnbalancedParentheses { position: 12 });
    }

    #[test]
    fn test_parse_condition_equal() {
        let condition = parse_condition("entity.type == 'admin'").unwrap();
        assert_eq!(condition.property, path(&["type"]));
        assert_eq!(condition.operator, ConditionOperator::Equal);
        assert_eq!(condition.value, "admin");
    }

    #[test]
    fn test_parse_condition_without_prefix() {
        let condition = parse_condition("status!='1'").unwrap();
        assert_eq!(condition.property, path(&["status"]));
        assert_eq!(condition.operator, ConditionOperator::NotEqual);
        assert_eq!(condition.value, "1");
    }

    #[test]
    fn test_parse_condition_prefix_lookalike() {
        let condition = parse_condition("entityType == 'x'").unwrap();
        assert_eq!(condition.property, path(&["entityType"]));
    }

    #[test]
    fn test_parse_condition_literal_containing_operator() {
        let condition = parse_condition("entity.note == 'a != b == c'").unwrap();
        assert_eq!(condition.operator, ConditionOperator::Equal);
        assert_eq!(condition.value, "a != b == c");
    }

    #[test]
    fn test_parse_condition_invalid() {
        assert!(matches!(
            parse_condition("entity.type = 'admin'"),
            Err(ExprError::InvalidCondition(_))
        ));
        assert!(matches!(
            parse_condition("entity.type == admin"),
            Err(ExprError::InvalidCondition(_))
        ));
        assert_eq!(parse_condition(" "), Err(ExprError::EmptyExpression));
    }
}
