//! Optional-field condition expressions.
//!
//! A condition is either a single `<cond>` expression (`$Flags.HasName`,
//! `!$Flags.HasName`, `$Count > 0`, `$Name.size = 4`) or an `<and>`/`<or>`
//! tree of nested conditions. Expressions are tokenised with longest-match
//! operator scanning and verified against the sibling fields of the
//! containing bundle/message.

use crate::ctx::ParseCtx;
use crate::error::{Error, ErrorKind, Result};
use crate::field::{Field, FieldKind};
use crate::xml::XmlNode;

const DEREF: char = '$';
const ESC: char = '\\';

/// Comparison operators, longest first so that `!=` wins over `=`.
const OPERATORS: &[&str] = &["!=", ">=", "<=", "=", ">", "<"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondExpr {
    /// Left operand; empty for existence/bit checks.
    pub left: String,
    /// One of the comparison operators, `!` for negated existence, or empty
    /// for a positive existence/bit check.
    pub op: String,
    /// Right operand: a literal, or a `$` dereference.
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptCond {
    Expr(CondExpr),
    And(Vec<OptCond>),
    Or(Vec<OptCond>),
}

/// What a dereference path resolved to.
enum Target<'a> {
    Field(&'a Field),
    Bit,
    Size(&'a Field),
    Exists,
}

impl OptCond {
    /// Parses a single `<cond>` expression string.
    pub fn parse_expr(expr: &str, node: &XmlNode, ctx: &ParseCtx<'_>) -> Result<OptCond> {
        let expr = expr.trim();
        let invalid = || ctx.err(ErrorKind::ConditionError, node, "Invalid \"cond\" expression");

        if expr.is_empty() {
            return Err(invalid());
        }

        for op in OPERATORS {
            let Some(op_pos) = find_unescaped(expr, op) else {
                continue;
            };
            if op_pos == 0 {
                return Err(invalid());
            }

            let left = expr[..op_pos].trim_end();
            let right = expr[op_pos + op.len()..].trim_start();
            if left.is_empty() || right.is_empty() {
                return Err(invalid());
            }

            if !left.starts_with(DEREF) {
                return Err(ctx.err(
                    ErrorKind::ConditionError,
                    node,
                    "Invalid \"cond\" expression, left side of comparison operator must \
                     dereference other field.",
                ));
            }

            return Ok(OptCond::Expr(CondExpr {
                left: left.to_string(),
                op: (*op).to_string(),
                right: right.to_string(),
            }));
        }

        if expr.starts_with(DEREF) {
            return Ok(OptCond::Expr(CondExpr {
                left: String::new(),
                op: String::new(),
                right: expr.to_string(),
            }));
        }

        let Some(rest) = expr.strip_prefix('!') else {
            return Err(invalid());
        };
        let rest = rest.trim_start();
        if !rest.starts_with(DEREF) {
            return Err(ctx.err(
                ErrorKind::ConditionError,
                node,
                "Invalid \"cond\" expression, the check must dereference other field.",
            ));
        }

        Ok(OptCond::Expr(CondExpr {
            left: String::new(),
            op: "!".to_string(),
            right: rest.to_string(),
        }))
    }

    /// Parses an `<and>`/`<or>` bundling element.
    pub fn parse_list(node: &XmlNode, ctx: &ParseCtx<'_>) -> Result<OptCond> {
        let is_and = match node.name.as_str() {
            "and" => true,
            "or" => false,
            other => {
                return Err(ctx.err(
                    ErrorKind::ConditionError,
                    node,
                    format!("Unknown condition type \"{}\".", other),
                ));
            }
        };

        let mut conds = Vec::new();
        for child in &node.children {
            match child.name.as_str() {
                "cond" => {
                    let expr = crate::xml::parse_node_value(child, ctx.logger, true)?
                        .unwrap_or_default();
                    conds.push(OptCond::parse_expr(&expr, child, ctx)?);
                }
                "and" | "or" => conds.push(OptCond::parse_list(child, ctx)?),
                other => {
                    return Err(ctx.err(
                        ErrorKind::ConditionError,
                        child,
                        format!(
                            "Unknown element \"{}\" inside \"{}\" condition bundling.",
                            other, node.name
                        ),
                    ));
                }
            }
        }

        if conds.len() < 2 {
            return Err(ctx.err(
                ErrorKind::ConditionError,
                node,
                format!(
                    "Condition bundling element \"{}\" is expected to have at least 2 conditions.",
                    node.name
                ),
            ));
        }

        Ok(if is_and {
            OptCond::And(conds)
        } else {
            OptCond::Or(conds)
        })
    }

    /// Binds every dereference to the sibling fields and checks operand
    /// compatibility. Post-order for `<and>`/`<or>` trees.
    pub fn verify(
        &self,
        siblings: &[Field],
        loc: &crate::xml::Location,
        ctx: &ParseCtx<'_>,
    ) -> Result<()> {
        match self {
            OptCond::And(conds) | OptCond::Or(conds) => {
                for cond in conds {
                    cond.verify(siblings, loc, ctx)?;
                }
                Ok(())
            }
            OptCond::Expr(expr) => expr.verify(siblings, loc, ctx),
        }
    }
}

impl CondExpr {
    fn verify(&self, siblings: &[Field], loc: &crate::xml::Location, ctx: &ParseCtx<'_>) -> Result<()> {
        // A dereference that binds to nothing is an unresolved reference;
        // one that binds to an incompatible field is a condition error.
        let fail = |kind: ErrorKind, msg: String| -> Error {
            let msg = format!("{}: {}", loc, msg);
            ctx.logger.error(&msg);
            Error::new(kind, msg)
        };

        if self.left.is_empty() {
            // Existence or bit check.
            debug_assert!(self.right.starts_with(DEREF));
            return match resolve(siblings, &self.right[1..]) {
                Some(Target::Bit) | Some(Target::Exists) => Ok(()),
                Some(Target::Field(field)) if matches!(field.non_ref().kind, FieldKind::Optional(_)) => {
                    Ok(())
                }
                Some(_) => Err(fail(
                    ErrorKind::ConditionError,
                    format!(
                        "The \"{}\" string is expected to dereference existing bit in existing \
                         <set> field, or an <optional> field.",
                        self.right
                    ),
                )),
                None => Err(fail(
                    ErrorKind::UnresolvedReference,
                    format!(
                        "The \"{}\" string does not dereference any field in the containing \
                         \"bundle\" or \"message\".",
                        self.right
                    ),
                )),
            };
        }

        let left_target = resolve(siblings, &self.left[1..]).ok_or_else(|| {
            fail(
                ErrorKind::UnresolvedReference,
                format!(
                    "The \"{}\" string is expected to dereference existing field in the \
                     containing \"bundle\" or \"message\".",
                    self.left
                ),
            )
        })?;

        if let Some(right_path) = self.right.strip_prefix(DEREF) {
            let right_target = resolve(siblings, right_path).ok_or_else(|| {
                fail(
                    ErrorKind::UnresolvedReference,
                    format!(
                        "The \"{}\" string is expected to dereference existing field in the \
                         containing \"bundle\" or \"message\".",
                        self.right
                    ),
                )
            })?;

            let comparable = match (&left_target, &right_target) {
                (Target::Field(left), Target::Field(right)) => left.is_comparable_to_field(right),
                (Target::Size(_), Target::Field(right)) | (Target::Field(right), Target::Size(_)) => {
                    matches!(
                        right.non_ref().kind,
                        FieldKind::Int(_) | FieldKind::Enum(_)
                    )
                }
                (Target::Size(_), Target::Size(_)) => true,
                _ => false,
            };

            if !comparable {
                return Err(fail(
                    ErrorKind::ConditionError,
                    format!(
                        "Two dereferenced fields \"{}\" and \"{}\" cannot be compared.",
                        self.left, self.right
                    ),
                ));
            }
            return Ok(());
        }

        let comparable = match left_target {
            Target::Field(field) => field.is_comparable_to_value(&self.right, ctx),
            Target::Size(_) => crate::text::parse_uint_max(&self.right).is_some(),
            Target::Bit | Target::Exists => false,
        };

        if !comparable {
            return Err(fail(
                ErrorKind::ConditionError,
                format!(
                    "The dereferenced field \"{}\" cannot be compared to value \"{}\".",
                    self.left, self.right
                ),
            ));
        }
        Ok(())
    }
}

/// Finds the first unescaped occurrence of `op` (escape character `\`).
fn find_unescaped(expr: &str, op: &str) -> Option<usize> {
    let bytes = expr.as_bytes();
    let mut from = 0;
    while let Some(rel) = expr[from..].find(op) {
        let pos = from + rel;
        if pos == 0 || bytes[pos - 1] != ESC as u8 {
            return Some(pos);
        }
        from = pos + 1;
    }
    None
}

/// Walks a dotted dereference path into the sibling fields, descending
/// through bundle/bitfield members and classifying the terminal element.
fn resolve<'f>(fields: &'f [Field], path: &str) -> Option<Target<'f>> {
    let (first, mut rest) = match path.split_once('.') {
        Some((first, rest)) => (first, rest),
        None => (path, ""),
    };

    let mut current = fields.iter().find(|f| f.name() == first)?;

    while !rest.is_empty() {
        let (comp, remaining) = match rest.split_once('.') {
            Some((comp, remaining)) => (comp, remaining),
            None => (rest, ""),
        };

        let members = match &current.non_ref().kind {
            FieldKind::Bundle(b) => Some(&b.members),
            FieldKind::Bitfield(b) => Some(&b.members),
            _ => None,
        };

        if let Some(members) = members {
            if let Some(member) = members.iter().find(|m| m.name() == comp) {
                current = member;
                rest = remaining;
                continue;
            }
        }

        // Terminal classification of the unmatched remainder.
        if remaining.is_empty() {
            let target = current.non_ref();
            return match comp {
                "size"
                    if matches!(
                        target.kind,
                        FieldKind::List(_) | FieldKind::Str(_) | FieldKind::Data(_)
                    ) =>
                {
                    Some(Target::Size(current))
                }
                "exists" if matches!(target.kind, FieldKind::Optional(_)) => Some(Target::Exists),
                bit if current.is_bit_checkable(bit) => Some(Target::Bit),
                _ => None,
            };
        }
        return None;
    }

    Some(Target::Field(current))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(e: &str) -> CondExpr {
        // Tokenisation has no field context, build a throwaway one.
        let logger = crate::Logger::default();
        let doc = crate::xml::XmlDoc::parse("t.xml", "<cond/>", &logger).unwrap();
        let protocol = crate::Protocol::new();
        let ctx = crate::ctx::ParseCtx::new(&protocol, &logger);
        match OptCond::parse_expr(e, &doc.root, &ctx).unwrap() {
            OptCond::Expr(expr) => expr,
            _ => unreachable!(),
        }
    }

    fn expr_err(e: &str) -> Error {
        let logger = crate::Logger::default();
        let doc = crate::xml::XmlDoc::parse("t.xml", "<cond/>", &logger).unwrap();
        let protocol = crate::Protocol::new();
        let ctx = crate::ctx::ParseCtx::new(&protocol, &logger);
        OptCond::parse_expr(e, &doc.root, &ctx).unwrap_err()
    }

    #[test]
    fn comparison_operators_longest_match_first() {
        let e = expr("$F1 != 5");
        assert_eq!(("$F1", "!=", "5"), (e.left.as_str(), e.op.as_str(), e.right.as_str()));

        let e = expr("$F1 >= $F2");
        assert_eq!(">=", e.op);

        let e = expr("$Bits.Val = 1");
        assert_eq!("=", e.op);
    }

    #[test]
    fn positive_bit_check_has_no_operator() {
        let e = expr("$Flags.HasName");
        assert!(e.left.is_empty());
        assert!(e.op.is_empty());
        assert_eq!("$Flags.HasName", e.right);
    }

    #[test]
    fn negated_check() {
        let e = expr("!$Flags.HasName");
        assert_eq!("!", e.op);
        assert_eq!("$Flags.HasName", e.right);
    }

    #[test]
    fn left_side_must_dereference() {
        let err = expr_err("5 = $F1");
        assert_eq!(ErrorKind::ConditionError, err.kind());
        assert_eq!(ErrorKind::ConditionError, expr_err("plain").kind());
        assert_eq!(ErrorKind::ConditionError, expr_err("").kind());
    }

    #[test]
    fn escaped_operator_is_skipped() {
        assert_eq!(None, find_unescaped("a\\=b", "="));
        assert_eq!(Some(1), find_unescaped("a=b", "="));
    }
}
