//! Predicate helpers shared by rules and physical planning.

use std::collections::HashSet;

use datafusion_common::{Column, ScalarValue};
use datafusion_expr::expr::{Between, BinaryExpr, Cast, InList, Like, TryCast};
use datafusion_expr::{Expr, Operator};

use crate::error::DFResult;

pub fn split_conjunction(expr: &Expr) -> Vec<&Expr> {
    split_binary(expr, Operator::And)
}

pub fn split_disjunction(expr: &Expr) -> Vec<&Expr> {
    split_binary(expr, Operator::Or)
}

fn split_binary(expr: &Expr, operator: Operator) -> Vec<&Expr> {
    let mut result = vec![];
    let mut stack = vec![expr];
    while let Some(e) = stack.pop() {
        match e {
            Expr::BinaryExpr(BinaryExpr { left, op, right }) if *op == operator => {
                stack.push(right);
                stack.push(left);
            }
            other => result.push(other),
        }
    }
    result
}

/// Joins predicates with `AND`. Returns `None` for empty input.
pub fn conjunction<I: IntoIterator<Item = Expr>>(exprs: I) -> Option<Expr> {
    exprs.into_iter().reduce(Expr::and)
}

pub fn disjunction<I: IntoIterator<Item = Expr>>(exprs: I) -> Option<Expr> {
    exprs.into_iter().reduce(Expr::or)
}

pub fn expr_columns(expr: &Expr) -> DFResult<HashSet<Column>> {
    expr.to_columns()
}

/// Columns referenced by all expressions.
pub fn exprs_columns<'a, I: IntoIterator<Item = &'a Expr>>(
    exprs: I,
) -> DFResult<HashSet<Column>> {
    let mut columns = HashSet::new();
    for e in exprs {
        columns.extend(e.to_columns()?);
    }
    Ok(columns)
}

/// `column <op> literal`, with operands swapped when the literal is on the left.
pub fn as_column_comparison(expr: &Expr) -> Option<(&Column, Operator, &ScalarValue)> {
    match expr {
        Expr::BinaryExpr(BinaryExpr { left, op, right }) => match (&**left, &**right) {
            (Expr::Column(c), Expr::Literal(v)) => Some((c, *op, v)),
            (Expr::Literal(v), Expr::Column(c)) => op.swap().map(|op| (c, op, v)),
            _ => None,
        },
        _ => None,
    }
}

pub fn is_comparison(op: Operator) -> bool {
    matches!(
        op,
        Operator::Eq
            | Operator::NotEq
            | Operator::Lt
            | Operator::LtEq
            | Operator::Gt
            | Operator::GtEq
    )
}

/// Abstract value of an expression when every column of one join side is NULL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NullState {
    Null,
    False,
    /// Either NULL or false.
    Rejecting,
    Unknown,
}

impl NullState {
    fn rejects(self) -> bool {
        !matches!(self, NullState::Unknown)
    }

    fn strict(self) -> NullState {
        match self {
            NullState::Null => NullState::Null,
            _ => NullState::Unknown,
        }
    }
}

fn null_state(expr: &Expr, null_columns: &HashSet<Column>) -> NullState {
    match expr {
        Expr::Column(c) if null_columns.contains(c) => NullState::Null,
        Expr::Literal(v) if v.is_null() => NullState::Null,
        Expr::Literal(ScalarValue::Boolean(Some(false))) => NullState::False,
        // A cast of NULL is still NULL.
        Expr::Cast(Cast { expr, .. }) | Expr::TryCast(TryCast { expr, .. }) => {
            null_state(expr, null_columns).strict()
        }
        Expr::Not(e) => match e.as_ref() {
            Expr::IsNull(inner) if null_state(inner, null_columns) == NullState::Null => {
                NullState::False
            }
            _ => null_state(e, null_columns).strict(),
        },
        Expr::Negative(e) => null_state(e, null_columns).strict(),
        Expr::IsNotNull(e) => match null_state(e, null_columns) {
            NullState::Null => NullState::False,
            _ => NullState::Unknown,
        },
        Expr::IsTrue(e) => {
            if null_state(e, null_columns).rejects() {
                NullState::False
            } else {
                NullState::Unknown
            }
        }
        Expr::BinaryExpr(BinaryExpr { left, op, right }) => {
            let l = null_state(left, null_columns);
            let r = null_state(right, null_columns);
            match op {
                Operator::And => {
                    if l.rejects() || r.rejects() {
                        NullState::Rejecting
                    } else {
                        NullState::Unknown
                    }
                }
                Operator::Or => {
                    if l.rejects() && r.rejects() {
                        NullState::Rejecting
                    } else {
                        NullState::Unknown
                    }
                }
                Operator::IsDistinctFrom | Operator::IsNotDistinctFrom => NullState::Unknown,
                _ => {
                    if l == NullState::Null || r == NullState::Null {
                        NullState::Null
                    } else {
                        NullState::Unknown
                    }
                }
            }
        }
        Expr::Like(Like { expr, pattern, .. }) => {
            if null_state(expr, null_columns) == NullState::Null
                || null_state(pattern, null_columns) == NullState::Null
            {
                NullState::Null
            } else {
                NullState::Unknown
            }
        }
        Expr::Between(Between { expr, .. }) | Expr::InList(InList { expr, .. }) => {
            null_state(expr, null_columns).strict()
        }
        _ => NullState::Unknown,
    }
}

/// Whether `predicate` evaluates to false or NULL whenever all `null_columns` are NULL.
///
/// Casts are looked through: casting NULL yields NULL.
pub fn is_null_rejecting(predicate: &Expr, null_columns: &HashSet<Column>) -> bool {
    null_state(predicate, null_columns).rejects()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use arrow_schema::DataType;
    use datafusion_common::Column;
    use datafusion_expr::{cast, col, lit, Expr};

    use crate::expr::{
        as_column_comparison, conjunction, is_null_rejecting, split_conjunction,
    };

    fn t2_columns() -> HashSet<Column> {
        vec![
            Column::from_qualified_name("t2.a"),
            Column::from_qualified_name("t2.b"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_split_conjunction() {
        let expr = col("a").eq(lit(1)).and(col("b").gt(lit(2)).and(col("c").is_null()));
        let parts = split_conjunction(&expr);
        assert_eq!(3, parts.len());
        assert_eq!(&col("a").eq(lit(1)), parts[0]);
        assert_eq!(&col("c").is_null(), parts[2]);

        let rebuilt = conjunction(parts.into_iter().cloned()).unwrap();
        assert_eq!(3, split_conjunction(&rebuilt).len());
    }

    #[test]
    fn test_swapped_comparison() {
        let expr = lit(5).lt(col("a"));
        let (column, op, value) = as_column_comparison(&expr).unwrap();
        assert_eq!("a", column.name);
        assert_eq!(datafusion_expr::Operator::Gt, op);
        assert_eq!(&datafusion_common::ScalarValue::Int32(Some(5)), value);
    }

    #[test]
    fn test_null_rejecting() {
        let side = t2_columns();

        assert!(is_null_rejecting(&col("t2.a").gt(lit(1)), &side));
        assert!(is_null_rejecting(&col("t2.a").is_not_null(), &side));
        assert!(!is_null_rejecting(&col("t2.a").is_null(), &side));
        assert!(!is_null_rejecting(&col("t1.a").gt(lit(1)), &side));
        assert!(is_null_rejecting(
            &col("t1.a").gt(lit(1)).and(col("t2.b").eq(lit(3))),
            &side
        ));
        assert!(!is_null_rejecting(
            &col("t1.a").gt(lit(1)).or(col("t2.b").eq(lit(3))),
            &side
        ));
        assert!(is_null_rejecting(
            &col("t2.a").lt(lit(1)).or(col("t2.b").eq(lit(3))),
            &side
        ));
        assert!(is_null_rejecting(
            &(col("t2.a") + lit(1)).eq(col("t1.a")),
            &side
        ));
    }

    #[test]
    fn test_null_rejecting_through_cast() {
        let side = t2_columns();
        let predicate = cast(col("t2.a"), DataType::Int64).eq(lit(10i64));
        assert!(is_null_rejecting(&predicate, &side));

        let not_null = Expr::Not(Box::new(col("t2.b").is_null()));
        assert!(is_null_rejecting(&not_null, &side));
    }
}
