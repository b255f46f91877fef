use arrow_schema::DataType;
use datafusion_common::{Column, ScalarValue};
use datafusion_expr::expr::{Between, InList, Like};
use datafusion_expr::{Expr, Operator};
use itertools::Itertools;
use log::debug;

use crate::config::OptimizerConfig;
use crate::expr::{as_column_comparison, is_comparison, split_conjunction, split_disjunction};
use crate::range::{
    analyze_like_pattern, coerce_literal, intersect_intervals, normalize_ranges,
    prefix_successor, union_intervals, union_ranges, Coerced, Datum, Interval, KeyDomain,
    KeyTuple, LikePattern, Range,
};

/// One key column the builder derives ranges for.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeColumn {
    pub column: Column,
    pub data_type: DataType,
    pub nullable: bool,
    /// Index stores only this many leading characters.
    pub prefix_len: Option<usize>,
}

/// Output of range derivation.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeResult {
    /// Normalized ranges. Empty means no row can match.
    pub ranges: Vec<Range>,
    /// Conditions fully enforced by `ranges`.
    pub access_conditions: Vec<Expr>,
    /// Conditions which must still be evaluated on every row read.
    pub residual_conditions: Vec<Expr>,
    /// Number of leading key columns constrained to points.
    pub eq_prefix_len: usize,
    /// Number of key columns constrained by `ranges`.
    pub used_columns: usize,
}

impl RangeResult {
    fn full(residual_conditions: Vec<Expr>) -> Self {
        Self {
            ranges: vec![Range::full()],
            access_conditions: vec![],
            residual_conditions,
            eq_prefix_len: 0,
            used_columns: 0,
        }
    }

    /// Provably no row.
    pub fn is_empty_result(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ranges.len() == 1 && self.ranges[0].is_full()
    }
}

/// Intervals one term allows for one column.
struct TermRange {
    intervals: Vec<Interval>,
    /// Whether the intervals are equivalent to the term.
    exact: bool,
}

/// Builds [`Range`]s of a key column prefix from predicates.
///
/// Never fails: a predicate it can't represent widens the range and stays in the residual.
pub struct RangeBuilder {
    max_in_list_product: usize,
    max_ranges: usize,
}

impl RangeBuilder {
    pub fn new(config: &OptimizerConfig) -> Self {
        Self {
            max_in_list_product: config.max_in_list_product,
            max_ranges: config.max_ranges,
        }
    }

    pub fn build(&self, conditions: &[Expr], columns: &[RangeColumn]) -> RangeResult {
        let terms: Vec<&Expr> = conditions.iter().flat_map(split_conjunction).collect();
        if columns.is_empty() {
            return RangeResult::full(terms.into_iter().cloned().collect());
        }

        let result = self.build_conjunction(&terms, columns);
        if result.used_columns > 0 || result.is_empty_result() {
            return result;
        }
        self.build_disjunction(&terms, columns).unwrap_or(result)
    }

    fn build_conjunction(&self, terms: &[&Expr], columns: &[RangeColumn]) -> RangeResult {
        if terms.iter().any(|t| is_always_false(t)) {
            return RangeResult {
                ranges: vec![],
                access_conditions: terms.iter().map(|t| (*t).clone()).collect(),
                residual_conditions: vec![],
                eq_prefix_len: 0,
                used_columns: 0,
            };
        }

        let mut consumed = vec![false; terms.len()];
        let mut exact = vec![false; terms.len()];
        let mut points: Vec<Vec<Datum>> = vec![];
        let mut last: Option<Vec<Interval>> = None;
        let mut product = 1usize;
        let mut provably_empty = false;

        for column in columns {
            let mut intervals = vec![Interval::full()];
            let mut used = vec![];
            for (idx, term) in terms.iter().enumerate() {
                if consumed[idx] {
                    continue;
                }
                if let Some(term_range) = self.term_range(term, column) {
                    intervals = intersect_intervals(&intervals, &term_range.intervals);
                    used.push((idx, term_range.exact));
                }
            }

            if used.is_empty() {
                break;
            }

            if intervals.is_empty() {
                for (idx, is_exact) in used {
                    consumed[idx] = true;
                    exact[idx] = is_exact;
                }
                provably_empty = true;
                break;
            }

            if intervals.iter().all(Interval::is_point) {
                let next_product = product.saturating_mul(intervals.len());
                if next_product > self.max_in_list_product {
                    debug!(
                        "Point ranges on {} exceed limit {}, fall back to full range",
                        column.column, self.max_in_list_product
                    );
                    break;
                }
                product = next_product;
                for (idx, is_exact) in used {
                    consumed[idx] = true;
                    exact[idx] = is_exact;
                }
                points.push(intervals.into_iter().map(|i| i.low).collect());
            } else {
                for (idx, is_exact) in used {
                    consumed[idx] = true;
                    exact[idx] = is_exact;
                }
                last = Some(intervals);
                break;
            }
        }

        let mut access_conditions = vec![];
        let mut residual_conditions = vec![];
        for (idx, term) in terms.iter().enumerate() {
            if consumed[idx] && exact[idx] {
                access_conditions.push((*term).clone());
            } else {
                residual_conditions.push((*term).clone());
            }
        }

        if provably_empty {
            return RangeResult {
                ranges: vec![],
                access_conditions,
                residual_conditions,
                eq_prefix_len: points.len(),
                used_columns: points.len() + 1,
            };
        }

        let eq_prefix_len = points.len();
        let used_columns = eq_prefix_len + usize::from(last.is_some());
        if used_columns == 0 {
            return RangeResult::full(terms.iter().map(|t| (*t).clone()).collect());
        }

        let prefixes: Vec<KeyTuple> = if points.is_empty() {
            vec![KeyTuple::new()]
        } else {
            points
                .into_iter()
                .multi_cartesian_product()
                .map(KeyTuple::from_vec)
                .collect()
        };

        let ranges: Vec<Range> = match last {
            None => prefixes
                .into_iter()
                .map(|p| Range {
                    low: p.clone(),
                    low_inclusive: true,
                    high: p,
                    high_inclusive: true,
                })
                .collect(),
            Some(intervals) => prefixes
                .iter()
                .cartesian_product(intervals.iter())
                .map(|(p, i)| {
                    let mut low = p.clone();
                    low.push(i.low.clone());
                    let mut high = p.clone();
                    high.push(i.high.clone());
                    Range {
                        low,
                        low_inclusive: i.low_inclusive,
                        high,
                        high_inclusive: i.high_inclusive,
                    }
                })
                .collect(),
        };

        if ranges.len() > self.max_ranges {
            debug!(
                "{} ranges exceed limit {}, fall back to full range",
                ranges.len(),
                self.max_ranges
            );
            return RangeResult::full(terms.iter().map(|t| (*t).clone()).collect());
        }

        RangeResult {
            ranges: normalize_ranges(ranges),
            access_conditions,
            residual_conditions,
            eq_prefix_len,
            used_columns,
        }
    }

    /// Builds ranges for `(a AND X) OR (b AND Y)` shaped conditions by building each disjunct
    /// independently and unioning the results.
    fn build_disjunction(&self, terms: &[&Expr], columns: &[RangeColumn]) -> Option<RangeResult> {
        let (or_idx, disjuncts) = terms
            .iter()
            .enumerate()
            .map(|(idx, t)| (idx, split_disjunction(t)))
            .find(|(_, disjuncts)| disjuncts.len() > 1)?;

        let others: Vec<&Expr> = terms
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != or_idx)
            .map(|(_, t)| *t)
            .collect();

        let mut ranges = vec![];
        let mut eq_prefix_len = usize::MAX;
        let mut used_columns = 0;
        for disjunct in disjuncts {
            let disjunct_terms: Vec<&Expr> = split_conjunction(disjunct)
                .into_iter()
                .chain(others.iter().copied())
                .collect();
            let result = self.build_conjunction(&disjunct_terms, columns);
            if result.is_empty_result() {
                continue;
            }
            if result.used_columns == 0 {
                return None;
            }
            eq_prefix_len = eq_prefix_len.min(result.eq_prefix_len);
            used_columns = used_columns.max(result.used_columns);
            ranges = union_ranges(ranges, result.ranges);
            if ranges.len() > self.max_ranges {
                debug!("Disjunction ranges exceed limit {}", self.max_ranges);
                return None;
            }
        }

        Some(RangeResult {
            ranges,
            access_conditions: vec![],
            residual_conditions: terms.iter().map(|t| (*t).clone()).collect(),
            eq_prefix_len: if eq_prefix_len == usize::MAX {
                0
            } else {
                eq_prefix_len
            },
            used_columns,
        })
    }

    fn term_range(&self, term: &Expr, column: &RangeColumn) -> Option<TermRange> {
        let term_range = self.raw_term_range(term, column)?;
        Some(match column.prefix_len {
            Some(len) => truncate_to_prefix(term_range, len),
            None => term_range,
        })
    }

    fn raw_term_range(&self, term: &Expr, column: &RangeColumn) -> Option<TermRange> {
        if let Some((c, op, value)) = as_column_comparison(term) {
            if c != &column.column || !is_comparison(op) {
                return None;
            }
            return comparison_range(op, coerce_literal(value, &column.data_type));
        }

        match term {
            Expr::IsNull(e) if is_column(e, column) => Some(TermRange {
                intervals: if column.nullable {
                    vec![Interval::point(Datum::Null)]
                } else {
                    vec![]
                },
                exact: true,
            }),
            Expr::IsNotNull(e) if is_column(e, column) => Some(TermRange {
                intervals: vec![Interval::not_null()],
                exact: true,
            }),
            Expr::InList(InList {
                expr,
                list,
                negated,
            }) if is_column(expr, column) => in_list_range(list, *negated, column),
            Expr::Between(Between {
                expr,
                negated,
                low,
                high,
            }) if is_column(expr, column) => {
                let (Expr::Literal(low), Expr::Literal(high)) = (&**low, &**high) else {
                    return None;
                };
                let low = coerce_literal(low, &column.data_type);
                let high = coerce_literal(high, &column.data_type);
                if *negated {
                    let below = comparison_range(Operator::Lt, low)?;
                    let above = comparison_range(Operator::Gt, high)?;
                    Some(TermRange {
                        intervals: union_intervals(
                            below.intervals.into_iter().chain(above.intervals).collect(),
                        ),
                        exact: below.exact && above.exact,
                    })
                } else {
                    let from = comparison_range(Operator::GtEq, low)?;
                    let to = comparison_range(Operator::LtEq, high)?;
                    Some(TermRange {
                        intervals: intersect_intervals(&from.intervals, &to.intervals),
                        exact: from.exact && to.exact,
                    })
                }
            }
            Expr::Like(Like {
                negated: false,
                expr,
                pattern,
                escape_char,
                ..
            }) if is_column(expr, column) => like_range(pattern, *escape_char, column),
            Expr::BinaryExpr(_) => {
                let disjuncts = split_disjunction(term);
                if disjuncts.len() < 2 {
                    return None;
                }
                let mut intervals = vec![];
                let mut exact = true;
                for d in disjuncts {
                    let r = self.raw_term_range(d, column)?;
                    intervals.extend(r.intervals);
                    exact &= r.exact;
                }
                Some(TermRange {
                    intervals: union_intervals(intervals),
                    exact,
                })
            }
            _ => None,
        }
    }
}

fn is_column(expr: &Expr, column: &RangeColumn) -> bool {
    matches!(expr, Expr::Column(c) if c == &column.column)
}

fn is_always_false(term: &Expr) -> bool {
    matches!(term, Expr::Literal(ScalarValue::Boolean(Some(false))))
        || matches!(term, Expr::Literal(v) if v.is_null())
}

fn value(v: ScalarValue) -> Datum {
    Datum::Value(v)
}

fn comparison_range(op: Operator, coerced: Coerced) -> Option<TermRange> {
    let not_null = Interval::not_null();
    let intervals = match coerced {
        Coerced::Exact(v) => match op {
            Operator::Eq => vec![Interval::point(value(v))],
            Operator::Lt => vec![Interval::new(Datum::Null, false, value(v), false)],
            Operator::LtEq => vec![Interval::new(Datum::Null, false, value(v), true)],
            Operator::Gt => vec![Interval::new(value(v), false, Datum::MaxValue, true)],
            Operator::GtEq => vec![Interval::new(value(v), true, Datum::MaxValue, true)],
            Operator::NotEq => vec![
                Interval::new(Datum::Null, false, value(v.clone()), false),
                Interval::new(value(v), false, Datum::MaxValue, true),
            ],
            _ => return None,
        },
        Coerced::Fractional { floor } => match op {
            Operator::Eq => vec![],
            Operator::Lt | Operator::LtEq => {
                vec![Interval::new(Datum::Null, false, value(floor), true)]
            }
            Operator::Gt | Operator::GtEq => {
                vec![Interval::new(value(floor), false, Datum::MaxValue, true)]
            }
            Operator::NotEq => vec![not_null],
            _ => return None,
        },
        Coerced::BelowDomain => match op {
            Operator::Eq | Operator::Lt | Operator::LtEq => vec![],
            Operator::Gt | Operator::GtEq | Operator::NotEq => vec![not_null],
            _ => return None,
        },
        Coerced::AboveDomain => match op {
            Operator::Eq | Operator::Gt | Operator::GtEq => vec![],
            Operator::Lt | Operator::LtEq | Operator::NotEq => vec![not_null],
            _ => return None,
        },
        // Comparing with NULL is never true.
        Coerced::Null => vec![],
        Coerced::EqualityOnly(v) if op == Operator::Eq => {
            return Some(TermRange {
                intervals: vec![Interval::point(value(v))],
                exact: false,
            })
        }
        Coerced::EqualityOnly(_) | Coerced::Incompatible => return None,
    };
    Some(TermRange {
        intervals,
        exact: true,
    })
}

fn in_list_range(list: &[Expr], negated: bool, column: &RangeColumn) -> Option<TermRange> {
    let mut intervals = if negated {
        vec![Interval::not_null()]
    } else {
        vec![]
    };
    let mut exact = true;
    for item in list {
        let Expr::Literal(v) = item else {
            return None;
        };
        let coerced = coerce_literal(v, &column.data_type);
        if negated {
            let r = comparison_range(Operator::NotEq, coerced)?;
            exact &= r.exact;
            intervals = intersect_intervals(&intervals, &r.intervals);
        } else {
            let r = comparison_range(Operator::Eq, coerced)?;
            exact &= r.exact;
            intervals.extend(r.intervals);
        }
    }
    Some(TermRange {
        intervals: union_intervals(intervals),
        exact,
    })
}

fn like_range(pattern: &Expr, escape: Option<char>, column: &RangeColumn) -> Option<TermRange> {
    if KeyDomain::of(&column.data_type) != Some(KeyDomain::String) {
        return None;
    }
    let Expr::Literal(ScalarValue::Utf8(Some(pattern))) = pattern else {
        return None;
    };
    match analyze_like_pattern(pattern, escape) {
        LikePattern::Literal(s) => Some(TermRange {
            intervals: vec![Interval::point(value(ScalarValue::Utf8(Some(s))))],
            exact: false,
        }),
        LikePattern::Prefix { prefix, exact } => {
            let high = match prefix_successor(&prefix) {
                Some(next) => (value(ScalarValue::Utf8(Some(next))), false),
                None => (Datum::MaxValue, true),
            };
            Some(TermRange {
                intervals: vec![Interval::new(
                    value(ScalarValue::Utf8(Some(prefix))),
                    true,
                    high.0,
                    high.1,
                )],
                exact,
            })
        }
        LikePattern::Unusable => None,
    }
}

fn truncate_datum(d: Datum, len: usize) -> Datum {
    match d {
        Datum::Value(ScalarValue::Utf8(Some(s))) if s.chars().count() > len => {
            Datum::Value(ScalarValue::Utf8(Some(s.chars().take(len).collect())))
        }
        other => other,
    }
}

/// A prefix index stores truncated keys, so bounds are truncated and made inclusive.
fn truncate_to_prefix(term_range: TermRange, len: usize) -> TermRange {
    let intervals = term_range
        .intervals
        .into_iter()
        .map(|i| {
            let low = truncate_datum(i.low, len);
            let high = truncate_datum(i.high, len);
            // NULL stays excluded, it is not a truncated value.
            let low_inclusive = i.low_inclusive || low != Datum::Null;
            Interval::new(low, low_inclusive, high, true)
        })
        .collect();
    TermRange {
        intervals: union_intervals(intervals),
        exact: false,
    }
}

#[cfg(test)]
mod tests {
    use arrow_schema::DataType;
    use datafusion_common::{Column, ScalarValue};
    use datafusion_expr::{col, lit, Expr};

    use crate::config::OptimizerConfig;
    use crate::range::{int, Datum, RangeBuilder, RangeColumn};

    fn int_column(name: &str, nullable: bool) -> RangeColumn {
        RangeColumn {
            column: Column::from_qualified_name(format!("t.{}", name)),
            data_type: DataType::Int64,
            nullable,
            prefix_len: None,
        }
    }

    fn string_column(name: &str, prefix_len: Option<usize>) -> RangeColumn {
        RangeColumn {
            column: Column::from_qualified_name(format!("t.{}", name)),
            data_type: DataType::Utf8,
            nullable: true,
            prefix_len,
        }
    }

    fn builder() -> RangeBuilder {
        RangeBuilder::new(&OptimizerConfig::default())
    }

    fn show(ranges: &[crate::range::Range]) -> Vec<String> {
        ranges.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn test_equality_then_inequality() {
        let columns = vec![int_column("a", true), int_column("b", true), int_column("c", true)];
        let result = builder().build(
            &[
                col("t.a").eq(lit(1i64)),
                col("t.b").gt(lit(5i64)),
                col("t.c").eq(lit(3i64)),
            ],
            &columns,
        );

        assert_eq!(vec!["(1 5,1 +inf]"], show(&result.ranges));
        assert_eq!(1, result.eq_prefix_len);
        assert_eq!(2, result.used_columns);
        assert_eq!(vec![col("t.c").eq(lit(3i64))], result.residual_conditions);
        assert_eq!(2, result.access_conditions.len());
    }

    #[test]
    fn test_in_list_cartesian() {
        let columns = vec![int_column("a", false), int_column("b", false)];
        let result = builder().build(
            &[
                col("t.a").in_list(vec![lit(2i64), lit(1i64), lit(2i64)], false),
                col("t.b").in_list(vec![lit(7i64), lit(8i64)], false),
            ],
            &columns,
        );
        assert_eq!(
            vec!["[1 7,1 7]", "[1 8,1 8]", "[2 7,2 7]", "[2 8,2 8]"],
            show(&result.ranges)
        );
        assert!(result.residual_conditions.is_empty());
    }

    #[test]
    fn test_in_list_product_limit() {
        let config = OptimizerConfig {
            max_in_list_product: 3,
            ..Default::default()
        };
        let columns = vec![int_column("a", false), int_column("b", false)];
        let result = RangeBuilder::new(&config).build(
            &[
                col("t.a").in_list(vec![lit(1i64), lit(2i64)], false),
                col("t.b").in_list(vec![lit(7i64), lit(8i64)], false),
            ],
            &columns,
        );
        assert_eq!(vec!["[1,1]", "[2,2]"], show(&result.ranges));
        assert_eq!(1, result.residual_conditions.len());
    }

    #[test]
    fn test_not_between_splits() {
        let columns = vec![int_column("a", true)];
        let result = builder().build(
            &[Expr::Between(datafusion_expr::expr::Between::new(
                Box::new(col("t.a")),
                true,
                Box::new(lit(3i64)),
                Box::new(lit(5i64)),
            ))],
            &columns,
        );
        assert_eq!(vec!["(NULL,3)", "(5,+inf]"], show(&result.ranges));
    }

    #[test]
    fn test_is_null_on_not_null_column_is_empty() {
        let columns = vec![int_column("a", false)];
        let result = builder().build(&[col("t.a").is_null()], &columns);
        assert!(result.is_empty_result());

        let columns = vec![int_column("a", true)];
        let result = builder().build(&[col("t.a").is_null()], &columns);
        assert_eq!(vec!["[NULL,NULL]"], show(&result.ranges));
    }

    #[test]
    fn test_like_prefix_range() {
        let columns = vec![string_column("s", None)];
        let result = builder().build(&[col("t.s").like(lit("ab%"))], &columns);
        assert_eq!(vec!["[\"ab\",\"ac\")"], show(&result.ranges));
        assert!(result.residual_conditions.is_empty());

        let result = builder().build(&[col("t.s").like(lit("ab%c"))], &columns);
        assert_eq!(vec!["[\"ab\",\"ac\")"], show(&result.ranges));
        assert_eq!(1, result.residual_conditions.len());

        let result = builder().build(&[col("t.s").like(lit("%ab"))], &columns);
        assert!(result.is_full());
        assert_eq!(1, result.residual_conditions.len());
    }

    #[test]
    fn test_string_column_numeric_literal() {
        let columns = vec![string_column("s", None)];
        let result = builder().build(&[col("t.s").eq(lit(10))], &columns);
        assert_eq!(vec!["[\"10\",\"10\"]"], show(&result.ranges));
        assert_eq!(1, result.residual_conditions.len());

        // Numeric order differs from string order.
        let result = builder().build(&[col("t.s").gt(lit(10))], &columns);
        assert!(result.is_full());
    }

    #[test]
    fn test_fractional_literal_on_int_column() {
        let columns = vec![int_column("a", false)];
        let result = builder().build(&[col("t.a").gt(lit(1.5f64))], &columns);
        assert_eq!(vec!["(1,+inf]"], show(&result.ranges));

        let result = builder().build(&[col("t.a").eq(lit(1.5f64))], &columns);
        assert!(result.is_empty_result());
    }

    #[test]
    fn test_prefix_index_column() {
        let columns = vec![string_column("s", Some(2))];
        let result = builder().build(&[col("t.s").gt(lit("abc"))], &columns);
        assert_eq!(vec!["[\"ab\",+inf]"], show(&result.ranges));
        assert_eq!(1, result.residual_conditions.len());
    }

    #[test]
    fn test_dnf_union() {
        let columns = vec![int_column("a", false), int_column("b", false)];
        let result = builder().build(
            &[col("t.a")
                .eq(lit(1i64))
                .and(col("t.b").lt(lit(3i64)))
                .or(col("t.a").gt(lit(10i64)))],
            &columns,
        );
        assert_eq!(vec!["(1 NULL,1 3)", "(10 +inf,+inf +inf]"], show(&result.ranges));
        assert_eq!(1, result.residual_conditions.len());
    }

    #[test]
    fn test_dnf_with_unconstrained_disjunct_is_full() {
        let columns = vec![int_column("a", false), int_column("b", false)];
        let result = builder().build(
            &[col("t.a").eq(lit(1i64)).or(col("t.b").gt(lit(10i64)))],
            &columns,
        );
        assert!(result.is_full());
    }

    #[test]
    fn test_same_column_or() {
        let columns = vec![int_column("a", false)];
        let result = builder().build(
            &[col("t.a").eq(lit(1i64)).or(col("t.a").eq(lit(3i64)))],
            &columns,
        );
        assert_eq!(vec!["[1,1]", "[3,3]"], show(&result.ranges));
        assert!(result.residual_conditions.is_empty());
    }

    #[test]
    fn test_contradiction() {
        let columns = vec![int_column("a", false)];
        let result = builder().build(
            &[col("t.a").gt(lit(5i64)), col("t.a").lt(lit(3i64))],
            &columns,
        );
        assert!(result.is_empty_result());

        let result = builder().build(&[col("t.a").eq(lit(ScalarValue::Int64(None)))], &columns);
        assert!(result.is_empty_result());
    }

    /// Minimal evaluator for the predicate shapes used by the coverage test.
    fn eval(expr: &Expr, a: Option<i64>, b: Option<i64>) -> Option<bool> {
        use datafusion_expr::expr::BinaryExpr;
        use datafusion_expr::Operator;

        let value_of = |e: &Expr| -> Option<i64> {
            match e {
                Expr::Column(c) if c.name == "a" => a,
                Expr::Column(c) if c.name == "b" => b,
                Expr::Literal(ScalarValue::Int64(v)) => *v,
                _ => panic!("unexpected {:?}", e),
            }
        };
        match expr {
            Expr::BinaryExpr(BinaryExpr { left, op, right }) => match op {
                Operator::And => match (eval(left, a, b), eval(right, a, b)) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                },
                Operator::Or => match (eval(left, a, b), eval(right, a, b)) {
                    (Some(true), _) | (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                },
                _ => {
                    let (l, r) = (value_of(left)?, value_of(right)?);
                    Some(match op {
                        Operator::Eq => l == r,
                        Operator::NotEq => l != r,
                        Operator::Lt => l < r,
                        Operator::LtEq => l <= r,
                        Operator::Gt => l > r,
                        Operator::GtEq => l >= r,
                        _ => panic!("unexpected {:?}", op),
                    })
                }
            },
            Expr::IsNull(e) => Some(value_of(e).is_none()),
            Expr::IsNotNull(e) => Some(value_of(e).is_some()),
            Expr::InList(datafusion_expr::expr::InList { expr, list, negated }) => {
                let v = value_of(expr)?;
                let found = list.iter().any(|i| value_of(i) == Some(v));
                Some(found != *negated)
            }
            _ => panic!("unexpected {:?}", expr),
        }
    }

    fn key(v: Option<i64>) -> Datum {
        v.map(int).unwrap_or(Datum::Null)
    }

    #[test]
    fn test_ranges_cover_every_matching_row() {
        let columns = vec![int_column("a", true), int_column("b", true)];
        let predicates: Vec<Vec<Expr>> = vec![
            vec![col("t.a").eq(lit(1i64)), col("t.b").gt_eq(lit(0i64))],
            vec![col("t.a").lt(lit(0i64)).or(col("t.a").gt(lit(1i64)))],
            vec![col("t.a").not_eq(lit(0i64)), col("t.b").is_null()],
            vec![col("t.a").in_list(vec![lit(-1i64), lit(2i64)], false), col("t.b").lt(lit(1i64))],
            vec![col("t.a").in_list(vec![lit(0i64)], true)],
            vec![col("t.a")
                .eq(lit(0i64))
                .and(col("t.b").eq(lit(1i64)))
                .or(col("t.a").eq(lit(2i64)).and(col("t.b").lt_eq(lit(-1i64))))],
            vec![col("t.a").is_not_null(), col("t.b").eq(lit(2i64))],
        ];
        let domain: Vec<Option<i64>> = vec![None, Some(-2), Some(-1), Some(0), Some(1), Some(2), Some(3)];

        for conditions in predicates {
            let result = builder().build(&conditions, &columns);
            for a in &domain {
                for b in &domain {
                    let matches = conditions.iter().all(|c| eval(c, *a, *b) == Some(true));
                    if !matches {
                        continue;
                    }
                    let row_key = [key(*a), key(*b)];
                    assert!(
                        result.ranges.iter().any(|r| {
                            let mut r = r.clone();
                            r.pad_to(2);
                            r.contains(&row_key)
                        }),
                        "row ({:?}, {:?}) matches {:?} but is excluded by {:?}",
                        a,
                        b,
                        conditions,
                        result.ranges
                    );
                }
            }
        }
    }
}
