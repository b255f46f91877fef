use std::borrow::Cow;
use std::default::Default;
use std::io::{BufWriter, Write};

use ptree::print_config::UTF_CHARS;
use ptree::{write_tree_with, PrintConfig, Style, TreeItem};

use crate::plan::{Plan, PlanNode};

impl<'a> TreeItem for &'a PlanNode {
    type Child = Self;

    fn write_self<W: Write>(&self, f: &mut W, style: &Style) -> std::io::Result<()> {
        write!(f, "{}", style.paint(&self.operator))
    }

    fn children(&self) -> Cow<[Self::Child]> {
        Cow::from(
            self.inputs
                .iter()
                .map(|c| &**c)
                .collect::<Vec<&'a PlanNode>>(),
        )
    }
}

pub fn explain<W: Write>(plan: &Plan, output: &mut W) -> std::io::Result<()> {
    let config = PrintConfig {
        indent: 3,
        characters: UTF_CHARS.into(),
        ..Default::default()
    };
    write_tree_with(&&*plan.root, output, &config)
}

pub fn explain_to_string(plan: &Plan) -> std::io::Result<String> {
    let mut buf = BufWriter::new(Vec::new());

    explain(plan, &mut buf)?;

    let bytes = buf.into_inner()?;
    String::from_utf8(bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use datafusion_common::Column;
    use datafusion_expr::{col, lit, JoinType};

    use crate::plan::explain::explain_to_string;
    use crate::plan::LogicalPlanBuilder;
    use crate::properties::Ordering;

    #[test]
    fn test_explain_logical_plan() {
        let plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .filter(col("t1.c2").gt(lit(3i64)))
            .limit(5)
            .projection(vec![col("t1.c1")])
            .top_n(vec![Ordering::desc(Column::from_qualified_name("t1.c1"))], 10)
            .build()
            .unwrap();

        let expected_result = "\
LogicalTopN { order: [t1.c1 DESC], count: 10 }
└─ LogicalProjection { expr: [t1.c1] }
   └─ LogicalLimit { count: 5 }
      └─ LogicalFilter { predicate: t1.c2 > Int64(3) }
         └─ LogicalScan { table_name: \"t1\" }
";

        let result = explain_to_string(&plan).unwrap();

        assert_eq!(expected_result, result);
    }

    #[test]
    fn test_explain_join() {
        let right = LogicalPlanBuilder::new()
            .scan_as("t2", "b", 1)
            .build()
            .unwrap();
        let plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .join(
                JoinType::Left,
                vec![(
                    Column::from_qualified_name("t1.c1"),
                    Column::from_qualified_name("b.c2"),
                )],
                right,
            )
            .build()
            .unwrap();

        let expected_result = "\
LogicalJoin { join_type: Left, on: [t1.c1 = b.c2] }
├─ LogicalScan { table_name: \"t1\" }
└─ LogicalScan { table_name: \"t2\", alias: \"b\" }
";
        let result = explain_to_string(&plan).unwrap();
        assert_eq!(expected_result, result);
    }
}
