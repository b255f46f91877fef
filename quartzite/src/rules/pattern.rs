use crate::operator::Operator;

pub type OperatorMatcher = fn(&Operator) -> bool;

/// How the inputs of a matched operator are matched.
pub enum PatternInputs {
    /// Inputs are not looked at, they are bound as opaque group handles.
    Any,
    /// One pattern per input, the operator must have exactly as many inputs.
    Exact(Vec<Pattern>),
    /// Every input, however many, must match the same pattern. Used for n-ary operators like
    /// union.
    Each(Box<Pattern>),
}

/// A pattern describes the shape of a sub tree a rule applies to.
///
/// `Limit(Projection(_))` is written as:
/// ```
/// use quartzite::operator::LogicalOperator::{LogicalLimit, LogicalProjection};
/// use quartzite::operator::Operator::Logical;
/// use quartzite::rules::pattern;
///
/// pattern(|op| matches!(op, Logical(LogicalLimit(_))))
///   .leaf(|op| matches!(op, Logical(LogicalProjection(_))))
/// .finish();
/// ```
pub struct Pattern {
    pub predict: OperatorMatcher,
    pub inputs: PatternInputs,
}

impl Pattern {
    pub fn leaf(matcher: OperatorMatcher) -> Self {
        Self {
            predict: matcher,
            inputs: PatternInputs::Any,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.inputs, PatternInputs::Any)
    }
}

pub fn any(_: &Operator) -> bool {
    true
}

/// Starts a pattern rooted at operators accepted by `matcher`.
pub fn pattern(matcher: OperatorMatcher) -> PatternBuilder<Root> {
    PatternBuilder::new(Root, matcher)
}

/// Receives a finished pattern from a nested builder.
pub trait PatternParent {
    type Output;

    fn close(self, pattern: Pattern) -> Self::Output;
}

/// Parent of the outermost builder, finishing it yields the pattern itself.
pub struct Root;

impl PatternParent for Root {
    type Output = Pattern;

    fn close(self, pattern: Pattern) -> Pattern {
        pattern
    }
}

pub struct PatternBuilder<P> {
    parent: P,
    matcher: OperatorMatcher,
    inputs: Vec<Pattern>,
    each: bool,
}

impl<P: PatternParent> PatternBuilder<P> {
    fn new(parent: P, matcher: OperatorMatcher) -> Self {
        Self {
            parent,
            matcher,
            inputs: vec![],
            each: false,
        }
    }

    /// Opens a nested input pattern, closed by its own [`PatternBuilder::finish`].
    pub fn pattern(self, matcher: OperatorMatcher) -> PatternBuilder<Self> {
        PatternBuilder::new(self, matcher)
    }

    pub fn leaf(mut self, matcher: OperatorMatcher) -> Self {
        self.inputs.push(Pattern::leaf(matcher));
        self
    }

    /// Every input must be a leaf accepted by `matcher`. Replaces other input patterns.
    pub fn each(mut self, matcher: OperatorMatcher) -> Self {
        self.inputs = vec![Pattern::leaf(matcher)];
        self.each = true;
        self
    }

    pub fn finish(mut self) -> P::Output {
        let inputs = match self.inputs.pop() {
            None => PatternInputs::Any,
            Some(input) if self.each => PatternInputs::Each(Box::new(input)),
            Some(input) => {
                self.inputs.push(input);
                PatternInputs::Exact(self.inputs)
            }
        };
        self.parent.close(Pattern {
            predict: self.matcher,
            inputs,
        })
    }
}

impl<P: PatternParent> PatternParent for PatternBuilder<P> {
    type Output = Self;

    fn close(mut self, pattern: Pattern) -> Self {
        self.inputs.push(pattern);
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::operator::LogicalOperator::{LogicalFilter, LogicalJoin, LogicalScan, LogicalUnion};
    use crate::operator::Operator::Logical;
    use crate::rules::{any, pattern, PatternInputs};

    #[test]
    fn test_nested_pattern_shape() {
        let p = pattern(|op| matches!(op, Logical(LogicalFilter(_))))
            .pattern(|op| matches!(op, Logical(LogicalJoin(_))))
            .leaf(any)
            .leaf(|op| matches!(op, Logical(LogicalScan(_))))
            .finish()
            .finish();

        let join = match &p.inputs {
            PatternInputs::Exact(inputs) if inputs.len() == 1 => &inputs[0],
            _ => panic!("filter should have one input pattern"),
        };
        match &join.inputs {
            PatternInputs::Exact(inputs) => {
                assert_eq!(2, inputs.len());
                assert!(inputs[1].is_leaf());
            }
            _ => panic!("join should have two input patterns"),
        }
    }

    #[test]
    fn test_each_input_pattern() {
        let p = pattern(|op| matches!(op, Logical(LogicalUnion(_))))
            .each(any)
            .finish();
        match &p.inputs {
            PatternInputs::Each(input) => assert!(input.is_leaf()),
            _ => panic!("union inputs should be matched one by one"),
        }
        assert!(pattern(any).finish().is_leaf());
    }
}
