use nom::branch::alt;
use nom::bytes::complete::take_while1;
use nom::character::complete::{char, multispace0};
use nom::combinator::{map, opt};
use nom::multi::separated_list0;
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::IResult;

use crate::hint::{HintArg, HintDirective};

/// Directives parsed from one hint comment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedHints {
    pub directives: Vec<HintDirective>,
    /// Text from the first position which couldn't be parsed, the rest of the comment is skipped.
    pub unparsed: Option<String>,
}

fn identifier(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('`'), take_while1(|c: char| c != '`'), char('`')),
        take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '$'),
    ))(input)
}

fn block_ref(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), identifier)(input)
}

fn hint_arg(input: &str) -> IResult<&str, HintArg> {
    map(pair(identifier, opt(block_ref)), |(name, block)| HintArg {
        name: name.to_string(),
        block: block.map(str::to_string),
    })(input)
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(multispace0, char(','), multispace0)(input)
}

fn directive(input: &str) -> IResult<&str, HintDirective> {
    let (input, name) = identifier(input)?;
    let (input, _) = delimited(multispace0, char('('), multispace0)(input)?;
    let (input, block) = opt(terminated(block_ref, multispace0))(input)?;
    let (input, args) = separated_list0(comma, hint_arg)(input)?;
    let (input, _) = preceded(multispace0, char(')'))(input)?;

    Ok((
        input,
        HintDirective {
            name: name.to_string(),
            block: block.map(str::to_string),
            args,
        },
    ))
}

fn strip_delimiters(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("/*+").unwrap_or(text);
    text.strip_suffix("*/").unwrap_or(text)
}

/// Parses the body of a hint comment.
///
/// Directives are separated by whitespace or commas. Parsing stops at the first malformed
/// directive, everything parsed before it is kept.
pub fn parse_hints(text: &str) -> ParsedHints {
    let mut input = strip_delimiters(text);
    let mut parsed = ParsedHints::default();

    loop {
        input = input.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if input.is_empty() {
            break;
        }

        match directive(input) {
            Ok((rest, d)) => {
                parsed.directives.push(d);
                input = rest;
            }
            Err(_) => {
                parsed.unparsed = Some(input.trim_end().to_string());
                break;
            }
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use crate::hint::{parse_hints, HintArg, HintDirective};

    #[test]
    fn test_parse_multiple_directives() {
        let parsed = parse_hints("/*+ HASH_JOIN(t1, t2) use_index(t, idx_a,idx_b) STREAM_AGG() */");

        assert_eq!(None, parsed.unparsed);
        assert_eq!(
            vec![
                HintDirective::new("HASH_JOIN", vec![HintArg::new("t1"), HintArg::new("t2")]),
                HintDirective::new(
                    "use_index",
                    vec![
                        HintArg::new("t"),
                        HintArg::new("idx_a"),
                        HintArg::new("idx_b")
                    ]
                ),
                HintDirective::new("STREAM_AGG", vec![]),
            ],
            parsed.directives
        );
    }

    #[test]
    fn test_parse_block_references() {
        let parsed = parse_hints("QB_NAME(qb1), TIDB_INLJ(@sel_2 t1, t2@qb1) HASH_AGG(@qb1)");

        assert_eq!(None, parsed.unparsed);
        assert_eq!(
            vec![
                HintDirective::new("QB_NAME", vec![HintArg::new("qb1")]),
                HintDirective::new(
                    "TIDB_INLJ",
                    vec![HintArg::new("t1"), HintArg::in_block("t2", "qb1")]
                )
                .with_block("sel_2"),
                HintDirective::new("HASH_AGG", vec![]).with_block("qb1"),
            ],
            parsed.directives
        );
    }

    #[test]
    fn test_parse_quoted_identifier() {
        let parsed = parse_hints("USE_INDEX(`order`, `idx a`)");
        assert_eq!(
            vec![HintDirective::new(
                "USE_INDEX",
                vec![HintArg::new("order"), HintArg::new("idx a")]
            )],
            parsed.directives
        );
    }

    #[test]
    fn test_syntax_error_keeps_prefix() {
        let parsed = parse_hints("/*+ HASH_AGG() HASH_JOIN(t1 t2) STREAM_AGG() */");

        assert_eq!(
            vec![HintDirective::new("HASH_AGG", vec![])],
            parsed.directives
        );
        assert_eq!(
            Some("HASH_JOIN(t1 t2) STREAM_AGG()".to_string()),
            parsed.unparsed
        );
    }
}
