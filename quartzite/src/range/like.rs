/// What a `LIKE` pattern says about the key range it can match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LikePattern {
    /// Pattern without wildcards.
    Literal(String),
    /// Fixed prefix followed by wildcards. `exact` when the prefix range is equivalent to the
    /// pattern, i.e. the pattern is `prefix%`.
    Prefix { prefix: String, exact: bool },
    /// Leading wildcard, or a prefix which can't be determined.
    Unusable,
}

const DEFAULT_ESCAPE: char = '\\';

pub fn analyze_like_pattern(pattern: &str, escape: Option<char>) -> LikePattern {
    let escape = escape.unwrap_or(DEFAULT_ESCAPE);
    if !escape.is_ascii() || escape == '%' || escape == '_' {
        return LikePattern::Unusable;
    }

    let mut prefix = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == escape {
            match chars.next() {
                Some(escaped) => prefix.push(escaped),
                // Dangling escape.
                None => return LikePattern::Unusable,
            }
        } else if c == '%' || c == '_' {
            if prefix.is_empty() {
                return LikePattern::Unusable;
            }
            let exact = c == '%' && chars.as_str().is_empty();
            return LikePattern::Prefix { prefix, exact };
        } else {
            prefix.push(c);
        }
    }
    LikePattern::Literal(prefix)
}

/// Smallest string greater than every string starting with `prefix`.
pub fn prefix_successor(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        let next = match last {
            '\u{D7FF}' => Some('\u{E000}'),
            c => char::from_u32(c as u32 + 1),
        };
        if let Some(next) = next {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use crate::range::{analyze_like_pattern, prefix_successor, LikePattern};

    #[test]
    fn test_like_prefix() {
        assert_eq!(
            LikePattern::Prefix {
                prefix: "abc".to_string(),
                exact: true
            },
            analyze_like_pattern("abc%", None)
        );
        assert_eq!(
            LikePattern::Prefix {
                prefix: "a%b".to_string(),
                exact: false
            },
            analyze_like_pattern("a\\%b_", None)
        );
        assert_eq!(
            LikePattern::Literal("abc".to_string()),
            analyze_like_pattern("abc", None)
        );
        assert_eq!(LikePattern::Unusable, analyze_like_pattern("%abc", None));
        assert_eq!(LikePattern::Unusable, analyze_like_pattern("abc\\", None));
        assert_eq!(LikePattern::Unusable, analyze_like_pattern("ab%", Some('é')));
        assert_eq!(
            LikePattern::Prefix {
                prefix: "a%".to_string(),
                exact: true
            },
            analyze_like_pattern("a#%%", Some('#'))
        );
    }

    #[test]
    fn test_prefix_successor() {
        assert_eq!(Some("abd".to_string()), prefix_successor("abc"));
        assert_eq!(Some("b".to_string()), prefix_successor("a\u{10FFFF}"));
        assert_eq!(None, prefix_successor("\u{10FFFF}"));
    }
}
