use std::sync::OnceLock;

use bot_core::{Condition, ConditionOp};
use regex::Regex;

fn whitespace_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\s").expect("whitespace regex must compile"))
}

fn condition_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(\w+)(==|!=|>=|<=|>|<)(\w+)").expect("condition regex must compile")
    })
}

pub fn strip_whitespace(raw: &str) -> String {
    whitespace_regex().replace_all(raw, "").into_owned()
}

/// Extracts the first `identifier op identifier` clause. Anything else means
/// "no condition"; `null` and `nil` on the right stand for the empty answer.
pub fn parse_condition(raw: &str) -> Option<Condition> {
    let compact = strip_whitespace(raw);
    let captures = condition_regex().captures(&compact)?;
    let op = ConditionOp::from_symbol(&captures[2])?;
    let right = match &captures[3] {
        "null" | "nil" => String::new(),
        value => value.to_string(),
    };
    Some(Condition {
        left: captures[1].to_string(),
        op,
        right,
    })
}

#[cfg(test)]
mod condition_tests {
    use super::*;

    #[test]
    fn parse_condition_reads_three_token_clause() {
        let condition = parse_condition(" age >= 18 ").expect("clause should parse");
        assert_eq!(condition.left, "age");
        assert_eq!(condition.op, ConditionOp::Ge);
        assert_eq!(condition.right, "18");
    }

    #[test]
    fn parse_condition_strips_inner_whitespace_and_uses_first_match() {
        let condition = parse_condition("a g e != no && x == y").expect("clause should parse");
        assert_eq!(condition.left, "age");
        assert_eq!(condition.op, ConditionOp::Ne);
        assert_eq!(condition.right, "no");
    }

    #[test]
    fn parse_condition_normalizes_null_literals() {
        assert_eq!(parse_condition("email==null").map(|c| c.right), Some(String::new()));
        assert_eq!(parse_condition("email!=nil").map(|c| c.right), Some(String::new()));
    }

    #[test]
    fn parse_condition_ignores_unsupported_text() {
        assert!(parse_condition("").is_none());
        assert!(parse_condition("age").is_none());
        assert!(parse_condition("age = 3").is_none());
        assert!(parse_condition("(age)").is_none());
    }
}
