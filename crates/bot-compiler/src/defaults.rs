pub(crate) const DEFAULT_FLOW_TITLE: &str = "Please choose an action";
pub(crate) const DEFAULT_LINK_RATIO: &str = "tall";
pub(crate) const DEFAULT_FORM_TITLE: &str = "please follow the next steps";
pub(crate) const DEFAULT_FORM_SUBMIT: &str = "Thank you";
pub(crate) const DEFAULT_FORM_METHOD: &str = "post";
pub(crate) const DEFAULT_INPUT_TITLE: &str = "please write the required data";

pub(crate) const FLOW_ID_PREFIX: &str = "nav";
pub(crate) const LINK_ID_PREFIX: &str = "link";
// Forms share the input prefix; ids only need to be unique per index.
pub(crate) const FORM_ID_PREFIX: &str = "input";
pub(crate) const INPUT_ID_PREFIX: &str = "input";

/// `<prefix><1-based position>`
pub(crate) fn positional_id(prefix: &str, index: usize) -> String {
    format!("{}{}", prefix, index + 1)
}

pub(crate) fn or_default(raw: &str, fallback: &str) -> String {
    if raw.is_empty() {
        fallback.to_string()
    } else {
        raw.to_string()
    }
}

pub(crate) fn or_positional(raw: &str, prefix: &str, index: usize) -> String {
    if raw.is_empty() {
        positional_id(prefix, index)
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod defaults_tests {
    use super::*;

    #[test]
    fn positional_ids_are_one_based() {
        assert_eq!(positional_id(INPUT_ID_PREFIX, 0), "input1");
        assert_eq!(or_positional("", LINK_ID_PREFIX, 2), "link3");
        assert_eq!(or_positional("custom", FLOW_ID_PREFIX, 0), "custom");
    }

    #[test]
    fn or_default_keeps_present_values() {
        assert_eq!(or_default("", DEFAULT_FORM_SUBMIT), "Thank you");
        assert_eq!(or_default("Thanks!", DEFAULT_FORM_SUBMIT), "Thanks!");
    }
}
