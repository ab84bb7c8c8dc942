use std::collections::BTreeMap;

use serde::Serialize;
use url::{form_urlencoded, Url};

use crate::error::BotScriptError;

pub const PARAM_SRC_NAV_ID: &str = "src_nav_id";
pub const PARAM_SRC_LINK_ID: &str = "src_link_id";
pub const PARAM_RESET: &str = "reset";
pub const PARAM_INPUT_PATH: &str = "input_path";
pub const PARAM_SELECTED_OPTION_INDEX: &str = "selected_option_index";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteScheme {
    Nav,
    Form,
    Answer,
    Other(String),
}

impl RouteScheme {
    fn from_scheme(raw: &str) -> Self {
        match raw {
            "nav" => Self::Nav,
            "form" => Self::Form,
            "answer" => Self::Answer,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Nav => "nav",
            Self::Form => "form",
            Self::Answer => "answer",
            Self::Other(value) => value.as_str(),
        }
    }
}

/// Postback payload of the form `scheme://host?query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingToken {
    pub scheme: RouteScheme,
    pub host: String,
    pub query: BTreeMap<String, String>,
}

impl RoutingToken {
    pub fn new(scheme: RouteScheme, host: impl Into<String>) -> Self {
        Self {
            scheme,
            host: host.into(),
            query: BTreeMap::new(),
        }
    }

    /// Token carried by an option button; the ordinal is resolved back to the
    /// option key only when the postback arrives.
    pub fn answer(namespace: &str, input_path: &str, option_index: usize) -> Self {
        Self::new(RouteScheme::Answer, namespace)
            .with_param(PARAM_INPUT_PATH, input_path)
            .with_param(PARAM_SELECTED_OPTION_INDEX, option_index.to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, BotScriptError> {
        let parsed = Url::parse(raw).map_err(|error| {
            BotScriptError::new(
                "ROUTE_PARSE_ERROR",
                format!("Invalid routing token \"{}\": {}", raw, error),
            )
        })?;
        Ok(Self::from_url(&parsed))
    }

    fn from_url(parsed: &Url) -> Self {
        let mut query = BTreeMap::new();
        for (key, value) in parsed.query_pairs() {
            query
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        Self {
            scheme: RouteScheme::from_scheme(parsed.scheme()),
            host: parsed.host_str().unwrap_or_default().to_string(),
            query,
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.insert(key.to_string(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn reset_requested(&self) -> bool {
        self.param(PARAM_RESET) == Some("yes")
    }

    pub fn to_payload(&self) -> String {
        let mut payload = format!("{}://{}", self.scheme.as_str(), self.host);
        if !self.query.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.query.iter())
                .finish();
            payload.push('?');
            payload.push_str(&encoded);
        }
        payload
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum LinkTarget {
    External(String),
    Route(RoutingToken),
}

impl LinkTarget {
    /// Absolute http(s) targets and anything that fails to parse stay external.
    pub fn from_href(href: &str) -> Self {
        match Url::parse(href) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {
                Self::External(href.to_string())
            }
            Ok(parsed) => Self::Route(RoutingToken::from_url(&parsed)),
            Err(_) => Self::External(href.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reads_scheme_host_and_first_query_value() {
        let token = RoutingToken::parse("form://signup?reset=yes&reset=no&src_nav_id=main")
            .expect("token should parse");
        assert_eq!(token.scheme, RouteScheme::Form);
        assert_eq!(token.host, "signup");
        assert!(token.reset_requested());
        assert_eq!(token.param(PARAM_SRC_NAV_ID), Some("main"));
    }

    #[test]
    fn parse_rejects_text_without_scheme() {
        let error = RoutingToken::parse("just words").expect_err("should fail");
        assert_eq!(error.code, "ROUTE_PARSE_ERROR");
    }

    #[test]
    fn answer_payload_survives_a_postback() {
        let payload = RoutingToken::answer("signup", "signup/color", 2).to_payload();
        assert!(payload.starts_with("answer://signup?"));
        let parsed = RoutingToken::parse(&payload).expect("payload should parse");
        assert_eq!(parsed.param(PARAM_INPUT_PATH), Some("signup/color"));
        assert_eq!(parsed.param(PARAM_SELECTED_OPTION_INDEX), Some("2"));
        assert!(!parsed.reset_requested());
    }

    #[test]
    fn payload_sorts_query_keys() {
        let payload = RoutingToken::new(RouteScheme::Nav, "help")
            .with_param(PARAM_SRC_LINK_ID, "link1")
            .with_param(PARAM_RESET, "no")
            .to_payload();
        assert_eq!(payload, "nav://help?reset=no&src_link_id=link1");
    }

    #[test]
    fn link_targets_split_external_and_routed() {
        assert_eq!(
            LinkTarget::from_href("https://example.com/a?b=c"),
            LinkTarget::External("https://example.com/a?b=c".to_string())
        );
        assert_eq!(
            LinkTarget::from_href("not a url"),
            LinkTarget::External("not a url".to_string())
        );
        match LinkTarget::from_href("nav://help") {
            LinkTarget::Route(token) => {
                assert_eq!(token.scheme, RouteScheme::Nav);
                assert_eq!(token.host, "help");
            }
            LinkTarget::External(_) => panic!("nav target should be routed"),
        }
        match LinkTarget::from_href("tel:123") {
            LinkTarget::Route(token) => {
                assert_eq!(token.scheme, RouteScheme::Other("tel".to_string()));
            }
            LinkTarget::External(_) => panic!("tel target parses as a route"),
        }
    }
}
