use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::route::LinkTarget;

pub const ENTRY_FLOW_ID: &str = "main";
pub const ERROR_CONFIG_KEY: &str = "error";
pub const DEFAULT_ERROR_TEXT: &str = "Unhandled input :(";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl SourceSpan {
    pub fn synthetic() -> Self {
        Self {
            start: SourceLocation { line: 1, column: 1 },
            end: SourceLocation { line: 1, column: 1 },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRef {
    pub form: usize,
    pub input: usize,
}

/// Compiled conversation script. Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone, Serialize)]
pub struct Script {
    pub id: String,
    pub version: String,
    pub configs: BTreeMap<String, String>,
    pub flows: Vec<Flow>,
    pub forms: Vec<Form>,
    pub templates: Vec<ReplyTemplate>,
    #[serde(skip)]
    flow_index: HashMap<String, usize>,
    #[serde(skip)]
    form_index: HashMap<String, usize>,
    #[serde(skip)]
    input_index: HashMap<String, InputRef>,
}

impl Script {
    /// Builds the flow, form and input indices. Later duplicates win the index slot.
    pub fn new(
        id: String,
        version: String,
        configs: BTreeMap<String, String>,
        flows: Vec<Flow>,
        forms: Vec<Form>,
        templates: Vec<ReplyTemplate>,
    ) -> Self {
        let flow_index = flows
            .iter()
            .enumerate()
            .map(|(position, flow)| (flow.id.clone(), position))
            .collect();

        let mut form_index = HashMap::new();
        let mut input_index = HashMap::new();
        for (form_position, form) in forms.iter().enumerate() {
            form_index.insert(form.id.clone(), form_position);
            for (input_position, input) in form.inputs.iter().enumerate() {
                input_index.insert(
                    input.path.clone(),
                    InputRef {
                        form: form_position,
                        input: input_position,
                    },
                );
            }
        }

        Self {
            id,
            version,
            configs,
            flows,
            forms,
            templates,
            flow_index,
            form_index,
            input_index,
        }
    }

    pub fn flow(&self, id: &str) -> Option<&Flow> {
        self.flow_index.get(id).map(|position| &self.flows[*position])
    }

    pub fn main_flow(&self) -> Option<&Flow> {
        self.flow(ENTRY_FLOW_ID)
    }

    pub fn form(&self, id: &str) -> Option<&Form> {
        self.form_index.get(id).map(|position| &self.forms[*position])
    }

    pub fn input(&self, path: &str) -> Option<&Input> {
        self.input_index
            .get(path)
            .map(|found| &self.forms[found.form].inputs[found.input])
    }

    /// The input declared right after `input`'s indexed position in its form.
    pub fn next_input(&self, input: &Input) -> Option<&Input> {
        let found = self.input_index.get(&input.path)?;
        self.forms[found.form].inputs.get(found.input + 1)
    }

    pub fn form_of(&self, input: &Input) -> Option<&Form> {
        self.form(&input.namespace)
    }

    /// Looks up `<namespace>/<id>`, the only scope a condition operand may refer to.
    pub fn sibling_input(&self, namespace: &str, id: &str) -> Option<&Input> {
        self.input(&input_path(namespace, id))
    }

    /// Non-empty config value.
    pub fn config(&self, key: &str) -> Option<&str> {
        self.configs
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn error_text(&self) -> &str {
        self.config(ERROR_CONFIG_KEY).unwrap_or(DEFAULT_ERROR_TEXT)
    }
}

pub fn input_path(namespace: &str, id: &str) -> String {
    format!("{}/{}", namespace, id)
}

#[derive(Debug, Clone, Serialize)]
pub struct Flow {
    pub id: String,
    pub title: String,
    pub links: Vec<Link>,
    #[serde(skip)]
    link_index: HashMap<String, usize>,
}

impl Flow {
    pub fn new(id: String, title: String, links: Vec<Link>) -> Self {
        let link_index = links
            .iter()
            .enumerate()
            .map(|(position, link)| (link.id.clone(), position))
            .collect();
        Self {
            id,
            title,
            links,
            link_index,
        }
    }

    pub fn link(&self, id: &str) -> Option<&Link> {
        self.link_index.get(id).map(|position| &self.links[*position])
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub id: String,
    pub text: String,
    pub href: String,
    pub target: LinkTarget,
    pub reset: bool,
    pub embed: bool,
    pub ratio: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Form {
    pub id: String,
    pub title: String,
    pub submit: String,
    pub action: String,
    pub method: String,
    pub inputs: Vec<Input>,
}

impl Form {
    pub fn first_input(&self) -> Option<&Input> {
        self.inputs.first()
    }

}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    File,
    Options,
    Other(String),
}

impl InputKind {
    /// Case-insensitive; an empty type means `text`.
    pub fn from_type_attr(raw: &str) -> Self {
        let normalized = raw.to_lowercase();
        match normalized.as_str() {
            "" | "text" => Self::Text,
            "file" => Self::File,
            "options" => Self::Options,
            _ => Self::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::File => "file",
            Self::Options => "options",
            Self::Other(value) => value.as_str(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Input {
    pub namespace: String,
    pub path: String,
    pub id: String,
    pub title: String,
    pub kind: InputKind,
    pub options: Vec<ChoiceOption>,
    pub condition_text: String,
    pub condition: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    pub key: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConditionOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
}

impl ConditionOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub left: String,
    pub op: ConditionOp,
    pub right: String,
}

impl Condition {
    /// Equality compares text; ordering compares integers where anything
    /// unparsable counts as zero, so `"abc" > "-1"` holds.
    pub fn holds_for(&self, left_value: &str) -> bool {
        let left_number = loose_int(left_value);
        let right_number = loose_int(&self.right);
        match self.op {
            ConditionOp::Eq => left_value == self.right,
            ConditionOp::Ne => left_value != self.right,
            ConditionOp::Gt => left_number > right_number,
            ConditionOp::Ge => left_number >= right_number,
            ConditionOp::Lt => left_number < right_number,
            ConditionOp::Le => left_number <= right_number,
        }
    }
}

fn loose_int(raw: &str) -> i64 {
    raw.parse::<i64>().unwrap_or(0)
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyTemplate {
    pub pattern: String,
    #[serde(skip)]
    pub matcher: Regex,
    pub replies: Vec<Reply>,
}

impl ReplyTemplate {
    pub fn is_match(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub label: Option<String>,
    pub attachment: Option<ReplyAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyAttachment {
    pub kind: String,
    pub source: String,
}
