use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use bot_core::{
    input_path, BotScriptError, ChoiceOption, Flow, Form, Input, InputKind, Link, LinkTarget,
    Reply, ReplyAttachment, ReplyTemplate, Script, ENTRY_FLOW_ID, ERROR_CONFIG_KEY,
    DEFAULT_ERROR_TEXT,
};
use bot_parser::{parse_xml_document, XmlElementNode};
use regex::Regex;
use tracing::debug;

mod condition;
mod defaults;

pub use condition::{parse_condition, strip_whitespace};
use defaults::*;

const ROOT_ELEMENT: &str = "html";

pub fn compile_script_file(path: &Path) -> Result<Script, BotScriptError> {
    let source = fs::read_to_string(path).map_err(|error| {
        BotScriptError::new(
            "SCRIPT_READ_ERROR",
            format!("Cannot read script {}: {}", path.display(), error),
        )
    })?;
    compile_script(&source, &path.to_string_lossy())
}

/// Compiles script markup. `fallback_id` names the script when the root
/// carries no `id` attribute.
pub fn compile_script(source: &str, fallback_id: &str) -> Result<Script, BotScriptError> {
    let document = parse_xml_document(source)?;
    let root = document.root;
    if root.name != ROOT_ELEMENT {
        return Err(BotScriptError::with_span(
            "XML_ROOT_INVALID",
            format!(
                "Expected <{}> as root element, found <{}>.",
                ROOT_ELEMENT, root.name
            ),
            root.location.clone(),
        ));
    }

    let id = or_default(root.attr("id"), fallback_id);
    let version = root.attr("version").to_string();

    let flows = body_elements(&root, "nav")
        .enumerate()
        .map(|(index, node)| compile_flow(index, node))
        .collect::<Result<Vec<_>, _>>()?;
    if !flows.iter().any(|flow| flow.id == ENTRY_FLOW_ID) {
        return Err(BotScriptError::new(
            "ENTRY_FLOW_MISSING",
            format!(
                "Cannot find the entry flow (<nav id=\"{}\"> ... </nav>).",
                ENTRY_FLOW_ID
            ),
        ));
    }

    let forms = body_elements(&root, "form")
        .enumerate()
        .map(|(index, node)| compile_form(index, node))
        .collect::<Vec<_>>();
    let configs = compile_configs(&root);
    let templates = body_elements(&root, "template")
        .map(compile_template)
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        script = %id,
        flows = flows.len(),
        forms = forms.len(),
        templates = templates.len(),
        "compiled script"
    );
    Ok(Script::new(id, version, configs, flows, forms, templates))
}

fn body_elements<'a>(
    root: &'a XmlElementNode,
    name: &'a str,
) -> impl Iterator<Item = &'a XmlElementNode> + 'a {
    root.elements_named("body")
        .flat_map(move |body| body.elements_named(name))
}

fn compile_flow(index: usize, node: &XmlElementNode) -> Result<Flow, BotScriptError> {
    let links = node
        .elements_named("a")
        .enumerate()
        .map(|(index, link)| compile_link(index, link))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Flow::new(
        or_positional(node.attr("id"), FLOW_ID_PREFIX, index),
        or_default(node.attr("title"), DEFAULT_FLOW_TITLE),
        links,
    ))
}

fn compile_link(index: usize, node: &XmlElementNode) -> Result<Link, BotScriptError> {
    let href = node.attr("href").to_string();
    Ok(Link {
        id: or_positional(node.attr("id"), LINK_ID_PREFIX, index),
        text: node.text_content(),
        target: LinkTarget::from_href(&href),
        href,
        reset: parse_bool_attr(node, "reset")?,
        embed: parse_bool_attr(node, "embed")?,
        ratio: or_default(node.attr("ratio"), DEFAULT_LINK_RATIO),
    })
}

fn compile_form(index: usize, node: &XmlElementNode) -> Form {
    let id = or_positional(node.attr("id"), FORM_ID_PREFIX, index);
    let inputs = node
        .elements_named("input")
        .enumerate()
        .map(|(index, input)| compile_input(&id, index, input))
        .collect();
    Form {
        title: or_default(node.attr("title"), DEFAULT_FORM_TITLE),
        submit: or_default(node.attr("submit"), DEFAULT_FORM_SUBMIT),
        action: node.attr("action").to_string(),
        method: or_default(&node.attr("method").to_lowercase(), DEFAULT_FORM_METHOD),
        inputs,
        id,
    }
}

fn compile_input(namespace: &str, index: usize, node: &XmlElementNode) -> Input {
    let id = or_positional(node.attr("id"), INPUT_ID_PREFIX, index);
    let condition_text = strip_whitespace(node.attr("if"));
    let condition = parse_condition(&condition_text);
    if condition.is_none() && !condition_text.is_empty() {
        debug!(input = %id, text = %condition_text, "ignoring unparsable condition");
    }
    Input {
        namespace: namespace.to_string(),
        path: input_path(namespace, &id),
        title: or_default(node.attr("title"), DEFAULT_INPUT_TITLE),
        kind: InputKind::from_type_attr(node.attr("type")),
        options: node
            .elements_named("option")
            .map(|option| ChoiceOption {
                key: option.attr("value").to_string(),
                text: option.text_content(),
            })
            .collect(),
        condition_text,
        condition,
        id,
    }
}

fn compile_configs(root: &XmlElementNode) -> BTreeMap<String, String> {
    let mut configs = BTreeMap::new();
    for meta in root
        .elements_named("head")
        .flat_map(|head| head.elements_named("meta"))
    {
        configs.insert(
            meta.attr("name").to_string(),
            meta.attr("content").to_string(),
        );
    }
    let error = configs.entry(ERROR_CONFIG_KEY.to_string()).or_default();
    if error.is_empty() {
        *error = DEFAULT_ERROR_TEXT.to_string();
    }
    configs
}

fn compile_template(node: &XmlElementNode) -> Result<ReplyTemplate, BotScriptError> {
    let pattern = node.attr("match").to_string();
    let matcher = Regex::new(&pattern).map_err(|error| {
        BotScriptError::with_span(
            "TEMPLATE_PATTERN_INVALID",
            format!("Invalid template pattern \"{}\": {}", pattern, error),
            node.location.clone(),
        )
    })?;
    let replies = node
        .elements_named("reply")
        .map(|reply| Reply {
            label: non_empty(reply.attr("label")),
            attachment: match (non_empty(reply.attr("type")), non_empty(reply.attr("src"))) {
                (Some(kind), Some(source)) => Some(ReplyAttachment { kind, source }),
                _ => None,
            },
        })
        .collect();
    Ok(ReplyTemplate {
        pattern,
        matcher,
        replies,
    })
}

fn non_empty(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

fn parse_bool_attr(node: &XmlElementNode, name: &str) -> Result<bool, BotScriptError> {
    match node.attr(name).trim() {
        "" => Ok(false),
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(BotScriptError::with_span(
            "XML_ATTR_BOOL_INVALID",
            format!(
                "Attribute \"{}\" on <{}> must be a boolean.",
                name, node.name
            ),
            node.location.clone(),
        )),
    }
}
