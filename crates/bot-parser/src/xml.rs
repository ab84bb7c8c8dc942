use std::collections::BTreeMap;

use bot_core::{BotScriptError, SourceLocation, SourceSpan};
use roxmltree::{Document, Node, NodeType};

#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub root: XmlElementNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElementNode),
    Text(XmlTextNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElementNode {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<XmlNode>,
    pub location: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlTextNode {
    pub value: String,
    pub location: SourceSpan,
}

impl XmlElementNode {
    /// Attribute value, or `""` when absent.
    pub fn attr(&self, name: &str) -> &str {
        self.attributes.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElementNode> {
        self.children.iter().filter_map(|entry| match entry {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub fn elements_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElementNode> + 'a {
        self.elements().filter(move |element| element.name == name)
    }

    /// Concatenated text of this element and its descendants, trimmed.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out.trim().to_string()
    }
}

fn collect_text(node: &XmlElementNode, out: &mut String) {
    for child in &node.children {
        match child {
            XmlNode::Text(text) => out.push_str(&text.value),
            XmlNode::Element(element) => collect_text(element, out),
        }
    }
}

pub fn parse_xml_document(source: &str) -> Result<XmlDocument, BotScriptError> {
    let document = Document::parse(source)
        .map_err(|error| BotScriptError::new("XML_PARSE_ERROR", error.to_string()))?;

    let Some(root) = document.root().children().find(|node| node.is_element()) else {
        return Err(BotScriptError::new(
            "XML_PARSE_ERROR",
            "XML document must contain a root element.",
        ));
    };

    Ok(XmlDocument {
        root: parse_element(&document, root),
    })
}

fn parse_element(document: &Document<'_>, node: Node<'_, '_>) -> XmlElementNode {
    let mut attributes = BTreeMap::new();
    for attribute in node.attributes() {
        attributes.insert(attribute.name().to_string(), attribute.value().to_string());
    }

    let mut children = Vec::new();
    for child in node.children() {
        match child.node_type() {
            NodeType::Element => children.push(XmlNode::Element(parse_element(document, child))),
            NodeType::Text => {
                let value = child.text().unwrap_or_default();
                if value.trim().is_empty() {
                    continue;
                }
                children.push(XmlNode::Text(XmlTextNode {
                    value: value.to_string(),
                    location: node_span(document, child.range().start, child.range().end),
                }));
            }
            _ => {}
        }
    }

    XmlElementNode {
        name: node.tag_name().name().to_string(),
        attributes,
        children,
        location: node_span(document, node.range().start, node.range().end),
    }
}

fn node_span(document: &Document<'_>, start: usize, end: usize) -> SourceSpan {
    let start_pos = document.text_pos_at(start);
    let end_pos = document.text_pos_at(end);
    SourceSpan {
        start: SourceLocation {
            line: start_pos.row as usize,
            column: start_pos.col as usize,
        },
        end: SourceLocation {
            line: end_pos.row as usize,
            column: end_pos.col as usize,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_xml_document_builds_tree_with_attributes_and_text() {
        let source = r#"<html id="bot"><body><nav id="main"><a href="nav://help">Help</a></nav></body></html>"#;
        let document = parse_xml_document(source).expect("xml should parse");
        assert_eq!(document.root.name, "html");
        assert_eq!(document.root.attr("id"), "bot");
        assert_eq!(document.root.attr("version"), "");

        let body = document.root.elements_named("body").next().expect("body");
        let nav = body.elements_named("nav").next().expect("nav");
        let link = nav.elements().next().expect("link");
        assert_eq!(link.attr("href"), "nav://help");
        assert_eq!(link.text_content(), "Help");
        assert!(link.location.start.line >= 1);
    }

    #[test]
    fn parse_xml_document_skips_whitespace_and_comments() {
        let source = "<html>\n  <!-- note -->\n  <head></head>\n</html>";
        let document = parse_xml_document(source).expect("xml should parse");
        assert_eq!(document.root.children.len(), 1);
    }

    #[test]
    fn text_content_joins_nested_markup() {
        let source = r#"<option value="r"><b>Red</b> color</option>"#;
        let document = parse_xml_document(source).expect("xml should parse");
        assert_eq!(document.root.text_content(), "Red color");
    }

    #[test]
    fn parse_xml_document_returns_parse_error_for_invalid_xml() {
        let error = parse_xml_document("<html>").expect_err("invalid xml should fail");
        assert_eq!(error.code, "XML_PARSE_ERROR");
    }

    #[test]
    fn parse_xml_document_returns_parse_error_when_root_element_is_missing() {
        let error = parse_xml_document("<?xml version=\"1.0\"?><!---->")
            .expect_err("missing root element should fail");
        assert_eq!(error.code, "XML_PARSE_ERROR");
    }
}
