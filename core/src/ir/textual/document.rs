//! file: core/src/ir/textual/document.rs
//! description: pest-backed element tree of a textual IR document.

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::error::IrParseError;

#[derive(Parser)]
#[grammar = "ir/textual/ir.pest"]
struct DocumentParser;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Line of the opening tag, 1-based.
    pub line: usize,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Element(Element),
    Text { line: usize, text: String },
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn required_attr(&self, name: &str) -> Result<&str, IrParseError> {
        self.attr(name).ok_or_else(|| {
            IrParseError::new(format!("<{}> lacks attribute {}", self.name, name))
                .at_line(self.line, format!("<{}>", self.name))
        })
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text { .. } => None,
        })
    }

    /// Text lines with their line numbers, blank lines included.
    pub fn text_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.children.iter().filter_map(|node| match node {
            Node::Text { line, text } => Some((*line, text.as_str())),
            Node::Element(_) => None,
        })
    }

    /// Non-blank text lines, trimmed.
    pub fn content_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.text_lines()
            .map(|(line, text)| (line, text.trim()))
            .filter(|(_, text)| !text.is_empty())
    }
}

pub(crate) fn parse_document(text: &str) -> Result<Element, IrParseError> {
    let mut pairs = DocumentParser::parse(Rule::document, text).map_err(|e| {
        let line = match e.line_col {
            pest::error::LineColLocation::Pos((line, _)) => line,
            pest::error::LineColLocation::Span((line, _), _) => line,
        };
        IrParseError::new("malformed document structure").at_line(line, e.line().to_string())
    })?;

    let root = pairs
        .next()
        .and_then(|document| document.into_inner().find(|p| p.as_rule() == Rule::element))
        .ok_or_else(|| IrParseError::new("document has no root element"))?;
    build_element(root)
}

fn build_element(pair: Pair<'_, Rule>) -> Result<Element, IrParseError> {
    let line = pair.as_span().start_pos().line_col().0;
    let mut element = Element {
        name: String::new(),
        attributes: Vec::new(),
        line,
        children: Vec::new(),
    };

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::open_tag => {
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::tag_name => element.name = part.as_str().to_string(),
                        Rule::attribute => {
                            let mut kv = part.into_inner();
                            let key = kv.next().map(|p| p.as_str().to_string()).unwrap_or_default();
                            let value = kv.next().map(|p| p.as_str().to_string()).unwrap_or_default();
                            element.attributes.push((key, value));
                        }
                        _ => {}
                    }
                }
            }
            Rule::element => element.children.push(Node::Element(build_element(inner)?)),
            Rule::text => element.children.push(Node::Text {
                line: inner.as_span().start_pos().line_col().0,
                text: inner.as_str().to_string(),
            }),
            Rule::close_tag => {
                let close_line = inner.as_span().start_pos().line_col().0;
                let closing = inner.as_str();
                let name = inner.into_inner().next().map(|p| p.as_str()).unwrap_or_default();
                if name != element.name {
                    return Err(IrParseError::new(format!(
                        "closing tag does not match <{}> opened on line {}",
                        element.name, element.line
                    ))
                    .at_line(close_line, closing));
                }
            }
            _ => {}
        }
    }
    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_elements_and_text() {
        let doc = "<?xml version=\"1.0\"?>\n<A X=\"1\" Y=\"\">\n<B>\nhello\n\n</B>\n  <C>\n  </C>\n</A>\n";
        let root = parse_document(doc).unwrap();
        assert_eq!(root.name, "A");
        assert_eq!(root.attr("X"), Some("1"));
        assert_eq!(root.attr("Y"), Some(""));
        let children: Vec<_> = root.elements().collect();
        assert_eq!(children.len(), 2);
        let lines: Vec<_> = children[0].text_lines().map(|(_, t)| t).collect();
        assert_eq!(lines, vec!["hello", ""]);
        assert_eq!(children[0].line, 3);
    }

    #[test]
    fn mismatched_close_tag() {
        let err = parse_document("<A>\n<B>\n</A>\n</B>\n").unwrap_err();
        assert_eq!(err.line, Some(3));
    }
}
