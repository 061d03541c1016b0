// ABOUTME: Owned document tree for ENML note bodies
// ABOUTME: Parses with scraper into plain nodes and serializes them back to HTML

use crate::error::ConvertError;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::LazyLock;

/// Proprietary elements that ENML writes self-closed. An HTML parser would treat
/// `<en-media/>` as an open tag and swallow every following sibling.
static SELF_CLOSING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(en-todo|en-media)(\s[^>]*?)?\s*/>").unwrap());

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub type Attributes = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    /// Placeholder for an embedded resource, keyed by its content hash.
    Media(MediaRef),
    /// Fenced code lifted out of the note's paragraphs.
    Code(CodeBlock),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    /// Parsed attributes are sorted by name so serialization is stable.
    pub attrs: Attributes,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaRef {
    pub attrs: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        find_attr(&self.attrs, name)
    }

    /// Concatenated text of every descendant text node.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.collect_text(&mut out);
        }
        out
    }
}

impl MediaRef {
    pub fn hash(&self) -> Option<&str> {
        find_attr(&self.attrs, "hash")
    }
}

impl Node {
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                for child in &el.children {
                    child.collect_text(out);
                }
            }
            Node::Media(_) | Node::Code(_) => {}
        }
    }
}

fn find_attr<'a>(attrs: &'a Attributes, name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// The children of a note's `<en-note>` root.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub nodes: Vec<Node>,
}

impl Document {
    pub fn parse(enml: &str) -> Result<Self, ConvertError> {
        let expanded = SELF_CLOSING.replace_all(enml, "<${1}${2}></${1}>");
        let html = Html::parse_fragment(&expanded);

        let root = html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "en-note")
            .ok_or(ConvertError::MissingNoteBody)?;

        Ok(Document {
            nodes: convert_children(root),
        })
    }

    /// Inner markup of the note root.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            write_node(node, &mut out);
        }
        out
    }
}

fn convert_children(parent: ElementRef<'_>) -> Vec<Node> {
    let mut nodes = Vec::new();
    for child in parent.children() {
        if let Some(el) = ElementRef::wrap(child) {
            let mut attrs: Attributes = el
                .value()
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect();
            attrs.sort();
            nodes.push(Node::Element(Element {
                name: el.value().name().to_string(),
                attrs,
                children: convert_children(el),
            }));
        } else if let Some(text) = child.value().as_text() {
            nodes.push(Node::Text(text.to_string()));
        }
    }
    nodes
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => escape_into(text, false, out),
        Node::Element(el) => {
            write_open_tag(&el.name, &el.attrs, out);
            if VOID_ELEMENTS.contains(&el.name.as_str()) {
                out.push_str(" />");
                return;
            }
            out.push('>');
            for child in &el.children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(&el.name);
            out.push('>');
        }
        Node::Media(media) => {
            write_open_tag("en-media", &media.attrs, out);
            out.push_str("></en-media>");
        }
        Node::Code(code) => {
            // Liquid tag for Jekyll's highlighter; the body must stay unescaped.
            out.push_str("{% highlight ");
            out.push_str(code.language.as_deref().unwrap_or("plaintext"));
            out.push_str(" %}\n");
            out.push_str(&code.code);
            out.push_str("\n{% endhighlight %}");
        }
    }
}

fn write_open_tag(name: &str, attrs: &Attributes, out: &mut String) {
    out.push('<');
    out.push_str(name);
    for (key, value) in attrs {
        out.push(' ');
        out.push_str(key);
        if !value.is_empty() {
            out.push_str("=\"");
            escape_into(value, true, out);
            out.push('"');
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRAPPED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE en-note SYSTEM "http://xml.evernote.com/pub/enml2.dtd">
<en-note><div>first</div><div>second &amp; third</div></en-note>"#;

    #[test]
    fn test_parse_finds_note_root() {
        let doc = Document::parse(WRAPPED).unwrap();
        let blocks: Vec<String> = doc
            .nodes
            .iter()
            .filter(|n| matches!(n, Node::Element(_)))
            .map(Node::text)
            .collect();
        assert_eq!(blocks, vec!["first", "second & third"]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        assert!(matches!(
            Document::parse("<div>no root</div>"),
            Err(ConvertError::MissingNoteBody)
        ));
    }

    #[test]
    fn test_self_closing_media_does_not_swallow_siblings() {
        let doc = Document::parse(
            r#"<en-note><en-media hash="ab" type="image/png"/><div>after</div></en-note>"#,
        )
        .unwrap();
        assert_eq!(doc.nodes.len(), 2);
        match &doc.nodes[0] {
            Node::Element(el) => {
                assert_eq!(el.name, "en-media");
                assert_eq!(el.attr("hash"), Some("ab"));
                assert!(el.children.is_empty());
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_roundtrip_html_is_stable() {
        let doc = Document::parse(
            r#"<en-note><div style="x" class="a">a &lt; b<br/></div><p>"q"</p></en-note>"#,
        )
        .unwrap();
        assert_eq!(
            doc.to_html(),
            r#"<div class="a" style="x">a &lt; b<br /></div><p>"q"</p>"#
        );
    }

    #[test]
    fn test_code_and_media_serialization() {
        let doc = Document {
            nodes: vec![
                Node::Code(CodeBlock {
                    language: None,
                    code: "a < b".into(),
                }),
                Node::Media(MediaRef {
                    attrs: vec![("hash".into(), "ff".into())],
                }),
            ],
        };
        assert_eq!(
            doc.to_html(),
            "{% highlight plaintext %}\na < b\n{% endhighlight %}<en-media hash=\"ff\"></en-media>"
        );
    }
}
