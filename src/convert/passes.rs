// ABOUTME: Ordered rewrite passes from ENML to publishable HTML
// ABOUTME: Each pass consumes a node list and returns a new one

use super::document::{CodeBlock, Document, Element, MediaRef, Node};
use super::resources::{display_name, MediaKind, ResourceIndex};
use crate::error::ConvertError;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

static OPENING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```\s*([A-Za-z0-9_+#.-]*)$").unwrap());
static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#{1,5}) ").unwrap());

const NBSP: char = '\u{a0}';

const BLOCK_ELEMENTS: &[&str] = &[
    "div", "p", "ul", "ol", "li", "table", "pre", "blockquote", "h1", "h2", "h3", "h4", "h5", "h6",
];

pub struct PassContext<'a> {
    pub resources: &'a ResourceIndex,
    /// URL path the resource directory is published under, e.g. `/resources`.
    pub resource_url_prefix: &'a str,
}

pub type Pass = fn(Vec<Node>, &PassContext<'_>) -> Result<Vec<Node>, ConvertError>;

/// Order matters: fences must be lifted before heading inference sees their
/// text, and media must be canonical before resources are resolved.
pub const PASSES: &[(&str, Pass)] = &[
    ("checklists", normalize_checklists),
    ("media", canonicalize_media),
    ("code-fences", extract_code_blocks),
    ("headings", infer_headings),
    ("resources", resolve_resources),
];

pub fn run_passes(doc: Document, ctx: &PassContext<'_>) -> Result<Document, ConvertError> {
    let mut nodes = doc.nodes;
    for (name, pass) in PASSES {
        debug!(pass = name, "running conversion pass");
        nodes = pass(nodes, ctx)?;
    }
    Ok(Document { nodes })
}

/// Post-order rewrite: children are rewritten before their parent is handed to `f`.
fn rewrite<F>(nodes: Vec<Node>, f: &mut F) -> Vec<Node>
where
    F: FnMut(Node) -> Vec<Node>,
{
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let node = match node {
            Node::Element(mut el) => {
                el.children = rewrite(el.children, f);
                Node::Element(el)
            }
            other => other,
        };
        out.extend(f(node));
    }
    out
}

pub fn normalize_checklists(
    nodes: Vec<Node>,
    _ctx: &PassContext<'_>,
) -> Result<Vec<Node>, ConvertError> {
    Ok(rewrite(nodes, &mut |node| match node {
        Node::Element(el) if el.name == "en-todo" => {
            let mut input = Element::new("input").with_attr("type", "checkbox");
            if el.attr("checked") == Some("true") {
                input = input.with_attr("checked", "checked");
            }
            let mut out = vec![Node::Element(input)];
            out.extend(el.children);
            out
        }
        other => vec![other],
    }))
}

pub fn canonicalize_media(
    nodes: Vec<Node>,
    _ctx: &PassContext<'_>,
) -> Result<Vec<Node>, ConvertError> {
    Ok(rewrite(nodes, &mut |node| match node {
        Node::Element(el) if el.name == "en-media" => {
            let mut out = vec![Node::Media(MediaRef { attrs: el.attrs })];
            out.extend(el.children);
            out
        }
        other => vec![other],
    }))
}

/// `Some(language)` when `text` is an opening fence.
fn opening_fence(text: &str) -> Option<Option<String>> {
    let normalized = text.replace(NBSP, " ");
    let caps = OPENING_FENCE.captures(normalized.trim())?;
    let language = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    Some((!language.is_empty()).then(|| language.to_string()))
}

fn is_closing_fence(text: &str) -> bool {
    text.replace(NBSP, " ").trim() == "```"
}

/// Only block elements can be fences; inline markup holding ``` is plain text.
fn is_block(el: &Element) -> bool {
    BLOCK_ELEMENTS.contains(&el.name.as_str())
}

/// Collapse each run of blocks between a ```lang fence and a ``` fence into one
/// code block. Runs are searched within each sibling list.
pub fn extract_code_blocks(
    nodes: Vec<Node>,
    ctx: &PassContext<'_>,
) -> Result<Vec<Node>, ConvertError> {
    let mut out = Vec::with_capacity(nodes.len());
    let mut iter = nodes.into_iter();

    while let Some(node) = iter.next() {
        let fence = match &node {
            Node::Element(el) if is_block(el) => opening_fence(&el.text()),
            _ => None,
        };
        let Some(language) = fence else {
            out.push(match node {
                Node::Element(mut el) => {
                    el.children = extract_code_blocks(el.children, ctx)?;
                    Node::Element(el)
                }
                other => other,
            });
            continue;
        };

        let mut lines = Vec::new();
        let mut closed = false;
        for next in iter.by_ref() {
            let text = next.text();
            match next {
                Node::Element(ref el) if is_block(el) && is_closing_fence(&text) => {
                    closed = true;
                    break;
                }
                Node::Text(_) if text.trim().is_empty() => {}
                _ => lines.push(text.replace(NBSP, " ")),
            }
        }

        if !closed {
            return Err(ConvertError::UnterminatedCodeBlock {
                language: language.unwrap_or_default(),
            });
        }
        out.push(Node::Code(CodeBlock {
            language,
            code: lines.join("\n"),
        }));
    }

    Ok(out)
}

/// A paragraph-like element holding inline content only.
fn is_text_block(el: &Element) -> bool {
    matches!(el.name.as_str(), "div" | "p")
        && el.children.iter().all(|child| match child {
            Node::Element(inner) => !BLOCK_ELEMENTS.contains(&inner.name.as_str()),
            Node::Code(_) => false,
            _ => true,
        })
}

/// Heading level and the number of leading characters (whitespace, hashes and
/// the separating space) to strip.
fn heading_marker(text: &str) -> Option<(usize, usize)> {
    let normalized = text.replace(NBSP, " ");
    let trimmed = normalized.trim_start();
    let caps = HEADING.captures(trimmed)?;
    let level = caps[1].len();
    let leading = normalized.chars().count() - trimmed.chars().count();
    Some((level, leading + level + 1))
}

fn drop_leading_chars(nodes: Vec<Node>, count: &mut usize) -> Vec<Node> {
    nodes
        .into_iter()
        .filter_map(|node| {
            if *count == 0 {
                return Some(node);
            }
            match node {
                Node::Text(text) => {
                    let len = text.chars().count();
                    if len <= *count {
                        *count -= len;
                        None
                    } else {
                        let rest: String = text.chars().skip(*count).collect();
                        *count = 0;
                        Some(Node::Text(rest))
                    }
                }
                Node::Element(mut el) => {
                    el.children = drop_leading_chars(el.children, count);
                    Some(Node::Element(el))
                }
                other => Some(other),
            }
        })
        .collect()
}

pub fn infer_headings(nodes: Vec<Node>, _ctx: &PassContext<'_>) -> Result<Vec<Node>, ConvertError> {
    Ok(rewrite(nodes, &mut |node| match node {
        Node::Element(el) if is_text_block(&el) => match heading_marker(&el.text()) {
            Some((level, marker_len)) => {
                let children = rewrite(el.children, &mut |child| match child {
                    Node::Text(text) => vec![Node::Text(text.replace(NBSP, " "))],
                    other => vec![other],
                });
                let mut remaining = marker_len;
                let mut heading = Element::new(format!("h{}", level));
                heading.children = drop_leading_chars(children, &mut remaining);
                vec![Node::Element(heading)]
            }
            None => vec![Node::Element(el)],
        },
        other => vec![other],
    }))
}

fn media_element(file_name: &str, url_prefix: &str) -> Element {
    let url = format!("{}/{}", url_prefix.trim_end_matches('/'), file_name);
    let name = display_name(file_name);
    match MediaKind::from_file_name(file_name) {
        MediaKind::Image => Element::new("img").with_attr("alt", name).with_attr("src", url),
        MediaKind::Audio => Element::new("audio")
            .with_attr("controls", "")
            .with_attr("src", url),
        MediaKind::Video => Element::new("video")
            .with_attr("controls", "")
            .with_attr("src", url),
        MediaKind::Link => Element::new("a")
            .with_attr("href", url)
            .with_child(Node::Text(name.to_string())),
    }
}

pub fn resolve_resources(
    nodes: Vec<Node>,
    ctx: &PassContext<'_>,
) -> Result<Vec<Node>, ConvertError> {
    Ok(rewrite(nodes, &mut |node| match node {
        Node::Media(media) => match media.hash().and_then(|hash| ctx.resources.lookup(hash)) {
            Some(file_name) => vec![Node::Element(media_element(file_name, ctx.resource_url_prefix))],
            None => {
                warn!(hash = ?media.hash(), "no cached resource for media reference");
                vec![Node::Media(media)]
            }
        },
        other => vec![other],
    }))
}
