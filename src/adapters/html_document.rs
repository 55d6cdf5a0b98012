//! Lenient HTML document adapter.
//!
//! Builds an arena tree from saved invoice markup. Invoices are table soup
//! with unclosed cells and stray end tags, so the builder recovers the way a
//! browser roughly does: implied ends for `td`/`th`/`tr`/`p`/`li`, void
//! elements never pushed, and unmatched end tags ignored.

use crate::domain::error::LedgerError;
use crate::ports::document_port::{DocumentTree, NodeId};
use std::fs;
use std::path::Path;

const DOCUMENT_TAG: &str = "#document";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An owned, immutable HTML tree.
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    nodes: Vec<Node>,
}

impl HtmlDocument {
    pub fn parse(html: &str) -> Self {
        TreeBuilder::new(html).build()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| LedgerError::Document {
            source_name: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::parse(&content))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl DocumentTree for HtmlDocument {
    fn root(&self) -> Option<NodeId> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(NodeId(0))
        }
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Element { tag, .. } => Some(tag.as_str()),
            NodeData::Text(_) => None,
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            NodeData::Text(_) => None,
        }
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Text(text) => Some(text.as_str()),
            NodeData::Element { .. } => None,
        }
    }
}

struct TreeBuilder<'a> {
    input: &'a str,
    pos: usize,
    nodes: Vec<Node>,
    open: Vec<NodeId>,
}

impl<'a> TreeBuilder<'a> {
    fn new(input: &'a str) -> Self {
        let document = Node {
            data: NodeData::Element {
                tag: DOCUMENT_TAG.to_string(),
                attributes: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            input,
            pos: 0,
            nodes: vec![document],
            open: vec![NodeId(0)],
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or(NodeId(0))
    }

    fn append(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = self.current();
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn open_tag_name(&self, id: NodeId) -> &str {
        match &self.nodes[id.0].data {
            NodeData::Element { tag, .. } => tag.as_str(),
            NodeData::Text(_) => "",
        }
    }

    fn build(mut self) -> HtmlDocument {
        while self.pos < self.input.len() {
            let rest = self.remaining();
            match rest.find('<') {
                Some(0) => self.consume_markup(),
                Some(idx) => {
                    self.push_text(&rest[..idx]);
                    self.pos += idx;
                }
                None => {
                    self.push_text(rest);
                    self.pos = self.input.len();
                }
            }
        }
        HtmlDocument { nodes: self.nodes }
    }

    fn push_text(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let text = decode_entities(raw);
        self.append(NodeData::Text(text));
    }

    fn skip_past(&mut self, terminator: &str) {
        match self.remaining().find(terminator) {
            Some(idx) => self.pos += idx + terminator.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn consume_markup(&mut self) {
        let rest = self.remaining();
        if rest.starts_with("<!--") {
            self.pos += 4;
            self.skip_past("-->");
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            self.skip_past(">");
        } else if rest.starts_with("</") {
            self.pos += 2;
            let name = self.read_name();
            self.skip_past(">");
            if !name.is_empty() {
                self.close_element(&name);
            }
        } else if rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            self.pos += 1;
            self.consume_start_tag();
        } else {
            // A lone '<' is text.
            self.push_text("<");
            self.pos += 1;
        }
    }

    fn read_name(&mut self) -> String {
        let rest = self.remaining();
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        self.pos += end;
        rest[..end].to_ascii_lowercase()
    }

    fn skip_whitespace(&mut self) {
        let rest = self.remaining();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    fn consume_start_tag(&mut self) {
        let tag = self.read_name();
        let mut attributes = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            let rest = self.remaining();
            if rest.is_empty() {
                break;
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                self_closing = true;
                break;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            if rest.starts_with('/') {
                self.pos += 1;
                continue;
            }
            let name_end = rest
                .find(|c: char| c.is_whitespace() || c == '=' || c == '>' || c == '/')
                .unwrap_or(rest.len())
                .max(1);
            let name = rest[..name_end].to_ascii_lowercase();
            self.pos += name_end;
            self.skip_whitespace();
            let value = if self.remaining().starts_with('=') {
                self.pos += 1;
                self.skip_whitespace();
                self.read_attribute_value()
            } else {
                String::new()
            };
            attributes.push((name, value));
        }

        self.imply_end_tags(&tag);
        let id = self.append(NodeData::Element {
            tag: tag.clone(),
            attributes,
        });

        if self_closing || VOID_ELEMENTS.contains(&tag.as_str()) {
            return;
        }

        if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
            let closing = format!("</{tag}");
            let rest = self.remaining();
            let end = find_ascii_ci(rest, &closing).unwrap_or(rest.len());
            let body = &rest[..end];
            if !body.is_empty() {
                let text = if tag == "script" || tag == "style" {
                    body.to_string()
                } else {
                    decode_entities(body)
                };
                let text_id = NodeId(self.nodes.len());
                self.nodes.push(Node {
                    data: NodeData::Text(text),
                    parent: Some(id),
                    children: Vec::new(),
                });
                self.nodes[id.0].children.push(text_id);
            }
            self.pos += end;
            self.skip_past(">");
            return;
        }

        self.open.push(id);
    }

    fn read_attribute_value(&mut self) -> String {
        let rest = self.remaining();
        match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let body = &rest[1..];
                match body.find(quote) {
                    Some(end) => {
                        self.pos += end + 2;
                        decode_entities(&body[..end])
                    }
                    None => {
                        self.pos = self.input.len();
                        decode_entities(body)
                    }
                }
            }
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                self.pos += end;
                decode_entities(&rest[..end])
            }
        }
    }

    /// Close elements whose end tag HTML lets authors omit.
    fn imply_end_tags(&mut self, tag: &str) {
        match tag {
            "td" | "th" => self.close_within(&["td", "th"], &["tr", "table"]),
            "tr" => self.close_within(&["tr"], &["table", "tbody", "thead", "tfoot"]),
            "tbody" | "thead" | "tfoot" => {
                self.close_within(&["tbody", "thead", "tfoot"], &["table"])
            }
            "li" => self.close_within(&["li"], &["ul", "ol"]),
            "p" => self.close_within(&["p"], &["div", "td", "th", "body"]),
            "option" => self.close_within(&["option"], &["select"]),
            _ => {}
        }
    }

    /// Pop back through the innermost open `targets` element unless a
    /// `boundary` element is reached first.
    fn close_within(&mut self, targets: &[&str], boundaries: &[&str]) {
        for depth in (1..self.open.len()).rev() {
            let name = self.open_tag_name(self.open[depth]);
            if targets.contains(&name) {
                self.open.truncate(depth);
                return;
            }
            if boundaries.contains(&name) {
                return;
            }
        }
    }

    fn close_element(&mut self, tag: &str) {
        for depth in (1..self.open.len()).rev() {
            if self.open_tag_name(self.open[depth]) == tag {
                self.open.truncate(depth);
                return;
            }
        }
    }
}

fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if pat.is_empty() || hay.len() < pat.len() {
        return None;
    }
    (0..=hay.len() - pat.len()).find(|&i| hay[i..i + pat.len()].eq_ignore_ascii_case(pat))
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        let candidate = &rest[idx..];
        let decoded = candidate
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| decode_entity(&candidate[1..end]).map(|c| (c, end)));
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &candidate[end + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        "ndash" => Some('\u{2013}'),
        "mdash" => Some('\u{2014}'),
        "reg" => Some('\u{ae}'),
        "trade" => Some('\u{2122}'),
        "copy" => Some('\u{a9}'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}
