//! Owned, strongly typed markup tree.
//!
//! Documents are parsed leniently with the HTML5 parser (via `scraper`), so
//! unbalanced or otherwise malformed wiki exports never fail to load. The
//! parsed tree is copied into plain [`Node`] values that can be queried and
//! mutated freely, then serialized back to markup.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::debug;

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text content is serialized without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

// ---------------------------------------------------------------------------
// Node types
// ---------------------------------------------------------------------------

/// A node in the markup tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Decoded text (entities already resolved).
    Text(String),
    Comment(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// An element with its attributes and ordered children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Tag name as written, lowercased, including any `prefix:`.
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Tag name without its namespace prefix (`ac:structured-macro` → `structured-macro`).
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Exact attribute lookup.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Attribute lookup by local name, ignoring any namespace prefix.
    ///
    /// Values are normalized: surrounding whitespace and stray quoting such as
    /// `\"requirement\"` (seen in JSON-escaped exports) are removed.
    pub fn attr_local(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| local_part(name) == local)
            .map(|(_, value)| normalize_attr_value(value))
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// All descendant elements matching `predicate`, in document order.
    pub fn find_descendants<'a, P>(&'a self, predicate: P) -> Vec<&'a Element>
    where
        P: Fn(&Element) -> bool,
    {
        let mut found = Vec::new();
        find_in(&self.children, &predicate, &mut found);
        found
    }

    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.name.as_str())
    }
}

/// A parsed markup fragment: an ordered list of top-level nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub children: Vec<Node>,
}

impl Document {
    /// Parse markup leniently. Never fails; malformed input yields a best-effort tree.
    pub fn parse(markup: &str) -> Self {
        if markup.trim().is_empty() {
            return Self::default();
        }

        let prepared = expand_self_closing(markup);
        let html = Html::parse_fragment(&prepared);

        if !html.errors.is_empty() {
            debug!(
                errors = html.errors.len(),
                "recovered from malformed markup"
            );
        }

        Self {
            children: convert_children(html.root_element()),
        }
    }

    /// All elements matching `predicate`, in document order.
    pub fn find_all<'a, P>(&'a self, predicate: P) -> Vec<&'a Element>
    where
        P: Fn(&Element) -> bool,
    {
        let mut found = Vec::new();
        find_in(&self.children, &predicate, &mut found);
        found
    }

    /// Concatenated text of the whole document, without any separators.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Serialize the tree back to markup.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            write_node(node, &mut out, false);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Rewrite `<ns:tag ... />` as `<ns:tag ...></ns:tag>`.
///
/// The HTML parser ignores the self-closing flag on non-void elements, which
/// would make Confluence's `<ri:page .../>` and `<ac:emoticon .../>` swallow
/// every following sibling.
fn expand_self_closing(markup: &str) -> std::borrow::Cow<'_, str> {
    static SELF_CLOSING_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"<([A-Za-z][\w.-]*:[\w.-]+)((?:\s[^<>]*?)?)\s*/>").expect("valid regex")
    });

    SELF_CLOSING_RE.replace_all(markup, "<${1}${2}></${1}>")
}

fn convert_children(parent: ElementRef<'_>) -> Vec<Node> {
    let mut nodes = Vec::new();

    for child in parent.children() {
        match child.value() {
            scraper::Node::Text(text) => {
                let text: &str = text;
                nodes.push(Node::Text(text.to_string()));
            }
            scraper::Node::Comment(comment) => {
                let comment: &str = comment;
                nodes.push(Node::Comment(comment.to_string()));
            }
            scraper::Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    nodes.push(Node::Element(convert_element(el)));
                }
            }
            _ => {}
        }
    }

    nodes
}

fn convert_element(el: ElementRef<'_>) -> Element {
    let value = el.value();
    Element {
        name: value.name().to_string(),
        attributes: value
            .attrs()
            .map(|(name, val)| (name.to_string(), val.to_string()))
            .collect(),
        children: convert_children(el),
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

fn local_part(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn normalize_attr_value(value: &str) -> &str {
    value.trim().trim_matches(|c| c == '"' || c == '\\' || c == '\'')
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => collect_text(&el.children, out),
            Node::Comment(_) => {}
        }
    }
}

fn find_in<'a, P>(nodes: &'a [Node], predicate: &P, found: &mut Vec<&'a Element>)
where
    P: Fn(&Element) -> bool,
{
    for node in nodes {
        if let Node::Element(el) = node {
            if predicate(el) {
                found.push(el);
            }
            find_in(&el.children, predicate, found);
        }
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

fn write_node(node: &Node, out: &mut String, raw_text: bool) {
    match node {
        Node::Text(text) if raw_text => out.push_str(text),
        Node::Text(text) => escape_into(text, false, out),
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.name);
            for (name, value) in &el.attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_into(value, true, out);
                out.push('"');
            }
            out.push('>');

            if el.is_void() {
                return;
            }

            let raw = RAW_TEXT_ELEMENTS.contains(&el.name.as_str());
            for child in &el.children {
                write_node(child, out, raw);
            }

            out.push_str("</");
            out.push_str(&el.name);
            out.push('>');
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

    const STORAGE_SAMPLE: &str = r#"<p>Actor: <ac:structured-macro ac:name="requirement" ac:schema-version="1"><ac:parameter ac:name="key">ACT-006</ac:parameter></ac:structured-macro> submits.</p>"#;

    #[test]
    fn parses_namespaced_macros() {
        let doc = Document::parse(STORAGE_SAMPLE);
        let macros = doc.find_all(|el| el.local_name() == "structured-macro");

        assert_eq!(macros.len(), 1);
        assert_eq!(macros[0].name, "ac:structured-macro");
        assert_eq!(macros[0].attr("ac:name"), Some("requirement"));
        assert_eq!(macros[0].attr_local("name"), Some("requirement"));
        assert_eq!(macros[0].text(), "ACT-006");
    }

    #[test]
    fn attr_local_strips_escaped_quotes() {
        let el = Element::new("ac:structured-macro").with_attr("ac:name", r#"\"requirement\""#);
        assert_eq!(el.attr_local("name"), Some("requirement"));
    }

    #[test]
    fn tolerates_unbalanced_markup() {
        let doc = Document::parse("<div><p>open paragraph<span>never closed</div><td>stray cell");
        let text = doc.text();
        assert!(text.contains("open paragraph"));
        assert!(text.contains("never closed"));
        assert!(text.contains("stray cell"));
    }

    #[test]
    fn empty_input_gives_empty_document() {
        assert!(Document::parse("").children.is_empty());
        assert!(Document::parse("  \n ").children.is_empty());
    }

    #[test]
    fn self_closing_namespaced_tags_keep_siblings() {
        let doc = Document::parse(
            r#"<p><ac:link><ri:page ri:content-title="Actors" /></ac:link> after link</p>"#,
        );
        let pages = doc.find_all(|el| el.name == "ri:page");
        assert_eq!(pages.len(), 1);
        assert!(pages[0].children.is_empty());
        assert_eq!(pages[0].attr("ri:content-title"), Some("Actors"));
    }

    #[test]
    fn decodes_entities_into_text() {
        let doc = Document::parse("<p>Terms &amp; Conditions &lt;v2&gt;</p>");
        assert_eq!(doc.text(), "Terms & Conditions <v2>");
    }

    #[test]
    fn serialization_escapes_text_and_attributes() {
        let doc = Document {
            children: vec![Node::Element(
                Element::new("span")
                    .with_attr("title", "say \"hi\"")
                    .with_text("a < b & c"),
            )],
        };
        assert_eq!(
            doc.to_markup(),
            r#"<span title="say &quot;hi&quot;">a &lt; b &amp; c</span>"#
        );
    }

    #[test]
    fn serialization_roundtrip_preserves_structure() {
        let doc = Document::parse(STORAGE_SAMPLE);
        let reparsed = Document::parse(&doc.to_markup());
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn void_elements_are_not_closed() {
        let doc = Document::parse("line one<br>line two<img src=\"x.png\">");
        let markup = doc.to_markup();
        assert!(markup.contains("<br>"));
        assert!(!markup.contains("</br>"));
        assert!(!markup.contains("</img>"));
    }

    #[test]
    fn find_descendants_is_document_ordered() {
        let doc = Document::parse("<ul><li>one</li><li>two<ul><li>three</li></ul></li></ul>");
        let list = doc.children[0].as_element().unwrap();
        let items: Vec<String> = list
            .find_descendants(|el| el.name == "li")
            .iter()
            .map(|el| el.text())
            .collect();
        assert_eq!(items, vec!["one", "twothree", "three"]);
    }
}
