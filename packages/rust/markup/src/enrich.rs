//! Requirement marker enrichment.
//!
//! Finds requirement macros in a parsed page, resolves each macro's `key`
//! parameter against the [`RequirementIndex`], and inserts a short definition
//! `<span>` directly after the macro. Markers are never removed or rewritten,
//! and nothing is inserted for keys the index does not know.

use tracing::{debug, info, instrument, warn};

use wikireq_shared::{RawDocument, RequirementIndex, RequirementRecord};

use crate::linearize::single_line;
use crate::tree::{Document, Element, Node};

/// Local tag names that can carry a requirement marker.
const MACRO_TAGS: &[&str] = &["structured-macro", "macro"];

/// Local tag names of macro parameters.
const PARAM_TAGS: &[&str] = &["parameter", "param"];

/// Macro name identifying requirement markers.
const REQUIREMENT_MACRO: &str = "requirement";

/// Parameter carrying the requirement key.
const KEY_PARAM: &str = "key";

/// Class set on inserted definition spans.
pub const DEFINITION_CLASS: &str = "requirement-definition";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Options controlling how definitions are rendered.
#[derive(Debug, Clone, Default)]
pub struct EnrichOptions {
    /// Truncate excerpts longer than this many characters.
    pub excerpt_limit: Option<usize>,
}

/// What happened during one enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichReport {
    /// Requirement markers found in the document.
    pub markers: usize,
    /// Keys that received an inserted definition, in document order.
    pub annotated: Vec<String>,
    /// Keys with no entry in the index, in document order.
    pub unresolved: Vec<String>,
    /// Markers without a usable `key` parameter.
    pub missing_key: usize,
}

/// A document with requirement definitions spliced in.
#[derive(Debug, Clone)]
pub struct EnrichedDocument {
    pub document: Document,
    pub report: EnrichReport,
}

impl EnrichedDocument {
    /// Serialize the enriched tree back to markup.
    pub fn to_markup(&self) -> String {
        self.document.to_markup()
    }
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// Parse `raw` and insert a definition after every resolvable requirement marker.
#[instrument(skip_all, fields(origin = raw.origin.as_deref().unwrap_or("-"), index_len = index.len()))]
pub fn enrich(raw: &RawDocument, index: &RequirementIndex, opts: &EnrichOptions) -> EnrichedDocument {
    if raw.is_blank() {
        warn!("document is empty, nothing to enrich");
        return EnrichedDocument {
            document: Document::default(),
            report: EnrichReport::default(),
        };
    }

    let document = Document::parse(&raw.markup);
    enrich_document(document, index, opts)
}

/// Enrich an already parsed document.
pub fn enrich_document(
    mut document: Document,
    index: &RequirementIndex,
    opts: &EnrichOptions,
) -> EnrichedDocument {
    let mut report = EnrichReport::default();
    annotate_children(&mut document.children, index, opts, &mut report);

    if report.markers == 0 {
        debug!("no requirement markers found");
    }

    info!(
        markers = report.markers,
        annotated = report.annotated.len(),
        unresolved = report.unresolved.len(),
        missing_key = report.missing_key,
        "enrichment complete"
    );

    EnrichedDocument { document, report }
}

/// Whether an element is a requirement macro.
pub fn is_requirement_marker(el: &Element) -> bool {
    MACRO_TAGS.contains(&el.local_name()) && el.attr_local("name") == Some(REQUIREMENT_MACRO)
}

/// The requirement key carried by a marker, if any.
pub fn marker_key(marker: &Element) -> Option<String> {
    find_key_param(&marker.children)
}

fn annotate_children(
    children: &mut Vec<Node>,
    index: &RequirementIndex,
    opts: &EnrichOptions,
    report: &mut EnrichReport,
) {
    let mut i = 0;
    while i < children.len() {
        let mut annotation = None;

        if let Node::Element(el) = &mut children[i] {
            if is_requirement_marker(el) {
                report.markers += 1;
                annotation = resolve_marker(el, index, opts, report);
            }
            // Markers can nest inside another marker's body.
            annotate_children(&mut el.children, index, opts, report);
        }

        if let Some(annotation) = annotation {
            children.insert(i + 1, Node::Element(annotation));
            // Skip over the node we just inserted.
            i += 1;
        }
        i += 1;
    }
}

fn resolve_marker(
    marker: &Element,
    index: &RequirementIndex,
    opts: &EnrichOptions,
    report: &mut EnrichReport,
) -> Option<Element> {
    let Some(key) = marker_key(marker) else {
        warn!("requirement marker has no key parameter");
        report.missing_key += 1;
        return None;
    };

    match index.get(&key) {
        Some(record) => {
            debug!(%key, "adding definition");
            report.annotated.push(key);
            Some(definition_element(record, opts))
        }
        None => {
            warn!(%key, "no definition found for requirement");
            report.unresolved.push(key);
            None
        }
    }
}

fn find_key_param(children: &[Node]) -> Option<String> {
    for (i, node) in children.iter().enumerate() {
        let Node::Element(el) = node else { continue };

        if PARAM_TAGS.contains(&el.local_name()) && el.attr_local("name") == Some(KEY_PARAM) {
            let value = el.text();
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
            // `<param>` is void in HTML, so the parser moves its value to the next sibling.
            if let Some(Node::Text(next)) = children.get(i + 1) {
                let next = next.trim();
                if !next.is_empty() {
                    return Some(next.to_string());
                }
            }
            return None;
        }

        if is_requirement_marker(el) {
            continue;
        }
        if let Some(key) = find_key_param(&el.children) {
            return Some(key);
        }
    }
    None
}

/// Render ` (ORIGIN: EXCERPT)` inside a definition span.
fn definition_element(record: &RequirementRecord, opts: &EnrichOptions) -> Element {
    let origin = if record.origin_title.trim().is_empty() {
        record.key.as_str()
    } else {
        record.origin_title.trim()
    };

    let mut text = format!(" ({origin}");
    // Excerpts are plain text by the time they reach the index.
    let excerpt = single_line(&record.excerpt);
    if !excerpt.is_empty() {
        text.push_str(": ");
        text.push_str(&truncate(&excerpt, opts.excerpt_limit));
    }
    text.push(')');

    Element::new("span")
        .with_attr("class", DEFINITION_CLASS)
        .with_attr("data-requirement-key", record.key.as_str())
        .with_text(text)
}

fn truncate(text: &str, limit: Option<usize>) -> String {
    match limit {
        Some(limit) if text.chars().count() > limit => {
            let cut: String = text.chars().take(limit).collect();
            format!("{}...", cut.trim_end())
        }
        _ => text.to_string(),
    }
}
