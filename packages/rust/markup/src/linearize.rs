//! Markup-to-plain-text linearization.
//!
//! Walks the parsed tree, mapping block boundaries to newlines and table
//! cells to ` | `, then runs whitespace cleanup passes so the result can be
//! dropped straight into a language-model prompt.

use std::sync::LazyLock;

use regex::Regex;

use crate::tree::{Document, Node};

/// Elements dropped together with their content.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "head", "noscript", "template"];

/// Inline formatting elements that do not separate words.
const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "cite", "code", "data", "del", "dfn", "em", "font", "i",
    "ins", "kbd", "mark", "q", "s", "samp", "small", "span", "strong", "sub", "sup", "time", "u",
    "var",
];

/// Linearize markup into plain text.
///
/// Input without anything tag-shaped is treated as text already and only
/// gets whitespace cleanup, so a bare `<` in prose survives. Entities are
/// decoded only when the input is parsed as markup.
pub fn linearize(input: &str) -> String {
    if !looks_like_markup(input) {
        return run_passes(input);
    }
    linearize_document(&Document::parse(input))
}

/// Linearize an already parsed document.
pub fn linearize_document(doc: &Document) -> String {
    let mut out = String::new();
    for node in &doc.children {
        write_text(node, &mut out);
    }
    run_passes(&strip_tags(&out))
}

/// Flatten text or a markup fragment to a single line.
pub fn to_inline_text(input: &str) -> String {
    single_line(&linearize(input))
}

/// Flatten a fragment known to be markup (an HTML excerpt or property value)
/// to a single line. Entities are always decoded.
pub fn markup_to_inline_text(fragment: &str) -> String {
    single_line(&linearize_document(&Document::parse(fragment)))
}

/// Collapse every whitespace run, newlines included, into one space.
pub(crate) fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `input` contains an element, end tag, comment or doctype.
fn looks_like_markup(input: &str) -> bool {
    static MARKUP_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"</?[A-Za-z!?][^>]*>").expect("valid regex"));

    MARKUP_RE.is_match(input)
}

fn write_text(node: &Node, out: &mut String) {
    let el = match node {
        Node::Text(text) => {
            out.push_str(text);
            return;
        }
        Node::Comment(_) => return,
        Node::Element(el) => el,
    };

    let name = el.name.as_str();

    if SKIPPED_ELEMENTS.contains(&name) {
        out.push(' ');
        return;
    }

    if name == "br" {
        out.push('\n');
        return;
    }

    let boundary = block_boundary(name);
    // Unknown and macro elements behave like word boundaries.
    let spaced = boundary.is_none() && !INLINE_ELEMENTS.contains(&name);

    if spaced {
        out.push(' ');
    }

    for child in &el.children {
        write_text(child, out);
    }

    match boundary {
        Some(suffix) => out.push_str(suffix),
        None if spaced => out.push(' '),
        None => {}
    }
}

/// What to emit after a structural element closes.
fn block_boundary(name: &str) -> Option<&'static str> {
    match name {
        "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Some("\n\n"),
        "li" | "tr" | "div" | "table" | "ul" | "ol" | "dl" | "dt" | "dd" | "pre"
        | "blockquote" | "section" | "article" | "hr" => Some("\n"),
        "td" | "th" => Some(" | "),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Whitespace passes
// ---------------------------------------------------------------------------

/// Run the whitespace cleanup passes in order.
fn run_passes(text: &str) -> String {
    let mut result = collapse_horizontal_whitespace(text);
    result = trim_around_newlines(&result);
    result = collapse_blank_lines(&result);
    result.trim().to_string()
}

/// Remove tag-shaped runs left in decoded text (`&lt;b&gt;` becomes `<b>`).
fn strip_tags(text: &str) -> String {
    static TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

    TAG_RE.replace_all(text, "").to_string()
}

/// Collapse tabs, NBSPs, CRs and space runs into a single space.
fn collapse_horizontal_whitespace(text: &str) -> String {
    static HSPACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("valid regex"));

    HSPACE_RE.replace_all(text, " ").to_string()
}

/// Remove spaces on either side of a line break.
fn trim_around_newlines(text: &str) -> String {
    static NEWLINE_SPACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r" *\n *").expect("valid regex"));

    NEWLINE_SPACE_RE.replace_all(text, "\n").to_string()
}

/// Allow at most one blank line between blocks.
fn collapse_blank_lines(text: &str) -> String {
    static MULTI_NEWLINE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_NEWLINE_RE.replace_all(text, "\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_normalized(text: &str) {
        assert!(!text.contains("\n\n\n"), "3+ newlines in {text:?}");
        assert!(!text.contains('\t'), "tab in {text:?}");
        assert!(!text.contains("  "), "double space in {text:?}");
        assert_eq!(text, text.trim());
    }

    #[test]
    fn paragraphs_and_headings_become_blocks() {
        let text = linearize("<h1>Title</h1><p>First paragraph.</p><p>Second.</p>");
        assert_eq!(text, "Title\n\nFirst paragraph.\n\nSecond.");
    }

    #[test]
    fn list_items_and_breaks_become_lines() {
        let text = linearize("<ul><li>one</li><li>two</li></ul>line<br/>break");
        assert_eq!(text, "one\ntwo\n\nline\nbreak");
    }

    #[test]
    fn table_cells_are_separated() {
        let text = linearize(
            "<table><tr><th>Field</th><th>Rule</th></tr><tr><td>Name</td><td>required</td></tr></table>",
        );
        assert_eq!(text, "Field | Rule |\nName | required |");
    }

    #[test]
    fn script_and_style_are_dropped() {
        let text = linearize(
            "<style>p { color: red }</style><p>kept</p><script>alert('x')</script>",
        );
        assert_eq!(text, "kept");
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(linearize("<p>A &amp; B&nbsp;&nbsp;C</p>"), "A & B C");
    }

    #[test]
    fn inline_formatting_does_not_split_words() {
        assert_eq!(linearize("<p>re<b>quire</b>ment</p>"), "requirement");
    }

    #[test]
    fn macros_are_word_boundaries() {
        let text = linearize(
            r#"<p>Actor<ac:structured-macro ac:name="requirement"><ac:parameter ac:name="key">ACT-1</ac:parameter></ac:structured-macro>acts</p>"#,
        );
        assert_eq!(text, "Actor ACT-1 acts");
    }

    #[test]
    fn whitespace_is_normalized() {
        let text = linearize("  <div>a\t\tb   c</div>\n\n\n\n<div>  d </div>\r\n");
        assert_eq!(text, "a b c\n\nd");
        assert_normalized(&text);
    }

    #[test]
    fn plain_text_is_identity_modulo_whitespace() {
        let input = "Use case: cancel request\n\nThe expert  may cancel.\tOnly once.";
        let once = linearize(input);
        assert_eq!(once, "Use case: cancel request\n\nThe expert may cancel. Only once.");
        assert_eq!(linearize(&once), once);
    }

    #[test]
    fn linearize_is_idempotent_on_markup_output() {
        let once = linearize(
            "<h2>Flow</h2><ol><li>Open</li><li>Submit</li></ol><table><tr><td>a</td><td>b</td></tr></table>",
        );
        assert_eq!(linearize(&once), once);
        assert_normalized(&once);
    }

    #[test]
    fn malformed_markup_still_linearizes() {
        let text = linearize("<p>unclosed <b>bold<div>block</p></span>tail");
        assert!(text.contains("unclosed"));
        assert!(text.contains("bold"));
        assert!(text.contains("block"));
        assert!(text.contains("tail"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn inline_text_is_single_line() {
        assert_eq!(
            to_inline_text("<ul><li>Name:</li><li>  required </li></ul>"),
            "Name: required"
        );
        assert_eq!(to_inline_text(""), "");
    }

    #[test]
    fn encoded_tags_do_not_survive() {
        let once = linearize("<p>Enter &lt;national-id&gt; in the field</p>");
        assert_eq!(once, "Enter in the field");
        assert_eq!(linearize(&once), once);
    }

    #[test]
    fn bare_angle_brackets_in_prose_are_kept() {
        assert_eq!(linearize("if a<b then stop"), "if a<b then stop");
        assert_eq!(linearize("x < y and y > z"), "x < y and y > z");
        assert_eq!(to_inline_text("x<y\n  z"), "x<y z");
    }

    #[test]
    fn escaped_comparison_in_markup_is_decoded() {
        assert_eq!(linearize("<p>amount &lt; 100</p>"), "amount < 100");
        assert_eq!(markup_to_inline_text("x&lt;y"), "x<y");
    }

    #[test]
    fn output_is_stable_and_tag_free() {
        let inputs = [
            "<p>Enter &lt;national-id&gt; in the field</p>",
            "<p>a &lt; b</p><p>c &gt; d</p>",
            "<li>&lt;b&gt;bold&lt;/b&gt; if a<b</li>",
            "<td>&lt;</td><td>&gt;</td>",
            "<p>&amp;lt;x&amp;gt; stays encoded</p>",
            "<p>1 &lt;2</p> <b>3</b>&gt; 4",
            "plain a<b with no tags",
            "<!-- note --><p>x</p>",
        ];

        for input in inputs {
            let once = linearize(input);
            assert_eq!(linearize(&once), once, "not idempotent for {input:?}");
            assert!(!looks_like_markup(&once), "tag in {once:?} from {input:?}");
            assert_normalized(&once);
        }
    }

    #[test]
    fn encoded_tags_leave_no_angle_brackets() {
        for input in [
            "<p>Enter &lt;national-id&gt; in the field</p>",
            "<p>&lt;script&gt;alert(1)&lt;/script&gt;</p>",
            "<div>&lt;ac:link&gt;&lt;ri:page/&gt;&lt;/ac:link&gt;</div>",
        ] {
            let once = linearize(input);
            assert!(!once.contains('<'), "'<' in {once:?}");
            assert!(!once.contains('>'), "'>' in {once:?}");
            assert_eq!(linearize(&once), once);
        }
    }

    #[test]
    fn passes_collapse_blank_lines() {
        assert_eq!(run_passes("a\n \n \n \nb"), "a\n\nb");
    }
}
