//! Tolerant scanning of the remote weather pages.
//!
//! The ARSO text products are flat, old-fashioned HTML: a run of `<h2>`
//! section headings with `<p>` paragraphs between them, and an
//! observation table made of `<td>` cells. This module does not try to
//! be a general parser; it scans case-insensitively for the handful of
//! tags the products use and turns them into a flat sibling run that
//! [`crate::report`] walks. Whitespace is collapsed and entities are
//! decoded so downstream formatting sees plain text.

use html_escape::decode_html_entities;

/// Tag class of one node in a sibling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTag {
    /// `<h2>` section heading.
    Heading,
    /// `<p>` paragraph.
    Paragraph,
    /// Any other block element that breaks a run (`<hr>`, lists, tables).
    Other,
}

/// One document node: its tag class and its immediate text content.
#[derive(Debug, Clone)]
pub struct ReportNode {
    pub tag: NodeTag,
    pub text: String,
}

/// Scans `html` into the flat sibling run of report nodes, in document
/// order. Headings and paragraphs carry their immediate text (the text
/// before any nested markup — matching the paragraph-per-update layout
/// of the source reports); break elements carry an empty string.
#[must_use]
pub fn sibling_run(html: &str) -> Vec<ReportNode> {
    let lower = html.to_ascii_lowercase();
    let mut nodes = Vec::new();
    let mut pos = 0;

    while let Some((tag, open_at)) = next_open(&lower, pos) {
        let Some(body_at) = lower[open_at..].find('>').map(|i| open_at + i + 1) else {
            break;
        };
        if tag == NodeTag::Other {
            nodes.push(ReportNode {
                tag,
                text: String::new(),
            });
            pos = body_at;
            continue;
        }
        let close = match tag {
            NodeTag::Heading => "</h2>",
            _ => "</p>",
        };
        // An unclosed element runs until the next recognized block, so
        // a close tag found beyond the next block belongs to someone else.
        let close_at = lower[body_at..].find(close).map(|i| body_at + i);
        let next_at = next_open(&lower, body_at).map(|(_, at)| at);
        let (inner_end, resume) = match (close_at, next_at) {
            (Some(c), Some(n)) if n < c => (n, n),
            (Some(c), _) => (c, c + close.len()),
            (None, Some(n)) => (n, n),
            (None, None) => (html.len(), html.len()),
        };
        nodes.push(ReportNode {
            tag,
            text: immediate_text(&html[body_at..inner_end]),
        });
        pos = resume;
    }
    nodes
}

/// Extracts the text of every `<td>` cell, in document order. Nested
/// markup inside a cell is stripped but its text is kept, so cells that
/// wrap their content in links still match plain station names.
#[must_use]
pub fn table_cells(html: &str) -> Vec<String> {
    let lower = html.to_ascii_lowercase();
    let mut cells = Vec::new();
    let mut pos = 0;

    while let Some(open_at) = find_open(&lower, "td", pos) {
        let Some(body_at) = lower[open_at..].find('>').map(|i| open_at + i + 1) else {
            break;
        };
        let inner_end = lower[body_at..]
            .find("</td>")
            .map_or_else(|| html.len(), |i| body_at + i);
        cells.push(stripped_text(&html[body_at..inner_end]));
        pos = inner_end;
    }
    cells
}

fn next_open(lower: &str, from: usize) -> Option<(NodeTag, usize)> {
    let mut pos = from;
    while let Some(at) = lower[pos..].find('<').map(|i| pos + i) {
        if let Some(tag) = open_tag(&lower[at + 1..]) {
            return Some((tag, at));
        }
        pos = at + 1;
    }
    None
}

fn open_tag(rest: &str) -> Option<NodeTag> {
    const BREAKS: &[&str] = &["hr", "ul", "ol", "table"];

    if rest.starts_with("h2") && at_boundary(rest, 2) {
        return Some(NodeTag::Heading);
    }
    if rest.starts_with('p') && at_boundary(rest, 1) {
        return Some(NodeTag::Paragraph);
    }
    for name in BREAKS {
        if rest.starts_with(name) && at_boundary(rest, name.len()) {
            return Some(NodeTag::Other);
        }
    }
    None
}

fn find_open(lower: &str, name: &str, from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(at) = lower[pos..].find('<').map(|i| pos + i) {
        let rest = &lower[at + 1..];
        if rest.starts_with(name) && at_boundary(rest, name.len()) {
            return Some(at);
        }
        pos = at + 1;
    }
    None
}

/// True when the byte after a candidate tag name ends the name, so
/// `<p ` and `<p>` match but `<pre>` does not.
fn at_boundary(rest: &str, len: usize) -> bool {
    matches!(
        rest.as_bytes().get(len),
        Some(b'>' | b' ' | b'\t' | b'\r' | b'\n' | b'/')
    )
}

/// Text before the first nested tag, entity-decoded, whitespace-collapsed.
fn immediate_text(raw: &str) -> String {
    let head = raw.split('<').next().unwrap_or("");
    collapse_ws(&decode_html_entities(head))
}

/// All text with nested tags removed, entity-decoded, whitespace-collapsed.
fn stripped_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    collapse_ws(&decode_html_entities(&out))
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORECAST_PAGE: &str = r#"
        <html><body>
        <p class="title">NAPOVED ZA SLOVENIJO</p>
        <h2>Danes</h2>
        <p>Zjutraj bo megla,   popoldne jasno.</p>
        <p>Veter bo &scaron;ibak.</p>
        <h2>Jutri</h2>
        <P>Delno obla&#269;no.</P>
        <hr>
        <p>Opomba pod crto.</p>
        </body></html>"#;

    #[test]
    fn scans_headings_and_paragraphs_in_order() {
        let nodes = sibling_run(FORECAST_PAGE);
        let tags: Vec<NodeTag> = nodes.iter().map(|n| n.tag).collect();
        assert_eq!(
            tags,
            vec![
                NodeTag::Paragraph,
                NodeTag::Heading,
                NodeTag::Paragraph,
                NodeTag::Paragraph,
                NodeTag::Heading,
                NodeTag::Paragraph,
                NodeTag::Other,
                NodeTag::Paragraph,
            ]
        );
        assert_eq!(nodes[0].text, "NAPOVED ZA SLOVENIJO");
        assert_eq!(nodes[1].text, "Danes");
    }

    #[test]
    fn decodes_entities_and_collapses_whitespace() {
        let nodes = sibling_run(FORECAST_PAGE);
        assert_eq!(nodes[2].text, "Zjutraj bo megla, popoldne jasno.");
        assert_eq!(nodes[3].text, "Veter bo šibak.");
        assert_eq!(nodes[5].text, "Delno oblačno.");
    }

    #[test]
    fn nested_markup_yields_only_immediate_text() {
        let nodes = sibling_run("<p>pred <b>krepko</b> za</p>");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].text, "pred");
    }

    #[test]
    fn unclosed_paragraph_runs_to_next_block() {
        let nodes = sibling_run("<p>prvi odstavek<p>drugi odstavek</p>");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].text, "prvi odstavek");
        assert_eq!(nodes[1].text, "drugi odstavek");
    }

    #[test]
    fn pre_tag_is_not_a_paragraph() {
        let nodes = sibling_run("<pre>surovo</pre><p>odstavek</p>");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].tag, NodeTag::Paragraph);
    }

    #[test]
    fn table_cells_in_document_order() {
        let html = r##"<table>
            <tr><td>Ljubljana</td><td>10:00</td><td><a href="#">jasno</a></td><td>21</td></tr>
            <tr><td>Kredarica</td><td>10:00</td><td>megla</td><td>3</td></tr>
        </table>"##;
        let cells = table_cells(html);
        assert_eq!(
            cells,
            vec!["Ljubljana", "10:00", "jasno", "21", "Kredarica", "10:00", "megla", "3"]
        );
    }

    #[test]
    fn empty_cell_contributes_empty_string() {
        assert_eq!(table_cells("<td></td><td>x</td>"), vec!["", "x"]);
    }
}
