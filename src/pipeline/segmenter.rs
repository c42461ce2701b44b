use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::document::Document;

static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b[^>]*>.*?</table>").unwrap());
static DETAILS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<details\b[^>]*>.*?</details>").unwrap());
static FIGURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<figure\b[^>]*>.*?</figure>").unwrap());
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h([1-6])(?:\s[^>]*)?>(.*?)</h([1-6])>").unwrap());
static UL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<ul\b[^>]*>.*?</ul>").unwrap());
static OL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<ol\b[^>]*>.*?</ol>").unwrap());
static BLOCKQUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<blockquote\b[^>]*>(.*?)</blockquote>").unwrap());
static PRE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<pre\b[^>]*>(.*?)</pre>").unwrap());
static IMG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<img\b[^>]*>").unwrap());
static P_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").unwrap());

static DIV_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<div\b[^>]*>").unwrap());
static DIV_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?div\b[^>]*>").unwrap());
static CLASS_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)class\s*=\s*"([^"]*)""#).unwrap());
static LI_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<li\b[^>]*>(.*?)</li>").unwrap());
static CODE_WRAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^\s*<code\b[^>]*>(.*)</code>\s*$").unwrap());
static SRC_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bsrc\s*=\s*"([^"]*)""#).unwrap());
static ALT_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\balt\s*=\s*"([^"]*)""#).unwrap());
static WS_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

// Matcher priority, highest first. Candidates that start at the same offset
// are tie-broken by this order, so a table never loses to the paragraph
// matching the same bytes.
const PRIO_DIRECT_ANSWER: usize = 0;
const PRIO_TABLE: usize = 1;
const PRIO_DETAILS: usize = 2;
const PRIO_CUSTOM_HTML: usize = 3;
const PRIO_FIGURE: usize = 4;
const PRIO_HEADING: usize = 5;
const PRIO_LIST_UNORDERED: usize = 6;
const PRIO_LIST_ORDERED: usize = 7;
const PRIO_BLOCKQUOTE: usize = 8;
const PRIO_CODE_BLOCK: usize = 9;
const PRIO_IMAGE: usize = 10;
const PRIO_PARAGRAPH_TAG: usize = 11;
const PRIO_PARAGRAPH_RUN: usize = 12;

/// Structural classification of a contiguous document region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SegmentKind {
    Table,
    Details,
    DirectAnswerBox,
    CustomHtmlBlock,
    Heading(u8),
    Figure,
    Image,
    ListUnordered,
    ListOrdered,
    Blockquote,
    CodeBlock,
    Paragraph,
    PlainRun,
}

impl SegmentKind {
    pub fn label(&self) -> &'static str {
        match self {
            SegmentKind::Table => "table",
            SegmentKind::Details => "details",
            SegmentKind::DirectAnswerBox => "direct_answer_box",
            SegmentKind::CustomHtmlBlock => "custom_html_block",
            SegmentKind::Heading(_) => "heading",
            SegmentKind::Figure => "figure",
            SegmentKind::Image => "image",
            SegmentKind::ListUnordered => "list_unordered",
            SegmentKind::ListOrdered => "list_ordered",
            SegmentKind::Blockquote => "blockquote",
            SegmentKind::CodeBlock => "code_block",
            SegmentKind::Paragraph => "paragraph",
            SegmentKind::PlainRun => "plain_run",
        }
    }
}

/// Inner structure pulled out of a segment in the per-segment local pass.
/// Opaque kinds (tables, details, custom HTML) stay `None` and pass their
/// raw markup through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Children {
    None,
    /// Inline markup with the enclosing tag stripped.
    Inline(String),
    /// One entry per `<li>`.
    Items(Vec<String>),
    /// Entity-decoded code content.
    Code(String),
    /// Entity-decoded `src`/`alt` attributes.
    Image { src: Option<String>, alt: Option<String> },
}

/// A typed, span-delimited region of the resolved document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub kind: SegmentKind,
    /// Byte span in the document version the segmenter ran against.
    pub span: (usize, usize),
    pub raw: String,
    pub children: Children,
}

struct Candidate {
    start: usize,
    end: usize,
    priority: usize,
    kind: SegmentKind,
    children: Children,
}

/// Segments the resolved document into an ordered, non-overlapping sequence
/// covering every byte.
///
/// All matchers run over the whole document first; nothing is consumed or
/// replaced during collection, so offsets stay valid across patterns. The
/// accepted set is then chosen in one left-to-right sweep: sort by start
/// (ties by matcher priority), keep a candidate only if it starts at or
/// after the previous accepted end. Gaps become [`SegmentKind::PlainRun`].
pub fn segment(document: &Document) -> Vec<Segment> {
    let text = document.text();
    let mut candidates = collect_candidates(text);
    candidates.sort_by(|a, b| a.start.cmp(&b.start).then(a.priority.cmp(&b.priority)));

    let mut segments = Vec::new();
    let mut last_end = 0usize;
    for cand in candidates {
        if cand.start < last_end {
            continue; // overlaps an accepted higher-priority/earlier match
        }
        if cand.start > last_end {
            segments.push(plain_run(text, last_end, cand.start));
        }
        segments.push(Segment {
            kind: cand.kind,
            span: (cand.start, cand.end),
            raw: text[cand.start..cand.end].to_string(),
            children: cand.children,
        });
        last_end = cand.end;
    }
    if last_end < text.len() {
        segments.push(plain_run(text, last_end, text.len()));
    }

    debug!(
        segments = segments.len(),
        bytes = text.len(),
        "segmented document"
    );
    segments
}

fn plain_run(text: &str, start: usize, end: usize) -> Segment {
    Segment {
        kind: SegmentKind::PlainRun,
        span: (start, end),
        raw: text[start..end].to_string(),
        children: Children::None,
    }
}

fn collect_candidates(text: &str) -> Vec<Candidate> {
    let mut out = Vec::new();

    div_candidates(text, &mut out);
    opaque_candidates(text, &TABLE_RE, PRIO_TABLE, SegmentKind::Table, &mut out);
    opaque_candidates(text, &DETAILS_RE, PRIO_DETAILS, SegmentKind::Details, &mut out);
    opaque_candidates(text, &FIGURE_RE, PRIO_FIGURE, SegmentKind::Figure, &mut out);
    heading_candidates(text, &mut out);
    list_candidates(text, &UL_RE, PRIO_LIST_UNORDERED, SegmentKind::ListUnordered, &mut out);
    list_candidates(text, &OL_RE, PRIO_LIST_ORDERED, SegmentKind::ListOrdered, &mut out);

    for caps in BLOCKQUOTE_RE.captures_iter(text) {
        let m = caps.get(0).unwrap();
        out.push(Candidate {
            start: m.start(),
            end: m.end(),
            priority: PRIO_BLOCKQUOTE,
            kind: SegmentKind::Blockquote,
            children: Children::Inline(inline_text(&caps[1])),
        });
    }
    for caps in PRE_RE.captures_iter(text) {
        let m = caps.get(0).unwrap();
        out.push(Candidate {
            start: m.start(),
            end: m.end(),
            priority: PRIO_CODE_BLOCK,
            kind: SegmentKind::CodeBlock,
            children: Children::Code(code_text(&caps[1])),
        });
    }
    for m in IMG_RE.find_iter(text) {
        out.push(Candidate {
            start: m.start(),
            end: m.end(),
            priority: PRIO_IMAGE,
            kind: SegmentKind::Image,
            children: image_children(m.as_str()),
        });
    }
    for caps in P_RE.captures_iter(text) {
        let m = caps.get(0).unwrap();
        out.push(Candidate {
            start: m.start(),
            end: m.end(),
            priority: PRIO_PARAGRAPH_TAG,
            kind: SegmentKind::Paragraph,
            children: Children::Inline(inline_text(&caps[1])),
        });
    }
    paragraph_run_candidates(text, &mut out);

    out
}

fn opaque_candidates(
    text: &str,
    re: &Regex,
    priority: usize,
    kind: SegmentKind,
    out: &mut Vec<Candidate>,
) {
    for m in re.find_iter(text) {
        out.push(Candidate {
            start: m.start(),
            end: m.end(),
            priority,
            kind,
            children: Children::None,
        });
    }
}

fn heading_candidates(text: &str, out: &mut Vec<Candidate>) {
    for caps in HEADING_RE.captures_iter(text) {
        if caps[1] != caps[3] {
            continue; // mismatched close like <h2>..</h5>, not a heading
        }
        let m = caps.get(0).unwrap();
        let level: u8 = caps[1].parse().unwrap_or(1);
        out.push(Candidate {
            start: m.start(),
            end: m.end(),
            priority: PRIO_HEADING,
            kind: SegmentKind::Heading(level),
            children: Children::Inline(inline_text(&caps[2])),
        });
    }
}

fn list_candidates(
    text: &str,
    re: &Regex,
    priority: usize,
    kind: SegmentKind,
    out: &mut Vec<Candidate>,
) {
    for m in re.find_iter(text) {
        let items = LI_RE
            .captures_iter(m.as_str())
            .map(|caps| inline_text(&caps[1]))
            .collect();
        out.push(Candidate {
            start: m.start(),
            end: m.end(),
            priority,
            kind,
            children: Children::Items(items),
        });
    }
}

/// Balanced `<div>…</div>` regions. Regex cannot count nesting, so from each
/// top-level open tag we walk div open/close tokens until depth returns to
/// zero. An unclosed div yields no candidate and falls through to lower
/// priority matchers.
fn div_candidates(text: &str, out: &mut Vec<Candidate>) {
    let mut search_from = 0;
    while let Some(open) = DIV_OPEN_RE.find_at(text, search_from) {
        let start = open.start();
        let mut depth = 0i32;
        let mut end = None;
        for tok in DIV_TOKEN_RE.find_iter(&text[start..]) {
            if tok.as_str().starts_with("</") {
                depth -= 1;
                if depth == 0 {
                    end = Some(start + tok.end());
                    break;
                }
            } else {
                depth += 1;
            }
        }
        let Some(end) = end else {
            search_from = open.end();
            continue;
        };

        let class = CLASS_ATTR_RE
            .captures(open.as_str())
            .map(|caps| caps[1].to_ascii_lowercase())
            .unwrap_or_default();
        let (kind, priority) = if class.contains("direct-answer") {
            (SegmentKind::DirectAnswerBox, PRIO_DIRECT_ANSWER)
        } else {
            (SegmentKind::CustomHtmlBlock, PRIO_CUSTOM_HTML)
        };
        out.push(Candidate {
            start,
            end,
            priority,
            kind,
            children: Children::None,
        });
        search_from = end;
    }
}

/// Bare prose: maximal runs of non-blank lines, trimmed to their
/// non-whitespace extent. Lowest priority, so any markup matcher claiming
/// the same start wins the tie.
fn paragraph_run_candidates(text: &str, out: &mut Vec<Candidate>) {
    let mut pos = 0usize;
    let mut run_start: Option<usize> = None;
    let mut run_end = 0usize;

    let close = |start: Option<usize>, end: usize, out: &mut Vec<Candidate>| {
        if let Some(start) = start {
            let raw = &text[start..end];
            out.push(Candidate {
                start,
                end,
                priority: PRIO_PARAGRAPH_RUN,
                kind: SegmentKind::Paragraph,
                children: Children::Inline(inline_text(raw)),
            });
        }
    };

    for line in text.split_inclusive('\n') {
        let line_start = pos;
        pos += line.len();
        if line.trim().is_empty() {
            close(run_start.take(), run_end, out);
            continue;
        }
        let lead = line.len() - line.trim_start().len();
        if run_start.is_none() {
            run_start = Some(line_start + lead);
        }
        run_end = line_start + line.trim_end().len();
    }
    close(run_start.take(), run_end, out);
}

/// Inline content: surrounding whitespace trimmed, internal whitespace runs
/// collapsed. Inline tags (links, emphasis) are kept; the publishing target
/// accepts inline markup inside headings, paragraphs and list items.
fn inline_text(raw: &str) -> String {
    WS_RUN_RE.replace_all(raw.trim(), " ").into_owned()
}

fn code_text(inner: &str) -> String {
    let inner = match CODE_WRAP_RE.captures(inner) {
        Some(caps) => caps[1].to_string(),
        None => inner.to_string(),
    };
    html_escape::decode_html_entities(&inner).into_owned()
}

fn image_children(tag: &str) -> Children {
    let attr = |re: &Regex| {
        re.captures(tag)
            .map(|caps| html_escape::decode_html_entities(&caps[1]).into_owned())
    };
    Children::Image {
        src: attr(&SRC_ATTR_RE),
        alt: attr(&ALT_ATTR_RE),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn seg(text: &str) -> Vec<Segment> {
        segment(&Document::new(text).unwrap())
    }

    fn kinds(segments: &[Segment]) -> Vec<SegmentKind> {
        segments.iter().map(|s| s.kind).collect()
    }

    /// Non-overlap and full coverage must hold for any input.
    fn assert_invariants(text: &str, segments: &[Segment]) {
        let mut cursor = 0;
        for s in segments {
            assert_eq!(s.span.0, cursor, "gap or overlap before {:?}", s.kind);
            assert!(s.span.1 > s.span.0 || s.raw.is_empty());
            assert_eq!(&text[s.span.0..s.span.1], s.raw);
            cursor = s.span.1;
        }
        assert_eq!(cursor, text.len(), "segments must cover the whole document");
    }

    #[test]
    fn empty_document() {
        assert!(seg("").is_empty());
    }

    #[test]
    fn bare_text_is_paragraph() {
        let segments = seg("Just some intro prose.");
        assert_eq!(kinds(&segments), vec![SegmentKind::Paragraph]);
        assert_eq!(
            segments[0].children,
            Children::Inline("Just some intro prose.".to_string())
        );
    }

    #[test]
    fn table_beats_paragraph_at_same_offset() {
        let text = "<table><tr><td>A</td></tr></table>";
        let segments = seg(text);
        // Both the table matcher and the bare-run paragraph matcher produce a
        // candidate at offset 0; priority decides.
        assert_eq!(segments[0].kind, SegmentKind::Table);
        assert!(!kinds(&segments).contains(&SegmentKind::Paragraph));
        assert_invariants(text, &segments);
    }

    #[test]
    fn heading_levels_in_document_order() {
        let segments = seg("<h2>A</h2><h3>B</h3>");
        assert_eq!(
            kinds(&segments),
            vec![SegmentKind::Heading(2), SegmentKind::Heading(3)]
        );
        assert_eq!(segments[0].children, Children::Inline("A".to_string()));
        assert_eq!(segments[1].children, Children::Inline("B".to_string()));
    }

    #[test]
    fn mismatched_heading_close_falls_through() {
        let segments = seg("<h2>A</h5>");
        assert!(!segments
            .iter()
            .any(|s| matches!(s.kind, SegmentKind::Heading(_))));
        // still classified, just not as a heading
        assert_eq!(kinds(&segments), vec![SegmentKind::Paragraph]);
    }

    #[test]
    fn h7_is_not_a_heading() {
        let segments = seg("<h7>too deep</h7>");
        assert!(!segments
            .iter()
            .any(|s| matches!(s.kind, SegmentKind::Heading(_))));
    }

    #[test]
    fn list_items_extracted() {
        let segments = seg("<ul><li>one</li><li>two <strong>bold</strong></li></ul>");
        assert_eq!(segments[0].kind, SegmentKind::ListUnordered);
        assert_eq!(
            segments[0].children,
            Children::Items(vec![
                "one".to_string(),
                "two <strong>bold</strong>".to_string()
            ])
        );
    }

    #[test]
    fn ordered_list_kind() {
        let segments = seg("<ol><li>first</li></ol>");
        assert_eq!(segments[0].kind, SegmentKind::ListOrdered);
    }

    #[test]
    fn table_inside_prose_stays_table_when_separated() {
        let text = "Intro.\n\n<table><tr><td>1</td></tr></table>\n\nOutro.";
        let segments = seg(text);
        assert_eq!(
            kinds(&segments)
                .into_iter()
                .filter(|k| *k != SegmentKind::PlainRun)
                .collect::<Vec<_>>(),
            vec![
                SegmentKind::Paragraph,
                SegmentKind::Table,
                SegmentKind::Paragraph
            ]
        );
        assert_invariants(text, &segments);
    }

    #[test]
    fn nested_divs_match_balanced() {
        let text = r#"<div class="product"><div class="inner">X</div></div>after"#;
        let segments = seg(text);
        assert_eq!(segments[0].kind, SegmentKind::CustomHtmlBlock);
        assert_eq!(
            segments[0].raw,
            r#"<div class="product"><div class="inner">X</div></div>"#
        );
        assert_invariants(text, &segments);
    }

    #[test]
    fn direct_answer_box_detected() {
        let segments = seg(r#"<div class="direct-answer-box">42</div>"#);
        assert_eq!(segments[0].kind, SegmentKind::DirectAnswerBox);
    }

    #[test]
    fn unclosed_div_falls_through() {
        let segments = seg("<div class=\"broken\">no close tag here");
        assert!(!kinds(&segments).contains(&SegmentKind::CustomHtmlBlock));
    }

    #[test]
    fn details_block_is_opaque() {
        let text = "<details><summary>Q</summary><p>A</p></details>";
        let segments = seg(text);
        assert_eq!(kinds(&segments), vec![SegmentKind::Details]);
        assert_eq!(segments[0].children, Children::None);
        assert_eq!(segments[0].raw, text);
    }

    #[test]
    fn figure_wins_over_inner_image() {
        let text = r#"<figure><img src="a.png" alt="A"><figcaption>A</figcaption></figure>"#;
        let segments = seg(text);
        assert_eq!(kinds(&segments), vec![SegmentKind::Figure]);
    }

    #[test]
    fn standalone_image_attrs() {
        let segments = seg(r#"<img src="hero.png" alt="Tom &amp; Jerry">"#);
        assert_eq!(segments[0].kind, SegmentKind::Image);
        assert_eq!(
            segments[0].children,
            Children::Image {
                src: Some("hero.png".to_string()),
                alt: Some("Tom & Jerry".to_string()),
            }
        );
    }

    #[test]
    fn code_block_entities_decoded() {
        let segments = seg("<pre><code>if a &lt; b {}</code></pre>");
        assert_eq!(segments[0].kind, SegmentKind::CodeBlock);
        assert_eq!(
            segments[0].children,
            Children::Code("if a < b {}".to_string())
        );
    }

    #[test]
    fn blockquote_inline_text() {
        let segments = seg("<blockquote>Buy  it\nnow</blockquote>");
        assert_eq!(segments[0].kind, SegmentKind::Blockquote);
        assert_eq!(
            segments[0].children,
            Children::Inline("Buy it now".to_string())
        );
    }

    #[test]
    fn whitespace_gaps_become_plain_runs() {
        let text = "<h2>T</h2>\n\n<p>body</p>";
        let segments = seg(text);
        assert_eq!(
            kinds(&segments),
            vec![
                SegmentKind::Heading(2),
                SegmentKind::PlainRun,
                SegmentKind::Paragraph
            ]
        );
        assert_eq!(segments[1].raw, "\n\n");
        assert_invariants(text, &segments);
    }

    #[test]
    fn trailing_text_after_markup_is_covered() {
        let text = "<h2>T</h2>tail text";
        let segments = seg(text);
        assert_invariants(text, &segments);
        // The bare-run candidate starting at 0 lost to the heading, so the
        // tail surfaces as a PlainRun rather than disappearing.
        assert_eq!(segments.last().unwrap().kind, SegmentKind::PlainRun);
        assert_eq!(segments.last().unwrap().raw, "tail text");
    }

    #[test]
    fn coverage_on_messy_document() {
        let text = concat!(
            "Intro prose with an <a href=\"https://x.test\">inline link</a>.\n\n",
            "<h2>Specs &amp; Sizing</h2>\n",
            "<table><tr><th>Size</th></tr><tr><td>M</td></tr></table>\n\n",
            "<div class=\"cta\"><p>Act now</p></div>\n",
            "stray closing </li> markup\n\n",
            "<ol><li>step</li></ol>\n"
        );
        let segments = seg(text);
        assert_invariants(text, &segments);
        let ks = kinds(&segments);
        assert!(ks.contains(&SegmentKind::Table));
        assert!(ks.contains(&SegmentKind::Heading(2)));
        assert!(ks.contains(&SegmentKind::CustomHtmlBlock));
        assert!(ks.contains(&SegmentKind::ListOrdered));
    }

    #[test]
    fn resegmentation_is_idempotent() {
        let text = concat!(
            "Opening thoughts.\n\n",
            "<h2>Review</h2>\n\n",
            "<div class=\"product\">Widget</div>\n\n",
            "<table><tr><td>A</td></tr></table>\n\n",
            "<ul><li>pro</li><li>con</li></ul>\n\n",
            "Final words."
        );
        let first = seg(text);
        assert_invariants(text, &first);

        let reassembled: String = first.iter().map(|s| s.raw.as_str()).collect();
        assert_eq!(reassembled, text);

        let second = seg(&reassembled);
        assert_eq!(kinds(&first), kinds(&second));
    }
}
