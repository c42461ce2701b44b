use serde::Serialize;

use super::segmenter::{Children, Segment, SegmentKind};

/// Publishing-target output node, one per segment. Blocks own their content
/// outright; nothing borrows back into the document or segment list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Table { raw: String },
    Details { raw: String },
    DirectAnswerBox { raw: String },
    CustomHtml { raw: String },
    Heading { level: u8, text: String },
    Figure { raw: String },
    Image { src: Option<String>, alt: Option<String> },
    ListUnordered { items: Vec<String> },
    ListOrdered { items: Vec<String> },
    Blockquote { text: String },
    CodeBlock { code: String },
    Paragraph { text: String },
    PlainText { text: String },
}

impl Block {
    pub fn label(&self) -> &'static str {
        match self {
            Block::Table { .. } => "table",
            Block::Details { .. } => "details",
            Block::DirectAnswerBox { .. } => "direct_answer_box",
            Block::CustomHtml { .. } => "custom_html",
            Block::Heading { .. } => "heading",
            Block::Figure { .. } => "figure",
            Block::Image { .. } => "image",
            Block::ListUnordered { .. } => "list_unordered",
            Block::ListOrdered { .. } => "list_ordered",
            Block::Blockquote { .. } => "blockquote",
            Block::CodeBlock { .. } => "code_block",
            Block::Paragraph { .. } => "paragraph",
            Block::PlainText { .. } => "plain_text",
        }
    }
}

/// Maps segments 1:1 onto blocks, in order. Pure and total: the only
/// segments that produce nothing are whitespace-only [`SegmentKind::PlainRun`]s,
/// which have no publishable content. Never reorders, merges or splits.
pub fn emit(segments: &[Segment]) -> Vec<Block> {
    segments.iter().filter_map(block_for).collect()
}

fn block_for(segment: &Segment) -> Option<Block> {
    let raw = || segment.raw.trim().to_string();
    let inline = || match &segment.children {
        Children::Inline(text) => text.clone(),
        _ => segment.raw.trim().to_string(),
    };

    match segment.kind {
        SegmentKind::Table => Some(Block::Table { raw: raw() }),
        SegmentKind::Details => Some(Block::Details { raw: raw() }),
        SegmentKind::DirectAnswerBox => Some(Block::DirectAnswerBox { raw: raw() }),
        SegmentKind::CustomHtmlBlock => Some(Block::CustomHtml { raw: raw() }),
        SegmentKind::Heading(level) => Some(Block::Heading {
            level,
            text: inline(),
        }),
        SegmentKind::Figure => Some(Block::Figure { raw: raw() }),
        SegmentKind::Image => match &segment.children {
            Children::Image { src, alt } => Some(Block::Image {
                src: src.clone(),
                alt: alt.clone(),
            }),
            _ => Some(Block::Image {
                src: None,
                alt: None,
            }),
        },
        SegmentKind::ListUnordered | SegmentKind::ListOrdered => {
            let items = match &segment.children {
                Children::Items(items) => items.clone(),
                _ => Vec::new(),
            };
            if segment.kind == SegmentKind::ListOrdered {
                Some(Block::ListOrdered { items })
            } else {
                Some(Block::ListUnordered { items })
            }
        }
        SegmentKind::Blockquote => Some(Block::Blockquote { text: inline() }),
        SegmentKind::CodeBlock => {
            let code = match &segment.children {
                Children::Code(code) => code.clone(),
                _ => segment.raw.clone(),
            };
            Some(Block::CodeBlock { code })
        }
        SegmentKind::Paragraph => Some(Block::Paragraph { text: inline() }),
        SegmentKind::PlainRun => {
            let text = segment.raw.trim();
            if text.is_empty() {
                None // pure-whitespace gap, nothing to publish
            } else {
                Some(Block::PlainText {
                    text: text.to_string(),
                })
            }
        }
    }
}

// ── Tests ──
