use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::Limits;
use crate::types::{rich_text_len, Block, RichText, RichTextSpan};

/// Cuts a span into pieces of at most `limit` characters, never inside a
/// grapheme cluster. Pieces keep the link and annotations of the original.
pub fn split_span(span: &RichTextSpan, limit: usize) -> Vec<RichTextSpan> {
    let limit = limit.max(1);
    if span.char_len() <= limit {
        return vec![span.clone()];
    }
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for grapheme in span.content.graphemes(true) {
        let len = grapheme.chars().count();
        if current_len + len > limit && !current.is_empty() {
            pieces.push(RichTextSpan {
                content: std::mem::take(&mut current),
                ..span.clone()
            });
            current_len = 0;
        }
        current.push_str(grapheme);
        current_len += len;
    }
    if !current.is_empty() {
        pieces.push(RichTextSpan {
            content: current,
            ..span.clone()
        });
    }
    pieces
}

pub fn split_spans(spans: RichText, limit: usize) -> RichText {
    spans
        .iter()
        .flat_map(|span| split_span(span, limit))
        .collect()
}

/// Brings a block sequence within the destination's structural limits.
///
/// Oversized spans are cut, blocks whose text exceeds the per-block character
/// or span count are split into consecutive blocks of the same kind (the last
/// piece keeps any children), and the result is capped to the per-document
/// block count.
pub fn validate(blocks: Vec<Block>, limits: &Limits) -> Vec<Block> {
    validate_counted(blocks, limits).0
}

/// Like [`validate`], also returning how many blocks the cap dropped.
pub fn validate_counted(blocks: Vec<Block>, limits: &Limits) -> (Vec<Block>, usize) {
    let mut out: Vec<Block> = blocks
        .into_iter()
        .flat_map(|block| split_block(block, limits))
        .collect();
    if out.len() > limits.max_blocks_per_document {
        warn!(
            blocks = out.len(),
            limit = limits.max_blocks_per_document,
            "truncating validated blocks"
        );
        let dropped = out.len() - limits.max_blocks_per_document;
        out.truncate(limits.max_blocks_per_document);
        return (out, dropped);
    }
    (out, 0)
}

pub fn split_block(mut block: Block, limits: &Limits) -> Vec<Block> {
    if let Some(children) = block.children_mut() {
        let nested = std::mem::take(children);
        *children = nested
            .into_iter()
            .flat_map(|child| split_block(child, limits))
            .collect();
    }
    let piece_limit = limits.max_span_chars.min(limits.max_block_chars).max(1);
    if let Block::Table(table) = &mut block {
        for cell in table.rows.iter_mut().flat_map(|row| row.cells.iter_mut()) {
            *cell = split_spans(std::mem::take(cell), piece_limit);
        }
        return vec![block];
    }
    let Some(text) = block.rich_text_mut() else {
        return vec![block];
    };
    let spans = split_spans(std::mem::take(text), piece_limit);
    if rich_text_len(&spans) <= limits.max_block_chars && spans.len() <= limits.max_spans_per_block
    {
        *text = spans;
        return vec![block];
    }

    let max_spans = limits.max_spans_per_block.max(1);
    let mut groups: Vec<RichText> = Vec::new();
    let mut current: RichText = Vec::new();
    let mut current_len = 0usize;
    for span in spans {
        let len = span.char_len();
        if !current.is_empty()
            && (current_len + len > limits.max_block_chars || current.len() >= max_spans)
        {
            groups.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current_len += len;
        current.push(span);
    }
    if !current.is_empty() {
        groups.push(current);
    }

    let children = block.children_mut().map(std::mem::take).unwrap_or_default();
    let mut out: Vec<Block> = groups.into_iter().map(|g| block.with_text(g)).collect();
    if let Some(last) = out.last_mut().and_then(Block::children_mut) {
        *last = children;
    }
    out
}
