use kuchiki::NodeRef;

use crate::chunk::split_spans;
use crate::links::{is_internal_link, UNRESOLVED_LINK_MARKER};
use crate::types::{Annotations, RichText, RichTextSpan};

use super::dom::{attr, clean_invisible, collapse_whitespace, flattened_text, is_skippable_tag};

#[derive(Debug, Clone, Copy)]
pub(crate) struct InlineOptions {
    pub(crate) max_span_chars: usize,
    /// Fold nested `ul`/`ol` content into the text instead of skipping it.
    pub(crate) flatten_lists: bool,
}

/// Builds the rich text of an element's subtree. Never returns an empty list.
pub(crate) fn rich_text(node: &NodeRef, opts: InlineOptions) -> RichText {
    let mut raw = Vec::new();
    let base = element_annotations(node, Annotations::default());
    for child in node.children() {
        collect_spans(&child, base, opts, &mut raw);
    }
    finish_spans(raw, opts.max_span_chars)
}

pub(crate) fn plain_rich_text(text: &str, max_span_chars: usize) -> RichText {
    finish_spans(vec![RichTextSpan::plain(text)], max_span_chars)
}

fn collect_spans(node: &NodeRef, style: Annotations, opts: InlineOptions, out: &mut RichText) {
    if let Some(text) = node.as_text() {
        let text = collapse_whitespace(&clean_invisible(&text.borrow()));
        if !text.is_empty() {
            out.push(RichTextSpan::styled(text, style));
        }
        return;
    }
    let Some(el) = node.as_element() else {
        return;
    };
    let tag = el.name.local.to_lowercase();
    match tag.as_str() {
        t if is_skippable_tag(t) => {}
        "img" | "object" | "input" => {}
        "br" => out.push(RichTextSpan::styled("\n", style)),
        "ul" | "ol" if !opts.flatten_lists => {}
        "li" => {
            out.push(RichTextSpan::styled("\n", style));
            let style = element_annotations(node, style);
            for child in node.children() {
                collect_spans(&child, style, opts, out);
            }
        }
        "a" => {
            let style = element_annotations(node, style);
            let href = attr(node, "href")
                .map(|h| h.trim().to_string())
                .filter(|h| is_linkable(h));
            let Some(href) = href else {
                for child in node.children() {
                    collect_spans(&child, style, opts, out);
                }
                return;
            };
            let mut label = flattened_text(node);
            if label.is_empty() {
                label = href.clone();
            }
            if is_internal_link(&href) {
                label.push_str(UNRESOLVED_LINK_MARKER);
            }
            out.push(RichTextSpan::linked(label, href, style));
        }
        _ => {
            let style = element_annotations(node, style);
            for child in node.children() {
                collect_spans(&child, style, opts, out);
            }
        }
    }
}

fn is_linkable(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    !(href.is_empty() || href.starts_with('#') || lower.starts_with("javascript:"))
}

/// Annotations in effect inside `node`: the inherited set plus whatever the
/// tag and its inline `style` add.
pub(crate) fn element_annotations(node: &NodeRef, inherited: Annotations) -> Annotations {
    let Some(el) = node.as_element() else {
        return inherited;
    };
    let tag = el.name.local.to_lowercase();
    let mut ann = inherited.merge(tag_annotations(&tag));
    if let Some(style) = attr(node, "style") {
        ann = ann.merge(css_annotations(&style));
    }
    ann
}

fn tag_annotations(tag: &str) -> Annotations {
    let mut ann = Annotations::default();
    match tag {
        "strong" | "b" => ann.bold = true,
        "em" | "i" => ann.italic = true,
        "u" => ann.underline = true,
        "s" | "strike" | "del" => ann.strikethrough = true,
        "code" | "kbd" | "samp" => ann.code = true,
        _ => {}
    }
    ann
}

pub(crate) fn css_annotations(style: &str) -> Annotations {
    let mut ann = Annotations::default();
    for decl in style.split(';') {
        let Some((prop, value)) = decl.split_once(':') else {
            continue;
        };
        let prop = prop.trim().to_ascii_lowercase();
        let value = value.trim().to_ascii_lowercase();
        match prop.as_str() {
            "font-weight" => {
                let numeric = value.parse::<u32>().ok();
                if value == "bold" || value == "bolder" || numeric.is_some_and(|w| w >= 700) {
                    ann.bold = true;
                }
            }
            "font-style" => {
                if value.contains("italic") || value.contains("oblique") {
                    ann.italic = true;
                }
            }
            "text-decoration" | "text-decoration-line" => {
                if value.contains("underline") {
                    ann.underline = true;
                }
                if value.contains("line-through") {
                    ann.strikethrough = true;
                }
            }
            _ => {}
        }
    }
    ann
}

/// Merges, trims and splits raw spans into their final shape.
///
/// Whitespace-only spans are dropped; when one sat between two kept spans
/// its separator is carried onto the end of the preceding span.
pub(crate) fn finish_spans(raw: RichText, max_span_chars: usize) -> RichText {
    let merged = merge_adjacent(raw);

    let mut kept: RichText = Vec::with_capacity(merged.len());
    let mut pending: Option<char> = None;
    for mut span in merged {
        if span.content.trim().is_empty() {
            let sep = if span.content.contains('\n') { '\n' } else { ' ' };
            pending = match pending {
                Some('\n') => Some('\n'),
                _ => Some(sep),
            };
            continue;
        }
        match (pending.take(), kept.last_mut()) {
            (Some(sep), Some(prev)) => {
                let trimmed = prev.content.trim_end().len();
                prev.content.truncate(trimmed);
                prev.content.push(sep);
                span.content = span.content.trim_start().to_string();
            }
            (None, Some(prev)) if prev.content.ends_with(char::is_whitespace) => {
                span.content = span.content.trim_start().to_string();
            }
            _ => {}
        }
        kept.push(span);
    }

    let mut spans = merge_adjacent(kept);
    for span in &mut spans {
        span.content = tidy_spaces(&span.content);
    }
    if let Some(first) = spans.first_mut() {
        first.content = first.content.trim_start().to_string();
    }
    if let Some(last) = spans.last_mut() {
        last.content = last.content.trim_end().to_string();
    }
    spans.retain(|s| !s.content.is_empty());

    let spans = split_spans(spans, max_span_chars);
    if spans.is_empty() {
        vec![RichTextSpan::plain("")]
    } else {
        spans
    }
}

fn merge_adjacent(spans: RichText) -> RichText {
    let mut out: RichText = Vec::with_capacity(spans.len());
    for span in spans {
        match out.last_mut() {
            Some(prev) if prev.same_style(&span) => prev.content.push_str(&span.content),
            _ => out.push(span),
        }
    }
    out
}

/// Collapses space runs left by merging and drops spaces around line breaks.
fn tidy_spaces(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            ' ' if out.ends_with(' ') || out.ends_with('\n') => {}
            '\n' => {
                while out.ends_with(' ') {
                    out.pop();
                }
                out.push('\n');
            }
            _ => out.push(ch),
        }
    }
    out
}
