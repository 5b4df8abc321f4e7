use kuchiki::NodeRef;
use tracing::{debug, warn};

use crate::config::Limits;
use crate::resource::{ResourceRequest, ResourceResolver};
use crate::types::{plain_text, Block, ConvertedDocument, ResourceRef, RichText, RichTextSpan, Table};

mod classify;
mod dom;
mod inline;
mod lists;
mod resources;
mod table;

pub use classify::{classify, detect_todo, BlockKind, TodoMarker, TodoSignal};
pub use table::table_block;

use classify::strip_todo_marker;
use dom::{attr, flattened_text, is_skippable_tag, is_tag, parse_body, tag_name};
use inline::{plain_rich_text, rich_text, InlineOptions};
use lists::list_blocks;
use resources::{find_resources, resource_block, resource_request};
use table::extract_table;

pub(crate) struct ConvertContext<'a, F>
where
    F: FnMut(&ResourceRequest) -> Option<ResourceRef>,
{
    pub(crate) limits: &'a Limits,
    pub(crate) resolve: &'a mut F,
}

impl<F> ConvertContext<'_, F>
where
    F: FnMut(&ResourceRequest) -> Option<ResourceRef>,
{
    pub(crate) fn inline(&self, flatten_lists: bool) -> InlineOptions {
        InlineOptions {
            max_span_chars: self.limits.max_span_chars,
            flatten_lists,
        }
    }

    /// Resource blocks for the requests that resolved; failures are omitted.
    pub(crate) fn resolve_all<'r, I>(&mut self, requests: I) -> Vec<Block>
    where
        I: IntoIterator<Item = &'r ResourceRequest>,
    {
        requests
            .into_iter()
            .filter_map(|req| (self.resolve)(req).map(|res| resource_block(req, res)))
            .collect()
    }
}

/// Converts page markup without touching any resource: images and
/// attachments are left out.
pub fn html_to_document(html: &str, limits: &Limits) -> ConvertedDocument {
    let mut skip = |_: &ResourceRequest| -> Option<ResourceRef> { None };
    html_to_document_with_resources(html, limits, &mut skip)
}

/// Converts page markup, uploading resources through `resolver`.
pub fn html_to_document_with_resolver(
    html: &str,
    limits: &Limits,
    resolver: &mut ResourceResolver<'_>,
) -> ConvertedDocument {
    let mut resolve = |req: &ResourceRequest| resolver.resolve(req);
    html_to_document_with_resources(html, limits, &mut resolve)
}

/// Converts page markup into blocks and side tables.
///
/// `resolve` is asked for every referenced resource in document order; a
/// `None` answer drops that resource from the output.
pub fn html_to_document_with_resources<F>(
    html: &str,
    limits: &Limits,
    resolve: &mut F,
) -> ConvertedDocument
where
    F: FnMut(&ResourceRequest) -> Option<ResourceRef>,
{
    let body = parse_body(html);
    let mut ctx = ConvertContext { limits, resolve };
    let mut extracted = walk(&body, &mut ctx);

    if extracted.blocks.is_empty() && extracted.tables.is_empty() {
        let text = flattened_text(&body);
        if !text.is_empty() {
            debug!("no structural blocks found, falling back to page text");
            extracted
                .blocks
                .push(Block::paragraph(plain_rich_text(&text, limits.max_span_chars)));
        }
    }

    let mut truncated = 0;
    if extracted.blocks.len() > limits.max_blocks_per_document {
        truncated = extracted.blocks.len() - limits.max_blocks_per_document;
        warn!(
            blocks = extracted.blocks.len(),
            limit = limits.max_blocks_per_document,
            "document truncated"
        );
        extracted.blocks.truncate(limits.max_blocks_per_document);
    }

    ConvertedDocument {
        blocks: extracted.blocks,
        tables: extracted.tables,
        truncated,
    }
}

#[derive(Debug, Default)]
struct Extracted {
    blocks: Vec<Block>,
    tables: Vec<Table>,
}

impl Extracted {
    fn append(&mut self, other: Extracted) {
        self.blocks.extend(other.blocks);
        self.tables.extend(other.tables);
    }
}

fn walk<F>(node: &NodeRef, ctx: &mut ConvertContext<'_, F>) -> Extracted
where
    F: FnMut(&ResourceRequest) -> Option<ResourceRef>,
{
    let mut out = Extracted::default();
    for child in node.children() {
        let Some(tag) = tag_name(&child) else {
            continue;
        };
        if is_skippable_tag(&tag) {
            continue;
        }
        match classify(&child) {
            BlockKind::Heading(level) => {
                let text = rich_text(&child, ctx.inline(false));
                if has_text(&text) {
                    out.blocks.push(Block::Heading { level, text });
                }
            }
            BlockKind::Quote => {
                let text = rich_text(&child, ctx.inline(false));
                if has_text(&text) {
                    out.blocks.push(Block::Quote { text });
                }
            }
            BlockKind::Code => {
                if let Some(block) = code_block(&child, ctx.limits) {
                    out.blocks.push(block);
                }
            }
            BlockKind::List { ordered } => {
                // Lists inside an item belong to that item.
                if child.parent().is_some_and(|p| is_tag(&p, &["li"])) {
                    continue;
                }
                out.blocks.extend(list_blocks(&child, ordered, 1, ctx));
            }
            BlockKind::Table => {
                if let Some(table) = extract_table(&child) {
                    out.tables.push(table);
                }
            }
            BlockKind::ToDo(signal) => {
                let mut text = rich_text(&child, ctx.inline(false));
                strip_todo_marker(&mut text, &signal.marker);
                let found = find_resources(&child, signal.signal_image());
                out.blocks.extend(ctx.resolve_all(&found.leading));
                out.blocks.push(Block::ToDo {
                    checked: signal.checked,
                    text,
                    children: Vec::new(),
                });
                out.blocks.extend(ctx.resolve_all(&found.trailing));
            }
            BlockKind::Paragraph => {
                let text = rich_text(&child, ctx.inline(false));
                let found = find_resources(&child, None);
                out.blocks.extend(ctx.resolve_all(&found.leading));
                if has_text(&text) {
                    out.blocks.push(Block::paragraph(text));
                }
                out.blocks.extend(ctx.resolve_all(&found.trailing));
            }
            BlockKind::Resource => {
                if let Some(request) = resource_request(&child) {
                    out.blocks.extend(ctx.resolve_all([&request]));
                }
            }
            BlockKind::Other => out.append(walk(&child, ctx)),
        }
    }
    out
}

fn has_text(text: &RichText) -> bool {
    !plain_text(text).trim().is_empty()
}

fn code_block(pre: &NodeRef, limits: &Limits) -> Option<Block> {
    let code = pre
        .select("code")
        .ok()
        .and_then(|mut iter| iter.next())
        .map(|code| code.as_node().clone());
    let source = code.as_ref().unwrap_or(pre);
    let text = source.text_contents().replace('\r', "");
    let text = text.trim_matches('\n').trim_end();
    if text.trim().is_empty() {
        return None;
    }
    let hint = code
        .as_ref()
        .and_then(|c| attr(c, "class"))
        .or_else(|| attr(pre, "class"));
    let language = codelang::detect_language(hint.as_deref(), text);
    let spans = crate::chunk::split_spans(vec![RichTextSpan::plain(text)], limits.max_span_chars);
    Some(Block::Code {
        language: language.to_string(),
        text: spans,
    })
}
