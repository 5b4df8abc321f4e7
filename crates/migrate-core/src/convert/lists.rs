use kuchiki::NodeRef;

use crate::resource::ResourceRequest;
use crate::types::{plain_text, Block, ResourceRef};

use super::classify::{detect_todo, strip_todo_marker};
use super::dom::{element_children, is_tag};
use super::inline::rich_text;
use super::resources::find_resources;
use super::ConvertContext;

/// Converts a `ul`/`ol` at `depth` (1 for a top-level list) into items.
///
/// Items below the depth cap carry nested lists as children; at the cap the
/// nested content is folded into the item's own text.
pub(crate) fn list_blocks<F>(
    list: &NodeRef,
    ordered: bool,
    depth: usize,
    ctx: &mut ConvertContext<'_, F>,
) -> Vec<Block>
where
    F: FnMut(&ResourceRequest) -> Option<ResourceRef>,
{
    let mut items = Vec::new();
    let at_cap = depth >= ctx.limits.max_list_depth;
    for li in element_children(list).filter(|c| is_tag(c, &["li"])) {
        let mut text = rich_text(&li, ctx.inline(at_cap));
        let todo = detect_todo(&li);
        if let Some(signal) = &todo {
            strip_todo_marker(&mut text, &signal.marker);
        }

        let found = find_resources(&li, todo.as_ref().and_then(|t| t.signal_image()));
        let mut children = ctx.resolve_all(found.leading.iter().chain(&found.trailing));
        if !at_cap {
            for nested in nested_lists(&li) {
                let nested_ordered = is_tag(&nested, &["ol"]);
                children.extend(list_blocks(&nested, nested_ordered, depth + 1, ctx));
            }
        }

        if plain_text(&text).trim().is_empty() && children.is_empty() {
            continue;
        }
        let item = match todo {
            Some(signal) => Block::ToDo {
                checked: signal.checked,
                text,
                children,
            },
            None if ordered => Block::NumberedListItem { text, children },
            None => Block::BulletedListItem { text, children },
        };
        items.push(item);
    }
    items
}

/// Lists owned by `li`: the nearest `ul`/`ol` descendants not inside another
/// list or list item.
fn nested_lists(li: &NodeRef) -> Vec<NodeRef> {
    fn walk(node: &NodeRef, out: &mut Vec<NodeRef>) {
        for child in element_children(node) {
            if is_tag(&child, &["ul", "ol"]) {
                out.push(child);
            } else if !is_tag(&child, &["li"]) {
                walk(&child, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(li, &mut out);
    out
}
