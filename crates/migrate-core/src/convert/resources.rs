use kuchiki::NodeRef;

use crate::resource::{ResourceKind, ResourceRequest};
use crate::types::{Block, ResourceRef};

use super::dom::{first_attr, flattened_text, is_tag, tag_name};

const RESOURCE_PATH: &str = "/onenote/resources/";

pub(crate) fn is_resource_href(href: Option<&str>) -> bool {
    href.is_some_and(|h| h.to_ascii_lowercase().contains(RESOURCE_PATH))
}

/// The resource an element references, if any. Inline `data:` URLs are ignored.
pub(crate) fn resource_request(node: &NodeRef) -> Option<ResourceRequest> {
    let tag = tag_name(node)?;
    let request = match tag.as_str() {
        "img" => ResourceRequest {
            url: first_attr(node, &["data-fullres-src", "src", "data-src"])?,
            kind: ResourceKind::Image,
            name_hint: None,
        },
        "object" => ResourceRequest {
            url: first_attr(node, &["data", "data-fullres-src"])?,
            kind: ResourceKind::Object {
                declared_type: first_attr(node, &["type"]),
            },
            name_hint: first_attr(node, &["data-attachment"]),
        },
        "a" => {
            let href = first_attr(node, &["href"])?;
            if !is_resource_href(Some(&href)) {
                return None;
            }
            let label = flattened_text(node);
            let name_hint =
                (!label.is_empty() && !label.eq_ignore_ascii_case("download")).then_some(label);
            ResourceRequest {
                url: href,
                kind: ResourceKind::File,
                name_hint,
            }
        }
        _ => return None,
    };
    if request.url.to_ascii_lowercase().starts_with("data:") {
        return None;
    }
    Some(request)
}

/// Resources of a paragraph or list item, in document order, split into the
/// ones that precede any text and the ones after.
#[derive(Debug, Default)]
pub(crate) struct FoundResources {
    pub(crate) leading: Vec<ResourceRequest>,
    pub(crate) trailing: Vec<ResourceRequest>,
}

/// Walks `node` for resources. Nested lists are left to their own items and
/// `skip` (a to-do's signal image) is never collected.
pub(crate) fn find_resources(node: &NodeRef, skip: Option<&NodeRef>) -> FoundResources {
    let mut found = FoundResources::default();
    let mut seen_text = false;
    for child in node.children() {
        walk(&child, skip, &mut seen_text, &mut found);
    }
    found
}

fn walk(node: &NodeRef, skip: Option<&NodeRef>, seen_text: &mut bool, found: &mut FoundResources) {
    if let Some(text) = node.as_text() {
        if !text.borrow().trim().is_empty() {
            *seen_text = true;
        }
        return;
    }
    if node.as_element().is_none() || is_tag(node, &["ul", "ol"]) {
        return;
    }
    if skip.is_some_and(|s| s == node) {
        return;
    }
    if let Some(request) = resource_request(node) {
        if *seen_text {
            found.trailing.push(request);
        } else {
            found.leading.push(request);
        }
        // Anchor text names the file; it still counts as text of the block.
        if is_tag(node, &["a"]) && !flattened_text(node).is_empty() {
            *seen_text = true;
        }
        return;
    }
    for child in node.children() {
        walk(&child, skip, seen_text, found);
    }
}

/// Block for an uploaded resource. Objects become images when either the
/// markup or the upload says so.
pub(crate) fn resource_block(request: &ResourceRequest, resource: ResourceRef) -> Block {
    let is_image = match &request.kind {
        ResourceKind::Image => true,
        ResourceKind::File => false,
        ResourceKind::Object { declared_type } => {
            declared_type
                .as_deref()
                .is_some_and(|t| t.to_ascii_lowercase().starts_with("image/"))
                || resource.content_type.starts_with("image/")
        }
    };
    if is_image {
        Block::Image(resource)
    } else {
        Block::File(resource)
    }
}
