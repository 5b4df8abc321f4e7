use kuchiki::{traits::*, NodeRef};

pub(crate) fn parse_body(html: &str) -> NodeRef {
    let document = kuchiki::parse_html().one(html.to_string());
    document
        .select_first("body")
        .map(|body| body.as_node().clone())
        .unwrap_or(document)
}

pub(crate) fn tag_name(node: &NodeRef) -> Option<String> {
    node.as_element().map(|el| el.name.local.to_lowercase())
}

pub(crate) fn is_tag(node: &NodeRef, names: &[&str]) -> bool {
    tag_name(node).is_some_and(|tag| names.contains(&tag.as_str()))
}

pub(crate) fn attr(node: &NodeRef, name: &str) -> Option<String> {
    let el = node.as_element()?;
    let attrs = el.attributes.borrow();
    attrs.get(name).map(|s| s.to_string())
}

/// First non-blank value among `names`, in order.
pub(crate) fn first_attr(node: &NodeRef, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| attr(node, name))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

pub(crate) fn has_attr(node: &NodeRef, name: &str) -> bool {
    node.as_element()
        .is_some_and(|el| el.attributes.borrow().contains(name))
}

pub(crate) fn element_children(node: &NodeRef) -> impl Iterator<Item = NodeRef> {
    node.children().filter(|child| child.as_element().is_some())
}

/// First descendant element matching `pred`, in document order. Nested
/// `ul`/`ol` subtrees belong to their own items and are not entered.
pub(crate) fn find_outside_lists<P>(node: &NodeRef, mut pred: P) -> Option<NodeRef>
where
    P: FnMut(&NodeRef) -> bool,
{
    fn search<P: FnMut(&NodeRef) -> bool>(node: &NodeRef, pred: &mut P) -> Option<NodeRef> {
        for child in element_children(node) {
            if is_tag(&child, &["ul", "ol"]) {
                continue;
            }
            if pred(&child) {
                return Some(child);
            }
            if let Some(found) = search(&child, pred) {
                return Some(found);
            }
        }
        None
    }
    search(node, &mut pred)
}

pub(crate) fn is_skippable_tag(tag: &str) -> bool {
    matches!(
        tag,
        "head" | "meta" | "link" | "script" | "style" | "noscript" | "title" | "template"
    )
}

/// Text nodes stripped and joined with single spaces.
pub(crate) fn flattened_text(node: &NodeRef) -> String {
    let mut parts: Vec<String> = Vec::new();
    collect_text(node, &mut parts);
    parts.join(" ")
}

fn collect_text(node: &NodeRef, parts: &mut Vec<String>) {
    if let Some(text) = node.as_text() {
        let text = collapse_whitespace(&clean_invisible(&text.borrow()));
        let text = text.trim();
        if !text.is_empty() {
            parts.push(text.to_string());
        }
        return;
    }
    if tag_name(node).is_some_and(|tag| is_skippable_tag(&tag)) {
        return;
    }
    for child in node.children() {
        collect_text(&child, parts);
    }
}

/// Drops invisible separators and maps exotic spaces to plain ones.
pub(crate) fn clean_invisible(s: &str) -> String {
    s.replace('\u{00A0}', " ")
        .replace('\r', "")
        .replace(
            ['\u{200B}', '\u{200C}', '\u{200D}', '\u{200E}', '\u{200F}'],
            "",
        )
        .replace(['\u{2028}', '\u{2029}'], " ")
        .replace('\u{FEFF}', "")
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out
}
