use kuchiki::NodeRef;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::RichText;

use super::dom::{attr, find_outside_lists, flattened_text, has_attr, is_tag, tag_name};

const CHECKED_GLYPHS: &[&str] = &["☑", "✅", "✓", "✔"];
const UNCHECKED_GLYPHS: &[&str] = &["☐", "⬜", "☒", "◻"];

static CHECKED_MARKDOWN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\[[xX]\]\s+").unwrap());
static UNCHECKED_MARKDOWN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\[ \]\s+").unwrap());
static ANY_MARKDOWN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\[[xX ]\]\s*").unwrap());

/// What made an element a to-do; decides what gets stripped or skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum TodoMarker {
    Checkbox,
    Tag,
    Image(NodeRef),
    Glyph,
    Markdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TodoSignal {
    pub checked: bool,
    pub marker: TodoMarker,
}

impl TodoSignal {
    fn new(checked: bool, marker: TodoMarker) -> Self {
        Self { checked, marker }
    }

    /// The image that signalled the to-do, which must not be uploaded.
    pub fn signal_image(&self) -> Option<&NodeRef> {
        match &self.marker {
            TodoMarker::Image(node) => Some(node),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Heading(u8),
    Quote,
    Code,
    List { ordered: bool },
    Table,
    ToDo(TodoSignal),
    Paragraph,
    Resource,
    Other,
}

/// Structural category of one element. The first matching rule wins.
pub fn classify(node: &NodeRef) -> BlockKind {
    let Some(tag) = tag_name(node) else {
        return BlockKind::Other;
    };
    match tag.as_str() {
        "h1" => BlockKind::Heading(1),
        "h2" => BlockKind::Heading(2),
        "h3" => BlockKind::Heading(3),
        "blockquote" => BlockKind::Quote,
        "pre" => BlockKind::Code,
        "ul" => BlockKind::List { ordered: false },
        "ol" => BlockKind::List { ordered: true },
        "table" => BlockKind::Table,
        t if is_paragraph_like(t) => match detect_todo(node) {
            Some(signal) => BlockKind::ToDo(signal),
            None => BlockKind::Paragraph,
        },
        "img" | "object" => BlockKind::Resource,
        "a" if super::resources::is_resource_href(attr(node, "href").as_deref()) => {
            BlockKind::Resource
        }
        _ => BlockKind::Other,
    }
}

/// `h4`..`h6` have no destination heading level and read as paragraphs.
pub(crate) fn is_paragraph_like(tag: &str) -> bool {
    matches!(tag, "p" | "h4" | "h5" | "h6")
}

/// Decides whether a paragraph-like element or list item is a to-do.
///
/// Signals in precedence order: a checkbox input, a `data-tag` marker on the
/// element itself, an
/// image whose alt text mentions a to-do, a leading check glyph, and finally
/// a leading markdown `[ ]` / `[x]`.
pub fn detect_todo(node: &NodeRef) -> Option<TodoSignal> {
    let checkbox = find_outside_lists(node, |d| {
        is_tag(d, &["input"])
            && attr(d, "type").is_some_and(|t| t.eq_ignore_ascii_case("checkbox"))
    });
    if let Some(input) = checkbox {
        return Some(TodoSignal::new(has_attr(&input, "checked"), TodoMarker::Checkbox));
    }

    if let Some(tag) = attr(node, "data-tag").map(|t| t.to_lowercase()) {
        if tag.contains("to-do") {
            return Some(TodoSignal::new(
                tag.contains("to-do:completed"),
                TodoMarker::Tag,
            ));
        }
    }

    let image = find_outside_lists(node, |d| {
        is_tag(d, &["img"])
            && attr(d, "alt").is_some_and(|alt| {
                let alt = alt.to_lowercase();
                ["to do", "to-do", "todo", "checked", "unchecked"]
                    .iter()
                    .any(|key| alt.contains(key))
            })
    });
    if let Some(img) = image {
        let alt = attr(&img, "alt").unwrap_or_default().to_lowercase();
        let checked = alt.contains("check");
        return Some(TodoSignal::new(checked, TodoMarker::Image(img)));
    }

    let text = flattened_text(node);
    if CHECKED_GLYPHS.iter().any(|g| text.starts_with(g)) {
        return Some(TodoSignal::new(true, TodoMarker::Glyph));
    }
    if UNCHECKED_GLYPHS.iter().any(|g| text.starts_with(g)) {
        return Some(TodoSignal::new(false, TodoMarker::Glyph));
    }
    if CHECKED_MARKDOWN.is_match(&text) {
        return Some(TodoSignal::new(true, TodoMarker::Markdown));
    }
    if UNCHECKED_MARKDOWN.is_match(&text) {
        return Some(TodoSignal::new(false, TodoMarker::Markdown));
    }
    None
}

/// Removes the glyph or markdown box that signalled a to-do from its text.
pub(crate) fn strip_todo_marker(text: &mut RichText, marker: &TodoMarker) {
    let Some(first) = text.first_mut() else {
        return;
    };
    let trimmed = first.content.trim_start();
    let rest = match marker {
        TodoMarker::Glyph => CHECKED_GLYPHS
            .iter()
            .chain(UNCHECKED_GLYPHS)
            .find_map(|g| trimmed.strip_prefix(g))
            .map(|rest| rest.trim_start_matches('\u{FE0F}').trim_start().to_string()),
        TodoMarker::Markdown => ANY_MARKDOWN
            .find(trimmed)
            .map(|m| trimmed[m.end()..].to_string()),
        _ => None,
    };
    let Some(rest) = rest else {
        return;
    };
    first.content = rest;
    if first.content.is_empty() && text.len() > 1 {
        text.remove(0);
        if let Some(next) = text.first_mut() {
            next.content = next.content.trim_start().to_string();
        }
    }
}
