use serde::{Deserialize, Serialize};

/// Inline formatting carried by a rich-text span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotations {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub code: bool,
}

impl Annotations {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Union of two annotation sets; a flag set on either side stays set.
    pub fn merge(self, other: Annotations) -> Annotations {
        Annotations {
            bold: self.bold || other.bold,
            italic: self.italic || other.italic,
            underline: self.underline || other.underline,
            strikethrough: self.strikethrough || other.strikethrough,
            code: self.code || other.code,
        }
    }
}

/// A contiguous run of text sharing one annotation set and optional link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichTextSpan {
    pub content: String,
    pub link: Option<String>,
    /// `None` stands for the empty set; it is never `Some(Annotations::default())`.
    pub annotations: Option<Annotations>,
}

impl RichTextSpan {
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            link: None,
            annotations: None,
        }
    }

    pub fn styled(content: impl Into<String>, annotations: Annotations) -> Self {
        Self {
            content: content.into(),
            link: None,
            annotations: (!annotations.is_empty()).then_some(annotations),
        }
    }

    pub fn linked(content: impl Into<String>, link: impl Into<String>, annotations: Annotations) -> Self {
        Self {
            link: Some(link.into()),
            ..Self::styled(content, annotations)
        }
    }

    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn same_style(&self, other: &RichTextSpan) -> bool {
        self.link == other.link && self.annotations == other.annotations
    }
}

pub type RichText = Vec<RichTextSpan>;

pub fn rich_text_len(spans: &[RichTextSpan]) -> usize {
    spans.iter().map(RichTextSpan::char_len).sum()
}

pub fn plain_text(spans: &[RichTextSpan]) -> String {
    spans.iter().map(|s| s.content.as_str()).collect()
}

/// Reference to a binary already uploaded to the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub source_url: String,
    pub content_type: String,
    pub filename: String,
    pub upload_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub cells: Vec<RichText>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableBlock {
    pub width: usize,
    pub has_column_header: bool,
    pub has_row_header: bool,
    pub rows: Vec<TableRow>,
}

/// One unit of the destination page model.
///
/// List items and to-dos may carry nested `children`; every other variant is
/// a leaf from the converter's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph {
        text: RichText,
    },
    Heading {
        level: u8,
        text: RichText,
    },
    Quote {
        text: RichText,
    },
    Code {
        language: String,
        text: RichText,
    },
    ToDo {
        checked: bool,
        text: RichText,
        children: Vec<Block>,
    },
    BulletedListItem {
        text: RichText,
        children: Vec<Block>,
    },
    NumberedListItem {
        text: RichText,
        children: Vec<Block>,
    },
    Table(TableBlock),
    TableRow(TableRow),
    Image(ResourceRef),
    File(ResourceRef),
}

impl Block {
    pub fn paragraph(text: RichText) -> Self {
        Block::Paragraph { text }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Block::Paragraph { .. } => "paragraph",
            Block::Heading { level: 1, .. } => "heading_1",
            Block::Heading { level: 2, .. } => "heading_2",
            Block::Heading { .. } => "heading_3",
            Block::Quote { .. } => "quote",
            Block::Code { .. } => "code",
            Block::ToDo { .. } => "to_do",
            Block::BulletedListItem { .. } => "bulleted_list_item",
            Block::NumberedListItem { .. } => "numbered_list_item",
            Block::Table(_) => "table",
            Block::TableRow(_) => "table_row",
            Block::Image(_) => "image",
            Block::File(_) => "file",
        }
    }

    pub fn rich_text(&self) -> Option<&RichText> {
        match self {
            Block::Paragraph { text }
            | Block::Heading { text, .. }
            | Block::Quote { text }
            | Block::Code { text, .. }
            | Block::ToDo { text, .. }
            | Block::BulletedListItem { text, .. }
            | Block::NumberedListItem { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn rich_text_mut(&mut self) -> Option<&mut RichText> {
        match self {
            Block::Paragraph { text }
            | Block::Heading { text, .. }
            | Block::Quote { text }
            | Block::Code { text, .. }
            | Block::ToDo { text, .. }
            | Block::BulletedListItem { text, .. }
            | Block::NumberedListItem { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Block] {
        match self {
            Block::ToDo { children, .. }
            | Block::BulletedListItem { children, .. }
            | Block::NumberedListItem { children, .. } => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Block>> {
        match self {
            Block::ToDo { children, .. }
            | Block::BulletedListItem { children, .. }
            | Block::NumberedListItem { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Every span in the block, including table cells.
    pub fn spans_mut(&mut self) -> Vec<&mut RichTextSpan> {
        match self {
            Block::Table(table) => table
                .rows
                .iter_mut()
                .flat_map(|row| row.cells.iter_mut().flatten())
                .collect(),
            Block::TableRow(row) => row.cells.iter_mut().flatten().collect(),
            other => other
                .rich_text_mut()
                .map(|text| text.iter_mut().collect())
                .unwrap_or_default(),
        }
    }

    /// Same block kind and attributes, carrying `text` and no children.
    pub(crate) fn with_text(&self, text: RichText) -> Block {
        match self {
            Block::Paragraph { .. } => Block::paragraph(text),
            Block::Heading { level, .. } => Block::Heading {
                level: *level,
                text,
            },
            Block::Quote { .. } => Block::Quote { text },
            Block::Code { language, .. } => Block::Code {
                language: language.clone(),
                text,
            },
            Block::ToDo { checked, .. } => Block::ToDo {
                checked: *checked,
                text,
                children: Vec::new(),
            },
            Block::BulletedListItem { .. } => Block::BulletedListItem {
                text,
                children: Vec::new(),
            },
            Block::NumberedListItem { .. } => Block::NumberedListItem {
                text,
                children: Vec::new(),
            },
            other => other.clone(),
        }
    }
}

/// A table as extracted from the markup: rows of flattened cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
    pub has_column_header: bool,
}

impl Table {
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Result of converting one source page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertedDocument {
    pub blocks: Vec<Block>,
    pub tables: Vec<Table>,
    /// Blocks dropped by the per-document block cap.
    pub truncated: usize,
}

/// Typed page metadata handed to the sink; the sink maps it onto its schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageProperties {
    pub title: String,
    pub source_id: String,
    pub section: Option<String>,
    pub notebook: Option<String>,
    pub source_url: Option<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
}
