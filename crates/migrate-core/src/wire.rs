//! JSON shapes exchanged with the destination API.

use serde_json::{json, Map, Value};

use crate::error::{MigrateError, Result};
use crate::remote::{Batch, RemoteBlock, RemotePage};
use crate::types::{
    Annotations, Block, PageProperties, ResourceRef, RichText, RichTextSpan, TableRow,
};

/// Database property holding the source page identifier.
pub const SOURCE_ID_PROPERTY: &str = "OneNotePageId";
pub const SECTION_PROPERTY: &str = "Section";
pub const NOTEBOOK_PROPERTY: &str = "Notebook";
pub const SOURCE_URL_PROPERTY: &str = "SourceURL";
pub const CREATED_PROPERTY: &str = "Created";
pub const MODIFIED_PROPERTY: &str = "Modified";

const DEFAULT_TITLE_PROPERTY: &str = "Name";

pub fn encode_span(span: &RichTextSpan) -> Value {
    let mut text = Map::new();
    text.insert("content".into(), Value::String(span.content.clone()));
    if let Some(link) = &span.link {
        text.insert("link".into(), json!({ "url": link }));
    }
    let mut out = Map::new();
    out.insert("type".into(), json!("text"));
    out.insert("text".into(), Value::Object(text));
    if let Some(ann) = span.annotations.filter(|a| !a.is_empty()) {
        out.insert(
            "annotations".into(),
            json!({
                "bold": ann.bold,
                "italic": ann.italic,
                "underline": ann.underline,
                "strikethrough": ann.strikethrough,
                "code": ann.code,
            }),
        );
    }
    Value::Object(out)
}

/// Encodes spans, leaving out empty ones; the API takes `[]` for no text.
pub fn encode_rich_text(spans: &[RichTextSpan]) -> Value {
    Value::Array(
        spans
            .iter()
            .filter(|s| !s.content.is_empty())
            .map(encode_span)
            .collect(),
    )
}

pub fn encode_block(block: &Block) -> Value {
    let kind = block.kind();
    let mut body = Map::new();
    match block {
        Block::Paragraph { text }
        | Block::Heading { text, .. }
        | Block::Quote { text }
        | Block::BulletedListItem { text, .. }
        | Block::NumberedListItem { text, .. } => {
            body.insert("rich_text".into(), encode_rich_text(text));
        }
        Block::Code { language, text } => {
            body.insert("rich_text".into(), encode_rich_text(text));
            body.insert("language".into(), json!(language));
        }
        Block::ToDo { checked, text, .. } => {
            body.insert("rich_text".into(), encode_rich_text(text));
            body.insert("checked".into(), json!(checked));
        }
        Block::Table(table) => {
            body.insert("table_width".into(), json!(table.width));
            body.insert("has_column_header".into(), json!(table.has_column_header));
            body.insert("has_row_header".into(), json!(table.has_row_header));
            let rows: Vec<Value> = table
                .rows
                .iter()
                .map(|row| encode_block(&Block::TableRow(row.clone())))
                .collect();
            body.insert("children".into(), Value::Array(rows));
        }
        Block::TableRow(row) => {
            let cells: Vec<Value> = row.cells.iter().map(|c| encode_rich_text(c)).collect();
            body.insert("cells".into(), Value::Array(cells));
        }
        Block::Image(resource) => {
            body = upload_body(resource);
        }
        Block::File(resource) => {
            body = upload_body(resource);
            body.insert("name".into(), json!(resource.filename));
        }
    }
    let children = block.children();
    if !children.is_empty() {
        body.insert("children".into(), encode_blocks(children));
    }
    let mut out = Map::new();
    out.insert("object".into(), json!("block"));
    out.insert("type".into(), json!(kind));
    out.insert(kind.into(), Value::Object(body));
    Value::Object(out)
}

pub fn encode_blocks(blocks: &[Block]) -> Value {
    Value::Array(blocks.iter().map(encode_block).collect())
}

fn upload_body(resource: &ResourceRef) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("type".into(), json!("file_upload"));
    body.insert("file_upload".into(), json!({ "id": resource.upload_id }));
    body
}

fn decode_span(value: &Value) -> RichTextSpan {
    let content = value
        .pointer("/text/content")
        .or_else(|| value.get("plain_text"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let link = value
        .pointer("/text/link/url")
        .and_then(Value::as_str)
        .map(str::to_string);
    let flag = |name: &str| {
        value
            .pointer(&format!("/annotations/{name}"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };
    let annotations = Annotations {
        bold: flag("bold"),
        italic: flag("italic"),
        underline: flag("underline"),
        strikethrough: flag("strikethrough"),
        code: flag("code"),
    };
    RichTextSpan {
        content,
        link,
        annotations: (!annotations.is_empty()).then_some(annotations),
    }
}

pub fn decode_rich_text(value: Option<&Value>) -> RichText {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().map(decode_span).collect())
        .unwrap_or_default()
}

/// Decodes a block object returned by the API. Kinds without a local
/// counterpart yield `None`; so do tables, whose rows arrive as children.
pub fn decode_block(value: &Value) -> Option<Block> {
    let kind = value.get("type")?.as_str()?;
    let body = value.get(kind)?;
    let text = || decode_rich_text(body.get("rich_text"));
    let block = match kind {
        "paragraph" => Block::paragraph(text()),
        "heading_1" | "heading_2" | "heading_3" => Block::Heading {
            level: kind[kind.len() - 1..].parse().ok()?,
            text: text(),
        },
        "quote" => Block::Quote { text: text() },
        "code" => Block::Code {
            language: body.get("language")?.as_str()?.to_string(),
            text: text(),
        },
        "to_do" => Block::ToDo {
            checked: body.get("checked").and_then(Value::as_bool).unwrap_or(false),
            text: text(),
            children: Vec::new(),
        },
        "bulleted_list_item" => Block::BulletedListItem {
            text: text(),
            children: Vec::new(),
        },
        "numbered_list_item" => Block::NumberedListItem {
            text: text(),
            children: Vec::new(),
        },
        "table_row" => Block::TableRow(TableRow {
            cells: body
                .get("cells")?
                .as_array()?
                .iter()
                .map(|cell| decode_rich_text(Some(cell)))
                .collect(),
        }),
        _ => return None,
    };
    Some(block)
}

fn required_str<'v>(value: &'v Value, key: &str) -> Result<&'v str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| MigrateError::Parse(format!("missing `{key}`")))
}

fn cursor_of(value: &Value) -> Option<String> {
    let more = value.get("has_more").and_then(Value::as_bool).unwrap_or(false);
    more.then(|| value.get("next_cursor").and_then(Value::as_str).map(str::to_string))
        .flatten()
}

pub fn decode_remote_block(value: &Value) -> Result<RemoteBlock> {
    Ok(RemoteBlock {
        id: required_str(value, "id")?.to_string(),
        has_children: value
            .get("has_children")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        block: decode_block(value),
    })
}

pub fn decode_children(value: &Value) -> Result<Batch<RemoteBlock>> {
    let items = value
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| MigrateError::Parse("missing `results`".into()))?
        .iter()
        .map(decode_remote_block)
        .collect::<Result<Vec<_>>>()?;
    Ok(Batch {
        items,
        next_cursor: cursor_of(value),
    })
}

fn property_text(prop: &Value) -> Option<String> {
    let kind = prop.get("type")?.as_str()?;
    let text = match kind {
        "url" => prop.get("url")?.as_str()?.to_string(),
        "rich_text" | "title" => prop
            .get(kind)?
            .as_array()?
            .iter()
            .filter_map(|item| item.get("plain_text").and_then(Value::as_str))
            .collect(),
        "select" => prop.pointer("/select/name")?.as_str()?.to_string(),
        _ => return None,
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

pub fn decode_page(value: &Value) -> Result<RemotePage> {
    Ok(RemotePage {
        id: required_str(value, "id")?.to_string(),
        source_id: value
            .pointer(&format!("/properties/{SOURCE_ID_PROPERTY}"))
            .and_then(property_text),
        url: value.get("url").and_then(Value::as_str).map(str::to_string),
    })
}

pub fn decode_pages(value: &Value) -> Result<Batch<RemotePage>> {
    let items = value
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| MigrateError::Parse("missing `results`".into()))?
        .iter()
        .map(decode_page)
        .collect::<Result<Vec<_>>>()?;
    Ok(Batch {
        items,
        next_cursor: cursor_of(value),
    })
}

fn text_property(kind: &str, text: &str) -> Option<Value> {
    let rich = json!([{ "type": "text", "text": { "content": text } }]);
    let value = match kind {
        "title" => json!({ "title": rich }),
        "rich_text" => json!({ "rich_text": rich }),
        "url" => json!({ "url": text }),
        "select" => json!({ "select": { "name": text.replace(',', " ") } }),
        "date" => json!({ "date": { "start": text } }),
        _ => return None,
    };
    Some(value)
}

/// Page properties mapped onto the database `schema` (the database object's
/// `properties` map). Properties the schema lacks are left out.
pub fn encode_properties(props: &PageProperties, schema: &Value) -> Value {
    let kind_of = |name: &str| schema.pointer(&format!("/{name}/type")).and_then(Value::as_str);
    let title_name = schema
        .as_object()
        .and_then(|m| {
            m.iter()
                .find(|(_, v)| v.get("type").and_then(Value::as_str) == Some("title"))
                .map(|(k, _)| k.clone())
        })
        .unwrap_or_else(|| DEFAULT_TITLE_PROPERTY.to_string());

    let mut out = Map::new();
    if let Some(title) = text_property("title", &props.title) {
        out.insert(title_name.clone(), title);
    }
    let optional = [
        (SOURCE_ID_PROPERTY, Some(props.source_id.as_str())),
        (SECTION_PROPERTY, props.section.as_deref()),
        (NOTEBOOK_PROPERTY, props.notebook.as_deref()),
        (SOURCE_URL_PROPERTY, props.source_url.as_deref()),
        (CREATED_PROPERTY, props.created.as_deref()),
        (MODIFIED_PROPERTY, props.modified.as_deref()),
    ];
    for (name, value) in optional {
        let (Some(value), Some(kind)) = (value.filter(|v| !v.is_empty()), kind_of(name)) else {
            continue;
        };
        if name == title_name {
            continue;
        }
        if let Some(encoded) = text_property(kind, value) {
            out.insert(name.to_string(), encoded);
        }
    }
    Value::Object(out)
}
