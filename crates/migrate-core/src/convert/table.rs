use kuchiki::NodeRef;

use crate::types::{Block, Table, TableBlock, TableRow};

use super::dom::{element_children, flattened_text, is_tag};
use super::inline::plain_rich_text;

/// Flattened rows of a `table`; `None` when it has no cells at all.
pub(crate) fn extract_table(node: &NodeRef) -> Option<Table> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut first_row_all_th = false;
    for tr in table_rows(node) {
        let cells: Vec<NodeRef> = element_children(&tr)
            .filter(|c| is_tag(c, &["td", "th"]))
            .collect();
        if cells.is_empty() {
            continue;
        }
        if rows.is_empty() {
            first_row_all_th = cells.iter().all(|c| is_tag(c, &["th"]));
        }
        rows.push(cells.iter().map(flattened_text).collect());
    }
    if rows.is_empty() {
        return None;
    }
    Some(Table {
        rows,
        has_column_header: first_row_all_th,
    })
}

/// Rows of this table only; rows of nested tables stay with their own table.
fn table_rows(table: &NodeRef) -> Vec<NodeRef> {
    let mut rows = Vec::new();
    for child in element_children(table) {
        if is_tag(&child, &["tr"]) {
            rows.push(child);
        } else if is_tag(&child, &["thead", "tbody", "tfoot"]) {
            rows.extend(element_children(&child).filter(|c| is_tag(c, &["tr"])));
        }
    }
    rows
}

/// Destination table block with every row padded to the widest row.
pub fn table_block(table: &Table, max_span_chars: usize) -> Block {
    let width = table.width().max(1);
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let mut cells: Vec<_> = row
                .iter()
                .map(|cell| plain_rich_text(cell, max_span_chars))
                .collect();
            cells.resize_with(width, || plain_rich_text("", max_span_chars));
            TableRow { cells }
        })
        .collect();
    Block::Table(TableBlock {
        width,
        has_column_header: table.has_column_header,
        has_row_header: false,
        rows,
    })
}
