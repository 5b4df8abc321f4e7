use std::{thread, time::Duration};

use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{Block, PageProperties};

/// Bytes of a fetched URL plus whatever content type the response declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Authenticated GET against the source service.
pub trait ContentFetch {
    fn fetch(&mut self, url: &str) -> Result<Fetched>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePage {
    pub id: String,
    /// Value of the page's source-identifier property, if set.
    pub source_id: Option<String>,
    pub url: Option<String>,
}

/// A block read back from the destination. `block` is `None` for kinds the
/// local model does not represent; those are walked but never rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBlock {
    pub id: String,
    pub has_children: bool,
    pub block: Option<Block>,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Batch<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

/// The destination workspace.
pub trait Sink {
    fn create_page(
        &mut self,
        database_id: &str,
        properties: &PageProperties,
        children: &[Block],
    ) -> Result<String>;

    fn update_page(&mut self, page_id: &str, properties: &PageProperties) -> Result<()>;

    fn find_page_by_source_id(&mut self, database_id: &str, source_id: &str)
        -> Result<Option<String>>;

    /// Appends `children` under `block_id`, returning the ids of the new blocks.
    fn append_children(&mut self, block_id: &str, children: &[Block]) -> Result<Vec<String>>;

    fn update_block(&mut self, block_id: &str, block: &Block) -> Result<()>;

    fn delete_block(&mut self, block_id: &str) -> Result<()>;

    fn query_pages(&mut self, database_id: &str, cursor: Option<&str>) -> Result<Batch<RemotePage>>;

    fn block_children(&mut self, block_id: &str, cursor: Option<&str>) -> Result<Batch<RemoteBlock>>;

    /// Opens an upload slot and returns its id.
    fn create_upload(&mut self, filename: &str, content_type: &str) -> Result<String>;

    /// Sends the bytes as a multipart body. Implementations must not set the
    /// request's content type themselves; the transport has to generate the
    /// multipart header with its boundary.
    fn send_upload(
        &mut self,
        upload_id: &str,
        filename: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<()>;

    /// Two-step upload. Failures are logged and reported as `None`.
    fn upload_binary(&mut self, filename: &str, bytes: &[u8], content_type: &str) -> Option<String> {
        let upload_id = match self.create_upload(filename, content_type) {
            Ok(id) => id,
            Err(e) => {
                warn!(filename, error = %e, "could not create upload");
                return None;
            }
        };
        match self.send_upload(&upload_id, filename, bytes, content_type) {
            Ok(()) => Some(upload_id),
            Err(e) => {
                warn!(filename, upload_id = %upload_id, error = %e, "could not send upload");
                None
            }
        }
    }
}

/// Every page of the destination database, following cursors to the end.
pub fn all_pages<S: Sink + ?Sized>(sink: &mut S, database_id: &str) -> Result<Vec<RemotePage>> {
    let mut pages = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let batch = sink.query_pages(database_id, cursor.as_deref())?;
        pages.extend(batch.items);
        match batch.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(pages)
}

pub fn all_children<S: Sink + ?Sized>(sink: &mut S, block_id: &str) -> Result<Vec<RemoteBlock>> {
    let mut children = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let batch = sink.block_children(block_id, cursor.as_deref())?;
        children.extend(batch.items);
        match batch.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(children)
}

/// Appends blocks in fixed-size batches, pausing between requests.
pub fn append_batched<S: Sink + ?Sized>(
    sink: &mut S,
    block_id: &str,
    blocks: &[Block],
    batch_size: usize,
    delay: Duration,
) -> Result<usize> {
    let mut appended = 0;
    for (i, chunk) in blocks.chunks(batch_size.max(1)).enumerate() {
        if i > 0 && !delay.is_zero() {
            thread::sleep(delay);
        }
        sink.append_children(block_id, chunk)?;
        appended += chunk.len();
        debug!(block_id, appended, total = blocks.len(), "appended batch");
    }
    Ok(appended)
}

/// Deletes every top-level child of a page.
pub fn clear_children<S: Sink + ?Sized>(sink: &mut S, page_id: &str) -> Result<usize> {
    let children = all_children(sink, page_id)?;
    for child in &children {
        sink.delete_block(&child.id)?;
    }
    Ok(children.len())
}
