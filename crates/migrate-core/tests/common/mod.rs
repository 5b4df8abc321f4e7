#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use migrate_core::origin::{GroupParent, Notebook, Origin, PageMeta, Section, SectionGroup};
use migrate_core::remote::{Batch, RemoteBlock, RemotePage};
use migrate_core::types::PageProperties;
use migrate_core::{Block, ContentFetch, Fetched, MigrateError, MigrationConfig, Result, Sink};

pub const SITE_ID: &str = "site-1";
pub const DATABASE_ID: &str = "db-1";

pub fn config(state_path: &Path) -> MigrationConfig {
    MigrationConfig {
        site_url: "https://contoso.sharepoint.com/sites/team".into(),
        database_id: DATABASE_ID.into(),
        state_path: state_path.to_path_buf(),
        append_delay: Duration::ZERO,
        ..MigrationConfig::default()
    }
}

fn not_found(what: &str) -> MigrateError {
    MigrateError::Remote {
        service: "fake",
        status: 404,
        body: what.to_string(),
    }
}

#[derive(Default)]
pub struct FakeOrigin {
    pub notebooks: Vec<Notebook>,
    pub sections: HashMap<String, Vec<Section>>,
    pub groups: HashMap<String, Vec<SectionGroup>>,
    pub pages: HashMap<String, Vec<PageMeta>>,
    pub failing: HashSet<String>,
}

impl FakeOrigin {
    /// One notebook `nb-1` with one section `sec-1` holding `pages`.
    pub fn single_section(pages: Vec<PageMeta>) -> Self {
        let mut origin = FakeOrigin {
            notebooks: vec![Notebook {
                id: "nb-1".into(),
                name: "Work".into(),
            }],
            ..FakeOrigin::default()
        };
        origin.sections.insert(
            "nb-1".into(),
            vec![Section {
                id: "sec-1".into(),
                name: "Meetings".into(),
                groups: Vec::new(),
            }],
        );
        origin.pages.insert("sec-1".into(), pages);
        origin
    }

    fn check(&self, id: &str) -> Result<()> {
        if self.failing.contains(id) {
            return Err(not_found(id));
        }
        Ok(())
    }
}

fn parent_id<'a>(parent: GroupParent<'a>) -> &'a str {
    match parent {
        GroupParent::Notebook(id) | GroupParent::Group(id) => id,
    }
}

impl Origin for FakeOrigin {
    fn resolve_site(&mut self, _site_url: &str) -> Result<String> {
        Ok(SITE_ID.to_string())
    }

    fn list_notebooks(&mut self, _site_id: &str) -> Result<Vec<Notebook>> {
        Ok(self.notebooks.clone())
    }

    fn list_sections(&mut self, _site_id: &str, parent: GroupParent<'_>) -> Result<Vec<Section>> {
        let id = parent_id(parent);
        self.check(id)?;
        Ok(self.sections.get(id).cloned().unwrap_or_default())
    }

    fn list_section_groups(
        &mut self,
        _site_id: &str,
        parent: GroupParent<'_>,
    ) -> Result<Vec<SectionGroup>> {
        let id = parent_id(parent);
        self.check(id)?;
        Ok(self.groups.get(id).cloned().unwrap_or_default())
    }

    fn list_pages(
        &mut self,
        _site_id: &str,
        section_id: &str,
        _since: Option<NaiveDate>,
    ) -> Result<Vec<PageMeta>> {
        self.check(section_id)?;
        Ok(self.pages.get(section_id).cloned().unwrap_or_default())
    }
}

pub fn page(id: &str, title: &str) -> PageMeta {
    PageMeta {
        id: id.into(),
        title: Some(title.into()),
        ..PageMeta::default()
    }
}

#[derive(Default)]
pub struct FakeFetch {
    pub responses: HashMap<String, Fetched>,
    pub calls: Vec<String>,
}

impl FakeFetch {
    pub fn serve(&mut self, url: &str, bytes: &[u8], content_type: Option<&str>) {
        self.responses.insert(
            url.to_string(),
            Fetched {
                bytes: bytes.to_vec(),
                content_type: content_type.map(str::to_string),
            },
        );
    }

    pub fn serve_page(&mut self, page_id: &str, html: &str) {
        let url = migrate_core::origin::page_content_url(SITE_ID, page_id);
        self.serve(&url, html.as_bytes(), Some("text/html"));
    }

    pub fn count(&self, url: &str) -> usize {
        self.calls.iter().filter(|c| c.as_str() == url).count()
    }
}

impl ContentFetch for FakeFetch {
    fn fetch(&mut self, url: &str) -> Result<Fetched> {
        self.calls.push(url.to_string());
        self.responses.get(url).cloned().ok_or_else(|| not_found(url))
    }
}

#[derive(Debug, Clone)]
pub struct StoredPage {
    pub id: String,
    pub properties: PageProperties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub size: usize,
}

/// In-memory destination keeping a block tree per page.
#[derive(Default)]
pub struct FakeSink {
    pub pages: Vec<StoredPage>,
    pub blocks: HashMap<String, Block>,
    pub children: HashMap<String, Vec<String>>,
    pub uploads: Vec<Upload>,
    pub create_batches: Vec<usize>,
    pub append_batches: Vec<usize>,
    pub updated_blocks: Vec<String>,
    pub writes: usize,
    /// Listing page size; zero lists everything at once.
    pub page_size: usize,
    pub fail_uploads: bool,
    pub fail_children_of: HashSet<String>,
    pub next_id: usize,
}

impl FakeSink {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn store(&mut self, parent: &str, block: &Block) -> String {
        let id = self.next("block");
        let mut own = block.clone();
        let nested = own.children_mut().map(std::mem::take).unwrap_or_default();
        self.blocks.insert(id.clone(), own);
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(id.clone());
        for child in &nested {
            self.store(&id, child);
        }
        id
    }

    /// Top-level blocks of a page, without their children.
    pub fn page_blocks(&self, page_id: &str) -> Vec<&Block> {
        self.children
            .get(page_id)
            .map(|ids| ids.iter().filter_map(|id| self.blocks.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn child_ids(&self, id: &str) -> Vec<String> {
        self.children.get(id).cloned().unwrap_or_default()
    }

    pub fn page_by_source(&self, source_id: &str) -> Option<&StoredPage> {
        self.pages
            .iter()
            .find(|p| p.properties.source_id == source_id)
    }

    fn paginate<T: Clone>(&self, items: Vec<T>, cursor: Option<&str>) -> Batch<T> {
        let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        if self.page_size == 0 {
            return Batch::last(items[start..].to_vec());
        }
        let end = (start + self.page_size).min(items.len());
        Batch {
            items: items[start..end].to_vec(),
            next_cursor: (end < items.len()).then(|| end.to_string()),
        }
    }
}

impl Sink for FakeSink {
    fn create_page(
        &mut self,
        _database_id: &str,
        properties: &PageProperties,
        children: &[Block],
    ) -> Result<String> {
        let id = self.next("page");
        self.pages.push(StoredPage {
            id: id.clone(),
            properties: properties.clone(),
        });
        self.children.insert(id.clone(), Vec::new());
        for block in children {
            self.store(&id, block);
        }
        self.create_batches.push(children.len());
        self.writes += 1;
        Ok(id)
    }

    fn update_page(&mut self, page_id: &str, properties: &PageProperties) -> Result<()> {
        let page = self
            .pages
            .iter_mut()
            .find(|p| p.id == page_id)
            .ok_or_else(|| not_found(page_id))?;
        page.properties = properties.clone();
        self.writes += 1;
        Ok(())
    }

    fn find_page_by_source_id(
        &mut self,
        _database_id: &str,
        source_id: &str,
    ) -> Result<Option<String>> {
        Ok(self.page_by_source(source_id).map(|p| p.id.clone()))
    }

    fn append_children(&mut self, block_id: &str, children: &[Block]) -> Result<Vec<String>> {
        let ids = children.iter().map(|b| self.store(block_id, b)).collect();
        self.append_batches.push(children.len());
        self.writes += 1;
        Ok(ids)
    }

    fn update_block(&mut self, block_id: &str, block: &Block) -> Result<()> {
        let slot = self
            .blocks
            .get_mut(block_id)
            .ok_or_else(|| not_found(block_id))?;
        *slot = block.clone();
        self.updated_blocks.push(block_id.to_string());
        self.writes += 1;
        Ok(())
    }

    fn delete_block(&mut self, block_id: &str) -> Result<()> {
        self.blocks.remove(block_id);
        for ids in self.children.values_mut() {
            ids.retain(|id| id != block_id);
        }
        self.writes += 1;
        Ok(())
    }

    fn query_pages(&mut self, _database_id: &str, cursor: Option<&str>) -> Result<Batch<RemotePage>> {
        let pages: Vec<RemotePage> = self
            .pages
            .iter()
            .map(|p| RemotePage {
                id: p.id.clone(),
                source_id: Some(p.properties.source_id.clone()),
                url: None,
            })
            .collect();
        Ok(self.paginate(pages, cursor))
    }

    fn block_children(&mut self, block_id: &str, cursor: Option<&str>) -> Result<Batch<RemoteBlock>> {
        if self.fail_children_of.contains(block_id) {
            return Err(not_found(block_id));
        }
        let items: Vec<RemoteBlock> = self
            .child_ids(block_id)
            .into_iter()
            .map(|id| RemoteBlock {
                has_children: !self.child_ids(&id).is_empty(),
                block: self.blocks.get(&id).cloned(),
                id,
            })
            .collect();
        Ok(self.paginate(items, cursor))
    }

    fn create_upload(&mut self, filename: &str, content_type: &str) -> Result<String> {
        if self.fail_uploads {
            return Err(MigrateError::Remote {
                service: "fake",
                status: 500,
                body: "upload unavailable".into(),
            });
        }
        let id = self.next("upload");
        self.uploads.push(Upload {
            id: id.clone(),
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            size: 0,
        });
        Ok(id)
    }

    fn send_upload(
        &mut self,
        upload_id: &str,
        _filename: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<()> {
        let upload = self
            .uploads
            .iter_mut()
            .find(|u| u.id == upload_id)
            .ok_or_else(|| not_found(upload_id))?;
        upload.size = bytes.len();
        Ok(())
    }
}
