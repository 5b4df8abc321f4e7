use std::thread;

use tracing::{debug, error, info, warn};

use crate::chunk;
use crate::config::{Limits, MigrationConfig};
use crate::convert::{html_to_document, html_to_document_with_resolver, table_block};
use crate::error::{MigrateError, Result};
use crate::links::{LinkReport, LinkResolver};
use crate::origin::{
    collect_sections, page_content_url, select_notebook, select_sections, Notebook, Origin,
    PageMeta, Section,
};
use crate::remote::{append_batched, clear_children, ContentFetch, Sink};
use crate::resource::ResourceResolver;
use crate::state::{checksum, page_key, StateStore};
use crate::types::PageProperties;

const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Created(String),
    Updated(String),
    Skipped,
    DryRun { blocks: usize, tables: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub page_id: String,
    pub title: String,
    /// Where the page opens in the source, for retrying it by hand.
    pub source_url: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub dry_run: usize,
    pub failed: usize,
    /// Sections or notebooks that could not be listed at all.
    pub units_failed: usize,
    pub failures: Vec<PageFailure>,
    /// Titles of pages whose content hit the per-document block cap.
    pub truncated: Vec<String>,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.skipped + self.dry_run + self.failed
    }

    fn record(&mut self, outcome: &PageOutcome) {
        match outcome {
            PageOutcome::Created(_) => self.created += 1,
            PageOutcome::Updated(_) => self.updated += 1,
            PageOutcome::Skipped => self.skipped += 1,
            PageOutcome::DryRun { .. } => self.dry_run += 1,
        }
    }
}

/// Properties of a destination page built from source metadata.
pub fn page_properties(
    page: &PageMeta,
    section: &Section,
    notebook: &Notebook,
    limits: &Limits,
) -> PageProperties {
    let title = page
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED);
    PageProperties {
        title: title.chars().take(limits.max_title_chars).collect(),
        source_id: page.id.clone(),
        section: Some(section.name.clone()),
        notebook: Some(notebook.name.clone()),
        source_url: page.web_url.clone(),
        created: page.created.clone(),
        modified: page.modified.clone(),
    }
}

/// Drives one migration run: enumerate, convert, write, record.
pub struct Migrator<'a, O, F, S>
where
    O: Origin,
    F: ContentFetch,
    S: Sink,
{
    config: &'a MigrationConfig,
    origin: &'a mut O,
    fetcher: &'a mut F,
    sink: &'a mut S,
    state: StateStore,
    truncated: Vec<String>,
}

impl<'a, O, F, S> Migrator<'a, O, F, S>
where
    O: Origin,
    F: ContentFetch,
    S: Sink,
{
    pub fn new(config: &'a MigrationConfig, origin: &'a mut O, fetcher: &'a mut F, sink: &'a mut S) -> Self {
        let state = StateStore::load(&config.state_path);
        Self::with_state(config, origin, fetcher, sink, state)
    }

    pub fn with_state(
        config: &'a MigrationConfig,
        origin: &'a mut O,
        fetcher: &'a mut F,
        sink: &'a mut S,
        state: StateStore,
    ) -> Self {
        Self {
            config,
            origin,
            fetcher,
            sink,
            state,
            truncated: Vec::new(),
        }
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn into_state(self) -> StateStore {
        self.state
    }

    /// Migrates every selected page. Only failing to resolve the site, list
    /// its notebooks or find the requested notebook aborts the run; every
    /// other failure is logged, counted and skipped.
    pub fn run(&mut self) -> Result<RunSummary> {
        let site_id = self.origin.resolve_site(&self.config.site_url)?;
        let notebooks = self.origin.list_notebooks(&site_id)?;
        let selected = match &self.config.notebook {
            Some(selector) => {
                let notebook = select_notebook(&notebooks, selector)
                    .cloned()
                    .ok_or_else(|| MigrateError::NotFound(format!("notebook {selector:?}")))?;
                vec![notebook]
            }
            None => notebooks,
        };

        let mut summary = RunSummary::default();
        for notebook in &selected {
            self.run_notebook(&site_id, notebook, &mut summary);
        }
        summary.truncated = std::mem::take(&mut self.truncated);
        info!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            truncated = summary.truncated.len(),
            "migration finished"
        );
        Ok(summary)
    }

    fn run_notebook(&mut self, site_id: &str, notebook: &Notebook, summary: &mut RunSummary) {
        let limits = self.config.limits;
        let sections = match collect_sections(
            &mut *self.origin,
            site_id,
            &notebook.id,
            limits.max_section_group_depth,
        ) {
            Ok(sections) => sections,
            Err(e) => {
                error!(notebook = %notebook.name, error = %e, "could not list sections");
                summary.units_failed += 1;
                return;
            }
        };
        let sections = match &self.config.section {
            Some(name) => {
                let picked = select_sections(sections, name);
                if picked.is_empty() {
                    warn!(notebook = %notebook.name, section = %name, "section not found");
                }
                picked
            }
            None => sections,
        };
        for section in &sections {
            self.run_section(site_id, notebook, section, summary);
        }
    }

    fn run_section(
        &mut self,
        site_id: &str,
        notebook: &Notebook,
        section: &Section,
        summary: &mut RunSummary,
    ) {
        let pages = match self.origin.list_pages(site_id, &section.id, self.config.since) {
            Ok(pages) => pages,
            Err(e) => {
                error!(section = %section.name, error = %e, "could not list pages");
                summary.units_failed += 1;
                return;
            }
        };
        debug!(section = %section.name, pages = pages.len(), "migrating section");
        for page in &pages {
            match self.migrate_page(site_id, notebook, section, page) {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    let title = page.title.clone().unwrap_or_else(|| UNTITLED.to_string());
                    error!(
                        page = %page.id,
                        title = %title,
                        url = page.web_url.as_deref().unwrap_or_default(),
                        error = %e,
                        "page migration failed"
                    );
                    summary.failed += 1;
                    summary.failures.push(PageFailure {
                        page_id: page.id.clone(),
                        title,
                        source_url: page.web_url.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    /// Imports one page, creating or replacing its destination page.
    pub fn migrate_page(
        &mut self,
        site_id: &str,
        notebook: &Notebook,
        section: &Section,
        page: &PageMeta,
    ) -> Result<PageOutcome> {
        let limits = self.config.limits;
        let key = page_key(site_id, &notebook.id, &section.id, &page.id);
        let fetched = self.fetcher.fetch(&page_content_url(site_id, &page.id))?;
        let sum = checksum(&fetched.bytes);
        if self.config.skip_unchanged && self.state.is_unchanged(&key, &sum) {
            debug!(page = %page.id, "unchanged since last run");
            return Ok(PageOutcome::Skipped);
        }
        let html = String::from_utf8_lossy(&fetched.bytes).into_owned();
        let props = page_properties(page, section, notebook, &limits);

        if self.config.dry_run {
            let doc = html_to_document(&html, &limits);
            if doc.truncated > 0 {
                self.truncated.push(props.title.clone());
            }
            info!(
                title = %props.title,
                blocks = doc.blocks.len(),
                tables = doc.tables.len(),
                "dry run"
            );
            return Ok(PageOutcome::DryRun {
                blocks: doc.blocks.len(),
                tables: doc.tables.len(),
            });
        }

        let doc = {
            let mut resolver = ResourceResolver::new(
                site_id,
                &mut *self.fetcher,
                &mut *self.sink,
                limits.max_upload_bytes,
            );
            html_to_document_with_resolver(&html, &limits, &mut resolver)
        };
        let (blocks, split_dropped) = chunk::validate_counted(doc.blocks, &limits);
        let dropped = doc.truncated + split_dropped;
        if dropped > 0 {
            warn!(title = %props.title, dropped, "page content truncated");
            self.truncated.push(props.title.clone());
        }

        let delay = self.config.append_delay;
        let database_id = self.config.database_id.as_str();
        let existing = self.sink.find_page_by_source_id(database_id, &page.id)?;
        let (page_id, outcome) = match existing {
            Some(id) => {
                self.sink.update_page(&id, &props)?;
                let removed = clear_children(&mut *self.sink, &id)?;
                debug!(page = %id, removed, "cleared previous content");
                append_batched(&mut *self.sink, &id, &blocks, limits.append_batch, delay)?;
                (id.clone(), PageOutcome::Updated(id))
            }
            None => {
                let split = blocks.len().min(limits.max_create_children);
                let id = self.sink.create_page(database_id, &props, &blocks[..split])?;
                append_batched(
                    &mut *self.sink,
                    &id,
                    &blocks[split..],
                    limits.append_batch,
                    delay,
                )?;
                (id.clone(), PageOutcome::Created(id))
            }
        };

        for table in &doc.tables {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            let block = table_block(table, limits.max_span_chars);
            let block = chunk::split_block(block, &limits);
            self.sink.append_children(&page_id, &block)?;
        }

        self.state.set(&key, &page_id, &sum)?;
        info!(title = %props.title, page = %page_id, "page migrated");
        Ok(outcome)
    }

    /// Second pass over the destination database rewriting internal links.
    pub fn resolve_links(&mut self) -> Result<LinkReport> {
        if self.config.dry_run {
            return Ok(LinkReport::default());
        }
        LinkResolver::new(&mut *self.sink, self.config.limits.max_link_scan_depth)
            .run(&self.config.database_id)
    }
}
