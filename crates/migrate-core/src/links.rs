use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::remote::{all_children, all_pages, RemotePage, Sink};
use crate::types::{Block, RichTextSpan};

/// Appended to the display text of internal links until they are rewritten.
pub const UNRESOLVED_LINK_MARKER: &str = " (⚠ unresolved link)";

const DESTINATION_BASE: &str = "https://www.notion.so";

static BRACED_PAGE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)page-id=(?:\{|%7B)([^}%&#]+)(?:\}|%7D)").unwrap());
static PAGE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)page-id=([^&#{}%]+)").unwrap());
static PAGE_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)/onenote/pages/([^/?#]+)").unwrap());
static GRAPH_PAGE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+-([^!]+)!").unwrap());

/// Whether `href` points at another page of the source notebook.
pub fn is_internal_link(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    lower.starts_with("onenote:")
        || lower.contains("page-id=")
        || lower.contains("section-id=")
        || lower.contains("/onenote/pages/")
}

/// Page identifier embedded in an internal link, normalised.
pub fn extract_source_id(href: &str) -> Option<String> {
    [&*BRACED_PAGE_ID, &*PAGE_ID, &*PAGE_PATH]
        .iter()
        .find_map(|re| re.captures(href))
        .map(|caps| normalize_source_id(&caps[1]))
        .filter(|id| !id.is_empty())
}

pub fn normalize_source_id(id: &str) -> String {
    id.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .to_lowercase()
}

pub fn destination_url(page: &RemotePage) -> String {
    page.url
        .clone()
        .unwrap_or_else(|| format!("{DESTINATION_BASE}/{}", page.id.replace('-', "")))
}

/// Normalised source page id -> destination page URL.
#[derive(Debug, Clone, Default)]
pub struct LinkMapping {
    targets: HashMap<String, String>,
}

impl LinkMapping {
    pub fn from_pages(pages: &[RemotePage]) -> Self {
        let mut mapping = Self::default();
        for page in pages {
            if let Some(source) = page.source_id.as_deref().filter(|s| !s.trim().is_empty()) {
                mapping.insert(source, &destination_url(page));
            }
        }
        mapping
    }

    /// Registers a page under its id and, for service-style ids such as
    /// `1-<guid>!<n>-<guid>`, under the leading page GUID that desktop links use.
    pub fn insert(&mut self, source_id: &str, url: &str) {
        let id = normalize_source_id(source_id);
        if let Some(caps) = GRAPH_PAGE_ID.captures(&id) {
            self.targets
                .entry(caps[1].to_string())
                .or_insert_with(|| url.to_string());
        }
        self.targets.insert(id, url.to_string());
    }

    pub fn get(&self, source_id: &str) -> Option<&str> {
        self.targets
            .get(&normalize_source_id(source_id))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanOutcome {
    Untouched,
    Resolved,
    Unresolved,
}

/// Rewrites a marked internal link to its destination and drops the marker.
pub fn resolve_span(span: &mut RichTextSpan, mapping: &LinkMapping) -> SpanOutcome {
    if !span.content.contains(UNRESOLVED_LINK_MARKER) {
        return SpanOutcome::Untouched;
    }
    let target = span
        .link
        .as_deref()
        .and_then(extract_source_id)
        .and_then(|id| mapping.get(&id));
    match target {
        Some(url) => {
            span.link = Some(url.to_string());
            span.content = span.content.replace(UNRESOLVED_LINK_MARKER, "");
            SpanOutcome::Resolved
        }
        None => SpanOutcome::Unresolved,
    }
}

/// Resolves every marked span of a block; returns (resolved, unresolved).
pub fn resolve_block(block: &mut Block, mapping: &LinkMapping) -> (usize, usize) {
    let mut counts = (0, 0);
    for span in block.spans_mut() {
        match resolve_span(span, mapping) {
            SpanOutcome::Resolved => counts.0 += 1,
            SpanOutcome::Unresolved => counts.1 += 1,
            SpanOutcome::Untouched => {}
        }
    }
    counts
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub pages_scanned: usize,
    pub blocks_updated: usize,
    pub links_resolved: usize,
    pub links_unresolved: usize,
    pub pages_failed: usize,
}

/// Second pass: rewrites internal links across every page of a database.
pub struct LinkResolver<'a, S: Sink + ?Sized> {
    sink: &'a mut S,
    max_depth: usize,
}

impl<'a, S: Sink + ?Sized> LinkResolver<'a, S> {
    pub fn new(sink: &'a mut S, max_depth: usize) -> Self {
        Self { sink, max_depth }
    }

    pub fn run(&mut self, database_id: &str) -> Result<LinkReport> {
        let pages = all_pages(&mut *self.sink, database_id)?;
        let mapping = LinkMapping::from_pages(&pages);
        info!(pages = pages.len(), mapped = mapping.len(), "resolving internal links");

        let mut report = LinkReport::default();
        for page in &pages {
            report.pages_scanned += 1;
            match self.resolve_tree(&page.id, 1, &mapping, &mut report) {
                Ok(()) => {}
                Err(e) => {
                    error!(page = %page.id, error = %e, "link resolution failed for page");
                    report.pages_failed += 1;
                }
            }
        }
        info!(
            resolved = report.links_resolved,
            unresolved = report.links_unresolved,
            updated = report.blocks_updated,
            "link resolution finished"
        );
        Ok(report)
    }

    fn resolve_tree(
        &mut self,
        parent_id: &str,
        depth: usize,
        mapping: &LinkMapping,
        report: &mut LinkReport,
    ) -> Result<()> {
        for child in all_children(&mut *self.sink, parent_id)? {
            if let Some(mut block) = child.block {
                let (resolved, unresolved) = resolve_block(&mut block, mapping);
                report.links_unresolved += unresolved;
                if resolved > 0 {
                    self.sink.update_block(&child.id, &block)?;
                    report.links_resolved += resolved;
                    report.blocks_updated += 1;
                    debug!(block = %child.id, resolved, "rewrote internal links");
                }
            }
            if child.has_children && depth < self.max_depth {
                self.resolve_tree(&child.id, depth + 1, mapping, report)?;
            }
        }
        Ok(())
    }
}
