use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::error::{MigrateError, Result};
use crate::remote::{ContentFetch, Sink};
use crate::types::ResourceRef;

pub mod sniff;

pub use sniff::{choose_content_type, safe_filename, sniff_content_type};

pub const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

static RESOURCE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/onenote/resources/([^/?#]+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    Image,
    File,
    /// An embedded object; image or file depending on its type.
    Object { declared_type: Option<String> },
}

/// One binary referenced by the page markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub url: String,
    pub kind: ResourceKind,
    /// Preferred display name, e.g. an attachment's original filename.
    pub name_hint: Option<String>,
}

impl ResourceRequest {
    pub fn declared_type(&self) -> Option<&str> {
        match &self.kind {
            ResourceKind::Object { declared_type } => declared_type.as_deref(),
            _ => None,
        }
    }
}

/// Rewrites a resource URL onto the canonical site-scoped binary endpoint.
pub fn canonical_resource_url(site_id: &str, raw: &str) -> String {
    if !site_id.is_empty() {
        if let Some(caps) = RESOURCE_ID.captures(raw) {
            return format!(
                "{GRAPH_BASE}/sites/{site_id}/onenote/resources/{}/content",
                &caps[1]
            );
        }
    }
    raw.replace("/siteCollections/", "/sites/")
}

/// Base name for an uploaded resource when the markup supplies none.
pub fn url_basename(raw: &str) -> String {
    let segments: Vec<String> = match Url::parse(raw) {
        Ok(url) => url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).map(str::to_string).collect())
            .unwrap_or_default(),
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .split('/')
            .filter(|seg| !seg.is_empty())
            .map(str::to_string)
            .collect(),
    };
    let mut rev = segments.iter().rev();
    match rev.next().map(String::as_str) {
        // Binary endpoints end in a generic segment; the id before it names the file.
        Some("$value") | Some("content") => rev.next().cloned().unwrap_or_else(|| "file".into()),
        Some(name) => name.to_string(),
        None => "file".to_string(),
    }
}

/// Per-document cache of uploaded resources, keyed by the raw URL.
#[derive(Debug, Default)]
pub struct ResourceCache {
    entries: HashMap<String, ResourceRef>,
}

impl ResourceCache {
    pub fn get(&self, url: &str) -> Option<&ResourceRef> {
        self.entries.get(url)
    }

    pub fn insert(&mut self, url: &str, resource: ResourceRef) {
        self.entries.insert(url.to_string(), resource);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fetches page resources from the origin and re-uploads them to the sink.
pub struct ResourceResolver<'a> {
    site_id: &'a str,
    fetcher: &'a mut dyn ContentFetch,
    sink: &'a mut dyn Sink,
    max_bytes: usize,
    cache: ResourceCache,
}

impl<'a> ResourceResolver<'a> {
    pub fn new(
        site_id: &'a str,
        fetcher: &'a mut dyn ContentFetch,
        sink: &'a mut dyn Sink,
        max_bytes: usize,
    ) -> Self {
        Self {
            site_id,
            fetcher,
            sink,
            max_bytes,
            cache: ResourceCache::default(),
        }
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Uploads the resource once per document; repeated URLs reuse the first upload.
    pub fn fetch_and_upload(&mut self, request: &ResourceRequest) -> Result<ResourceRef> {
        if let Some(hit) = self.cache.get(&request.url) {
            debug!(url = %request.url, "resource cache hit");
            return Ok(hit.clone());
        }
        let url = canonical_resource_url(self.site_id, &request.url);
        let fetched = self.fetcher.fetch(&url)?;
        if fetched.bytes.is_empty() {
            return Err(MigrateError::resource(&request.url, "empty body"));
        }
        if fetched.bytes.len() > self.max_bytes {
            return Err(MigrateError::resource(
                &request.url,
                format!("{} bytes exceeds {} byte limit", fetched.bytes.len(), self.max_bytes),
            ));
        }

        let base = request
            .name_hint
            .clone()
            .unwrap_or_else(|| url_basename(&request.url));
        let content_type = choose_content_type(
            &fetched.bytes,
            fetched.content_type.as_deref(),
            request.declared_type(),
            &base,
        );
        let (filename, content_type) = safe_filename(&base, &content_type);

        let upload_id = self
            .sink
            .upload_binary(&filename, &fetched.bytes, &content_type)
            .ok_or_else(|| MigrateError::resource(&request.url, "upload failed"))?;
        let resource = ResourceRef {
            source_url: request.url.clone(),
            content_type,
            filename,
            upload_id,
        };
        self.cache.insert(&request.url, resource.clone());
        Ok(resource)
    }

    /// Like [`fetch_and_upload`](Self::fetch_and_upload) but logs and omits failures.
    pub fn resolve(&mut self, request: &ResourceRequest) -> Option<ResourceRef> {
        match self.fetch_and_upload(request) {
            Ok(resource) => Some(resource),
            Err(e) => {
                warn!(url = %request.url, error = %e, "skipping resource");
                None
            }
        }
    }
}
