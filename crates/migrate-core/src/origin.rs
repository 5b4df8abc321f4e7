use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::config::NotebookSelector;
use crate::error::Result;
use crate::resource::GRAPH_BASE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notebook {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionGroup {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub id: String,
    pub name: String,
    /// Path of section-group names leading to this section, outermost first.
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub id: String,
    pub title: Option<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupParent<'a> {
    Notebook(&'a str),
    Group(&'a str),
}

/// Read-only listing of the source notebooks.
pub trait Origin {
    /// Resolves a site URL to the site identifier used by every other call.
    fn resolve_site(&mut self, site_url: &str) -> Result<String>;

    fn list_notebooks(&mut self, site_id: &str) -> Result<Vec<Notebook>>;

    /// Sections directly under a notebook or section group.
    fn list_sections(&mut self, site_id: &str, parent: GroupParent<'_>) -> Result<Vec<Section>>;

    fn list_section_groups(
        &mut self,
        site_id: &str,
        parent: GroupParent<'_>,
    ) -> Result<Vec<SectionGroup>>;

    /// Pages of a section, optionally only those modified on or after `since`.
    fn list_pages(
        &mut self,
        site_id: &str,
        section_id: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<PageMeta>>;
}

/// Endpoint serving a page's HTML content.
pub fn page_content_url(site_id: &str, page_id: &str) -> String {
    format!("{GRAPH_BASE}/sites/{site_id}/onenote/pages/{page_id}/content")
}

/// Every section of a notebook, including those nested in section groups up
/// to `max_depth` levels. A group that fails to list is skipped on its own.
pub fn collect_sections<O: Origin + ?Sized>(
    origin: &mut O,
    site_id: &str,
    notebook_id: &str,
    max_depth: usize,
) -> Result<Vec<Section>> {
    let mut sections = origin.list_sections(site_id, GroupParent::Notebook(notebook_id))?;
    let groups = match origin.list_section_groups(site_id, GroupParent::Notebook(notebook_id)) {
        Ok(groups) => groups,
        Err(e) => {
            warn!(notebook = notebook_id, error = %e, "could not list section groups");
            Vec::new()
        }
    };
    for group in groups {
        collect_group(origin, site_id, &group, &[], 1, max_depth, &mut sections);
    }
    Ok(sections)
}

fn collect_group<O: Origin + ?Sized>(
    origin: &mut O,
    site_id: &str,
    group: &SectionGroup,
    path: &[String],
    depth: usize,
    max_depth: usize,
    out: &mut Vec<Section>,
) {
    if depth > max_depth {
        debug!(group = %group.name, depth, "section group below depth limit");
        return;
    }
    let mut path = path.to_vec();
    path.push(group.name.clone());

    match origin.list_sections(site_id, GroupParent::Group(&group.id)) {
        Ok(sections) => out.extend(sections.into_iter().map(|mut s| {
            s.groups = path.clone();
            s
        })),
        Err(e) => warn!(group = %group.name, error = %e, "could not list group sections"),
    }
    match origin.list_section_groups(site_id, GroupParent::Group(&group.id)) {
        Ok(children) => {
            for child in &children {
                collect_group(origin, site_id, child, &path, depth + 1, max_depth, out);
            }
        }
        Err(e) => warn!(group = %group.name, error = %e, "could not list nested groups"),
    }
}

/// Notebook chosen by id (exact, then ignoring a `1-` style prefix) or by
/// name (case-insensitive exact, then substring).
pub fn select_notebook<'n>(notebooks: &'n [Notebook], selector: &NotebookSelector) -> Option<&'n Notebook> {
    match selector {
        NotebookSelector::Id(id) => {
            let bare = strip_id_prefix(id);
            notebooks
                .iter()
                .find(|n| n.id == *id)
                .or_else(|| notebooks.iter().find(|n| strip_id_prefix(&n.id) == bare))
        }
        NotebookSelector::Name(name) => {
            let wanted = name.trim().to_lowercase();
            notebooks
                .iter()
                .find(|n| n.name.to_lowercase() == wanted)
                .or_else(|| {
                    notebooks
                        .iter()
                        .find(|n| n.name.to_lowercase().contains(&wanted))
                })
        }
    }
}

fn strip_id_prefix(id: &str) -> &str {
    match id.split_once('-') {
        Some((prefix, rest)) if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) => {
            rest
        }
        _ => id,
    }
}

/// Sections whose name equals `name`; an exact match wins over a
/// case-insensitive one.
pub fn select_sections(sections: Vec<Section>, name: &str) -> Vec<Section> {
    if sections.iter().any(|s| s.name == name) {
        return sections.into_iter().filter(|s| s.name == name).collect();
    }
    let wanted = name.to_lowercase();
    sections
        .into_iter()
        .filter(|s| s.name.to_lowercase() == wanted)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nb(id: &str, name: &str) -> Notebook {
        Notebook {
            id: id.into(),
            name: name.into(),
        }
    }

    #[test]
    fn notebook_selection() {
        let books = vec![nb("1-aaa", "Work Notes"), nb("1-bbb", "Personal")];
        let by_id = select_notebook(&books, &NotebookSelector::Id("bbb".into()));
        assert_eq!(by_id.unwrap().name, "Personal");
        let by_name = select_notebook(&books, &NotebookSelector::Name("work notes".into()));
        assert_eq!(by_name.unwrap().id, "1-aaa");
        let partial = select_notebook(&books, &NotebookSelector::Name("pers".into()));
        assert_eq!(partial.unwrap().id, "1-bbb");
        assert!(select_notebook(&books, &NotebookSelector::Name("none".into())).is_none());
    }

    #[test]
    fn section_selection_prefers_exact_case() {
        let s = |name: &str| Section {
            id: name.into(),
            name: name.into(),
            groups: Vec::new(),
        };
        let picked = select_sections(vec![s("Ideas"), s("ideas"), s("Other")], "ideas");
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "ideas");
        let picked = select_sections(vec![s("Ideas"), s("Other")], "IDEAS");
        assert_eq!(picked[0].id, "Ideas");
    }
}
