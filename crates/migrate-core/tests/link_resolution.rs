mod common;

use common::{config, page, FakeFetch, FakeOrigin, FakeSink};
use migrate_core::links::{LinkResolver, UNRESOLVED_LINK_MARKER};
use migrate_core::types::plain_text;
use migrate_core::{Block, Migrator};

fn link_to(page_guid: &str, label: &str) -> String {
    format!(
        r#"<a href="onenote:https://contoso/Notes/Work.one#{label}&amp;section-id={{S-1}}&amp;page-id={{{page_guid}}}&amp;end">{label}</a>"#
    )
}

fn migrate(sink: &mut FakeSink, pages: &[(&str, &str, String)]) {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&dir.path().join("state.json"));
    let metas = pages.iter().map(|(id, title, _)| page(id, title)).collect();
    let mut origin = FakeOrigin::single_section(metas);
    let mut fetch = FakeFetch::default();
    for (id, _, html) in pages {
        fetch.serve_page(id, html);
    }
    let summary = Migrator::new(&cfg, &mut origin, &mut fetch, sink)
        .run()
        .unwrap();
    assert_eq!(summary.created, pages.len());
}

fn first_span_of(sink: &FakeSink, page_id: &str) -> (String, Option<String>) {
    let blocks = sink.page_blocks(page_id);
    let text = blocks[0].rich_text().unwrap();
    let linked = text.iter().find(|s| s.link.is_some()).unwrap();
    (linked.content.clone(), linked.link.clone())
}

#[test]
fn internal_links_point_at_destination_pages() {
    let mut sink = FakeSink {
        page_size: 1,
        ..FakeSink::default()
    };
    migrate(
        &mut sink,
        &[
            ("1-aaa!1-s", "Index", format!("<p>See {}</p>", link_to("BBB", "Plan"))),
            ("1-bbb!1-s", "Plan", "<p>The plan</p>".to_string()),
        ],
    );
    let index_id = sink.page_by_source("1-aaa!1-s").unwrap().id.clone();
    let plan_id = sink.page_by_source("1-bbb!1-s").unwrap().id.clone();

    let (content, _) = first_span_of(&sink, &index_id);
    assert!(content.ends_with(UNRESOLVED_LINK_MARKER));

    let report = LinkResolver::new(&mut sink, 4).run(common::DATABASE_ID).unwrap();
    assert_eq!(report.pages_scanned, 2);
    assert_eq!(report.links_resolved, 1);
    assert_eq!(report.links_unresolved, 0);
    assert_eq!(report.blocks_updated, 1);

    let (content, link) = first_span_of(&sink, &index_id);
    assert_eq!(content, "Plan");
    assert_eq!(
        link.as_deref(),
        Some(format!("https://www.notion.so/{}", plan_id.replace('-', "")).as_str())
    );
}

#[test]
fn missing_target_keeps_marker() {
    let mut sink = FakeSink::default();
    migrate(
        &mut sink,
        &[(
            "1-aaa!1-s",
            "Index",
            format!("<p>{}</p>", link_to("ZZZ", "Elsewhere")),
        )],
    );
    let index_id = sink.pages[0].id.clone();
    let writes = sink.writes;

    let report = LinkResolver::new(&mut sink, 4).run(common::DATABASE_ID).unwrap();
    assert_eq!(report.links_resolved, 0);
    assert_eq!(report.links_unresolved, 1);
    assert_eq!(sink.writes, writes);

    let (content, link) = first_span_of(&sink, &index_id);
    assert_eq!(content, format!("Elsewhere{UNRESOLVED_LINK_MARKER}"));
    assert!(link.unwrap().starts_with("onenote:"));
}

#[test]
fn nested_list_links_are_resolved_within_depth() {
    let mut sink = FakeSink::default();
    let html = format!(
        "<ul><li>top<ul><li>mid {}</li></ul></li></ul>",
        link_to("BBB", "Target")
    );
    migrate(
        &mut sink,
        &[
            ("1-aaa!1-s", "Index", html),
            ("1-bbb!1-s", "Target", "<p>t</p>".to_string()),
        ],
    );
    let index_id = sink.page_by_source("1-aaa!1-s").unwrap().id.clone();

    let shallow = LinkResolver::new(&mut sink, 1).run(common::DATABASE_ID).unwrap();
    assert_eq!(shallow.links_resolved, 0);

    let report = LinkResolver::new(&mut sink, 4).run(common::DATABASE_ID).unwrap();
    assert_eq!(report.links_resolved, 1);

    let top_id = sink.child_ids(&index_id)[0].clone();
    let mid_id = sink.child_ids(&top_id)[0].clone();
    let mid = &sink.blocks[&mid_id];
    assert!(matches!(mid, Block::BulletedListItem { .. }));
    assert_eq!(plain_text(mid.rich_text().unwrap()), "mid Target");
}

#[test]
fn failing_page_is_isolated() {
    let mut sink = FakeSink::default();
    migrate(
        &mut sink,
        &[
            ("1-aaa!1-s", "Broken", format!("<p>{}</p>", link_to("CCC", "Ok"))),
            ("1-bbb!1-s", "Fine", format!("<p>{}</p>", link_to("CCC", "Ok"))),
            ("1-ccc!1-s", "Ok", "<p>target</p>".to_string()),
        ],
    );
    let broken = sink.page_by_source("1-aaa!1-s").unwrap().id.clone();
    let fine = sink.page_by_source("1-bbb!1-s").unwrap().id.clone();
    sink.fail_children_of.insert(broken);

    let report = LinkResolver::new(&mut sink, 4).run(common::DATABASE_ID).unwrap();
    assert_eq!(report.pages_failed, 1);
    assert_eq!(report.links_resolved, 1);
    let (content, _) = first_span_of(&sink, &fine);
    assert_eq!(content, "Ok");
}
