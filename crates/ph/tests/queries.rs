mod common;

use common::{Harness, skillet_yaml};
use ph_core::PanhandlerError;
use ph_core::error::{CollectionError, SkilletError};
use ph_core::query::ALL_SKILLETS_COLLECTION;
use ph_core::types::{CreateCollectionInput, EventBody};
use ph_db::schema;
use serde_json::json;
use std::collections::BTreeMap;

fn labelled_catalog(h: &Harness) {
    h.remote_skillet(
        "alpha",
        "both",
        &skillet_yaml(
            "both",
            "python3",
            "labels:\n  collection:\n    - Foo\n    - Bar\n  order: 2\n",
        ),
    );
    h.remote_skillet(
        "alpha",
        "foo",
        &skillet_yaml("foo-only", "python3", "labels:\n  collection: Foo\n  order: 1\n"),
    );
    h.remote_skillet(
        "alpha",
        "app",
        &skillet_yaml("the-app", "app", "labels:\n  collection: Foo\n"),
    );
    h.remote_skillet("alpha", "plain", &skillet_yaml("plain", "workflow", ""));
    h.import("alpha", "alpha");
}

fn names(skillets: &[ph_core::types::SkilletMetadata]) -> Vec<&str> {
    skillets.iter().map(|skillet| skillet.name.as_str()).collect()
}

#[test]
fn collection_summary_counts_non_app_skillets() {
    let h = Harness::new();
    labelled_catalog(&h);

    let summary = h.app.skillets().collection_summary().unwrap();
    let entries: Vec<(&str, usize)> = summary
        .iter()
        .map(|entry| (entry.name.as_str(), entry.count))
        .collect();
    assert_eq!(
        entries,
        [(ALL_SKILLETS_COLLECTION, 3), ("Bar", 1), ("Foo", 2)]
    );
    assert_eq!(summary[1].related, ["Foo"]);
    assert_eq!(summary[2].related, ["Bar"]);
}

#[test]
fn collection_members_follow_the_order_label() {
    let h = Harness::new();
    labelled_catalog(&h);

    let foo = h.app.skillets().collection("Foo").unwrap();
    assert_eq!(names(&foo), ["foo-only", "both", "the-app"]);

    let all = h.app.skillets().collection(ALL_SKILLETS_COLLECTION).unwrap();
    assert_eq!(names(&all), ["foo-only", "both", "plain"]);
}

#[test]
fn summary_is_rebuilt_when_the_index_changes() {
    let h = Harness::new();
    labelled_catalog(&h);
    assert_eq!(h.app.skillets().collection_summary().unwrap().len(), 3);

    h.remote_skillet(
        "alpha",
        "baz",
        &skillet_yaml("baz", "python3", "labels:\n  collection: Baz\n"),
    );
    h.app.repositories().update(&h.ctx(), "alpha", None).unwrap();

    let summary = h.app.skillets().collection_summary().unwrap();
    let collections: Vec<&str> = summary.iter().map(|entry| entry.name.as_str()).collect();
    assert_eq!(collections, [ALL_SKILLETS_COLLECTION, "Bar", "Baz", "Foo"]);
    assert_eq!(summary[0].count, 4);
}

#[test]
fn label_values_keep_first_appearance_order() {
    let h = Harness::new();
    labelled_catalog(&h);

    let bar = h.app.skillets().list_by_label("collection", "Bar").unwrap();
    assert_eq!(names(&bar), ["both"]);
    assert_eq!(
        h.app.skillets().label_values("collection").unwrap(),
        ["Foo", "Bar"]
    );
    assert_eq!(h.app.skillets().label_values("order").unwrap(), ["2", "1"]);
    assert!(h.app.skillets().label_values("missing").unwrap().is_empty());
}

#[test]
fn listing_is_sorted_and_survives_refresh() {
    let h = Harness::new();
    labelled_catalog(&h);

    let cached = h.app.skillets().list(false).unwrap();
    assert_eq!(names(&cached), ["both", "foo-only", "plain", "the-app"]);
    let refreshed = h.app.skillets().list(true).unwrap();
    assert_eq!(cached, refreshed);
}

#[test]
fn unknown_skillet_is_not_found() {
    let h = Harness::new();
    assert!(matches!(
        h.app.skillets().get("nope"),
        Err(PanhandlerError::Skillet(SkilletError::NotFound { .. }))
    ));
}

#[test]
fn render_substitutes_defaults_and_overrides() {
    let h = Harness::new();
    h.remote_skillet(
        "alpha",
        "tmpl",
        "name: tmpl\ntype: template\nvariables:\n  - name: hostname\n    default: fw1\n  - name: dns\n    default: 8.8.8.8\nsnippets:\n  - name: config\n    file: config.txt\n",
    );
    h.remote_file(
        "alpha",
        "tmpl/config.txt",
        "hostname {{ hostname }}\ndns {{dns}}\n",
    );
    let outcome = h.import("alpha", "alpha");
    assert!(outcome.warnings.is_empty());

    let context = BTreeMap::from([("hostname".to_string(), json!("edge-01"))]);
    let rendered = h.app.skillets().render("tmpl", &context).unwrap();
    assert_eq!(rendered["config"], "hostname edge-01\ndns 8.8.8.8\n");
}

#[test]
fn favorites_track_indexed_skillets() {
    let h = Harness::new();
    labelled_catalog(&h);
    let ctx = h.ctx();

    assert!(matches!(
        h.app.favorites().create(&ctx, CreateCollectionInput::default()),
        Err(PanhandlerError::Collection(CollectionError::InvalidInput { .. }))
    ));
    let created = h
        .app
        .favorites()
        .create(
            &ctx,
            CreateCollectionInput {
                name: "mine".to_string(),
                description: "daily drivers".to_string(),
                categories: vec!["panos".to_string()],
            },
        )
        .unwrap();
    assert!(created.skillets.is_empty());

    h.app
        .favorites()
        .set_for_skillet(&ctx, "plain", &["mine".to_string()])
        .unwrap();
    h.app
        .favorites()
        .set_for_skillet(&ctx, "both", &["mine".to_string()])
        .unwrap();
    assert_eq!(
        names(&h.app.favorites().skillets("mine").unwrap()),
        ["plain", "both"]
    );
    assert_eq!(
        h.app.favorites().collections_for_skillet("plain").unwrap(),
        ["mine"]
    );

    assert!(matches!(
        h.app
            .favorites()
            .set_for_skillet(&ctx, "ghost", &["mine".to_string()]),
        Err(PanhandlerError::Skillet(SkilletError::NotFound { .. }))
    ));
    assert!(matches!(
        h.app
            .favorites()
            .set_for_skillet(&ctx, "plain", &["missing".to_string()]),
        Err(PanhandlerError::Collection(CollectionError::NotFound { .. }))
    ));

    h.remove_remote_dir("alpha", "plain");
    h.app.repositories().update(&ctx, "alpha", None).unwrap();
    assert_eq!(names(&h.app.favorites().skillets("mine").unwrap()), ["both"]);

    h.app.favorites().delete(&ctx, "mine").unwrap();
    assert!(h.app.favorites().list().unwrap().is_empty());
    assert!(matches!(
        h.app.favorites().skillets("mine"),
        Err(PanhandlerError::Collection(CollectionError::NotFound { .. }))
    ));
}

#[test]
fn events_page_by_sequence() {
    let h = Harness::new();
    labelled_catalog(&h);
    let ctx = h.ctx();
    h.app
        .favorites()
        .create(
            &ctx,
            CreateCollectionInput {
                name: "mine".to_string(),
                ..CreateCollectionInput::default()
            },
        )
        .unwrap();

    let all = h.app.events().list(None, None).unwrap();
    assert!(all.windows(2).all(|pair| pair[0].seq < pair[1].seq));
    assert!(matches!(
        &all.last().unwrap().body,
        EventBody::FavoriteCreated { collection } if collection.name == "mine"
    ));

    let page = h.app.events().list(Some(all[0].seq), Some(2)).unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].seq, all[1].seq);
}

#[test]
fn corrupt_stored_record_is_left_out_of_listings() {
    let h = Harness::new();
    h.remote_skillet(
        "alpha",
        "a",
        &skillet_yaml("a", "python3", "labels:\n  collection: Foo\n"),
    );
    h.remote_skillet(
        "alpha",
        "b",
        &skillet_yaml("b", "python3", "labels:\n  collection: Foo\n"),
    );
    h.import("alpha", "alpha");

    let conn = schema::open_and_migrate(&h.app.settings().database_path).unwrap();
    let changed = conn
        .execute("UPDATE skillets SET metadata_json = '{bad' WHERE name = 'b'", ())
        .unwrap();
    assert_eq!(changed, 1);

    assert_eq!(names(&h.app.skillets().list(true).unwrap()), ["a"]);
    assert_eq!(names(&h.app.skillets().collection("Foo").unwrap()), ["a"]);
    assert_eq!(h.app.skillets().label_values("collection").unwrap(), ["Foo"]);
    assert!(matches!(
        h.app.skillets().get("b"),
        Err(PanhandlerError::Skillet(SkilletError::NotFound { .. }))
    ));
}
