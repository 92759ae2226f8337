// File: tests/event_query.rs
use chrono::{TimeZone, Utc};
use linkedevents::catalog::{Catalog, Fixture};
use linkedevents::config::Config;
use linkedevents::model::{Event, Place, PublicationStatus, Translated};
use linkedevents::query::{
    EventQuery, Includes, RenderOptions, Viewer, get_event, list_events, render_event,
};
use serde_json::Value;

const PUBLISHER: &str = "ahjo:u4804001050";

fn event(id: &str, name: &str, day: u32) -> Event {
    let mut e = Event::new(id, "kulke", PUBLISHER);
    e.name.set("fi", Some(name.to_string()));
    e.start_time = Some(Utc.with_ymd_and_hms(2017, 4, day, 15, 0, 0).unwrap());
    e.has_start_time = true;
    e.last_modified_time = Some(Utc.with_ymd_and_hms(2017, 3, day, 0, 0, 0).unwrap());
    e
}

/// Two occurrences under one recurring super event, a standalone event in
/// another data source and a draft.
fn sample_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog.load_fixture(Fixture {
        places: vec![Place {
            id: "tprek:7254".into(),
            origin_id: "7254".into(),
            data_source: "tprek".into(),
            name: Translated::from_pairs([("fi", "Annantalo")]),
            street_address: Translated::new(),
            postal_code: None,
            address_locality: Translated::new(),
            divisions: vec!["ocd-division/country:fi/kunta:helsinki".into()],
        }],
        ..Default::default()
    });

    let now = Utc::now();
    let agg = catalog.create_recurring_aggregate("kulke", PUBLISHER, now);
    let super_id = catalog.aggregate(agg).unwrap().super_event.clone().unwrap();

    for (id, day) in [("kulke:1", 3), ("kulke:2", 10)] {
        let mut e = event(id, "Satutunti", day);
        e.location = Some("tprek:7254".into());
        e.keywords.insert("yso:p4354".into());
        catalog.insert_event(e);
        catalog.add_aggregate_member(agg, id);
        catalog.set_super_event(id, Some(&super_id));
    }

    let mut other = event("helmet:9", "Jazz-ilta", 20);
    other.data_source = "helmet".into();
    other.in_language.insert("en".into());
    catalog.insert_event(other);

    let mut draft = event("kulke:3", "Luonnos", 25);
    draft.publication_status = PublicationStatus::Draft;
    catalog.insert_event(draft);
    catalog
}

fn ids(page: &linkedevents::query::Page) -> Vec<String> {
    page.data
        .iter()
        .map(|v| v["id"].as_str().unwrap().to_string())
        .collect()
}

fn list(catalog: &Catalog, filters: &[&str]) -> linkedevents::query::Page {
    let config = Config::default();
    let opts = RenderOptions::from_config(&config, Includes::none()).unwrap();
    let query = EventQuery::from_filters(filters).unwrap();
    list_events(catalog, &query, &Viewer::anonymous(), &config, &opts)
}

#[test]
fn test_default_listing_hides_drafts() {
    let catalog = sample_catalog();
    let page = list(&catalog, &[]);
    // two occurrences, their super event and the helmet event
    assert_eq!(page.meta.count, 4);
    assert!(!ids(&page).contains(&"kulke:3".to_string()));
}

#[test]
fn test_recurring_filters() {
    let catalog = sample_catalog();
    let page = list(&catalog, &["recurring=super"]);
    assert_eq!(ids(&page), vec!["linkedevents:agg-1"]);

    let page = list(&catalog, &["recurring=sub", "sort=start_time"]);
    assert_eq!(ids(&page), vec!["kulke:1", "kulke:2"]);

    let page = list(&catalog, &["super_event=none", "data_source=kulke"]);
    assert_eq!(ids(&page), vec!["linkedevents:agg-1"]);

    let page = list(&catalog, &["super_event_type=recurring,none"]);
    assert_eq!(page.meta.count, 4);
    let page = list(&catalog, &["super_event_type=bogus"]);
    assert_eq!(page.meta.count, 0);
}

#[test]
fn test_data_source_division_and_language_filters() {
    let catalog = sample_catalog();
    let page = list(&catalog, &["data_source!=kulke"]);
    assert_eq!(ids(&page), vec!["helmet:9"]);

    let page = list(&catalog, &["division=helsinki", "sort=id"]);
    assert_eq!(ids(&page), vec!["kulke:1", "kulke:2"]);

    let page = list(&catalog, &["language=en"]);
    assert_eq!(ids(&page), vec!["helmet:9"]);
}

#[test]
fn test_pagination_links() {
    let catalog = sample_catalog();
    let page = list(&catalog, &["page_size=3", "sort=id"]);
    assert_eq!(page.data.len(), 3);
    assert_eq!(page.meta.count, 4);
    assert!(page.meta.next.as_deref().unwrap().contains("page=2"));
    assert_eq!(page.meta.previous, None);

    let page = list(&catalog, &["page_size=3", "page=2", "sort=id"]);
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.meta.next, None);
    assert!(page.meta.previous.is_some());
}

#[test]
fn test_page_far_past_the_end_is_empty() {
    let catalog = sample_catalog();
    let page = list(&catalog, &["page=18446744073709551615", "page_size=2"]);
    assert_eq!(page.meta.count, 4);
    assert!(page.data.is_empty());
    assert_eq!(page.meta.next, None);
    assert!(page.meta.previous.is_some());
}

#[test]
fn test_draft_detail_needs_owner() {
    let catalog = sample_catalog();
    let err = get_event(&catalog, &Viewer::anonymous(), "kulke:3").unwrap_err();
    assert!(err.to_string().contains("not found"));
    assert!(get_event(&catalog, &Viewer::member_of([PUBLISHER]), "kulke:3").is_ok());
    assert!(get_event(&catalog, &Viewer::anonymous(), "kulke:404").is_err());
}

#[test]
fn test_render_event_fields_and_references() {
    let catalog = sample_catalog();
    let config = Config::default();
    let opts = RenderOptions::from_config(&config, Includes::none()).unwrap();
    let e = catalog.event("kulke:1").unwrap();
    let v = render_event(&catalog, e, &opts);

    for field in [
        "@context",
        "@id",
        "@type",
        "audience",
        "created_time",
        "custom_data",
        "data_source",
        "date_published",
        "description",
        "end_time",
        "event_status",
        "external_links",
        "id",
        "images",
        "in_language",
        "info_url",
        "keywords",
        "last_modified_time",
        "location",
        "location_extra_info",
        "name",
        "offers",
        "provider",
        "provider_contact_info",
        "publisher",
        "short_description",
        "audience_min_age",
        "audience_max_age",
        "start_time",
        "sub_events",
        "super_event",
        "super_event_type",
    ] {
        assert!(v.get(field).is_some(), "missing field {}", field);
    }
    assert_eq!(v["@type"], "Event");
    assert_eq!(v["@id"], "http://localhost:8000/v1/event/kulke:1/");
    assert_eq!(
        v["super_event"]["@id"],
        "http://localhost:8000/v1/event/linkedevents:agg-1/"
    );
    assert_eq!(
        v["location"]["@id"],
        "http://localhost:8000/v1/place/tprek:7254/"
    );
    assert_eq!(v["keywords"][0]["@id"], "http://localhost:8000/v1/keyword/yso:p4354/");
}

#[test]
fn test_includes_expand_one_level() {
    let catalog = sample_catalog();
    let config = Config::default();
    let include = Includes::parse("super_event,sub_events,location");
    let opts = RenderOptions::from_config(&config, include).unwrap();

    let child = render_event(&catalog, catalog.event("kulke:1").unwrap(), &opts);
    assert_eq!(child["location"]["name"]["fi"], "Annantalo");
    let parent = &child["super_event"];
    assert_eq!(parent["super_event_type"], "recurring");
    // The expanded super event lists its children as plain references.
    let subs = parent["sub_events"].as_array().unwrap();
    assert_eq!(subs.len(), 2);
    assert!(subs.iter().all(|s| s.get("name").is_none()));

    let sup = render_event(
        &catalog,
        catalog.event("linkedevents:agg-1").unwrap(),
        &opts,
    );
    let subs = sup["sub_events"].as_array().unwrap();
    assert_eq!(subs[0]["name"]["fi"], "Satutunti");
    assert_eq!(subs[0]["super_event"]["name"], Value::Null);
}
