// File: ./src/model/merge.rs
use crate::model::{Event, Translated, make_event_name};
use std::collections::BTreeSet;

/// Recomputes a recurring super event from its children.
///
/// The super event spans from the earliest child start to the latest child
/// end. Any field whose value is identical across all children is copied
/// onto it; translated fields are compared one language at a time. Fields
/// that differ between children are cleared so the super event never
/// keeps a value only some occurrences still have. Keywords and audience
/// become the intersection over all children.
pub fn merge_into_super_event(super_event: &mut Event, children: &[&Event], languages: &[String]) {
    if children.is_empty() {
        return;
    }

    // Children without a start time sort last.
    if let Some(first) = children
        .iter()
        .min_by_key(|e| (e.start_time.is_none(), e.start_time))
    {
        super_event.start_time = first.start_time;
        super_event.has_start_time = first.has_start_time;
    }
    match children
        .iter()
        .filter(|e| e.end_time.is_some())
        .max_by_key(|e| e.end_time)
    {
        Some(last) => {
            super_event.end_time = last.end_time;
            super_event.has_end_time = last.has_end_time;
        }
        None => {
            super_event.end_time = None;
            super_event.has_end_time = false;
        }
    }

    let mut langs: BTreeSet<String> = languages.iter().cloned().collect();
    for child in children {
        langs.extend(child.name.languages().map(str::to_string));
        langs.extend(child.headline.languages().map(str::to_string));
    }

    macro_rules! merge_translated {
        ($field:ident) => {
            for lang in &langs {
                let first = children[0].$field.get(lang);
                let common = children.iter().all(|c| c.$field.get(lang) == first);
                super_event
                    .$field
                    .set(lang, if common { first.map(str::to_string) } else { None });
            }
        };
    }

    macro_rules! merge_scalar {
        ($field:ident) => {
            if children.iter().all(|c| c.$field == children[0].$field) {
                super_event.$field = children[0].$field.clone();
            }
        };
    }

    macro_rules! merge_set {
        ($field:ident) => {
            let first: BTreeSet<_> = children[0].$field.iter().cloned().collect();
            let common = children
                .iter()
                .all(|c| c.$field.iter().cloned().collect::<BTreeSet<_>>() == first);
            super_event.$field = if common {
                first.into_iter().collect()
            } else {
                Vec::new()
            };
        };
    }

    merge_translated!(info_url);
    merge_translated!(description);
    merge_translated!(short_description);
    merge_translated!(headline);
    merge_translated!(secondary_headline);
    merge_translated!(provider);
    merge_translated!(location_extra_info);

    merge_scalar!(publisher);
    merge_scalar!(data_source);
    super_event.location = if children.iter().all(|c| c.location == children[0].location) {
        children[0].location.clone()
    } else {
        None
    };

    merge_set!(images);
    merge_set!(offers);
    merge_set!(external_links);

    let mut name = Translated::new();
    for lang in &langs {
        let value = match super_event.headline.get(lang) {
            Some(headline) => {
                make_event_name(Some(headline), super_event.secondary_headline.get(lang))
            }
            // Headlines vary between occurrences; keep what they share.
            None => common_name_prefix(children.iter().filter_map(|c| c.name.get(lang))),
        };
        name.set(lang, value);
    }
    super_event.name = name;

    super_event.keywords = intersect(children.iter().map(|c| &c.keywords));
    super_event.audience = intersect(children.iter().map(|c| &c.audience));
}

fn intersect<'a, I>(mut sets: I) -> BTreeSet<String>
where
    I: Iterator<Item = &'a BTreeSet<String>>,
{
    let Some(first) = sets.next() else {
        return BTreeSet::new();
    };
    sets.fold(first.clone(), |acc, s| acc.intersection(s).cloned().collect())
}

/// Longest run of leading whole words shared by every name, without
/// trailing separator punctuation.
pub fn common_name_prefix<'a, I>(names: I) -> Option<String>
where
    I: Iterator<Item = &'a str>,
{
    let names: Vec<Vec<&str>> = names.map(|n| n.split_whitespace().collect()).collect();
    let first = names.first()?;

    let mut shared = 0;
    while shared < first.len()
        && names
            .iter()
            .all(|words| words.get(shared) == Some(&first[shared]))
    {
        shared += 1;
    }

    let prefix = first[..shared].join(" ");
    let prefix = prefix
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '–' | '-' | ':' | ',' | '|'))
        .to_string();
    if prefix.is_empty() { None } else { Some(prefix) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn child(id: &str, day: u32, headline: &str) -> Event {
        let mut e = Event::new(id, "kulke", "ahjo:u4804001050");
        e.start_time = Some(Utc.with_ymd_and_hms(2017, 4, day, 16, 0, 0).unwrap());
        e.has_start_time = true;
        e.end_time = Some(Utc.with_ymd_and_hms(2017, 4, day, 18, 0, 0).unwrap());
        e.has_end_time = true;
        e.headline.set("fi", Some(headline.to_string()));
        e.name.set("fi", Some(headline.to_string()));
        e.description.set("fi", Some("<p>Sama kuvaus</p>".into()));
        e.location = Some("tprek:7254".into());
        e
    }

    #[test]
    fn test_super_event_spans_children_and_keeps_common_fields() {
        let mut a = child("kulke:1", 3, "Satutunti");
        let mut b = child("kulke:2", 10, "Satutunti");
        a.keywords = ["yso:p4354", "kulke:105"].iter().map(|s| s.to_string()).collect();
        b.keywords = ["yso:p4354"].iter().map(|s| s.to_string()).collect();
        b.info_url.set("fi", Some("http://example.com/b".into()));

        let mut sup = Event::new("linkedevents:agg-1", "kulke", "ahjo:u4804001050");
        merge_into_super_event(&mut sup, &[&b, &a], &["fi".to_string()]);

        assert_eq!(sup.start_time, a.start_time);
        assert_eq!(sup.end_time, b.end_time);
        assert_eq!(sup.description.get("fi"), Some("<p>Sama kuvaus</p>"));
        assert_eq!(sup.info_url.get("fi"), None);
        assert_eq!(sup.location.as_deref(), Some("tprek:7254"));
        assert_eq!(sup.name.get("fi"), Some("Satutunti"));
        assert_eq!(sup.keywords.len(), 1);
        assert!(sup.keywords.contains("yso:p4354"));
    }

    #[test]
    fn test_differing_headlines_use_common_prefix() {
        let a = child("kulke:1", 3, "Lauantaijazz: Trio X");
        let b = child("kulke:2", 10, "Lauantaijazz: Kvartetti Y");

        let mut sup = Event::new("linkedevents:agg-1", "kulke", "ahjo:u4804001050");
        merge_into_super_event(&mut sup, &[&a, &b], &["fi".to_string()]);
        assert_eq!(sup.headline.get("fi"), None);
        assert_eq!(sup.name.get("fi"), Some("Lauantaijazz"));
    }

    #[test]
    fn test_common_name_prefix_whole_words_only() {
        let names = ["Jazz night", "Jazzfest"];
        assert_eq!(common_name_prefix(names.iter().copied()), None);

        let names = ["Tanssi – ilta 1", "Tanssi – ilta 2"];
        assert_eq!(
            common_name_prefix(names.iter().copied()).as_deref(),
            Some("Tanssi – ilta")
        );
    }
}
