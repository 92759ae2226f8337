// File: ./src/query.rs
// Event listing, detail lookup and JSON rendering.
//
// Filters arrive as `key=value` pairs, the same way they would as URL query
// parameters. Unknown keys are rejected so a typo does not silently return
// the whole catalog.
use crate::catalog::Catalog;
use crate::config::Config;
use crate::model::{Event, Keyword, Place, PublicationStatus, SuperEventType, Translated};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuperEventLink {
    /// Events without a super event.
    Missing,
    Id(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurring {
    /// Recurring super events themselves.
    Super,
    /// Members of a recurring super event.
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    StartTime,
    EndTime,
    LastModifiedTime,
    Name,
    Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (descending, name) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let field = match name {
            "start_time" => SortField::StartTime,
            "end_time" => SortField::EndTime,
            "last_modified_time" => SortField::LastModifiedTime,
            "name" => SortField::Name,
            "id" => SortField::Id,
            other => bail!("Cannot sort by '{}'", other),
        };
        Ok(Self { field, descending })
    }
}

/// Who is asking. Without authentication this is just the set of
/// organizations whose drafts may be shown.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub organizations: BTreeSet<String>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn member_of<I, S>(organizations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            organizations: organizations.into_iter().map(Into::into).collect(),
        }
    }

    fn can_see(&self, event: &Event) -> bool {
        event.publication_status == PublicationStatus::Public
            || self.organizations.contains(&event.publisher)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub text: Option<String>,
    pub data_sources: Option<BTreeSet<String>>,
    pub excluded_data_sources: BTreeSet<String>,
    pub locations: Option<BTreeSet<String>>,
    pub keywords: Option<BTreeSet<String>>,
    pub divisions: Option<BTreeSet<String>>,
    pub publishers: Option<BTreeSet<String>>,
    pub super_event: Option<SuperEventLink>,
    pub recurring: Option<Recurring>,
    /// `None` inside the set stands for "no super event type".
    pub super_event_types: Option<BTreeSet<Option<SuperEventType>>>,
    pub language: Option<String>,
    pub publication_status: Option<PublicationStatus>,
    pub admin_user: bool,
    /// Lists drafts the viewer may see alongside public events.
    pub show_all: bool,
    pub sort: Vec<SortKey>,
    pub page: usize,
    pub page_size: Option<usize>,
}

fn comma_set(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => bail!("'{}' expects true or false, got '{}'", key, value),
    }
}

/// Splits `key=value`.
pub fn parse_filter(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("Filter '{}' is not of the form key=value", raw))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

impl EventQuery {
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Self {
            page: 1,
            ..Default::default()
        };
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "text" => query.text = Some(value.to_lowercase()),
                "data_source" => query.data_sources = Some(comma_set(value)),
                "data_source!" => query.excluded_data_sources.extend(comma_set(value)),
                "location" => query.locations = Some(comma_set(value)),
                "keyword" => query.keywords = Some(comma_set(value)),
                "division" => {
                    query.divisions = Some(comma_set(value).iter().map(|d| d.to_lowercase()).collect())
                }
                "publisher" => query.publishers = Some(comma_set(value)),
                "super_event" => {
                    query.super_event = Some(match value.to_lowercase().as_str() {
                        "none" | "null" => SuperEventLink::Missing,
                        _ => SuperEventLink::Id(value.to_string()),
                    })
                }
                "recurring" => {
                    query.recurring = Some(match value.to_lowercase().as_str() {
                        "super" => Recurring::Super,
                        "sub" => Recurring::Sub,
                        other => bail!("recurring must be 'super' or 'sub', got '{}'", other),
                    })
                }
                "super_event_type" => {
                    // Unknown values are dropped; if nothing is left the
                    // filter matches no events.
                    let types = comma_set(value)
                        .iter()
                        .filter_map(|v| match v.to_lowercase().as_str() {
                            "none" | "null" => Some(None),
                            other => SuperEventType::from_str(other).ok().map(Some),
                        })
                        .collect();
                    query.super_event_types = Some(types);
                }
                "language" => query.language = Some(value.to_string()),
                "publication_status" => {
                    query.publication_status = Some(
                        PublicationStatus::from_str(&value.to_lowercase())
                            .map_err(|_| anyhow::anyhow!("Unknown publication status '{}'", value))?,
                    )
                }
                "admin_user" => query.admin_user = parse_bool(key, value)?,
                "show_all" => query.show_all = parse_bool(key, value)?,
                "sort" => {
                    query.sort = value
                        .split(',')
                        .filter(|s| !s.trim().is_empty())
                        .map(SortKey::from_str)
                        .collect::<Result<_>>()?
                }
                "page" => {
                    query.page = value
                        .parse::<usize>()
                        .ok()
                        .filter(|p| *p >= 1)
                        .with_context(|| format!("Invalid page '{}'", value))?
                }
                "page_size" => {
                    query.page_size = Some(
                        value
                            .parse()
                            .with_context(|| format!("Invalid page_size '{}'", value))?,
                    )
                }
                other => bail!("Unknown filter '{}'", other),
            }
        }
        Ok(query)
    }

    /// Parses `key=value` strings as given on the command line.
    pub fn from_filters<S: AsRef<str>>(filters: &[S]) -> Result<Self> {
        let pairs = filters
            .iter()
            .map(|f| parse_filter(f.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::from_pairs(pairs)
    }

    pub fn matches(&self, catalog: &Catalog, viewer: &Viewer, event: &Event) -> bool {
        match self.publication_status {
            Some(PublicationStatus::Draft) => {
                if event.publication_status != PublicationStatus::Draft || !viewer.can_see(event) {
                    return false;
                }
            }
            Some(PublicationStatus::Public) => {
                if event.publication_status != PublicationStatus::Public {
                    return false;
                }
            }
            None => {
                if event.publication_status != PublicationStatus::Public
                    && !self.admin_user
                    && !(self.show_all && viewer.can_see(event))
                {
                    return false;
                }
            }
        }
        if self.admin_user && !viewer.organizations.contains(&event.publisher) {
            return false;
        }

        if let Some(text) = &self.text
            && !(event.name.contains_text(text)
                || event.description.contains_text(text)
                || event.short_description.contains_text(text))
        {
            return false;
        }
        if let Some(sources) = &self.data_sources
            && !sources.contains(&event.data_source)
        {
            return false;
        }
        if self.excluded_data_sources.contains(&event.data_source) {
            return false;
        }
        if let Some(locations) = &self.locations
            && !event.location.as_ref().is_some_and(|l| locations.contains(l))
        {
            return false;
        }
        if let Some(keywords) = &self.keywords
            && !event
                .keywords
                .iter()
                .chain(event.audience.iter())
                .any(|k| keywords.contains(k))
        {
            return false;
        }
        if let Some(divisions) = &self.divisions {
            let place = event.location.as_deref().and_then(|id| catalog.place(id));
            if !place.is_some_and(|p| in_divisions(p, divisions)) {
                return false;
            }
        }
        if let Some(publishers) = &self.publishers
            && !publishers.contains(&event.publisher)
        {
            return false;
        }
        match &self.super_event {
            Some(SuperEventLink::Missing) if event.super_event.is_some() => return false,
            Some(SuperEventLink::Id(id)) if event.super_event.as_ref() != Some(id) => return false,
            _ => {}
        }
        match self.recurring {
            Some(Recurring::Super) if !event.is_recurring_super() => return false,
            Some(Recurring::Sub) => {
                let parent_recurs = event
                    .super_event
                    .as_deref()
                    .and_then(|id| catalog.event(id))
                    .is_some_and(Event::is_recurring_super);
                if !parent_recurs {
                    return false;
                }
            }
            _ => {}
        }
        if let Some(types) = &self.super_event_types
            && !types.contains(&event.super_event_type)
        {
            return false;
        }
        if let Some(lang) = &self.language
            && !(event.in_language.contains(lang) || event.name.contains(lang))
        {
            return false;
        }
        true
    }

    fn compare(&self, a: &Event, b: &Event) -> Ordering {
        let default = [SortKey {
            field: SortField::LastModifiedTime,
            descending: true,
        }];
        let keys: &[SortKey] = if self.sort.is_empty() {
            &default
        } else {
            &self.sort
        };
        for key in keys {
            let ord = match key.field {
                SortField::StartTime => a.start_time.cmp(&b.start_time),
                SortField::EndTime => a.end_time.cmp(&b.end_time),
                SortField::LastModifiedTime => a.last_modified_time.cmp(&b.last_modified_time),
                SortField::Name => display_name(&a.name).cmp(&display_name(&b.name)),
                SortField::Id => a.id.cmp(&b.id),
            };
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id.cmp(&b.id)
    }
}

/// A division filter value matches the full OCD id or its last segment
/// (`helsinki` matches `ocd-division/country:fi/kunta:helsinki`).
fn in_divisions(place: &Place, wanted: &BTreeSet<String>) -> bool {
    place.divisions.iter().any(|d| {
        let d = d.to_lowercase();
        let tail = d.rsplit('/').next().and_then(|s| s.split_once(':')).map(|(_, n)| n);
        wanted.contains(&d) || tail.is_some_and(|t| wanted.contains(t))
    })
}

fn display_name(name: &Translated) -> String {
    name.get("fi")
        .or_else(|| name.values().next())
        .unwrap_or_default()
        .to_lowercase()
}

// --- Rendering ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Includes {
    pub super_event: bool,
    pub sub_events: bool,
    pub keywords: bool,
    pub location: bool,
}

impl Includes {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> Self {
        let mut inc = Self::default();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part {
                "super_event" => inc.super_event = true,
                "sub_events" => inc.sub_events = true,
                "keywords" => inc.keywords = true,
                "location" => inc.location = true,
                other => log::warn!("Ignoring unknown include '{}'", other),
            }
        }
        inc
    }
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub base_url: String,
    pub tz: Tz,
    pub include: Includes,
}

impl RenderOptions {
    pub fn from_config(config: &Config, include: Includes) -> Result<Self> {
        Ok(Self {
            base_url: config.api_base_url.clone(),
            tz: config.tz()?,
            include,
        })
    }

    fn url(&self, kind: &str, id: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{}/{}/{}/", base, kind, id)
    }

    fn reference(&self, kind: &str, id: &str) -> Value {
        json!({ "@id": self.url(kind, id) })
    }

    /// Expanded references are rendered without any includes of their own.
    fn nested(&self) -> Self {
        Self {
            include: Includes::none(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub meta: PageMeta,
    pub data: Vec<Value>,
}

fn translated(t: &Translated) -> Value {
    if t.is_empty() {
        Value::Null
    } else {
        json!(t)
    }
}

fn timestamp(t: Option<DateTime<Utc>>) -> Value {
    t.map_or(Value::Null, |t| Value::String(t.to_rfc3339()))
}

/// Date-only times are shown as a local date.
fn event_time(t: Option<DateTime<Utc>>, has_time: bool, tz: Tz) -> Value {
    match t {
        Some(t) if !has_time => Value::String(t.with_timezone(&tz).date_naive().to_string()),
        other => timestamp(other),
    }
}

fn render_keyword(keyword: &Keyword, opts: &RenderOptions) -> Value {
    json!({
        "@id": opts.url("keyword", &keyword.id),
        "@type": "Keyword",
        "id": keyword.id,
        "data_source": keyword.data_source,
        "publisher": keyword.publisher,
        "name": translated(&keyword.name),
        "alt_labels": keyword.alt_labels,
        "deprecated": keyword.deprecated,
    })
}

fn render_place(place: &Place, opts: &RenderOptions) -> Value {
    json!({
        "@id": opts.url("place", &place.id),
        "@type": "Place",
        "id": place.id,
        "data_source": place.data_source,
        "name": translated(&place.name),
        "street_address": translated(&place.street_address),
        "postal_code": place.postal_code,
        "address_locality": translated(&place.address_locality),
        "divisions": place.divisions,
    })
}

fn keyword_list(catalog: &Catalog, ids: &BTreeSet<String>, opts: &RenderOptions) -> Value {
    ids.iter()
        .map(|id| match catalog.keyword(id) {
            Some(kw) if opts.include.keywords => render_keyword(kw, opts),
            _ => opts.reference("keyword", id),
        })
        .collect()
}

pub fn render_event(catalog: &Catalog, event: &Event, opts: &RenderOptions) -> Value {
    let mut obj = Map::new();
    obj.insert("@context".into(), json!("http://schema.org"));
    obj.insert("@id".into(), json!(opts.url("event", &event.id)));
    obj.insert("@type".into(), json!("Event"));
    obj.insert("id".into(), json!(event.id));

    obj.insert("data_source".into(), json!(event.data_source));
    obj.insert("publisher".into(), json!(event.publisher));

    obj.insert("name".into(), translated(&event.name));
    obj.insert("description".into(), translated(&event.description));
    obj.insert(
        "short_description".into(),
        translated(&event.short_description),
    );
    obj.insert("info_url".into(), translated(&event.info_url));
    obj.insert("provider".into(), translated(&event.provider));
    obj.insert(
        "provider_contact_info".into(),
        json!(event.provider_contact_info),
    );

    let location = event.location.as_deref().map(|id| match catalog.place(id) {
        Some(place) if opts.include.location => render_place(place, opts),
        _ => opts.reference("place", id),
    });
    obj.insert("location".into(), location.unwrap_or(Value::Null));
    obj.insert(
        "location_extra_info".into(),
        translated(&event.location_extra_info),
    );

    obj.insert(
        "start_time".into(),
        event_time(event.start_time, event.has_start_time, opts.tz),
    );
    obj.insert(
        "end_time".into(),
        event_time(event.end_time, event.has_end_time, opts.tz),
    );

    obj.insert("keywords".into(), keyword_list(catalog, &event.keywords, opts));
    obj.insert("audience".into(), keyword_list(catalog, &event.audience, opts));
    obj.insert(
        "in_language".into(),
        event
            .in_language
            .iter()
            .map(|l| opts.reference("language", l))
            .collect(),
    );

    obj.insert(
        "offers".into(),
        event
            .offers
            .iter()
            .map(|o| {
                json!({
                    "is_free": o.is_free,
                    "price": translated(&o.price),
                    "description": translated(&o.description),
                    "info_url": translated(&o.info_url),
                })
            })
            .collect(),
    );
    obj.insert("external_links".into(), json!(event.external_links));
    obj.insert(
        "images".into(),
        event
            .images
            .iter()
            .map(|i| json!({ "url": i.url, "license": i.license }))
            .collect(),
    );

    let super_event = event.super_event.as_deref().map(|id| match catalog.event(id) {
        Some(parent) if opts.include.super_event => render_event(catalog, parent, &opts.nested()),
        _ => opts.reference("event", id),
    });
    obj.insert("super_event".into(), super_event.unwrap_or(Value::Null));
    obj.insert(
        "super_event_type".into(),
        json!(event.super_event_type.map(|t| t.to_string())),
    );
    let sub_events: Value = catalog
        .sub_events(&event.id)
        .into_iter()
        .map(|sub| {
            if opts.include.sub_events {
                render_event(catalog, sub, &opts.nested())
            } else {
                opts.reference("event", &sub.id)
            }
        })
        .collect();
    obj.insert("sub_events".into(), sub_events);

    obj.insert("event_status".into(), json!(event.event_status.to_string()));
    obj.insert(
        "publication_status".into(),
        json!(event.publication_status.to_string()),
    );
    obj.insert("audience_min_age".into(), json!(event.audience_min_age));
    obj.insert("audience_max_age".into(), json!(event.audience_max_age));
    obj.insert("custom_data".into(), json!(event.custom_data));
    if let Some(course) = &event.extension_course {
        obj.insert(
            "extension_course".into(),
            json!({
                "enrolment_start_time": timestamp(course.enrolment_start_time),
                "enrolment_end_time": timestamp(course.enrolment_end_time),
            }),
        );
    }

    obj.insert("date_published".into(), timestamp(event.date_published));
    obj.insert("created_time".into(), timestamp(event.created_time));
    obj.insert(
        "last_modified_time".into(),
        timestamp(event.last_modified_time),
    );
    Value::Object(obj)
}

// --- Operations ---

/// Looks up an event the viewer is allowed to see.
pub fn get_event<'a>(catalog: &'a Catalog, viewer: &Viewer, id: &str) -> Result<&'a Event> {
    catalog
        .event(id)
        .filter(|e| viewer.can_see(e))
        .with_context(|| format!("Event '{}' not found", id))
}

pub fn list_events(
    catalog: &Catalog,
    query: &EventQuery,
    viewer: &Viewer,
    config: &Config,
    opts: &RenderOptions,
) -> Page {
    let mut events: Vec<&Event> = catalog
        .events()
        .filter(|e| query.matches(catalog, viewer, e))
        .collect();
    events.sort_by(|a, b| query.compare(a, b));

    let page_size = config.page_size(query.page_size);
    let count = events.len();
    let page = query.page.max(1);
    let start = (page - 1).saturating_mul(page_size);

    let link = |p: usize| {
        format!(
            "{}/event/?page={}&page_size={}",
            opts.base_url.trim_end_matches('/'),
            p,
            page_size
        )
    };
    let next = start
        .checked_add(page_size)
        .is_some_and(|end| end < count)
        .then(|| link(page + 1));
    let previous = (page > 1).then(|| link(page - 1));

    let data = events
        .into_iter()
        .skip(start)
        .take(page_size)
        .map(|e| render_event(catalog, e, opts))
        .collect();

    Page {
        meta: PageMeta {
            count,
            next,
            previous,
        },
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, name: &str) -> Event {
        let mut e = Event::new(id, "kulke", "ahjo:u4804001050");
        e.name.set("fi", Some(name.into()));
        e
    }

    #[test]
    fn test_parse_filters() {
        let q = EventQuery::from_filters(&[
            "data_source=kulke,helmet",
            "super_event_type=recurring,none",
            "sort=-start_time",
            "page=2",
        ])
        .unwrap();
        assert_eq!(q.data_sources.unwrap().len(), 2);
        let types = q.super_event_types.unwrap();
        assert!(types.contains(&Some(SuperEventType::Recurring)));
        assert!(types.contains(&None));
        assert_eq!(q.sort[0].field, SortField::StartTime);
        assert!(q.sort[0].descending);
        assert_eq!(q.page, 2);

        assert!(EventQuery::from_filters(&["colour=red"]).is_err());
        assert!(EventQuery::from_filters(&["page=0"]).is_err());
        assert!(EventQuery::from_filters(&["recurring=sometimes"]).is_err());
        assert!(EventQuery::from_filters(&["no_equals_sign"]).is_err());
    }

    #[test]
    fn test_unknown_super_event_type_matches_nothing() {
        let catalog = Catalog::new();
        let q = EventQuery::from_filters(&["super_event_type=fancy"]).unwrap();
        let plain = event("kulke:1", "Konsertti");
        assert!(!q.matches(&catalog, &Viewer::anonymous(), &plain));

        let q = EventQuery::from_filters(&["super_event_type=null"]).unwrap();
        assert!(q.matches(&catalog, &Viewer::anonymous(), &plain));
    }

    #[test]
    fn test_drafts_are_hidden_from_outsiders() {
        let catalog = Catalog::new();
        let mut draft = event("kulke:2", "Luonnos");
        draft.publication_status = PublicationStatus::Draft;

        let default = EventQuery::from_pairs([("page", "1")]).unwrap();
        let owner = Viewer::member_of(["ahjo:u4804001050"]);
        assert!(!default.matches(&catalog, &owner, &draft));

        let drafts = EventQuery::from_pairs([("publication_status", "draft")]).unwrap();
        assert!(drafts.matches(&catalog, &owner, &draft));
        assert!(!drafts.matches(&catalog, &Viewer::anonymous(), &draft));

        let admin = EventQuery::from_pairs([("admin_user", "true")]).unwrap();
        assert!(admin.matches(&catalog, &owner, &draft));
        assert!(!admin.matches(&catalog, &Viewer::anonymous(), &draft));
    }

    #[test]
    fn test_show_all_with_publication_status() {
        let catalog = Catalog::new();
        let public = event("kulke:4", "Konsertti");
        let mut draft = event("kulke:5", "Luonnos");
        draft.publication_status = PublicationStatus::Draft;
        let owner = Viewer::member_of(["ahjo:u4804001050"]);
        let outsider = Viewer::member_of(["ahjo:00001"]);

        let q = EventQuery::from_pairs([("show_all", "true"), ("publication_status", "public")])
            .unwrap();
        assert!(q.matches(&catalog, &owner, &public));
        assert!(!q.matches(&catalog, &owner, &draft));

        let q = EventQuery::from_pairs([("show_all", "true"), ("publication_status", "draft")])
            .unwrap();
        assert!(!q.matches(&catalog, &outsider, &draft));
        assert!(!q.matches(&catalog, &outsider, &public));
        assert!(q.matches(&catalog, &owner, &draft));
        assert!(!q.matches(&catalog, &owner, &public));

        let q = EventQuery::from_pairs([("show_all", "true")]).unwrap();
        assert!(q.matches(&catalog, &owner, &draft));
        assert!(q.matches(&catalog, &owner, &public));
        assert!(!q.matches(&catalog, &outsider, &draft));
    }

    #[test]
    fn test_text_and_keyword_filters() {
        let catalog = Catalog::new();
        let mut e = event("kulke:3", "Jazz-ilta");
        e.audience.insert("yso:p4354".into());

        let q = EventQuery::from_pairs([("text", "JAZZ")]).unwrap();
        assert!(q.matches(&catalog, &Viewer::anonymous(), &e));
        let q = EventQuery::from_pairs([("keyword", "yso:p4354")]).unwrap();
        assert!(q.matches(&catalog, &Viewer::anonymous(), &e));
        let q = EventQuery::from_pairs([("keyword", "yso:p1808")]).unwrap();
        assert!(!q.matches(&catalog, &Viewer::anonymous(), &e));
    }

    #[test]
    fn test_includes_parse() {
        let inc = Includes::parse("super_event, keywords,bogus");
        assert!(inc.super_event && inc.keywords);
        assert!(!inc.sub_events && !inc.location);
    }

    #[test]
    fn test_date_only_times_render_as_local_date() {
        let t = "2017-01-09T22:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let tz: Tz = "Europe/Helsinki".parse().unwrap();
        assert_eq!(event_time(Some(t), false, tz), json!("2017-01-10"));
        assert_eq!(event_time(Some(t), true, tz), json!("2017-01-09T22:00:00+00:00"));
        assert_eq!(event_time(None, true, tz), Value::Null);
    }
}
