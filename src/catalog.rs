// File: ./src/catalog.rs
// In-memory catalog of events and the reference data they point to.
//
// The importers only ever talk to this type; `LocalStorage` persists it as a
// single JSON document between runs.
use crate::model::{
    DataSource, Event, EventAggregate, Keyword, Language, License, Organization, Place,
    SuperEventType, make_id,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

/// Result of upserting an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Reference data loaded from a JSON fixture file. Every section is
/// optional; entries replace existing ones with the same id.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub data_sources: Vec<DataSource>,
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub places: Vec<Place>,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
    #[serde(default)]
    pub licenses: Vec<License>,
    #[serde(default)]
    pub languages: Vec<Language>,
}

impl Fixture {
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {:?}", path))?;
        serde_json::from_str(&json).with_context(|| format!("Failed to parse fixture {:?}", path))
    }

    pub fn len(&self) -> usize {
        self.data_sources.len()
            + self.organizations.len()
            + self.places.len()
            + self.keywords.len()
            + self.licenses.len()
            + self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    data_sources: BTreeMap<String, DataSource>,
    #[serde(default)]
    organizations: BTreeMap<String, Organization>,
    #[serde(default)]
    places: BTreeMap<String, Place>,
    #[serde(default)]
    keywords: BTreeMap<String, Keyword>,
    #[serde(default)]
    licenses: BTreeMap<String, License>,
    #[serde(default)]
    languages: BTreeMap<String, Language>,
    #[serde(default)]
    events: BTreeMap<String, Event>,
    #[serde(default)]
    aggregates: BTreeMap<u64, EventAggregate>,
    #[serde(default)]
    last_aggregate_id: u64,

    /// event id -> aggregates listing it as a member
    #[serde(skip)]
    membership: HashMap<String, BTreeSet<u64>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuild_index(&mut self) {
        self.membership.clear();
        for agg in self.aggregates.values() {
            for member in &agg.members {
                self.membership
                    .entry(member.clone())
                    .or_default()
                    .insert(agg.id);
            }
        }
    }

    pub fn load_fixture(&mut self, fixture: Fixture) -> usize {
        let count = fixture.len();
        for ds in fixture.data_sources {
            self.data_sources.insert(ds.id.clone(), ds);
        }
        for org in fixture.organizations {
            self.organizations.insert(org.id.clone(), org);
        }
        for place in fixture.places {
            self.places.insert(place.id.clone(), place);
        }
        for kw in fixture.keywords {
            self.keywords.insert(kw.id.clone(), kw);
        }
        for license in fixture.licenses {
            self.licenses.insert(license.id.clone(), license);
        }
        for lang in fixture.languages {
            self.languages.insert(lang.id.clone(), lang);
        }
        count
    }

    // --- Data sources & organizations ---

    pub fn data_source(&self, id: &str) -> Option<&DataSource> {
        self.data_sources.get(id)
    }

    pub fn get_or_create_data_source(&mut self, id: &str, name: &str) -> DataSource {
        self.data_sources
            .entry(id.to_string())
            .or_insert_with(|| {
                log::info!("Creating data source {}", id);
                DataSource {
                    id: id.to_string(),
                    name: name.to_string(),
                }
            })
            .clone()
    }

    pub fn organization(&self, id: &str) -> Option<&Organization> {
        self.organizations.get(id)
    }

    pub fn get_or_create_organization(
        &mut self,
        data_source: &str,
        origin_id: &str,
        name: &str,
    ) -> Organization {
        let id = make_id(data_source, origin_id);
        self.organizations
            .entry(id.clone())
            .or_insert_with(|| {
                log::info!("Creating organization {}", id);
                Organization {
                    id: id.clone(),
                    origin_id: origin_id.to_string(),
                    data_source: data_source.to_string(),
                    name: name.to_string(),
                }
            })
            .clone()
    }

    // --- Places ---

    pub fn place(&self, id: &str) -> Option<&Place> {
        self.places.get(id)
    }

    /// Maps origin id -> place id for the places of `data_source` whose
    /// origin id is in `origin_ids`.
    pub fn place_ids_by_origin<'a, I>(&self, data_source: &str, origin_ids: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let wanted: BTreeSet<&str> = origin_ids.into_iter().collect();
        self.places
            .values()
            .filter(|p| p.data_source == data_source && wanted.contains(p.origin_id.as_str()))
            .map(|p| (p.origin_id.clone(), p.id.clone()))
            .collect()
    }

    // --- Keywords & licenses ---

    pub fn keyword(&self, id: &str) -> Option<&Keyword> {
        self.keywords.get(id)
    }

    pub fn keywords(&self) -> impl Iterator<Item = &Keyword> {
        self.keywords.values()
    }

    /// The subset of `ids` that exist, in id order.
    pub fn existing_keyword_ids<'a, I>(&self, ids: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        ids.into_iter()
            .filter(|id| self.keywords.contains_key(*id))
            .map(str::to_string)
            .collect()
    }

    pub fn upsert_keyword(&mut self, keyword: Keyword) {
        self.keywords.insert(keyword.id.clone(), keyword);
    }

    pub fn license(&self, id: &str) -> Option<&License> {
        self.licenses.get(id)
    }

    // --- Events ---

    pub fn event(&self, id: &str) -> Option<&Event> {
        self.events.get(id)
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.values()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Stores the event as is, replacing any previous version.
    pub fn insert_event(&mut self, event: Event) {
        self.events.insert(event.id.clone(), event);
    }

    /// Upserts an imported event. Bookkeeping that the importer does not
    /// own (creation time, super event link and type, publication status)
    /// survives the update;
    /// `last_modified_time` only moves when the content changed.
    pub fn save_event(&mut self, mut event: Event, now: DateTime<Utc>) -> SaveOutcome {
        match self.events.get(&event.id) {
            Some(existing) => {
                event.created_time = existing.created_time;
                event.date_published = existing.date_published;
                event.super_event = existing.super_event.clone();
                event.publication_status = existing.publication_status;
                if event.super_event_type.is_none() {
                    event.super_event_type = existing.super_event_type;
                }
                if existing.same_content(&event) {
                    return SaveOutcome::Unchanged;
                }
                event.last_modified_time = Some(now);
                self.events.insert(event.id.clone(), event);
                SaveOutcome::Updated
            }
            None => {
                event.created_time = Some(now);
                event.last_modified_time = Some(now);
                if event.date_published.is_none() {
                    event.date_published = Some(now);
                }
                self.events.insert(event.id.clone(), event);
                SaveOutcome::Created
            }
        }
    }

    /// Deletes every event matching `pred`, dropping it from aggregates too.
    pub fn delete_events_where<F>(&mut self, pred: F) -> usize
    where
        F: Fn(&Event) -> bool,
    {
        let doomed: Vec<String> = self
            .events
            .values()
            .filter(|e| pred(e))
            .map(|e| e.id.clone())
            .collect();
        for id in &doomed {
            self.events.remove(id);
            if let Some(aggs) = self.membership.remove(id) {
                for agg_id in aggs {
                    if let Some(agg) = self.aggregates.get_mut(&agg_id) {
                        agg.members.remove(id);
                    }
                }
            }
        }
        doomed.len()
    }

    /// Events whose `super_event` points at `super_id`.
    pub fn sub_events(&self, super_id: &str) -> Vec<&Event> {
        self.events
            .values()
            .filter(|e| e.super_event.as_deref() == Some(super_id))
            .collect()
    }

    // --- Aggregates ---

    pub fn aggregate(&self, id: u64) -> Option<&EventAggregate> {
        self.aggregates.get(&id)
    }

    pub fn aggregates(&self) -> impl Iterator<Item = &EventAggregate> {
        self.aggregates.values()
    }

    /// Distinct aggregates that have any of `event_ids` as a member.
    pub fn aggregates_containing<'a, I>(&self, event_ids: I) -> BTreeSet<u64>
    where
        I: IntoIterator<Item = &'a str>,
    {
        event_ids
            .into_iter()
            .filter_map(|id| self.membership.get(id))
            .flatten()
            .copied()
            .collect()
    }

    /// Creates an aggregate together with its recurring super event
    /// `linkedevents:agg-<n>`.
    pub fn create_recurring_aggregate(
        &mut self,
        data_source: &str,
        publisher: &str,
        now: DateTime<Utc>,
    ) -> u64 {
        self.last_aggregate_id += 1;
        let id = self.last_aggregate_id;
        let super_id = format!("linkedevents:agg-{}", id);

        let mut super_event = Event::new(&super_id, data_source, publisher);
        super_event.super_event_type = Some(SuperEventType::Recurring);
        super_event.created_time = Some(now);
        super_event.last_modified_time = Some(now);
        super_event.date_published = Some(now);
        self.events.insert(super_id.clone(), super_event);

        self.aggregates.insert(
            id,
            EventAggregate {
                id,
                super_event: Some(super_id),
                members: BTreeSet::new(),
            },
        );
        id
    }

    /// Returns false when the event already was a member.
    pub fn add_aggregate_member(&mut self, aggregate_id: u64, event_id: &str) -> bool {
        let Some(agg) = self.aggregates.get_mut(&aggregate_id) else {
            return false;
        };
        if !agg.members.insert(event_id.to_string()) {
            return false;
        }
        self.membership
            .entry(event_id.to_string())
            .or_default()
            .insert(aggregate_id);
        true
    }

    /// Removes the member and unlinks it from the aggregate's super event.
    pub fn remove_aggregate_member(&mut self, aggregate_id: u64, event_id: &str) -> bool {
        let Some(agg) = self.aggregates.get_mut(&aggregate_id) else {
            return false;
        };
        if !agg.members.remove(event_id) {
            return false;
        }
        let super_id = agg.super_event.clone();
        if let Some(aggs) = self.membership.get_mut(event_id) {
            aggs.remove(&aggregate_id);
        }
        if let Some(event) = self.events.get_mut(event_id)
            && event.super_event == super_id
        {
            event.super_event = None;
        }
        true
    }

    /// Drops the aggregate and its super event, unlinking the remaining
    /// members.
    pub fn remove_aggregate(&mut self, aggregate_id: u64) -> bool {
        let Some(agg) = self.aggregates.remove(&aggregate_id) else {
            return false;
        };
        for member in &agg.members {
            if let Some(aggs) = self.membership.get_mut(member) {
                aggs.remove(&aggregate_id);
                if aggs.is_empty() {
                    self.membership.remove(member);
                }
            }
            if let Some(event) = self.events.get_mut(member)
                && event.super_event == agg.super_event
            {
                event.super_event = None;
            }
        }
        if let Some(super_id) = &agg.super_event {
            self.events.remove(super_id);
        }
        true
    }

    pub fn aggregate_members(&self, aggregate_id: u64) -> Vec<&Event> {
        self.aggregates
            .get(&aggregate_id)
            .map(|agg| {
                agg.members
                    .iter()
                    .filter_map(|id| self.events.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_super_event(&mut self, event_id: &str, super_id: Option<&str>) {
        if let Some(event) = self.events.get_mut(event_id) {
            event.super_event = super_id.map(str::to_string);
        }
    }
}
