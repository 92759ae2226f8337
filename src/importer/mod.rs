// File: ./src/importer/mod.rs
//! Shared importer plumbing: the `Importer` trait, the registry, and the
//! draft type events are accumulated in before they reach the catalog.
pub mod keywords;
pub mod kulke;
pub mod script;
pub mod text;

use crate::catalog::{Catalog, SaveOutcome};
use crate::config::Config;
use crate::context::AppContext;
use crate::model::{CourseExtension, Event, ExternalLink, Image, Offer, Translated, make_id};
use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

pub use keywords::KeywordMatcher;
pub use kulke::KulkeImporter;

pub const IMPORTERS: &[&str] = &["kulke"];

#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub import_dir: PathBuf,
    /// All site languages, including those no importer supports natively.
    pub languages: Vec<String>,
    pub timezone: Tz,
    /// Only import the event with this origin id.
    pub single: Option<String>,
}

impl ImportSettings {
    pub fn from_config(config: &Config, ctx: &dyn AppContext) -> Result<Self> {
        Ok(Self {
            import_dir: config.import_dir(ctx)?,
            languages: config.languages.clone(),
            timezone: config.tz()?,
            single: None,
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub aggregates: usize,
}

impl ImportReport {
    pub fn record(&mut self, outcome: SaveOutcome) {
        match outcome {
            SaveOutcome::Created => self.created += 1,
            SaveOutcome::Updated => self.updated += 1,
            SaveOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged, {} skipped, {} deleted, {} aggregates",
            self.created, self.updated, self.unchanged, self.skipped, self.deleted, self.aggregates
        )
    }
}

pub trait Importer {
    fn name(&self) -> &'static str;

    fn supported_languages(&self) -> &'static [&'static str];

    /// Creates the importer's data sources and caches lookups. Must run
    /// before any of the import operations.
    fn setup(&mut self, catalog: &mut Catalog) -> Result<()>;

    fn import_keywords(&mut self, catalog: &mut Catalog) -> Result<ImportReport>;

    fn import_events(&mut self, catalog: &mut Catalog) -> Result<ImportReport>;

    fn import_courses(&mut self, catalog: &mut Catalog) -> Result<ImportReport>;

    fn delete_courses(&mut self, _catalog: &mut Catalog) -> Result<usize> {
        Ok(0)
    }
}

pub fn importer_for(name: &str, settings: ImportSettings) -> Result<Box<dyn Importer>> {
    match name {
        "kulke" => Ok(Box::new(KulkeImporter::new(settings))),
        other => anyhow::bail!(
            "Unknown importer '{}' (available: {})",
            other,
            IMPORTERS.join(", ")
        ),
    }
}

// --- Drafts ---

/// Venue information as it appears in a feed, before it is resolved to a
/// catalog place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationDraft {
    pub id: Option<String>,
    pub name: Option<String>,
    pub street_address: Translated,
    pub postal_code: Option<String>,
    pub address_locality: Translated,
    pub telephone: Translated,
}

impl LocationDraft {
    /// Human readable venue text for events whose place is unknown.
    fn extra_info(&self) -> Translated {
        let mut info = Translated::new();
        for lang in self.street_address.languages() {
            let parts: Vec<&str> = [
                self.name.as_deref(),
                self.street_address.get(lang),
                self.address_locality.get(lang),
            ]
            .into_iter()
            .flatten()
            .collect();
            info.set(lang, Some(parts.join(", ")));
        }
        if info.is_empty()
            && let Some(name) = &self.name
        {
            info.set("fi", Some(name.clone()));
        }
        info
    }
}

/// One event collected across the language variants of a feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventDraft {
    pub origin_id: String,
    pub data_source: String,
    pub publisher: String,

    pub name: Translated,
    pub headline: Translated,
    pub secondary_headline: Translated,
    pub short_description: Translated,
    pub description: Translated,
    pub info_url: Translated,
    pub provider: Translated,

    /// Language -> links found in that language's feed.
    pub external_links: BTreeMap<String, Vec<String>>,
    pub images: Vec<Image>,

    pub start_time: Option<DateTime<Utc>>,
    pub has_start_time: bool,
    pub end_time: Option<DateTime<Utc>>,
    pub has_end_time: bool,
    pub extension_course: Option<CourseExtension>,

    pub offer: Option<Offer>,
    pub keywords: BTreeSet<String>,
    pub audience: BTreeSet<String>,
    pub in_language: BTreeSet<String>,

    pub location: LocationDraft,
}

impl EventDraft {
    pub fn id(&self) -> String {
        make_id(&self.data_source, &self.origin_id)
    }

    pub fn into_event(self) -> Event {
        let mut event = Event::new(&self.id(), &self.data_source, &self.publisher);
        event.origin_id = Some(self.origin_id);
        event.name = self.name;
        event.headline = self.headline;
        event.secondary_headline = self.secondary_headline;
        event.short_description = self.short_description;
        event.description = self.description;
        event.info_url = self.info_url;
        event.provider = self.provider;
        event.external_links = self
            .external_links
            .into_iter()
            .flat_map(|(language, links)| {
                links.into_iter().map(move |link| ExternalLink {
                    language: language.clone(),
                    name: None,
                    link,
                })
            })
            .collect();
        event.images = self.images;
        event.start_time = self.start_time;
        event.has_start_time = self.has_start_time;
        event.end_time = self.end_time;
        event.has_end_time = self.has_end_time;
        event.extension_course = self.extension_course;
        event.offers = self.offer.into_iter().collect();
        event.keywords = self.keywords;
        event.audience = self.audience;
        event.in_language = self.in_language;
        match self.location.id.clone() {
            Some(place) => event.location = Some(place),
            None => event.location_extra_info = self.location.extra_info(),
        }
        event
    }
}

/// Upserts a draft and logs what happened to it.
pub fn save_event(catalog: &mut Catalog, draft: EventDraft, now: DateTime<Utc>) -> SaveOutcome {
    let id = draft.id();
    let outcome = catalog.save_event(draft.into_event(), now);
    match outcome {
        SaveOutcome::Created => log::info!("Created event {}", id),
        SaveOutcome::Updated => log::info!("Updated event {}", id),
        SaveOutcome::Unchanged => log::debug!("Event {} unchanged", id),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_importer_is_rejected() {
        let settings = ImportSettings {
            import_dir: PathBuf::from("/nonexistent"),
            languages: vec!["fi".into()],
            timezone: chrono_tz::Europe::Helsinki,
            single: None,
        };
        assert!(importer_for("kulke", settings.clone()).is_ok());
        let err = importer_for("helmet", settings).err().unwrap();
        assert!(err.to_string().contains("available: kulke"));
    }

    #[test]
    fn test_draft_without_place_keeps_venue_text() {
        let mut draft = EventDraft {
            origin_id: "42".into(),
            data_source: "kulke".into(),
            publisher: "ahjo:u4804001050".into(),
            ..Default::default()
        };
        draft.location.name = Some("Kirjasto 10".into());
        draft.location.street_address.set("fi", Some("Elielinaukio 2".into()));
        draft.location.address_locality.set("fi", Some("Helsinki".into()));
        draft.external_links.insert("fi".into(), vec!["http://a.fi".into()]);
        draft.external_links.insert("sv".into(), vec!["http://b.fi".into()]);

        let event = draft.into_event();
        assert_eq!(event.id, "kulke:42");
        assert_eq!(event.location, None);
        assert_eq!(
            event.location_extra_info.get("fi"),
            Some("Kirjasto 10, Elielinaukio 2, Helsinki")
        );
        assert_eq!(event.external_links.len(), 2);
        assert_eq!(event.external_links[1].language, "sv");
    }
}
