// File: ./src/model/event.rs
use crate::model::Translated;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum::{AsRefStr, Display, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SuperEventType {
    Recurring,
    Umbrella,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PublicationStatus {
    #[default]
    Public,
    Draft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, AsRefStr)]
pub enum EventStatus {
    #[default]
    EventScheduled,
    EventCancelled,
    EventPostponed,
    EventRescheduled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Offer {
    pub is_free: bool,
    #[serde(default)]
    pub price: Translated,
    #[serde(default)]
    pub description: Translated,
    #[serde(default)]
    pub info_url: Translated,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExternalLink {
    pub language: String,
    #[serde(default)]
    pub name: Option<String>,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub license: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseExtension {
    pub enrolment_start_time: Option<DateTime<Utc>>,
    pub enrolment_end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub origin_id: Option<String>,
    pub data_source: String,
    pub publisher: String,

    #[serde(default)]
    pub name: Translated,
    #[serde(default)]
    pub headline: Translated,
    #[serde(default)]
    pub secondary_headline: Translated,
    #[serde(default)]
    pub short_description: Translated,
    #[serde(default)]
    pub description: Translated,
    #[serde(default)]
    pub info_url: Translated,
    #[serde(default)]
    pub provider: Translated,
    #[serde(default)]
    pub provider_contact_info: Option<String>,

    /// Place id.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub location_extra_info: Translated,

    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_start_time: bool,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_end_time: bool,

    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub audience: BTreeSet<String>,
    #[serde(default)]
    pub in_language: BTreeSet<String>,

    #[serde(default)]
    pub offers: Vec<Offer>,
    #[serde(default)]
    pub external_links: Vec<ExternalLink>,
    #[serde(default)]
    pub images: Vec<Image>,

    #[serde(default)]
    pub super_event: Option<String>,
    #[serde(default)]
    pub super_event_type: Option<SuperEventType>,

    #[serde(default)]
    pub event_status: EventStatus,
    #[serde(default)]
    pub publication_status: PublicationStatus,

    #[serde(default)]
    pub audience_min_age: Option<u32>,
    #[serde(default)]
    pub audience_max_age: Option<u32>,
    #[serde(default)]
    pub custom_data: BTreeMap<String, String>,
    #[serde(default)]
    pub extension_course: Option<CourseExtension>,

    #[serde(default)]
    pub date_published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified_time: Option<DateTime<Utc>>,
}

impl Event {
    pub fn new(id: &str, data_source: &str, publisher: &str) -> Self {
        Self {
            id: id.to_string(),
            origin_id: None,
            data_source: data_source.to_string(),
            publisher: publisher.to_string(),
            name: Translated::new(),
            headline: Translated::new(),
            secondary_headline: Translated::new(),
            short_description: Translated::new(),
            description: Translated::new(),
            info_url: Translated::new(),
            provider: Translated::new(),
            provider_contact_info: None,
            location: None,
            location_extra_info: Translated::new(),
            start_time: None,
            has_start_time: false,
            end_time: None,
            has_end_time: false,
            keywords: BTreeSet::new(),
            audience: BTreeSet::new(),
            in_language: BTreeSet::new(),
            offers: Vec::new(),
            external_links: Vec::new(),
            images: Vec::new(),
            super_event: None,
            super_event_type: None,
            event_status: EventStatus::default(),
            publication_status: PublicationStatus::default(),
            audience_min_age: None,
            audience_max_age: None,
            custom_data: BTreeMap::new(),
            extension_course: None,
            date_published: None,
            created_time: None,
            last_modified_time: None,
        }
    }

    pub fn is_recurring_super(&self) -> bool {
        self.super_event_type == Some(SuperEventType::Recurring)
    }

    /// Compares everything the importers write, ignoring bookkeeping
    /// timestamps and the super event link.
    pub fn same_content(&self, other: &Event) -> bool {
        let strip = |e: &Event| {
            let mut e = e.clone();
            e.created_time = None;
            e.last_modified_time = None;
            e.date_published = None;
            e.super_event = None;
            e
        };
        strip(self) == strip(other)
    }
}

/// Joins a title and a subtitle with an en dash.
pub fn make_event_name(title: Option<&str>, subtitle: Option<&str>) -> Option<String> {
    match (title, subtitle) {
        (Some(t), Some(s)) => Some(format!("{} – {}", t, s)),
        (Some(t), None) => Some(t.to_string()),
        (None, Some(s)) => Some(s.to_string()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_event_name() {
        assert_eq!(
            make_event_name(Some("Jazz"), Some("Trio")).as_deref(),
            Some("Jazz – Trio")
        );
        assert_eq!(make_event_name(Some("Jazz"), None).as_deref(), Some("Jazz"));
        assert_eq!(make_event_name(None, Some("Trio")).as_deref(), Some("Trio"));
        assert_eq!(make_event_name(None, None), None);
    }

    #[test]
    fn test_super_event_type_strings() {
        assert_eq!(SuperEventType::Recurring.to_string(), "recurring");
        assert_eq!(
            "recurring".parse::<SuperEventType>().unwrap(),
            SuperEventType::Recurring
        );
        assert!("fwfiuwhfiuwhiw".parse::<SuperEventType>().is_err());
    }

    #[test]
    fn test_same_content_ignores_timestamps_and_links() {
        let mut a = Event::new("kulke:1", "kulke", "ahjo:u4804001050");
        a.name.set("fi", Some("Konsertti".into()));
        let mut b = a.clone();
        b.last_modified_time = Some(Utc::now());
        b.super_event = Some("linkedevents:agg-1".into());
        assert!(a.same_content(&b));

        b.name.set("sv", Some("Konsert".into()));
        assert!(!a.same_content(&b));
    }
}
