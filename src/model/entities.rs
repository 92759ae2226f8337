// File: ./src/model/entities.rs
// Reference entities that events point to.
use crate::model::Translated;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Builds the catalog id `<data_source>:<origin_id>`.
pub fn make_id(data_source: &str, origin_id: &str) -> String {
    format!("{}:{}", data_source, origin_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub origin_id: String,
    pub data_source: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub origin_id: String,
    pub data_source: String,
    #[serde(default)]
    pub name: Translated,
    #[serde(default)]
    pub street_address: Translated,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub address_locality: Translated,
    /// OCD ids of the administrative divisions the place lies in.
    #[serde(default)]
    pub divisions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: String,
    #[serde(default)]
    pub origin_id: Option<String>,
    pub data_source: String,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub name: Translated,
    #[serde(default)]
    pub alt_labels: Vec<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified_time: Option<DateTime<Utc>>,
}

impl Keyword {
    pub fn new(id: &str, data_source: &str, name: Translated) -> Self {
        Self {
            id: id.to_string(),
            origin_id: id.split_once(':').map(|(_, o)| o.to_string()),
            data_source: data_source.to_string(),
            publisher: None,
            name,
            alt_labels: Vec::new(),
            deprecated: false,
            created_time: None,
            last_modified_time: None,
        }
    }

    /// Every label the keyword is known by, lowercased.
    pub fn labels(&self) -> impl Iterator<Item = String> + '_ {
        self.name
            .values()
            .chain(self.alt_labels.iter().map(String::as_str))
            .map(|l| l.trim().to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: String,
    #[serde(default)]
    pub name: Translated,
}

/// Groups the occurrences of a recurring event under one super event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAggregate {
    pub id: u64,
    pub super_event: Option<String>,
    #[serde(default)]
    pub members: BTreeSet<String>,
}
