// File: ./src/model/mod.rs
pub mod entities;
pub mod event;
pub mod merge;
pub mod translated;

pub use entities::{
    DataSource, EventAggregate, Keyword, Language, License, Organization, Place, make_id,
};
pub use event::{
    CourseExtension, Event, EventStatus, ExternalLink, Image, Offer, PublicationStatus,
    SuperEventType, make_event_name,
};
pub use translated::Translated;
