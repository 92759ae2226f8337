// Crate root library declaration and module exports.
pub mod catalog;
pub mod cli;
pub mod config;
pub mod context;
pub mod importer;
pub mod model;
pub mod query;
pub mod storage;
