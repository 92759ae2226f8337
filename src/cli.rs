// File: ./src/cli.rs
//! Command-line interface: argument definitions and command dispatch.
use crate::catalog::{Catalog, Fixture};
use crate::config::Config;
use crate::context::AppContext;
use crate::importer::{ImportReport, ImportSettings, importer_for};
use crate::query::{self, EventQuery, Includes, RenderOptions, Viewer};
use crate::storage::LocalStorage;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "linkedevents", author, version, about = "Event catalog importer and query tool", long_about = None)]
pub struct Args {
    /// Use a different directory for config and data
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load reference data (data sources, places, keywords, licenses)
    Load {
        fixture: PathBuf,
    },
    /// Run an importer
    Import {
        /// Importer name
        importer: String,
        #[arg(long)]
        keywords: bool,
        #[arg(long)]
        events: bool,
        #[arg(long)]
        courses: bool,
        #[arg(long)]
        delete_courses: bool,
        /// Only import the event with this origin id
        #[arg(long)]
        single: Option<String>,
    },
    /// List events
    Events {
        /// Filter as key=value, e.g. `--filter keyword=yso:p4354`
        #[arg(short, long = "filter")]
        filters: Vec<String>,
        #[arg(long)]
        page: Option<usize>,
        #[arg(long)]
        page_size: Option<usize>,
        /// Organizations whose drafts are visible
        #[arg(long = "as-organization", value_delimiter = ',')]
        organizations: Vec<String>,
    },
    /// Show one event
    Event {
        id: String,
        /// Comma-separated references to expand
        #[arg(long, default_value = "")]
        include: String,
        #[arg(long = "as-organization", value_delimiter = ',')]
        organizations: Vec<String>,
    },
    /// Print the config path, writing the defaults if no config exists
    Config,
}

#[derive(Debug, Default)]
pub struct ImportFlags {
    pub keywords: bool,
    pub events: bool,
    pub courses: bool,
    pub delete_courses: bool,
    pub single: Option<String>,
}

/// Runs the requested import steps and persists the catalog. Setup always
/// runs first; keywords are imported before events so that `kulke:<id>`
/// keywords exist when events refer to them.
pub fn run_import(ctx: &dyn AppContext, name: &str, flags: ImportFlags) -> Result<ImportReport> {
    let config = Config::load_or_default(ctx)?;
    let mut settings = ImportSettings::from_config(&config, ctx)?;
    settings.single = flags.single;

    let mut catalog = LocalStorage::load(ctx)?;
    let mut importer = importer_for(name, settings)?;
    importer.setup(&mut catalog)?;

    let mut total = ImportReport::default();
    let mut add = |r: ImportReport| {
        total.created += r.created;
        total.updated += r.updated;
        total.unchanged += r.unchanged;
        total.skipped += r.skipped;
        total.aggregates += r.aggregates;
    };
    if flags.keywords {
        add(importer.import_keywords(&mut catalog)?);
    }
    if flags.events {
        add(importer.import_events(&mut catalog)?);
    }
    if flags.courses {
        add(importer.import_courses(&mut catalog)?);
    }
    if flags.delete_courses {
        total.deleted += importer.delete_courses(&mut catalog)?;
    }

    LocalStorage::save(ctx, &catalog)?;
    Ok(total)
}

pub fn run_load(ctx: &dyn AppContext, fixture: &std::path::Path) -> Result<usize> {
    let fixture = Fixture::from_path(fixture)?;
    let mut catalog = LocalStorage::load(ctx)?;
    let count = catalog.load_fixture(fixture);
    LocalStorage::save(ctx, &catalog)?;
    log::info!("Loaded {} objects", count);
    Ok(count)
}

fn load_catalog(ctx: &dyn AppContext) -> Result<Catalog> {
    LocalStorage::load(ctx).context("Failed to load catalog")
}

pub fn run(ctx: &dyn AppContext, command: Command) -> Result<()> {
    match command {
        Command::Load { fixture } => {
            let count = run_load(ctx, &fixture)?;
            println!("Loaded {} objects from {}", count, fixture.display());
        }
        Command::Import {
            importer,
            keywords,
            events,
            courses,
            delete_courses,
            single,
        } => {
            let flags = ImportFlags {
                keywords,
                events,
                courses,
                delete_courses,
                single,
            };
            if !(flags.keywords || flags.events || flags.courses || flags.delete_courses) {
                anyhow::bail!(
                    "Nothing to import: pass --keywords, --events, --courses or --delete-courses"
                );
            }
            let report = run_import(ctx, &importer, flags)?;
            println!("{}", report);
        }
        Command::Events {
            filters,
            page,
            page_size,
            organizations,
        } => {
            let config = Config::load_or_default(ctx)?;
            let catalog = load_catalog(ctx)?;
            let mut query = EventQuery::from_filters(&filters)?;
            if let Some(page) = page {
                query.page = page.max(1);
            }
            if page_size.is_some() {
                query.page_size = page_size;
            }
            let opts = RenderOptions::from_config(&config, Includes::none())?;
            let viewer = Viewer::member_of(organizations);
            let page = query::list_events(&catalog, &query, &viewer, &config, &opts);
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Command::Event {
            id,
            include,
            organizations,
        } => {
            let config = Config::load_or_default(ctx)?;
            let catalog = load_catalog(ctx)?;
            let viewer = Viewer::member_of(organizations);
            let event = query::get_event(&catalog, &viewer, &id)?;
            let opts = RenderOptions::from_config(&config, Includes::parse(&include))?;
            let rendered = query::render_event(&catalog, event, &opts);
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
        Command::Config => {
            if let Err(e) = Config::load(ctx) {
                if !Config::is_missing_config_error(&e) {
                    return Err(e);
                }
                Config::default().save(ctx)?;
                println!("Wrote default config");
            }
            println!("{}", Config::get_path_string(ctx)?);
        }
    }
    Ok(())
}
