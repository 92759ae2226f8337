// File: ./src/importer/kulke.rs
// Importer for the cultural centre (Kulke) XML exports.
//
// Layout of the import directory:
//   kulke/category.xml      /data/categories/category[@id, @typeid]
//   kulke/events-fi.xml     /eventdata/event[@id]
//   kulke/events-sv.xml
//   kulke/events-en.xml
//
// Each event appears once per language file. The three variants are folded
// into one `EventDraft` per event id before anything is saved. Events that
// reference each other through `eventreferences/recurring` form recurring
// groups; every group with at least two stored events gets an aggregate and
// a recurring super event summarizing the group.
use crate::catalog::Catalog;
use crate::importer::keywords::KeywordMatcher;
use crate::importer::script::set_multiscript_field;
use crate::importer::text::{child, clean, element_text, html_format, normalize_link, parse_timestamp};
use crate::importer::{EventDraft, ImportReport, ImportSettings, Importer, save_event};
use crate::model::merge::merge_into_super_event;
use crate::model::{CourseExtension, Event, Image, Keyword, Offer, Translated, make_event_name};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use roxmltree::{Document, Node};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;

pub const DATA_SOURCE: &str = "kulke";
const DATA_SOURCE_NAME: &str = "Kulttuurikeskus";
const PLACE_DATA_SOURCE: &str = "tprek";
const ORGANIZATION_DATA_SOURCE: &str = "ahjo";
const ORGANIZATION_DATA_SOURCE_NAME: &str = "Ahjo";
const ORGANIZATION_ORIGIN_ID: &str = "u4804001050";
const ORGANIZATION_NAME: &str = "Yleiset kulttuuripalvelut";
const EVENT_ONLY_LICENSE: &str = "event_only";

const SUPPORTED_LANGUAGES: &[&str] = &["fi", "sv", "en"];

/// Service code of plain event announcements; everything else is a course.
const SERVICE_CODE_ANNOUNCEMENT: &str = "Pelkkä ilmoitus";

/// Lowercased venue name -> tprek place origin id.
const LOCATION_TPREK_MAP: &[(&str, &str)] = &[
    ("malmitalo", "8740"),
    ("malms kulturhus", "8740"),
    ("malms bibliotek - malms kulturhus", "8192"),
    ("malmin kirjasto", "8192"),
    ("helsingin kaupungintalo", "28473"),
    ("stoa", "7259"),
    ("östra centrums bibliotek", "8184"),
    ("parvigalleria", "7259"),
    ("musiikkisali", "7259"),
    ("kanneltalo", "7255"),
    ("vuotalo", "7260"),
    ("vuosali", "7260"),
    ("savoy-teatteri", "7258"),
    ("savoy", "7258"),
    ("annantalo", "7254"),
    ("annegården", "7254"),
    ("espan lava", "7265"),
    ("caisa", "7256"),
    ("nuorisokahvila clubi", "8006"),
    ("haagan nuorisotalo", "8023"),
    ("vuosaaren kirjasto", "8310"),
    ("riistavuoren palvelukeskus", "47695"),
    ("kannelmäen palvelukeskus", "51869"),
    ("leikkipuisto lampi", "57117"),
];

/// Lowercased street address -> venue name in `LOCATION_TPREK_MAP`.
const ADDRESS_TPREK_MAP: &[(&str, &str)] = &[
    ("annankatu 30", "annantalo"),
    ("annegatan 30", "annantalo"),
    ("mosaiikkitori 2", "vuotalo"),
    ("ala-malmin tori 1", "malmitalo"),
    ("ala-malmin tori", "malmitalo"),
    ("klaneettitie 5", "kanneltalo"),
    ("klarinettvägen 5", "kanneltalo"),
    ("turunlinnantie 1", "stoa"),
];

/// Venues recognized anywhere inside a longer location name.
const CONTAINED_VENUES: &[&str] = &["caisa", "annantalo"];

/// Categories that are not for general consumption. They still become
/// `kulke:<id>` keywords but never map to vocabulary keywords.
/// 53-55 are languages rather than topics.
const CATEGORIES_TO_IGNORE: &[u32] = &[
    286, 596, 614, 307, 632, 645, 675, 231, 364, 325, 324, 319, 646, 640, 641, 642, 643, 670,
    671, 673, 674, 725, 312, 344, 365, 239, 240, 308, 623, 229, 230, 323, 320, 357, 358, 728,
    729, 730, 735, 736, 53, 54, 55,
];

/// Category types (`typeid`) that are never topics.
const IGNORED_CATEGORY_TYPES: &[u32] = &[2, 3];

/// Events in any of these categories are courses: left out of event runs,
/// the only thing imported by course runs.
pub const COURSE_CATEGORIES: &[u32] = &[
    70, 71, 72, 73, 75, 77, 79, 80, 81, 83, 84, 85, 87, 316, 629, 632, 728, 729, 730, 735,
];

/// Hand-picked YSO keywords for categories the matcher gets wrong.
const MANUAL_CATEGORIES: &[(u32, &[&str])] = &[
    // urheilu
    (546, &["p965"]),
    (547, &["p965"]),
    (431, &["p965"]),
    (638, &["p965"]),
    // kuntosalit
    (607, &["p8504"]),
    (615, &["p8504"]),
    // harrastukset
    (626, &["p2901"]),
    // erityisliikunta
    (634, &["p3093"]),
    // monitaiteisuus
    (223, &["p25216"]),
    // seniorit > ikääntyneet ja vanhukset
    (354, &["p2433", "p2434"]),
    // saunominen
    (371, &["p11049"]),
    // lastentapahtumat > lapset
    (105, &["p4354"]),
    // steppi
    (554, &["p19614"]),
    // liikuntaleiri
    (710, &["p143", "p916"]),
    // teatteri ja sirkus
    (351, &["p2850"]),
    // elokuva ja media
    (205, &["p1235", "p16327", "p2445"]),
    // skidikino
    (731, &["p4354", "p1235", "p16327"]),
    // luennot ja keskustelut
    (733, &["p15875", "p14004"]),
    // nuorille
    (734, &["p11617"]),
    // elokuva
    (737, &["p1235", "p16327"]),
    // perheliikunta
    (628, &["p965", "p4363"]),
    // lapset ja nuoret
    (355, &["p4354", "p11617"]),
    // lapsi ja aikuinen yhdessä > perheet
    (747, &["p4363"]),
];

/// Added to every course.
const COURSE_KEYWORDS: &[&str] = &["p9270"];

/// YSO keywords that describe who an event is for. They are kept in
/// `keywords` and copied to `audience`.
pub const AUDIENCE_KEYWORDS: &[&str] = &[
    "p4354",  // lapset
    "p11617", // nuoret
    "p2433",  // ikääntyneet
    "p2434",  // vanhukset
    "p4363",  // perheet
    "p13050", // lapsiperheet
    "p20513", // vauvaperheet
    "p16485", // koululaiset
    "p6165",  // maahanmuuttajat
    "p7179",  // vammaiset
    "p5590",  // aikuiset
];

/// Case-insensitive rewrites applied to category text before matching.
const CATEGORY_REPLACEMENTS: &[(&str, &str)] = &[("jumppa", "voimistelu"), ("Stoan", "Stoa")];

pub fn make_kulke_id(num: impl std::fmt::Display) -> String {
    format!("{}:{}", DATA_SOURCE, num)
}

fn yso_id(origin: &str) -> String {
    format!("yso:{}", origin)
}

fn course_keyword_ids() -> BTreeSet<String> {
    COURSE_CATEGORIES.iter().map(make_kulke_id).collect()
}

fn audience_keyword_ids() -> BTreeSet<String> {
    AUDIENCE_KEYWORDS.iter().map(|k| yso_id(k)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: u32,
    pub type_id: u32,
    pub text: String,
    /// Vocabulary keywords resolved during setup.
    pub yso_keywords: BTreeSet<String>,
}

/// Parses `category.xml`.
pub fn parse_categories(xml: &str) -> Result<BTreeMap<u32, Category>> {
    let doc = Document::parse(xml).context("Malformed category XML")?;
    let root = doc.root_element();
    if !root.has_tag_name("data") {
        anyhow::bail!("Expected <data> root in category XML");
    }
    let mut categories = BTreeMap::new();
    for container in root.children().filter(|n| n.has_tag_name("categories")) {
        for node in container.children().filter(|n| n.has_tag_name("category")) {
            let id: u32 = node
                .attribute("id")
                .context("category without id")?
                .trim()
                .parse()
                .context("category id is not a number")?;
            let type_id: u32 = node
                .attribute("typeid")
                .context("category without typeid")?
                .trim()
                .parse()
                .context("category typeid is not a number")?;
            categories.insert(
                id,
                Category {
                    id,
                    type_id,
                    text: node.text().unwrap_or_default().to_string(),
                    yso_keywords: BTreeSet::new(),
                },
            );
        }
    }
    Ok(categories)
}

/// Resolves a feed venue to a tprek origin id: exact name, name prefix,
/// known venue inside the name, then the Finnish and Swedish street
/// address.
pub fn match_venue(name: &str, street_address: &Translated) -> Option<&'static str> {
    let lookup = |venue: &str| {
        LOCATION_TPREK_MAP
            .iter()
            .find(|(k, _)| *k == venue)
            .map(|(_, v)| *v)
    };

    let name = name.to_lowercase();
    if let Some(id) = lookup(&name) {
        return Some(id);
    }
    if let Some((_, id)) = LOCATION_TPREK_MAP
        .iter()
        .find(|(k, _)| name.starts_with(*k))
    {
        return Some(*id);
    }
    if let Some(venue) = CONTAINED_VENUES.iter().find(|v| name.contains(**v)) {
        return lookup(*venue);
    }
    for lang in ["fi", "sv"] {
        if let Some(addr) = street_address.get(lang) {
            let addr = addr.to_lowercase();
            if let Some((_, venue)) = ADDRESS_TPREK_MAP.iter().find(|(a, _)| *a == addr) {
                return lookup(*venue);
            }
        }
    }
    None
}

/// What `setup` resolves once per run.
#[derive(Debug, Clone)]
struct KulkeState {
    data_source: String,
    organization: String,
    tprek_by_id: HashMap<String, String>,
    categories: BTreeMap<u32, Category>,
    course_keywords: BTreeSet<String>,
    event_only_license: Option<String>,
    /// `[lang] + languages_to_detect` is the candidate list for text.
    languages_to_detect: Vec<String>,
}

pub struct KulkeImporter {
    settings: ImportSettings,
    state: Option<KulkeState>,
}

impl KulkeImporter {
    pub fn new(settings: ImportSettings) -> Self {
        Self {
            settings,
            state: None,
        }
    }

    fn feed_path(&self, file: &str) -> PathBuf {
        self.settings.import_dir.join(DATA_SOURCE).join(file)
    }

    fn read_feed(&self, file: &str) -> Result<String> {
        let path = self.feed_path(file);
        fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))
    }

    fn state(&self) -> Result<&KulkeState> {
        self.state
            .as_ref()
            .context("Kulke importer used before setup()")
    }

    fn resolve_category_keywords(
        catalog: &Catalog,
        categories: &mut BTreeMap<u32, Category>,
    ) -> Result<()> {
        let matcher = KeywordMatcher::new(catalog.keywords().filter(|k| k.data_source == "yso"))?;
        let replacements = CATEGORY_REPLACEMENTS
            .iter()
            .map(|(src, dest)| -> Result<(Regex, &'static str)> {
                Ok((Regex::new(&format!("(?i){}", regex::escape(src)))?, *dest))
            })
            .collect::<Result<Vec<_>>>()?;

        for (cid, category) in categories.iter_mut() {
            if CATEGORIES_TO_IGNORE.contains(cid)
                || IGNORED_CATEGORY_TYPES.contains(&category.type_id)
            {
                continue;
            }
            if let Some((_, manual)) = MANUAL_CATEGORIES.iter().find(|(id, _)| id == cid) {
                let ids: Vec<String> = manual.iter().map(|k| yso_id(k)).collect();
                category.yso_keywords = catalog.existing_keyword_ids(ids.iter().map(String::as_str));
                continue;
            }
            let mut text = category.text.clone();
            for (re, dest) in &replacements {
                text = re.replace_all(&text, *dest).into_owned();
            }
            category.yso_keywords = matcher.match_text(&text).into_iter().collect();
        }
        Ok(())
    }

    fn find_place(state: &KulkeState, draft: &mut EventDraft) {
        let Some(name) = draft.location.name.clone() else {
            log::warn!(
                "Missing place for event {} ({})",
                draft.name.get("fi").unwrap_or_default(),
                draft.origin_id
            );
            return;
        };
        match match_venue(&name, &draft.location.street_address) {
            Some(tprek_id) => match state.tprek_by_id.get(tprek_id) {
                Some(place) => draft.location.id = Some(place.clone()),
                None => log::warn!(
                    "Place tprek:{} for '{}' is not in the catalog (event {})",
                    tprek_id,
                    name,
                    draft.origin_id
                ),
            },
            None => log::warn!(
                "No match found for place '{}' (event {})",
                name.to_lowercase(),
                draft.origin_id
            ),
        }
    }

    /// Folds one `<event>` of the `lang` feed into `drafts`. Returns false
    /// when the event is not part of this run.
    fn import_event(
        &self,
        catalog: &Catalog,
        lang: &str,
        node: Node<'_, '_>,
        drafts: &mut BTreeMap<u64, EventDraft>,
        is_course: bool,
    ) -> Result<bool> {
        let state = self.state()?;
        let text = |tag: &str| element_text(child(node, &format!("event{}", tag)));
        let text_content = |tag: &str| clean(text(tag));

        let eid: u64 = node
            .attribute("id")
            .context("event without id")?
            .trim()
            .parse()
            .context("event id is not a number")?;

        if text_content("servicecode").as_deref() != Some(SERVICE_CODE_ANNOUNCEMENT) && !is_course {
            return Ok(false);
        }
        if let Some(single) = &self.settings.single
            && eid.to_string() != *single
        {
            return Ok(false);
        }

        // Everything that can fail is resolved before the draft is touched.
        let tz = self.settings.timezone;
        let start_raw = text("starttime").with_context(|| format!("event {} has no start time", eid))?;
        let (start_time, has_start_time) =
            parse_timestamp(&start_raw, tz).with_context(|| format!("event {}", eid))?;
        let end = match text("endtime").filter(|t| !t.trim().is_empty()) {
            Some(raw) => Some(parse_timestamp(&raw, tz).with_context(|| format!("event {}", eid))?),
            None => None,
        };
        let optional_time = |tag: &str| {
            let raw = text(tag)?;
            match parse_timestamp(&raw, tz) {
                Ok((t, _)) => Some(t),
                Err(e) => {
                    log::warn!("Ignoring {} of event {}: {}", tag, eid, e);
                    None
                }
            }
        };

        let mut candidates: Vec<&str> = vec![lang];
        candidates.extend(state.languages_to_detect.iter().map(String::as_str));

        let draft = drafts.entry(eid).or_default();
        draft.data_source = state.data_source.clone();
        draft.publisher = state.organization.clone();
        draft.origin_id = eid.to_string();

        let title = text_content("title");
        let subtitle = text_content("subtitle");
        draft.headline.set(lang, title.clone());
        draft.secondary_headline.set(lang, subtitle.clone());
        if let Some(name) = make_event_name(title.as_deref(), subtitle.as_deref()) {
            set_multiscript_field(&mut draft.name, &name, &candidates);
        }

        // The body is formatted as a whole, so it is not cleaned.
        let caption = text_content("caption");
        let bodytext = text("bodytext");
        let mut description = String::new();
        match &caption {
            Some(c) => {
                description.push_str(c);
                set_multiscript_field(&mut draft.short_description, c, &candidates);
            }
            None => draft.short_description.set(lang, None),
        }
        if caption.is_some() && bodytext.is_some() {
            description.push_str("\n\n");
        }
        if let Some(body) = &bodytext {
            description.push_str(body);
        }
        if description.is_empty() {
            draft.description.set(lang, None);
        } else {
            set_multiscript_field(&mut draft.description, &html_format(&description), &candidates);
        }

        draft.info_url.set(lang, text_content("www"));

        let links: Vec<String> = child(node, "eventlinks")
            .map(|links| {
                links
                    .children()
                    .filter(|n| n.has_tag_name("eventlink"))
                    .filter_map(|n| element_text(Some(n)))
                    .filter_map(|raw| {
                        let link = normalize_link(&raw);
                        if link.is_none() {
                            log::debug!("Dropping invalid link '{}' of event {}", raw, eid);
                        }
                        link
                    })
                    .collect()
            })
            .unwrap_or_default();
        draft.external_links.insert(lang.to_string(), links);

        if let Some(attachments) = child(node, "eventattachments")
            && let Some(teaser) = attachments
                .children()
                .filter(|n| n.is_element())
                .find(|n| n.attribute("type") == Some("teaserimage"))
        {
            // With the event_only license the full-size picture may be served.
            let url = element_text(Some(teaser))
                .unwrap_or_default()
                .trim()
                .replace("/MediumEventPic", "/EventPic");
            if !url.is_empty() {
                match &state.event_only_license {
                    Some(license) => {
                        draft.images = vec![Image {
                            url,
                            license: Some(license.clone()),
                        }]
                    }
                    None => log::warn!(
                        "Cannot attach image to event {}: license '{}' missing",
                        eid,
                        EVENT_ONLY_LICENSE
                    ),
                }
            }
        }

        if let Some(provider) = text_content("organizer") {
            set_multiscript_field(&mut draft.provider, &provider, &candidates);
        }

        draft.start_time = Some(start_time);
        draft.has_start_time = has_start_time;
        if let Some((end_time, has_end_time)) = end {
            draft.has_end_time = has_end_time;
            // Broken source data sometimes ends before it starts.
            draft.end_time = Some(if end_time > start_time { end_time } else { start_time });
        }

        if is_course {
            draft.extension_course = Some(CourseExtension {
                enrolment_start_time: optional_time("enrolmentstarttime"),
                enrolment_end_time: optional_time("enrolmentendtime"),
            });
        }

        let offer = draft.offer.get_or_insert_with(Offer::default);
        let price_el = child(node, "eventprice");
        let free = price_el.and_then(|p| p.attribute("free")) == Some("true");
        offer.is_free = free;
        // The ticket info field sometimes carries broken HTML snippets.
        let ticket_info = price_el
            .and_then(|p| p.attribute("ticketinfo"))
            .filter(|d| !d.contains("href"))
            .map(str::to_string);
        offer.description.set(lang, ticket_info);
        if !free {
            offer.price.set(lang, text_content("price"));
        }
        offer.info_url.set(
            lang,
            price_el
                .and_then(|p| p.attribute("ticketlink"))
                .map(str::to_string),
        );

        let audience_ids = audience_keyword_ids();
        let mut keywords = BTreeSet::new();
        let mut audience = BTreeSet::new();
        if let Some(cats) = child(node, "eventcategories") {
            for cat in cats.children().filter(|n| n.is_element()) {
                let Some(raw) = clean(element_text(Some(cat))) else {
                    continue;
                };
                let Ok(cid) = raw.parse::<u32>() else {
                    log::warn!("Invalid category '{}' in event {}", raw, eid);
                    continue;
                };
                if let Some(category) = state.categories.get(&cid) {
                    for kw in &category.yso_keywords {
                        keywords.insert(kw.clone());
                        if audience_ids.contains(kw) {
                            audience.insert(kw.clone());
                        }
                    }
                }
                // The source category is kept as a keyword as well.
                let kulke_id = make_kulke_id(cid);
                if catalog.keyword(&kulke_id).is_some() {
                    keywords.insert(kulke_id);
                } else {
                    log::error!("Could not find {}", kulke_id);
                }
            }
        }
        if is_course {
            keywords.extend(state.course_keywords.iter().cloned());
            audience.extend(state.course_keywords.intersection(&audience_ids).cloned());
        }
        draft.keywords = keywords;
        draft.audience = audience;

        let location = &mut draft.location;
        location.street_address.set(lang, text_content("address"));
        location.postal_code = text_content("postalcode");
        let municipality = text_content("postaloffice").map(|m| {
            if m == "Helsingin kaupunki" {
                "Helsinki".to_string()
            } else {
                m
            }
        });
        location.address_locality.set(lang, municipality);
        location.telephone.set(lang, text_content("phone"));
        location.name = text_content("location");

        Self::find_place(state, draft);
        Ok(true)
    }

    /// The event's own id plus every id it lists as a recurrence.
    fn gather_recurring_group(node: Node<'_, '_>, this_id: u64) -> BTreeSet<u64> {
        let mut group: BTreeSet<u64> = child(node, "eventreferences")
            .map(|refs| {
                refs.children()
                    .filter(|n| n.has_tag_name("recurring"))
                    .filter_map(|n| n.attribute("id")?.trim().parse().ok())
                    .collect()
            })
            .unwrap_or_default();
        group.insert(this_id);
        group
    }

    fn import(&mut self, catalog: &mut Catalog, importing_courses: bool) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        let mut drafts: BTreeMap<u64, EventDraft> = BTreeMap::new();
        let mut recurring_groups: BTreeMap<u64, BTreeSet<u64>> = BTreeMap::new();

        for lang in SUPPORTED_LANGUAGES {
            let file = format!("events-{}.xml", lang);
            let xml = self.read_feed(&file)?;
            let doc = Document::parse(&xml).with_context(|| format!("Malformed XML in {}", file))?;
            let root = doc.root_element();
            if !root.has_tag_name("eventdata") {
                anyhow::bail!("Expected <eventdata> root in {}", file);
            }
            for node in root.children().filter(|n| n.has_tag_name("event")) {
                match self.import_event(catalog, lang, node, &mut drafts, importing_courses) {
                    Ok(true) => {
                        if let Some(id) = node
                            .attribute("id")
                            .and_then(|i| i.trim().parse::<u64>().ok())
                        {
                            recurring_groups.insert(id, Self::gather_recurring_group(node, id));
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        log::warn!("Skipping event in {}: {:#}", file, e);
                        report.skipped += 1;
                    }
                }
            }
        }

        let now = Utc::now();
        let course_ids = course_keyword_ids();
        for draft in drafts.into_values() {
            let is_course = draft.keywords.iter().any(|k| course_ids.contains(k));
            if is_course == importing_courses {
                report.record(save_event(catalog, draft, now));
            }
        }

        verify_recurring_groups(&recurring_groups);
        let aggregates = self.save_recurring_superevents(catalog, &recurring_groups, now)?;
        report.aggregates = aggregates.len();
        for aggregate in aggregates {
            self.update_super_event(catalog, aggregate, now);
        }

        log::info!("Kulke import finished: {}", report);
        Ok(report)
    }

    /// Creates or extends an aggregate for every recurring group and links
    /// the members to its super event. Returns the aggregates touched.
    pub fn save_recurring_superevents(
        &self,
        catalog: &mut Catalog,
        recurring_groups: &BTreeMap<u64, BTreeSet<u64>>,
        now: DateTime<Utc>,
    ) -> Result<BTreeSet<u64>> {
        let state = self.state()?;
        // Events that now declare no recurrences. Stale groups reported by
        // their former siblings must not pull them back in.
        let leaving: BTreeSet<u64> = recurring_groups
            .iter()
            .filter(|(_, group)| group.len() == 1)
            .map(|(id, _)| *id)
            .collect();
        let groups: BTreeSet<BTreeSet<u64>> = recurring_groups
            .values()
            .filter(|group| group.len() > 1)
            .map(|group| group.difference(&leaving).copied().collect())
            .collect();
        let mut touched = BTreeSet::new();

        for group in &groups {
            let kulke_ids: Vec<String> = group.iter().map(make_kulke_id).collect();
            let existing = catalog.aggregates_containing(kulke_ids.iter().map(String::as_str));
            if existing.len() > 1 {
                log::error!(
                    "Recurring group {:?} spans several aggregates {:?}; skipping",
                    group,
                    existing
                );
                continue;
            }
            let existing = existing.into_iter().next();

            let events: Vec<String> = kulke_ids
                .into_iter()
                .filter(|id| catalog.event(id).is_some())
                .collect();
            if events.len() < 2 {
                continue;
            }

            let agg = match existing {
                Some(agg) => agg,
                None => {
                    let agg =
                        catalog.create_recurring_aggregate(&state.data_source, &state.organization, now);
                    log::info!("Created recurring aggregate {} for {:?}", agg, group);
                    agg
                }
            };
            for id in &events {
                catalog.add_aggregate_member(agg, id);
            }
            let super_id = catalog
                .aggregate(agg)
                .and_then(|a| a.super_event.clone());
            for id in &events {
                catalog.set_super_event(id, super_id.as_deref());
            }
            touched.insert(agg);
        }

        // An event that no longer recurs but is still listed by an aggregate
        // from an earlier run. This is the only way an event leaves one.
        for id in leaving {
            let kulke_id = make_kulke_id(id);
            for agg in catalog.aggregates_containing([kulke_id.as_str()]) {
                if catalog.remove_aggregate_member(agg, &kulke_id) {
                    log::info!("Removed {} from aggregate {}", kulke_id, agg);
                    touched.insert(agg);
                }
            }
        }
        Ok(touched)
    }

    /// Recomputes the aggregate's super event from its current members.
    pub fn update_super_event(&self, catalog: &mut Catalog, aggregate: u64, now: DateTime<Utc>) {
        let Some(super_id) = catalog.aggregate(aggregate).and_then(|a| a.super_event.clone()) else {
            return;
        };
        let children: Vec<_> = catalog
            .aggregate_members(aggregate)
            .into_iter()
            .cloned()
            .collect();
        if children.is_empty() {
            log::warn!("Aggregate {} has no members left", aggregate);
            return;
        }
        let Some(mut super_event) = catalog.event(&super_id).cloned() else {
            log::error!("Super event {} of aggregate {} is missing", super_id, aggregate);
            return;
        };

        let before = super_event.clone();
        let refs: Vec<_> = children.iter().collect();
        merge_into_super_event(&mut super_event, &refs, &self.settings.languages);
        if !before.same_content(&super_event) {
            super_event.last_modified_time = Some(now);
            log::info!("Updated super event {}", super_id);
        }
        catalog.insert_event(super_event);
    }
}

/// Logs events whose declared recurrences disagree with each other.
/// Returns the number of disagreeing pairs.
pub fn verify_recurring_groups(recurring_groups: &BTreeMap<u64, BTreeSet<u64>>) -> usize {
    let mut mismatches = 0;
    for (key, group) in recurring_groups {
        for inner_key in group {
            if let Some(inner_group) = recurring_groups.get(inner_key)
                && inner_group != group
            {
                log::warn!(
                    "Differing recurring groups: {} {:?} vs {} {:?}",
                    key,
                    group,
                    inner_key,
                    inner_group
                );
                mismatches += 1;
            }
        }
    }
    mismatches
}

impl Importer for KulkeImporter {
    fn name(&self) -> &'static str {
        DATA_SOURCE
    }

    fn supported_languages(&self) -> &'static [&'static str] {
        SUPPORTED_LANGUAGES
    }

    fn setup(&mut self, catalog: &mut Catalog) -> Result<()> {
        let languages_to_detect = self
            .settings
            .languages
            .iter()
            .filter(|l| !SUPPORTED_LANGUAGES.contains(&l.as_str()))
            .map(|l| l.replace('-', "_"))
            .collect();

        catalog.data_source(PLACE_DATA_SOURCE).with_context(|| {
            format!(
                "Data source '{}' is missing; load the place fixtures first",
                PLACE_DATA_SOURCE
            )
        })?;
        let data_source = catalog.get_or_create_data_source(DATA_SOURCE, DATA_SOURCE_NAME);
        let ahjo = catalog
            .get_or_create_data_source(ORGANIZATION_DATA_SOURCE, ORGANIZATION_DATA_SOURCE_NAME);
        let organization =
            catalog.get_or_create_organization(&ahjo.id, ORGANIZATION_ORIGIN_ID, ORGANIZATION_NAME);

        let tprek_by_id = catalog.place_ids_by_origin(
            PLACE_DATA_SOURCE,
            LOCATION_TPREK_MAP.iter().map(|(_, id)| *id),
        );

        log::info!("Preprocessing categories");
        let mut categories = parse_categories(&self.read_feed("category.xml")?)?;
        Self::resolve_category_keywords(catalog, &mut categories)?;

        let course_ids: Vec<String> = COURSE_KEYWORDS.iter().map(|k| yso_id(k)).collect();
        let course_keywords = catalog.existing_keyword_ids(course_ids.iter().map(String::as_str));
        let event_only_license = catalog.license(EVENT_ONLY_LICENSE).map(|l| l.id.clone());

        self.state = Some(KulkeState {
            data_source: data_source.id,
            organization: organization.id,
            tprek_by_id,
            categories,
            course_keywords,
            event_only_license,
            languages_to_detect,
        });
        Ok(())
    }

    fn import_keywords(&mut self, catalog: &mut Catalog) -> Result<ImportReport> {
        log::info!("Importing Kulke categories as keywords");
        let state = self.state()?.clone();
        let categories = parse_categories(&self.read_feed("category.xml")?)?;
        let now = Utc::now();
        let mut report = ImportReport::default();

        for (cid, category) in categories {
            let id = make_kulke_id(cid);
            match catalog.keyword(&id).cloned() {
                Some(mut word) => {
                    let mut changed = false;
                    if word.name.get("fi") != Some(category.text.as_str()) {
                        word.name.set("fi", Some(category.text.clone()));
                        changed = true;
                    }
                    if word.publisher.as_deref() != Some(state.organization.as_str()) {
                        word.publisher = Some(state.organization.clone());
                        changed = true;
                    }
                    if changed {
                        word.last_modified_time = Some(now);
                        catalog.upsert_keyword(word);
                        report.updated += 1;
                    } else {
                        report.unchanged += 1;
                    }
                }
                None => {
                    let mut word = Keyword::new(
                        &id,
                        &state.data_source,
                        Translated::from_pairs([("fi", category.text)]),
                    );
                    word.publisher = Some(state.organization.clone());
                    word.created_time = Some(now);
                    word.last_modified_time = Some(now);
                    catalog.upsert_keyword(word);
                    report.created += 1;
                }
            }
        }
        log::info!("Kulke keywords: {}", report);
        Ok(report)
    }

    fn import_events(&mut self, catalog: &mut Catalog) -> Result<ImportReport> {
        log::info!("Importing Kulke events");
        self.import(catalog, false)
    }

    fn import_courses(&mut self, catalog: &mut Catalog) -> Result<ImportReport> {
        log::info!("Importing Kulke courses");
        self.import(catalog, true)
    }

    fn delete_courses(&mut self, catalog: &mut Catalog) -> Result<usize> {
        let course_ids = course_keyword_ids();
        let is_course =
            |e: &Event| e.data_source == DATA_SOURCE && e.keywords.iter().any(|k| course_ids.contains(k));
        let doomed: Vec<String> = catalog
            .events()
            .filter(|&e| is_course(e))
            .map(|e| e.id.clone())
            .collect();
        let affected = catalog.aggregates_containing(doomed.iter().map(String::as_str));

        let deleted = catalog.delete_events_where(is_course);
        log::info!("Deleted {} Kulke courses", deleted);

        let now = Utc::now();
        for agg in affected {
            let remaining = catalog.aggregate(agg).map_or(0, |a| a.members.len());
            if remaining < 2 {
                if catalog.remove_aggregate(agg) {
                    log::info!("Dissolved aggregate {} after deleting its courses", agg);
                }
            } else {
                self.update_super_event(catalog, agg, now);
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_kulke_id() {
        assert_eq!(make_kulke_id(105), "kulke:105");
        assert_eq!(make_kulke_id("70"), "kulke:70");
    }

    #[test]
    fn test_parse_categories() {
        let xml = r#"<data><categories>
            <category id="105" typeid="1">Lastentapahtumat</category>
            <category id="53" typeid="1">Suomi</category>
            <category id="900" typeid="2"/>
        </categories></data>"#;
        let cats = parse_categories(xml).unwrap();
        assert_eq!(cats.len(), 3);
        assert_eq!(cats[&105].text, "Lastentapahtumat");
        assert_eq!(cats[&900].type_id, 2);
        assert_eq!(cats[&900].text, "");

        assert!(parse_categories("<other/>").is_err());
    }

    #[test]
    fn test_match_venue() {
        let none = Translated::new();
        assert_eq!(match_venue("Annantalo", &none), Some("7254"));
        assert_eq!(match_venue("Stoa, musiikkisali", &none), Some("7259"));
        assert_eq!(match_venue("Kulttuurikeskus Caisa, sali", &none), Some("7256"));
        assert_eq!(match_venue("Lasten Annantalo", &none), Some("7254"));

        let sv = Translated::from_pairs([("sv", "Klarinettvägen 5")]);
        assert_eq!(match_venue("Okänd sal", &sv), Some("7255"));
        assert_eq!(match_venue("Tuntematon", &none), None);
    }

    #[test]
    fn test_verify_recurring_groups() {
        let mut groups = BTreeMap::new();
        groups.insert(1, BTreeSet::from([1, 2]));
        groups.insert(2, BTreeSet::from([1, 2]));
        assert_eq!(verify_recurring_groups(&groups), 0);

        groups.insert(2, BTreeSet::from([2, 3]));
        assert_eq!(verify_recurring_groups(&groups), 1);
    }
}
