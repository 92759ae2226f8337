// File: ./src/importer/text.rs
// Small helpers for turning feed values into catalog values.
use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use roxmltree::Node;
use std::sync::OnceLock;
use url::{Host, Url};

/// Concatenated text of the element and its descendants. `None` for a
/// missing element or one without any text.
pub fn element_text(node: Option<Node<'_, '_>>) -> Option<String> {
    let node = node?;
    let mut out = String::new();
    let mut seen = false;
    for d in node.descendants().filter(|d| d.is_text()) {
        if let Some(t) = d.text() {
            out.push_str(t);
            seen = true;
        }
    }
    if seen { Some(out) } else { None }
}

/// First child element named `tag`.
pub fn child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(tag))
}

/// Trims, and turns blank strings into `None`.
pub fn clean(text: Option<String>) -> Option<String> {
    let text = text?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Wraps blank-line separated paragraphs in `<p>` and joins the lines of a
/// paragraph with `<br>`.
pub fn html_format(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    text.split("\n\n")
        .map(|paragraph| {
            let lines: Vec<&str> = paragraph.trim().split('\n').collect();
            format!("<p>{}</p>", lines.join("<br>"))
        })
        .collect()
}

fn scheme_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\w+?://").ok()).as_ref()
}

/// Adds `http://` to scheme-less links and keeps only web/ftp URLs with a
/// plausible host.
pub fn normalize_link(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let has_scheme = scheme_regex().is_some_and(|re| re.is_match(raw));
    let link = if has_scheme {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };

    let url = Url::parse(&link).ok()?;
    if !matches!(url.scheme(), "http" | "https" | "ftp" | "ftps") {
        return None;
    }
    match url.host()? {
        Host::Domain(d) if d == "localhost" || (d.contains('.') && !d.ends_with('.')) => {}
        Host::Domain(_) => return None,
        Host::Ipv4(_) | Host::Ipv6(_) => {}
    }
    Some(link)
}

const AWARE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S%z", "%Y-%m-%dT%H:%M%z"];
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

/// Parses a feed timestamp. Returns the instant and whether the source
/// carried a time of day.
///
/// Offset-aware values are taken as is. Values without an offset are local
/// time in `tz`; a bare date (or local midnight) means "date only".
pub fn parse_timestamp(raw: &str, tz: Tz) -> Result<(DateTime<Utc>, bool)> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("empty timestamp");
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok((dt.with_timezone(&Utc), true));
    }
    for fmt in AWARE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Ok((dt.with_timezone(&Utc), true));
        }
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        });
    let Some(naive) = naive else {
        bail!("unrecognized timestamp '{}'", raw);
    };

    let Some(local) = tz.from_local_datetime(&naive).earliest() else {
        bail!("timestamp '{}' does not exist in {}", raw, tz);
    };
    Ok((local.with_timezone(&Utc), naive.time() != NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Helsinki;

    #[test]
    fn test_element_text_includes_descendants() {
        let doc = roxmltree::Document::parse(
            "<event><eventtitle>Jazz <b>ilta</b></eventtitle><eventsubtitle/></event>",
        )
        .unwrap();
        let root = doc.root_element();
        assert_eq!(
            element_text(child(root, "eventtitle")).as_deref(),
            Some("Jazz ilta")
        );
        assert_eq!(element_text(child(root, "eventsubtitle")), None);
        assert_eq!(element_text(child(root, "missing")), None);
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean(Some("  x ".into())).as_deref(), Some("x"));
        assert_eq!(clean(Some(" \n ".into())), None);
        assert_eq!(clean(None), None);
    }

    #[test]
    fn test_html_format() {
        assert_eq!(html_format("Yksi"), "<p>Yksi</p>");
        assert_eq!(
            html_format("Eka rivi\nToka rivi\n\nUusi kappale"),
            "<p>Eka rivi<br>Toka rivi</p><p>Uusi kappale</p>"
        );
        assert_eq!(html_format("A\r\n\r\nB"), "<p>A</p><p>B</p>");
    }

    #[test]
    fn test_normalize_link() {
        assert_eq!(
            normalize_link("www.annantalo.fi").as_deref(),
            Some("http://www.annantalo.fi")
        );
        assert_eq!(
            normalize_link("https://example.com/x?y=1").as_deref(),
            Some("https://example.com/x?y=1")
        );
        assert_eq!(normalize_link("not a link"), None);
        assert_eq!(normalize_link("mailto://someone"), None);
        assert_eq!(normalize_link("javascript://alert(1)"), None);
        assert_eq!(normalize_link(""), None);
    }

    #[test]
    fn test_parse_timestamp_aware() {
        let (t, has_time) = parse_timestamp("2017-04-25T16:00:00+03:00", Helsinki).unwrap();
        assert!(has_time);
        assert_eq!(t.to_rfc3339(), "2017-04-25T13:00:00+00:00");

        let (t, _) = parse_timestamp("2017-04-25T13:00:00Z", Helsinki).unwrap();
        assert_eq!(t.to_rfc3339(), "2017-04-25T13:00:00+00:00");
    }

    #[test]
    fn test_parse_timestamp_date_only_is_local_midnight() {
        let (t, has_time) = parse_timestamp("2017-01-10", Helsinki).unwrap();
        assert!(!has_time);
        // Helsinki is UTC+2 in winter
        assert_eq!(t.to_rfc3339(), "2017-01-09T22:00:00+00:00");

        let (_, has_time) = parse_timestamp("2017-01-10T00:00:00", Helsinki).unwrap();
        assert!(!has_time);
        let (_, has_time) = parse_timestamp("10.01.2017 18:30", Helsinki).unwrap();
        assert!(has_time);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("", Helsinki).is_err());
        assert!(parse_timestamp("huomenna", Helsinki).is_err());
    }
}
