use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Url};

use super::{LoadReport, SyncError, ical};
use crate::cache::FetchCache;
use crate::core::item::{Completion, Item};
use crate::profile::Profile;
use crate::store::ItemStore;

/// Relay prefixed to the calendar URL to satisfy cross-origin restrictions.
/// Not a security boundary; the calendar is publicly accessible regardless.
pub const DEFAULT_RELAY: &str = "https://cors-anywhere.herokuapp.com/";

// Assignment summaries look like "Title (extra) [CLASS]" or "Title [CLASS]".
static TITLE_BEFORE_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+?) \(").unwrap());
static TITLE_BEFORE_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+?) \[").unwrap());
static CLASS_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]").unwrap());

/// Client for a Canvas personal calendar feed, fetched through a CORS relay.
/// Responses go through the stale-while-revalidate cache, so a previously
/// seen feed still renders while the network refreshes it.
pub struct CanvasClient {
    cache: FetchCache,
    relay: String,
}

impl CanvasClient {
    pub fn new(relay: &str) -> Result<Self, SyncError> {
        let http = Client::builder().build()?;
        Ok(Self::with_cache(
            FetchCache::new(http, FetchCache::default_dir()),
            relay,
        ))
    }

    pub fn with_cache(cache: FetchCache, relay: &str) -> Self {
        Self {
            cache,
            relay: relay.to_string(),
        }
    }

    /// Warm the cache with the calendar feed at startup so the next load can
    /// serve it from disk. A bad URL or unreachable relay is logged, not fatal.
    pub async fn precache_feed(&self, calendar_url: &str) {
        match self.proxied_url(calendar_url) {
            Ok(url) => self.cache.precache(&[url.as_str()]).await,
            Err(e) => log::warn!("Skipping calendar precache: {}", e),
        }
    }

    /// Relay prefix plus the calendar URL's host and path, scheme and query
    /// stripped.
    pub fn proxied_url(&self, calendar_url: &str) -> Result<String, SyncError> {
        let url = Url::parse(calendar_url)
            .map_err(|e| SyncError::malformed(format!("calendar URL {:?}: {}", calendar_url, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| SyncError::malformed(format!("calendar URL {:?} has no host", calendar_url)))?;
        Ok(format!("{}{}{}", self.relay, host, url.path()))
    }
}

/// Extract the assignment title: text preceding " (" or, failing that, " [".
/// A summary matching neither pattern is malformed.
pub fn extract_title(summary: &str) -> Result<String, SyncError> {
    TITLE_BEFORE_PAREN
        .captures(summary)
        .or_else(|| TITLE_BEFORE_BRACKET.captures(summary))
        .map(|captures| captures[1].to_string())
        .ok_or_else(|| SyncError::malformed(format!("no title delimiter in summary {:?}", summary)))
}

/// The bracketed class label, brackets included; empty when absent.
pub fn extract_class_label(summary: &str) -> String {
    CLASS_LABEL
        .find(summary)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Rebuild a direct assignment link from the event URL's course-id query
/// parameter and assignment-id fragment.
pub fn assemble_canvas_url(href: &str) -> Result<String, SyncError> {
    let url = Url::parse(href)
        .map_err(|e| SyncError::malformed(format!("event URL {:?}: {}", href, e)))?;
    let course = url
        .query_pairs()
        .find(|(key, _)| key == "include_contexts")
        .map(|(_, value)| value.replace("course_", ""))
        .ok_or_else(|| SyncError::malformed(format!("event URL {:?} has no course context", href)))?;
    let assignment = url.fragment().unwrap_or("").replace("assignment_", "");
    if assignment.is_empty() {
        return Err(SyncError::malformed(format!(
            "event URL {:?} has no assignment fragment",
            href
        )));
    }
    Ok(format!(
        "{}/courses/{}/assignments/{}",
        url.origin().ascii_serialization(),
        course,
        assignment
    ))
}

/// Fetch the configured calendar feed and insert one Item per upcoming event.
///
/// Fails soft on HTTP errors: the status is logged and the load ends with an
/// empty report. Malformed events are tagged and skipped, not fatal.
pub async fn load_canvas_items(
    client: &CanvasClient,
    profile: &Profile,
    store: &ItemStore,
    now: DateTime<Utc>,
) -> Result<LoadReport, SyncError> {
    let mut report = LoadReport::default();

    let calendar_url = profile.canvas_url();
    if calendar_url.is_empty() {
        log::debug!("No Canvas calendar URL configured, skipping");
        return Ok(report);
    }

    let url = client.proxied_url(&calendar_url)?;
    let body = match client.cache.fetch(&url).await {
        Ok(body) => body,
        Err(SyncError::Status { status, .. }) => {
            log::error!("HTTP error fetching calendar, status {}", status);
            return Ok(report);
        }
        Err(e) => return Err(e),
    };

    let events = ical::parse_vevents(&body);
    log::info!("Parsed {} Canvas calendar events", events.len());

    // Ignore past assignments.
    for event in events.iter().filter(|event| event.start >= now) {
        let title = match extract_title(&event.summary) {
            Ok(title) => title,
            Err(e) => {
                report.record_skip(&e);
                continue;
            }
        };
        let link = match assemble_canvas_url(&event.url) {
            Ok(link) => link,
            Err(e) => {
                report.record_skip(&e);
                continue;
            }
        };
        // Canvas never reports completion, and past events were filtered out
        // above, so this always lands on Incomplete; the Complete arm mirrors
        // the upstream mapping.
        let completed = if now > event.start {
            Completion::Complete
        } else {
            Completion::Incomplete
        };

        store.insert(Item::new(
            title,
            extract_class_label(&event.summary),
            event.description.clone(),
            link,
            event.start,
            completed,
        ));
        report.inserted += 1;
    }

    log::info!("Loaded {} Canvas assignments", report.inserted);
    Ok(report)
}
