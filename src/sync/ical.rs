use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// One VEVENT pulled out of a calendar feed, reduced to the properties the
/// Canvas adapter consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub summary: String,
    pub description: String,
    pub url: String,
    pub start: DateTime<Utc>,
}

pub fn parse_ical_date(s: &str) -> Option<NaiveDate> {
    // Handles both "20260224" and date-time formats "20260224T120000".
    // Feed text is untrusted; multibyte junk straddling byte 8 drops the value.
    let date_str = if s.len() >= 8 { s.get(..8)? } else { s };
    NaiveDate::parse_from_str(date_str, "%Y%m%d").ok()
}

pub fn parse_ical_datetime(s: &str) -> Option<NaiveDateTime> {
    // "20260224T143000" or "20260224T143000Z"
    let s = s.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S").ok()
}

pub fn unescape_text(s: &str) -> String {
    s.replace("\\n", "\n")
        .replace("\\;", ";")
        .replace("\\,", ",")
        .replace("\\\\", "\\")
}

/// Parse a line like "KEY;PARAM=VAL:value" -> ("KEY", "value")
pub fn parse_ical_line(line: &str) -> Option<(&str, &str)> {
    let colon_pos = line.find(':')?;
    let key_part = &line[..colon_pos];
    let value = &line[colon_pos + 1..];
    // Strip parameters (e.g., "DTSTART;VALUE=DATE" -> "DTSTART")
    let key = key_part.split(';').next().unwrap_or(key_part);
    Some((key, value))
}

/// Unfold RFC 5545 continuation lines (lines starting with space/tab are appended to previous).
pub fn unfold_lines(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for line in input.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            // Continuation: append without the leading whitespace
            result.push_str(&line[1..]);
        } else {
            if !result.is_empty() {
                result.push('\n');
            }
            result.push_str(line);
        }
    }
    result
}

/// Scan a VCALENDAR body and collect every VEVENT subcomponent.
///
/// Events missing a SUMMARY or a parseable DTSTART are dropped. DTSTART with
/// VALUE=DATE (all-day) resolves to midnight UTC; the feed's date-times carry
/// a trailing Z and are taken as UTC.
pub fn parse_vevents(ical: &str) -> Vec<FeedEvent> {
    let unfolded = unfold_lines(ical);

    let mut events = Vec::new();
    let mut in_vevent = false;
    let mut summary = String::new();
    let mut description = String::new();
    let mut url = String::new();
    let mut dtstart: Option<NaiveDateTime> = None;

    for line in unfolded.lines() {
        let line = line.trim_end();
        if line == "BEGIN:VEVENT" {
            in_vevent = true;
            summary.clear();
            description.clear();
            url.clear();
            dtstart = None;
            continue;
        }
        if line == "END:VEVENT" {
            in_vevent = false;
            if let Some(start) = dtstart {
                if !summary.is_empty() {
                    events.push(FeedEvent {
                        summary: summary.clone(),
                        description: description.clone(),
                        url: url.clone(),
                        start: start.and_utc(),
                    });
                }
            }
            continue;
        }
        if !in_vevent {
            continue;
        }

        let is_date_only = line.contains("VALUE=DATE") && !line.contains("VALUE=DATE-TIME");

        if let Some((key, value)) = parse_ical_line(line) {
            match key {
                "SUMMARY" => summary = unescape_text(value),
                "DESCRIPTION" => description = unescape_text(value),
                "URL" => url = value.trim().to_string(),
                "DTSTART" => {
                    if is_date_only {
                        dtstart = parse_ical_date(value).and_then(|d| d.and_hms_opt(0, 0, 0));
                    } else {
                        dtstart = parse_ical_datetime(value);
                    }
                }
                _ => {}
            }
        }
    }

    events
}
