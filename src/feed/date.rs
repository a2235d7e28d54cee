//! RSS publication date parsing.
//!
//! Two layouts are tried in order:
//!
//! 1. numeric offset: `Mon, 02 Jan 2006 15:04:05 -0700`
//! 2. named zone:     `Mon, 02 Jan 2006 15:04:05 MST`
//!
//! Anything else is a [`PollerError::DateFormat`].

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

use crate::{PollerError, Result};

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Layout after the weekday, numeric offset form.
const NUMERIC_OFFSET_LAYOUT: &str = "%d %b %Y %H:%M:%S %z";

/// Layout after the weekday, without the zone name.
const NAMED_ZONE_LAYOUT: &str = "%d %b %Y %H:%M:%S";

/// Parse an RSS `pubDate` into UTC.
pub fn parse_pub_date(raw: &str) -> Result<DateTime<Utc>> {
    let text = raw.trim();
    strip_weekday(text)
        .and_then(|rest| parse_numeric_offset(rest).or_else(|| parse_named_zone(rest)))
        .ok_or_else(|| PollerError::DateFormat(raw.to_string()))
}

// The weekday must be present and spelled correctly but is not checked
// against the date; feeds in the wild get it wrong often enough.
fn strip_weekday(text: &str) -> Option<&str> {
    let (day, rest) = text.split_once(", ")?;
    WEEKDAYS.contains(&day).then_some(rest)
}

fn parse_numeric_offset(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(text, NUMERIC_OFFSET_LAYOUT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_named_zone(text: &str) -> Option<DateTime<Utc>> {
    let (stamp, zone) = text.rsplit_once(' ')?;
    let offset = FixedOffset::east_opt(zone_offset_secs(zone)?)?;
    let naive = NaiveDateTime::parse_from_str(stamp, NAMED_ZONE_LAYOUT).ok()?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Offset in seconds east of UTC for a zone abbreviation.
///
/// Unknown abbreviations of 3-5 uppercase letters are taken as UTC.
fn zone_offset_secs(zone: &str) -> Option<i32> {
    const HOUR: i32 = 3600;
    let offset = match zone {
        "UT" | "UTC" | "GMT" | "Z" => 0,
        "EST" => -5 * HOUR,
        "EDT" => -4 * HOUR,
        "CST" => -6 * HOUR,
        "CDT" => -5 * HOUR,
        "MST" => -7 * HOUR,
        "MDT" => -6 * HOUR,
        "PST" => -8 * HOUR,
        "PDT" => -7 * HOUR,
        _ if (3..=5).contains(&zone.len()) && zone.bytes().all(|b| b.is_ascii_uppercase()) => 0,
        _ => return None,
    };
    Some(offset)
}
