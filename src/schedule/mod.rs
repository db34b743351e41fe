//! Conversion between instants and the local wall-clock text a schedule
//! editor shows, plus the "no scheduling in the past" guard applied before a
//! post is submitted.

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::{Error, Result};

/// Shape of the text produced by [`to_editable`].
pub const EDITABLE_FORMAT: &str = "YYYY-MM-DDTHH:MM";

const EDITABLE: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]");

/// Every wall-clock shape [`from_editable`] accepts, most specific first.
const ACCEPTED: [&[FormatItem<'static>]; 5] = [
    EDITABLE,
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[day]/[month]/[year] [hour]:[minute]"),
];

const NANOS_PER_MINUTE: i128 = 60 * 1_000_000_000;

/// Renders `instant` as minute-resolution wall-clock text in `zone`.
///
/// A missing instant, or one whose local wall clock falls outside the
/// representable years, renders the current time instead, so the editor never
/// starts out empty.
pub fn to_editable(instant: Option<OffsetDateTime>, zone: UtcOffset) -> String {
    let zone = whole_minute_zone(zone);
    if let Some(instant) = instant {
        if let Some(text) = render(instant, zone) {
            return text;
        }
        tracing::debug!(%instant, %zone, "instant has no wall-clock form in zone, showing now");
    }
    render(OffsetDateTime::now_utc(), zone).unwrap_or_default()
}

/// Reads wall-clock text typed in `zone` back into a UTC instant. Seconds are
/// dropped so the result always sits on a whole minute.
pub fn from_editable(raw: &str, zone: UtcOffset) -> Option<OffsetDateTime> {
    let trimmed = raw.trim();
    let local = ACCEPTED
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(trimmed, *format).ok())?;
    let zoned = local.assume_offset(whole_minute_zone(zone));
    let utc = OffsetDateTime::from_unix_timestamp_nanos(zoned.unix_timestamp_nanos()).ok()?;
    Some(truncate_to_minute(utc))
}

/// Pre-submission guard: the typed schedule must parse and must not lie
/// before `now`. A schedule equal to `now` is accepted.
pub fn validate_schedule(raw: &str, zone: UtcOffset, now: OffsetDateTime) -> Result<OffsetDateTime> {
    let requested = from_editable(raw, zone).ok_or_else(|| Error::parse(raw))?;
    if requested < now {
        return Err(Error::Validation { requested, now });
    }
    Ok(requested)
}

pub fn is_schedulable(raw: &str, zone: UtcOffset, now: OffsetDateTime) -> bool {
    validate_schedule(raw, zone, now).is_ok()
}

/// Drops seconds and sub-seconds, returning the instant in UTC.
pub fn truncate_to_minute(instant: OffsetDateTime) -> OffsetDateTime {
    let nanos = instant.unix_timestamp_nanos();
    OffsetDateTime::from_unix_timestamp_nanos(nanos - nanos.rem_euclid(NANOS_PER_MINUTE))
        .unwrap_or(instant)
}

/// Editable text has no seconds field, so the zone is cut to whole minutes
/// on both ends.
fn whole_minute_zone(zone: UtcOffset) -> UtcOffset {
    UtcOffset::from_hms(zone.whole_hours(), zone.minutes_past_hour(), 0).unwrap_or(UtcOffset::UTC)
}

fn render(instant: OffsetDateTime, zone: UtcOffset) -> Option<String> {
    let utc = OffsetDateTime::from_unix_timestamp_nanos(instant.unix_timestamp_nanos()).ok()?;
    let shifted = truncate_to_minute(utc)
        .checked_add(Duration::seconds(i64::from(zone.whole_seconds())))?;
    PrimitiveDateTime::new(shifted.date(), shifted.time())
        .format(EDITABLE)
        .ok()
}
