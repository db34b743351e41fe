//! Timestamp normalization.
//!
//! Post records carry timestamps in whatever shape the upstream store produced:
//! ISO-8601 with an offset, ISO-8601 without one, or `date time` separated by a
//! space. Every marker-less value is read as UTC, never as the host zone.

use once_cell::sync::Lazy;
use regex::Regex;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::error::{Error, Result};

/// Trailing zone marker on the clock part of a timestamp.
static ZONE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:z|[+-]\d{2}(?::?\d{2})?)$").expect("valid zone marker pattern")
});

static ZONE_SPEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]\d{2}(?::?\d{2})?$").expect("valid zone pattern"));

const MIN_YEAR: i32 = 0;
const MAX_YEAR: i32 = 9999;

/// Returns the UTC instant for `raw`, or `None` when it cannot be read.
pub fn normalize(raw: &str) -> Option<OffsetDateTime> {
    try_normalize(raw).ok()
}

pub fn try_normalize(raw: &str) -> Result<OffsetDateTime> {
    parse_instant(raw.trim()).ok_or_else(|| Error::parse(raw))
}

/// RFC 3339 rendering in UTC with a `Z` marker. Feeding the result back into
/// [`normalize`] yields the same instant.
pub fn to_canonical(instant: OffsetDateTime) -> String {
    let utc = instant.to_offset(UtcOffset::UTC);
    utc.format(&Rfc3339)
        .unwrap_or_else(|_| utc.unix_timestamp().to_string())
}

/// Parses a fixed zone such as `UTC`, `+07:00`, `-0530` or `+09`.
pub fn parse_zone(raw: &str) -> Result<UtcOffset> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("z") {
        return Ok(UtcOffset::UTC);
    }
    if !ZONE_SPEC.is_match(trimmed) {
        return Err(Error::InvalidZone {
            input: raw.to_owned(),
        });
    }
    parse_offset(trimmed).ok_or_else(|| Error::InvalidZone {
        input: raw.to_owned(),
    })
}

/// `dd/MM/yyyy HH:mm` in `zone`, or `N/A` when the value is missing or unreadable.
pub fn format_local(raw: Option<&str>, zone: UtcOffset) -> String {
    raw.and_then(normalize)
        .and_then(|instant| {
            instant
                .to_offset(zone)
                .format(format_description!("[day]/[month]/[year] [hour]:[minute]"))
                .ok()
        })
        .unwrap_or_else(|| "N/A".to_string())
}

/// Calendar date of `instant` as observed in `zone`.
pub fn local_date(instant: OffsetDateTime, zone: UtcOffset) -> Date {
    instant.to_offset(zone).date()
}

fn parse_instant(input: &str) -> Option<OffsetDateTime> {
    if input.is_empty() {
        return None;
    }
    let (date_part, rest) = input.split_once(['T', 't', ' '])?;
    let date = Date::parse(date_part, format_description!("[year]-[month]-[day]")).ok()?;

    let (clock, offset) = match ZONE_MARKER.find(rest) {
        Some(marker) => (&rest[..marker.start()], parse_offset(marker.as_str())?),
        None => (rest, UtcOffset::UTC),
    };
    let time = parse_clock(clock.trim_end())?;

    let local = PrimitiveDateTime::new(date, time).assume_offset(offset);
    let utc = OffsetDateTime::from_unix_timestamp_nanos(local.unix_timestamp_nanos()).ok()?;
    (MIN_YEAR..=MAX_YEAR).contains(&utc.year()).then_some(utc)
}

fn parse_clock(clock: &str) -> Option<Time> {
    let parsed = if clock.contains('.') {
        Time::parse(
            clock,
            format_description!("[hour]:[minute]:[second].[subsecond]"),
        )
    } else if clock.len() > 5 {
        Time::parse(clock, format_description!("[hour]:[minute]:[second]"))
    } else {
        Time::parse(clock, format_description!("[hour]:[minute]"))
    };
    parsed.ok()
}

fn parse_offset(marker: &str) -> Option<UtcOffset> {
    if marker.eq_ignore_ascii_case("z") {
        return Some(UtcOffset::UTC);
    }
    let (sign, digits) = match marker.split_at(1) {
        ("+", digits) => (1i8, digits),
        ("-", digits) => (-1i8, digits),
        _ => return None,
    };
    let digits: String = digits.chars().filter(|ch| *ch != ':').collect();
    let hours: i8 = digits.get(0..2)?.parse().ok()?;
    let minutes: i8 = match digits.get(2..4) {
        Some(minutes) => minutes.parse().ok()?,
        None => 0,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use time::macros::{datetime, offset};

    #[test]
    fn marker_less_input_is_read_as_utc() {
        assert_eq!(
            normalize("2024-01-10 08:00:00"),
            Some(datetime!(2024-01-10 08:00:00 UTC))
        );
        assert_eq!(
            normalize("2024-01-10T08:00:00"),
            Some(datetime!(2024-01-10 08:00:00 UTC))
        );
        assert_eq!(
            normalize("2024-01-10T08:00"),
            Some(datetime!(2024-01-10 08:00:00 UTC))
        );
    }

    #[test]
    fn explicit_markers_are_honoured() {
        assert_eq!(
            normalize("2024-01-10T15:00:00+07:00"),
            Some(datetime!(2024-01-10 08:00:00 UTC))
        );
        assert_eq!(
            normalize("2024-01-10T03:00:00-0500"),
            Some(datetime!(2024-01-10 08:00:00 UTC))
        );
        assert_eq!(
            normalize("2024-01-10T17:00:00+09"),
            Some(datetime!(2024-01-10 08:00:00 UTC))
        );
        assert_eq!(
            normalize("2024-01-10T08:00:00z"),
            Some(datetime!(2024-01-10 08:00:00 UTC))
        );
        assert_eq!(
            normalize("2024-01-10 08:00:00 +00:00"),
            Some(datetime!(2024-01-10 08:00:00 UTC))
        );
    }

    #[test]
    fn fractional_seconds_are_kept() {
        assert_eq!(
            normalize("2024-01-10T08:00:00.123456"),
            Some(datetime!(2024-01-10 08:00:00.123456 UTC))
        );
    }

    #[test]
    fn unreadable_input_yields_none() {
        for raw in [
            "",
            "   ",
            "not-a-date",
            "2024-01-10",
            "2024-13-01 08:00:00",
            "2024-01-10 25:00:00",
            "2024-01-10T08:00:00+25:00",
            "10/01/2024 08:00",
        ] {
            assert_eq!(normalize(raw), None, "{raw:?} should not normalize");
        }
        assert_matches!(try_normalize("nope"), Err(Error::Parse { input }) if input == "nope");
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(
            normalize("  2024-01-10T08:00:00Z\n"),
            Some(datetime!(2024-01-10 08:00:00 UTC))
        );
    }

    #[test]
    fn canonical_form_normalizes_to_the_same_instant() {
        for raw in [
            "2024-01-10 08:00:00",
            "2024-01-10T15:30:00+07:00",
            "2023-12-31T23:59:59.5-03:30",
            "2024-02-29T00:00",
            "0000-01-01T12:00:00Z",
            "9999-12-31 10:00:00",
        ] {
            let first = normalize(raw).expect("sample parses");
            let canonical = to_canonical(first);
            assert!(canonical.ends_with('Z'), "{canonical}");
            assert_eq!(normalize(&canonical), Some(first), "{raw} -> {canonical}");
        }
    }

    #[test]
    fn instants_leaving_the_supported_range_are_rejected() {
        assert_eq!(normalize("0000-01-01T01:00:00+05:00"), None);
        assert_eq!(normalize("9999-12-31T23:00:00-05:00"), None);
    }

    #[test]
    fn zones_parse_in_the_common_spellings() -> anyhow::Result<()> {
        assert_eq!(parse_zone("UTC")?, UtcOffset::UTC);
        assert_eq!(parse_zone("z")?, UtcOffset::UTC);
        assert_eq!(parse_zone("+07:00")?, offset!(+7));
        assert_eq!(parse_zone("-0530")?, offset!(-5:30));
        assert_eq!(parse_zone("+09")?, offset!(+9));
        assert_matches!(parse_zone("Asia/Ho_Chi_Minh"), Err(Error::InvalidZone { .. }));
        assert_matches!(parse_zone("+24:00"), Err(Error::InvalidZone { .. }));
        Ok(())
    }

    #[test]
    fn local_rendering_uses_the_display_zone() {
        assert_eq!(
            format_local(Some("2024-01-10 20:15:00"), offset!(+7)),
            "11/01/2024 03:15"
        );
        assert_eq!(format_local(Some("garbage"), offset!(+7)), "N/A");
        assert_eq!(format_local(None, UtcOffset::UTC), "N/A");
    }

    #[test]
    fn local_date_crosses_midnight_with_the_zone() {
        let instant = datetime!(2024-01-10 18:30:00 UTC);
        assert_eq!(local_date(instant, offset!(+7)).to_string(), "2024-01-11");
        assert_eq!(local_date(instant, UtcOffset::UTC).to_string(), "2024-01-10");
    }
}
