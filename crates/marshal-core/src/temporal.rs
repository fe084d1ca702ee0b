//! # Temporal Parsing and Encoding
//!
//! Parsers for the temporal field types and the matching output encoders.
//! Every string produced by a `format_*` function is accepted by the
//! corresponding `parse_*` function, so temporal values survive a
//! dump/load cycle unchanged.
//!
//! ## Accepted Inputs
//!
//! - **Datetime**: RFC 3339 (`2032-04-23T10:20:30.400+02:30`), or a naive
//!   `YYYY-MM-DDTHH:MM[:SS[.f]]` (space separator allowed) which is read as
//!   UTC. Numbers are Unix time.
//! - **Date**: `YYYY-MM-DD`, or Unix time (date part in UTC).
//! - **Time**: `HH:MM[:SS[.f]]`.
//! - **Duration**: ISO 8601 `[-]P[nW][nD][T[nH][nM][n[.f]S]]`, or a number
//!   of seconds. Years and months are rejected because they have no fixed
//!   length.
//!
//! ## Unix Time Units
//!
//! A numeric timestamp whose magnitude exceeds [`UNIX_MILLIS_THRESHOLD`] is
//! read as milliseconds, otherwise as seconds. `1966280412345.6789` is
//! therefore `2032-04-22` rather than a date in the distant future.

use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeDelta, Utc,
};

use crate::error::CoercionError;

/// Magnitude above which a numeric timestamp is read as milliseconds.
pub const UNIX_MILLIS_THRESHOLD: f64 = 2e10;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

const NANOS_PER_SECOND: i128 = 1_000_000_000;

// ─── Datetimes ───────────────────────────────────────────────────────

/// Parse a datetime string. Naive datetimes are taken to be UTC.
///
/// # Errors
///
/// Returns `CoercionError::Malformed` if no accepted layout matches.
pub fn parse_datetime(s: &str) -> Result<DateTime<FixedOffset>, CoercionError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    Err(CoercionError::malformed(
        "datetime",
        format!("unrecognised datetime format: {s:?}"),
    ))
}

/// Build a UTC datetime from Unix time (seconds or milliseconds).
///
/// # Errors
///
/// Returns an error for non-finite input or timestamps chrono cannot represent.
pub fn datetime_from_unix(ts: f64) -> Result<DateTime<FixedOffset>, CoercionError> {
    utc_from_unix(ts, "datetime").map(|dt| dt.fixed_offset())
}

/// Encode a datetime as RFC 3339, using `Z` for UTC.
pub fn format_datetime(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

// ─── Dates and Times ─────────────────────────────────────────────────

/// Parse a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns `CoercionError::Malformed` if the string is not a valid date.
pub fn parse_date(s: &str) -> Result<NaiveDate, CoercionError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| CoercionError::malformed("date", format!("{s:?}: {e}")))
}

/// Build a date from Unix time (seconds or milliseconds), in UTC.
///
/// # Errors
///
/// Returns an error for non-finite input or unrepresentable timestamps.
pub fn date_from_unix(ts: f64) -> Result<NaiveDate, CoercionError> {
    utc_from_unix(ts, "date").map(|dt| dt.date_naive())
}

/// Encode a date as `YYYY-MM-DD`.
pub fn format_date(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// Parse an `HH:MM[:SS[.f]]` time of day.
///
/// # Errors
///
/// Returns `CoercionError::Malformed` if no accepted layout matches.
pub fn parse_time(s: &str) -> Result<NaiveTime, CoercionError> {
    let s = s.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| CoercionError::malformed("time", format!("unrecognised time format: {s:?}")))
}

/// Encode a time as `HH:MM:SS`, with a fractional part only when non-zero.
pub fn format_time(t: &NaiveTime) -> String {
    t.format("%H:%M:%S%.f").to_string()
}

// ─── Durations ───────────────────────────────────────────────────────

/// Parse an ISO 8601 duration such as `P3DT12H30M5S`.
///
/// # Errors
///
/// Returns `CoercionError::Malformed` for syntax errors, repeated units,
/// and year/month components; `CoercionError::OutOfRange` if the total
/// does not fit a `TimeDelta`.
pub fn parse_duration(s: &str) -> Result<TimeDelta, CoercionError> {
    let s = s.trim();
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let body = body
        .strip_prefix(['P', 'p'])
        .ok_or_else(|| duration_error(s, "expected leading 'P'"))?;

    let (date_part, time_part) = match body.split_once(|c| c == 'T' || c == 't') {
        Some((date, time)) => (date, Some(time)),
        None => (body, None),
    };
    if date_part.is_empty() && time_part.map_or(true, str::is_empty) {
        return Err(duration_error(s, "no components"));
    }

    let mut total: i128 = 0;
    for (amount, unit) in components(s, date_part)? {
        let unit_secs: i128 = match unit {
            'W' => 7 * 86_400,
            'D' => 86_400,
            'Y' | 'M' => return Err(duration_error(s, "years and months have no fixed length")),
            other => return Err(duration_error(s, &format!("unknown date unit '{other}'"))),
        };
        total += scale(amount, unit_secs);
    }
    if let Some(time_part) = time_part {
        if time_part.is_empty() {
            return Err(duration_error(s, "empty time component after 'T'"));
        }
        for (amount, unit) in components(s, time_part)? {
            let unit_secs: i128 = match unit {
                'H' => 3_600,
                'M' => 60,
                'S' => 1,
                other => return Err(duration_error(s, &format!("unknown time unit '{other}'"))),
            };
            total += scale(amount, unit_secs);
        }
    }

    if negative {
        total = -total;
    }
    nanos_to_delta(total)
}

/// Build a duration from a number of seconds.
///
/// # Errors
///
/// Returns an error for non-finite input or values beyond `TimeDelta` range.
pub fn duration_from_secs(secs: f64) -> Result<TimeDelta, CoercionError> {
    if !secs.is_finite() {
        return Err(CoercionError::malformed("duration", "seconds must be finite"));
    }
    let nanos = (secs * 1e9).round();
    if nanos.abs() >= i64::MAX as f64 {
        return Err(CoercionError::OutOfRange {
            expected: "duration".into(),
            value: secs.to_string(),
        });
    }
    nanos_to_delta(nanos as i128)
}

/// Encode a duration as ISO 8601, e.g. `P3DT12H30M5S` or `PT0S`.
pub fn format_duration(d: &TimeDelta) -> String {
    let negative = *d < TimeDelta::zero();
    let abs = d.abs();
    let total_secs = abs.num_seconds();
    let nanos = abs.subsec_nanos();

    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('P');
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    let has_time = hours > 0 || minutes > 0 || seconds > 0 || nanos > 0;
    if has_time || days == 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if seconds > 0 || nanos > 0 || !has_time {
            out.push_str(&seconds.to_string());
            if nanos > 0 {
                let frac = format!("{nanos:09}");
                out.push('.');
                out.push_str(frac.trim_end_matches('0'));
            }
            out.push('S');
        }
    }
    out
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn utc_from_unix(ts: f64, expected: &str) -> Result<DateTime<Utc>, CoercionError> {
    if !ts.is_finite() {
        return Err(CoercionError::malformed(expected, "timestamp must be finite"));
    }
    let secs = if ts.abs() > UNIX_MILLIS_THRESHOLD {
        ts / 1000.0
    } else {
        ts
    };
    let whole = secs.floor();
    let out_of_range = || CoercionError::OutOfRange {
        expected: expected.to_string(),
        value: ts.to_string(),
    };
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return Err(out_of_range());
    }
    let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole as i64, nanos).ok_or_else(out_of_range)
}

/// Split `12H30M5.5S` into `[(12.0, 'H'), (30.0, 'M'), (5.5, 'S')]`.
fn components(input: &str, part: &str) -> Result<Vec<(f64, char)>, CoercionError> {
    let mut out: Vec<(f64, char)> = Vec::new();
    let mut number = String::new();
    for c in part.chars() {
        if c.is_ascii_digit() || c == '.' || c == ',' {
            number.push(if c == ',' { '.' } else { c });
            continue;
        }
        let unit = c.to_ascii_uppercase();
        if number.is_empty() {
            return Err(duration_error(input, &format!("unit '{c}' has no amount")));
        }
        if out.iter().any(|(_, u)| *u == unit) {
            return Err(duration_error(input, &format!("unit '{unit}' repeated")));
        }
        let amount: f64 = number
            .parse()
            .map_err(|_| duration_error(input, &format!("bad amount {number:?}")))?;
        out.push((amount, unit));
        number.clear();
    }
    if !number.is_empty() {
        return Err(duration_error(input, "trailing amount without unit"));
    }
    Ok(out)
}

fn scale(amount: f64, unit_secs: i128) -> i128 {
    let whole = amount.trunc();
    let frac = amount - whole;
    (whole as i128) * unit_secs * NANOS_PER_SECOND
        + (frac * (unit_secs * NANOS_PER_SECOND) as f64).round() as i128
}

fn nanos_to_delta(total: i128) -> Result<TimeDelta, CoercionError> {
    i64::try_from(total)
        .map(TimeDelta::nanoseconds)
        .map_err(|_| CoercionError::OutOfRange {
            expected: "duration".into(),
            value: format!("{total}ns"),
        })
}

fn duration_error(input: &str, reason: &str) -> CoercionError {
    CoercionError::malformed("duration", format!("{input:?}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let dt = parse_datetime("2032-04-23T10:20:30.400+02:30").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 9_000);
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.nanosecond(), 400_000_000);
    }

    #[test]
    fn test_parse_naive_datetime_is_utc() {
        let dt = parse_datetime("2017-11-08T14:00").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 0);
        assert_eq!((dt.year(), dt.month(), dt.day()), (2017, 11, 8));
        assert_eq!(dt.hour(), 14);
    }

    #[test]
    fn test_parse_naive_datetime_with_micros() {
        let dt = parse_datetime("2014-08-11T05:26:03.869245").unwrap();
        assert_eq!(dt.nanosecond(), 869_245_000);
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        let err = parse_datetime("yesterday").unwrap_err();
        assert_eq!(err.code(), "type_error.datetime");
    }

    #[test]
    fn test_format_datetime_uses_z() {
        let dt = parse_datetime("2020-01-01T00:00:00").unwrap();
        assert_eq!(format_datetime(&dt), "2020-01-01T00:00:00Z");
    }

    #[test]
    fn test_unix_millis_threshold() {
        let d = date_from_unix(1_966_280_412_345.678_9).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2032, 4, 22).unwrap());

        let d = date_from_unix(0.0).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
    }

    #[test]
    fn test_unix_rejects_nan() {
        assert!(datetime_from_unix(f64::NAN).is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2032-04-22").unwrap(),
            NaiveDate::from_ymd_opt(2032, 4, 22).unwrap()
        );
        assert!(parse_date("2032-13-01").is_err());
    }

    #[test]
    fn test_parse_time_layouts() {
        assert_eq!(parse_time("04:08:16").unwrap(), NaiveTime::from_hms_opt(4, 8, 16).unwrap());
        assert_eq!(parse_time("04:08").unwrap(), NaiveTime::from_hms_opt(4, 8, 0).unwrap());
        assert!(parse_time("4 o'clock").is_err());
    }

    #[test]
    fn test_format_time_omits_zero_fraction() {
        let t = NaiveTime::from_hms_opt(4, 8, 16).unwrap();
        assert_eq!(format_time(&t), "04:08:16");
    }

    #[test]
    fn test_parse_duration_days_and_time() {
        let d = parse_duration("P3DT12H30M5S").unwrap();
        assert_eq!(d, TimeDelta::days(3) + TimeDelta::seconds(45_005));
    }

    #[test]
    fn test_parse_duration_weeks_and_fraction() {
        assert_eq!(parse_duration("P1W").unwrap(), TimeDelta::days(7));
        assert_eq!(parse_duration("PT0.5S").unwrap(), TimeDelta::milliseconds(500));
        assert_eq!(parse_duration("-PT1M").unwrap(), TimeDelta::seconds(-60));
    }

    #[test]
    fn test_parse_duration_rejects_months() {
        let err = parse_duration("P1M").unwrap_err();
        assert!(err.to_string().contains("fixed length"));
    }

    #[test]
    fn test_parse_duration_rejects_malformed() {
        assert!(parse_duration("3 days").is_err());
        assert!(parse_duration("P").is_err());
        assert!(parse_duration("PT").is_err());
        assert!(parse_duration("PT5").is_err());
        assert!(parse_duration("PT5S5S").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(&TimeDelta::zero()), "PT0S");
        assert_eq!(format_duration(&TimeDelta::days(3)), "P3D");
        assert_eq!(format_duration(&TimeDelta::seconds(-90)), "-PT1M30S");
        assert_eq!(format_duration(&TimeDelta::milliseconds(1_500)), "PT1.5S");
    }

    #[test]
    fn test_duration_from_secs() {
        assert_eq!(duration_from_secs(1.25).unwrap(), TimeDelta::milliseconds(1_250));
        assert!(duration_from_secs(f64::INFINITY).is_err());
    }
}
