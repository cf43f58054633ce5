/*
Copyright 2022 Jakub Lewandowski

This file is part of NWP Extract.

NWP Extract is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

NWP Extract is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with NWP Extract. If not, see https://www.gnu.org/licenses/.
*/

//! Module resolving requested timestamps
//! on the time axis of a dataset.
//!
//! Only exact matches are accepted, there is no
//! interpolation nor nearest-time fallback.

use crate::{errors::LookupError, Float};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Basic and extended ISO 8601 forms accepted besides RFC 3339.
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H%M%SZ",
    "%Y%m%dT%H%M%SZ",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Parses the requested timestamp, values without
/// time zone are taken as UTC.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, LookupError> {
    let text = text.trim();

    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Ok(datetime.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(Utc.from_utc_datetime(&datetime));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(datetime) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&datetime));
        }
    }

    Err(LookupError::InvalidTimestamp(text.to_string()))
}

/// Converts seconds since Unix epoch to UTC timestamp
/// with nanosecond precision.
pub fn epoch_seconds_to_datetime(seconds: Float) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }

    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round();

    let (whole, nanos) = if nanos >= 1e9 {
        (whole + 1.0, 0.0)
    } else {
        (whole, nanos)
    };

    Utc.timestamp_opt(whole as i64, nanos as u32).single()
}

/// Returns the index of the first entry of `axis` (in seconds since epoch)
/// equal to the requested timestamp, together with that timestamp.
pub fn find_time_index(
    axis: &[Float],
    requested: &str,
) -> Result<(usize, DateTime<Utc>), LookupError> {
    let requested = parse_timestamp(requested)?;

    axis.iter()
        .position(|&t| epoch_seconds_to_datetime(t) == Some(requested))
        .map(|index| (index, requested))
        .ok_or_else(|| LookupError::TimestampNotFound(requested.to_rfc3339()))
}

#[cfg(test)]
mod tests {
    use super::{epoch_seconds_to_datetime, find_time_index, parse_timestamp};
    use crate::errors::LookupError;
    use chrono::{TimeZone, Utc};

    fn hourly_axis() -> Vec<f64> {
        // 2019-01-01T00:00:00Z
        let start = 1_546_300_800.0;
        (0..24).map(|h| start + 3600.0 * h as f64).collect()
    }

    #[test]
    fn finds_exact_hour() {
        let axis = hourly_axis();

        let (index, ts) = find_time_index(&axis, "2019-01-01T03:00:00Z").unwrap();
        assert_eq!(index, 3);
        assert_eq!(ts, Utc.with_ymd_and_hms(2019, 1, 1, 3, 0, 0).unwrap());

        let (index, _) = find_time_index(&axis, "2019-01-01T000000Z").unwrap();
        assert_eq!(index, 0);

        let (index, _) = find_time_index(&axis, "2019-01-01T05:00:00+02:00").unwrap();
        assert_eq!(index, 3);
    }

    #[test]
    fn rejects_inexact_time() {
        let axis = hourly_axis();

        assert!(matches!(
            find_time_index(&axis, "2019-01-01T03:30:00Z"),
            Err(LookupError::TimestampNotFound(_))
        ));
        assert!(matches!(
            find_time_index(&axis, "2019-01-02T00:00:00Z"),
            Err(LookupError::TimestampNotFound(_))
        ));
        assert!(matches!(
            find_time_index(&axis, "yesterday"),
            Err(LookupError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn first_duplicate_wins() {
        let axis = vec![0.0, 3600.0, 3600.0, 7200.0];

        let (index, _) = find_time_index(&axis, "1970-01-01T01:00:00Z").unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn parses_accepted_formats() {
        let expected = Utc.with_ymd_and_hms(2019, 9, 6, 13, 45, 0).unwrap();

        assert_eq!(parse_timestamp("2019-09-06T134500Z").unwrap(), expected);
        assert_eq!(parse_timestamp("20190906T134500Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2019-09-06T13:45:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2019-09-06T13:45:00").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2019-09-06").unwrap(),
            Utc.with_ymd_and_hms(2019, 9, 6, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn converts_fractional_seconds() {
        let ts = epoch_seconds_to_datetime(1.5).unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 500);
        assert!(epoch_seconds_to_datetime(f64::NAN).is_none());
    }
}
