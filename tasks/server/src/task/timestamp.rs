use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Parses an ISO-8601 timestamp into UTC.
///
/// Accepts RFC 3339 strings (`2024-01-01T00:00:00Z`, `2024-01-01T02:00:00+02:00`),
/// date-times without an offset (read as UTC) and bare dates (midnight UTC).
pub fn parse(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Formats a UTC instant as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn format(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Returns the current time, formatted with [`format`].
pub fn now() -> String {
    format(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn can_parse_rfc3339_timestamps() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse("2024-01-01T00:00:00Z"), Some(expected));
        assert_eq!(parse("2024-01-01T02:00:00+02:00"), Some(expected));
        assert_eq!(parse("2024-01-01T00:00:00.000Z"), Some(expected));
    }

    #[test]
    fn can_parse_timestamps_without_offset_as_utc() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap();
        assert_eq!(parse("2024-03-15T10:30:00"), Some(expected));
        assert_eq!(
            parse("2024-03-15"),
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn cannot_parse_garbage() {
        assert_eq!(parse("not a date"), None);
        assert_eq!(parse("2024-13-45"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn formats_with_millisecond_precision_and_zulu_suffix() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 5).unwrap();
        assert_eq!(format(at), "2024-01-01T12:00:05.000Z");
    }

    #[test]
    fn now_round_trips_through_parse() {
        let generated = now();
        let parsed = parse(&generated).expect("generated timestamp should parse");
        assert!((Utc::now() - parsed).num_seconds().abs() < 5);
    }
}
