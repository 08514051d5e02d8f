use std::time::Duration;

use chrono::{NaiveDate, Utc};

/// Current wall clock in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parses a `yyyy-MM-dd` date into milliseconds since the epoch at UTC
/// midnight. Surrounding whitespace is ignored.
pub fn parse_date_millis(input: &str) -> Option<i64> {
    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

/// Parses a compound duration such as `1d12h` or `90m`.
///
/// Units are `s`, `m`, `h` and `d`; every number needs a unit. An empty string
/// is a zero duration. Returns `None` on malformed input or overflow.
///
/// ```
/// use std::time::Duration;
/// use fdsync_utils::time::parse_duration;
///
/// assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5400)));
/// assert_eq!(parse_duration("5"), None);
/// ```
pub fn parse_duration(input: &str) -> Option<Duration> {
    let mut secs: u64 = 0;
    let mut rest = input.trim();

    while !rest.is_empty() {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return None;
        }
        let value: u64 = rest[..digits].parse().ok()?;
        let unit = match rest[digits..].chars().next()? {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            _ => return None,
        };
        secs = secs.checked_add(value.checked_mul(unit)?)?;
        rest = &rest[digits + 1..];
    }

    Some(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("45s"), Some(Duration::from_secs(45)));
        assert_eq!(parse_duration("3h"), Some(Duration::from_secs(3 * 3600)));
        assert_eq!(
            parse_duration("1d1h1m1s"),
            Some(Duration::from_secs(86400 + 3600 + 60 + 1))
        );
        assert_eq!(parse_duration(""), Some(Duration::ZERO));
        assert_eq!(parse_duration("1h5"), None);
        assert_eq!(parse_duration("h"), None);
        assert_eq!(parse_duration("2w"), None);
        assert_eq!(parse_duration("99999999999999999999d"), None);
    }

    #[test]
    fn test_parse_date_millis() {
        assert_eq!(parse_date_millis("1970-01-02"), Some(86_400_000));
        assert_eq!(parse_date_millis(" 2020-01-01 "), Some(1_577_836_800_000));
        assert_eq!(parse_date_millis("2020-13-01"), None);
        assert_eq!(parse_date_millis("yesterday"), None);
    }

    #[test]
    fn test_now_millis_is_recent() {
        // 2020-01-01
        assert!(now_millis() > 1_577_836_800_000);
    }
}
