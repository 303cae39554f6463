//! Timestamp parsing and formatting.
//!
//! Transcript oracles report timestamps as `M:SS` or `H:MM:SS`; the pipeline
//! works in milliseconds internally. Parsing is strict but callers that get
//! timestamps from untrusted oracle output should treat a parse failure as
//! "no timestamp" rather than an error.

use thiserror::Error;

/// Timestamp parsing error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("timestamp cannot be empty")]
    Empty,
    #[error("invalid {0} value: {1}")]
    InvalidValue(&'static str, String),
    #[error("invalid timestamp format: {0}")]
    InvalidFormat(String),
}

/// Parse a `SS`, `M:SS`, or `H:MM:SS` timestamp into milliseconds.
///
/// # Examples
/// ```
/// use gearlens_models::timestamp::parse_timestamp_ms;
/// assert_eq!(parse_timestamp_ms("2:34").unwrap(), 154_000);
/// assert_eq!(parse_timestamp_ms("1:02:03").unwrap(), 3_723_000);
/// ```
pub fn parse_timestamp_ms(ts: &str) -> Result<u64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    let parse = |component: &'static str, value: &str| -> Result<u64, TimestampError> {
        value
            .parse::<u64>()
            .map_err(|_| TimestampError::InvalidValue(component, value.to_string()))
    };

    let total_secs = match parts.as_slice() {
        [secs] => parse("seconds", secs)?,
        [mins, secs] => parse("minutes", mins)? * 60 + parse("seconds", secs)?,
        [hours, mins, secs] => {
            parse("hours", hours)? * 3600 + parse("minutes", mins)? * 60 + parse("seconds", secs)?
        }
        _ => return Err(TimestampError::InvalidFormat(ts.to_string())),
    };

    Ok(total_secs * 1000)
}

/// Format milliseconds as `M:SS`, or `H:MM:SS` for durations of an hour or more.
pub fn format_ms(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minute_second() {
        assert_eq!(parse_timestamp_ms("0:00").unwrap(), 0);
        assert_eq!(parse_timestamp_ms("2:34").unwrap(), 154_000);
        assert_eq!(parse_timestamp_ms("59:59").unwrap(), 3_599_000);
    }

    #[test]
    fn parses_hour_minute_second() {
        assert_eq!(parse_timestamp_ms("1:00:00").unwrap(), 3_600_000);
        assert_eq!(parse_timestamp_ms("1:30:45").unwrap(), 5_445_000);
    }

    #[test]
    fn parses_bare_seconds() {
        assert_eq!(parse_timestamp_ms("90").unwrap(), 90_000);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse_timestamp_ms(""), Err(TimestampError::Empty));
        assert_eq!(parse_timestamp_ms("   "), Err(TimestampError::Empty));
        assert!(matches!(
            parse_timestamp_ms("abc"),
            Err(TimestampError::InvalidValue(_, _))
        ));
        assert!(matches!(
            parse_timestamp_ms("1:2:3:4"),
            Err(TimestampError::InvalidFormat(_))
        ));
    }

    #[test]
    fn formats_round_trip() {
        assert_eq!(format_ms(0), "0:00");
        assert_eq!(format_ms(154_000), "2:34");
        assert_eq!(format_ms(3_723_000), "1:02:03");
        assert_eq!(parse_timestamp_ms(&format_ms(5_445_000)).unwrap(), 5_445_000);
    }
}
