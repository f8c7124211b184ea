//! Parsing of `rclone lsl` output lines.
//!
//! Each object is reported on one line:
//!
//! ```text
//!      1024 2023-04-01 12:30:45.123456789 reports/april.csv
//! ```
//!
//! The size is right-aligned, the modification time carries a fractional
//! second part, and the object name is everything after the timestamp,
//! spaces included.

use chrono::{DateTime, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref LSL_LINE: Regex =
        Regex::new(r"^\s*(\d+)\s+(\d{4}-\d{2}-\d{2})\s+(\d{2}:\d{2}:\d{2})\.\d+\s+(.+)")
            .expect("listing line pattern is valid");
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One object reported by the listing tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub name: String,
    pub size_bytes: u64,
    /// Modification time, truncated to whole seconds.
    pub modified_at: DateTime<Utc>,
}

impl FileRecord {
    /// Modification time as seconds since the Unix epoch.
    pub fn modified_unix(&self) -> i64 {
        self.modified_at.timestamp()
    }
}

/// A line that does not describe an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
    pub line: String,
}

impl fmt::Display for MalformedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed listing line: {:?}", self.line)
    }
}

impl std::error::Error for MalformedLine {}

/// Parses a single line of listing output.
///
/// Lines that do not have the expected shape, carry an impossible date, or
/// report a size that does not fit in 64 bits are rejected.
pub fn parse_line(line: &str) -> Result<FileRecord, MalformedLine> {
    let malformed = || MalformedLine {
        line: line.to_string(),
    };

    let caps = LSL_LINE.captures(line).ok_or_else(malformed)?;

    let size_bytes = caps[1].parse::<u64>().map_err(|_| malformed())?;
    let stamp = format!("{} {}", &caps[2], &caps[3]);
    let naive = NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT).map_err(|_| malformed())?;

    Ok(FileRecord {
        name: caps[4].to_string(),
        size_bytes,
        modified_at: naive.and_utc(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_padded_line() {
        let record = parse_line("     1024 2023-04-01 12:30:45.123456 reports/april.csv").unwrap();

        assert_eq!(record.name, "reports/april.csv");
        assert_eq!(record.size_bytes, 1024);
        assert_eq!(
            record.modified_at,
            Utc.with_ymd_and_hms(2023, 4, 1, 12, 30, 45).unwrap()
        );
        assert_eq!(record.modified_unix(), 1680352245);
    }

    #[test]
    fn test_name_keeps_spaces() {
        let record = parse_line("7 2024-01-31 00:00:00.000000001 quarterly report  final.pdf").unwrap();
        assert_eq!(record.name, "quarterly report  final.pdf");
        assert_eq!(record.size_bytes, 7);
    }

    #[test]
    fn test_fraction_is_discarded() {
        let a = parse_line("1 2023-04-01 12:30:45.000000001 a").unwrap();
        let b = parse_line("1 2023-04-01 12:30:45.999999999 a").unwrap();
        assert_eq!(a.modified_at, b.modified_at);
        assert_eq!(a.modified_at.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_empty_line_is_malformed() {
        assert_eq!(
            parse_line(""),
            Err(MalformedLine {
                line: String::new()
            })
        );
    }

    #[test]
    fn test_missing_fraction_is_malformed() {
        assert!(parse_line("1024 2023-04-01 12:30:45 reports/april.csv").is_err());
    }

    #[test]
    fn test_missing_name_is_malformed() {
        assert!(parse_line("1024 2023-04-01 12:30:45.123").is_err());
        assert!(parse_line("1024 2023-04-01 12:30:45.123 ").is_err());
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = parse_line("2023/04/01 ERROR : something went wrong").unwrap_err();
        assert!(err.to_string().contains("something went wrong"));
    }

    #[test]
    fn test_impossible_date_is_malformed() {
        assert!(parse_line("1 2023-13-45 12:30:45.1 a.txt").is_err());
        assert!(parse_line("1 2023-02-01 25:00:00.1 a.txt").is_err());
    }

    #[test]
    fn test_oversized_size_is_malformed() {
        assert!(parse_line("99999999999999999999999 2023-04-01 12:30:45.1 a.txt").is_err());
    }
}
