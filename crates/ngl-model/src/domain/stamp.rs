//! The `-YYYYMMDDhhmm` suffix carried by nightly image tags.
//!
//! The suffix is both written (version resolution) and read back (image rotation), so both directions live here.

use time::{PrimitiveDateTime, format_description::BorrowedFormatItem, macros::format_description};

/// Number of digits in a nightly stamp, without the leading `-`.
pub const NIGHTLY_STAMP_LEN: usize = 12;

const STAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day][hour][minute]");

/// Format a wall-clock instant as a nightly suffix, including the leading `-`.
pub fn nightly_stamp(at: PrimitiveDateTime) -> String {
    let digits = at.format(STAMP_FORMAT).unwrap_or_default();
    format!("-{digits}")
}

/// Extract the build time embedded in a tag.
///
/// The last `-` followed by twelve digits wins, wherever it sits in the tag.
/// Returns `None` when there is no such suffix or when the digits are not a valid calendar timestamp.
pub fn parse_nightly_stamp(tag: &str) -> Option<PrimitiveDateTime> {
    let bytes = tag.as_bytes();
    let start = (0..bytes.len()).rev().find(|&i| {
        bytes[i] == b'-'
            && bytes.len() > i + NIGHTLY_STAMP_LEN
            && bytes[i + 1..=i + NIGHTLY_STAMP_LEN]
                .iter()
                .all(u8::is_ascii_digit)
    })?;
    let digits = &tag[start + 1..=start + NIGHTLY_STAMP_LEN];
    PrimitiveDateTime::parse(digits, STAMP_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use time::{Date, Month, Time};

    use super::*;

    fn at(y: i32, m: Month, d: u8, h: u8, min: u8) -> PrimitiveDateTime {
        PrimitiveDateTime::new(
            Date::from_calendar_date(y, m, d).unwrap(),
            Time::from_hms(h, min, 0).unwrap(),
        )
    }

    #[test]
    fn stamp_is_zero_padded() {
        assert_eq!(nightly_stamp(at(2024, Month::January, 1, 12, 0)), "-202401011200");
        assert_eq!(nightly_stamp(at(2023, Month::March, 9, 7, 5)), "-202303090705");
    }

    #[test]
    fn parses_trailing_stamp() {
        let got = parse_nightly_stamp("0.0.1-202401011200").unwrap();
        assert_eq!(got, at(2024, Month::January, 1, 12, 0));
    }

    #[test]
    fn last_stamp_wins_even_when_not_trailing() {
        let got = parse_nightly_stamp("1.0-202001010000-202402031415-rc").unwrap();
        assert_eq!(got, at(2024, Month::February, 3, 14, 15));
    }

    #[test]
    fn rejects_missing_or_invalid_stamps() {
        assert!(parse_nightly_stamp("1.2.3").is_none());
        assert!(parse_nightly_stamp("latest").is_none());
        assert!(parse_nightly_stamp("1.0-20240101").is_none());
        assert!(parse_nightly_stamp("1.0-202413011200").is_none());
        assert!(parse_nightly_stamp("1.0-202401011261").is_none());
    }
}
