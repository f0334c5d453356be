// ── Human duration codec ──
//
// Parses what people type into timeout fields ("5m", "2h 30m", "1 day")
// and renders second counts the way timers display them ("1d 2h 0m 5s").

use crate::error::CoreError;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Recognized units, longest spelling first so the first hit is the
/// longest match.
const UNITS: &[(&str, u64)] = &[
    ("seconds", 1),
    ("minutes", MINUTE),
    ("second", 1),
    ("minute", MINUTE),
    ("months", 30 * DAY),
    ("month", 30 * DAY),
    ("hours", HOUR),
    ("weeks", 7 * DAY),
    ("years", 365 * DAY),
    ("secs", 1),
    ("mins", MINUTE),
    ("hour", HOUR),
    ("days", DAY),
    ("week", 7 * DAY),
    ("year", 365 * DAY),
    ("sec", 1),
    ("min", MINUTE),
    ("day", DAY),
    ("mi", MINUTE),
    ("mo", 30 * DAY),
    ("s", 1),
    ("\"", 1),
    ("m", MINUTE),
    ("'", MINUTE),
    ("h", HOUR),
    ("d", DAY),
    ("w", 7 * DAY),
    ("y", 365 * DAY),
];

/// Parse a duration such as `"1h 30m"` into seconds.
///
/// Every `<integer>[ ]<unit>` token is summed; text that does not form a
/// token is skipped. A unit only counts when it is not immediately followed
/// by a letter or a quote, so `"5mo"` is five months and `"5mx"` is nothing.
pub fn parse_duration(text: &str) -> Result<u64, CoreError> {
    let invalid = || CoreError::InvalidDuration {
        input: text.to_owned(),
    };

    let bytes = text.as_bytes();
    let mut total: u64 = 0;
    let mut matched = false;
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        let digits_start = i;
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        let digits = &text[digits_start..i];

        let unit_start = if bytes.get(i) == Some(&b' ') { i + 1 } else { i };
        let Some((unit_len, multiplier)) = match_unit(&text[unit_start..]) else {
            continue;
        };

        let amount: u64 = digits.parse().map_err(|_| invalid())?;
        total = amount
            .checked_mul(multiplier)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(invalid)?;
        matched = true;
        i = unit_start + unit_len;
    }

    if matched { Ok(total) } else { Err(invalid()) }
}

/// Parse the contents of a timeout field.
///
/// Blank input means "no timeout" and yields `Ok(None)`; anything else must
/// be a valid duration.
pub fn parse_timeout(text: &str) -> Result<Option<u64>, CoreError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    parse_duration(text).map(Some)
}

fn match_unit(rest: &str) -> Option<(usize, u64)> {
    UNITS.iter().find_map(|&(unit, multiplier)| {
        let tail = rest.strip_prefix(unit)?;
        let blocked = tail
            .bytes()
            .next()
            .is_some_and(|b| b.is_ascii_alphabetic() || b == b'\'' || b == b'"');
        (!blocked).then_some((unit.len(), multiplier))
    })
}

/// Render a signed second count as `"<n>d <n>h <n>m <n>s"`.
///
/// The input is rounded to the nearest second (halves round up). Zero units
/// before the first and after the last non-zero unit are dropped, so
/// `5400` renders as `"1h 30m"` while `3605` keeps its inner zero as
/// `"1h 0m 5s"`. Zero renders as `"0s"`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
pub fn format_duration(seconds: f64) -> String {
    let rounded = (seconds + 0.5).floor();
    let sign = if rounded < 0.0 { "-" } else { "" };
    // Saturating float-to-int cast; NaN becomes 0.
    let total = rounded.abs() as u64;

    let parts = [
        (total / DAY, 'd'),
        (total % DAY / HOUR, 'h'),
        (total % HOUR / MINUTE, 'm'),
        (total % MINUTE, 's'),
    ];
    let first = parts.iter().position(|&(n, _)| n != 0).unwrap_or(3);
    let last = parts.iter().rposition(|&(n, _)| n != 0).unwrap_or(3);

    let body = parts[first..=last]
        .iter()
        .map(|(n, unit)| format!("{n}{unit}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{sign}{body}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_combined_tokens() {
        assert_eq!(parse_duration("1h 30m").unwrap(), 5400);
        assert_eq!(parse_duration("1h30m").unwrap(), 5400);
        assert_eq!(parse_duration("2h 30m").unwrap(), 9000);
        assert_eq!(parse_duration("5m").unwrap(), 300);
    }

    #[test]
    fn every_unit_spelling() {
        let cases: &[(&str, u64)] = &[
            ("3\"", 3),
            ("3s", 3),
            ("3sec", 3),
            ("3secs", 3),
            ("3second", 3),
            ("3seconds", 3),
            ("3'", 180),
            ("3m", 180),
            ("3mi", 180),
            ("3min", 180),
            ("3mins", 180),
            ("3minute", 180),
            ("3minutes", 180),
            ("3h", 10_800),
            ("3hour", 10_800),
            ("3hours", 10_800),
            ("1d", 86_400),
            ("1day", 86_400),
            ("2days", 172_800),
            ("1w", 604_800),
            ("1week", 604_800),
            ("2weeks", 1_209_600),
            ("1mo", 2_592_000),
            ("1month", 2_592_000),
            ("2months", 5_184_000),
            ("1y", 31_536_000),
            ("1year", 31_536_000),
            ("2years", 63_072_000),
        ];
        for &(text, secs) in cases {
            assert_eq!(parse_duration(text).unwrap(), secs, "{text}");
        }
    }

    #[test]
    fn single_space_between_number_and_unit() {
        assert_eq!(parse_duration("1 day").unwrap(), 86_400);
        assert_eq!(parse_duration("10 min 5 s").unwrap(), 605);
    }

    #[test]
    fn unit_followed_by_letter_is_ignored() {
        assert!(parse_duration("5mx").is_err());
        assert_eq!(parse_duration("5mx 2m").unwrap(), 120);
        assert_eq!(parse_duration("5mo").unwrap(), 5 * 2_592_000);
    }

    #[test]
    fn units_are_case_sensitive() {
        assert!(parse_duration("5M").is_err());
        assert!(parse_duration("1H").is_err());
    }

    #[test]
    fn empty_and_garbage_fail() {
        for bad in ["", "banana", "   ", "42", "h5"] {
            assert!(
                matches!(parse_duration(bad), Err(CoreError::InvalidDuration { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn overflow_fails() {
        assert!(parse_duration("99999999999999999999s").is_err());
        assert!(parse_duration("999999999999999y").is_err());
    }

    #[test]
    fn timeout_field_blank_means_none() {
        assert_eq!(parse_timeout("").unwrap(), None);
        assert_eq!(parse_timeout("  ").unwrap(), None);
        assert_eq!(parse_timeout("90s").unwrap(), Some(90));
        assert!(parse_timeout("soon").is_err());
    }

    #[test]
    fn formats_zero() {
        assert_eq!(format_duration(0.0), "0s");
        assert_eq!(format_duration(0.4), "0s");
        assert_eq!(format_duration(-0.3), "0s");
    }

    #[test]
    fn formats_negative() {
        assert_eq!(format_duration(-65.0), "-1m 5s");
        assert_eq!(format_duration(-3600.0), "-1h");
    }

    #[test]
    fn formats_with_inner_zeros() {
        assert_eq!(format_duration(5400.0), "1h 30m");
        assert_eq!(format_duration(3605.0), "1h 0m 5s");
        assert_eq!(format_duration(86_462.3), "1d 0h 1m 2s");
        assert_eq!(format_duration(59.0), "59s");
    }

    #[test]
    fn days_are_unbounded() {
        assert_eq!(format_duration(400.0 * 86_400.0), "400d");
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(format_duration(1.5), "2s");
        assert_eq!(format_duration(-65.5), "-1m 5s");
    }

    #[test]
    fn format_then_parse_keeps_the_value() {
        for text in ["1h 30m", "2d 5s", "3w", "45'", "1y 1mo"] {
            let secs = parse_duration(text).unwrap();
            #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
            let rendered = format_duration(secs as f64);
            assert_eq!(parse_duration(&rendered).unwrap(), secs, "{text} -> {rendered}");
        }
    }
}
