//! CLI to Config conversion utilities
//!
//! Human-friendly size and duration strings as accepted on the command line.

use anyhow::{Context, Result};

const SIZE_SUFFIXES: &[(&str, u64)] = &[
    ("kb", 1 << 10),
    ("k", 1 << 10),
    ("mb", 1 << 20),
    ("m", 1 << 20),
    ("gb", 1 << 30),
    ("g", 1 << 30),
    ("b", 1),
];

const DURATION_SUFFIXES: &[(&str, u64)] = &[
    ("sec", 1),
    ("s", 1),
    ("min", 60),
    ("m", 60),
    ("hr", 3600),
    ("h", 3600),
];

/// Split `s` into its number and the multiplier of the first matching suffix
fn split_unit<'a>(s: &'a str, suffixes: &[(&str, u64)]) -> (&'a str, u64) {
    suffixes
        .iter()
        .find_map(|(suffix, multiplier)| s.strip_suffix(suffix).map(|num| (num, *multiplier)))
        .unwrap_or((s, 1))
}

/// Parse a size string (e.g., "64k", "256M", "1G") to bytes
pub fn parse_size(s: &str) -> Result<usize> {
    let lower = s.trim().to_lowercase();
    let (num, multiplier) = split_unit(&lower, SIZE_SUFFIXES);

    let num: u64 = num
        .trim()
        .parse()
        .with_context(|| format!("Invalid size format: {}", s))?;
    let bytes = num
        .checked_mul(multiplier)
        .with_context(|| format!("Size too large: {}", s))?;

    usize::try_from(bytes).with_context(|| format!("Size too large: {}", s))
}

/// Parse a duration string (e.g., "30s", "5m", "1h") to seconds
pub fn parse_duration_secs(s: &str) -> Result<u64> {
    let lower = s.trim().to_lowercase();
    let (num, multiplier) = split_unit(&lower, DURATION_SUFFIXES);

    let num: u64 = num
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration format: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Duration too large: {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("64k").unwrap(), 65536);
        assert_eq!(parse_size("64KB").unwrap(), 65536);
        assert_eq!(parse_size("256M").unwrap(), 256 << 20);
        assert_eq!(parse_size("1g").unwrap(), 1 << 30);
        assert_eq!(parse_size("100b").unwrap(), 100);
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("lots").is_err());
        assert!(parse_size("-4k").is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration_secs("0").unwrap(), 0);
        assert_eq!(parse_duration_secs("60").unwrap(), 60);
        assert_eq!(parse_duration_secs("30s").unwrap(), 30);
        assert_eq!(parse_duration_secs("30sec").unwrap(), 30);
        assert_eq!(parse_duration_secs("5m").unwrap(), 300);
        assert_eq!(parse_duration_secs("5min").unwrap(), 300);
        assert_eq!(parse_duration_secs("2h").unwrap(), 7200);
        assert_eq!(parse_duration_secs("2hr").unwrap(), 7200);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration_secs("soon").is_err());
        assert!(parse_duration_secs("1.5s").is_err());
    }
}
