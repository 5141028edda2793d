use std::cmp::Ordering;
use std::fmt;

/// A two-segment numeric tag such as `1.19` or `03.33`.
///
/// Only tags made of exactly `digits.digits` are representable. Anything else a
/// registry returns (`latest`, `1.2.3`, `v1.2`, `1.2-alpine`, build hashes) is
/// not a version tag and is dropped during filtering rather than rejected.
#[derive(Debug, Clone)]
pub struct VersionTag {
    pub major: u64,
    pub minor: u64,
    raw: String,
}

impl VersionTag {
    /// Parse a raw registry tag, returning `None` if it is not `digits.digits`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (major, minor) = raw.split_once('.')?;

        if !is_digits(major) || !is_digits(minor) {
            return None;
        }

        Some(Self {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
            raw: raw.to_string(),
        })
    }

    /// The tag exactly as the registry reported it, leading zeros included.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

fn is_digits(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

// Equality and ordering look at the numeric components only, so "02.5" and
// "2.5" are the same version.
impl PartialEq for VersionTag {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionTag {}

impl PartialOrd for VersionTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionTag {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor).cmp(&(other.major, other.minor))
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(raw: &str) -> VersionTag {
        VersionTag::parse(raw).unwrap()
    }

    #[test]
    fn test_parse_valid_tags() {
        let v = tag("1.19");
        assert_eq!(v.major, 1);
        assert_eq!(v.minor, 19);
        assert_eq!(v.raw(), "1.19");

        // Leading zeros are plain digit sequences
        let v = tag("03.33");
        assert_eq!(v.major, 3);
        assert_eq!(v.minor, 33);
        assert_eq!(v.raw(), "03.33");
    }

    #[test]
    fn test_parse_rejects_non_version_tags() {
        for raw in [
            "latest", "1.2.3", "v1.2", "1.2-alpine", "1", "1.", ".1", "", " 1.2", "1.2 ", "1.a",
            "+1.2", "sha256:abc",
        ] {
            assert!(VersionTag::parse(raw).is_none(), "{raw} should not parse");
        }
    }

    #[test]
    fn test_parse_rejects_overflowing_segments() {
        assert!(VersionTag::parse("99999999999999999999999.1").is_none());
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(tag("2.0") > tag("1.9"));
        assert!(tag("1.2") < tag("1.10"));
        assert_eq!(tag("1.19").cmp(&tag("1.19")), Ordering::Equal);
        assert_eq!(tag("02.5"), tag("2.5"));
    }

    #[test]
    fn test_display_uses_raw_tag() {
        assert_eq!(tag("02.5").to_string(), "02.5");
    }
}
