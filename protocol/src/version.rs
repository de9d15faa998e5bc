use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// `major.minor[.patch]` version. A missing patch compares as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionInfo {
    pub major: u32,
    pub minor: u32,
    pub patch: Option<u32>,
}

impl VersionInfo {
    pub fn new(major: u32, minor: u32, patch: Option<u32>) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses the leading `major.minor` and an optional `.patch`.
    /// Anything after the last number is ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let (major, rest) = leading_number(text.trim_start())?;
        let rest = rest.strip_prefix('.')?;
        let (minor, rest) = leading_number(rest)?;
        let patch = rest
            .strip_prefix('.')
            .and_then(leading_number)
            .map(|(patch, _)| patch);
        Some(Self::new(major, minor, patch))
    }

    fn sort_key(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch.unwrap_or(0))
    }
}

fn leading_number(text: &str) -> Option<(u32, &str)> {
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let value = text[..end].parse().ok()?;
    Some((value, &text[end..]))
}

impl PartialEq for VersionInfo {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for VersionInfo {}

impl PartialOrd for VersionInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl FromStr for VersionInfo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid version string \"{s}\""))
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.patch {
            Some(patch) => write!(f, "{}.{}.{}", self.major, self.minor, patch),
            None => write!(f, "{}.{}", self.major, self.minor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(
            VersionInfo::parse("0.19.4"),
            Some(VersionInfo::new(0, 19, Some(4)))
        );
        let short = VersionInfo::parse("1.0").unwrap();
        assert_eq!(short.patch, None);
        assert_eq!(short.to_string(), "1.0");

        let suffixed = VersionInfo::parse("0.21.1-dirty").unwrap();
        assert_eq!(suffixed.patch, Some(1));
        assert_eq!(suffixed.to_string(), "0.21.1");
    }

    #[test]
    fn test_parse_failures() {
        assert!(VersionInfo::parse("").is_none());
        assert!(VersionInfo::parse("7").is_none());
        assert!(VersionInfo::parse("a.b").is_none());
        assert!(VersionInfo::parse("1.").is_none());
        assert!("x".parse::<VersionInfo>().is_err());
    }

    #[test]
    fn test_missing_patch_equals_zero() {
        assert_eq!(
            VersionInfo::new(0, 19, None),
            VersionInfo::new(0, 19, Some(0))
        );
    }

    #[test]
    fn test_ordering() {
        let v = |s: &str| VersionInfo::parse(s).unwrap();
        assert!(v("0.19.2") < v("0.19.4"));
        assert!(v("0.20") > v("0.19.99"));
        assert!(v("1.0") > v("0.19.4"));
        assert!(v("0.19") < v("0.19.1"));
        assert!(v("2.1.3") >= v("2.1.3"));
    }
}
