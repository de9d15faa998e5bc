//! The game's `\key\value\key\value` text format.
//!
//! There is no escaping: a backslash always starts a new field.

use std::collections::HashMap;
use std::fmt;

pub const DELIMITER: char = '\\';

/// Unordered key/value mapping. Duplicate keys overwrite earlier values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Infostring {
    entries: HashMap<String, String>,
}

impl Infostring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the text, keeping every complete key/value pair.
    ///
    /// A trailing key without a following delimiter is dropped. The final
    /// value does not need a closing delimiter.
    pub fn parse(text: &str) -> Self {
        let mut result = Self::new();
        let body = text.strip_prefix(DELIMITER).unwrap_or(text);
        let mut segments = body.split(DELIMITER);

        while let Some(key) = segments.next() {
            match segments.next() {
                Some(value) => result.insert(key, value),
                None => break,
            }
        }
        result
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// `None` means the key is absent; an empty string is a present value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Infostring {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut result = Self::new();
        for (key, value) in iter {
            result.insert(key, value);
        }
        result
    }
}

/// Serializes as `\key\value` per entry, in map iteration order.
impl fmt::Display for Infostring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            write!(f, "{DELIMITER}{key}{DELIMITER}{value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_leading_delimiter() {
        let info = Infostring::parse("\\gamedir\\valve\\nat\\0");
        assert_eq!(info.len(), 2);
        assert_eq!(info.get("gamedir"), Some("valve"));
        assert_eq!(info.get("nat"), Some("0"));
    }

    #[test]
    fn test_parse_without_leading_delimiter() {
        let info = Infostring::parse("map\\crossfire\\max\\32");
        assert_eq!(info.get("map"), Some("crossfire"));
        assert_eq!(info.get("max"), Some("32"));
    }

    #[test]
    fn test_absent_differs_from_empty() {
        let info = Infostring::parse("\\password\\\\lan\\0");
        assert_eq!(info.get("password"), Some(""));
        assert_eq!(info.get("lan"), Some("0"));
        assert_eq!(info.get("secure"), None);
        assert!(!info.contains("secure"));
    }

    #[test]
    fn test_dangling_key_is_dropped() {
        let info = Infostring::parse("\\a\\1\\dangling");
        assert_eq!(info.len(), 1);
        assert_eq!(info.get("dangling"), None);

        let info = Infostring::parse("\\a\\1\\");
        assert_eq!(info.len(), 1);
    }

    #[test]
    fn test_trailing_empty_value_is_kept() {
        let info = Infostring::parse("\\k\\");
        assert_eq!(info.get("k"), Some(""));
    }

    #[test]
    fn test_duplicate_keys_overwrite() {
        let info = Infostring::parse("\\k\\first\\k\\second");
        assert_eq!(info.len(), 1);
        assert_eq!(info.get("k"), Some("second"));
    }

    #[test]
    fn test_empty_input() {
        assert!(Infostring::parse("").is_empty());
        assert!(Infostring::parse("\\").is_empty());
    }

    #[test]
    fn test_serialize_then_parse_preserves_pairs() {
        let original: Infostring = [
            ("gamedir", "valve"),
            ("map", "de_dust"),
            ("players", "3"),
            ("password", ""),
        ]
        .into_iter()
        .collect();

        let text = original.to_string();
        assert!(text.starts_with('\\'));
        assert_eq!(Infostring::parse(&text), original);
    }
}
