//! Locale identifiers used to key target content and writer output.
//!
//! A [`LocaleId`] is a validated language tag (e.g. `"en"`, `"fr-FR"`,
//! `"sr-Latn-RS"`), normalized so that equal locales compare equal and sort
//! deterministically when used as map keys.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use unic_langid::LanguageIdentifier;

use crate::error::Error;

/// A validated, normalized locale identifier.
///
/// Construction goes through [`unic_langid::LanguageIdentifier`], so casing
/// is canonicalized (`"EN-us"` becomes `"en-US"`). The normalized tag is what
/// `Display`, `Ord`, and serde all see.
///
/// # Example
///
/// ```rust
/// use locfilter::LocaleId;
///
/// let locale = LocaleId::new("EN-us")?;
/// assert_eq!(locale.as_str(), "en-US");
/// assert_eq!(locale.language(), "en");
/// # Ok::<(), locfilter::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocaleId(String);

impl LocaleId {
    /// Parses and normalizes a locale tag.
    ///
    /// Fails with [`Error::InvalidLocale`] when the tag is not a well-formed
    /// language identifier.
    pub fn new(tag: &str) -> Result<Self, Error> {
        match tag.parse::<LanguageIdentifier>() {
            Ok(id) => Ok(LocaleId(id.to_string())),
            Err(_) => Err(Error::InvalidLocale(tag.to_string())),
        }
    }

    /// The normalized tag, e.g. `"fr-FR"`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The primary language subtag, e.g. `"fr"` for `"fr-FR"`.
    pub fn language(&self) -> &str {
        match self.0.find('-') {
            Some(index) => &self.0[..index],
            None => &self.0,
        }
    }

    /// Whether two locales share the same primary language subtag,
    /// regardless of region or script (`"en"` vs `"en-GB"`).
    pub fn same_language_as(&self, other: &LocaleId) -> bool {
        self.language() == other.language()
    }
}

impl Display for LocaleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocaleId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LocaleId::new(s)
    }
}

impl TryFrom<&str> for LocaleId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        LocaleId::new(value)
    }
}

impl AsRef<str> for LocaleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_casing() {
        let locale = LocaleId::new("EN-us").unwrap();
        assert_eq!(locale.as_str(), "en-US");
        assert_eq!(locale.to_string(), "en-US");
    }

    #[test]
    fn test_new_rejects_garbage() {
        let result = LocaleId::new("not a locale!");
        assert!(matches!(result, Err(Error::InvalidLocale(_))));
    }

    #[test]
    fn test_language_subtag() {
        assert_eq!(LocaleId::new("fr-FR").unwrap().language(), "fr");
        assert_eq!(LocaleId::new("fr").unwrap().language(), "fr");
        assert_eq!(LocaleId::new("sr-Latn-RS").unwrap().language(), "sr");
    }

    #[test]
    fn test_same_language_as() {
        let en = LocaleId::new("en").unwrap();
        let en_gb = LocaleId::new("en-GB").unwrap();
        let fr = LocaleId::new("fr").unwrap();
        assert!(en.same_language_as(&en_gb));
        assert!(en_gb.same_language_as(&en));
        assert!(!en.same_language_as(&fr));
    }

    #[test]
    fn test_equal_after_normalization() {
        let a = LocaleId::new("de-DE").unwrap();
        let b = LocaleId::new("DE-de").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_str() {
        let locale: LocaleId = "ja".parse().unwrap();
        assert_eq!(locale.as_str(), "ja");
    }

    #[test]
    fn test_serde_as_plain_string() {
        let locale = LocaleId::new("pt-BR").unwrap();
        let json = serde_json::to_string(&locale).unwrap();
        assert_eq!(json, "\"pt-BR\"");
        let back: LocaleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, locale);
    }

    #[test]
    fn test_orderable_map_key() {
        use std::collections::BTreeMap;
        let mut map = BTreeMap::new();
        map.insert(LocaleId::new("fr").unwrap(), 1);
        map.insert(LocaleId::new("de").unwrap(), 2);
        let keys: Vec<_> = map.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["de", "fr"]);
    }
}
