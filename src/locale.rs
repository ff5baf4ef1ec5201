//! Locale tokens and locale lists.
//!
//! Locales are stored and compared in a single canonical form: trimmed,
//! lowercase, with `_` replaced by `-`. `"en_US"` and `"EN-us"` are the same
//! locale. Malformed input is never rejected, only dropped.

use std::collections::HashSet;
use std::fmt;

/// A normalized locale tag (e.g. `"en"`, `"pt-br"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Locale(String);

impl Locale {
    /// Normalize a raw token into a locale.
    ///
    /// Empty or whitespace-only input yields the empty locale.
    pub fn normalize(token: &str) -> Self {
        Locale(token.trim().to_lowercase().replace('_', "-"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Locale {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Locale {
    fn from(value: &str) -> Self {
        Locale::normalize(value)
    }
}

fn is_list_separator(c: char) -> bool {
    matches!(c, ',' | ' ' | '\t' | '\n' | ';')
}

/// Parse a free-form locale list such as `"en, zh_TW; ko"`.
///
/// Tokens are normalized, empties dropped, and duplicates removed by
/// normalized value. The first occurrence wins and order is preserved.
pub fn parse_locale_list(raw: &str) -> Vec<Locale> {
    let mut seen = HashSet::new();
    raw.split(is_list_separator)
        .map(Locale::normalize)
        .filter(|locale| !locale.is_empty())
        .filter(|locale| seen.insert(locale.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ==================== normalize Tests ====================

    #[test]
    fn test_normalize_lowercases_and_maps_underscore() {
        assert_eq!(Locale::normalize("en_US").as_str(), "en-us");
        assert_eq!(Locale::normalize("  PT_br \n").as_str(), "pt-br");
    }

    #[test]
    fn test_normalize_equates_case_and_separator_variants() {
        assert_eq!(Locale::normalize("en_US"), Locale::normalize("EN-us"));
    }

    #[test]
    fn test_normalize_empty_input() {
        assert!(Locale::normalize("").is_empty());
        assert!(Locale::normalize("   \t").is_empty());
    }

    #[test]
    fn test_locale_display_and_from() {
        let locale: Locale = "ZH_tw".into();
        assert_eq!(locale.to_string(), "zh-tw");
        assert_eq!(locale.as_ref(), "zh-tw");
    }

    // ==================== parse_locale_list Tests ====================

    #[test]
    fn test_parse_list_all_separators() {
        let locales = parse_locale_list("en,fr ko\tde\nes;it");
        let codes: Vec<&str> = locales.iter().map(Locale::as_str).collect();
        assert_eq!(codes, vec!["en", "fr", "ko", "de", "es", "it"]);
    }

    #[test]
    fn test_parse_list_dedupes_by_normalized_value_first_wins() {
        let locales = parse_locale_list("en_US, fr, EN-us, FR, ko");
        let codes: Vec<&str> = locales.iter().map(Locale::as_str).collect();
        assert_eq!(codes, vec!["en-us", "fr", "ko"]);
    }

    #[test]
    fn test_parse_list_drops_empty_tokens() {
        let locales = parse_locale_list(" ,, ;\n\t en ;; ");
        assert_eq!(locales, vec![Locale::normalize("en")]);
    }

    #[test]
    fn test_parse_list_empty_input() {
        assert!(parse_locale_list("").is_empty());
        assert!(parse_locale_list(" , ; ").is_empty());
    }

    // ==================== Property Tests ====================

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(raw in ".*") {
            let once = Locale::normalize(&raw);
            let twice = Locale::normalize(once.as_str());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_parsed_list_is_unique_and_non_empty(raw in "[a-zA-Z_ ,;\\-]{0,40}") {
            let locales = parse_locale_list(&raw);
            let unique: HashSet<_> = locales.iter().collect();
            prop_assert_eq!(unique.len(), locales.len());
            prop_assert!(locales.iter().all(|l| !l.is_empty()));
            prop_assert!(locales.iter().all(|l| !l.as_str().contains('_')));
        }
    }
}
