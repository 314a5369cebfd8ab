//! Locale codeset to console codepage mapping
//!
//! The terminal side of the bridge speaks whatever the locale says; the
//! console side needs a Windows codepage number. This maps the common
//! codeset names, `ISO-8859-<n>` and `CP<n>` spellings, and plain codepage
//! numbers. Names nothing here recognizes leave the console untouched.

use std::env;

// Codeset names and their codepages, uppercase for the folded lookup.
const CS_NAMES: &[(u32, &str)] = &[
    (65001, "UTF-8"),
    (65001, "UTF8"),
    (20127, "ASCII"),
    (20127, "US-ASCII"),
    (20127, "ANSI_X3.4-1968"),
    (20866, "KOI8-R"),
    (20866, "KOI8R"),
    (20866, "KOI8"),
    (21866, "KOI8-U"),
    (21866, "KOI8U"),
    (20932, "EUCJP"),
    (20932, "EUC-JP"),
    (874, "CP874"),
    (874, "TIS620"),
    (874, "TIS-620"),
    (932, "SJIS"),
    (932, "SHIFT_JIS"),
    (936, "GBK"),
    (936, "GB2312"),
    (936, "EUCCN"),
    (936, "EUC-CN"),
    (949, "EUCKR"),
    (949, "EUC-KR"),
    (950, "BIG5"),
    (1361, "JOHAB"),
    (1361, "KSC5601"),
    (54936, "GB18030"),
];

/// Codepage for a codeset name, `None` when the name is not recognized.
pub fn codepage_for(name: &str) -> Option<u32> {
    let upname = name.trim().to_ascii_uppercase();
    if upname.is_empty() {
        return None;
    }

    for prefix in ["ISO-8859-", "ISO8859-", "ISO8859"] {
        if let Some(rest) = upname.strip_prefix(prefix) {
            return match rest.parse::<u32>() {
                // Latin parts 1..16; part 12 was never assigned.
                Ok(n) if (1..=16).contains(&n) && n != 12 => Some(28590 + n),
                _ => None,
            };
        }
    }

    if let Some(rest) = upname.strip_prefix("CP") {
        return rest.parse::<u32>().ok();
    }
    if let Ok(n) = upname.parse::<u32>() {
        return Some(n);
    }

    CS_NAMES
        .iter()
        .find(|(_, cs)| *cs == upname)
        .map(|(cp, _)| *cp)
}

/// Codeset named by the process locale.
///
/// `LC_ALL` beats `LC_CTYPE` beats `LANG`, each counting only when
/// non-empty, as POSIX category resolution does. A locale without a
/// codeset suffix (`C`, `en_US`) names none.
pub fn locale_codeset() -> Option<String> {
    for var in ["LC_ALL", "LC_CTYPE", "LANG"] {
        match env::var(var) {
            Ok(value) if !value.is_empty() => return codeset_of(&value),
            _ => continue,
        }
    }
    None
}

fn codeset_of(locale: &str) -> Option<String> {
    let locale = locale.split('@').next().unwrap_or(locale);
    locale
        .split_once('.')
        .map(|(_, codeset)| codeset.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_names() {
        assert_eq!(codepage_for("UTF-8"), Some(65001));
        assert_eq!(codepage_for("eucJP"), Some(20932));
        assert_eq!(codepage_for("Big5"), Some(950));
        assert_eq!(codepage_for("ANSI_X3.4-1968"), Some(20127));
        assert_eq!(codepage_for("GB18030"), Some(54936));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(codepage_for("utf-8"), Some(65001));
        assert_eq!(codepage_for("koi8-r"), Some(20866));
    }

    #[test]
    fn test_iso_8859_spellings() {
        assert_eq!(codepage_for("ISO-8859-1"), Some(28591));
        assert_eq!(codepage_for("ISO8859-15"), Some(28605));
        assert_eq!(codepage_for("iso885902"), Some(28592));
    }

    #[test]
    fn test_iso_8859_rejects_unassigned_parts() {
        assert_eq!(codepage_for("ISO-8859-12"), None);
        assert_eq!(codepage_for("ISO-8859-0"), None);
        assert_eq!(codepage_for("ISO-8859-17"), None);
    }

    #[test]
    fn test_cp_and_numeric_spellings() {
        assert_eq!(codepage_for("CP932"), Some(932));
        assert_eq!(codepage_for("cp1252"), Some(1252));
        assert_eq!(codepage_for("437"), Some(437));
    }

    #[test]
    fn test_unknown_name_maps_to_nothing() {
        assert_eq!(codepage_for("EBCDIC-GARBAGE"), None);
        assert_eq!(codepage_for(""), None);
    }

    #[test]
    fn test_codeset_extraction() {
        assert_eq!(codeset_of("en_US.UTF-8"), Some("UTF-8".to_string()));
        assert_eq!(codeset_of("ja_JP.eucJP@mod"), Some("eucJP".to_string()));
        assert_eq!(codeset_of("C"), None);
        assert_eq!(codeset_of("en_US"), None);
    }
}
