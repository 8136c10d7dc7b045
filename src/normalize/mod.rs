//! Text normalization for building names and addresses.
//!
//! Scraped names arrive in every width, numeral system, and punctuation
//! convention the source sites can produce. Everything that compares names
//! goes through [`normalize`] first; grouping of likely duplicates uses the
//! coarser [`canonicalize`] key on top of it.
//!
//! All lookup tables are process-wide immutable statics; the functions here
//! are total and idempotent.

mod numerals;
mod reading;

pub mod address;

pub use address::normalize_address;
pub use reading::generate_reading;

use std::sync::LazyLock;

use regex::Regex;

/// Wing/branch qualifiers stripped by [`canonicalize`].
///
/// Matched against the already-normalized form, so numerals are arabic by
/// the time these run (`第一棟` has become `第1棟`).
static WING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"第\d+(?:号)?(?:棟|館)").unwrap(),
        Regex::new(r"\d+号棟").unwrap(),
        Regex::new(r"[A-Za-z]棟").unwrap(),
        Regex::new(r"(?:東|西|南|北|本|新|別)(?:棟|館)").unwrap(),
    ]
});

/// Building-type suffix words stripped by [`canonicalize`].
///
/// Longest first so ビルディング wins over ビル.
static FILLER_SUFFIXES: &[&str] = &[
    "ビルディング",
    "マンション",
    "レジデンス",
    "アパート",
    "ハイツ",
    "コーポ",
    "ビル",
];

/// Normalize a raw scraped name into its comparable form.
///
/// Pipeline: full-width folding, kanji-numeral conversion, roman-numeral
/// conversion, punctuation canonicalization, whitespace collapse. Total and
/// idempotent; the empty string maps to itself.
pub fn normalize(raw: &str) -> String {
    let folded: String = raw.chars().map(fold_width).collect();
    let converted = numerals::convert_kanji_numerals(&folded);
    let converted = numerals::convert_roman_numerals(&converted);
    let cleaned: String = converted
        .chars()
        .filter(|c| !matches!(c, '・' | '･'))
        .collect();
    collapse_whitespace(&cleaned)
}

/// Derive the coarse grouping key from a normalized name.
///
/// Strips wing qualifiers and building-type filler words, then removes all
/// remaining whitespace. Strictly coarser than [`normalize`]: two names with
/// an equal canonical form are merge *candidates*, never proof of identity.
pub fn canonicalize(normalized: &str) -> String {
    let mut s = normalized.to_string();
    for pattern in WING_PATTERNS.iter() {
        s = pattern.replace_all(&s, "").into_owned();
    }

    loop {
        let trimmed = s.trim_end();
        match FILLER_SUFFIXES
            .iter()
            .find(|suffix| trimmed.ends_with(*suffix))
        {
            Some(suffix) => s = trimmed[..trimmed.len() - suffix.len()].to_string(),
            None => break,
        }
    }

    s.split_whitespace().collect::<Vec<_>>().concat()
}

/// Fold full-width alphanumerics and punctuation to their ASCII forms.
fn fold_width(c: char) -> char {
    match c {
        '\u{3000}' => ' ',
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        _ => c,
    }
}

/// Collapse runs of whitespace to single half-width spaces and trim ends.
fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_full_width() {
        assert_eq!(normalize("ＡＢＣ１２３"), "ABC123");
        assert_eq!(normalize("パーク　タワー"), "パーク タワー");
        assert_eq!(normalize("Ｂ＆Ｂビル"), "B&Bビル");
    }

    #[test]
    fn test_kanji_numerals() {
        assert_eq!(normalize("第一棟"), "第1棟");
        assert_eq!(normalize("二十三号室"), "23号室");
        assert_eq!(normalize("二百三十五"), "235");
    }

    #[test]
    fn test_roman_numerals() {
        assert_eq!(normalize("パークハウスⅡ"), "パークハウス2");
        assert_eq!(normalize("グランドメゾン II"), "グランドメゾン 2");
        assert_eq!(normalize("TOWER X"), "TOWER 10");
        // Plain words are left alone even though they contain I/V/X.
        assert_eq!(normalize("VIEW HILLS"), "VIEW HILLS");
    }

    #[test]
    fn test_middle_dot_removed() {
        assert_eq!(normalize("白金ザ・スカイ"), "白金ザスカイ");
    }

    #[test]
    fn test_known_duplicate_pair_collapses() {
        assert_eq!(
            normalize("白金ザ・スカイ第一棟"),
            normalize("白金ザスカイ第1棟"),
        );
    }

    #[test]
    fn test_normalize_idempotent() {
        for raw in [
            "白金ザ・スカイ第一棟",
            "ＰＡＲＫ　ＣＯＵＲＴ　Ⅲ",
            "グランドメゾン二十三",
            "",
            "  spaced   out  ",
        ] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_canonicalize_strips_wing_and_filler() {
        assert_eq!(canonicalize(&normalize("白金ザ・スカイ第1棟")), "白金ザスカイ");
        assert_eq!(canonicalize(&normalize("白金ザスカイ東棟")), "白金ザスカイ");
        assert_eq!(canonicalize(&normalize("青葉コーポ")), "青葉");
        assert_eq!(canonicalize(&normalize("青葉第一ビル")), "青葉第1");
    }

    #[test]
    fn test_canonicalize_stable() {
        for raw in ["白金ザ・スカイ第一棟", "青葉マンションA棟", "サン・ビル"] {
            let canonical = canonicalize(&normalize(raw));
            assert_eq!(canonicalize(&canonical), canonical);
        }
    }

    #[test]
    fn test_canonical_equality_is_candidate_not_proof() {
        // Different wings share a canonical key but not a normalized name.
        let a = normalize("白金ザスカイ第1棟");
        let b = normalize("白金ザスカイ第2棟");
        assert_ne!(a, b);
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }
}
