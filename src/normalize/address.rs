//! Address normalization.
//!
//! Addresses go through the same width/numeral folding as names, plus a
//! trailing-garbage pass: scrapers that select one element too many capture
//! map links and detail buttons glued onto the address text.

use std::sync::LazyLock;

use regex::Regex;

/// UI fragments that source sites render directly after the address.
///
/// Anything from the first fragment onward is garbage, but only when the
/// text before it ends like an address (see [`is_address_boundary`]).
static UI_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"地図を見る|周辺地図|地図|MAP|\[詳細\]|詳細を見る|アクセス").unwrap()
});

/// Normalize a scraped address string.
///
/// Applies the standard name normalization (width folding, numeral
/// conversion, whitespace collapse), then truncates trailing UI fragments
/// when an address-like boundary precedes them. Inputs with no recognizable
/// boundary are returned unchanged past the base normalization.
pub fn normalize_address(raw: &str) -> String {
    let normalized = super::normalize(raw);
    strip_ui_fragments(&normalized)
}

fn strip_ui_fragments(s: &str) -> String {
    if let Some(m) = UI_FRAGMENT.find(s) {
        let prefix = s[..m.start()].trim_end();
        if prefix.chars().last().is_some_and(is_address_boundary) {
            return prefix.to_string();
        }
    }
    s.to_string()
}

/// Last character of a legitimate address token: a digit or the tail of a
/// counter word (丁目, 番地, 番, 号, 階).
fn is_address_boundary(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '目' | '番' | '地' | '号' | '階')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_map_link() {
        assert_eq!(
            normalize_address("東京都港区白金一丁目地図を見る"),
            "東京都港区白金1丁目"
        );
    }

    #[test]
    fn test_strips_detail_button_after_number() {
        assert_eq!(normalize_address("中央区月島3-26-5 [詳細]"), "中央区月島3-26-5");
        assert_eq!(normalize_address("中央区月島三丁目ＭＡＰ"), "中央区月島3丁目");
    }

    #[test]
    fn test_no_boundary_passes_through() {
        // The fragment word follows a non-address token, so nothing is cut.
        assert_eq!(normalize_address("サンプル地図ビル"), "サンプル地図ビル");
    }

    #[test]
    fn test_plain_address_untouched() {
        assert_eq!(
            normalize_address("東京都港区三田５－４－１"),
            normalize_address("東京都港区三田5-4-1")
        );
    }

    #[test]
    fn test_idempotent() {
        for raw in ["東京都港区白金一丁目地図を見る", "中央区月島3-26-5 [詳細]"] {
            let once = normalize_address(raw);
            assert_eq!(normalize_address(&once), once);
        }
    }
}
