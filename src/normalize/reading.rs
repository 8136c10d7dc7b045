//! Phonetic reading generation for sort/search keys.

/// Derive a katakana reading from a normalized name.
///
/// Only succeeds when every character already carries its own reading:
/// kana, ASCII alphanumerics, and spaces. Names containing kanji (or any
/// other script) return None rather than a guessed reading.
pub fn generate_reading(normalized: &str) -> Option<String> {
    if normalized.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(normalized.len());
    for c in normalized.chars() {
        match c {
            // Hiragana folds onto the katakana block at a fixed offset.
            '\u{3041}'..='\u{3096}' => out.push(char::from_u32(c as u32 + 0x60)?),
            // Katakana (including the long-vowel mark) passes through.
            '\u{30A1}'..='\u{30FA}' | 'ー' => out.push(c),
            'a'..='z' => out.push(c.to_ascii_uppercase()),
            'A'..='Z' | '0'..='9' | ' ' => out.push(c),
            _ => return None,
        }
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_katakana_passthrough() {
        assert_eq!(
            generate_reading("パークタワー").as_deref(),
            Some("パークタワー")
        );
    }

    #[test]
    fn test_hiragana_folds_to_katakana() {
        assert_eq!(generate_reading("さくら").as_deref(), Some("サクラ"));
    }

    #[test]
    fn test_ascii_uppercased() {
        assert_eq!(generate_reading("Park 21").as_deref(), Some("PARK 21"));
    }

    #[test]
    fn test_kanji_yields_none() {
        assert_eq!(generate_reading("白金ザスカイ"), None);
        assert_eq!(generate_reading(""), None);
    }
}
