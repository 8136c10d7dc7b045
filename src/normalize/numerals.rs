//! Kanji and roman numeral conversion.
//!
//! Site operators write the same wing number as 第一棟, 第１棟, 第Ⅰ棟, or
//! 第I棟. Everything funnels into arabic digits here so downstream
//! comparison never sees the variants.

/// Digit value of a kanji numeral character.
fn kanji_digit(c: char) -> Option<u64> {
    match c {
        '〇' | '零' => Some(0),
        '一' => Some(1),
        '二' => Some(2),
        '三' => Some(3),
        '四' => Some(4),
        '五' => Some(5),
        '六' => Some(6),
        '七' => Some(7),
        '八' => Some(8),
        '九' => Some(9),
        _ => None,
    }
}

/// Positional multiplier of a kanji numeral character.
fn kanji_multiplier(c: char) -> Option<u64> {
    match c {
        '十' => Some(10),
        '百' => Some(100),
        '千' => Some(1000),
        _ => None,
    }
}

fn is_kanji_numeral(c: char) -> bool {
    kanji_digit(c).is_some() || kanji_multiplier(c).is_some()
}

/// Convert every maximal run of kanji numerals in `input` to arabic digits.
///
/// Runs containing a positional multiplier are evaluated positionally
/// (二十三 → 23, 二百三十五 → 235); plain digit runs are converted by
/// juxtaposition (二〇二四 → 2024).
pub fn convert_kanji_numerals(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        if is_kanji_numeral(chars[i]) {
            let start = i;
            while i < chars.len() && is_kanji_numeral(chars[i]) {
                i += 1;
            }
            push_run(&mut out, &chars[start..i]);
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }

    out
}

fn push_run(out: &mut String, run: &[char]) {
    if run.iter().any(|c| kanji_multiplier(*c).is_some()) {
        out.push_str(&positional_value(run).to_string());
    } else {
        for c in run {
            if let Some(d) = kanji_digit(*c) {
                out.push_str(&d.to_string());
            }
        }
    }
}

/// Evaluate a positional kanji number (up to the 千 magnitude).
fn positional_value(run: &[char]) -> u64 {
    let mut value = 0u64;
    let mut current = 0u64;

    for &c in run {
        if let Some(d) = kanji_digit(c) {
            current = d;
        } else if let Some(m) = kanji_multiplier(c) {
            // A bare multiplier means one of it: 十二 is 12, not 2.
            value += if current == 0 { 1 } else { current } * m;
            current = 0;
        }
    }

    value + current
}

/// Convert roman numerals to arabic digits.
///
/// Handles the dedicated Unicode codepoints (Ⅰ–Ⅻ, ⅰ–ⅻ) and bounded ASCII
/// tokens built only from I/V/X. ASCII tokens containing any other letter
/// pass through untouched, so ordinary words are safe.
pub fn convert_roman_numerals(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(value) = unicode_roman(c) {
            out.push_str(&value.to_string());
            i += 1;
            continue;
        }

        if c.is_ascii_alphabetic() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_alphabetic() {
                i += 1;
            }
            let token: String = chars[start..i].iter().collect();
            match parse_ascii_roman(&token) {
                Some(value) => out.push_str(&value.to_string()),
                None => out.push_str(&token),
            }
            continue;
        }

        out.push(c);
        i += 1;
    }

    out
}

/// Value of a dedicated Unicode roman-numeral codepoint.
fn unicode_roman(c: char) -> Option<u32> {
    let cp = c as u32;
    match cp {
        0x2160..=0x216B => Some(cp - 0x2160 + 1),
        0x2170..=0x217B => Some(cp - 0x2170 + 1),
        _ => None,
    }
}

/// Parse an uppercase I/V/X token as a roman numeral.
///
/// Returns None for tokens containing other letters, implausibly long
/// tokens, or values outside 1..=39.
fn parse_ascii_roman(token: &str) -> Option<u32> {
    if token.is_empty() || token.len() > 7 {
        return None;
    }

    let mut values = Vec::with_capacity(token.len());
    for c in token.chars() {
        values.push(match c {
            'I' => 1i64,
            'V' => 5,
            'X' => 10,
            _ => return None,
        });
    }

    let mut total = 0i64;
    let mut prev = 0i64;
    for v in values.into_iter().rev() {
        if v < prev {
            total -= v;
        } else {
            total += v;
            prev = v;
        }
    }

    (1..=39).contains(&total).then_some(total as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_compounds() {
        assert_eq!(convert_kanji_numerals("十二"), "12");
        assert_eq!(convert_kanji_numerals("二十三"), "23");
        assert_eq!(convert_kanji_numerals("二百三十五"), "235");
        assert_eq!(convert_kanji_numerals("千二百"), "1200");
    }

    #[test]
    fn test_juxtaposition() {
        assert_eq!(convert_kanji_numerals("二〇二四"), "2024");
        assert_eq!(convert_kanji_numerals("三丁目"), "3丁目");
    }

    #[test]
    fn test_mixed_text() {
        assert_eq!(convert_kanji_numerals("港区三田五丁目"), "港区3田5丁目");
    }

    #[test]
    fn test_unicode_roman() {
        assert_eq!(convert_roman_numerals("Ⅰ"), "1");
        assert_eq!(convert_roman_numerals("Ⅻ"), "12");
        assert_eq!(convert_roman_numerals("タワーⅢ"), "タワー3");
    }

    #[test]
    fn test_ascii_roman_tokens() {
        assert_eq!(convert_roman_numerals("II"), "2");
        assert_eq!(convert_roman_numerals("IV"), "4");
        assert_eq!(convert_roman_numerals("XIX"), "19");
        assert_eq!(convert_roman_numerals("MIX"), "MIX");
        assert_eq!(convert_roman_numerals("TOWER"), "TOWER");
    }

    #[test]
    fn test_lowercase_ascii_not_converted() {
        assert_eq!(convert_roman_numerals("ii"), "ii");
    }
}
