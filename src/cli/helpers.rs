//! Shared CLI output helpers.

/// Truncate a string to a maximum number of characters, appending an
/// ellipsis when cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", cut)
}

/// Format an optional price for table output.
pub fn format_price(price: Option<i64>) -> String {
    match price {
        Some(p) => format!("{}万円", p),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly-10", 10), "exactly-10");
        assert_eq!(truncate("a-longer-string", 10), "a-longer-…");
    }
}
