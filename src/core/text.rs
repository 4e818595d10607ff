// Text helpers shared by event messages and reports.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Game text embeds markup like <i=3>, <i=1>, </i>.
    static ref MARKUP_TAG: Regex = Regex::new(r"(?i)</?i(?:=[^>]*)?/?>").unwrap();
}

/// Strip game markup tags from briefing/dispatch text.
pub fn strip_tags(text: &str) -> String {
    MARKUP_TAG.replace_all(text, "").into_owned()
}

/// Truncate to at most `max_chars` characters without splitting a char.
pub fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Compact number formatting: 1234 -> "1K", 2500000 -> "2.5M".
pub fn fmt_num(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.0}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Ten-slot text progress bar.
pub fn progress_bar(pct: f64) -> String {
    let filled = ((pct / 10.0).round() as usize).min(10);
    format!("{}{}", "#".repeat(filled), "-".repeat(10 - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<i=3>Liberate</i> the planet"), "Liberate the planet");
        assert_eq!(strip_tags("no markup here"), "no markup here");
        assert_eq!(strip_tags("<I=1>case</I>"), "case");
    }

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(999), "999");
        assert_eq!(fmt_num(1_500), "2K");
        assert_eq!(fmt_num(2_500_000), "2.5M");
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.0), "----------");
        assert_eq!(progress_bar(50.0), "#####-----");
        assert_eq!(progress_bar(100.0), "##########");
    }

    #[test]
    fn test_truncate_char_safe() {
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("héllo", 2), "hé");
    }
}
