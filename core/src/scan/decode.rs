//! Multi-encoding text recovery

use encoding_rs::{Encoding, GBK, UTF_8, WINDOWS_1252};
use std::borrow::Cow;

/// Content at or above this many characters is judged by ratio, shorter content by count
const RATIO_MIN_CHARS: usize = 100;
const MAX_REPLACEMENT_RATIO: f64 = 0.05;
const MAX_REPLACEMENT_COUNT: usize = 5;

/// Decode file bytes into text.
///
/// Candidates are tried in order UTF-8, GBK, GB2312, Latin-1; the first whose output
/// is mostly free of replacement characters wins. If none qualifies the bytes are
/// decoded as lossy UTF-8.
pub fn decode_text(bytes: &[u8]) -> String {
    for (label, encoding) in candidates() {
        let text = decode_with(encoding, bytes);
        if is_acceptable(&text) {
            if label != "utf-8" {
                tracing::debug!("Decoded content as {}", label);
            }
            return text.into_owned();
        }
    }

    String::from_utf8_lossy(bytes).into_owned()
}

fn candidates() -> [(&'static str, &'static Encoding); 4] {
    // encoding_rs folds GB2312 into GBK and Latin-1 into windows-1252
    let gb2312 = Encoding::for_label(b"gb2312").unwrap_or(GBK);
    let latin1 = Encoding::for_label(b"latin1").unwrap_or(WINDOWS_1252);
    [
        ("utf-8", UTF_8),
        ("gbk", GBK),
        ("gb2312", gb2312),
        ("latin-1", latin1),
    ]
}

fn decode_with<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> Cow<'a, str> {
    let (text, _had_errors) = encoding.decode_without_bom_handling(bytes);
    text
}

fn is_acceptable(text: &str) -> bool {
    let (length, replacements) = text.chars().fold((0usize, 0usize), |(len, bad), c| {
        (len + 1, bad + usize::from(c == char::REPLACEMENT_CHARACTER))
    });

    if length >= RATIO_MIN_CHARS {
        (replacements as f64) / (length as f64) < MAX_REPLACEMENT_RATIO
    } else {
        replacements <= MAX_REPLACEMENT_COUNT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_passthrough() {
        let text = "fn main() {\r\n    println!(\"héllo 世界\");\n}";
        assert_eq!(decode_text(text.as_bytes()), text);
    }

    #[test]
    fn test_gbk_content_is_recovered() {
        let source = "中文注释：这是一个测试文件，包含很多中文字符。".repeat(5);
        let (encoded, _, _) = GBK.encode(&source);
        let decoded = decode_text(&encoded);
        assert!(decoded.starts_with("中文注释"));
        assert!(!decoded.contains(char::REPLACEMENT_CHARACTER));
    }

    #[test]
    fn test_latin1_content_is_recovered() {
        // "café résumé" in ISO-8859-1 is invalid UTF-8 and invalid-ish GBK
        let bytes: Vec<u8> = b"caf\xe9 r\xe9sum\xe9 na\xefve \xff\xfe"
            .iter()
            .copied()
            .cycle()
            .take(400)
            .collect();
        let decoded = decode_text(&bytes);
        assert!(decoded.contains("caf"));
        assert!(!decoded.contains(char::REPLACEMENT_CHARACTER));
    }

    #[test]
    fn test_short_content_tolerates_few_replacements() {
        assert!(is_acceptable("ab\u{FFFD}\u{FFFD}"));
        assert!(!is_acceptable("\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}"));
    }

    #[test]
    fn test_long_content_uses_ratio() {
        let mut text = "a".repeat(200);
        text.push_str(&"\u{FFFD}".repeat(9));
        assert!(is_acceptable(&text));
        text.push_str(&"\u{FFFD}".repeat(10));
        assert!(!is_acceptable(&text));
    }
}
