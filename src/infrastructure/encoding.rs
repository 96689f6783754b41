//! Text decoding and mojibake repair for scraped Korean content.

use encoding_rs::{Encoding, EUC_KR, UTF_8, WINDOWS_1252};

/// Decodes an HTTP body: declared charset, then UTF-8, then a detector guess,
/// then EUC-KR, and finally lossy UTF-8.
pub fn decode_bytes(bytes: &[u8], declared_charset: Option<&str>) -> String {
    if let Some(enc) = declared_charset.and_then(|c| Encoding::for_label(c.trim().as_bytes())) {
        let (text, _, had_errors) = enc.decode(bytes);
        if !had_errors {
            return text.into_owned();
        }
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let guessed = detector.guess(Some(b"kr"), true);
    if guessed != UTF_8 {
        let (text, _, had_errors) = guessed.decode(bytes);
        if !had_errors {
            return text.into_owned();
        }
    }

    let (text, _, had_errors) = EUC_KR.decode(bytes);
    if !had_errors {
        return text.into_owned();
    }
    String::from_utf8_lossy(bytes).into_owned()
}

/// Replacement characters, stray control characters or dingbats that
/// typically show up when a Korean byte stream was decoded with the wrong codec.
pub fn has_broken_text(text: &str) -> bool {
    text.chars().any(|c| {
        let cp = c as u32;
        cp == 0xFFFD || (cp < 32 && !matches!(c, '\t' | '\n' | '\r')) || (0x2600..=0x27FF).contains(&cp)
    })
}

fn is_replacement(c: char) -> bool {
    matches!(c, '\u{FFFD}' | '\u{2666}' | '\u{2662}')
}

/// Drops replacement characters and collapses runs of spaces.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars().filter(|c| !is_replacement(*c)) {
        if c == ' ' || c == '\t' {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out.trim().to_string()
}

/// UTF-8 that was mis-decoded as Latin-1 or Windows-1252 shows up as runs of
/// characters in U+0080..U+00FF (plus the 1252 punctuation block). Re-encoding
/// with the wrong codec and decoding as UTF-8 recovers the original.
fn undo_single_byte_misdecode(text: &str) -> Option<String> {
    if !text.chars().any(|c| !c.is_ascii()) {
        return None;
    }

    if text.chars().all(|c| (c as u32) <= 0xFF) {
        let bytes: Vec<u8> = text.chars().map(|c| c as u32 as u8).collect();
        if let Ok(fixed) = String::from_utf8(bytes) {
            return Some(fixed);
        }
    }

    let (bytes, _, unmappable) = WINDOWS_1252.encode(text);
    if !unmappable {
        if let Ok(fixed) = std::str::from_utf8(&bytes) {
            return Some(fixed.to_string());
        }
    }
    None
}

/// Repairs a possibly-garbled string.
///
/// Returns `None` when the text cannot be salvaged: it stays broken after the
/// repair attempts or nothing readable is left.
pub fn repair_text(text: &str) -> Option<String> {
    let candidate = undo_single_byte_misdecode(text).unwrap_or_else(|| text.to_string());
    let normalized = normalize_text(&candidate);
    if normalized.is_empty() && !text.trim().is_empty() {
        return None;
    }
    if has_broken_text(&normalized) {
        return None;
    }
    Some(normalized)
}
