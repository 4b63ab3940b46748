use super::Extractor;
use crate::error::{AdvisorError, Result};

/// Control words that introduce destination groups carrying no body text.
/// The whole group is skipped when one of these opens it.
const SKIPPED_DESTINATIONS: [&[u8]; 5] = [
    b"fonttbl",
    b"colortbl",
    b"stylesheet",
    b"info",
    b"pict",
];

/// Compressed-rich-text stripping: walks the RTF group structure, drops
/// control sequences and destination groups, and keeps the body text.
pub struct RichTextExtractor;

impl Extractor for RichTextExtractor {
    fn can_extract(&self, extension: &str) -> bool {
        extension == "rtf"
    }

    fn extract(&self, payload: &[u8], _extension: &str) -> Result<String> {
        if !payload.starts_with(b"{\\rtf") {
            return Err(AdvisorError::CorruptInput(
                "missing RTF header".to_string(),
            ));
        }
        Ok(strip_rtf(payload))
    }
}

fn strip_rtf(bytes: &[u8]) -> String {
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len() / 2);
    let mut depth: usize = 0;
    // Group depth at which a skipped destination began, if inside one
    let mut skip_depth: Option<usize> = None;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                if skip_depth == Some(depth) {
                    skip_depth = None;
                }
                depth = depth.saturating_sub(1);
                i += 1;
            }
            b'\\' => {
                i += 1;
                if i >= bytes.len() {
                    break;
                }
                match bytes[i] {
                    b'\\' | b'{' | b'}' => {
                        if skip_depth.is_none() {
                            out.push(bytes[i]);
                        }
                        i += 1;
                    }
                    b'\'' => {
                        i += 1;
                        let mut value = 0u16;
                        let mut digits = 0;
                        while digits < 2 && i < bytes.len() {
                            match (bytes[i] as char).to_digit(16) {
                                Some(d) => {
                                    value = value * 16 + d as u16;
                                    i += 1;
                                    digits += 1;
                                }
                                None => break,
                            }
                        }
                        if skip_depth.is_none() && digits == 2 {
                            out.push(value as u8);
                        }
                    }
                    b'*' => {
                        // Starred destinations are skippable by definition
                        if skip_depth.is_none() {
                            skip_depth = Some(depth);
                        }
                        i += 1;
                    }
                    b'\r' | b'\n' => {
                        if skip_depth.is_none() {
                            out.push(b'\n');
                        }
                        i += 1;
                    }
                    c if c.is_ascii_alphabetic() => {
                        i = handle_control_word(bytes, i, &mut out, depth, &mut skip_depth);
                    }
                    _ => {
                        // Unknown control symbol contributes nothing
                        i += 1;
                    }
                }
            }
            // Raw line breaks in RTF source are layout, not content
            b'\r' | b'\n' => i += 1,
            b => {
                if skip_depth.is_none() {
                    out.push(b);
                }
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Consume one control word starting at `bytes[start]` (the first letter)
/// and apply its effect. Returns the index just past the word, its
/// parameter and its delimiter.
fn handle_control_word(
    bytes: &[u8],
    start: usize,
    out: &mut Vec<u8>,
    depth: usize,
    skip_depth: &mut Option<usize>,
) -> usize {
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    let word = &bytes[start..i];

    let param_start = i;
    if i < bytes.len() && bytes[i] == b'-' {
        i += 1;
    }
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let param: Option<i64> = std::str::from_utf8(&bytes[param_start..i])
        .ok()
        .and_then(|s| s.parse().ok());

    // A single space after a control word is its delimiter, not content
    if i < bytes.len() && bytes[i] == b' ' {
        i += 1;
    }

    if word == b"bin" {
        // Raw binary payload follows; skip it wholesale
        let len = param.unwrap_or(0).max(0) as usize;
        return (i + len).min(bytes.len());
    }

    if skip_depth.is_some() {
        return i;
    }

    match word {
        b"par" | b"line" | b"sect" | b"page" => out.push(b'\n'),
        b"tab" => out.push(b'\t'),
        b"u" => {
            // \uN: emit the code point, then skip its ANSI fallback
            let code = (param.unwrap_or(0) & 0xFFFF) as u32;
            if let Some(ch) = char::from_u32(code) {
                let mut enc = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut enc).as_bytes());
            }
            if i + 1 < bytes.len() && bytes[i] == b'\\' && bytes[i + 1] == b'\'' {
                i = (i + 4).min(bytes.len());
            } else if i < bytes.len() && !matches!(bytes[i], b'\\' | b'{' | b'}') {
                i += 1;
            }
        }
        w if SKIPPED_DESTINATIONS.contains(&w) => {
            *skip_depth = Some(depth);
        }
        _ => {}
    }

    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_richtext_can_extract() {
        let extractor = RichTextExtractor;
        assert!(extractor.can_extract("rtf"));
        assert!(!extractor.can_extract("txt"));
    }

    #[test]
    fn test_missing_header_is_corrupt() {
        let extractor = RichTextExtractor;
        let err = extractor.extract(b"plain text", "rtf").unwrap_err();
        assert!(matches!(err, AdvisorError::CorruptInput(_)));
    }

    #[test]
    fn test_body_text_survives() {
        let extractor = RichTextExtractor;
        let text = extractor
            .extract(
                b"{\\rtf1\\ansi{\\fonttbl{\\f0 Arial;}}\\f0\\fs24 Safety plan approved.\\par Next inspection 09/15.}",
                "rtf",
            )
            .unwrap();
        assert_eq!(text, "Safety plan approved.\nNext inspection 09/15.");
    }

    #[test]
    fn test_font_table_stripped() {
        let extractor = RichTextExtractor;
        let text = extractor
            .extract(b"{\\rtf1{\\fonttbl{\\f0 Helvetica;}}ok}", "rtf")
            .unwrap();
        assert_eq!(text, "ok");
        assert!(!text.contains("Helvetica"));
    }

    #[test]
    fn test_starred_destination_stripped() {
        let extractor = RichTextExtractor;
        let text = extractor
            .extract(b"{\\rtf1{\\*\\generator Riched20}visible}", "rtf")
            .unwrap();
        assert_eq!(text, "visible");
    }

    #[test]
    fn test_escaped_braces_kept() {
        let extractor = RichTextExtractor;
        let text = extractor
            .extract(b"{\\rtf1 \\{zone 4\\}}", "rtf")
            .unwrap();
        assert_eq!(text, "{zone 4}");
    }

    #[test]
    fn test_unicode_escape_with_fallback() {
        let extractor = RichTextExtractor;
        let text = extractor
            .extract(b"{\\rtf1 don\\u8217't}", "rtf")
            .unwrap();
        assert_eq!(text, "don\u{2019}t");
    }

    #[test]
    fn test_tab_control_word() {
        let extractor = RichTextExtractor;
        let text = extractor
            .extract(b"{\\rtf1 item\\tab cost}", "rtf")
            .unwrap();
        assert_eq!(text, "item\tcost");
    }
}
