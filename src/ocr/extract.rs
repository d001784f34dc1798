use regex::Regex;
use std::sync::OnceLock;

use super::engine::OcrLine;
use crate::log;
use crate::roulette;

/// One or two digits, optionally surrounded by OCR noise characters.
const POCKET_PATTERN: &str = r"^[^0-9A-Za-z]*([0-9OoIl|SB]{1,2})[^0-9A-Za-z]*$";

fn pocket_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(POCKET_PATTERN).ok()).as_ref()
}

/// Maps characters Tesseract commonly confuses with digits on game fonts.
fn normalize_digit(c: char) -> Option<char> {
    match c {
        '0'..='9' => Some(c),
        'O' | 'o' => Some('0'),
        'I' | 'l' | '|' => Some('1'),
        'S' => Some('5'),
        'B' => Some('8'),
        _ => None,
    }
}

/// Parses a single OCR word into a pocket number (0-36).
///
/// Words with more than two digit-like characters, or values above 36, are
/// rejected rather than truncated.
pub fn parse_pocket(text: &str) -> Option<u8> {
    let caps = pocket_regex()?.captures(text.trim())?;
    let raw = caps.get(1)?.as_str();

    // Letters alone are never a reading
    if !raw.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let digits: String = raw.chars().filter_map(normalize_digit).collect();
    let value = digits.parse::<u8>().ok()?;
    roulette::is_pocket(value).then_some(value)
}

/// Extracts the pocket number from OCR output of a result display.
///
/// Exactly one confident word must parse as a pocket; several candidates mean
/// the region shows more than one number and nothing is returned.
pub fn extract_pocket(lines: &[OcrLine], min_confidence: f32) -> Option<u8> {
    let mut found: Vec<u8> = Vec::new();

    for line in lines {
        for word in &line.words {
            if word.confidence < min_confidence {
                continue;
            }
            if let Some(v) = parse_pocket(&word.text) {
                found.push(v);
            }
        }
    }

    match found.as_slice() {
        [value] => Some(*value),
        [] => None,
        many => {
            log(&format!("OCR found {} pocket-like words {:?}, ignoring", many.len(), many));
            None
        }
    }
}
