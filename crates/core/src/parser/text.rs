//! Text normalization for scraped fields.
//!
//! The registry serves full-width digits and letters (１４７巷) and pads
//! cells with assorted whitespace, so every scraped field goes through
//! [`clean_text`] before any structural parsing.

/// Fold full-width ASCII variants (U+FF01..U+FF5E) to their half-width
/// forms and the ideographic space to a plain space.
pub fn fold_fullwidth(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\u{FF01}'..='\u{FF5E}' => {
                char::from_u32(c as u32 - 0xFEE0).unwrap_or(c)
            }
            '\u{3000}' => ' ',
            _ => c,
        })
        .collect()
}

/// Remove every whitespace character, including the ones hiding inside
/// addresses copied out of HTML cells.
pub fn strip_whitespace(input: &str) -> String {
    input.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Full cleaning pipeline: full-width folding then whitespace removal.
pub fn clean_text(input: &str) -> String {
    strip_whitespace(&fold_fullwidth(input))
}

/// True for characters that can appear in a numeral payload, either
/// Arabic digits or Chinese numerals up to 99.
pub fn is_numeral_char(c: char) -> bool {
    c.is_ascii_digit() || chinese_digit(c).is_some() || c == '十'
}

fn chinese_digit(c: char) -> Option<u32> {
    match c {
        '零' => Some(0),
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

/// Convert a numeral payload to a number.
///
/// Accepts plain Arabic digits ("22") and Chinese numerals up to 99 in
/// their compound forms: 一, 十, 十一, 二十, 二十二. Mixed or malformed
/// payloads return `None`.
pub fn parse_numeral(input: &str) -> Option<u32> {
    if input.is_empty() {
        return None;
    }

    if input.chars().all(|c| c.is_ascii_digit()) {
        return input.parse().ok();
    }

    let chars: Vec<char> = input.chars().collect();
    match chars.as_slice() {
        [c] if *c == '十' => Some(10),
        [c] => chinese_digit(*c),
        ['十', u] => chinese_digit(*u).map(|u| 10 + u),
        [t, '十'] => chinese_digit(*t).map(|t| t * 10),
        [t, '十', u] => match (chinese_digit(*t), chinese_digit(*u)) {
            (Some(t), Some(u)) => Some(t * 10 + u),
            _ => None,
        },
        _ => None,
    }
}

/// Like [`parse_numeral`] but renders the result back to a digit string.
pub fn numeral_to_digits(input: &str) -> Option<String> {
    parse_numeral(input).map(|n| n.to_string())
}
