//! Marker-based decomposition of Taiwanese door-plate addresses.
//!
//! An address is a left-to-right sequence of optional segments, each
//! ending in a distinguishing marker character: 里/村 (village), 鄰
//! (neighborhood), free-text road, 段 (section), 巷 (lane), 弄 (alley),
//! 號 (number), 樓 (floor), 之 (sub-floor). When a marker appears more
//! than once the first occurrence wins and later ones are folded into
//! the following free text instead of raising.

use thiserror::Error;

use crate::record::AddressParts;

use super::text::{clean_text, is_numeral_char, numeral_to_digits};

/// Why a scraped row could not be turned into a structured record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailureReason {
    /// The address contains no recognizable marker at all.
    NoMarkers,
    /// The register date did not match any accepted Minguo layout.
    DateFormat,
    /// A required field was empty after cleaning.
    MissingField,
}

impl ParseFailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseFailureReason::NoMarkers => "NO_MARKERS",
            ParseFailureReason::DateFormat => "DATE_FORMAT",
            ParseFailureReason::MissingField => "MISSING_FIELD",
        }
    }
}

/// Per-record parse failure. Non-fatal: the orchestrator counts these
/// and moves on to the next row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {raw_input}", reason.as_str())]
pub struct ParseFailure {
    pub reason: ParseFailureReason,
    pub raw_input: String,
}

impl ParseFailure {
    pub fn new(reason: ParseFailureReason, raw_input: impl Into<String>) -> Self {
        Self {
            reason,
            raw_input: raw_input.into(),
        }
    }
}

/// Typed segments in canonical order. Road is absent here because it has
/// no marker of its own; it is the free text left over before the first
/// numeric segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    Village,
    Neighborhood,
    Section,
    Lane,
    Alley,
    Number,
    Floor,
    FloorDash,
}

fn marker_segment(c: char) -> Option<Segment> {
    match c {
        '里' | '村' => Some(Segment::Village),
        '鄰' => Some(Segment::Neighborhood),
        '段' => Some(Segment::Section),
        '巷' => Some(Segment::Lane),
        '弄' => Some(Segment::Alley),
        '號' => Some(Segment::Number),
        '樓' => Some(Segment::Floor),
        '之' => Some(Segment::FloorDash),
        _ => None,
    }
}

/// Split a payload into (residue, trailing run) where the run is the
/// maximal suffix of characters matching `pred`.
fn split_trailing<F: Fn(char) -> bool>(payload: &str, pred: F) -> (String, String) {
    let chars: Vec<char> = payload.chars().collect();
    let mut split = chars.len();
    while split > 0 && pred(chars[split - 1]) {
        split -= 1;
    }
    (
        chars[..split].iter().collect(),
        chars[split..].iter().collect(),
    )
}

fn is_number_payload_char(c: char) -> bool {
    // Door numbers may carry a range or sub-number suffix (10-12號, 10之1號).
    c.is_ascii_digit() || c == '-' || c == '之'
}

/// Strip leading zeros from a digit string; an all-zero payload becomes
/// absent rather than "0".
fn strip_leading_zeros(digits: &str) -> Option<String> {
    let stripped = digits.trim_start_matches('0');
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Decompose a cleaned-or-raw full address into its typed parts.
///
/// The input is normalized (full-width folding, whitespace removal)
/// before scanning. An input with no recognizable marker returns a
/// [`ParseFailure`] with the original text as diagnostic.
pub fn parse_address(full_address: &str) -> Result<AddressParts, ParseFailure> {
    let cleaned = clean_text(full_address);
    let chars: Vec<char> = cleaned.chars().collect();

    if !chars.iter().any(|c| marker_segment(*c).is_some()) {
        return Err(ParseFailure::new(
            ParseFailureReason::NoMarkers,
            full_address,
        ));
    }

    let mut parts = AddressParts::default();
    let mut road = String::new();
    let mut payload = String::new();
    let mut next = Segment::Village;

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if let Some(seg) = marker_segment(c) {
            let allowed = seg >= next;
            // A 之 ahead of the 號 is a sub-number inside the number
            // payload (10之1號), not the sub-floor segment.
            let premature_dash = seg == Segment::FloorDash
                && parts.number.is_none()
                && chars[i + 1..].contains(&'號');

            if allowed && !premature_dash {
                if seg == Segment::FloorDash {
                    // 之 prefixes its payload (之1) while every other
                    // marker trails it, so read the digits forward.
                    let run: String = chars[i + 1..]
                        .iter()
                        .take_while(|c| is_numeral_char(**c))
                        .collect();
                    parts.floor_dash = normalize_numeral_run(&run);
                    i += 1 + run.chars().count();
                } else {
                    consume(seg, c, &payload, &mut parts, &mut road);
                    i += 1;
                }
                payload.clear();
                next = successor(seg);
                continue;
            }
        }
        payload.push(c);
        i += 1;
    }

    // Trailing free text becomes the road only when no segment past the
    // road position was consumed; anything after 段/巷/... is a building
    // name or annotation, not structure.
    if !payload.is_empty() && next <= Segment::Section && parts.road.is_none() {
        road.push_str(&payload);
    }
    if !road.is_empty() {
        parts.road = Some(road);
    }

    Ok(parts)
}

/// The segment that becomes eligible after `seg` is consumed.
fn successor(seg: Segment) -> Segment {
    match seg {
        Segment::Village => Segment::Neighborhood,
        Segment::Neighborhood => Segment::Section,
        Segment::Section => Segment::Lane,
        Segment::Lane => Segment::Alley,
        Segment::Alley => Segment::Number,
        Segment::Number => Segment::Floor,
        Segment::Floor => Segment::FloorDash,
        Segment::FloorDash => Segment::FloorDash,
    }
}

fn consume(seg: Segment, marker: char, payload: &str, parts: &mut AddressParts, road: &mut String) {
    match seg {
        Segment::Village => {
            // The marker is part of the proper name: 富台里, 東勢村.
            if !payload.is_empty() {
                parts.village = Some(format!("{payload}{marker}"));
            }
        }
        Segment::Neighborhood => {
            let (residue, run) = split_trailing(payload, |c| c.is_ascii_digit());
            parts.neighborhood = strip_leading_zeros(&run);
            road.push_str(&residue);
        }
        Segment::Section => {
            let (residue, run) = split_trailing(payload, is_numeral_char);
            if !run.is_empty() {
                // Source-native ordinal form, marker included: 四段.
                parts.section = Some(format!("{run}段"));
            }
            road.push_str(&residue);
        }
        Segment::Lane => {
            let (residue, run) = split_trailing(payload, is_numeral_char);
            parts.lane = normalize_numeral_run(&run);
            fold_residue(residue, parts, road);
        }
        Segment::Alley => {
            let (residue, run) = split_trailing(payload, is_numeral_char);
            parts.alley = normalize_numeral_run(&run);
            fold_residue(residue, parts, road);
        }
        Segment::Number => {
            let (residue, run) = split_trailing(payload, is_number_payload_char);
            let run = run.trim_matches(|c| c == '-' || c == '之');
            if !run.is_empty() {
                parts.number = Some(run.to_string());
            }
            fold_residue(residue, parts, road);
        }
        Segment::Floor => {
            let (_, run) = split_trailing(payload, is_numeral_char);
            parts.floor = normalize_numeral_run(&run);
        }
        // Handled inline in the scan loop; 之 reads forward.
        Segment::FloorDash => {}
    }
}

/// Numeric runs are stored as clean digit strings; Chinese numerals are
/// converted, raw digits pass through unchanged.
fn normalize_numeral_run(run: &str) -> Option<String> {
    if run.is_empty() {
        return None;
    }
    numeral_to_digits(run).or_else(|| Some(run.to_string()))
}

/// Text ahead of a numeric payload is road name if none was captured
/// yet; otherwise it is dirt between segments and gets dropped onto the
/// road accumulator for forensics.
fn fold_residue(residue: String, parts: &AddressParts, road: &mut String) {
    if !residue.is_empty() && parts.road.is_none() {
        road.push_str(&residue);
    }
}
