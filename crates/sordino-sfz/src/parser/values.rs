//! Opcode value parsing.
//!
//! SFZ values are bare tokens; numeric fields use locale-independent prefix
//! parsing (a trailing junk suffix is ignored, a value with no usable prefix
//! leaves the target field untouched). Key-valued opcodes additionally accept
//! note names like `c#3` or `Ab2`.

use crate::region::{LoopMode, Trigger};

/// Semitone offsets for note names `A`..`G`, calibrated so that `A3 == 57`
/// combined with the `+9` octave bias in [`key_value`].
const NOTE_OFFSETS: [i32; 7] = [12, 14, 3, 5, 7, 8, 10];

/// Parse a key-valued opcode: either a decimal MIDI note number or a note
/// name (letter, optional `b`/`#`, octave digits).
///
/// `key_value("A3") == 57`, `key_value("C4") == 60`, `key_value("60") == 60`.
pub fn key_value(text: &str) -> i32 {
    let bytes = text.as_bytes();
    let first = bytes.first().copied().unwrap_or(0);

    if first.is_ascii_digit() {
        return parse_i32(text).unwrap_or(0);
    }

    let mut note = 0;
    let letter = first.to_ascii_uppercase();
    if (b'A'..=b'G').contains(&letter) {
        note = NOTE_OFFSETS[(letter - b'A') as usize];
    }

    let mut octave_start = 1;
    match bytes.get(1) {
        Some(b'b') => {
            octave_start += 1;
            note -= 1;
        }
        Some(b'#') => {
            octave_start += 1;
            note += 1;
        }
        _ => {}
    }

    let octave = text.get(octave_start..).and_then(parse_i32).unwrap_or(0);
    // A3 == 57.
    octave * 12 + note + (57 - 4 * 12)
}

/// `release`/`first`/`legato`; anything else is an attack trigger.
pub(crate) fn trigger_value(text: &str) -> Trigger {
    match text {
        "release" => Trigger::Release,
        "first" => Trigger::First,
        "legato" => Trigger::Legato,
        _ => Trigger::Attack,
    }
}

/// Full loop-mode token table. The scanner only routes the supported subset
/// here; `loop_sustain` is kept for completeness.
pub(crate) fn loop_mode_value(text: &str) -> LoopMode {
    match text {
        "no_loop" => LoopMode::NoLoop,
        "one_shot" => LoopMode::OneShot,
        "loop_continuous" => LoopMode::LoopContinuous,
        "loop_sustain" => LoopMode::LoopSustain,
        _ => LoopMode::SampleLoop,
    }
}

/// Leading-integer parse; `None` when no digits lead the value.
pub(crate) fn parse_i32(text: &str) -> Option<i32> {
    int_prefix(text).parse().ok()
}

pub(crate) fn parse_i64(text: &str) -> Option<i64> {
    int_prefix(text).parse().ok()
}

/// Leading-float parse; `None` when no numeric prefix exists.
pub(crate) fn parse_f32(text: &str) -> Option<f32> {
    let prefix = float_prefix(text);
    if prefix.is_empty() {
        return None;
    }
    prefix.parse().ok()
}

fn int_prefix(text: &str) -> &str {
    let bytes = text.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    &text[..i]
}

fn float_prefix(text: &str) -> &str {
    let bytes = text.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_len = i - int_start;
    let mut frac_len = 0;
    if bytes.get(i) == Some(&b'.') {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        frac_len = j - frac_start;
        if int_len + frac_len > 0 {
            i = j;
        }
    }
    if int_len + frac_len == 0 {
        return &text[..0];
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    &text[..i]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_value_numeric_passthrough() {
        assert_eq!(key_value("60"), 60);
        assert_eq!(key_value("0"), 0);
        assert_eq!(key_value("127"), 127);
    }

    #[test]
    fn test_key_value_note_names() {
        assert_eq!(key_value("A3"), 57);
        assert_eq!(key_value("a3"), 57);
        assert_eq!(key_value("C4"), 60);
        assert_eq!(key_value("c#3"), 49);
        assert_eq!(key_value("Db3"), 49);
        assert_eq!(key_value("Ab2"), 44);
        assert_eq!(key_value("A4"), 69);
    }

    #[test]
    fn test_key_value_octave_defaults_to_zero() {
        // "C" with no octave digits behaves like octave 0.
        assert_eq!(key_value("C"), 3 + 9);
    }

    #[test]
    fn test_trigger_value() {
        assert_eq!(trigger_value("release"), Trigger::Release);
        assert_eq!(trigger_value("first"), Trigger::First);
        assert_eq!(trigger_value("legato"), Trigger::Legato);
        assert_eq!(trigger_value("attack"), Trigger::Attack);
        assert_eq!(trigger_value("whatever"), Trigger::Attack);
    }

    #[test]
    fn test_loop_mode_value() {
        assert_eq!(loop_mode_value("no_loop"), LoopMode::NoLoop);
        assert_eq!(loop_mode_value("one_shot"), LoopMode::OneShot);
        assert_eq!(loop_mode_value("loop_continuous"), LoopMode::LoopContinuous);
        assert_eq!(loop_mode_value("loop_sustain"), LoopMode::LoopSustain);
        assert_eq!(loop_mode_value("bogus"), LoopMode::SampleLoop);
    }

    #[test]
    fn test_numeric_prefix_parsing() {
        assert_eq!(parse_i32("42"), Some(42));
        assert_eq!(parse_i32("-7"), Some(-7));
        assert_eq!(parse_i32("42abc"), Some(42));
        assert_eq!(parse_i32("abc"), None);
        assert_eq!(parse_i32(""), None);
        assert_eq!(parse_i64("-100"), Some(-100));
        assert_eq!(parse_f32("1.5"), Some(1.5));
        assert_eq!(parse_f32("-6.5dB"), Some(-6.5));
        assert_eq!(parse_f32(".5"), Some(0.5));
        assert_eq!(parse_f32("1e3"), Some(1000.0));
        assert_eq!(parse_f32("x1"), None);
        assert_eq!(parse_f32("."), None);
    }
}
