//! The opcode scanner.
//!
//! Walks the instrument-definition text byte by byte, maintaining the
//! `<global>` → `<group>` → `<region>` inheritance chain and appending each
//! finished region to the instrument. Recoverable problems are recorded as
//! line-numbered diagnostics on the instrument and scanning resumes at the
//! next element; only an unterminated tag aborts the scan (after finalizing
//! any region still being built).

use crate::instrument::Instrument;
use crate::region::Region;

use super::values;

/// Parse definition text into `instrument`.
pub(crate) fn parse(instrument: &mut Instrument, text: &[u8]) {
    Reader::new(instrument).read(text);
}

/// Which of the three in-flight regions opcodes currently apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    None,
    Global,
    Group,
    Region,
}

struct Reader<'a> {
    instrument: &'a mut Instrument,
    line: usize,
}

impl<'a> Reader<'a> {
    fn new(instrument: &'a mut Instrument) -> Self {
        Reader {
            instrument,
            line: 1,
        }
    }

    fn read(&mut self, text: &[u8]) {
        let end = text.len();
        let mut p = 0usize;

        let mut cur_global = Region::new();
        let mut cur_group = Region::new();
        let mut cur_region = Region::new();
        let mut building = Scope::None;
        let mut in_control = false;
        let mut in_group = false;
        let mut default_path = String::new();

        'scan: while p < end {
            // Start of a line; skip indentation.
            while p < end && matches!(text[p], b' ' | b'\t') {
                p += 1;
            }
            if p >= end {
                break;
            }

            match text[p] {
                b'/' => {
                    // Comment line.
                    while p < end && !matches!(text[p], b'\r' | b'\n') {
                        p += 1;
                    }
                    if p < end {
                        p = self.line_end(text, p);
                    }
                    continue;
                }
                b'\r' | b'\n' => {
                    p = self.line_end(text, p);
                    continue;
                }
                _ => {}
            }

            // Elements on the line.
            while p < end {
                let c = text[p];
                if c == b'<' {
                    p += 1;
                    let tag_start = p;
                    let mut tag_close = None;
                    while p < end {
                        let c = text[p];
                        p += 1;
                        if matches!(c, b'\r' | b'\n') {
                            break;
                        }
                        if c == b'>' {
                            tag_close = Some(p - 1);
                            break;
                        }
                    }
                    let Some(tag_close) = tag_close else {
                        self.error("Unterminated tag");
                        break 'scan;
                    };
                    match &text[tag_start..tag_close] {
                        b"global" => {
                            cur_global.clear();
                            building = Scope::Global;
                            in_control = false;
                            in_group = false;
                        }
                        b"region" => {
                            if building == Scope::Region {
                                self.instrument.add_region(cur_region);
                            }
                            cur_region = cur_group;
                            building = Scope::Region;
                            in_control = false;
                            in_group = false;
                        }
                        b"group" => {
                            if building == Scope::Region {
                                self.instrument.add_region(cur_region);
                            }
                            // A second <group> with no <region> in between
                            // keeps accumulating into the same group state.
                            if !in_group {
                                cur_group = cur_global;
                                building = Scope::Group;
                                in_control = false;
                                in_group = true;
                            }
                        }
                        b"control" => {
                            if building == Scope::Region {
                                self.instrument.add_region(cur_region);
                            }
                            cur_group.clear();
                            building = Scope::None;
                            in_control = true;
                            in_group = false;
                        }
                        _ => self.error("Illegal tag"),
                    }
                } else if c == b'/' {
                    // Comment to end of line.
                    while p < end && !matches!(text[p], b'\r' | b'\n') {
                        p += 1;
                    }
                } else {
                    // opcode=value element.
                    let name_start = p;
                    let mut last = 0u8;
                    while p < end {
                        last = text[p];
                        p += 1;
                        if matches!(last, b'=' | b' ' | b'\t' | b'\r' | b'\n') {
                            break;
                        }
                    }
                    if p >= end || last != b'=' {
                        self.error("Malformed parameter");
                        if matches!(last, b'\r' | b'\n') {
                            // Keep the newline for the element skip below so
                            // the line count stays right.
                            p -= 1;
                        }
                    } else {
                        let opcode =
                            String::from_utf8_lossy(&text[name_start..p - 1]).into_owned();
                        if in_control {
                            if opcode == "default_path" {
                                let (path, next) = read_path(text, p);
                                p = next;
                                default_path = path;
                            } else {
                                p = skip_value(text, p);
                                self.warn_unsupported(&format!("{opcode} (in <control>)"));
                            }
                        } else if opcode == "sample" {
                            let (path, next) = read_path(text, p);
                            p = next;
                            if path.is_empty() {
                                self.error("Empty sample path");
                            } else {
                                let target = match building {
                                    Scope::Global => Some(&mut cur_global),
                                    Scope::Group => Some(&mut cur_group),
                                    Scope::Region => Some(&mut cur_region),
                                    Scope::None => None,
                                };
                                match target {
                                    Some(region) => {
                                        region.sample =
                                            Some(self.instrument.add_sample(&path, &default_path));
                                    }
                                    None => self.error("Adding sample outside a group or region"),
                                }
                            }
                        } else {
                            let value_start = p;
                            p = skip_value(text, p);
                            let value =
                                String::from_utf8_lossy(&text[value_start..p]).into_owned();
                            let target = match building {
                                Scope::Global => Some(&mut cur_global),
                                Scope::Group => Some(&mut cur_group),
                                Scope::Region => Some(&mut cur_region),
                                Scope::None => None,
                            };
                            match target {
                                Some(region) => self.apply(region, &opcode, &value),
                                None => {
                                    self.error("Setting a parameter outside a region or group")
                                }
                            }
                        }
                    }
                }

                // Skip to the next element.
                let mut c = 0u8;
                while p < end {
                    c = text[p];
                    if !matches!(c, b' ' | b'\t') {
                        break;
                    }
                    p += 1;
                }
                if matches!(c, b'\r' | b'\n') {
                    p = self.line_end(text, p);
                    break;
                }
            }
        }

        if building == Scope::Region {
            self.instrument.add_region(cur_region);
        }
    }

    /// Apply one recognized (or warn about one unrecognized) opcode to the
    /// region currently being built.
    fn apply(&mut self, region: &mut Region, opcode: &str, value: &str) {
        match opcode {
            "lokey" => region.lokey = values::key_value(value),
            "hikey" => region.hikey = values::key_value(value),
            "key" => {
                let key = values::key_value(value);
                region.lokey = key;
                region.hikey = key;
                region.pitch_keycenter = key;
            }
            "lovel" => set_i32(&mut region.lovel, value),
            "hivel" => set_i32(&mut region.hivel, value),
            "trigger" => region.trigger = values::trigger_value(value),
            "group" => set_i32(&mut region.group, value),
            "off_by" | "offby" => set_i64(&mut region.off_by, value),
            "offset" => set_i64(&mut region.offset, value),
            "end" => {
                if let Some(end) = values::parse_i64(value) {
                    if end < 0 {
                        region.negative_end = true;
                    } else {
                        region.end = end;
                    }
                }
            }
            "loop_mode" | "loopmode" => {
                let supported = matches!(value, "no_loop" | "one_shot" | "loop_continuous");
                if supported {
                    region.loop_mode = values::loop_mode_value(value);
                } else {
                    self.warn_unsupported(&format!("{opcode}={value}"));
                }
            }
            "loop_start" | "loopstart" => set_i64(&mut region.loop_start, value),
            "loop_end" | "loopend" => set_i64(&mut region.loop_end, value),
            "transpose" => set_i32(&mut region.transpose, value),
            "tune" => set_i32(&mut region.tune, value),
            "pitch_keycenter" => region.pitch_keycenter = values::key_value(value),
            "pitch_keytrack" => set_i32(&mut region.pitch_keytrack, value),
            "bend_up" | "bendup" => set_i32(&mut region.bend_up, value),
            "bend_down" | "benddown" => set_i32(&mut region.bend_down, value),
            "volume" => set_f32(&mut region.volume, value),
            "pan" => set_f32(&mut region.pan, value),
            "amp_veltrack" => set_f32(&mut region.amp_veltrack, value),
            "ampeg_delay" => set_f32(&mut region.ampeg.delay, value),
            "ampeg_start" => set_level(&mut region.ampeg.start, value),
            "ampeg_attack" => set_f32(&mut region.ampeg.attack, value),
            "ampeg_hold" => set_f32(&mut region.ampeg.hold, value),
            "ampeg_decay" => set_f32(&mut region.ampeg.decay, value),
            "ampeg_sustain" => set_level(&mut region.ampeg.sustain, value),
            "ampeg_release" => set_f32(&mut region.ampeg.release, value),
            "ampeg_vel2delay" => set_f32(&mut region.ampeg_veltrack.delay, value),
            "ampeg_vel2attack" => set_f32(&mut region.ampeg_veltrack.attack, value),
            "ampeg_vel2hold" => set_f32(&mut region.ampeg_veltrack.hold, value),
            "ampeg_vel2decay" => set_f32(&mut region.ampeg_veltrack.decay, value),
            "ampeg_vel2sustain" => set_level(&mut region.ampeg_veltrack.sustain, value),
            "ampeg_vel2release" => set_f32(&mut region.ampeg_veltrack.release, value),
            "default_path" => self.error("\"default_path\" outside of <control> tag"),
            _ => self.warn_unsupported(opcode),
        }
    }

    /// Consume a line ending; CRLF counts as a single line.
    fn line_end(&mut self, text: &[u8], at: usize) -> usize {
        let mut p = at;
        let c = text[p];
        p += 1;
        if c == b'\r' && p < text.len() && text[p] == b'\n' {
            p += 1;
        }
        self.line += 1;
        p
    }

    fn error(&mut self, message: &str) {
        self.instrument
            .add_error(format!("{message} (line {}).", self.line));
    }

    fn warn_unsupported(&mut self, opcode: &str) {
        self.instrument.add_unsupported_opcode(opcode);
    }
}

/// Scan a path value, which may contain embedded spaces.
///
/// A run of spaces is a *tentative* terminator: if what follows turns out to
/// contain `=`, the path ended at the last tentative terminator and the rest
/// is the next opcode; otherwise the spaces belonged to the path. A tab or
/// newline always ends the path.
fn read_path(text: &[u8], start: usize) -> (String, usize) {
    let end = text.len();
    let mut p = start;
    let mut potential_end = None;

    while p < end {
        let c = text[p];
        if c == b' ' {
            potential_end = Some(p);
            p += 1;
            while p < end && text[p] == b' ' {
                p += 1;
            }
        } else if matches!(c, b'\n' | b'\r' | b'\t') {
            break;
        } else if c == b'=' {
            // We've been looking at an opcode; rewind to the tentative end.
            if let Some(potential_end) = potential_end {
                p = potential_end;
            }
            break;
        }
        p += 1;
    }

    let path = if p > start {
        String::from_utf8_lossy(&text[start..p]).into_owned()
    } else {
        String::new()
    };
    (path, p)
}

fn skip_value(text: &[u8], mut p: usize) -> usize {
    while p < text.len() && !matches!(text[p], b' ' | b'\t' | b'\r' | b'\n') {
        p += 1;
    }
    p
}

fn set_i32(field: &mut i32, value: &str) {
    if let Some(v) = values::parse_i32(value) {
        *field = v;
    }
}

fn set_i64(field: &mut i64, value: &str) {
    if let Some(v) = values::parse_i64(value) {
        *field = v;
    }
}

fn set_f32(field: &mut f32, value: &str) {
    if let Some(v) = values::parse_f32(value) {
        *field = v;
    }
}

/// Percent-authored level opcodes are stored as 0–1 fractions.
fn set_level(field: &mut f32, value: &str) {
    if let Some(v) = values::parse_f32(value) {
        *field = v / 100.0;
    }
}
