//! One sounding note.
//!
//! A voice binds a region (copied by value — regions are plain data) plus a
//! handle to its sample buffer, and renders blocks by advancing a fractional
//! read position at the computed pitch ratio with linear interpolation,
//! multiplying in the envelope and the per-region gain/pan. Voices live in
//! the synth's fixed pool and are recycled; nothing here allocates.

use sordino_sfz::{Instrument, LoopMode, Region};

use crate::envelope::Eg;

/// Resting pitch-wheel position (14-bit MIDI center).
pub const PITCH_WHEEL_CENTER: i32 = 8192;

/// Gain floor used for a zero-velocity note.
const SILENCE_DB: f32 = -160.0;

fn note_hz(note: f64) -> f64 {
    440.0 * ((note - 69.0) / 12.0).exp2()
}

fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db * 0.05)
}

/// Per-note rendering state, recycled through the synth's voice pool.
#[derive(Debug, Clone)]
pub struct Voice {
    region: Option<Region>,
    channel: i32,
    note: i32,
    note_down: bool,
    one_shot: bool,
    velocity: i32,
    pitch_wheel: i32,
    pitch_ratio: f64,
    gain_left: f32,
    gain_right: f32,
    source_position: f64,
    sample_end: f64,
    loop_start: f64,
    loop_end: f64,
    looping: bool,
    num_loops: u64,
    source_sample_rate: f64,
    output_sample_rate: f64,
    start_serial: u64,
    ampeg: Eg,
}

impl Voice {
    pub fn new() -> Self {
        Voice {
            region: None,
            channel: 0,
            note: -1,
            note_down: false,
            one_shot: false,
            velocity: 0,
            pitch_wheel: PITCH_WHEEL_CENTER,
            pitch_ratio: 1.0,
            gain_left: 0.0,
            gain_right: 0.0,
            source_position: 0.0,
            sample_end: 0.0,
            loop_start: 0.0,
            loop_end: 0.0,
            looping: false,
            num_loops: 0,
            source_sample_rate: 44100.0,
            output_sample_rate: 44100.0,
            start_serial: 0,
            ampeg: Eg::new(),
        }
    }

    /// Bind `region_index` of `instrument` and start sounding.
    ///
    /// A region whose sample never decoded starts nothing: the voice stays
    /// free and the note is guaranteed silent.
    #[allow(clippy::too_many_arguments)]
    pub fn start_note(
        &mut self,
        instrument: &Instrument,
        region_index: usize,
        channel: i32,
        note: i32,
        velocity: f32,
        pitch_wheel: i32,
        output_sample_rate: f64,
        serial: u64,
    ) {
        let region = *instrument.region_at(region_index);
        let buffer = region
            .sample
            .and_then(|id| instrument.sample(id).buffer());
        let Some(buffer) = buffer else {
            log::debug!("note {note} matched a region without audio; staying silent");
            self.kill_note();
            return;
        };

        self.channel = channel;
        self.note = note;
        self.note_down = true;
        self.velocity = (velocity * 127.0) as i32;
        self.pitch_wheel = pitch_wheel;
        self.output_sample_rate = output_sample_rate;
        self.source_sample_rate = buffer.sample_rate;
        self.one_shot = region.loop_mode == LoopMode::OneShot;
        self.start_serial = serial;
        self.num_loops = 0;

        // Volume, velocity curve, and pan resolve to one gain per channel.
        let mut note_gain_db = region.volume;
        let velocity_gain_db = if self.velocity > 0 {
            40.0 * (self.velocity as f32 / 127.0).log10()
        } else {
            SILENCE_DB
        };
        note_gain_db += velocity_gain_db * region.amp_veltrack / 100.0;
        let gain = db_to_gain(note_gain_db);
        let pan = (region.pan / 100.0).clamp(-1.0, 1.0);
        self.gain_left = gain * (0.5 * (1.0 - pan)).sqrt();
        self.gain_right = gain * (0.5 * (1.0 + pan)).sqrt();

        self.source_position = region.offset.max(0) as f64;
        let mut sample_end = buffer.frames as i64;
        if region.end > 0 && region.end < sample_end {
            sample_end = region.end + 1;
        }
        self.sample_end = sample_end as f64;

        // sample_loop defers to the file's loop points.
        let mut loop_mode = region.loop_mode;
        if loop_mode == LoopMode::SampleLoop {
            loop_mode = if buffer.loop_start < buffer.loop_end {
                LoopMode::LoopContinuous
            } else {
                LoopMode::NoLoop
            };
        }
        self.loop_start = 0.0;
        self.loop_end = 0.0;
        self.looping = matches!(loop_mode, LoopMode::LoopContinuous | LoopMode::LoopSustain);
        if self.looping {
            if region.loop_start < region.loop_end {
                self.loop_start = region.loop_start as f64;
                self.loop_end = region.loop_end as f64;
            } else {
                self.loop_start = buffer.loop_start as f64;
                self.loop_end = buffer.loop_end as f64;
            }
            if self.loop_start >= self.loop_end {
                self.looping = false;
            }
        }

        self.region = Some(region);
        self.calc_pitch_ratio();
        self.ampeg.start_note(
            &region.ampeg,
            velocity,
            output_sample_rate as f32,
            &region.ampeg_veltrack,
        );
    }

    /// Mix this voice's next `out_left.len()` frames into the output.
    ///
    /// Mono sources feed both output channels; with a mono output buffer a
    /// stereo source is averaged down.
    pub fn render_next_block(
        &mut self,
        instrument: &Instrument,
        out_left: &mut [f32],
        mut out_right: Option<&mut [f32]>,
    ) {
        let Some(region) = self.region else { return };
        let Some(buffer) = region.sample.and_then(|id| instrument.sample(id).buffer()) else {
            self.kill_note();
            return;
        };

        let in_left = buffer.channel(0);
        let in_right = if buffer.channels > 1 {
            Some(buffer.channel(1))
        } else {
            None
        };
        let loop_span = self.loop_end - self.loop_start;

        for i in 0..out_left.len() {
            if self.source_position >= self.sample_end || self.ampeg.is_done() {
                self.kill_note();
                break;
            }

            let pos = self.source_position as usize;
            let alpha = (self.source_position - pos as f64) as f32;
            let next = if pos + 1 < buffer.frames as usize {
                pos + 1
            } else {
                pos
            };

            let env = self.ampeg.tick();
            let left = in_left[pos] * (1.0 - alpha) + in_left[next] * alpha;
            let right = match in_right {
                Some(in_right) => in_right[pos] * (1.0 - alpha) + in_right[next] * alpha,
                None => left,
            };
            let left = left * env * self.gain_left;
            let right = right * env * self.gain_right;

            match out_right.as_deref_mut() {
                Some(out_right) => {
                    out_left[i] += left;
                    out_right[i] += right;
                }
                None => out_left[i] += 0.5 * (left + right),
            }

            self.source_position += self.pitch_ratio;
            if self.looping && self.source_position > self.loop_end {
                while self.source_position > self.loop_end {
                    self.source_position -= loop_span;
                }
                self.num_loops += 1;
            }
        }
    }

    /// Release the note. One-shot voices ignore the tail-off and keep
    /// playing to the end of their sample.
    pub fn stop_note(&mut self, allow_tail_off: bool) {
        if !allow_tail_off || self.region.is_none() {
            self.kill_note();
            return;
        }
        if self.region.map(|r| r.loop_mode) != Some(LoopMode::OneShot) {
            self.ampeg.note_off();
        }
        self.note_down = false;
    }

    /// Choked by another region in the same group: cut, no tail.
    pub fn stop_note_for_group(&mut self) {
        self.kill_note();
    }

    /// Retriggered while still sounding: cut, no tail.
    pub fn stop_note_quick(&mut self) {
        self.kill_note();
    }

    pub fn pitch_wheel_moved(&mut self, value: i32) {
        self.pitch_wheel = value;
        if self.region.is_some() {
            self.calc_pitch_ratio();
        }
    }

    pub fn is_free(&self) -> bool {
        self.region.is_none()
    }

    pub fn is_active(&self) -> bool {
        self.region.is_some()
    }

    pub fn is_playing_channel(&self, channel: i32) -> bool {
        self.region.is_some() && self.channel == channel
    }

    pub fn is_playing_note_down(&self) -> bool {
        self.region.is_some() && self.note_down
    }

    pub fn is_playing_one_shot(&self) -> bool {
        self.region.is_some() && self.one_shot
    }

    pub fn current_note(&self) -> Option<i32> {
        self.region.map(|_| self.note)
    }

    /// Choke group of the sounding region; 0 when free or ungrouped.
    pub fn group(&self) -> i32 {
        self.region.map(|r| r.group).unwrap_or(0)
    }

    pub fn off_by(&self) -> i64 {
        self.region.map(|r| r.off_by).unwrap_or(0)
    }

    /// Completed loop passes, for diagnostics.
    pub fn num_loops(&self) -> u64 {
        self.num_loops
    }

    pub(crate) fn start_serial(&self) -> u64 {
        self.start_serial
    }

    fn kill_note(&mut self) {
        self.region = None;
        self.note_down = false;
        self.ampeg.kill();
    }

    fn calc_pitch_ratio(&mut self) {
        let Some(region) = &self.region else { return };
        let note = self.note as f64 + region.transpose as f64 + region.tune as f64 / 100.0;
        let keycenter = region.pitch_keycenter as f64;
        let mut adjusted = keycenter + (note - keycenter) * (region.pitch_keytrack as f64 / 100.0);
        if self.pitch_wheel != PITCH_WHEEL_CENTER {
            let wheel = 2.0 * self.pitch_wheel as f64 / 16383.0 - 1.0;
            adjusted += if wheel > 0.0 {
                wheel * region.bend_up as f64 / 100.0
            } else {
                wheel * region.bend_down as f64 / -100.0
            };
        }
        self.pitch_ratio = (note_hz(adjusted) * self.source_sample_rate)
            / (note_hz(keycenter) * self.output_sample_rate);
    }
}

impl Default for Voice {
    fn default() -> Self {
        Voice::new()
    }
}
