//! Region model: one rule mapping a note/velocity/trigger condition to a
//! sample and its playback parameters.
//!
//! Regions are plain values. Inheritance during parsing (`<global>` →
//! `<group>` → `<region>`) works by copying the current parent state, so a
//! `Region` must stay trivially copyable: no owned resources, samples are
//! referenced through [`SampleId`](crate::sample::SampleId) handles into the
//! instrument's sample table.

use crate::sample::SampleId;

/// Which note event a region responds to.
///
/// `Attack` regions also respond to `First` and `Legato` queries, so plain
/// regions fire on both the first note of a phrase and legato follow-ups
/// without being authored specially. `First`/`Legato` regions only respond to
/// their exact trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trigger {
    #[default]
    Attack,
    Release,
    First,
    Legato,
}

/// Loop behavior for sample playback.
///
/// `SampleLoop` defers to the sample file's own loop points and is the
/// default; it resolves to `LoopContinuous` when the file carries a loop and
/// `NoLoop` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    SampleLoop,
    NoLoop,
    OneShot,
    LoopContinuous,
    LoopSustain,
}

/// Decay speed when a voice is choked by another region's group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffMode {
    #[default]
    Fast,
    Normal,
}

/// Amplitude-envelope parameters: times in seconds, `start` and `sustain` as
/// level fractions 0–1.
///
/// A second instance per region holds velocity-tracking deltas
/// (`ampeg_vel2*` opcodes); its time fields are time-cents, applied per unit
/// of normalized velocity when a voice starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EgParameters {
    pub delay: f32,
    pub start: f32,
    pub attack: f32,
    pub hold: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl EgParameters {
    /// Reset to the base-envelope defaults: all times zero, full sustain.
    pub fn clear(&mut self) {
        *self = EgParameters {
            delay: 0.0,
            start: 0.0,
            attack: 0.0,
            hold: 0.0,
            decay: 0.0,
            sustain: 1.0,
            release: 0.0,
        };
    }

    /// Reset to the veltrack defaults: everything zero (no modulation).
    pub fn clear_mod(&mut self) {
        *self = EgParameters {
            delay: 0.0,
            start: 0.0,
            attack: 0.0,
            hold: 0.0,
            decay: 0.0,
            sustain: 0.0,
            release: 0.0,
        };
    }
}

impl Default for EgParameters {
    fn default() -> Self {
        let mut eg = EgParameters {
            delay: 0.0,
            start: 0.0,
            attack: 0.0,
            hold: 0.0,
            decay: 0.0,
            sustain: 0.0,
            release: 0.0,
        };
        eg.clear();
        eg
    }
}

/// Convert time-cents to seconds: 1200 time-cents double the duration.
///
/// Total over all finite inputs; `timecents_to_secs(0.0) == 1.0` and
/// `timecents_to_secs(1200.0) == 2.0` exactly.
pub fn timecents_to_secs(timecents: f32) -> f32 {
    (timecents / 1200.0).exp2()
}

/// One region of an instrument.
///
/// Built up incrementally while parsing and copied into the instrument's
/// region list when the parser moves past it. Field defaults are the
/// [`clear`](Region::clear) values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub sample: Option<SampleId>,
    pub lokey: i32,
    pub hikey: i32,
    pub lovel: i32,
    pub hivel: i32,
    pub trigger: Trigger,
    /// Non-zero choke-group id.
    pub group: i32,
    /// Group whose sounding voices this region silences when it fires.
    pub off_by: i64,
    pub off_mode: OffMode,

    /// Playback start offset in frames.
    pub offset: i64,
    /// Playback end frame; 0 means the whole file.
    pub end: i64,
    /// A negative `end=` opcode disables the region instead of truncating it.
    pub negative_end: bool,
    pub loop_mode: LoopMode,
    pub loop_start: i64,
    pub loop_end: i64,

    /// Transposition in semitones.
    pub transpose: i32,
    /// Fine tuning in cents.
    pub tune: i32,
    pub pitch_keycenter: i32,
    /// Pitch tracking in percent; 100 plays one semitone per key.
    pub pitch_keytrack: i32,
    /// Pitch-wheel range up, in cents.
    pub bend_up: i32,
    /// Pitch-wheel range down, in cents (negative).
    pub bend_down: i32,

    /// Volume in dB.
    pub volume: f32,
    /// Pan, -100 (left) to 100 (right).
    pub pan: f32,
    /// Velocity sensitivity of amplitude, in percent.
    pub amp_veltrack: f32,

    pub ampeg: EgParameters,
    pub ampeg_veltrack: EgParameters,
}

impl Region {
    pub fn new() -> Self {
        let mut region = Region {
            sample: None,
            lokey: 0,
            hikey: 0,
            lovel: 0,
            hivel: 0,
            trigger: Trigger::Attack,
            group: 0,
            off_by: 0,
            off_mode: OffMode::Fast,
            offset: 0,
            end: 0,
            negative_end: false,
            loop_mode: LoopMode::SampleLoop,
            loop_start: 0,
            loop_end: 0,
            transpose: 0,
            tune: 0,
            pitch_keycenter: 0,
            pitch_keytrack: 0,
            bend_up: 0,
            bend_down: 0,
            volume: 0.0,
            pan: 0.0,
            amp_veltrack: 0.0,
            ampeg: EgParameters::default(),
            ampeg_veltrack: EgParameters::default(),
        };
        region.clear();
        region
    }

    /// Reset every field to its documented default.
    pub fn clear(&mut self) {
        self.sample = None;
        self.lokey = 0;
        self.hikey = 127;
        self.lovel = 0;
        self.hivel = 127;
        self.trigger = Trigger::Attack;
        self.group = 0;
        self.off_by = 0;
        self.off_mode = OffMode::Fast;
        self.offset = 0;
        self.end = 0;
        self.negative_end = false;
        self.loop_mode = LoopMode::SampleLoop;
        self.loop_start = 0;
        self.loop_end = 0;
        self.transpose = 0;
        self.tune = 0;
        self.pitch_keycenter = 60;
        self.pitch_keytrack = 100;
        self.bend_up = 200;
        self.bend_down = -200;
        self.volume = 0.0;
        self.pan = 0.0;
        self.amp_veltrack = 100.0;
        self.ampeg.clear();
        self.ampeg_veltrack.clear_mod();
    }

    /// True iff `note` and `velocity` fall in the region's inclusive ranges
    /// and the trigger class applies.
    pub fn matches(&self, note: i32, velocity: i32, trigger: Trigger) -> bool {
        note >= self.lokey
            && note <= self.hikey
            && velocity >= self.lovel
            && velocity <= self.hivel
            && (trigger == self.trigger
                || (self.trigger == Trigger::Attack
                    && (trigger == Trigger::First || trigger == Trigger::Legato)))
    }
}

impl Default for Region {
    fn default() -> Self {
        Region::new()
    }
}
