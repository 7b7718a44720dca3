//! Per-voice amplitude envelope generator.
//!
//! A `delay → attack → hold → decay → sustain → release` state machine,
//! advanced once per output sample. All transitions are time driven; the only
//! external events are [`note_off`](Eg::note_off) (enter the release ramp)
//! and [`kill`](Eg::kill) (cut straight to idle, bypassing the release — used
//! for choke-group stops and retrigger cuts).

use sordino_sfz::{timecents_to_secs, EgParameters};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Delay,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
}

/// Envelope generator. One per voice, reset by
/// [`start_note`](Eg::start_note); never allocates.
#[derive(Debug, Clone)]
pub struct Eg {
    stage: Stage,
    level: f32,
    slope: f32,
    remaining: i64,
    sustain_level: f32,
    sample_rate: f32,
    params: EgParameters,
}

impl Eg {
    pub fn new() -> Self {
        Eg {
            stage: Stage::Idle,
            level: 0.0,
            slope: 0.0,
            remaining: 0,
            sustain_level: 1.0,
            sample_rate: 44100.0,
            params: EgParameters::default(),
        }
    }

    /// Arm the envelope for a new note.
    ///
    /// `veltrack` perturbs the base parameters before the machine starts:
    /// time fields are scaled by `2^(velocity * delta / 1200)` (additive in
    /// the time-cents domain, so a zero delta is exactly neutral), level
    /// fields move by `velocity * delta` and are clamped to 0–1.
    pub fn start_note(
        &mut self,
        params: &EgParameters,
        velocity: f32,
        sample_rate: f32,
        veltrack: &EgParameters,
    ) {
        self.params = modulate(params, velocity, veltrack);
        self.sample_rate = sample_rate;
        self.sustain_level = self.params.sustain;
        self.level = 0.0;
        self.slope = 0.0;
        self.start_delay();
    }

    /// Begin the release ramp from the current level.
    pub fn note_off(&mut self) {
        if self.stage != Stage::Idle {
            self.start_release();
        }
    }

    /// Cut to idle immediately: no release tail.
    pub fn kill(&mut self) {
        self.finish();
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Idle
    }

    pub fn is_releasing(&self) -> bool {
        self.stage == Stage::Release
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Output the current level and advance one sample.
    pub fn tick(&mut self) -> f32 {
        if self.stage == Stage::Idle {
            return 0.0;
        }
        let out = self.level;
        if self.stage == Stage::Sustain {
            return out;
        }
        self.level = (self.level + self.slope).clamp(0.0, 1.0);
        self.remaining -= 1;
        if self.remaining <= 0 {
            match self.stage {
                Stage::Delay => self.start_attack(),
                Stage::Attack => self.start_hold(),
                Stage::Hold => self.start_decay(),
                Stage::Decay => self.start_sustain(),
                Stage::Release => self.finish(),
                Stage::Sustain | Stage::Idle => {}
            }
        }
        out
    }

    fn start_delay(&mut self) {
        let samples = self.stage_samples(self.params.delay);
        if samples <= 0 {
            self.start_attack();
            return;
        }
        self.stage = Stage::Delay;
        self.level = 0.0;
        self.slope = 0.0;
        self.remaining = samples;
    }

    fn start_attack(&mut self) {
        let samples = self.stage_samples(self.params.attack);
        if samples <= 0 {
            self.start_hold();
            return;
        }
        self.stage = Stage::Attack;
        self.level = self.params.start;
        self.slope = (1.0 - self.params.start) / samples as f32;
        self.remaining = samples;
    }

    fn start_hold(&mut self) {
        let samples = self.stage_samples(self.params.hold);
        if samples <= 0 {
            self.start_decay();
            return;
        }
        self.stage = Stage::Hold;
        self.level = 1.0;
        self.slope = 0.0;
        self.remaining = samples;
    }

    fn start_decay(&mut self) {
        let samples = self.stage_samples(self.params.decay);
        if samples <= 0 {
            self.start_sustain();
            return;
        }
        self.stage = Stage::Decay;
        self.level = 1.0;
        self.slope = (self.sustain_level - 1.0) / samples as f32;
        self.remaining = samples;
    }

    fn start_sustain(&mut self) {
        self.stage = Stage::Sustain;
        self.level = self.sustain_level;
        self.slope = 0.0;
        self.remaining = i64::MAX;
    }

    fn start_release(&mut self) {
        let samples = self.stage_samples(self.params.release);
        if samples <= 0 {
            self.finish();
            return;
        }
        self.stage = Stage::Release;
        self.slope = -self.level / samples as f32;
        self.remaining = samples;
    }

    fn finish(&mut self) {
        self.stage = Stage::Idle;
        self.level = 0.0;
        self.slope = 0.0;
        self.remaining = 0;
    }

    fn stage_samples(&self, seconds: f32) -> i64 {
        if seconds <= 0.0 {
            0
        } else {
            (seconds * self.sample_rate) as i64
        }
    }
}

impl Default for Eg {
    fn default() -> Self {
        Eg::new()
    }
}

fn modulate(base: &EgParameters, velocity: f32, veltrack: &EgParameters) -> EgParameters {
    let mut params = *base;
    params.delay *= timecents_to_secs(velocity * veltrack.delay);
    params.attack *= timecents_to_secs(velocity * veltrack.attack);
    params.hold *= timecents_to_secs(velocity * veltrack.hold);
    params.decay *= timecents_to_secs(velocity * veltrack.decay);
    params.release *= timecents_to_secs(velocity * veltrack.release);
    params.start = (params.start + velocity * veltrack.start).clamp(0.0, 1.0);
    params.sustain = (params.sustain + velocity * veltrack.sustain).clamp(0.0, 1.0);
    params
}
