//! Note dispatch and the voice pool.
//!
//! The synth receives note events from the host's control side, decides
//! which regions fire (choke groups, first/legato classing, release
//! triggers), and drives every active voice once per audio block. The voice
//! pool is pre-allocated at construction; event handling and rendering never
//! allocate, so both are safe to call from a realtime audio thread. The host
//! serializes events against rendering simply by owning the `&mut Synth`.

use std::sync::Arc;

use sordino_sfz::{Instrument, Trigger};

use crate::voice::{Voice, PITCH_WHEEL_CENTER};

const DEFAULT_NUM_VOICES: usize = 32;
const NUM_WHEEL_CHANNELS: usize = 16;

/// Polyphonic dispatch controller over a fixed voice pool.
pub struct Synth {
    instrument: Option<Arc<Instrument>>,
    voices: Vec<Voice>,
    /// Velocity last used per note, for release-triggered regions.
    note_velocities: [i32; 128],
    last_pitch_wheel: [i32; NUM_WHEEL_CHANNELS],
    note_stealing: bool,
    sample_rate: f64,
    next_serial: u64,
}

impl Synth {
    pub fn new(sample_rate: f64) -> Self {
        Synth::with_voices(sample_rate, DEFAULT_NUM_VOICES)
    }

    pub fn with_voices(sample_rate: f64, num_voices: usize) -> Self {
        Synth {
            instrument: None,
            voices: vec![Voice::new(); num_voices.max(1)],
            note_velocities: [0; 128],
            last_pitch_wheel: [PITCH_WHEEL_CENTER; NUM_WHEEL_CHANNELS],
            note_stealing: true,
            sample_rate,
            next_serial: 0,
        }
    }

    /// Hand a fully loaded instrument to the synth. Loading must be finished
    /// before this; the synth never mutates the instrument.
    pub fn set_instrument(&mut self, instrument: Arc<Instrument>) {
        log::debug!(
            "instrument set: {} regions, {} samples",
            instrument.num_regions(),
            instrument.samples().len()
        );
        self.instrument = Some(instrument);
    }

    pub fn set_note_stealing(&mut self, enabled: bool) {
        self.note_stealing = enabled;
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn num_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn num_voices_used(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// Note-on dispatch.
    ///
    /// In order: choke-group stops, same-note retrigger stops (one-shots
    /// exempt), first/legato classing, then a voice for *every* matching
    /// region — layered regions are intentional. The velocity is recorded
    /// per note for later release-trigger lookup.
    pub fn note_on(&mut self, channel: i32, note: i32, velocity: f32) {
        let Some(instrument) = self.instrument.clone() else {
            return;
        };
        if !(0..128).contains(&note) {
            return;
        }
        let midi_velocity = (velocity * 127.0) as i32;

        // Stop any currently-sounding voices in the choke group. Only the
        // first matching region is consulted for the group.
        let group = instrument
            .region_for(note, midi_velocity, Trigger::Attack)
            .map(|region| region.group)
            .unwrap_or(0);
        if group != 0 {
            for voice in &mut self.voices {
                if voice.group() == group {
                    voice.stop_note_for_group();
                }
            }
        }

        // Any other notes sounding on this channel? (Decides first vs.
        // legato.) Also cut voices still sounding this same note.
        let mut any_notes_playing = false;
        for voice in &mut self.voices {
            if voice.is_playing_channel(channel) && voice.is_playing_note_down() {
                if voice.current_note() == Some(note) {
                    if !voice.is_playing_one_shot() {
                        voice.stop_note_quick();
                    }
                } else {
                    any_notes_playing = true;
                }
            }
        }

        let trigger = if any_notes_playing {
            Trigger::Legato
        } else {
            Trigger::First
        };
        let pitch_wheel = self.last_pitch_wheel[wheel_index(channel)];

        for region_index in 0..instrument.num_regions() {
            if !instrument
                .region_at(region_index)
                .matches(note, midi_velocity, trigger)
            {
                continue;
            }
            if let Some(voice_index) = self.find_free_voice(self.note_stealing) {
                let serial = self.next_serial;
                self.next_serial += 1;
                self.voices[voice_index].start_note(
                    &instrument,
                    region_index,
                    channel,
                    note,
                    velocity,
                    pitch_wheel,
                    self.sample_rate,
                    serial,
                );
            }
        }

        self.note_velocities[note as usize] = midi_velocity;
    }

    /// Note-off dispatch: release sounding voices, then fire at most one
    /// release-triggered region using the velocity recorded at note-on.
    pub fn note_off(&mut self, channel: i32, note: i32, _velocity: f32, allow_tail_off: bool) {
        let Some(instrument) = self.instrument.clone() else {
            return;
        };
        if !(0..128).contains(&note) {
            return;
        }

        for voice in &mut self.voices {
            if voice.is_playing_channel(channel)
                && voice.is_playing_note_down()
                && voice.current_note() == Some(note)
            {
                voice.stop_note(allow_tail_off);
            }
        }

        let recorded_velocity = self.note_velocities[note as usize];
        let release_region = (0..instrument.num_regions()).find(|&i| {
            instrument
                .region_at(i)
                .matches(note, recorded_velocity, Trigger::Release)
        });
        if let Some(region_index) = release_region {
            // Release layers never steal a sounding voice.
            if let Some(voice_index) = self.find_free_voice(false) {
                let serial = self.next_serial;
                self.next_serial += 1;
                self.voices[voice_index].start_note(
                    &instrument,
                    region_index,
                    channel,
                    note,
                    recorded_velocity as f32 / 127.0,
                    self.last_pitch_wheel[wheel_index(channel)],
                    self.sample_rate,
                    serial,
                );
            }
        }
    }

    /// Pitch-wheel move: remembered per channel and applied to voices
    /// already sounding on it.
    pub fn pitch_wheel(&mut self, channel: i32, value: i32) {
        self.last_pitch_wheel[wheel_index(channel)] = value;
        for voice in &mut self.voices {
            if voice.is_playing_channel(channel) {
                voice.pitch_wheel_moved(value);
            }
        }
    }

    /// Stop every voice on `channel`; a non-positive channel stops them all.
    pub fn all_notes_off(&mut self, channel: i32, allow_tail_off: bool) {
        for voice in &mut self.voices {
            if channel <= 0 || voice.is_playing_channel(channel) {
                voice.stop_note(allow_tail_off);
            }
        }
    }

    /// Mix the next block from every active voice into the caller's output
    /// buffers. `out_right` is `None` for a mono host.
    pub fn render_next_block(&mut self, out_left: &mut [f32], mut out_right: Option<&mut [f32]>) {
        let Some(instrument) = self.instrument.clone() else {
            return;
        };
        for voice in &mut self.voices {
            if voice.is_active() {
                voice.render_next_block(&instrument, out_left, out_right.as_deref_mut());
            }
        }
    }

    /// Idle voice if one exists, else (when allowed) the voice to steal:
    /// oldest start order, ties broken by pool index, so identical event
    /// sequences always pick identical voices.
    fn find_free_voice(&self, allow_stealing: bool) -> Option<usize> {
        if let Some(index) = self.voices.iter().position(|v| v.is_free()) {
            return Some(index);
        }
        if !allow_stealing {
            return None;
        }
        self.voices
            .iter()
            .enumerate()
            .min_by_key(|(_, voice)| voice.start_serial())
            .map(|(index, _)| index)
    }
}

fn wheel_index(channel: i32) -> usize {
    channel.rem_euclid(NUM_WHEEL_CHANNELS as i32) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use sordino_sfz::{LoadError, SampleBuffer, SampleLoader};

    /// Constant-valued mono sample so output presence is easy to assert.
    struct ToneLoader {
        frames: u64,
    }

    impl SampleLoader for ToneLoader {
        fn load(&mut self, _file: &str, _default_path: &str) -> Result<SampleBuffer, LoadError> {
            Ok(SampleBuffer {
                sample_rate: 44100.0,
                frames: self.frames,
                loop_start: 0,
                loop_end: self.frames,
                channels: 1,
                data: vec![0.5; self.frames as usize],
            })
        }
    }

    fn synth_for(text: &str) -> Synth {
        synth_with_voices(text, 8)
    }

    fn synth_with_voices(text: &str, num_voices: usize) -> Synth {
        let mut inst = Instrument::new("test.sfz");
        inst.parse_text(text);
        assert!(inst.errors().is_empty(), "parse errors: {:?}", inst.errors());
        inst.load_samples(&mut ToneLoader { frames: 44100 }, None);
        let mut synth = Synth::with_voices(44100.0, num_voices);
        synth.set_instrument(Arc::new(inst));
        synth
    }

    #[test]
    fn test_all_matching_regions_layer() {
        let mut synth = synth_for(
            "<region> sample=a.wav\n\
             <region> sample=b.wav lokey=0 hikey=127",
        );
        synth.note_on(1, 60, 0.8);
        assert_eq!(synth.num_voices_used(), 2);
    }

    #[test]
    fn test_velocity_range_limits_layers() {
        let mut synth = synth_for(
            "<region> sample=a.wav lovel=0 hivel=63\n\
             <region> sample=b.wav lovel=64 hivel=127",
        );
        synth.note_on(1, 60, 1.0);
        assert_eq!(synth.num_voices_used(), 1);
    }

    #[test]
    fn test_retrigger_cuts_previous_voice() {
        let mut synth = synth_for("<region> sample=a.wav");
        synth.note_on(1, 60, 0.8);
        synth.note_on(1, 60, 0.8);
        assert_eq!(synth.num_voices_used(), 1);
    }

    #[test]
    fn test_one_shot_survives_retrigger() {
        let mut synth = synth_for("<region> sample=a.wav loop_mode=one_shot");
        synth.note_on(1, 60, 0.8);
        synth.note_on(1, 60, 0.8);
        assert_eq!(synth.num_voices_used(), 2);
    }

    #[test]
    fn test_choke_group_silences_cogrouped_voices() {
        let mut synth = synth_for(
            "<region> sample=hat.wav lokey=60 hikey=60 group=1\n\
             <region> sample=hat2.wav lokey=62 hikey=62 group=1",
        );
        synth.note_on(1, 60, 0.8);
        assert_eq!(synth.num_voices_used(), 1);
        // The second note chokes the first immediately, no release tail.
        synth.note_on(1, 62, 0.8);
        assert_eq!(synth.num_voices_used(), 1);
    }

    #[test]
    fn test_ungrouped_regions_do_not_choke() {
        let mut synth = synth_for(
            "<region> sample=a.wav lokey=60 hikey=60\n\
             <region> sample=b.wav lokey=62 hikey=62",
        );
        synth.note_on(1, 60, 0.8);
        synth.note_on(1, 62, 0.8);
        assert_eq!(synth.num_voices_used(), 2);
    }

    #[test]
    fn test_first_and_legato_triggers() {
        let mut synth = synth_for(
            "<region> sample=first.wav trigger=first\n\
             <region> sample=legato.wav trigger=legato",
        );
        // Nothing sounding: only the first-trigger region fires.
        synth.note_on(1, 60, 0.8);
        assert_eq!(synth.num_voices_used(), 1);
        // 60 still held: the next note is legato-classed.
        synth.note_on(1, 62, 0.8);
        assert_eq!(synth.num_voices_used(), 2);
        synth.note_off(1, 62, 0.0, false);
        synth.note_off(1, 60, 0.0, false);
        assert_eq!(synth.num_voices_used(), 0);
        // Phrase over: first fires again.
        synth.note_on(1, 64, 0.8);
        assert_eq!(synth.num_voices_used(), 1);
    }

    #[test]
    fn test_release_trigger_uses_recorded_velocity() {
        let mut synth = synth_for(
            "<region> sample=tone.wav\n\
             <region> sample=noise.wav trigger=release lovel=100",
        );
        synth.note_on(1, 60, 1.0);
        assert_eq!(synth.num_voices_used(), 1);
        synth.note_off(1, 60, 0.0, false);
        // Recorded velocity 127 matches lovel=100: release layer fires.
        assert_eq!(synth.num_voices_used(), 1);
        synth.all_notes_off(0, false);

        synth.note_on(1, 60, 0.3);
        synth.note_off(1, 60, 0.0, false);
        // Recorded velocity 38 misses the release region.
        assert_eq!(synth.num_voices_used(), 0);
    }

    #[test]
    fn test_note_off_releases_only_that_note_and_channel() {
        let mut synth = synth_for("<region> sample=a.wav");
        synth.note_on(1, 60, 0.8);
        synth.note_on(1, 62, 0.8);
        synth.note_on(2, 60, 0.8);
        synth.note_off(1, 60, 0.0, false);
        assert_eq!(synth.num_voices_used(), 2);
    }

    #[test]
    fn test_voice_stealing_is_oldest_first() {
        let mut synth = synth_with_voices("<region> sample=a.wav", 2);
        synth.note_on(1, 60, 0.8);
        synth.note_on(1, 62, 0.8);
        synth.note_on(1, 64, 0.8);
        assert_eq!(synth.num_voices_used(), 2);
        // The oldest voice (note 60) was stolen.
        let notes: Vec<i32> = synth
            .voices
            .iter()
            .filter_map(|v| v.current_note())
            .collect();
        assert!(notes.contains(&62));
        assert!(notes.contains(&64));
    }

    #[test]
    fn test_stealing_disabled_drops_new_note() {
        let mut synth = synth_with_voices("<region> sample=a.wav", 2);
        synth.set_note_stealing(false);
        synth.note_on(1, 60, 0.8);
        synth.note_on(1, 62, 0.8);
        synth.note_on(1, 64, 0.8);
        let notes: Vec<i32> = synth
            .voices
            .iter()
            .filter_map(|v| v.current_note())
            .collect();
        assert!(notes.contains(&60));
        assert!(notes.contains(&62));
        assert!(!notes.contains(&64));
    }

    #[test]
    fn test_render_mixes_active_voices() {
        let mut synth = synth_for("<region> sample=a.wav");
        synth.note_on(1, 60, 1.0);
        let mut left = [0.0f32; 64];
        let mut right = [0.0f32; 64];
        synth.render_next_block(&mut left, Some(&mut right));
        assert!(left.iter().any(|&s| s != 0.0));
        assert!(right.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_render_without_instrument_is_silent() {
        let mut synth = Synth::new(44100.0);
        synth.note_on(1, 60, 1.0);
        let mut left = [0.0f32; 16];
        synth.render_next_block(&mut left, None);
        assert_eq!(left, [0.0; 16]);
    }

    #[test]
    fn test_hard_note_off_frees_voices() {
        let mut synth = synth_for("<region> sample=a.wav");
        synth.note_on(1, 60, 0.8);
        synth.note_off(1, 60, 0.0, false);
        assert_eq!(synth.num_voices_used(), 0);
    }

    #[test]
    fn test_tail_off_keeps_voice_until_release_ends() {
        let mut synth = synth_for("<region> sample=a.wav ampeg_release=0.001");
        synth.note_on(1, 60, 0.8);
        synth.note_off(1, 60, 0.0, true);
        // Still releasing.
        assert_eq!(synth.num_voices_used(), 1);
        let mut left = [0.0f32; 256];
        synth.render_next_block(&mut left, None);
        // ~44 release samples have elapsed; the voice freed itself.
        assert_eq!(synth.num_voices_used(), 0);
    }

    #[test]
    fn test_out_of_range_notes_ignored() {
        let mut synth = synth_for("<region> sample=a.wav");
        synth.note_on(1, 128, 0.8);
        synth.note_on(1, -1, 0.8);
        assert_eq!(synth.num_voices_used(), 0);
    }

    #[test]
    fn test_deterministic_dispatch() {
        let run = || {
            let mut synth = synth_with_voices(
                "<region> sample=a.wav\n<region> sample=b.wav",
                3,
            );
            for i in 0..8 {
                synth.note_on(1, 60 + (i % 5), 0.5 + 0.05 * i as f32);
            }
            let mut left = vec![0.0f32; 128];
            synth.render_next_block(&mut left, None);
            let notes: Vec<Option<i32>> =
                synth.voices.iter().map(|v| v.current_note()).collect();
            (left, notes)
        };
        assert_eq!(run(), run());
    }
}
