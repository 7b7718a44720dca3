//! Realtime rendering half of the sordino sampler.
//!
//! `sordino-sfz` parses instrument definitions; this crate plays them:
//! - [`Eg`] — the per-voice delay/attack/hold/decay/sustain/release
//!   envelope.
//! - [`Voice`] — one sounding note: pitch computation, interpolated sample
//!   reads, looping, envelope and gain application.
//! - [`Synth`] — note dispatch (choke groups, first/legato classing,
//!   release triggers) over a fixed pre-allocated voice pool, plus block
//!   rendering into host-owned buffers.
//! - [`WavLoader`] — a filesystem WAV implementation of the sample-loading
//!   seam for hosts that don't bring their own decoder.
//!
//! Event handling and rendering are allocation-free and expected to be
//! driven from the host's audio thread; parsing and sample loading are not,
//! and must complete before an instrument is handed to a [`Synth`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sordino_engine::{Synth, WavLoader};
//! use sordino_sfz::Instrument;
//!
//! let mut instrument = Instrument::new("piano.sfz");
//! instrument.load_regions();
//! instrument.load_samples(&mut WavLoader::new(), None);
//!
//! let mut synth = Synth::new(48000.0);
//! synth.set_instrument(Arc::new(instrument));
//! synth.note_on(1, 60, 0.8);
//!
//! let (mut left, mut right) = (vec![0.0; 512], vec![0.0; 512]);
//! synth.render_next_block(&mut left, Some(&mut right));
//! ```

pub mod envelope;
pub mod synth;
pub mod voice;
pub mod wav;

pub use envelope::Eg;
pub use synth::Synth;
pub use voice::{Voice, PITCH_WHEEL_CENTER};
pub use wav::WavLoader;
