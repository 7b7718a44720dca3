//! SFZ instrument model and parser for the sordino sampler.
//!
//! This crate covers the non-realtime half of the sampler:
//! - Parsing SFZ-style instrument definitions into an [`Instrument`]
//!   (regions with `<global>`/`<group>`/`<region>` inheritance, a
//!   deduplicated sample table, and line-numbered diagnostics).
//! - The [`Region`] matching predicate used by note dispatch.
//! - The [`SampleLoader`] seam through which a host supplies decoded audio.
//!
//! It performs no audio processing itself; the realtime rendering half lives
//! in `sordino-engine`.
//!
//! # Example
//!
//! ```no_run
//! use sordino_sfz::{Instrument, Trigger};
//!
//! let mut instrument = Instrument::new("piano.sfz");
//! instrument.load_regions();
//! for error in instrument.errors() {
//!     eprintln!("{error}");
//! }
//! let region = instrument.region_for(60, 100, Trigger::Attack);
//! ```

pub mod instrument;
pub mod parser;
pub mod region;
pub mod sample;

pub use instrument::{Instrument, LoadProgress};
pub use parser::key_value;
pub use region::{timecents_to_secs, EgParameters, LoopMode, OffMode, Region, Trigger};
pub use sample::{LoadError, Sample, SampleBuffer, SampleId, SampleLoader};
