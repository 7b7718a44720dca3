//! Sample references and the decoded-audio collaborator seam.
//!
//! The instrument owns its samples; regions and voices refer to them through
//! [`SampleId`] handles. Decoding the audio files themselves is delegated to
//! a [`SampleLoader`] supplied by the host.

use std::io;

use thiserror::Error;

use crate::parser::paths;

/// Failure to decode a sample file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// The file was readable but not a format the loader handles.
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Stable handle to a sample in an instrument's sample table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleId(pub(crate) usize);

/// Decoded PCM audio, planar: channel `c` occupies
/// `data[c * frames .. (c + 1) * frames]`.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    pub sample_rate: f64,
    pub frames: u64,
    /// Loop points carried by the sample file itself; both zero when the
    /// file has none.
    pub loop_start: u64,
    pub loop_end: u64,
    pub channels: u32,
    pub data: Vec<f32>,
}

impl SampleBuffer {
    pub fn channel(&self, channel: u32) -> &[f32] {
        let start = channel as usize * self.frames as usize;
        &self.data[start..start + self.frames as usize]
    }
}

/// Pluggable sample decoder.
///
/// The engine hands over the sample path and the instrument's effective
/// `default_path`; the loader resolves them (see
/// [`paths::child_path`](crate::parser::paths::child_path)) and returns the
/// decoded buffer.
pub trait SampleLoader {
    fn load(&mut self, file: &str, default_path: &str) -> Result<SampleBuffer, LoadError>;
}

/// One sample file referenced by an instrument.
///
/// Holds nothing but the path pair until
/// [`Instrument::load_samples`](crate::instrument::Instrument::load_samples)
/// decodes it. A sample whose decode failed keeps `buffer() == None` and
/// renders as silence.
#[derive(Debug)]
pub struct Sample {
    file: String,
    default_path: String,
    buffer: Option<SampleBuffer>,
}

impl Sample {
    pub(crate) fn new(file: &str, default_path: &str) -> Self {
        Sample {
            file: file.to_string(),
            default_path: default_path.to_string(),
            buffer: None,
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn default_path(&self) -> &str {
        &self.default_path
    }

    /// The default path joined with the file path.
    pub fn resolved_path(&self) -> String {
        paths::child_path(&self.default_path, &self.file)
    }

    /// Final path component, used in diagnostics.
    pub fn short_name(&self) -> String {
        paths::file_name(&self.file)
    }

    pub fn buffer(&self) -> Option<&SampleBuffer> {
        self.buffer.as_ref()
    }

    pub(crate) fn load(&mut self, loader: &mut dyn SampleLoader) -> Result<(), LoadError> {
        let buffer = loader.load(&self.file, &self.default_path)?;
        self.buffer = Some(buffer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_channel_access() {
        let buffer = SampleBuffer {
            sample_rate: 44100.0,
            frames: 3,
            loop_start: 0,
            loop_end: 0,
            channels: 2,
            data: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        };
        assert_eq!(buffer.channel(0), &[1.0, 2.0, 3.0]);
        assert_eq!(buffer.channel(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_short_name_strips_directories() {
        let sample = Sample::new("48khz24bit\\A0v1.wav", "samples");
        assert_eq!(sample.short_name(), "A0v1.wav");
        let sample = Sample::new("kick.wav", "");
        assert_eq!(sample.short_name(), "kick.wav");
    }

    #[test]
    fn test_resolved_path_joins_default_path() {
        let sample = Sample::new("piano/C4.wav", "samples");
        assert_eq!(sample.resolved_path(), "samples/piano/C4.wav");
        let sample = Sample::new("C4.wav", "");
        assert_eq!(sample.resolved_path(), "C4.wav");
    }
}
