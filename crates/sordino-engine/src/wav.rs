//! WAV-backed sample loader.
//!
//! Decodes 16/24/32-bit integer and 32-bit float WAV files into planar f32
//! buffers via `hound`. WAV `smpl` loop metadata is not exposed by the
//! decoder, so file-side loop points come back as 0/0 and the default
//! `loop_mode=sample_loop` degrades to no-loop unless a region authors its
//! own `loop_start`/`loop_end`.

use sordino_sfz::parser::paths;
use sordino_sfz::{LoadError, SampleBuffer, SampleLoader};

/// [`SampleLoader`] for WAV files on the local filesystem.
///
/// Relative sample paths are resolved against the instrument's
/// `default_path` and then against `base_dir` (normally the directory of the
/// definition file).
#[derive(Debug, Default)]
pub struct WavLoader {
    base_dir: String,
}

impl WavLoader {
    pub fn new() -> Self {
        WavLoader {
            base_dir: String::new(),
        }
    }

    /// Resolve sample paths relative to `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<String>) -> Self {
        WavLoader {
            base_dir: base_dir.into(),
        }
    }
}

impl SampleLoader for WavLoader {
    fn load(&mut self, file: &str, default_path: &str) -> Result<SampleBuffer, LoadError> {
        let resolved = paths::child_path(default_path, file);
        let full = paths::child_path(&self.base_dir, &resolved);
        log::debug!("decoding wav '{full}'");

        let mut reader = hound::WavReader::open(&full).map_err(convert_error)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as u32;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(convert_error)?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(convert_error)?
            }
        };

        let frames = (interleaved.len() / channels as usize) as u64;
        let mut data = vec![0.0f32; frames as usize * channels as usize];
        for frame in 0..frames as usize {
            for channel in 0..channels as usize {
                data[channel * frames as usize + frame] =
                    interleaved[frame * channels as usize + channel];
            }
        }

        Ok(SampleBuffer {
            sample_rate: spec.sample_rate as f64,
            frames,
            loop_start: 0,
            loop_end: 0,
            channels,
            data,
        })
    }
}

fn convert_error(err: hound::Error) -> LoadError {
    match err {
        hound::Error::IoError(e) => LoadError::Io(e),
        hound::Error::FormatError(msg) => LoadError::UnsupportedFormat(msg.to_string()),
        hound::Error::Unsupported => {
            LoadError::UnsupportedFormat("unsupported wav encoding".to_string())
        }
        other => LoadError::Decode(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &std::path::Path, spec: hound::WavSpec, frames: &[[i16; 2]]) {
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for frame in frames {
            for &sample in frame.iter().take(spec.channels as usize) {
                writer.write_sample(sample).expect("write sample");
            }
        }
        writer.finalize().expect("finalize");
    }

    #[test]
    fn test_decode_stereo_16bit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        write_wav(&path, spec, &[[16384, -16384], [8192, -8192], [0, 0]]);

        let mut loader = WavLoader::new();
        let buffer = loader
            .load(path.to_str().expect("utf-8 path"), "")
            .expect("decode");

        assert_eq!(buffer.frames, 3);
        assert_eq!(buffer.channels, 2);
        assert_eq!(buffer.sample_rate, 48000.0);
        assert!((buffer.channel(0)[0] - 0.5).abs() < 1e-4);
        assert!((buffer.channel(1)[0] + 0.5).abs() < 1e-4);
        assert!((buffer.channel(0)[1] - 0.25).abs() < 1e-4);
        assert_eq!(buffer.channel(0)[2], 0.0);
    }

    #[test]
    fn test_default_path_resolution() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("samples")).expect("mkdir");
        let path = dir.path().join("samples/kick.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        write_wav(&path, spec, &[[1000, 0]]);

        let mut loader = WavLoader::with_base_dir(dir.path().to_str().expect("utf-8"));
        let buffer = loader.load("kick.wav", "samples/").expect("decode");
        assert_eq!(buffer.frames, 1);
        assert_eq!(buffer.channels, 1);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mut loader = WavLoader::new();
        let err = loader.load("/definitely/not/here.wav", "").unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
