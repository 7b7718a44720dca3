//! The `sordino` command: a small host around the sampler crates.
//!
//! `info` parses an instrument definition and reports regions, samples, and
//! the accumulated diagnostics. `render` drives the full engine offline —
//! note-on, sustain, note-off, release tail — and writes the result to a
//! WAV file.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sordino_engine::{Synth, WavLoader};
use sordino_sfz::parser::paths;
use sordino_sfz::{key_value, Instrument};

const BLOCK_FRAMES: usize = 512;

/// sordino - SFZ sample-instrument engine
#[derive(Parser, Debug)]
#[command(name = "sordino")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "SFZ sample-instrument engine", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse an instrument and report diagnostics
    Info {
        /// Path to the instrument definition file
        #[arg(value_name = "FILE")]
        file: String,

        /// Also decode every referenced sample
        #[arg(long)]
        load_samples: bool,
    },

    /// Render a note offline and write it to a WAV file
    Render {
        /// Path to the instrument definition file
        #[arg(value_name = "FILE")]
        file: String,

        /// Output WAV path
        #[arg(short, long, default_value = "out.wav")]
        output: String,

        /// Note to play: MIDI number or note name (e.g. 60 or c4)
        #[arg(short, long, default_value = "c4")]
        note: String,

        /// MIDI velocity, 1-127
        #[arg(short, long, default_value_t = 100)]
        velocity: i32,

        /// Seconds to hold the note
        #[arg(short, long, default_value_t = 1.0)]
        duration: f64,

        /// Seconds of release tail to render after note-off
        #[arg(short, long, default_value_t = 1.0)]
        tail: f64,

        /// Output sample rate in Hz
        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::Info { file, load_samples } => info(&file, load_samples),
        Commands::Render {
            file,
            output,
            note,
            velocity,
            duration,
            tail,
            sample_rate,
        } => render(
            &file,
            &output,
            &note,
            velocity,
            duration,
            tail,
            sample_rate,
        ),
    }
}

/// Parse (and optionally load) an instrument and hand it back along with its
/// diagnostics already printed.
fn load_instrument(file: &str, load_samples: bool) -> Result<Instrument> {
    if !Path::new(file).exists() {
        bail!("no such file: {file}");
    }
    let mut instrument = Instrument::new(file);
    instrument.load_regions();

    if load_samples {
        let base_dir = match Path::new(file).parent() {
            Some(parent) => parent.to_string_lossy().into_owned(),
            None => String::new(),
        };
        let mut loader = WavLoader::with_base_dir(base_dir);
        let mut progress = |name: &str| log::info!("loaded sample '{name}'");
        instrument.load_samples(&mut loader, Some(&mut progress));
    }

    Ok(instrument)
}

fn print_diagnostics(instrument: &Instrument) {
    let name = paths::file_name_without_extension(instrument.file());
    let errors = instrument.errors();
    let warnings = instrument.warnings();

    if errors.is_empty() && warnings.is_empty() {
        println!("'{name}' loaded without errors or warnings.");
        return;
    }
    println!(
        "'{name}' loaded with {} error(s) and {} warning(s)",
        errors.len(),
        warnings.len()
    );
    if !errors.is_empty() {
        println!("Errors:");
        for error in errors {
            println!("  {error}");
        }
    }
    if !warnings.is_empty() {
        println!("Warnings:");
        for warning in warnings {
            println!("  {warning}");
        }
    }
}

fn info(file: &str, load_samples: bool) -> Result<()> {
    let instrument = load_instrument(file, load_samples)?;

    println!(
        "{}: {} region(s), {} sample file(s)",
        instrument.file(),
        instrument.num_regions(),
        instrument.samples().len()
    );
    for sample in instrument.samples() {
        let loaded = match sample.buffer() {
            Some(buffer) => format!(
                "{} Hz, {} frames, {} channel(s)",
                buffer.sample_rate, buffer.frames, buffer.channels
            ),
            None => "not loaded".to_string(),
        };
        println!("  {} ({loaded})", sample.resolved_path());
    }
    print_diagnostics(&instrument);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn render(
    file: &str,
    output: &str,
    note: &str,
    velocity: i32,
    duration: f64,
    tail: f64,
    sample_rate: u32,
) -> Result<()> {
    if !(1..=127).contains(&velocity) {
        bail!("velocity must be 1-127, got {velocity}");
    }
    let note = key_value(note);
    if !(0..128).contains(&note) {
        bail!("note out of MIDI range: {note}");
    }

    let instrument = load_instrument(file, true)?;
    print_diagnostics(&instrument);
    if instrument.num_regions() == 0 {
        bail!("instrument has no regions; nothing to render");
    }

    let mut synth = Synth::new(sample_rate as f64);
    synth.set_instrument(Arc::new(instrument));

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(output, spec).with_context(|| format!("creating {output}"))?;

    let mut left = vec![0.0f32; BLOCK_FRAMES];
    let mut right = vec![0.0f32; BLOCK_FRAMES];

    synth.note_on(1, note, velocity as f32 / 127.0);
    let held_blocks = blocks_for(duration, sample_rate);
    for _ in 0..held_blocks {
        run_block(&mut synth, &mut left, &mut right, &mut writer)?;
    }

    synth.note_off(1, note, 0.0, true);
    let tail_blocks = blocks_for(tail, sample_rate);
    for _ in 0..tail_blocks {
        run_block(&mut synth, &mut left, &mut right, &mut writer)?;
    }

    writer.finalize().context("finalizing wav")?;
    println!(
        "wrote {} ({:.2}s at {} Hz)",
        output,
        (held_blocks + tail_blocks) as f64 * BLOCK_FRAMES as f64 / sample_rate as f64,
        sample_rate
    );
    Ok(())
}

fn blocks_for(seconds: f64, sample_rate: u32) -> usize {
    ((seconds * sample_rate as f64) / BLOCK_FRAMES as f64).ceil() as usize
}

fn run_block(
    synth: &mut Synth,
    left: &mut [f32],
    right: &mut [f32],
    writer: &mut hound::WavWriter<std::io::BufWriter<std::fs::File>>,
) -> Result<()> {
    left.fill(0.0);
    right.fill(0.0);
    synth.render_next_block(left, Some(right));
    for (l, r) in left.iter().zip(right.iter()) {
        writer.write_sample(to_i16(*l)).context("writing sample")?;
        writer.write_sample(to_i16(*r)).context("writing sample")?;
    }
    Ok(())
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
