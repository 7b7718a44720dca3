//! The instrument: regions, the sample table, and accumulated diagnostics.

use std::collections::{HashMap, HashSet};
use std::fs;

use crate::parser::{self, paths};
use crate::region::{Region, Trigger};
use crate::sample::{Sample, SampleId, SampleLoader};

/// Invoked once per successfully decoded sample with its short name.
pub type LoadProgress<'a> = &'a mut dyn FnMut(&str);

/// A parsed instrument definition.
///
/// Created once per definition file: [`load_regions`](Instrument::load_regions)
/// (or [`parse_text`](Instrument::parse_text)) populates the region list and
/// sample table, [`load_samples`](Instrument::load_samples) decodes the audio.
/// After that the instrument is immutable apart from diagnostics, and can be
/// shared with the rendering side.
///
/// Errors and warnings are pulled by the caller; no loading step panics or
/// returns early on recoverable problems.
#[derive(Debug, Default)]
pub struct Instrument {
    file: String,
    regions: Vec<Region>,
    samples: Vec<Sample>,
    sample_index: HashMap<String, SampleId>,
    errors: Vec<String>,
    warnings: Vec<String>,
    unsupported_opcodes: HashSet<String>,
}

impl Instrument {
    pub fn new(file: impl Into<String>) -> Self {
        Instrument {
            file: file.into(),
            ..Default::default()
        }
    }

    /// Path of the definition file this instrument was created for.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Read the definition file and parse it.
    ///
    /// An unreadable file is recorded as an error; the instrument stays
    /// usable (and empty).
    pub fn load_regions(&mut self) {
        match fs::read(&self.file) {
            Ok(contents) => parser::parse(self, &contents),
            Err(_) => {
                let message = format!("Couldn't read \"{}\"", self.file);
                log::warn!("{message}");
                self.add_error(message);
            }
        }
    }

    /// Parse definition text supplied by the caller instead of a file.
    pub fn parse_text(&mut self, text: &str) {
        parser::parse(self, text.as_bytes());
    }

    /// Decode every referenced sample through `loader`.
    ///
    /// A failed decode is recorded as an error naming the sample's short
    /// name; the sample stays unloaded and any region bound to it renders as
    /// silence. `progress` fires once per successful decode, synchronously.
    pub fn load_samples(
        &mut self,
        loader: &mut dyn SampleLoader,
        mut progress: Option<LoadProgress>,
    ) {
        for i in 0..self.samples.len() {
            let short_name = self.samples[i].short_name();
            match self.samples[i].load(loader) {
                Ok(()) => {
                    log::debug!("loaded sample '{short_name}'");
                    if let Some(callback) = progress.as_mut() {
                        callback(&short_name);
                    }
                }
                Err(err) => {
                    log::warn!("failed to load sample '{short_name}': {err}");
                    self.add_error(format!("Couldn't load sample \"{short_name}\""));
                }
            }
        }
    }

    /// Append a finished region. Insertion order is matching priority order.
    pub fn add_region(&mut self, region: Region) {
        self.regions.push(region);
    }

    /// Register a sample reference, deduplicating on the resolved path.
    pub fn add_sample(&mut self, path: &str, default_path: &str) -> SampleId {
        let key = paths::child_path(default_path, path);
        if let Some(&id) = self.sample_index.get(&key) {
            return id;
        }
        let id = SampleId(self.samples.len());
        self.samples.push(Sample::new(path, default_path));
        self.sample_index.insert(key, id);
        id
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Record an unsupported opcode. Each distinct name is warned once;
    /// repeats are accepted silently.
    pub fn add_unsupported_opcode(&mut self, opcode: &str) {
        if self.unsupported_opcodes.insert(opcode.to_string()) {
            self.warnings.push(format!("unsupported opcode: {opcode}"));
        }
    }

    /// First region (in priority order) matching the query, if any.
    pub fn region_for(&self, note: i32, velocity: i32, trigger: Trigger) -> Option<&Region> {
        self.regions
            .iter()
            .find(|region| region.matches(note, velocity, trigger))
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn num_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn region_at(&self, index: usize) -> &Region {
        &self.regions[index]
    }

    pub fn sample(&self, id: SampleId) -> &Sample {
        &self.samples[id.0]
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
