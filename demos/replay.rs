//! Replay recorded detections through the sampler.
//!
//! Usage:
//!     cargo run --example replay [scenario.json] [sampler_config.json]
//!
//! Example:
//!     RUST_LOG=debug cargo run --example replay demos/data/two_cameras.json
//!
//! Prints one JSON tick report per line.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::time::Instant;

use serde::Deserialize;
use vigil_track::{Detection, Detector, FrameSource, Result, Sampler, SamplerConfig};

/// Per tick, the raw detector output of every source.
#[derive(Debug, Deserialize)]
struct Scenario {
    ticks: Vec<BTreeMap<String, Vec<Detection>>>,
}

/// Frame handle: (source id, tick index).
type Frame = (String, usize);

struct RecordedDetector<'a> {
    scenario: &'a Scenario,
}

impl Detector for RecordedDetector<'_> {
    type Frame = Frame;

    fn detect(&mut self, (source, tick): &Frame) -> Result<Vec<Detection>> {
        Ok(self
            .scenario
            .ticks
            .get(*tick)
            .and_then(|sources| sources.get(source))
            .cloned()
            .unwrap_or_default())
    }
}

struct RecordedFeed<'a> {
    id: String,
    scenario: &'a Scenario,
    tick: usize,
}

impl FrameSource for RecordedFeed<'_> {
    type Frame = Frame;

    fn source_id(&self) -> &str {
        &self.id
    }

    // A source is live on ticks where it appears in the recording
    fn is_active(&self) -> bool {
        self.scenario
            .ticks
            .get(self.tick)
            .is_some_and(|sources| sources.contains_key(&self.id))
    }

    fn current_frame(&mut self) -> Option<Frame> {
        Some((self.id.clone(), self.tick))
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let scenario_path = args
        .get(1)
        .map(String::as_str)
        .unwrap_or("demos/data/two_cameras.json");
    let config = match args.get(2) {
        Some(path) => SamplerConfig::from_json_file(path)?,
        None => SamplerConfig::default(),
    };

    let scenario: Scenario = serde_json::from_str(&fs::read_to_string(scenario_path)?)?;
    let source_ids: BTreeSet<&String> = scenario.ticks.iter().flat_map(|t| t.keys()).collect();

    let mut feeds: Vec<RecordedFeed> = source_ids
        .into_iter()
        .map(|id| RecordedFeed {
            id: id.clone(),
            scenario: &scenario,
            tick: 0,
        })
        .collect();

    let mut sampler = Sampler::new(RecordedDetector { scenario: &scenario }, config)?;

    let started = Instant::now();
    for tick in 0..scenario.ticks.len() {
        for feed in feeds.iter_mut() {
            feed.tick = tick;
        }
        let report = sampler.tick(&mut feeds);
        println!("{}", serde_json::to_string(&report)?);
    }

    log::info!(
        "replayed {} ticks over {} sources in {:.2?}",
        sampler.ticks(),
        sampler.registry().len(),
        started.elapsed()
    );
    Ok(())
}
