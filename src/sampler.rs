//! Fixed-cadence detection sampling that drives the tracker.
//!
//! Each tick visits every source once: sources that are paused or have no
//! decoded frame yet are skipped, the rest go through the detector, the
//! class/confidence filter and then the tracker. An active source with a
//! frame is always passed to the tracker, even when nothing was detected,
//! so that track aging follows the tick rate.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::detection::{Detection, DetectionFilter, TrackedDetection};
use crate::registry::TrackerRegistry;
use crate::tracker::TrackerConfig;
use crate::{BoundingBox, Error, Result};

/// Object detector producing per-frame detections.
pub trait Detector {
    type Frame;

    /// Run detection on one decoded frame.
    fn detect(&mut self, frame: &Self::Frame) -> Result<Vec<Detection>>;
}

/// A video feed that can be sampled.
pub trait FrameSource {
    type Frame;

    /// Stable identifier of this feed.
    fn source_id(&self) -> &str;

    /// False while the feed is paused.
    fn is_active(&self) -> bool {
        true
    }

    /// The current decoded frame, or `None` if no frame with valid
    /// dimensions is available yet.
    fn current_frame(&mut self) -> Option<Self::Frame>;
}

/// Configuration for the sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Wall-clock period between ticks.
    #[serde(rename = "period_ms", with = "duration_ms")]
    pub period: Duration,

    /// Only detections of this class are tracked.
    pub target_class: String,

    /// Detections must score strictly above this to be tracked.
    pub min_confidence: f64,

    pub tracker: TrackerConfig,
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.period.is_zero() {
            return Err(Error::InvalidConfig("period must be non-zero".to_string()));
        }
        if self.target_class.is_empty() {
            return Err(Error::InvalidConfig("target_class must not be empty".to_string()));
        }
        if !(0.0..1.0).contains(&self.min_confidence) {
            return Err(Error::InvalidConfig(format!(
                "min_confidence must be in [0, 1), got {}",
                self.min_confidence
            )));
        }
        self.tracker.validate()
    }

    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            Error::IoError(std::io::Error::new(
                e.kind(),
                format!("failed to read sampler config '{}': {}", path.as_ref().display(), e),
            ))
        })?;
        Self::from_json_str(&content)
    }

    pub(crate) fn detection_filter(&self) -> DetectionFilter {
        DetectionFilter::new(self.target_class.clone(), self.min_confidence)
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(100),
            target_class: "person".to_string(),
            min_confidence: 0.1,
            tracker: TrackerConfig::default(),
        }
    }
}

mod duration_ms {
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(d.as_millis()).map_err(S::Error::custom)?;
        s.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Identified detections of one source for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub source_id: String,
    pub detections: Vec<TrackedDetection>,
}

/// Outcome of one sampler tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    /// Tick counter, starting at 1.
    pub tick: u64,

    /// Sources whose detections went through the tracker this tick.
    pub sources: Vec<SourceReport>,

    /// Sources skipped this tick (paused or no frame). Their tracks do not age.
    pub skipped: Vec<String>,

    /// Sources whose detector failed this tick. Their tracks still age.
    pub failed: Vec<String>,
}

impl TickReport {
    /// Whether any processed source had at least one tracked detection.
    pub fn any_detected(&self) -> bool {
        self.sources.iter().any(|s| !s.detections.is_empty())
    }

    pub fn source(&self, source_id: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source_id == source_id)
    }
}

/// Drives a [`Detector`] over a set of sources at a fixed cadence and feeds
/// the filtered boxes to a [`TrackerRegistry`].
pub struct Sampler<D: Detector> {
    config: SamplerConfig,
    filter: DetectionFilter,
    detector: D,
    registry: TrackerRegistry<String>,
    ticks: u64,
}

impl<D: Detector> Sampler<D> {
    pub fn new(detector: D, config: SamplerConfig) -> Result<Self> {
        config.validate()?;
        let registry = TrackerRegistry::new(config.tracker.clone())?;
        Ok(Self {
            filter: config.detection_filter(),
            config,
            detector,
            registry,
            ticks: 0,
        })
    }

    /// Run one sampling pass over `sources`.
    ///
    /// Tracker state is kept for every source ever processed, including
    /// sources later left out of `sources`. Call
    /// [`registry_mut`](Self::registry_mut)`().remove(id)` when a feed closes.
    pub fn tick<S>(&mut self, sources: &mut [S]) -> TickReport
    where
        S: FrameSource<Frame = D::Frame>,
    {
        self.ticks += 1;
        let mut report = TickReport {
            tick: self.ticks,
            ..TickReport::default()
        };

        for source in sources.iter_mut() {
            let source_id = source.source_id().to_string();

            if !source.is_active() {
                report.skipped.push(source_id);
                continue;
            }
            let Some(frame) = source.current_frame() else {
                report.skipped.push(source_id);
                continue;
            };

            let detections = match self.detector.detect(&frame) {
                Ok(detections) => self.filter.apply(detections),
                Err(e) => {
                    warn!("detector failed on source {}: {}", source_id, e);
                    // The source is live, so its tracks keep aging
                    self.registry.assign(source_id.as_str(), &[]);
                    report.failed.push(source_id);
                    continue;
                }
            };

            let boxes: Vec<BoundingBox> = detections.iter().map(|d| d.bbox).collect();
            let ids = self.registry.assign(source_id.as_str(), &boxes);
            report.sources.push(SourceReport {
                source_id,
                detections: TrackedDetection::pair(detections, &ids),
            });
        }

        debug!(
            "tick {}: {} sources processed, {} skipped, {} failed",
            report.tick,
            report.sources.len(),
            report.skipped.len(),
            report.failed.len()
        );
        report
    }

    /// Tick at the configured period on the calling thread until `stop` is set.
    ///
    /// Each tick completes before the next starts. `on_tick` receives every
    /// report and may set `stop` itself. As with [`tick`](Self::tick), states
    /// of sources dropped from `sources` stay in the registry until removed.
    pub fn run<S, F>(&mut self, sources: &mut [S], stop: &AtomicBool, mut on_tick: F)
    where
        S: FrameSource<Frame = D::Frame>,
        F: FnMut(&TickReport),
    {
        while !stop.load(Ordering::Acquire) {
            let started = Instant::now();
            let report = self.tick(sources);
            on_tick(&report);

            if stop.load(Ordering::Acquire) {
                break;
            }
            match self.config.period.checked_sub(started.elapsed()) {
                Some(remaining) => thread::sleep(remaining),
                None => debug!("tick {} overran the sampling period", report.tick),
            }
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn registry(&self) -> &TrackerRegistry<String> {
        &self.registry
    }

    /// Mutable access, e.g. to drop the state of a closed feed.
    pub fn registry_mut(&mut self) -> &mut TrackerRegistry<String> {
        &mut self.registry
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    /// Number of ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
