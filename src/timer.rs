use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Stopwatch that keeps one sample per `start`..`stop` run.
///
/// Time spent between `pause` and `resume` is not counted. Only the samples
/// are serialized; a run in progress is not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timer {
    samples: Vec<Duration>,
    #[serde(skip)]
    running_since: Option<Instant>,
    #[serde(skip)]
    elapsed: Duration,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timer holding a single sample of the given duration
    pub fn from_average(average: Duration) -> Self {
        Self {
            samples: vec![average],
            ..Self::default()
        }
    }

    pub fn start(&mut self) {
        self.elapsed = Duration::ZERO;
        self.running_since = Some(Instant::now());
    }

    pub fn pause(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.elapsed += since.elapsed();
        }
    }

    pub fn resume(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    /// End the current run and record its duration
    pub fn stop(&mut self) {
        self.pause();
        self.samples.push(self.elapsed);
        self.elapsed = Duration::ZERO;
    }

    pub fn samples(&self) -> &[Duration] {
        &self.samples
    }

    pub(crate) fn extend_samples(&mut self, samples: &[Duration]) {
        self.samples.extend_from_slice(samples);
    }

    /// Mean sample duration, zero without samples
    pub fn average_duration(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let total: u128 = self.samples.iter().map(Duration::as_nanos).sum();
        let mean = total / self.samples.len() as u128;
        // The mean never exceeds the longest sample, so the seconds fit
        Duration::new(
            (mean / NANOS_PER_SEC) as u64,
            (mean % NANOS_PER_SEC) as u32,
        )
    }

    /// Mean sample duration in microseconds
    pub fn average(&self) -> f64 {
        self.average_duration().as_nanos() as f64 / 1e3
    }
}
