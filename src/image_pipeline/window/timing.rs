use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

/// Pipeline stages that are timed separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Read,
    Decode,
    Accumulate,
    Render,
    Write,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Read,
        Stage::Decode,
        Stage::Accumulate,
        Stage::Render,
        Stage::Write,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Read => "read",
            Stage::Decode => "decode",
            Stage::Accumulate => "accumulate",
            Stage::Render => "render",
            Stage::Write => "write",
        };
        f.pad(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTiming {
    pub count: usize,
    pub total: Duration,
}

/// Per-stage totals. Each thread keeps its own and they are merged when the
/// run ends, since decode work overlaps in time.
#[derive(Debug, Clone, Default)]
pub struct PipelineTimings {
    stages: [StageTiming; 5],
}

impl PipelineTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&mut self, stage: Stage, duration: Duration) {
        let timing = &mut self.stages[stage.slot()];
        timing.count += 1;
        timing.total += duration;
    }

    pub fn merge(&mut self, other: &PipelineTimings) {
        for (mine, theirs) in self.stages.iter_mut().zip(&other.stages) {
            mine.count += theirs.count;
            mine.total += theirs.total;
        }
    }

    pub fn get_step(&self, stage: Stage) -> StageTiming {
        self.stages[stage.slot()]
    }

    /// Sum over all stages. Exceeds wall time when decode workers overlap.
    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.total).sum()
    }

    pub fn log_summary(&self) {
        let total = self.total_duration();
        debug!("Pipeline timing summary:");
        for stage in Stage::ALL {
            let timing = self.get_step(stage);
            if timing.count == 0 {
                continue;
            }
            let percentage = if total.as_secs_f64() > 0.0 {
                (timing.total.as_secs_f64() / total.as_secs_f64()) * 100.0
            } else {
                0.0
            };
            debug!(
                "{:<12} {:>6}x {:>12.3}ms ({:>5.1}%)",
                stage,
                timing.count,
                timing.total.as_secs_f64() * 1000.0,
                percentage
            );
        }
        debug!("{:<12} {:>20.3}ms", "total", total.as_secs_f64() * 1000.0);
    }
}

pub struct Timer {
    start: Instant,
    stage: Stage,
}

impl Timer {
    pub fn start(stage: Stage) -> Self {
        Self {
            start: Instant::now(),
            stage,
        }
    }

    pub fn stop(self) -> (Stage, Duration) {
        (self.stage, self.start.elapsed())
    }

    /// Stops the timer and records it.
    pub fn record(self, timings: &mut PipelineTimings) {
        let (stage, duration) = self.stop();
        timings.add_step(stage, duration);
    }
}
