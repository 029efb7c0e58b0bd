//! Window scheduling
//!
//! Decides, per clip frame, which jobs the controller submits and which of
//! them finishes a window.

/// What a job does to the running sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Add,
    Subtract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSpec {
    /// Clip frame the job reads
    pub frame_index: usize,
    pub kind: JobKind,
    /// Set when the running sum holds a full window once this job is applied
    pub output_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    frame_count: usize,
    output_delay: usize,
}

impl WindowPlan {
    /// `window_size` is clamped to the clip length. Single-shot runs use the
    /// whole clip as one window.
    pub fn new(frame_count: usize, window_size: usize, single: bool) -> Self {
        let output_delay = if single {
            frame_count
        } else {
            window_size.min(frame_count)
        };
        Self {
            frame_count,
            output_delay,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Frames in every emitted window.
    pub fn output_delay(&self) -> usize {
        self.output_delay
    }

    pub fn output_count(&self) -> usize {
        if self.frame_count == 0 {
            0
        } else {
            self.frame_count + 1 - self.output_delay
        }
    }

    /// Jobs for clip frame `frame_index`, in submission order: the frame
    /// leaving the window first, then the frame entering it.
    pub fn jobs_for(&self, frame_index: usize) -> Vec<JobSpec> {
        let mut jobs = Vec::with_capacity(2);
        if frame_index >= self.frame_count {
            return jobs;
        }
        if frame_index >= self.output_delay {
            jobs.push(JobSpec {
                frame_index: frame_index - self.output_delay,
                kind: JobKind::Subtract,
                output_index: None,
            });
        }
        let output_due = frame_index + 1 >= self.output_delay;
        jobs.push(JobSpec {
            frame_index,
            kind: JobKind::Add,
            output_index: output_due.then(|| frame_index + 1 - self.output_delay),
        });
        jobs
    }

    /// Every job of the run in submission order.
    pub fn jobs(&self) -> impl Iterator<Item = JobSpec> + '_ {
        (0..self.frame_count).flat_map(|i| self.jobs_for(i))
    }
}
