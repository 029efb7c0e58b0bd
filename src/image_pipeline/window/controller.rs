//! Sliding-window controller.
//!
//! The calling thread walks the clip and submits reads, bounded by
//! [`JobPermits`]. A pool of decode workers turns read tokens into frames and
//! one accumulation thread applies the decoded frames strictly in submission
//! order, rendering and writing an output whenever a job completes a window.
//! A job's permit is released only after its output, if any, is written.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::thread;

use tracing::{debug, error, info, info_span, instrument, warn};

use crate::image_pipeline::common::error::{Result, StackError};
use crate::image_pipeline::frame::Frame;
use crate::image_pipeline::sink::{
    DisplayEncoder, DisplayFormat, FileSink, JpegEncoder, OutputSink, TiffEncoder,
};
use crate::image_pipeline::source::{ClipSource, FrameSource, ReadToken};
use crate::image_pipeline::window::context::ProcessingContext;
use crate::image_pipeline::window::engine::StackEngine;
use crate::image_pipeline::window::permits::{JobPermit, JobPermits};
use crate::image_pipeline::window::plan::{JobKind, JobSpec, WindowPlan};
use crate::image_pipeline::window::timing::{PipelineTimings, Stage, Timer};
use crate::image_pipeline::window::types::{StackConfig, StackReport};

/// A submitted read waiting for a decode worker.
struct DecodeJob<'p> {
    seq: u64,
    spec: JobSpec,
    token: ReadToken,
    permit: JobPermit<'p>,
}

/// A decoded frame waiting for its turn on the accumulation thread.
struct Completion<'p> {
    seq: u64,
    spec: JobSpec,
    frame: Result<Frame>,
    permit: JobPermit<'p>,
}

/// First error of a run plus the flag telling every thread to stop.
///
/// A failed read only ends submission: jobs already submitted still drain
/// through decode and accumulation. Processing failures set `aborted`, after
/// which every later job is discarded.
#[derive(Default)]
struct AbortState {
    aborted: AtomicBool,
    first_error: Mutex<Option<StackError>>,
}

impl AbortState {
    /// Keeps the first error without discarding outstanding work.
    fn record(&self, err: StackError) {
        if let Ok(mut slot) = self.first_error.lock() {
            if slot.is_none() {
                error!("Stopping run: {}", err);
                *slot = Some(err);
            } else {
                debug!("Ignoring error after abort: {}", err);
            }
        }
    }

    fn fail(&self, err: StackError) {
        self.record(err);
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// Stops the run without recording an error.
    fn stop(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    fn into_error(self) -> Option<StackError> {
        self.first_error.into_inner().ok().flatten()
    }
}

pub struct StackPipeline<S: FrameSource, K: OutputSink> {
    source: S,
    sink: K,
    config: StackConfig,
}

impl StackPipeline<ClipSource, FileSink> {
    /// Opens the clip at `input` and writes outputs next to `output`.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(
        input: P,
        output: Q,
        config: StackConfig,
    ) -> Result<Self> {
        config.validate()?;
        let source = ClipSource::open(input, config.frame_size)?;
        let encoder: Box<dyn DisplayEncoder> = match config.display_format {
            DisplayFormat::Jpeg => Box::new(JpegEncoder::new(config.jpeg_quality)),
            DisplayFormat::Tiff => {
                Box::new(TiffEncoder::new(config.tiff_compression).with_predictor(Some(2)))
            }
        };
        let sink = FileSink::new(output, config.single, encoder);
        Ok(Self::with_custom(source, sink, config))
    }
}

impl<S: FrameSource, K: OutputSink> StackPipeline<S, K> {
    pub fn with_custom(source: S, sink: K, config: StackConfig) -> Self {
        Self {
            source,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn plan(&self) -> WindowPlan {
        WindowPlan::new(
            self.source.frame_count(),
            self.config.window_size as usize,
            self.config.single,
        )
    }

    /// Stacks the whole clip. Returns once every job has been applied or
    /// discarded and every worker thread has exited. Outputs written before a
    /// failure stay where they are.
    pub fn run(&self) -> Result<StackReport> {
        self.config.validate()?;
        if self.source.frame_count() == 0 {
            warn!("Clip has no frames, nothing to stack");
            return Ok(StackReport::default());
        }

        let dims = self.source.dimensions();
        dims.validate()?;
        let engine = StackEngine::from_config(&self.config, dims)?;
        self.run_with_engine(engine)
    }

    /// Like [`run`](Self::run), with a caller-built engine. Its LUT,
    /// reference and output mode take the place of the configured ones.
    #[instrument(
        skip(self, engine),
        fields(window = self.config.window_size, jobs = self.config.max_jobs_in_flight)
    )]
    pub fn run_with_engine(&self, engine: StackEngine) -> Result<StackReport> {
        self.config.validate()?;

        let plan = self.plan();
        if plan.frame_count() == 0 {
            warn!("Clip has no frames, nothing to stack");
            return Ok(StackReport::default());
        }

        let dims = self.source.dimensions();
        if engine.dimensions() != dims {
            return Err(StackError::DimensionMismatch {
                expected: engine.dimensions().to_string(),
                actual: dims.to_string(),
            });
        }

        info!(
            frames = plan.frame_count(),
            window = plan.output_delay(),
            outputs = plan.output_count(),
            size = %dims,
            "Starting stack"
        );

        let context = ProcessingContext::new(engine);
        let permits = JobPermits::new(self.config.max_jobs_in_flight);
        let abort = AbortState::default();

        let (job_tx, job_rx) = mpsc::channel::<DecodeJob<'_>>();
        let (done_tx, done_rx) = mpsc::channel::<Completion<'_>>();
        let job_rx = Mutex::new(job_rx);

        let mut report = thread::scope(|scope| -> Result<StackReport> {
            let workers: Vec<_> = (0..permits.max_permits())
                .map(|id| {
                    let done_tx = done_tx.clone();
                    let job_rx = &job_rx;
                    let abort = &abort;
                    thread::Builder::new()
                        .name(format!("decode-{id}"))
                        .spawn_scoped(scope, move || self.decode_worker(job_rx, done_tx, abort))
                })
                .collect::<std::io::Result<_>>()?;
            drop(done_tx);

            let accumulator = thread::Builder::new()
                .name("accumulate".to_string())
                .spawn_scoped(scope, || self.accumulate_completions(done_rx, &context, &abort))?;

            let mut report = self.submit_jobs(&plan, &permits, job_tx, &abort);

            permits.wait_idle();
            for worker in workers {
                match worker.join() {
                    Ok(timings) => report.timings.merge(&timings),
                    Err(payload) => panic::resume_unwind(payload),
                }
            }
            match accumulator.join() {
                Ok((outputs, timings)) => {
                    report.outputs_written = outputs;
                    report.timings.merge(&timings);
                }
                Err(payload) => panic::resume_unwind(payload),
            }
            Ok(report)
        })?;

        report.peak_jobs_in_flight = permits.peak();
        if let Some(err) = abort.into_error() {
            return Err(err);
        }

        report.timings.log_summary();
        info!(
            outputs = report.outputs_written,
            peak_in_flight = report.peak_jobs_in_flight,
            "Stack complete"
        );
        Ok(report)
    }

    /// Control loop: one permit per job, subtract before add.
    fn submit_jobs<'p>(
        &self,
        plan: &WindowPlan,
        permits: &'p JobPermits,
        job_tx: Sender<DecodeJob<'p>>,
        abort: &AbortState,
    ) -> StackReport {
        let mut report = StackReport::default();
        let mut seq = 0u64;

        for spec in plan.jobs() {
            let permit = permits.acquire();
            if abort.is_aborted() {
                break;
            }

            let timer = Timer::start(Stage::Read);
            let token = match self.source.submit_read(spec.frame_index) {
                Ok(token) => token,
                Err(err) => {
                    // Earlier jobs are still drained; only submission stops.
                    abort.record(err);
                    break;
                }
            };
            timer.record(&mut report.timings);

            if job_tx.send(DecodeJob { seq, spec, token, permit }).is_err() {
                abort.fail(StackError::WorkersDisconnected);
                break;
            }
            seq += 1;
            report.jobs_submitted += 1;
            if spec.kind == JobKind::Add {
                report.frames_submitted += 1;
            }
        }

        debug!("Submitted {} jobs", report.jobs_submitted);
        report
    }

    fn decode_worker<'p>(
        &self,
        jobs: &Mutex<Receiver<DecodeJob<'p>>>,
        done: Sender<Completion<'p>>,
        abort: &AbortState,
    ) -> PipelineTimings {
        let mut timings = PipelineTimings::new();
        loop {
            let job = match jobs.lock() {
                Ok(rx) => match rx.recv() {
                    Ok(job) => job,
                    Err(_) => break,
                },
                Err(_) => break,
            };

            // Jobs left in the queue after a failure are dropped, which
            // releases their permits.
            if abort.is_aborted() {
                continue;
            }

            let DecodeJob { seq, spec, token, permit } = job;
            let timer = Timer::start(Stage::Decode);
            let frame = panic::catch_unwind(AssertUnwindSafe(|| self.source.decode_process(token)))
                .unwrap_or_else(|_| {
                    Err(StackError::DecodeError(format!(
                        "decoder panicked on frame {}",
                        spec.frame_index
                    )))
                });
            timer.record(&mut timings);

            // The accumulation thread is gone; keep draining so queued permits
            // are released.
            if done.send(Completion { seq, spec, frame, permit }).is_err() {
                abort.stop();
            }
        }
        timings
    }

    /// Applies completions in submission order. Returns the number of
    /// outputs written.
    fn accumulate_completions(
        &self,
        done: Receiver<Completion<'_>>,
        context: &ProcessingContext,
        abort: &AbortState,
    ) -> (usize, PipelineTimings) {
        let mut timings = PipelineTimings::new();
        let mut pending = BTreeMap::new();
        let mut next_seq = 0u64;
        let mut outputs = 0usize;

        for completion in done {
            if abort.is_aborted() {
                pending.clear();
                continue;
            }
            pending.insert(completion.seq, completion);

            while let Some(completion) = pending.remove(&next_seq) {
                next_seq += 1;
                let Completion { spec, frame, permit, .. } = completion;
                let result = self.apply(spec, frame, context, &mut timings);
                let failed = match result {
                    Ok(written) => {
                        outputs += usize::from(written);
                        false
                    }
                    Err(err) => {
                        abort.fail(err);
                        true
                    }
                };
                // Released only after the abort flag is visible to the submitter.
                drop(permit);
                if failed {
                    pending.clear();
                    break;
                }
            }
        }
        (outputs, timings)
    }

    /// Accumulates one decoded frame and writes the window it completes.
    fn apply(
        &self,
        spec: JobSpec,
        frame: Result<Frame>,
        context: &ProcessingContext,
        timings: &mut PipelineTimings,
    ) -> Result<bool> {
        let _span = info_span!("job", frame = spec.frame_index, kind = ?spec.kind).entered();
        let frame = frame?;

        let timer = Timer::start(Stage::Accumulate);
        let accumulated =
            context.with_engine(|engine| engine.accumulate(spec.kind, spec.frame_index, &frame));
        match accumulated {
            Ok(()) => {}
            Err(err) if !err.is_fatal() => warn!("Frame {} skipped: {}", spec.frame_index, err),
            Err(err) => return Err(err),
        }
        timer.record(timings);

        let Some(output_index) = spec.output_index else {
            return Ok(false);
        };

        let timer = Timer::start(Stage::Render);
        let rendered = context.with_engine(|engine| engine.render());
        timer.record(timings);
        let buffer = match rendered {
            Ok(Some(buffer)) => buffer,
            Ok(None) => {
                warn!("Output {} skipped: every frame of its window was skipped", output_index);
                return Ok(false);
            }
            Err(err) if !err.is_fatal() => {
                warn!("Output {} skipped: {}", output_index, err);
                return Ok(false);
            }
            Err(err) => return Err(err),
        };

        let timer = Timer::start(Stage::Write);
        self.sink.write_output(output_index, &buffer)?;
        timer.record(timings);

        debug!("Output {} written", output_index);
        Ok(true)
    }
}
