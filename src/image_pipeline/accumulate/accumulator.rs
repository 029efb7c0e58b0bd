use std::borrow::Cow;

use rayon::prelude::*;
use tracing::trace;

use crate::image_pipeline::accumulate::Accumulate;
use crate::image_pipeline::common::error::{Result, StackError};
use crate::image_pipeline::frame::{CHANNELS, Frame, FrameDimensions, USED_CHANNELS};

#[derive(Debug, Clone, Copy)]
enum Fold {
    Add,
    Subtract,
}

/// Host-memory accumulator with two ping-ponged u32 sum buffers.
///
/// Sums use wrapping arithmetic, so `add(f)` followed by `subtract(f)`
/// restores the previous state bit for bit no matter what else is in the
/// window.
#[derive(Debug)]
pub struct Accumulator {
    dims: FrameDimensions,
    sums: [Vec<u32>; 2],
    current: usize,
    samples: u32,
}

impl Accumulator {
    pub fn new(dims: FrameDimensions) -> Result<Self> {
        dims.validate()?;
        let len = dims
            .pixel_count()
            .checked_mul(USED_CHANNELS)
            .ok_or_else(|| StackError::ResourceExhausted(format!("{dims} sum buffer")))?;

        Ok(Self {
            dims,
            sums: [zeroed(len)?, zeroed(len)?],
            current: 0,
            samples: 0,
        })
    }

    /// Index (0 or 1) of the buffer holding the current sum.
    pub fn current_slot(&self) -> usize {
        self.current
    }

    pub fn reset(&mut self) {
        for sum in &mut self.sums {
            sum.fill(0);
        }
        self.current = 0;
        self.samples = 0;
    }

    fn fold(&mut self, frame: &Frame, fold: Fold) -> Result<()> {
        frame.check_dimensions(self.dims)?;

        let next = 1 - self.current;
        let sum_row = self.dims.width * USED_CHANNELS;
        let frame_row = self.dims.width * CHANNELS;

        let [first, second] = &mut self.sums;
        let (source, target) = if self.current == 0 {
            (&*first, second)
        } else {
            (&*second, first)
        };

        target
            .par_chunks_mut(sum_row)
            .zip(source.par_chunks(sum_row))
            .zip(frame.data().par_chunks(frame_row))
            .for_each(|((target, source), pixels)| {
                for ((out, old), px) in target
                    .chunks_exact_mut(USED_CHANNELS)
                    .zip(source.chunks_exact(USED_CHANNELS))
                    .zip(pixels.chunks_exact(CHANNELS))
                {
                    for c in 0..USED_CHANNELS {
                        let value = u32::from(px[c]);
                        out[c] = match fold {
                            Fold::Add => old[c].wrapping_add(value),
                            Fold::Subtract => old[c].wrapping_sub(value),
                        };
                    }
                }
            });

        self.current = next;
        Ok(())
    }
}

impl Accumulate for Accumulator {
    fn dimensions(&self) -> FrameDimensions {
        self.dims
    }

    fn add(&mut self, frame: &Frame) -> Result<()> {
        self.fold(frame, Fold::Add)?;
        self.samples += 1;
        trace!(samples = self.samples, slot = self.current, "Added frame");
        Ok(())
    }

    fn subtract(&mut self, frame: &Frame) -> Result<()> {
        assert!(self.samples > 0, "subtract called on an empty window");
        self.fold(frame, Fold::Subtract)?;
        self.samples -= 1;
        trace!(samples = self.samples, slot = self.current, "Subtracted frame");
        Ok(())
    }

    fn sample_count(&self) -> u32 {
        self.samples
    }

    fn current_sum(&self) -> Result<Cow<'_, [u32]>> {
        Ok(Cow::Borrowed(&self.sums[self.current]))
    }
}

fn zeroed(len: usize) -> Result<Vec<u32>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).map_err(|e| {
        StackError::ResourceExhausted(format!("allocating {len} accumulator samples: {e}"))
    })?;
    buffer.resize(len, 0);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> FrameDimensions {
        FrameDimensions::new(4, 3)
    }

    fn gradient(seed: u16) -> Frame {
        let dims = dims();
        let data = (0..dims.sample_count())
            .map(|i| (i as u16).wrapping_mul(4099).wrapping_add(seed))
            .collect();
        Frame::new(dims, data).unwrap()
    }

    fn snapshot(acc: &Accumulator) -> Vec<u32> {
        acc.current_sum().unwrap().into_owned()
    }

    #[test]
    fn test_add_sums_used_channels_only() {
        let mut acc = Accumulator::new(dims()).unwrap();
        acc.add(&Frame::uniform(dims(), [1, 2, 3])).unwrap();
        acc.add(&Frame::uniform(dims(), [10, 20, 30])).unwrap();

        assert_eq!(acc.sample_count(), 2);
        let sum = snapshot(&acc);
        assert_eq!(sum.len(), dims().pixel_count() * USED_CHANNELS);
        assert!(sum.chunks_exact(3).all(|px| px == [11, 22, 33]));
    }

    #[test]
    fn test_each_step_flips_the_current_slot() {
        let mut acc = Accumulator::new(dims()).unwrap();
        assert_eq!(acc.current_slot(), 0);
        acc.add(&gradient(1)).unwrap();
        assert_eq!(acc.current_slot(), 1);
        acc.add(&gradient(2)).unwrap();
        assert_eq!(acc.current_slot(), 0);
        acc.subtract(&gradient(1)).unwrap();
        assert_eq!(acc.current_slot(), 1);
    }

    #[test]
    fn test_add_then_subtract_restores_state() {
        let mut acc = Accumulator::new(dims()).unwrap();
        acc.add(&gradient(7)).unwrap();
        acc.add(&gradient(9)).unwrap();
        let before = snapshot(&acc);
        let samples = acc.sample_count();

        let frame = Frame::uniform(dims(), [u16::MAX, 0, 12345]);
        acc.add(&frame).unwrap();
        acc.subtract(&frame).unwrap();

        assert_eq!(snapshot(&acc), before);
        assert_eq!(acc.sample_count(), samples);
    }

    #[test]
    fn test_inverse_holds_across_wraparound() {
        let mut acc = Accumulator::new(dims()).unwrap();
        let frame = gradient(3);
        acc.add(&frame).unwrap();
        acc.subtract(&frame).unwrap();
        assert!(snapshot(&acc).iter().all(|&v| v == 0));

        // Out-of-window subtraction wraps and comes back exactly.
        acc.add(&gradient(5)).unwrap();
        acc.subtract(&frame).unwrap();
        acc.add(&frame).unwrap();
        acc.add(&frame).unwrap();
        acc.subtract(&frame).unwrap();
        acc.subtract(&gradient(5)).unwrap();
        assert!(snapshot(&acc).iter().all(|&v| v == 0));
        assert_eq!(acc.sample_count(), 0);
    }

    #[test]
    fn test_sample_count_tracks_adds_minus_subtracts() {
        let mut acc = Accumulator::new(dims()).unwrap();
        let frame = gradient(0);
        let ops = [true, true, false, true, true, false, false, true, false, false];
        let mut expected = 0u32;
        for add in ops {
            if add {
                acc.add(&frame).unwrap();
                expected += 1;
            } else {
                acc.subtract(&frame).unwrap();
                expected -= 1;
            }
            assert_eq!(acc.sample_count(), expected);
        }
    }

    #[test]
    #[should_panic(expected = "empty window")]
    fn test_subtract_on_empty_window_panics() {
        let mut acc = Accumulator::new(dims()).unwrap();
        let _ = acc.subtract(&gradient(0));
    }

    #[test]
    fn test_rejects_mismatched_frame() {
        let mut acc = Accumulator::new(dims()).unwrap();
        let other = Frame::uniform(FrameDimensions::new(3, 4), [1, 1, 1]);
        assert!(matches!(
            acc.add(&other),
            Err(StackError::DimensionMismatch { .. })
        ));
        assert_eq!(acc.sample_count(), 0);
        assert_eq!(acc.current_slot(), 0);
    }

    #[test]
    fn test_reset_clears_both_slots() {
        let mut acc = Accumulator::new(dims()).unwrap();
        acc.add(&gradient(1)).unwrap();
        acc.add(&gradient(2)).unwrap();
        acc.reset();
        assert_eq!(acc.sample_count(), 0);
        assert!(acc.sums.iter().flatten().all(|&v| v == 0));
    }

    #[test]
    fn test_rejects_empty_dimensions() {
        assert!(matches!(
            Accumulator::new(FrameDimensions::new(0, 10)),
            Err(StackError::InvalidDimensions(0, 10))
        ));
    }
}
