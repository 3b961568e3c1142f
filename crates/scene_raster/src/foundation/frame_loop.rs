//! Frame pacing
//!
//! A Vulkan application will generally run as fast as it possibly can. When
//! workloads are low that means unreasonably high frame rates and CPU/GPU
//! utilization, so [`FrameLoop`] sleeps away whatever is left of the target
//! period at the end of every frame.
//!
//! The loop is an [`Iterator`] of [`FrameToken`]s. Each call to `next`
//! closes the previous frame (measure, sleep, advance) and opens the next
//! one. `None` is the end sentinel: it is reached after the configured frame
//! count or after [`FrameLoop::end_loop`].

use std::iter::FusedIterator;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::config::FrameLoopConfig;
use crate::render::{RenderError, RenderResult};

/// Default target rate
pub const DEFAULT_FPS: u32 = 60;

/// Per-frame work token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameToken {
    /// Dense iteration index starting at 0
    pub index: u64,
    /// Steady-clock start of this frame
    pub frame_start: Instant,
    /// Work time of the previous frame, zero on the first one
    pub last_frame_duration: Duration,
    /// Target period in effect for this frame
    pub target_period: Duration,
}

impl FrameToken {
    /// `last_frame_duration` in whole microseconds
    pub fn last_frame_micros(&self) -> u64 {
        u64::try_from(self.last_frame_duration.as_micros()).unwrap_or(u64::MAX)
    }

    /// `target_period` in whole microseconds
    pub fn target_period_micros(&self) -> u64 {
        u64::try_from(self.target_period.as_micros()).unwrap_or(u64::MAX)
    }
}

/// Cloneable handle that ends a [`FrameLoop`] from code that does not own it.
#[derive(Debug, Clone, Default)]
pub struct LoopStop(Arc<AtomicBool>);

impl LoopStop {
    /// Request the loop to end before its next frame
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether an end was requested
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Paced frame iterator
#[derive(Debug)]
pub struct FrameLoop {
    period: Duration,
    max_frames: u64,
    index: u64,
    in_frame: bool,
    frame_start: Instant,
    last_frame_duration: Duration,
    finished: bool,
    cancelled: bool,
    stop: LoopStop,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    /// Unbounded loop at [`DEFAULT_FPS`]
    pub fn new() -> Self {
        Self {
            period: period_for(DEFAULT_FPS),
            max_frames: 0,
            index: 0,
            in_frame: false,
            frame_start: Instant::now(),
            last_frame_duration: Duration::ZERO,
            finished: false,
            cancelled: false,
            stop: LoopStop::default(),
        }
    }

    /// Loop configured from [`FrameLoopConfig`]
    pub fn from_config(config: &FrameLoopConfig) -> Self {
        let mut frames = Self::new();
        frames.set_fps(config.fps);
        frames.set_duration_in_frames(config.duration_in_frames);
        frames
    }

    /// Set the target rate. The period is `1e6 / fps` microseconds; zero
    /// disables pacing.
    pub fn set_fps(&mut self, fps: u32) {
        self.period = period_for(fps);
        log::debug!("Frame loop target period set to {:?}", self.period);
    }

    /// Stop after exactly `frames` tokens. Zero runs until [`Self::end_loop`].
    pub fn set_duration_in_frames(&mut self, frames: u64) {
        self.max_frames = frames;
    }

    /// Current target period
    pub fn target_period(&self) -> Duration {
        self.period
    }

    /// End the loop now. The next call to `next` returns `None`.
    pub fn end_loop(&mut self) {
        if !self.finished {
            log::debug!("Frame loop ended at frame {}", self.index);
            self.finished = true;
            self.cancelled = true;
        }
    }

    /// Handle that can end this loop from elsewhere
    pub fn stop_handle(&self) -> LoopStop {
        self.stop.clone()
    }

    /// Whether the loop reached its end sentinel
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Frames completed so far
    pub fn frames_completed(&self) -> u64 {
        self.index
    }

    /// `Ok(frames)` if the loop ran to its configured end (or is still
    /// running), `Cancelled` if it was ended early.
    pub fn completion(&self) -> RenderResult<u64> {
        if self.cancelled {
            Err(RenderError::Cancelled {
                frames: self.index,
            })
        } else {
            Ok(self.index)
        }
    }

    /// Callback form of the loop. Runs `frame` once per token until the loop
    /// ends or the callback breaks.
    pub fn run<F>(mut self, mut frame: F) -> RenderResult<u64>
    where
        F: FnMut(&FrameToken) -> ControlFlow<()>,
    {
        while let Some(token) = self.next() {
            if frame(&token).is_break() {
                self.end_loop();
            }
        }
        self.completion()
    }

    fn close_frame(&mut self) {
        let elapsed = self.frame_start.elapsed();
        self.last_frame_duration = elapsed;
        if elapsed < self.period {
            spin_sleep::sleep(self.period - elapsed);
        }

        self.index += 1;
        self.in_frame = false;

        if self.max_frames > 0 && self.index >= self.max_frames {
            log::debug!("Frame loop completed {} frames", self.index);
            self.finished = true;
        }
    }
}

impl Iterator for FrameLoop {
    type Item = FrameToken;

    fn next(&mut self) -> Option<FrameToken> {
        if self.finished {
            return None;
        }
        if self.stop.is_requested() {
            self.end_loop();
            return None;
        }

        if self.in_frame {
            self.close_frame();
            if self.finished {
                return None;
            }
        }

        self.in_frame = true;
        self.frame_start = Instant::now();
        Some(FrameToken {
            index: self.index,
            frame_start: self.frame_start,
            last_frame_duration: self.last_frame_duration,
            target_period: self.period,
        })
    }
}

impl FusedIterator for FrameLoop {}

fn period_for(fps: u32) -> Duration {
    if fps == 0 {
        Duration::ZERO
    } else {
        Duration::from_micros(1_000_000 / u64::from(fps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_period_is_60_fps() {
        let frames = FrameLoop::new();
        assert_eq!(frames.target_period(), Duration::from_micros(16_666));
    }

    #[test]
    fn test_bounded_loop_yields_dense_indices() {
        let mut frames = FrameLoop::new();
        frames.set_fps(0);
        frames.set_duration_in_frames(5);

        let indices: Vec<u64> = frames.by_ref().map(|token| token.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert!(frames.is_finished());
        assert_eq!(frames.completion(), Ok(5));
    }

    #[test]
    fn test_three_frames_at_1000_fps() {
        let mut frames = FrameLoop::new();
        frames.set_fps(1000);
        frames.set_duration_in_frames(3);

        let started = Instant::now();
        let tokens: Vec<FrameToken> = frames.collect();
        let total = started.elapsed();

        assert_eq!(tokens.len(), 3);
        assert_eq!(
            tokens.iter().map(|t| t.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(tokens[0].last_frame_duration, Duration::ZERO);
        assert_eq!(tokens[0].target_period_micros(), 1000);
        assert!(total >= Duration::from_millis(2));
    }

    #[test]
    fn test_frame_starts_respect_period() {
        let mut frames = FrameLoop::new();
        frames.set_fps(500);
        frames.set_duration_in_frames(4);

        let tokens: Vec<FrameToken> = frames.collect();
        for pair in tokens.windows(2) {
            let delta = pair[1].frame_start - pair[0].frame_start;
            assert!(delta >= Duration::from_millis(2), "delta was {:?}", delta);
        }
    }

    #[test]
    fn test_overrun_reports_true_duration() {
        let mut frames = FrameLoop::new();
        frames.set_fps(1000);
        frames.set_duration_in_frames(2);

        let first = frames.next().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let second = frames.next().unwrap();

        assert_eq!(first.index, 0);
        assert!(second.last_frame_duration >= Duration::from_millis(5));
        assert!(frames.next().is_none());
    }

    #[test]
    fn test_end_loop_is_immediate_and_cancelled() {
        let mut frames = FrameLoop::new();
        frames.set_fps(0);

        assert_eq!(frames.next().map(|t| t.index), Some(0));
        assert_eq!(frames.next().map(|t| t.index), Some(1));
        frames.end_loop();

        assert!(frames.next().is_none());
        assert!(frames.next().is_none());
        assert_eq!(frames.completion(), Err(RenderError::Cancelled { frames: 1 }));
    }

    #[test]
    fn test_stop_handle_ends_loop() {
        let mut frames = FrameLoop::new();
        frames.set_fps(0);
        let stop = frames.stop_handle();

        assert!(frames.next().is_some());
        stop.request();
        assert!(frames.next().is_none());
        assert!(frames.completion().is_err());
    }

    #[test]
    fn test_run_callback_breaks() {
        let mut frames = FrameLoop::new();
        frames.set_fps(0);

        let mut seen = Vec::new();
        let result = frames.run(|token| {
            seen.push(token.index);
            if token.index == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        assert_eq!(seen, vec![0, 1, 2]);
        assert!(matches!(result, Err(RenderError::Cancelled { .. })));
    }

    #[test]
    fn test_run_to_completion() {
        let frames = FrameLoop::from_config(&FrameLoopConfig {
            fps: 0,
            duration_in_frames: 3,
        });
        let mut count = 0;
        let result = frames.run(|_| {
            count += 1;
            ControlFlow::Continue(())
        });
        assert_eq!(count, 3);
        assert_eq!(result, Ok(3));
    }
}
