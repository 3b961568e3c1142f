//! Outer render loop
//!
//! Zips a [`DisplayLoop`] with a [`FrameLoop`] and drives one rasterizer
//! frame per iteration:
//!
//! ```text
//! acquire -> begin -> update(globals) -> record -> end -> present | discard
//! ```
//!
//! A frame that fails for any reason other than device loss is discarded and
//! the loop moves on. Device loss ends the loop with the error.

use crate::core::config::FrameLoopConfig;
use crate::foundation::frame_loop::{FrameLoop, FrameToken, LoopStop};
use crate::render::api::{CommandSink, RenderPassTarget};
use crate::render::rasterizer::{FrameReport, RasterizerState, SceneRasterizer};
use crate::render::window::{DisplayLoop, DisplaySurface};
use crate::render::{RenderError, RenderResult, SceneGlobals};

/// Application side of the render loop
pub trait FrameSource<C: CommandSink> {
    /// Acquire the render target for this frame, or `None` to skip it
    /// (e.g. a minimized window or an out-of-date swapchain).
    fn acquire(&mut self, token: &FrameToken) -> RenderResult<Option<RenderPassTarget>>;

    /// Scene globals for this frame
    fn globals(&mut self, token: &FrameToken) -> SceneGlobals;

    /// Issue this frame's draws
    fn record(&mut self, token: &FrameToken, rasterizer: &mut SceneRasterizer<C>) -> RenderResult<()>;

    /// Submit and present a cleanly recorded frame
    fn present(&mut self, token: &FrameToken, report: &FrameReport) -> RenderResult<()>;

    /// Drop a frame that must not be presented
    fn discard(&mut self, token: &FrameToken, error: &RenderError) {
        log::warn!("Discarding frame {}: {}", token.index, error);
    }
}

/// What a finished loop did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Iterations run
    pub frames: u64,
    /// Frames presented
    pub presented: u64,
    /// Frames recorded but not presented
    pub discarded: u64,
    /// Frames the source declined to acquire
    pub skipped: u64,
    /// The frame loop was ended through its stop handle
    pub cancelled: bool,
}

impl LoopSummary {
    /// `Ok(frames)`, or `Cancelled` if the loop was stopped early
    pub fn completion(&self) -> RenderResult<u64> {
        if self.cancelled {
            Err(RenderError::Cancelled {
                frames: self.frames,
            })
        } else {
            Ok(self.frames)
        }
    }
}

enum FrameOutcome {
    Presented,
    Discarded,
    Skipped,
}

/// Paced display-driven render loop
#[derive(Debug, Default)]
pub struct RenderLoop {
    frames: FrameLoop,
}

impl RenderLoop {
    /// Loop paced by `frames`
    pub fn new(frames: FrameLoop) -> Self {
        Self { frames }
    }

    /// Loop paced from configuration
    pub fn from_config(config: &FrameLoopConfig) -> Self {
        Self::new(FrameLoop::from_config(config))
    }

    /// Handle that ends the loop before its next frame
    pub fn stop_handle(&self) -> LoopStop {
        self.frames.stop_handle()
    }

    /// Run until the surface closes, the frame count is reached or the
    /// loop is stopped.
    pub fn run<S, C, F>(
        mut self,
        surface: &mut S,
        rasterizer: &mut SceneRasterizer<C>,
        source: &mut F,
    ) -> RenderResult<LoopSummary>
    where
        S: DisplaySurface + ?Sized,
        C: CommandSink,
        F: FrameSource<C>,
    {
        let mut summary = LoopSummary::default();

        for (_display, token) in DisplayLoop::new(surface).zip(self.frames.by_ref()) {
            summary.frames += 1;
            match run_frame(&token, rasterizer, source) {
                Ok(FrameOutcome::Presented) => summary.presented += 1,
                Ok(FrameOutcome::Discarded) => summary.discarded += 1,
                Ok(FrameOutcome::Skipped) => summary.skipped += 1,
                Err(e) if e.is_fatal() => {
                    log::error!("Render loop stopped at frame {}: {}", token.index, e);
                    return Err(e);
                }
                Err(e) => {
                    source.discard(&token, &e);
                    summary.discarded += 1;
                }
            }
        }

        summary.cancelled = self.frames.completion().is_err();
        log::info!(
            "Render loop finished: {} frames, {} presented, {} discarded, {} skipped{}",
            summary.frames,
            summary.presented,
            summary.discarded,
            summary.skipped,
            if summary.cancelled { " (stopped)" } else { "" }
        );
        Ok(summary)
    }
}

fn run_frame<C, F>(
    token: &FrameToken,
    rasterizer: &mut SceneRasterizer<C>,
    source: &mut F,
) -> RenderResult<FrameOutcome>
where
    C: CommandSink,
    F: FrameSource<C>,
{
    let Some(target) = source.acquire(token)? else {
        log::trace!("Frame {} skipped", token.index);
        return Ok(FrameOutcome::Skipped);
    };

    rasterizer.begin(&target)?;
    let globals = source.globals(token);
    let recorded = rasterizer
        .update(&globals)
        .and_then(|()| source.record(token, rasterizer));

    if let Err(e) = recorded {
        if rasterizer.state() == RasterizerState::Recording {
            // Close the render pass; the report is superseded by `e`
            rasterizer.end()?;
        }
        return Err(e);
    }

    let report = rasterizer.end()?;
    match &report.failure {
        None => {
            source.present(token, &report)?;
            Ok(FrameOutcome::Presented)
        }
        Some(failure) => {
            source.discard(token, failure);
            Ok(FrameOutcome::Discarded)
        }
    }
}
