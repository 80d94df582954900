//! Per-frame compositing and the frame loop that drives it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use image::imageops::{self, FilterType};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::compositor::background::{BackgroundHandle, BackgroundLayer};
use crate::compositor::chroma::{apply_chroma_key, destination_over};
use crate::compositor::frame::{FrameBuffer, VideoFrame};
use crate::utils::error::CompositorError;

/// Supplies decoded video frames, typically the avatar session's stream.
#[async_trait]
pub trait FrameSource: Send {
    /// Whether a current frame can be decoded yet.
    fn is_ready(&self) -> bool;

    /// The next decoded frame, or `None` once playback has stopped.
    async fn next_frame(&mut self) -> Option<VideoFrame>;
}

/// Receives each rendered raster.
pub trait FrameSink: Send {
    fn present(&mut self, frame: &FrameBuffer);
}

/// What happened to a processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// No background configured: the raw frame is shown.
    PassThrough,
    /// Keyed out, but the background is not decoded yet.
    Keyed,
    Composited,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameLoopStats {
    pub presented: u64,
    pub composited: u64,
    pub skipped: u64,
}

struct ScaledBackground {
    source: Arc<RgbaImage>,
    scaled: RgbaImage,
}

/// Chroma-key compositor.
///
/// Owns the working raster and a background scaled to the raster size; both
/// are reused across frames and only rebuilt when dimensions or the
/// background change.
pub struct Compositor {
    background: BackgroundHandle,
    buffer: FrameBuffer,
    scaled: Option<ScaledBackground>,
}

impl Compositor {
    pub fn new(background: BackgroundHandle) -> Self {
        Self {
            background,
            buffer: FrameBuffer::new(),
            scaled: None,
        }
    }

    pub fn background(&self) -> &BackgroundHandle {
        &self.background
    }

    /// The raster produced by the last processed frame.
    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Copies `frame` into the raster, keys out the green screen and draws
    /// the background beneath it.
    pub fn process_frame(&mut self, frame: &VideoFrame) -> Result<FrameOutcome, CompositorError> {
        self.buffer.load(frame)?;

        let layer = self.background.layer();
        if let BackgroundLayer::None = layer {
            return Ok(FrameOutcome::PassThrough);
        }

        apply_chroma_key(self.buffer.pixels_mut());

        match self.composite(layer) {
            Ok(()) => Ok(FrameOutcome::Composited),
            Err(CompositorError::MediaNotReady) => Ok(FrameOutcome::Keyed),
            Err(err) => Err(err),
        }
    }

    fn composite(&mut self, layer: BackgroundLayer) -> Result<(), CompositorError> {
        let BackgroundLayer::Ready(image) = layer else {
            return Err(CompositorError::MediaNotReady);
        };

        let (width, height) = (self.buffer.width(), self.buffer.height());
        let stale = match &self.scaled {
            Some(cached) => {
                !Arc::ptr_eq(&cached.source, &image)
                    || cached.scaled.dimensions() != (width, height)
            }
            None => true,
        };
        if stale {
            let scaled = if image.dimensions() == (width, height) {
                (*image).clone()
            } else {
                imageops::resize(&*image, width, height, FilterType::Triangle)
            };
            self.scaled = Some(ScaledBackground {
                source: image,
                scaled,
            });
        }

        if let Some(cached) = &self.scaled {
            destination_over(self.buffer.pixels_mut(), cached.scaled.as_raw());
        }
        Ok(())
    }

    /// Runs the frame loop until `cancel` fires or the source stops.
    ///
    /// Each tick processes at most one frame, so frames never overlap. Ticks
    /// where the source is not ready, or whose frame is malformed, are
    /// skipped and retried on the next tick.
    pub async fn run<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        frame_rate: u32,
        cancel: CancellationToken,
    ) -> FrameLoopStats
    where
        S: FrameSource,
        K: FrameSink,
    {
        let period = Duration::from_secs_f64(1.0 / f64::from(frame_rate.max(1)));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats = FrameLoopStats::default();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if !source.is_ready() {
                stats.skipped += 1;
                continue;
            }

            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                frame = source.next_frame() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };

            match self.process_frame(&frame) {
                Ok(outcome) => {
                    sink.present(&self.buffer);
                    stats.presented += 1;
                    if outcome == FrameOutcome::Composited {
                        stats.composited += 1;
                    }
                }
                Err(err) => {
                    debug!("Skipping frame: {err}");
                    stats.skipped += 1;
                }
            }
        }

        debug!(
            presented = stats.presented,
            composited = stats.composited,
            skipped = stats.skipped,
            "Frame loop stopped"
        );
        stats
    }
}
