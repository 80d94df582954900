//! The `compositor` module replaces the avatar's green screen with a
//! background image, frame by frame.
//!
//! - `frame`: decoded [`VideoFrame`]s and the reusable [`FrameBuffer`] raster.
//! - `chroma`: pixel classification and destination-over blending.
//! - `background`: the shared [`BackgroundHandle`] and its loaders.
//! - `pipeline`: the [`Compositor`] and its cancellable frame loop.
//! - `sequence`: a directory of images as frame source and sink.
//! - `still`: one-shot compositing of an image file.

pub mod background;
pub mod chroma;
pub mod frame;
pub mod pipeline;
pub mod sequence;
pub mod still;

pub use background::{BackgroundHandle, BackgroundLoader, BackgroundStatus, UrlLoader};
pub use frame::{FrameBuffer, VideoFrame};
pub use pipeline::{Compositor, FrameLoopStats, FrameOutcome, FrameSink, FrameSource};
pub use sequence::{ImageSequence, PngSequenceSink};

#[cfg(test)]
mod tests;
