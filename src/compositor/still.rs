use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::compositor::background::{BackgroundHandle, BackgroundLoader};
use crate::compositor::frame::VideoFrame;
use crate::compositor::pipeline::{Compositor, FrameOutcome};
use crate::utils::error::CompositorError;

/// Keys a single image against a background and writes the result.
///
/// The output format follows the extension of `output`; use `.png` to keep
/// transparency when the background cannot be drawn.
pub async fn composite_still(
    input: &Path,
    background: &str,
    output: &Path,
    loader: Arc<dyn BackgroundLoader>,
) -> Result<FrameOutcome, CompositorError> {
    let frame = VideoFrame::from_image(image::open(input)?.to_rgba8());

    let handle = BackgroundHandle::new(loader);
    handle.load(background).await?;

    let mut compositor = Compositor::new(handle);
    let outcome = compositor.process_frame(&frame)?;

    let raster = compositor.buffer();
    let Some(image) = raster.to_image() else {
        return Err(CompositorError::InvalidFrame {
            width: raster.width(),
            height: raster.height(),
            expected: raster.width() as usize * raster.height() as usize * 4,
            len: raster.pixels().len(),
        });
    };
    image.save(output)?;

    info!(
        "Wrote {}x{} composite to {}",
        image.width(),
        image.height(),
        output.display()
    );
    Ok(outcome)
}
