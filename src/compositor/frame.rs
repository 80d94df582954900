use image::RgbaImage;

use crate::utils::error::CompositorError;

/// Bytes per RGBA8 pixel.
pub const CHANNELS: usize = 4;

fn expected_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}

/// One decoded RGBA8 frame handed over by a frame source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, CompositorError> {
        let frame = Self {
            width,
            height,
            pixels,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// A frame where every pixel has the same color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            width,
            height,
            pixels: rgba.repeat(width as usize * height as usize),
        }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: image.into_raw(),
        }
    }

    pub fn validate(&self) -> Result<(), CompositorError> {
        let expected = expected_len(self.width, self.height);
        if self.pixels.len() != expected {
            return Err(CompositorError::InvalidFrame {
                width: self.width,
                height: self.height,
                expected,
                len: self.pixels.len(),
            });
        }
        Ok(())
    }
}

/// The compositor's working raster.
///
/// Reused across frames: the allocation only changes when the source
/// dimensions do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Returns the RGBA value at `(x, y)`, or `None` outside the raster.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y as usize * self.width as usize + x as usize) * CHANNELS;
        let px = &self.data[start..start + CHANNELS];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Matches the raster to the frame's dimensions and copies its pixels in.
    pub fn load(&mut self, frame: &VideoFrame) -> Result<(), CompositorError> {
        frame.validate()?;
        if self.width != frame.width || self.height != frame.height {
            self.width = frame.width;
            self.height = frame.height;
            self.data.resize(frame.pixels.len(), 0);
        }
        self.data.copy_from_slice(&frame.pixels);
        Ok(())
    }

    pub fn to_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
    }
}
