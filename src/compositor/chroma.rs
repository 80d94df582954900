//! Green screen classification and background blending.
//!
//! Both passes walk the raster as contiguous RGBA8 chunks. Classification is
//! per pixel with fixed constants; there is no neighbourhood smoothing, so
//! edges between the avatar and the screen are hard cut-outs.

use crate::compositor::frame::CHANNELS;

/// Minimum green channel value for a pixel to be keyed out.
pub const CHROMA_THRESHOLD: u8 = 100;

/// How much the green channel must dominate red and blue.
pub const CHROMA_DOMINANCE: f32 = 1.5;

/// True when the pixel belongs to the green screen:
/// `g > 100 && g > 1.5 * r && g > 1.5 * b`.
#[inline]
pub fn is_chroma_key(r: u8, g: u8, b: u8) -> bool {
    // 1.5x dominance in integers: 2g > 3r
    let (r, g, b) = (r as u16, g as u16, b as u16);
    g > CHROMA_THRESHOLD as u16 && 2 * g > 3 * r && 2 * g > 3 * b
}

/// Zeroes the alpha of every chroma-key pixel and returns how many matched.
///
/// Pixels that do not match are left untouched, alpha included.
pub fn apply_chroma_key(pixels: &mut [u8]) -> usize {
    let mut keyed = 0;
    for px in pixels.chunks_exact_mut(CHANNELS) {
        if is_chroma_key(px[0], px[1], px[2]) {
            px[3] = 0;
            keyed += 1;
        }
    }
    keyed
}

/// Draws `background` beneath `foreground` ("destination-over").
///
/// Opaque foreground pixels are kept as they are, fully transparent ones are
/// replaced by the background, and partial alpha is blended. Both slices
/// hold straight (non-premultiplied) RGBA8 of the same size.
pub fn destination_over(foreground: &mut [u8], background: &[u8]) {
    debug_assert_eq!(foreground.len(), background.len());

    for (dst, src) in foreground
        .chunks_exact_mut(CHANNELS)
        .zip(background.chunks_exact(CHANNELS))
    {
        let da = dst[3] as u32;
        if da == 255 {
            continue;
        }
        if da == 0 {
            dst.copy_from_slice(src);
            continue;
        }

        // Weights scaled by 255: dst keeps da, src fills the rest.
        let dst_w = da * 255;
        let src_w = src[3] as u32 * (255 - da);
        let total = dst_w + src_w;
        for c in 0..3 {
            dst[c] = ((dst[c] as u32 * dst_w + src[c] as u32 * src_w + total / 2) / total) as u8;
        }
        dst[3] = ((total + 127) / 255) as u8;
    }
}
