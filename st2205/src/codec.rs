//! RGBA to RGB intermediate conversion
//!
//! Callers hand in RGBA quadruplets; the controller wants RGB triplets. The
//! conversion is a pure channel reorder: intermediate byte 0 is source byte 2,
//! byte 1 is source byte 1, byte 2 is source byte 0. Alpha is dropped, values
//! are copied untouched. For cairo-style BGRA sources this yields RGB.

use crate::geometry::Rect;
use crate::region::{self, RegionBuffer};
use crate::{Error, Result};

/// Bytes per source (RGBA) pixel
pub const SOURCE_PIXEL_BYTES: usize = 4;
/// Bytes per intermediate (RGB) pixel
pub const NATIVE_PIXEL_BYTES: usize = 3;

#[inline]
fn swap_into(quad: &[u8], out: &mut [u8]) {
    out[0] = quad[2];
    out[1] = quad[1];
    out[2] = quad[0];
}

pub(crate) fn check_len(
    what: &str,
    len: usize,
    width: u32,
    height: u32,
    per_pixel: usize,
) -> Result<()> {
    let expected = width as usize * height as usize * per_pixel;
    if len != expected {
        return Err(Error::Range(format!(
            "{} frame is {} bytes, {}x{} panel needs {}",
            what, len, width, height, expected
        )));
    }
    Ok(())
}

/// Convert a whole RGBA frame into `dst`, which must hold
/// `width*height*3` bytes
pub fn encode_full_into(src: &[u8], width: u32, height: u32, dst: &mut [u8]) -> Result<()> {
    check_len("RGBA", src.len(), width, height, SOURCE_PIXEL_BYTES)?;
    check_len("RGB", dst.len(), width, height, NATIVE_PIXEL_BYTES)?;
    for (quad, out) in src
        .chunks_exact(SOURCE_PIXEL_BYTES)
        .zip(dst.chunks_exact_mut(NATIVE_PIXEL_BYTES))
    {
        swap_into(quad, out);
    }
    Ok(())
}

/// Convert a whole RGBA frame to the RGB intermediate
pub fn encode_full(src: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let mut dst = vec![0; width as usize * height as usize * NATIVE_PIXEL_BYTES];
    encode_full_into(src, width, height, &mut dst)?;
    Ok(dst)
}

/// Convert only `rect` of an RGBA frame into a tightly packed RGB buffer
pub fn encode_region(src: &[u8], width: u32, height: u32, rect: Rect) -> Result<RegionBuffer> {
    check_len("RGBA", src.len(), width, height, SOURCE_PIXEL_BYTES)?;
    rect.validate(width, height)?;
    Ok(region::repack(src, SOURCE_PIXEL_BYTES, width, rect, swap_into))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_swap() {
        let src = [10, 20, 30, 255, 40, 50, 60, 0];
        let rgb = encode_full(&src, 2, 1).unwrap();
        assert_eq!(rgb, vec![30, 20, 10, 60, 50, 40]);
    }

    #[test]
    fn test_wrong_length() {
        let src = vec![0u8; 4 * 10];
        let err = encode_full(&src, 4, 4).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Range);
    }

    #[test]
    fn test_region() {
        // 4x3 frame, pixel (x, y) has bytes [x, y, 0, 0xff]
        let src: Vec<u8> = (0..3u8)
            .flat_map(|y| (0..4u8).flat_map(move |x| [x, y, 0, 0xff]))
            .collect();
        let region = encode_region(&src, 4, 3, Rect::new(1, 1, 2, 2)).unwrap();
        assert_eq!(region.origin(), (1, 1));
        assert_eq!(
            region.data,
            vec![0, 1, 1, 0, 1, 2, 0, 2, 1, 0, 2, 2]
        );
    }

    #[test]
    fn test_region_out_of_range() {
        let src = vec![0u8; 4 * 4 * 4];
        let err = encode_region(&src, 4, 4, Rect::new(0, 0, 4, 1)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Range);
    }
}
