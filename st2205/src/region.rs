//! Dirty-region bookkeeping
//!
//! Rectangles travel as tightly packed RGB buffers (row stride = rect width).
//! [`repack`] cuts such a buffer out of a full-width frame; [`ShadowBuffer`]
//! holds the host copy of what the panel shows and finds the bounding box of
//! changes against it.

use crate::codec::{check_len, NATIVE_PIXEL_BYTES};
use crate::geometry::Rect;
use crate::{Error, Result};

/// Tightly packed RGB pixels of one rectangle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionBuffer {
    pub rect: Rect,
    pub data: Vec<u8>,
}

impl RegionBuffer {
    /// Wrap pre-rendered RGB data; its length must match the rectangle
    pub fn new(rect: Rect, data: Vec<u8>) -> Result<Self> {
        let expected = rect.pixel_count() * NATIVE_PIXEL_BYTES;
        if data.len() != expected {
            return Err(Error::Range(format!(
                "region {} needs {} bytes, got {}",
                rect,
                expected,
                data.len()
            )));
        }
        Ok(Self { rect, data })
    }

    pub fn origin(&self) -> (u32, u32) {
        (self.rect.x_start, self.rect.y_start)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let i = ((y - self.rect.y_start) as usize * self.rect.width() as usize
            + (x - self.rect.x_start) as usize)
            * NATIVE_PIXEL_BYTES;
        &self.data[i..i + NATIVE_PIXEL_BYTES]
    }
}

/// Copy `rect` out of a row-major frame of `width` columns with `src_px`
/// bytes per pixel, converting each pixel to RGB with `convert`.
///
/// Starts at pixel `width*ys + xs`, copies `xe-xs+1` pixels, then skips
/// `width-(xe-xs+1)` pixels to the next row. The rectangle must already be
/// validated.
pub(crate) fn repack(
    src: &[u8],
    src_px: usize,
    width: u32,
    rect: Rect,
    convert: impl Fn(&[u8], &mut [u8]),
) -> RegionBuffer {
    let cols = rect.width() as usize;
    let skip = width as usize - cols;
    let mut index = width as usize * rect.y_start as usize + rect.x_start as usize;
    let mut data = vec![0; rect.pixel_count() * NATIVE_PIXEL_BYTES];

    for out_row in data.chunks_exact_mut(cols * NATIVE_PIXEL_BYTES) {
        let row = &src[index * src_px..(index + cols) * src_px];
        for (px, out) in row
            .chunks_exact(src_px)
            .zip(out_row.chunks_exact_mut(NATIVE_PIXEL_BYTES))
        {
            convert(px, out);
        }
        index += cols + skip;
    }

    RegionBuffer { rect, data }
}

/// Cut `rect` out of a full RGB frame
pub fn extract(frame: &[u8], width: u32, height: u32, rect: Rect) -> Result<RegionBuffer> {
    check_len("RGB", frame.len(), width, height, NATIVE_PIXEL_BYTES)?;
    rect.validate(width, height)?;
    Ok(repack(frame, NATIVE_PIXEL_BYTES, width, rect, |px, out| {
        out.copy_from_slice(px)
    }))
}

/// Host-side copy of the last frame committed to the panel
#[derive(Debug, Clone)]
pub struct ShadowBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ShadowBuffer {
    /// All-black shadow, the panel's reset state
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * NATIVE_PIXEL_BYTES],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn stride(&self) -> usize {
        self.width as usize * NATIVE_PIXEL_BYTES
    }

    /// Shadowed colour at `(x, y)`, `None` outside the panel
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        (x < self.width && y < self.height).then(|| self.pixel_at(x, y))
    }

    fn pixel_at(&self, x: u32, y: u32) -> [u8; 3] {
        let i = y as usize * self.stride() + x as usize * NATIVE_PIXEL_BYTES;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn commit_full(&mut self, frame: &[u8]) -> Result<()> {
        check_len("RGB", frame.len(), self.width, self.height, NATIVE_PIXEL_BYTES)?;
        self.data.copy_from_slice(frame);
        Ok(())
    }

    /// Overwrite only the region's rectangle
    pub fn commit_region(&mut self, region: &RegionBuffer) -> Result<()> {
        self.commit_rect(region.rect, &region.data)
    }

    /// Overwrite `rect` with tightly packed RGB `data`. Nothing is written
    /// unless `rect` lies on the panel and `data` covers it exactly.
    pub fn commit_rect(&mut self, rect: Rect, data: &[u8]) -> Result<()> {
        rect.validate(self.width, self.height)?;
        let expected = rect.pixel_count() * NATIVE_PIXEL_BYTES;
        if data.len() != expected {
            return Err(Error::Range(format!(
                "{} needs {} RGB bytes, got {}",
                rect,
                expected,
                data.len()
            )));
        }
        let cols = rect.width() as usize * NATIVE_PIXEL_BYTES;
        let stride = self.stride();
        for (row, src) in (rect.y_start..=rect.y_end).zip(data.chunks_exact(cols)) {
            let start = row as usize * stride + rect.x_start as usize * NATIVE_PIXEL_BYTES;
            self.data[start..start + cols].copy_from_slice(src);
        }
        Ok(())
    }

    /// Smallest rectangle containing every pixel where `frame` differs from
    /// the shadow, `None` when they are equal
    pub fn changed_bounds(&self, frame: &[u8]) -> Result<Option<Rect>> {
        check_len("RGB", frame.len(), self.width, self.height, NATIVE_PIXEL_BYTES)?;
        let stride = self.stride();
        let mut bounds: Option<Rect> = None;

        for (y, (new, old)) in frame
            .chunks_exact(stride)
            .zip(self.data.chunks_exact(stride))
            .enumerate()
        {
            if new == old {
                continue;
            }
            let differs = |(a, b): (&[u8], &[u8])| a != b;
            let pixels = || {
                new.chunks_exact(NATIVE_PIXEL_BYTES)
                    .zip(old.chunks_exact(NATIVE_PIXEL_BYTES))
            };
            // a row that differs has at least one differing pixel
            let first = pixels().position(differs).unwrap_or(0) as u32;
            let from_end = pixels().rev().position(differs).unwrap_or(0);
            let last = (self.width as usize - 1 - from_end) as u32;
            let y = y as u32;
            bounds = Some(match bounds {
                None => Rect::new(first, y, last, y),
                Some(b) => Rect::new(b.x_start.min(first), b.y_start, b.x_end.max(last), y),
            });
        }
        Ok(bounds)
    }

    /// Build the packed RGB payload for a (possibly widened) `window`.
    /// Pixels inside `region` come from it, other panel pixels from the
    /// shadow, columns past the panel edge are black.
    pub(crate) fn fill_window(&self, window: Rect, region: &RegionBuffer) -> RegionBuffer {
        let mut data = Vec::with_capacity(window.pixel_count() * NATIVE_PIXEL_BYTES);
        for y in window.y_start..=window.y_end {
            for x in window.x_start..=window.x_end {
                if region.rect.contains(x, y) {
                    data.extend_from_slice(region.pixel(x, y));
                } else if x < self.width && y < self.height {
                    data.extend_from_slice(&self.pixel_at(x, y));
                } else {
                    data.extend_from_slice(&[0; NATIVE_PIXEL_BYTES]);
                }
            }
        }
        RegionBuffer { rect: window, data }
    }

    /// The panel-visible part of a window, for committing widened transfers
    pub(crate) fn clip(&self, region: RegionBuffer) -> RegionBuffer {
        let rect = region.rect;
        if rect.x_end < self.width && rect.y_end < self.height {
            return region;
        }
        let clipped = Rect::new(
            rect.x_start,
            rect.y_start,
            rect.x_end.min(self.width - 1),
            rect.y_end.min(self.height - 1),
        );
        let mut data = Vec::with_capacity(clipped.pixel_count() * NATIVE_PIXEL_BYTES);
        for y in clipped.y_start..=clipped.y_end {
            for x in clipped.x_start..=clipped.x_end {
                data.extend_from_slice(region.pixel(x, y));
            }
        }
        RegionBuffer { rect: clipped, data }
    }
}
