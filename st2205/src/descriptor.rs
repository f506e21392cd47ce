//! Panel descriptor
//!
//! Hacked firmware carries a parameter block describing the panel, tagged
//! with the `H4CK` marker somewhere in its last two 32K pages:
//!
//! ```text
//! offset  0   1   2   3   4        5      6       7    8      9        10
//!        'H' '4' 'C' 'K' version  width  height  bpp  proto  offset_x offset_y
//! ```
//!
//! Offsets are signed bytes. Only version 1 is known. Firmware without the
//! block needs a fixed descriptor supplied by the caller.

use crate::geometry::Rect;
use crate::protocol::{PanelOffset, PixelFormat, ProtocolId};
use crate::{Error, Result};

/// Bytes the frame reports in sector 0, including the terminating NUL
pub const SIGNATURE: &[u8; 15] = b"SITRONIX CORP.\0";

pub const PARAM_MARKER: &[u8; 4] = b"H4CK";
pub const PARAM_VERSION: u8 = 1;
const PARAM_LEN: usize = 11;

/// First firmware page holding the parameter block, `(2048 - 64) / 32`
pub const FIRMWARE_PAGE: u32 = 0xFE;
pub const FIRMWARE_PAGE_LEN: usize = 0x8000;

/// Immutable panel geometry and protocol selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub protocol: ProtocolId,
    pub offset: PanelOffset,
}

impl Default for PanelDescriptor {
    /// Mercury 320x240 frames, the only ones shipped without a parameter block
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            format: PixelFormat::Rgb888,
            protocol: ProtocolId::Mercury,
            offset: PanelOffset::default(),
        }
    }
}

impl PanelDescriptor {
    /// Build a descriptor from raw descriptor fields, rejecting combinations
    /// the encoder cannot drive
    pub fn new(
        width: u32,
        height: u32,
        bpp: u8,
        protocol: u8,
        offset: PanelOffset,
    ) -> Result<Self> {
        let unsupported = || Error::UnsupportedProtocol { protocol, bpp };
        let format = PixelFormat::from_bpp(bpp).ok_or_else(unsupported)?;
        let protocol = ProtocolId::from_raw(protocol).ok_or_else(unsupported)?;
        let descriptor = Self {
            width,
            height,
            format,
            protocol,
            offset,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Check that every window on this panel, widened for 12 bpp and shifted
    /// by the offset, fits the coordinate fields of its window packet
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Descriptor(format!(
                "empty panel geometry {}x{}",
                self.width, self.height
            )));
        }
        let window = self
            .format
            .align_window(Rect::full(self.width, self.height));
        let (max_x, max_y) = self.protocol.window_protocol().max_coordinate();
        let fits = |first: u32, last: u32, offset: i8, max: u32| {
            let offset = i64::from(offset);
            i64::from(first) + offset >= 0 && i64::from(last) + offset <= i64::from(max)
        };
        if !fits(window.x_start, window.x_end, self.offset.x, max_x)
            || !fits(window.y_start, window.y_end, self.offset.y, max_y)
        {
            return Err(Error::Descriptor(format!(
                "{}x{} {} panel with offset {},{} exceeds {} window range {}x{}",
                self.width,
                self.height,
                self.format,
                self.offset.x,
                self.offset.y,
                self.protocol,
                max_x + 1,
                max_y + 1
            )));
        }
        Ok(())
    }

    /// Parse the parameter block starting at its marker
    pub fn parse(block: &[u8]) -> Result<Self> {
        if block.len() < PARAM_LEN || &block[..4] != PARAM_MARKER {
            return Err(Error::Descriptor("truncated parameter block".into()));
        }
        let version = block[4];
        if version != PARAM_VERSION {
            return Err(Error::Descriptor(format!("unknown version {}", version)));
        }
        Self::new(
            u32::from(block[5]),
            u32::from(block[6]),
            block[7],
            block[8],
            PanelOffset {
                x: block[9] as i8,
                y: block[10] as i8,
            },
        )
    }

    /// Search a firmware dump for the parameter block
    pub fn find(firmware: &[u8]) -> Result<Self> {
        let at = firmware
            .windows(PARAM_LEN)
            .position(|w| w.starts_with(PARAM_MARKER))
            .ok_or_else(|| Error::Descriptor("no parameter block in firmware".into()))?;
        Self::parse(&firmware[at..])
    }

    /// The parameter block as it appears in firmware, `None` when the
    /// geometry does not fit its byte-sized fields
    pub fn to_bytes(&self) -> Option<[u8; PARAM_LEN]> {
        let width = u8::try_from(self.width).ok()?;
        let height = u8::try_from(self.height).ok()?;
        let mut b = [0u8; PARAM_LEN];
        b[..4].copy_from_slice(PARAM_MARKER);
        b[4] = PARAM_VERSION;
        b[5] = width;
        b[6] = height;
        b[7] = self.format.bpp();
        b[8] = self.protocol as u8;
        b[9] = self.offset.x as u8;
        b[10] = self.offset.y as u8;
        Some(b)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Where `open` takes the panel descriptor from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescriptorSource {
    /// Read the parameter block from the firmware pages
    #[default]
    Firmware,
    /// Trust a caller-provided descriptor (firmware without parameter block)
    Fixed(PanelDescriptor),
}

/// Does a sector-0 dump carry the Sitronix signature?
pub fn is_photoframe(sector0: &[u8]) -> bool {
    sector0.starts_with(SIGNATURE)
}
