//! Controller protocol variants
//!
//! Two things differ between frame models: how the LCD window is selected
//! (the [`WindowProtocol`] strategy, keyed by the descriptor's protocol id)
//! and how pixels are packed on the wire ([`PixelFormat`], keyed by bpp).
//! Both work on the 24-bit RGB intermediate the handle keeps in its shadow
//! buffer.

use crate::geometry::Rect;
use crate::packet::PacketWriter;
use std::fmt;

/// Control commands understood by the hacked firmware. They are written as
/// the first byte of a data-window sector.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    BacklightOn = 0x11,
    BacklightOff = 0x12,
    LcdWake = 0x13,
    LcdSleep = 0x14,
}

impl ControlCommand {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x11 => Some(Self::BacklightOn),
            0x12 => Some(Self::BacklightOff),
            0x13 => Some(Self::LcdWake),
            0x14 => Some(Self::LcdSleep),
            _ => None,
        }
    }
}

/// Protocol id as stored in the panel descriptor
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolId {
    /// Philips PCF8833 style controllers, 8-bit window coordinates
    Pcf8833 = 0,
    /// Mercury firmware, 16-bit column coordinates
    Mercury = 1,
}

impl ProtocolId {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Pcf8833),
            1 => Some(Self::Mercury),
            _ => None,
        }
    }

    pub fn window_protocol(self) -> &'static dyn WindowProtocol {
        match self {
            Self::Pcf8833 => &Pcf8833,
            Self::Mercury => &Mercury,
        }
    }

    /// Identify the variant from the first byte of a window packet
    pub fn from_window_opcode(opcode: u8) -> Option<Self> {
        [Self::Pcf8833, Self::Mercury]
            .into_iter()
            .find(|p| p.window_protocol().opcode() == opcode)
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pcf8833 => write!(f, "PCF8833"),
            Self::Mercury => write!(f, "Mercury"),
        }
    }
}

/// Signed panel offsets added to every window coordinate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelOffset {
    pub x: i8,
    pub y: i8,
}

impl PanelOffset {
    fn apply_x(self, x: u32) -> i32 {
        x as i32 + self.x as i32
    }

    fn apply_y(self, y: u32) -> i32 {
        y as i32 + self.y as i32
    }
}

/// Encodes and decodes the window-selection packet of one protocol variant
pub trait WindowProtocol: Sync {
    fn id(&self) -> ProtocolId;

    /// First byte of the window packet
    fn opcode(&self) -> u8;

    /// Largest column and row a window packet can address
    fn max_coordinate(&self) -> (u32, u32);

    /// Fill a zeroed 64-byte packet selecting `window`
    fn encode_window(&self, window: &Rect, offset: PanelOffset, packet: &mut [u8]);

    /// Inverse of [`encode_window`](Self::encode_window); `None` when the
    /// packet does not belong to this variant
    fn decode_window(&self, packet: &[u8], offset: PanelOffset) -> Option<Rect>;
}

pub struct Pcf8833;

impl WindowProtocol for Pcf8833 {
    fn id(&self) -> ProtocolId {
        ProtocolId::Pcf8833
    }

    fn opcode(&self) -> u8 {
        0x01
    }

    fn max_coordinate(&self) -> (u32, u32) {
        (u8::MAX.into(), u8::MAX.into())
    }

    fn encode_window(&self, window: &Rect, offset: PanelOffset, packet: &mut [u8]) {
        packet[0] = self.opcode();
        // the controller registers are 8 bits wide
        packet[1] = offset.apply_x(window.x_start) as u8;
        packet[2] = offset.apply_x(window.x_end) as u8;
        packet[3] = offset.apply_y(window.y_start) as u8;
        packet[4] = offset.apply_y(window.y_end) as u8;
    }

    fn decode_window(&self, packet: &[u8], offset: PanelOffset) -> Option<Rect> {
        if packet.len() < 5 || packet[0] != self.opcode() {
            return None;
        }
        let x = |b: u8| (b as i32 - offset.x as i32).rem_euclid(256) as u32;
        let y = |b: u8| (b as i32 - offset.y as i32).rem_euclid(256) as u32;
        Some(Rect::new(x(packet[1]), y(packet[3]), x(packet[2]), y(packet[4])))
    }
}

pub struct Mercury;

impl WindowProtocol for Mercury {
    fn id(&self) -> ProtocolId {
        ProtocolId::Mercury
    }

    fn opcode(&self) -> u8 {
        0x10
    }

    fn max_coordinate(&self) -> (u32, u32) {
        (u16::MAX.into(), u8::MAX.into())
    }

    fn encode_window(&self, window: &Rect, offset: PanelOffset, packet: &mut [u8]) {
        packet[0] = self.opcode();
        packet[1..3].copy_from_slice(&(offset.apply_x(window.x_start) as u16).to_be_bytes());
        packet[3..5].copy_from_slice(&(offset.apply_x(window.x_end) as u16).to_be_bytes());
        packet[5] = offset.apply_y(window.y_start) as u8;
        packet[6] = offset.apply_y(window.y_end) as u8;
    }

    fn decode_window(&self, packet: &[u8], offset: PanelOffset) -> Option<Rect> {
        if packet.len() < 7 || packet[0] != self.opcode() {
            return None;
        }
        let x = |hi: u8, lo: u8| {
            (u16::from_be_bytes([hi, lo]) as i32 - offset.x as i32).rem_euclid(65536) as u32
        };
        let y = |b: u8| (b as i32 - offset.y as i32).rem_euclid(256) as u32;
        Some(Rect::new(
            x(packet[1], packet[2]),
            y(packet[5]),
            x(packet[3], packet[4]),
            y(packet[6]),
        ))
    }
}

/// Wire pixel packing, selected by the descriptor's bpp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 12 bpp, two pixels in three bytes
    Rgb444,
    /// 16 bpp, big-endian RGB565
    Rgb565,
    /// 24 bpp, bytes copied from the intermediate
    Rgb888,
}

impl PixelFormat {
    pub fn from_bpp(bpp: u8) -> Option<Self> {
        match bpp {
            12 => Some(Self::Rgb444),
            16 => Some(Self::Rgb565),
            24 => Some(Self::Rgb888),
            _ => None,
        }
    }

    pub fn bpp(self) -> u8 {
        match self {
            Self::Rgb444 => 12,
            Self::Rgb565 => 16,
            Self::Rgb888 => 24,
        }
    }

    /// Widen a window to what the format can address. 12 bpp needs an even
    /// start column and an even width, so the result may reach one column
    /// past the panel edge.
    pub fn align_window(self, rect: Rect) -> Rect {
        match self {
            Self::Rgb444 => {
                let x_start = rect.x_start & !1;
                let x_end = rect.x_end + ((rect.x_end - x_start + 1) & 1);
                Rect::new(x_start, rect.y_start, x_end, rect.y_end)
            }
            Self::Rgb565 | Self::Rgb888 => rect,
        }
    }

    /// Wire bytes needed for `pixels` pixels (even for 12 bpp)
    pub fn payload_len(self, pixels: usize) -> usize {
        match self {
            Self::Rgb444 => pixels / 2 * 3,
            Self::Rgb565 => pixels * 2,
            Self::Rgb888 => pixels * 3,
        }
    }

    /// Pack tightly packed RGB triplets onto the wire
    pub fn pack(self, rgb: &[u8], out: &mut PacketWriter<'_>) {
        match self {
            Self::Rgb888 => out.extend(rgb),
            Self::Rgb565 => {
                for px in rgb.chunks_exact(3) {
                    let c = (u16::from(px[0]) >> 3) << 11
                        | (u16::from(px[1]) >> 2) << 5
                        | u16::from(px[2]) >> 3;
                    out.extend(&c.to_be_bytes());
                }
            }
            Self::Rgb444 => {
                for pair in rgb.chunks_exact(6) {
                    let c = |p: &[u8]| {
                        u32::from(p[0] >> 4) << 8 | u32::from(p[1] >> 4) << 4 | u32::from(p[2] >> 4)
                    };
                    let packed = c(&pair[..3]) << 12 | c(&pair[3..]);
                    out.extend(&packed.to_be_bytes()[1..]);
                }
            }
        }
    }

    /// Expand wire bytes back to RGB triplets with the low bits zeroed
    pub fn unpack(self, wire: &[u8]) -> Vec<u8> {
        match self {
            Self::Rgb888 => wire.to_vec(),
            Self::Rgb565 => wire
                .chunks_exact(2)
                .flat_map(|b| {
                    let c = u16::from_be_bytes([b[0], b[1]]);
                    [
                        ((c >> 11) as u8) << 3,
                        (((c >> 5) & 0x3f) as u8) << 2,
                        ((c & 0x1f) as u8) << 3,
                    ]
                })
                .collect(),
            Self::Rgb444 => wire
                .chunks_exact(3)
                .flat_map(|b| {
                    let v = u32::from_be_bytes([0, b[0], b[1], b[2]]);
                    let nib = |shift: u32| (((v >> shift) & 0xf) as u8) << 4;
                    [nib(20), nib(16), nib(12), nib(8), nib(4), nib(0)]
                })
                .collect(),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bpp", self.bpp())
    }
}
