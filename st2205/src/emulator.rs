//! In-memory photo frame
//!
//! Behaves like a frame running the hacked firmware: sector 0 carries the
//! signature, firmware pages can be read back through the command window,
//! and pixel streams written to the data window are decoded into a
//! framebuffer using the frame's own protocol and pixel format. Transfers
//! are recorded so callers can check exactly what went over the wire; long
//! runs can clear the log or switch recording off. Faults can be injected
//! into the next data-window write.

use crate::descriptor::{PanelDescriptor, FIRMWARE_PAGE, FIRMWARE_PAGE_LEN, SIGNATURE};
use crate::geometry::Rect;
use crate::packet::{collect_payload, PACKET_SIZE};
use crate::protocol::ControlCommand;
use crate::transport::{opcode, BlockDevice, POS_CMD, POS_RDAT, POS_WDAT};
use std::io;
use tracing::debug;

/// Where the parameter block sits inside the emulated firmware pages
const PARAM_BLOCK_AT: usize = 0x1234;

/// One decoded pixel stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Window as selected on the controller (may exceed the panel at 12 bpp)
    pub window: Rect,
    /// Pixel bytes as packed on the wire, packet headers removed
    pub payload: Vec<u8>,
    /// Total bytes written to the data window, padding included
    pub wire_len: usize,
}

/// Failure injected into the next data-window write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The write fails with an I/O error and has no effect
    Error,
    /// Only this many bytes are accepted; the stream is discarded
    Short(usize),
}

pub struct EmulatedFrame {
    descriptor: PanelDescriptor,
    signature: bool,
    firmware: Vec<u8>,
    read_window: Vec<u8>,
    framebuffer: Vec<u8>,
    hacked: bool,
    backlight: bool,
    asleep: bool,
    transfers: Vec<Transfer>,
    recording: bool,
    transfer_count: usize,
    controls: Vec<ControlCommand>,
    fault: Option<Fault>,
}

impl EmulatedFrame {
    /// Frame whose firmware carries a parameter block for `descriptor`.
    /// Panels wider or taller than 255 pixels cannot be described by the
    /// block and get stock firmware instead.
    pub fn new(descriptor: PanelDescriptor) -> Self {
        let mut frame = Self::without_param_block(descriptor);
        if let Some(block) = descriptor.to_bytes() {
            frame.firmware[PARAM_BLOCK_AT..PARAM_BLOCK_AT + block.len()]
                .copy_from_slice(&block);
        }
        frame
    }

    /// Frame with stock firmware; callers must supply a fixed descriptor
    pub fn without_param_block(descriptor: PanelDescriptor) -> Self {
        let firmware = (0..2 * FIRMWARE_PAGE_LEN)
            .map(|i| (i as u32).wrapping_mul(2_654_435_761).to_be_bytes()[0] & 0x7f)
            .collect();
        Self {
            descriptor,
            signature: true,
            firmware,
            read_window: Vec::new(),
            framebuffer: vec![0; descriptor.pixel_count() * 3],
            hacked: false,
            backlight: true,
            asleep: false,
            transfers: Vec::new(),
            recording: true,
            transfer_count: 0,
            controls: Vec::new(),
            fault: None,
        }
    }

    /// An ordinary USB disk: no Sitronix signature in sector 0
    pub fn plain_disk(descriptor: PanelDescriptor) -> Self {
        Self {
            signature: false,
            ..Self::new(descriptor)
        }
    }

    pub fn descriptor(&self) -> &PanelDescriptor {
        &self.descriptor
    }

    /// Displayed RGB pixels, quantised to the panel's bit depth
    pub fn framebuffer(&self) -> &[u8] {
        &self.framebuffer
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.descriptor.width as usize + x as usize) * 3;
        [self.framebuffer[i], self.framebuffer[i + 1], self.framebuffer[i + 2]]
    }

    pub fn is_hacked(&self) -> bool {
        self.hacked
    }

    pub fn backlight_on(&self) -> bool {
        self.backlight
    }

    pub fn is_asleep(&self) -> bool {
        self.asleep
    }

    /// Transfers recorded since the last [`clear_transfers`](Self::clear_transfers)
    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    /// Pixel streams decoded since the frame was created, recorded or not
    pub fn transfer_count(&self) -> usize {
        self.transfer_count
    }

    pub fn clear_transfers(&mut self) {
        self.transfers.clear();
    }

    /// Keep decoded transfers for [`transfers`](Self::transfers). On by
    /// default; the framebuffer is updated either way.
    pub fn set_recording(&mut self, on: bool) {
        self.recording = on;
        if !on {
            self.transfers = Vec::new();
        }
    }

    pub fn controls(&self) -> &[ControlCommand] {
        &self.controls
    }

    pub fn inject_fault(&mut self, fault: Fault) {
        self.fault = Some(fault);
    }

    fn handle_command(&mut self, sector: &[u8]) -> io::Result<()> {
        match sector.first().copied() {
            Some(opcode::READ_FIRMWARE) if sector.len() >= 9 => {
                let page = u32::from_be_bytes([sector[1], sector[2], sector[3], sector[4]]);
                let len = u32::from_be_bytes([sector[5], sector[6], sector[7], sector[8]]) as usize;
                let mut data = vec![0; len];
                if let Some(index) = page.checked_sub(FIRMWARE_PAGE).filter(|i| *i < 2) {
                    let start = index as usize * FIRMWARE_PAGE_LEN;
                    let end = (start + len).min(self.firmware.len());
                    data[..end - start].copy_from_slice(&self.firmware[start..end]);
                }
                self.read_window = data;
            }
            Some(opcode::HACK) if sector.get(1..5) == Some(b"HACK") => {
                debug!("emulated frame entering direct LCD mode");
                self.hacked = true;
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_data(&mut self, stream: &[u8]) -> io::Result<()> {
        let invalid = |msg: String| io::Error::new(io::ErrorKind::InvalidData, msg);
        if !self.hacked {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "data window written before HACK command",
            ));
        }
        let opcode = *stream.first().ok_or_else(|| invalid("empty stream".into()))?;

        if let Some(command) = ControlCommand::from_code(opcode) {
            match command {
                ControlCommand::BacklightOn => self.backlight = true,
                ControlCommand::BacklightOff => self.backlight = false,
                ControlCommand::LcdWake => self.asleep = false,
                ControlCommand::LcdSleep => self.asleep = true,
            }
            self.controls.push(command);
            return Ok(());
        }

        let d = self.descriptor;
        let window = d
            .protocol
            .window_protocol()
            .decode_window(stream, d.offset)
            .ok_or_else(|| invalid(format!("unknown window opcode 0x{:02x}", opcode)))?;
        if window.x_start > window.x_end || window.y_start > window.y_end {
            return Err(invalid(format!("inverted window {}", window)));
        }
        let expected = d.format.payload_len(window.pixel_count());
        let payload = collect_payload(&stream[PACKET_SIZE.min(stream.len())..], expected)
            .ok_or_else(|| invalid(format!("stream too short for window {}", window)))?;

        let rgb = d.format.unpack(&payload);
        let mut pixels = rgb.chunks_exact(3);
        for y in window.y_start..=window.y_end {
            for x in window.x_start..=window.x_end {
                let Some(px) = pixels.next() else { break };
                if x < d.width && y < d.height {
                    let i = (y as usize * d.width as usize + x as usize) * 3;
                    self.framebuffer[i..i + 3].copy_from_slice(px);
                }
            }
        }

        self.transfer_count += 1;
        if self.recording {
            self.transfers.push(Transfer {
                window,
                payload,
                wire_len: stream.len(),
            });
        }
        Ok(())
    }
}

impl BlockDevice for EmulatedFrame {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        buf.fill(0);
        match offset {
            0 if self.signature => {
                let n = SIGNATURE.len().min(buf.len());
                buf[..n].copy_from_slice(&SIGNATURE[..n]);
            }
            POS_RDAT => {
                let n = self.read_window.len().min(buf.len());
                buf[..n].copy_from_slice(&self.read_window[..n]);
            }
            _ => {}
        }
        Ok(buf.len())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<usize> {
        match offset {
            POS_CMD => self.handle_command(buf).map(|_| buf.len()),
            POS_WDAT => match self.fault.take() {
                Some(Fault::Error) => Err(io::Error::new(io::ErrorKind::Other, "injected fault")),
                Some(Fault::Short(n)) => Ok(n.min(buf.len())),
                None => self.handle_data(buf).map(|_| buf.len()),
            },
            _ => Ok(buf.len()),
        }
    }
}
