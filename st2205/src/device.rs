//! Device handle for one photo frame
//!
//! [`St2205`] owns the open block device, the immutable panel descriptor, the
//! shadow copy of what the panel shows and the scratch buffers reused across
//! updates. Every pixel transfer is built completely in the wire buffer before
//! the device is touched, and the shadow is only updated once the write went
//! through in full, so a failed update can simply be repeated.

use crate::aligned::AlignedBuffer;
use crate::codec::{self, NATIVE_PIXEL_BYTES};
use crate::descriptor::{
    self, DescriptorSource, PanelDescriptor, FIRMWARE_PAGE, FIRMWARE_PAGE_LEN,
};
use crate::geometry::Rect;
use crate::packet::{stream_len, PacketWriter};
use crate::protocol::{ControlCommand, PixelFormat, ProtocolId};
use crate::region::{self, RegionBuffer, ShadowBuffer};
use crate::transport::{self, BlockDevice, Transport};
use crate::{Error, Result};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// How [`St2205::open_with`] treats the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    /// Open with `O_DIRECT`
    pub direct_io: bool,
    /// Refuse anything that is not a block device node
    pub require_block_device: bool,
    pub descriptor: DescriptorSource,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            direct_io: true,
            require_block_device: true,
            descriptor: DescriptorSource::Firmware,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn direct_io(mut self, on: bool) -> Self {
        self.direct_io = on;
        self
    }

    pub fn require_block_device(mut self, on: bool) -> Self {
        self.require_block_device = on;
        self
    }

    pub fn descriptor(mut self, source: DescriptorSource) -> Self {
        self.descriptor = source;
        self
    }
}

/// What one pixel transfer put on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    /// Window selected on the controller, after bpp alignment
    pub window: Rect,
    /// Packed pixel bytes, excluding packet headers and padding
    pub payload_bytes: usize,
    /// Bytes written to the data window
    pub wire_bytes: usize,
}

/// An open photo frame
pub struct St2205<D: BlockDevice = File> {
    transport: Transport<D>,
    descriptor: PanelDescriptor,
    shadow: ShadowBuffer,
    pending: Vec<u8>,
    wire: AlignedBuffer,
    synced: bool,
}

impl St2205<File> {
    /// Open the frame at `path` with default options
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &OpenOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = transport::open_device(path, options.direct_io, options.require_block_device)?;
        Self::from_device(file, options)
    }
}

impl<D: BlockDevice> St2205<D> {
    /// Identify the frame behind `dev` and switch it to direct LCD mode
    pub fn from_device(dev: D, options: &OpenOptions) -> Result<Self> {
        // parsed descriptors are checked by `PanelDescriptor::new`
        if let DescriptorSource::Fixed(d) = &options.descriptor {
            d.validate()?;
        }
        let mut transport = Transport::new(dev);

        let sector0 = transport.read_sector0().map_err(unreadable)?;
        if !descriptor::is_photoframe(sector0) {
            return Err(Error::NotPhotoFrame);
        }

        let descriptor = match options.descriptor {
            DescriptorSource::Firmware => read_param_block(&mut transport)?,
            DescriptorSource::Fixed(d) => d,
        };

        transport.send_hack().map_err(unreadable)?;

        let pixels = descriptor.pixel_count();
        // 12 bpp windows can reach one column past the panel
        let widest = (descriptor.width as usize + 1) * descriptor.height as usize;
        let wire = AlignedBuffer::zeroed(stream_len(descriptor.format.payload_len(widest)));

        info!(
            "detected device, {}x{}, {}, {} protocol",
            descriptor.width, descriptor.height, descriptor.format, descriptor.protocol
        );

        Ok(Self {
            transport,
            descriptor,
            shadow: ShadowBuffer::new(descriptor.width, descriptor.height),
            pending: vec![0; pixels * NATIVE_PIXEL_BYTES],
            wire,
            synced: false,
        })
    }

    /// Release the device. Writes are synchronous, so nothing is flushed.
    pub fn close(self) {
        debug!("closing frame");
        drop(self);
    }

    /// Release the handle and hand back the underlying device
    pub fn into_device(self) -> D {
        self.transport.into_device()
    }

    pub fn device(&self) -> &D {
        self.transport.device()
    }

    pub fn device_mut(&mut self) -> &mut D {
        self.transport.device_mut()
    }

    pub fn descriptor(&self) -> &PanelDescriptor {
        &self.descriptor
    }

    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    pub fn bpp(&self) -> u8 {
        self.descriptor.format.bpp()
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.descriptor.format
    }

    pub fn protocol(&self) -> ProtocolId {
        self.descriptor.protocol
    }

    /// RGB copy of what the panel is believed to show
    pub fn shadow(&self) -> &[u8] {
        self.shadow.as_bytes()
    }

    /// Forget what the panel shows; the next [`update_changed`] sends the
    /// whole frame
    ///
    /// [`update_changed`]: Self::update_changed
    pub fn invalidate(&mut self) {
        self.synced = false;
    }

    pub fn backlight(&mut self, on: bool) -> Result<()> {
        let command = if on {
            ControlCommand::BacklightOn
        } else {
            ControlCommand::BacklightOff
        };
        self.transport.send_control(command as u8)?;
        debug!(on, "backlight");
        Ok(())
    }

    pub fn lcd_sleep(&mut self, sleep: bool) -> Result<()> {
        let command = if sleep {
            ControlCommand::LcdSleep
        } else {
            ControlCommand::LcdWake
        };
        self.transport.send_control(command as u8)?;
        debug!(sleep, "lcd sleep");
        Ok(())
    }

    /// Send a whole RGBA frame
    pub fn update_full(&mut self, rgba: &[u8]) -> Result<TransferReport> {
        let mut pending = std::mem::take(&mut self.pending);
        let result = codec::encode_full_into(rgba, self.width(), self.height(), &mut pending)
            .and_then(|()| self.write_full(&pending));
        self.pending = pending;
        result
    }

    /// Send `rect` of a whole RGBA frame
    pub fn update_region(&mut self, rgba: &[u8], rect: Rect) -> Result<TransferReport> {
        let region = codec::encode_region(rgba, self.width(), self.height(), rect)?;
        self.write_partial(&region)
    }

    /// Send the part of an RGBA frame that differs from the shadow
    pub fn update_rgba_changed(&mut self, rgba: &[u8]) -> Result<Option<TransferReport>> {
        let mut pending = std::mem::take(&mut self.pending);
        let result = codec::encode_full_into(rgba, self.width(), self.height(), &mut pending)
            .and_then(|()| self.update_changed(&pending));
        self.pending = pending;
        result
    }

    /// Send a whole pre-rendered RGB frame
    pub fn write_full(&mut self, rgb: &[u8]) -> Result<TransferReport> {
        codec::check_len("RGB", rgb.len(), self.width(), self.height(), NATIVE_PIXEL_BYTES)?;
        let rect = Rect::full(self.width(), self.height());
        let report = self.send_rect(rect, rgb)?;
        self.synced = true;
        Ok(report)
    }

    /// Send a tightly packed RGB rectangle
    pub fn write_partial(&mut self, region: &RegionBuffer) -> Result<TransferReport> {
        region.rect.validate(self.width(), self.height())?;
        if region.data.len() != region.rect.pixel_count() * NATIVE_PIXEL_BYTES {
            return Err(Error::Range(format!(
                "region {} carries {} bytes",
                region.rect,
                region.data.len()
            )));
        }
        self.send_rect(region.rect, &region.data)
    }

    /// Send `rect` of a whole pre-rendered RGB frame
    pub fn send_partial(&mut self, rgb: &[u8], rect: Rect) -> Result<TransferReport> {
        let region = region::extract(rgb, self.width(), self.height(), rect)?;
        self.send_rect(rect, &region.data)
    }

    /// Send only the bounding box of pixels that differ from the shadow.
    ///
    /// The first call after open or [`invalidate`](Self::invalidate) sends the
    /// whole frame since the panel contents are unknown. Returns `None` when
    /// nothing changed.
    pub fn update_changed(&mut self, rgb: &[u8]) -> Result<Option<TransferReport>> {
        if !self.synced {
            return self.write_full(rgb).map(Some);
        }
        match self.shadow.changed_bounds(rgb)? {
            None => {
                debug!("frame unchanged, nothing sent");
                Ok(None)
            }
            Some(rect) => self.send_partial(rgb, rect).map(Some),
        }
    }

    /// Transmit a validated rectangle and commit it to the shadow
    fn send_rect(&mut self, rect: Rect, rgb: &[u8]) -> Result<TransferReport> {
        let window = self.descriptor.format.align_window(rect);
        if window == rect {
            let report = self.transmit(window, rgb)?;
            self.shadow.commit_rect(rect, rgb)?;
            return Ok(report);
        }

        let requested = RegionBuffer {
            rect,
            data: rgb.to_vec(),
        };
        let widened = self.shadow.fill_window(window, &requested);
        let report = self.transmit(window, &widened.data)?;
        let visible = self.shadow.clip(widened);
        self.shadow.commit_region(&visible)?;
        Ok(report)
    }

    fn transmit(&mut self, window: Rect, rgb: &[u8]) -> Result<TransferReport> {
        let d = self.descriptor;
        let mut writer = PacketWriter::new(&mut self.wire);
        writer.command(|packet| {
            d.protocol
                .window_protocol()
                .encode_window(&window, d.offset, packet)
        });
        d.format.pack(rgb, &mut writer);
        let payload_bytes = writer.payload_len();
        let wire_bytes = writer.finish();

        self.transport.write_stream(&self.wire[..wire_bytes])?;
        debug!(%window, payload_bytes, wire_bytes, "sent window");

        Ok(TransferReport {
            window,
            payload_bytes,
            wire_bytes,
        })
    }
}

/// I/O failures while identifying the frame are open failures
fn unreadable(err: Error) -> Error {
    match err {
        Error::Io(e) => Error::Descriptor(format!("device I/O failed: {}", e)),
        e @ Error::ShortWrite { .. } => Error::Descriptor(e.to_string()),
        other => other,
    }
}

fn read_param_block<D: BlockDevice>(transport: &mut Transport<D>) -> Result<PanelDescriptor> {
    let mut firmware = AlignedBuffer::zeroed(2 * FIRMWARE_PAGE_LEN);
    for (i, page) in firmware.chunks_exact_mut(FIRMWARE_PAGE_LEN).enumerate() {
        transport
            .read_firmware_page(FIRMWARE_PAGE + i as u32, page)
            .map_err(unreadable)?;
    }
    PanelDescriptor::find(&firmware)
}
