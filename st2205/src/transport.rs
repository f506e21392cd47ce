//! Block-device transport
//!
//! The frame speaks through fixed sectors of its fake disk:
//!
//! | offset   | direction | purpose                                   |
//! |----------|-----------|-------------------------------------------|
//! | `0x0000` | read      | sector 0, carries the Sitronix signature  |
//! | `0x6200` | write     | command sector                            |
//! | `0x6600` | write     | data window (pixel streams, control)      |
//! | `0xB000` | read      | data requested by a command               |
//!
//! Every transfer is one positioned read or write. Writes are never retried
//! or continued after a short count; the caller gets an error and may repeat
//! the whole operation.

use crate::aligned::AlignedBuffer;
use crate::packet::SECTOR_SIZE;
use crate::{Error, Result};
use std::fs::File;
use std::io;
use std::os::unix::fs::{FileExt, FileTypeExt, OpenOptionsExt};
use std::path::Path;
use tracing::{debug, trace};

pub const POS_CMD: u64 = 0x6200;
pub const POS_WDAT: u64 = 0x6600;
pub const POS_RDAT: u64 = 0xB000;

/// Command sector opcodes
pub mod opcode {
    /// Read firmware page `arg1`, `arg2` bytes, into the read window
    pub const READ_FIRMWARE: u8 = 4;
    /// Followed by `"HACK"`: route the data window straight to the LCD
    pub const HACK: u8 = 8;
}

/// Positioned byte access to the frame's disk
pub trait BlockDevice {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<usize>;
}

impl BlockDevice for File {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        FileExt::read_at(self, buf, offset)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<usize> {
        FileExt::write_at(self, buf, offset)
    }
}

impl<T: BlockDevice + ?Sized> BlockDevice for Box<T> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<usize> {
        (**self).write_at(offset, buf)
    }
}

/// Open the device node read/write.
///
/// With `direct_io` the page cache is bypassed so reads of the command
/// response window see fresh data.
pub fn open_device(path: &Path, direct_io: bool, require_block_device: bool) -> Result<File> {
    let mut options = std::fs::OpenOptions::new();
    options.read(true).write(true);
    if direct_io {
        options.custom_flags(libc::O_DIRECT);
    }
    let open_err = |source| Error::Open {
        path: path.to_path_buf(),
        source,
    };
    let file = options.open(path).map_err(open_err)?;
    let file_type = file.metadata().map_err(open_err)?.file_type();
    if require_block_device && !file_type.is_block_device() {
        return Err(Error::NotBlockDevice(path.to_path_buf()));
    }
    debug!(path = %path.display(), direct_io, "opened frame device");
    Ok(file)
}

fn retry_interrupted(mut op: impl FnMut() -> io::Result<usize>) -> io::Result<usize> {
    loop {
        match op() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Command/data access on top of a [`BlockDevice`]
pub(crate) struct Transport<D> {
    dev: D,
    sector: AlignedBuffer,
}

impl<D: BlockDevice> Transport<D> {
    pub fn new(dev: D) -> Self {
        Self {
            dev,
            sector: AlignedBuffer::zeroed(SECTOR_SIZE),
        }
    }

    pub fn device(&self) -> &D {
        &self.dev
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.dev
    }

    pub fn into_device(self) -> D {
        self.dev
    }

    /// Write all of `buf` at `offset` in one call
    pub fn write_exact(dev: &mut D, offset: u64, buf: &[u8]) -> Result<()> {
        let written = retry_interrupted(|| dev.write_at(offset, buf))?;
        if written != buf.len() {
            return Err(Error::ShortWrite {
                offset,
                expected: buf.len(),
                written,
            });
        }
        trace!(offset, len = buf.len(), "wrote");
        Ok(())
    }

    fn read_exact(dev: &mut D, offset: u64, buf: &mut [u8]) -> Result<()> {
        let read = retry_interrupted(|| dev.read_at(offset, buf))?;
        if read != buf.len() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("read {} of {} bytes at 0x{:x}", read, buf.len(), offset),
            )));
        }
        Ok(())
    }

    /// Read sector 0 into the scratch sector and return it
    pub fn read_sector0(&mut self) -> Result<&[u8]> {
        Self::read_exact(&mut self.dev, 0, &mut self.sector)?;
        Ok(&self.sector[..])
    }

    /// Send a command sector `[op, arg1 BE, arg2 BE, arg3, 0...]`
    pub fn send_command(&mut self, op: u8, arg1: u32, arg2: u32, arg3: u8) -> Result<()> {
        let sector = &mut self.sector[..];
        sector.fill(0);
        sector[0] = op;
        sector[1..5].copy_from_slice(&arg1.to_be_bytes());
        sector[5..9].copy_from_slice(&arg2.to_be_bytes());
        sector[9] = arg3;
        Self::write_exact(&mut self.dev, POS_CMD, &self.sector)
    }

    /// Switch the firmware into direct LCD mode
    pub fn send_hack(&mut self) -> Result<()> {
        let sector = &mut self.sector[..];
        sector.fill(0);
        sector[0] = opcode::HACK;
        sector[1..5].copy_from_slice(b"HACK");
        Self::write_exact(&mut self.dev, POS_CMD, &self.sector)
    }

    /// Fetch one firmware page through the read window
    pub fn read_firmware_page(&mut self, page: u32, out: &mut [u8]) -> Result<()> {
        self.send_command(opcode::READ_FIRMWARE, page, out.len() as u32, 0)?;
        Self::read_exact(&mut self.dev, POS_RDAT, out)
    }

    /// Write a finished packet stream into the data window
    pub fn write_stream(&mut self, stream: &[u8]) -> Result<()> {
        Self::write_exact(&mut self.dev, POS_WDAT, stream)
    }

    /// Single-byte control command, zero padded to a sector
    pub fn send_control(&mut self, code: u8) -> Result<()> {
        let sector = &mut self.sector[..];
        sector.fill(0);
        sector[0] = code;
        Self::write_exact(&mut self.dev, POS_WDAT, &self.sector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_missing_path() {
        let err = open_device(Path::new("/nonexistent/st2205"), false, true).unwrap_err();
        assert!(matches!(err, Error::Open { .. }));
        assert_eq!(err.kind(), crate::ErrorKind::Open);
    }

    #[test]
    fn test_open_regular_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 512]).unwrap();
        let err = open_device(file.path(), false, true).unwrap_err();
        assert!(matches!(err, Error::NotBlockDevice(_)));
        assert!(open_device(file.path(), false, false).is_ok());
    }

    #[test]
    fn test_command_sector_layout() {
        let file = tempfile::tempfile().unwrap();
        file.set_len(0x10000).unwrap();
        let mut t = Transport::new(file);
        t.send_command(opcode::READ_FIRMWARE, 0xFE, 0x8000, 7).unwrap();
        let mut sector = [0u8; 16];
        BlockDevice::read_at(t.device_mut(), POS_CMD, &mut sector).unwrap();
        assert_eq!(
            &sector[..10],
            &[4, 0, 0, 0, 0xFE, 0, 0, 0x80, 0, 7]
        );

        t.send_hack().unwrap();
        BlockDevice::read_at(t.device_mut(), POS_CMD, &mut sector).unwrap();
        assert_eq!(&sector[..5], b"\x08HACK");
        assert_eq!(&sector[5..10], &[0; 5]);
    }
}
