//! Packet framing for the outbound data window
//!
//! The firmware consumes the data window in 64-byte USB packets. A stream
//! starts with one command packet (window selection), followed by data
//! packets whose first byte is a `0xC0 | n` header and whose remaining 63
//! bytes carry pixel payload. The header value the firmware expects is
//! `0xC0 + 62` for a completely filled packet and `0xC0 + k` for the final
//! packet holding `k` payload bytes. The finished stream is zero padded to a
//! whole number of sectors.

pub const PACKET_SIZE: usize = 64;
pub const SECTOR_SIZE: usize = 512;

/// Payload bytes carried by one data packet
pub const PACKET_PAYLOAD: usize = PACKET_SIZE - 1;

const HEADER_BASE: u8 = 0xC0;

/// Bytes needed on the wire for one command packet plus `payload` bytes,
/// rounded up to whole sectors
pub fn stream_len(payload: usize) -> usize {
    let packets = 1 + payload.div_ceil(PACKET_PAYLOAD);
    pad_to_sector(packets * PACKET_SIZE)
}

pub fn pad_to_sector(len: usize) -> usize {
    len.div_ceil(SECTOR_SIZE).max(1) * SECTOR_SIZE
}

/// Writes a packet stream into a caller-owned buffer
///
/// The buffer must be at least [`stream_len`] bytes for the payload that will
/// be pushed.
pub struct PacketWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
    payload: usize,
}

impl<'a> PacketWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            payload: 0,
        }
    }

    /// Start a new packet and let `fill` write its 64 bytes verbatim
    pub fn command(&mut self, fill: impl FnOnce(&mut [u8])) {
        self.end_packet();
        let packet = &mut self.buf[self.pos..self.pos + PACKET_SIZE];
        packet.fill(0);
        fill(packet);
        self.pos += PACKET_SIZE;
    }

    /// Append one payload byte, opening and closing data packets as needed
    pub fn push(&mut self, byte: u8) {
        if self.pos % PACKET_SIZE == 0 {
            // header slot, written when the packet is closed
            self.pos += 1;
        }
        self.buf[self.pos] = byte;
        self.pos += 1;
        self.payload += 1;
        if self.pos % PACKET_SIZE == 0 {
            self.buf[self.pos - PACKET_SIZE] = HEADER_BASE + (PACKET_PAYLOAD - 1) as u8;
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.push(b);
        }
    }

    /// Close a partially filled packet by writing its header
    fn end_packet(&mut self) {
        let offset = self.pos % PACKET_SIZE;
        if offset == 0 {
            return;
        }
        let start = self.pos - offset;
        self.buf[start] = HEADER_BASE + (offset - 1) as u8;
        self.buf[self.pos..start + PACKET_SIZE].fill(0);
        self.pos = start + PACKET_SIZE;
    }

    /// Number of payload bytes pushed so far
    pub fn payload_len(&self) -> usize {
        self.payload
    }

    /// Close the last packet and zero-pad to a sector boundary.
    /// Returns the stream length.
    pub fn finish(mut self) -> usize {
        self.end_packet();
        let len = pad_to_sector(self.pos);
        self.buf[self.pos..len].fill(0);
        len
    }
}

/// Walk the data packets of a stream, yielding exactly `expected` payload
/// bytes. Used by the emulator to reassemble what the firmware would see.
pub fn collect_payload(data_packets: &[u8], expected: usize) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    for packet in data_packets.chunks(PACKET_SIZE) {
        if out.len() == expected {
            break;
        }
        let header = *packet.first()?;
        if header & HEADER_BASE != HEADER_BASE {
            return None;
        }
        let take = (expected - out.len()).min(PACKET_PAYLOAD).min(packet.len() - 1);
        out.extend_from_slice(&packet[1..1 + take]);
    }
    (out.len() == expected).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_len() {
        assert_eq!(stream_len(0), 512);
        // command packet + 2 data packets
        assert_eq!(stream_len(100), 512);
        // 300 bytes: 5 data packets + command = 384 bytes
        assert_eq!(stream_len(300), 512);
        // 320x240x3: 3658 data packets + 1
        assert_eq!(stream_len(320 * 240 * 3), 234_496);
    }

    #[test]
    fn test_headers() {
        let mut buf = vec![0xAA; 1024];
        let mut w = PacketWriter::new(&mut buf);
        w.command(|p| p[0] = 0x10);
        w.extend(&[7u8; 65]);
        assert_eq!(w.payload_len(), 65);
        let len = w.finish();
        assert_eq!(len, 512);

        assert_eq!(buf[0], 0x10);
        assert!(buf[1..64].iter().all(|&b| b == 0));
        // full packet
        assert_eq!(buf[64], 0xC0 + 62);
        assert!(buf[65..128].iter().all(|&b| b == 7));
        // trailing packet carrying two bytes
        assert_eq!(buf[128], 0xC0 + 2);
        assert_eq!(&buf[129..131], &[7, 7]);
        assert!(buf[192..512].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_exact_packet_boundary() {
        let mut buf = vec![0; 512];
        let mut w = PacketWriter::new(&mut buf);
        w.command(|p| p[0] = 1);
        w.extend(&[1u8; 63]);
        let len = w.finish();
        assert_eq!(len, 512);
        assert_eq!(buf[64], 0xC0 + 62);
        // nothing opened after the full packet
        assert_eq!(buf[128], 0);
    }

    #[test]
    fn test_collect_payload() {
        let payload: Vec<u8> = (0..200).map(|i| i as u8).collect();
        let mut buf = vec![0; stream_len(payload.len())];
        let mut w = PacketWriter::new(&mut buf);
        w.command(|p| p[0] = 1);
        w.extend(&payload);
        w.finish();
        let back = collect_payload(&buf[PACKET_SIZE..], payload.len()).unwrap();
        assert_eq!(back, payload);
        assert!(collect_payload(&buf[PACKET_SIZE..], payload.len() + 500).is_none());
    }
}
