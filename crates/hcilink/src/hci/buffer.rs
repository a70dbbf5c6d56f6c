//! Receive buffer for HCI frame reassembly
//!
//! Bytes arrive from the transport in arbitrary chunks. [`PacketBuffer`]
//! accumulates them until the framer finds a complete frame at its head,
//! then drops that frame and shifts any trailing bytes back to offset zero.

use super::constants::HCI_BUFFER_SIZE;
use super::transport::Transport;
use crate::error::Result;
use log::warn;

/// Fixed-capacity byte queue with a read cursor and a fill level.
///
/// `pos` and `end` are private and only move through the methods below, so
/// `0 <= pos <= end <= N` holds for every value of this type.
pub struct PacketBuffer<const N: usize = HCI_BUFFER_SIZE> {
    data: [u8; N],
    pos: usize,
    end: usize,
}

impl<const N: usize> PacketBuffer<N> {
    pub fn new() -> Self {
        Self {
            data: [0u8; N],
            pos: 0,
            end: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of unread bytes
    pub fn len(&self) -> usize {
        self.end - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == self.end
    }

    /// Whether the fill level has reached capacity
    pub fn is_full(&self) -> bool {
        self.end == N
    }

    /// Unread bytes, starting at the head of the next frame
    pub fn unread(&self) -> &[u8] {
        &self.data[self.pos..self.end]
    }

    /// Performs one transport read for `available` bytes.
    ///
    /// The request is rounded up to a multiple of 4 and clamped to the free
    /// space, returning the number of bytes actually stored. When the
    /// transport delivers whole packets and the next one does not fit behind
    /// the buffered bytes, those bytes are discarded first so the packet is
    /// read intact.
    pub fn fill_from<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        available: usize,
    ) -> Result<usize> {
        if transport.preserves_packet_boundaries() && self.end > 0 && available > N - self.end {
            warn!(
                "Dropping {} buffered bytes to fit a {}-byte packet",
                self.len(),
                available
            );
            self.clear();
        }

        let requested = align_up(available).min(N - self.end);
        if requested == 0 {
            return Ok(0);
        }

        let read = transport
            .read(&mut self.data[self.end..self.end + requested])?
            .min(requested);
        self.end += read;
        Ok(read)
    }

    /// Appends bytes directly, returning how many fitted
    #[cfg(test)]
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> usize {
        let count = bytes.len().min(N - self.end);
        self.data[self.end..self.end + count].copy_from_slice(&bytes[..count]);
        self.end += count;
        count
    }

    /// Drops a complete frame of `len` bytes from the head and compacts.
    pub fn consume(&mut self, len: usize) {
        self.pos = (self.pos + len).min(self.end);
        if self.pos == self.end {
            self.clear();
        } else {
            self.data.copy_within(self.pos..self.end, 0);
            self.end -= self.pos;
            self.pos = 0;
        }
    }

    /// Discards everything buffered
    pub fn clear(&mut self) {
        self.pos = 0;
        self.end = 0;
    }
}

impl<const N: usize> Default for PacketBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn align_up(len: usize) -> usize {
    (len + 3) & !3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hci::mock::MockTransport;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0), 0);
        assert_eq!(align_up(1), 4);
        assert_eq!(align_up(4), 4);
        assert_eq!(align_up(7), 8);
    }

    #[test]
    fn test_fill_rounds_request_up_to_multiple_of_four() {
        let mut transport = MockTransport::new();
        transport.push_rx(&[0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00, 0xAA, 0xBB]);

        let mut buffer: PacketBuffer<64> = PacketBuffer::new();
        let read = buffer.fill_from(&mut transport, 5).unwrap();

        assert_eq!(read, 8);
        assert_eq!(transport.read_requests(), &[8]);
        assert_eq!(
            buffer.unread(),
            &[0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00, 0xAA]
        );
    }

    #[test]
    fn test_fill_never_exceeds_capacity() {
        let mut transport = MockTransport::new();
        transport.push_rx(&[0x11; 16]);

        let mut buffer: PacketBuffer<8> = PacketBuffer::new();
        buffer.extend_from_slice(&[0x22; 6]);
        let read = buffer.fill_from(&mut transport, 16).unwrap();

        assert_eq!(read, 2);
        assert!(buffer.is_full());
        assert_eq!(buffer.len(), 8);
        assert_eq!(buffer.fill_from(&mut transport, 14).unwrap(), 0);
    }

    #[test]
    fn test_fill_keeps_whole_packet_that_does_not_fit() {
        let mut transport = MockTransport::with_packets();
        transport.push_packet(&[0x04, 0x05, 0x04, 0x00, 0x40, 0x00, 0x13]);

        let mut buffer: PacketBuffer<10> = PacketBuffer::new();
        buffer.extend_from_slice(&[0x04, 0x3E, 0x08, 0x02, 0x01]);
        let read = buffer.fill_from(&mut transport, 7).unwrap();

        assert_eq!(read, 7);
        assert_eq!(transport.read_requests(), &[8]);
        assert_eq!(buffer.unread(), &[0x04, 0x05, 0x04, 0x00, 0x40, 0x00, 0x13]);
    }

    #[test]
    fn test_fill_appends_packet_that_fits() {
        let mut transport = MockTransport::with_packets();
        transport.push_packet(&[0x00, 0x13]);

        let mut buffer: PacketBuffer<16> = PacketBuffer::new();
        buffer.extend_from_slice(&[0x04, 0x05, 0x04, 0x00, 0x40]);
        buffer.fill_from(&mut transport, 2).unwrap();

        assert_eq!(buffer.unread(), &[0x04, 0x05, 0x04, 0x00, 0x40, 0x00, 0x13]);
    }

    #[test]
    fn test_consume_shifts_trailing_bytes_to_front() {
        let mut buffer: PacketBuffer<16> = PacketBuffer::new();
        buffer.extend_from_slice(&[1, 2, 3, 4, 5, 6]);

        buffer.consume(4);
        assert_eq!(buffer.unread(), &[5, 6]);
        assert_eq!(buffer.len(), 2);

        // The freed space is usable again
        assert_eq!(buffer.extend_from_slice(&[0; 14]), 14);
        assert!(buffer.is_full());
    }

    #[test]
    fn test_consume_past_end_empties_buffer() {
        let mut buffer: PacketBuffer<16> = PacketBuffer::new();
        buffer.extend_from_slice(&[1, 2, 3]);
        buffer.consume(10);
        assert!(buffer.is_empty());
        assert_eq!(buffer.extend_from_slice(&[0; 16]), 16);
    }

    #[test]
    fn test_clear_resets_cursor_and_fill() {
        let mut buffer: PacketBuffer<16> = PacketBuffer::new();
        buffer.extend_from_slice(&[1, 2, 3]);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 16);
    }
}
