//! Byte transport between the host and the controller
//!
//! The engine never touches hardware itself; it talks to a [`Transport`],
//! which may be a UART, an SPI bridge or a Linux HCI socket.

use std::io;

/// A buffered byte source and sink connected to a controller
pub trait Transport {
    /// Opens a burst read. Every call is paired with [`Transport::end_read`].
    fn start_read(&mut self) {}

    /// Closes a burst read opened with [`Transport::start_read`].
    fn end_read(&mut self) {}

    /// Number of bytes that can be read right now without blocking.
    ///
    /// A packet transport reports the length of the next whole packet.
    fn buffered(&mut self) -> io::Result<usize>;

    /// Whether each read returns exactly one packet, so that a read into a
    /// smaller buffer loses the rest of it.
    fn preserves_packet_boundaries(&self) -> bool {
        false
    }

    /// Reads up to `buf.len()` bytes, returning the number read
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes bytes to the controller, returning the number written
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Writes a whole frame
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf)? {
                0 => return Err(io::ErrorKind::WriteZero.into()),
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }
}
