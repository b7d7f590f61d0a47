//! Byte-level serial link

use serialport::SerialPort;
use std::io;

/// Byte stream underneath a [`Channel`](super::Channel)
///
/// Implemented for OS serial ports, the simulated probe and test doubles.
pub trait SerialLink: Send {
    /// Write bytes, returning how many were accepted
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Read available bytes; `Ok(0)` or a `TimedOut` error mean nothing arrived yet
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Number of bytes waiting in the input buffer
    fn bytes_to_read(&mut self) -> io::Result<u32>;

    /// Discard everything waiting in the input buffer
    fn clear_input(&mut self) -> io::Result<()>;
}

impl SerialLink for Box<dyn SerialPort> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        io::Write::write_all(self, data)?;
        io::Write::flush(self)?;
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(self, buf)
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        (**self).bytes_to_read().map_err(io::Error::from)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        (**self)
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::from)
    }
}
