//! Positional-read abstraction over logical disks

use crate::error::{Error, Result};

/// Positional read over a logical disk.
///
/// This is the only surface the exFAT layer needs from an image container,
/// which keeps the filesystem code independent of how the bytes are stored
/// (fixed VHD, dynamic VHD with a block allocation table, raw image, or an
/// in-memory buffer in tests).
pub trait ReadAt {
    /// Fill `buf` from the logical disk starting at `offset`.
    ///
    /// Returns the number of bytes read. A short count means the read ran
    /// off the end of the logical disk; `Ok(0)` means `offset` is at or past
    /// the end.
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Fill all of `buf` from `offset`, or fail.
    ///
    /// Short reads become an `UnexpectedEof` I/O error. Used for structures
    /// that must be present in full (boot sector, FAT, headers).
    fn read_exact_at(&mut self, buf: &mut [u8], offset: u64) -> Result<()> {
        let n = self.read_at(buf, offset)?;
        if n < buf.len() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("short read at offset {}: {} of {} bytes", offset, n, buf.len()),
            )));
        }
        Ok(())
    }
}

/// In-memory byte buffers double as logical disks, mainly for tests.
impl<T: AsRef<[u8]>> ReadAt for std::io::Cursor<T> {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let data = self.get_ref().as_ref();
        if offset >= data.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }
}
