//! Deflate codec implementation.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::bufread::DeflateDecoder as FlateDecoder;
use flate2::write::DeflateEncoder as FlateEncoder;

/// Raw Deflate decoder (no zlib wrapper, per the ZIP container layout).
pub(crate) struct DeflateDecoder<R> {
    inner: FlateDecoder<R>,
}

impl<R> std::fmt::Debug for DeflateDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeflateDecoder").finish_non_exhaustive()
    }
}

impl<R: io::BufRead + Send> DeflateDecoder<R> {
    /// Creates a new Deflate decoder.
    ///
    /// # Arguments
    ///
    /// * `input` - The compressed data source (must implement BufRead)
    pub fn new(input: R) -> Self {
        Self {
            inner: FlateDecoder::new(input),
        }
    }
}

impl<R: io::BufRead + Send> Read for DeflateDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Raw Deflate encoder.
pub(crate) struct DeflateEncoder<W: Write> {
    inner: FlateEncoder<W>,
}

impl<W: Write> std::fmt::Debug for DeflateEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeflateEncoder").finish_non_exhaustive()
    }
}

impl<W: Write + Send> DeflateEncoder<W> {
    /// Creates a new Deflate encoder.
    ///
    /// # Arguments
    ///
    /// * `output` - The destination for compressed data
    /// * `level` - Compression level (0-9)
    pub fn new(output: W, level: u32) -> Self {
        Self {
            inner: FlateEncoder::new(output, Compression::new(level.min(9))),
        }
    }

    /// Finishes encoding, flushes all data, and returns the destination.
    pub fn try_finish(self) -> io::Result<W> {
        self.inner.finish()
    }
}

impl<W: Write + Send> Write for DeflateEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
