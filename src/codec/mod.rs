//! Compression codecs.
//!
//! ZIP entries are compressed independently; this module maps a method id
//! from the central directory to a streaming decoder, and a requested
//! [`CompressionLevel`] to a streaming encoder. Only the stored and Deflate
//! methods are supported, which covers what this crate writes and the vast
//! majority of archives in the wild.

#[cfg(feature = "deflate")]
pub(crate) mod deflate;
pub(crate) mod store;

use std::io::{self, BufRead, Read, Write};

use crate::format::{ZIP_METHOD_DEFLATED, ZIP_METHOD_STORED};
use crate::metadata::CompressionLevel;
use crate::{Error, Result};

/// Builds a streaming decoder for an entry's compressed data.
///
/// `input` must be positioned at the first compressed byte and limited to
/// the entry's compressed span; `size` is the expected uncompressed size,
/// used to bound stored data.
pub(crate) fn decode_stream<R: BufRead + Send + 'static>(
    method: u16,
    input: R,
    size: u64,
) -> Result<Box<dyn Read + Send>> {
    match method {
        ZIP_METHOD_STORED => Ok(Box::new(store::StoredDecoder::new(input, size))),
        #[cfg(feature = "deflate")]
        ZIP_METHOD_DEFLATED => Ok(Box::new(deflate::DeflateDecoder::new(input))),
        other => Err(Error::UnsupportedMethod { method: other }),
    }
}

/// A streaming encoder for one entry's data.
///
/// An enum rather than a trait object so that [`finish`][Self::finish] can
/// hand the underlying writer back for header back-patching.
pub(crate) enum EntryEncoder<W: Write + Send> {
    /// Bytes pass through unchanged.
    Stored(W),
    /// Bytes go through a Deflate stream.
    #[cfg(feature = "deflate")]
    Deflated(deflate::DeflateEncoder<W>),
}

impl<W: Write + Send> EntryEncoder<W> {
    /// Creates an encoder for the given compression level.
    ///
    /// Fails with [`Error::UnsupportedMethod`] when a deflated level is
    /// requested but the `deflate` feature is disabled.
    pub fn new(output: W, level: CompressionLevel) -> Result<Self> {
        match level {
            CompressionLevel::None => Ok(EntryEncoder::Stored(output)),
            #[cfg(feature = "deflate")]
            _ => Ok(EntryEncoder::Deflated(deflate::DeflateEncoder::new(
                output,
                level.deflate_level(),
            ))),
            #[cfg(not(feature = "deflate"))]
            _ => Err(Error::UnsupportedMethod {
                method: ZIP_METHOD_DEFLATED,
            }),
        }
    }

    /// Writes a full chunk of uncompressed data.
    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            EntryEncoder::Stored(w) => w.write_all(buf),
            #[cfg(feature = "deflate")]
            EntryEncoder::Deflated(enc) => enc.write_all(buf),
        }
    }

    /// Flushes remaining compressed output and returns the inner writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            EntryEncoder::Stored(mut w) => {
                w.flush()?;
                Ok(w)
            }
            #[cfg(feature = "deflate")]
            EntryEncoder::Deflated(enc) => enc.try_finish(),
        }
    }
}

impl<W: Write + Send> std::fmt::Debug for EntryEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntryEncoder::Stored(_) => "Stored",
            #[cfg(feature = "deflate")]
            EntryEncoder::Deflated(_) => "Deflated",
        };
        f.debug_tuple(name).finish()
    }
}
