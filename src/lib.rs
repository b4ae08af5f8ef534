//! # zipkit
//!
//! A pure-Rust library for reading and writing ZIP archives.
//!
//! This crate provides listing, chunked extraction, appending, overwriting,
//! and deleting entries in ZIP archives, with legacy ZipCrypto password
//! support and CRC-32 verification on every complete read.
//!
//! ## Quick Start
//!
//! ### Reading an Archive
//!
//! ```rust,no_run
//! use zipkit::{Archive, Result};
//!
//! fn main() -> Result<()> {
//!     let mut archive = Archive::open_path("archive.zip")?;
//!
//!     // List entries
//!     for entry in archive.entries()? {
//!         println!("{}: {} bytes", entry.name(), entry.uncompressed_size());
//!     }
//!
//!     // Extract one entry into memory, CRC-verified
//!     let data = archive.extract_to_vec("docs/readme.txt")?;
//!     println!("{} bytes", data.len());
//!
//!     // Or everything to a directory
//!     archive.extract_all("./output")?;
//!     Ok(())
//! }
//! ```
//!
//! ### Writing an Archive
//!
//! ```rust,no_run
//! use zipkit::{Archive, CompressionLevel, Result, WriteOptions};
//!
//! fn main() -> Result<()> {
//!     let mut archive = Archive::create_path("new.zip")?;
//!
//!     // Add data from memory
//!     archive.write_bytes("hello.txt", b"Hello, World!", &WriteOptions::default())?;
//!
//!     // Add a file from disk at the best compression level
//!     let options = WriteOptions::new().level(CompressionLevel::Best);
//!     archive.write_file("data/input.bin", "input.bin", &options)?;
//!
//!     // Remove an entry again (rebuilds the archive without it)
//!     archive.delete("hello.txt")?;
//!     Ok(())
//! }
//! ```
//!
//! ### Password-Protected Archives
//!
//! ```rust,no_run
//! use zipkit::{Archive, Result, WriteOptions};
//!
//! fn main() -> Result<()> {
//!     let mut archive = Archive::open_path("secret.zip")?.with_password("hunter2");
//!     if !archive.validate_password()? {
//!         eprintln!("wrong password");
//!         return Ok(());
//!     }
//!     let data = archive.extract_to_vec("secret.txt")?;
//!     println!("{} bytes", data.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming
//!
//! Entries of any size can be processed in fixed memory through the
//! chunked session API:
//!
//! ```rust,no_run
//! use zipkit::{Archive, Result, WriteOptions};
//!
//! fn main() -> Result<()> {
//!     let mut archive = Archive::open_path("big.zip")?;
//!
//!     // Chunked read
//!     archive.begin_read("large.bin")?;
//!     let mut buf = [0u8; 32 * 1024];
//!     loop {
//!         let n = archive.read_chunk(&mut buf)?;
//!         if n == 0 {
//!             break; // CRC verified
//!         }
//!         // process buf[..n]
//!     }
//!
//!     // Chunked write
//!     archive.begin_write("generated.bin", &WriteOptions::default())?;
//!     for chunk in [&b"first"[..], b"second"] {
//!         archive.write_chunk(chunk)?;
//!     }
//!     archive.end_stream()?;
//!     Ok(())
//! }
//! ```
//!
//! Only one stream is open at a time; interleaving reads and writes fails
//! with [`Error::MixedModeAccess`] rather than corrupting the file.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `deflate` | Yes | Deflate compression (via `flate2` with the zlib-rs backend) |
//!
//! With default features disabled the crate still reads and writes stored
//! (uncompressed) entries.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`; see [`Error`] for the failure taxonomy.
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

/// Chunk size for streaming reads and writes (32 KiB).
pub(crate) const READ_BUFFER_SIZE: usize = 32 * 1024;

mod archive;
mod codec;
mod crypto;
mod error;
mod extract;
mod format;
mod index;
mod metadata;
mod rebuild;
mod timestamp;
mod write;

pub use archive::{Archive, SessionMode};
pub use error::{Error, Result};
pub use metadata::{CompressionLevel, EntryInfo};
pub use timestamp::Timestamp;
pub use write::{ChunkSink, WriteOptions};
