//! Legacy ZipCrypto (PKWARE traditional) encryption.
//!
//! This is the stream cipher every ZIP tool understands. It is not a
//! serious cipher by modern standards and is trivially attacked with known
//! plaintext; it exists here for interoperability with archives produced by
//! Info-ZIP, WinZip, and the platform archivers.
//!
//! The cipher keeps three 32-bit keys seeded from the password. Each entry
//! is prefixed with a 12-byte encryption header of random bytes whose final
//! byte doubles as a cheap password check before any data is decoded.

use std::io::{self, Read, Write};

use rand::RngCore;

use crate::format::CRYPTO_HEADER_LEN;
use crate::{Error, Result};

/// CRC-32 (IEEE) table for the single-byte key updates.
///
/// The cipher needs byte-at-a-time CRC steps against specific key values,
/// which the block-oriented `crc32fast` hasher does not expose, so the
/// classic table lives here.
const CRC_TABLE: [u32; 256] = build_crc_table();

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

#[inline]
const fn crc32_byte(crc: u32, byte: u8) -> u32 {
    (crc >> 8) ^ CRC_TABLE[((crc ^ byte as u32) & 0xFF) as usize]
}

/// The three-key ZipCrypto state.
#[derive(Clone)]
pub(crate) struct ZipCryptoKeys {
    key0: u32,
    key1: u32,
    key2: u32,
}

impl std::fmt::Debug for ZipCryptoKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs
        f.debug_struct("ZipCryptoKeys").finish_non_exhaustive()
    }
}

impl ZipCryptoKeys {
    /// Seeds the keys from a password.
    pub fn new(password: &[u8]) -> Self {
        let mut keys = Self {
            key0: 0x1234_5678,
            key1: 0x2345_6789,
            key2: 0x3456_7890,
        };
        for &byte in password {
            keys.update(byte);
        }
        keys
    }

    fn update(&mut self, byte: u8) {
        self.key0 = crc32_byte(self.key0, byte);
        self.key1 = self
            .key1
            .wrapping_add(self.key0 & 0xFF)
            .wrapping_mul(134_775_813)
            .wrapping_add(1);
        self.key2 = crc32_byte(self.key2, (self.key1 >> 24) as u8);
    }

    fn stream_byte(&self) -> u8 {
        let temp = (self.key2 | 2) as u16;
        ((temp.wrapping_mul(temp ^ 1)) >> 8) as u8
    }

    fn decrypt_byte(&mut self, byte: u8) -> u8 {
        let plain = byte ^ self.stream_byte();
        self.update(plain);
        plain
    }

    fn encrypt_byte(&mut self, byte: u8) -> u8 {
        let cipher = byte ^ self.stream_byte();
        self.update(byte);
        cipher
    }
}

/// A reader that strips ZipCrypto from an entry's compressed data.
///
/// Construction consumes the 12-byte encryption header and verifies the
/// password check byte; a mismatch surfaces as [`Error::InvalidPassword`]
/// before any payload byte is produced.
pub(crate) struct DecryptingReader<R> {
    inner: R,
    keys: ZipCryptoKeys,
}

impl<R> std::fmt::Debug for DecryptingReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptingReader").finish_non_exhaustive()
    }
}

impl<R: Read> DecryptingReader<R> {
    /// Opens the encrypted stream.
    ///
    /// `check_byte` is the expected final header byte: the high byte of the
    /// entry's CRC-32, or of its DOS time word when the entry was written
    /// with a data descriptor.
    pub fn new(mut inner: R, password: &[u8], check_byte: u8, entry_name: &str) -> Result<Self> {
        let mut keys = ZipCryptoKeys::new(password);
        let mut header = [0u8; CRYPTO_HEADER_LEN as usize];
        inner.read_exact(&mut header)?;
        let mut last = 0u8;
        for byte in header {
            last = keys.decrypt_byte(byte);
        }
        if last != check_byte {
            return Err(Error::InvalidPassword {
                path: entry_name.to_string(),
            });
        }
        Ok(Self { inner, keys })
    }
}

impl<R: Read> Read for DecryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        for byte in &mut buf[..n] {
            *byte = self.keys.decrypt_byte(*byte);
        }
        Ok(n)
    }
}

/// A writer that applies ZipCrypto to compressed data as it passes through.
///
/// Construction writes the 12-byte encryption header: 11 random bytes plus
/// the password check byte, all encrypted.
pub(crate) struct EncryptingWriter<W> {
    inner: W,
    keys: ZipCryptoKeys,
}

impl<W> std::fmt::Debug for EncryptingWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptingWriter").finish_non_exhaustive()
    }
}

impl<W: Write> EncryptingWriter<W> {
    pub fn new(mut inner: W, password: &[u8], check_byte: u8) -> io::Result<Self> {
        let mut keys = ZipCryptoKeys::new(password);
        let mut header = [0u8; CRYPTO_HEADER_LEN as usize];
        rand::thread_rng().fill_bytes(&mut header[..11]);
        header[11] = check_byte;
        for byte in &mut header {
            *byte = keys.encrypt_byte(*byte);
        }
        inner.write_all(&header)?;
        Ok(Self { inner, keys })
    }

    /// Unwraps the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for EncryptingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Encrypt through a bounce buffer; the cipher state advances only
        // for bytes actually accepted downstream, so writes go via write_all
        // on a chunk at a time.
        let mut chunk = [0u8; 4096];
        let len = buf.len().min(chunk.len());
        for (out, &plain) in chunk[..len].iter_mut().zip(&buf[..len]) {
            *out = self.keys.encrypt_byte(plain);
        }
        self.inner.write_all(&chunk[..len])?;
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_key_schedule_known_values() {
        // Freshly seeded keys before any password byte
        let keys = ZipCryptoKeys::new(b"");
        assert_eq!(keys.key0, 0x12345678);
        assert_eq!(keys.key1, 0x23456789);
        assert_eq!(keys.key2, 0x34567890);

        let keys = ZipCryptoKeys::new(b"password");
        assert_ne!(keys.key0, 0x12345678);
    }

    #[test]
    fn test_encrypt_decrypt_symmetry() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let mut enc = ZipCryptoKeys::new(b"secret");
        let mut dec = ZipCryptoKeys::new(b"secret");
        for &byte in data {
            let cipher = enc.encrypt_byte(byte);
            assert_eq!(dec.decrypt_byte(cipher), byte);
        }
    }

    #[test]
    fn test_stream_roundtrip() {
        let data = b"payload bytes after the encryption header";
        let check = 0xAB;

        let mut writer = EncryptingWriter::new(Cursor::new(Vec::new()), b"hunter2", check).unwrap();
        writer.write_all(data).unwrap();
        let encrypted = writer.into_inner().into_inner();
        assert_eq!(
            encrypted.len(),
            data.len() + CRYPTO_HEADER_LEN as usize
        );
        assert_ne!(&encrypted[CRYPTO_HEADER_LEN as usize..], data);

        let mut reader =
            DecryptingReader::new(Cursor::new(encrypted), b"hunter2", check, "a.bin").unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_wrong_password_rejected() {
        let mut writer = EncryptingWriter::new(Cursor::new(Vec::new()), b"right", 0x42).unwrap();
        writer.write_all(b"data").unwrap();
        let encrypted = writer.into_inner().into_inner();

        // The check byte catches a wrong password with probability 255/256;
        // in the rare pass-through case the payload still decodes to noise.
        match DecryptingReader::new(Cursor::new(encrypted), b"wrong", 0x42, "a.bin") {
            Err(Error::InvalidPassword { path }) => assert_eq!(path, "a.bin"),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(mut reader) => {
                let mut out = Vec::new();
                reader.read_to_end(&mut out).unwrap();
                assert_ne!(out, b"data");
            }
        }
    }

    #[test]
    fn test_header_is_random() {
        let first = EncryptingWriter::new(Cursor::new(Vec::new()), b"pw", 0)
            .unwrap()
            .into_inner()
            .into_inner();
        let second = EncryptingWriter::new(Cursor::new(Vec::new()), b"pw", 0)
            .unwrap()
            .into_inner()
            .into_inner();
        assert_ne!(first, second);
    }
}
