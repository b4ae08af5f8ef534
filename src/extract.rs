//! Whole-entry extraction helpers.
//!
//! Everything here is built on the chunked stream in [`crate::archive`]:
//! open a read stream, pull 32 KiB at a time, and let `read_chunk` verify
//! the CRC-32 at end of stream. Extraction to disk restores modification
//! times and Unix permission bits on a best-effort basis; a failure there
//! is logged, not fatal.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use filetime::FileTime;
use log::warn;

use crate::archive::Archive;
use crate::metadata::EntryInfo;
use crate::{Error, READ_BUFFER_SIZE, Result};

/// Upper bound on the up-front buffer reservation for one entry. The
/// declared size comes from the central directory and is untrusted; the
/// vec grows past this on demand.
const MAX_PREALLOCATION: u64 = 1 << 20;

impl Archive {
    /// Extracts one entry into memory.
    pub fn extract_to_vec(&mut self, name: &str) -> Result<Vec<u8>> {
        let info = self.begin_read(name)?;
        let mut out =
            Vec::with_capacity(info.uncompressed_size().min(MAX_PREALLOCATION) as usize);
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let n = self.read_chunk(&mut buf)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    /// Extracts one entry through a caller-supplied sink.
    ///
    /// The sink receives each decompressed chunk along with the running
    /// progress percentage and returns `Ok(false)` to cancel extraction.
    /// Returns `Ok(true)` when the entry was fully extracted and verified,
    /// `Ok(false)` when the sink cancelled; a cancelled extraction skips
    /// CRC verification.
    pub fn extract_entry<F>(&mut self, name: &str, mut sink: F) -> Result<bool>
    where
        F: FnMut(&[u8], u8) -> Result<bool>,
    {
        let info = self.begin_read(name)?;
        let total = info.uncompressed_size();
        let mut seen = 0u64;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let n = self.read_chunk(&mut buf)?;
            if n == 0 {
                return Ok(true);
            }
            seen += n as u64;
            let percent = if total == 0 {
                100
            } else {
                (seen * 100 / total).min(100) as u8
            };
            let keep_going = match sink(&buf[..n], percent) {
                Ok(keep_going) => keep_going,
                Err(e) => {
                    self.end_stream()?;
                    return Err(e);
                }
            };
            if !keep_going {
                self.end_stream()?;
                return Ok(false);
            }
        }
    }

    /// Extracts one entry to a file on disk.
    ///
    /// Parent directories are created as needed. The entry's modification
    /// time and permission bits are restored after the content.
    pub fn extract_entry_to_file<P: AsRef<Path>>(&mut self, name: &str, dest: P) -> Result<()> {
        let dest = dest.as_ref();
        let info = self.begin_read(name)?;

        // A destination-setup failure must still release the stream slot
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(source) = fs::create_dir_all(parent) {
                    self.end_stream().ok();
                    return Err(Error::Output {
                        path: parent.to_path_buf(),
                        source,
                    });
                }
            }
        }
        let output_err = |source: std::io::Error| Error::Output {
            path: dest.to_path_buf(),
            source,
        };
        let mut output = match fs::File::create(dest) {
            Ok(output) => output,
            Err(source) => {
                self.end_stream().ok();
                return Err(output_err(source));
            }
        };

        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let n = match self.read_chunk(&mut buf) {
                Ok(n) => n,
                Err(e) => {
                    // Leave no half-written file behind a failed extraction
                    drop(output);
                    let _ = fs::remove_file(dest);
                    return Err(e);
                }
            };
            if n == 0 {
                break;
            }
            if let Err(e) = output.write_all(&buf[..n]) {
                self.end_stream()?;
                drop(output);
                let _ = fs::remove_file(dest);
                return Err(output_err(e));
            }
        }
        output.sync_all().map_err(output_err)?;
        drop(output);

        restore_metadata(dest, &info);
        Ok(())
    }

    /// Extracts every entry into a destination directory.
    ///
    /// Entry names are treated as paths relative to `dest`; names that
    /// would escape it (absolute paths, `..` components) are skipped with
    /// a warning. Fails with [`Error::OutputPathIsFile`] when a needed
    /// directory collides with an existing plain file.
    pub fn extract_all<P: AsRef<Path>>(&mut self, dest: P) -> Result<()> {
        let dest = dest.as_ref();
        if dest.is_file() {
            return Err(Error::OutputPathIsFile {
                path: dest.to_path_buf(),
            });
        }
        fs::create_dir_all(dest).map_err(|source| Error::Output {
            path: dest.to_path_buf(),
            source,
        })?;

        let entries = self.entries()?;
        for info in &entries {
            let Some(target) = sanitized_join(dest, info.name()) else {
                warn!("skipping entry with unsafe path: '{}'", info.name());
                continue;
            };

            if info.is_directory() {
                ensure_directory(&target)?;
                restore_metadata(&target, info);
            } else {
                if let Some(parent) = target.parent() {
                    ensure_directory(parent)?;
                }
                self.extract_entry_to_file(info.name(), &target)?;
            }
        }
        Ok(())
    }

    /// Runs a callback over every entry's metadata.
    pub fn for_each_entry<F>(&mut self, mut action: F) -> Result<()>
    where
        F: FnMut(&EntryInfo) -> Result<()>,
    {
        for info in self.entries()? {
            action(&info)?;
        }
        Ok(())
    }

    /// Runs a callback over every file entry's decompressed content.
    ///
    /// Directory entries are skipped. Each entry is fully extracted and
    /// CRC-verified before the callback sees it.
    pub fn for_each_data<F>(&mut self, mut action: F) -> Result<()>
    where
        F: FnMut(&EntryInfo, &[u8]) -> Result<()>,
    {
        for info in self.entries()? {
            if info.is_directory() {
                continue;
            }
            let data = self.extract_to_vec(info.name())?;
            action(&info, &data)?;
        }
        Ok(())
    }
}

/// Joins an entry name onto the destination, rejecting escapes.
fn sanitized_join(dest: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    let mut target = dest.to_path_buf();
    let mut any = false;
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                target.push(part);
                any = true;
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    if any { Some(target) } else { None }
}

fn ensure_directory(path: &Path) -> Result<()> {
    if path.is_file() {
        return Err(Error::OutputPathIsFile {
            path: path.to_path_buf(),
        });
    }
    fs::create_dir_all(path).map_err(|source| Error::Output {
        path: path.to_path_buf(),
        source,
    })
}

/// Restores timestamp and permissions recorded for an entry.
fn restore_metadata(path: &Path, info: &EntryInfo) {
    let mtime = FileTime::from_system_time(info.modified());
    if let Err(e) = filetime::set_file_mtime(path, mtime) {
        warn!(
            "failed to restore modification time on {}: {}",
            path.display(),
            e
        );
    }

    #[cfg(unix)]
    if let Some(mode) = info.permissions() {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
            warn!("failed to restore permissions on {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_join() {
        let dest = Path::new("/tmp/out");
        assert_eq!(
            sanitized_join(dest, "a/b.txt"),
            Some(PathBuf::from("/tmp/out/a/b.txt"))
        );
        assert_eq!(
            sanitized_join(dest, "./a.txt"),
            Some(PathBuf::from("/tmp/out/a.txt"))
        );
        assert_eq!(sanitized_join(dest, "../escape.txt"), None);
        assert_eq!(sanitized_join(dest, "a/../../escape.txt"), None);
        assert_eq!(sanitized_join(dest, "/etc/passwd"), None);
        assert_eq!(sanitized_join(dest, ""), None);
    }
}
