//! Indexed Disk Module
//!
//! Random access file used for both the record store and the key file.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cache::descriptor::RecordDescriptor;

// == Indexed Disk ==
/// A file addressed by explicit byte offsets.
///
/// Reads take `&self` and use positional I/O, so any number of readers may
/// share one handle. The tracked length is the append high-water mark.
#[derive(Debug)]
pub struct IndexedDisk {
    path: PathBuf,
    /// None once closed
    file: Option<File>,
    length: u64,
}

impl IndexedDisk {
    // == Open ==
    /// Opens `path` for reading and writing, creating it if missing.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let length = file.metadata()?.len();

        debug!("Opened {} ({} bytes)", path.display(), length);
        Ok(Self {
            path,
            file: Some(file),
            length,
        })
    }

    /// Opens `path` and discards any existing contents.
    pub fn create_empty(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut disk = Self::open(path)?;
        disk.reset()?;
        Ok(disk)
    }

    fn file(&self) -> io::Result<&File> {
        self.file.as_ref().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} is closed", self.path.display()),
            )
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current high-water mark in bytes.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    // == Read ==
    /// Reads exactly `length` bytes starting at `offset`.
    pub fn read(&self, offset: u64, length: u32) -> io::Result<Vec<u8>> {
        let file = self.file()?;
        let in_bounds = offset
            .checked_add(u64::from(length))
            .is_some_and(|end| end <= self.length);
        if !in_bounds {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "record at {} ({} bytes) past end of {} ({} bytes)",
                    offset,
                    length,
                    self.path.display(),
                    self.length
                ),
            ));
        }

        let mut buf = vec![0u8; length as usize];
        read_exact_at(file, &mut buf, offset)?;
        Ok(buf)
    }

    /// Reads the record a descriptor points at.
    pub fn read_record(&self, descriptor: &RecordDescriptor) -> io::Result<Vec<u8>> {
        self.read(descriptor.offset(), descriptor.length())
    }

    /// Reads the whole file.
    pub fn read_all(&self) -> io::Result<Vec<u8>> {
        let length = u32::try_from(self.length)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "file too large"))?;
        self.read(0, length)
    }

    // == Write ==
    /// Writes `data` at `offset`, extending the high-water mark if needed.
    pub fn write(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        write_all_at(self.file()?, data, offset)?;
        self.length = self.length.max(offset.saturating_add(data.len() as u64));
        Ok(())
    }

    /// Appends `data` at the high-water mark and returns its descriptor.
    pub fn append(&mut self, data: &[u8]) -> io::Result<RecordDescriptor> {
        let descriptor = RecordDescriptor::for_record(self.length, data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        self.write(descriptor.offset(), data)?;
        Ok(descriptor)
    }

    /// Replaces the whole contents with `data`.
    pub fn overwrite(&mut self, data: &[u8]) -> io::Result<()> {
        self.reset()?;
        self.write(0, data)
    }

    // == Reset ==
    /// Truncates the file to zero bytes.
    pub fn reset(&mut self) -> io::Result<()> {
        self.file()?.set_len(0)?;
        self.length = 0;
        Ok(())
    }

    pub fn sync(&self) -> io::Result<()> {
        self.file()?.sync_all()
    }

    // == Close ==
    /// Flushes and releases the handle. Later I/O fails with `NotConnected`.
    pub fn close(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
            debug!("Closed {}", self.path.display());
        }
        Ok(())
    }

    /// Closes the handle and removes the file.
    pub fn delete(mut self) -> io::Result<()> {
        self.close()?;
        remove_if_exists(&self.path)
    }
}

/// Removes `path`, treating a missing file as success.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(unix)]
fn write_all_at(file: &File, data: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(data, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset)? {
            0 => return Err(io::ErrorKind::UnexpectedEof.into()),
            n => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
        }
    }
    Ok(())
}

#[cfg(windows)]
fn write_all_at(file: &File, mut data: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !data.is_empty() {
        match file.seek_write(data, offset)? {
            0 => return Err(io::ErrorKind::WriteZero.into()),
            n => {
                data = &data[n..];
                offset += n as u64;
            }
        }
    }
    Ok(())
}
