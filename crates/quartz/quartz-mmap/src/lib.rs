//! File-backed shared mappings.
//!
//! Thin owners around `memmap2` that keep the file handle alive for as long
//! as the mapping and hand out raw base pointers for layouts placed on top.

use memmap2::{Mmap, MmapMut};
use std::{
    fs::{File, OpenOptions},
    io,
    path::Path,
};

pub struct MmapFileMut {
    _file: File,
    mmap: MmapMut,
}

pub struct MmapFile {
    _file: File,
    mmap: Mmap,
}

impl MmapFileMut {
    /// Create (or truncate) a file of `size_bytes` zeroed bytes and map it
    /// read-write.
    pub fn create_rw<P: AsRef<Path>>(path: P, size_bytes: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size_bytes)?;

        // SAFETY: the file was just truncated and sized by us; other processes
        // only touch it through the atomic protocol of the layout above it.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { _file: file, mmap })
    }

    /// Map an existing file read-write.
    pub fn open_rw<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        // SAFETY: see `create_rw`.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { _file: file, mmap })
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }
}

impl MmapFile {
    /// Map an existing file read-only.
    pub fn open_ro<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;

        // SAFETY: the mapping is only read, through atomics where another
        // process may be writing.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { _file: file, mmap })
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(label: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("quartz_mmap_{label}_{}", std::process::id()))
    }

    #[test]
    fn writes_are_visible_through_a_second_mapping() {
        let path = temp_path("visible");
        let mut rw = MmapFileMut::create_rw(&path, 4096).unwrap();
        assert_eq!(rw.len(), 4096);
        // SAFETY: offset 10 is inside the 4096-byte mapping.
        unsafe { *rw.as_mut_ptr().add(10) = 0xAB };

        let ro = MmapFile::open_ro(&path).unwrap();
        assert_eq!(ro.len(), 4096);
        // SAFETY: same bounds as above.
        assert_eq!(unsafe { *ro.as_ptr().add(10) }, 0xAB);
        // fresh files are zero-filled
        assert_eq!(unsafe { *ro.as_ptr().add(11) }, 0);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = MmapFile::open_ro(temp_path("missing")).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
