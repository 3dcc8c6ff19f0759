//! Random-access page reads from a container

use super::{header_len, OffsetTable, MIN_CONTAINER_LEN, SLOT_SIZE};
use crate::core::error::{Result, ZwcError};
use memmap2::Mmap;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;
use tracing::{debug, info};

/// Byte source a container can be read from.
///
/// Reads take `&self` so one source can serve the viewer and the prefetch
/// worker at the same time.
pub trait ContainerSource: Send + Sync {
    fn len(&self) -> u64;

    /// Fill `buf` with the bytes starting at `offset`
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn slice_range(len: u64, offset: u64, want: usize) -> Result<Range<usize>> {
    let end = offset
        .checked_add(want as u64)
        .filter(|&end| end <= len)
        .ok_or_else(|| {
            ZwcError::CorruptContainer(format!(
                "read of {} bytes at {} past end of {}-byte container",
                want, offset, len
            ))
        })?;
    Ok(offset as usize..end as usize)
}

impl ContainerSource for Vec<u8> {
    fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let range = slice_range(self.as_slice().len() as u64, offset, buf.len())?;
        buf.copy_from_slice(&self[range]);
        Ok(())
    }
}

/// Container file read through a seekable handle
pub struct FileSource {
    file: Mutex<File>,
    len: u64,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(FileSource {
            file: Mutex::new(file),
            len,
        })
    }
}

impl ContainerSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        slice_range(self.len, offset, buf.len())?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }
}

/// Container file mapped into memory
pub struct MmapSource {
    map: Mmap,
}

impl MmapSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: containers are write-once; builders replace them by rename,
        // never by writing into an existing file.
        let map = unsafe { Mmap::map(&file)? };
        Ok(MmapSource { map })
    }
}

impl ContainerSource for MmapSource {
    fn len(&self) -> u64 {
        self.map.len() as u64
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let range = slice_range(self.map.len() as u64, offset, buf.len())?;
        buf.copy_from_slice(&self.map[range]);
        Ok(())
    }
}

/// Reads single pages out of a container without loading the whole file.
///
/// The page count is not part of the container; the reader trusts the value
/// it is given (normally the sidecar's `TotalPages`). Use
/// [`ContainerReader::open_verified`] to check it against the header.
pub struct ContainerReader<S> {
    source: S,
    total_pages: u32,
}

impl<S: ContainerSource> ContainerReader<S> {
    /// # Errors
    ///
    /// `ContainerTooShort` if the source holds fewer than 8 bytes.
    pub fn open(source: S, total_pages: u32) -> Result<Self> {
        let len = source.len();
        if len < MIN_CONTAINER_LEN {
            return Err(ZwcError::ContainerTooShort { len });
        }

        Ok(ContainerReader {
            source,
            total_pages,
        })
    }

    /// Open and check `total_pages` against the header before trusting it.
    ///
    /// # Errors
    ///
    /// - `PageCountMismatch` if the header describes a different page count
    /// - `CorruptContainer` if the offsets are not monotonic or do not end at
    ///   the container length
    pub fn open_verified(source: S, total_pages: u32) -> Result<Self> {
        let reader = Self::open(source, total_pages)?;

        let actual = reader.infer_page_count()?;
        if actual != total_pages {
            return Err(ZwcError::PageCountMismatch {
                expected: total_pages,
                actual,
            });
        }

        reader.offset_table()?.validate(reader.source.len())?;
        info!("Verified container: {} pages", total_pages);
        Ok(reader)
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Page count implied by the header: slot 1 equals `4 (N + 2)`
    pub fn infer_page_count(&self) -> Result<u32> {
        let first = self.read_slot(1)? as u64;
        if first < header_len(0) + SLOT_SIZE as u64 || first % SLOT_SIZE as u64 != 0 {
            return Err(ZwcError::CorruptContainer(format!(
                "first page offset {} is not a valid header length",
                first
            )));
        }
        Ok((first / SLOT_SIZE as u64 - 2) as u32)
    }

    /// The full header for the trusted page count
    pub fn offset_table(&self) -> Result<OffsetTable> {
        let len = header_len(self.total_pages);
        if len > self.source.len() {
            return Err(ZwcError::ContainerTooShort {
                len: self.source.len(),
            });
        }

        let mut bytes = vec![0u8; len as usize];
        self.source.read_exact_at(0, &mut bytes)?;
        OffsetTable::parse(&bytes, self.total_pages)
    }

    fn read_slot(&self, slot: u32) -> Result<u32> {
        let mut bytes = [0u8; SLOT_SIZE];
        self.source
            .read_exact_at(slot as u64 * SLOT_SIZE as u64, &mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Byte range of page `page`, bounds-checked against the source
    pub fn page_range(&self, page: u32) -> Result<Range<u64>> {
        if page < 1 || page > self.total_pages {
            return Err(ZwcError::PageOutOfRange {
                page,
                total: self.total_pages,
            });
        }

        let mut bytes = [0u8; SLOT_SIZE * 2];
        self.source
            .read_exact_at(page as u64 * SLOT_SIZE as u64, &mut bytes)?;
        let start = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64;
        let end = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as u64;

        if start > end || end > self.source.len() {
            return Err(ZwcError::CorruptContainer(format!(
                "page {} spans {}..{} in a {}-byte container",
                page,
                start,
                end,
                self.source.len()
            )));
        }

        Ok(start..end)
    }

    /// Encoded bytes of page `page` (1-based)
    pub fn read_page(&self, page: u32) -> Result<Vec<u8>> {
        let range = self.page_range(page)?;
        let mut bytes = vec![0u8; (range.end - range.start) as usize];
        self.source.read_exact_at(range.start, &mut bytes)?;
        debug!("Read page {} ({} bytes)", page, bytes.len());
        Ok(bytes)
    }
}

impl ContainerReader<FileSource> {
    pub fn open_file<P: AsRef<Path>>(path: P, total_pages: u32) -> Result<Self> {
        Self::open(FileSource::open(path)?, total_pages)
    }
}

impl ContainerReader<MmapSource> {
    pub fn open_mmap<P: AsRef<Path>>(path: P, total_pages: u32) -> Result<Self> {
        Self::open(MmapSource::open(path)?, total_pages)
    }
}
