//! Indexed page container (`.zwc_data`)
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Header: (N + 2) little-endian u32 slots      │
//! │  slot 0      : 0 (sentinel)                  │
//! │  slot 1..=N  : start of page 1..=N           │
//! │  slot N + 1  : end of file                   │
//! ├──────────────────────────────────────────────┤
//! │ Page 1 bytes │ Page 2 bytes │ ... │ Page N   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Slot `n` and slot `n + 1` bound page `n`, so slot 1 always equals the
//! header length `4 (N + 2)`. The page count itself is not stored; it travels
//! in the sidecar's `TotalPages` key.

pub mod reader;
pub mod writer;

pub use reader::{ContainerReader, ContainerSource, FileSource, MmapSource};
pub use writer::ContainerWriter;

use crate::core::error::{Result, ZwcError};
use std::ops::Range;

/// Width of one header slot in bytes
pub const SLOT_SIZE: usize = 4;

/// Smallest readable container: the sentinel plus one offset
pub const MIN_CONTAINER_LEN: u64 = 8;

/// Container file extension
pub const CONTAINER_EXTENSION: &str = "zwc_data";

/// Header length for a book of `page_count` pages
pub fn header_len(page_count: u32) -> u64 {
    (page_count as u64 + 2) * SLOT_SIZE as u64
}

/// In-memory model of the container header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetTable {
    slots: Vec<u32>,
}

impl OffsetTable {
    /// Lay out pages of the given encoded lengths back to back after the header.
    ///
    /// # Errors
    ///
    /// - `EmptyBook` if `lengths` is empty
    /// - `EmptyPage` if any length is zero
    /// - `ContainerTooLarge` if the file would exceed `u32::MAX` bytes
    pub fn from_page_lengths(lengths: &[usize]) -> Result<Self> {
        if lengths.is_empty() {
            return Err(ZwcError::EmptyBook);
        }

        let header = header_len(lengths.len() as u32);
        let mut slots = Vec::with_capacity(lengths.len() + 2);
        slots.push(0);

        let mut location = header;
        for (index, &len) in lengths.iter().enumerate() {
            if len == 0 {
                return Err(ZwcError::EmptyPage {
                    page: index as u32 + 1,
                });
            }
            slots.push(to_offset(location)?);
            location += len as u64;
        }
        slots.push(to_offset(location)?);

        Ok(OffsetTable { slots })
    }

    /// Parse a header of `page_count` pages from its serialised bytes
    pub fn parse(bytes: &[u8], page_count: u32) -> Result<Self> {
        let expected = header_len(page_count) as usize;
        if bytes.len() < expected {
            return Err(ZwcError::ContainerTooShort {
                len: bytes.len() as u64,
            });
        }

        let slots = bytes[..expected]
            .chunks_exact(SLOT_SIZE)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(OffsetTable { slots })
    }

    pub fn page_count(&self) -> u32 {
        (self.slots.len() - 2) as u32
    }

    pub fn header_len(&self) -> u64 {
        header_len(self.page_count())
    }

    /// Page start offsets followed by the end-of-file offset (slots 1..=N+1)
    pub fn offsets(&self) -> &[u32] {
        &self.slots[1..]
    }

    /// Raw header slots including the leading sentinel
    pub fn slots(&self) -> &[u32] {
        &self.slots
    }

    /// Total container length
    pub fn end(&self) -> u64 {
        self.slots[self.slots.len() - 1] as u64
    }

    /// Byte range of page `page` (1-based)
    pub fn page_range(&self, page: u32) -> Result<Range<u64>> {
        let total = self.page_count();
        if page < 1 || page > total {
            return Err(ZwcError::PageOutOfRange { page, total });
        }

        let start = self.slots[page as usize] as u64;
        let end = self.slots[page as usize + 1] as u64;
        Ok(start..end)
    }

    /// Check the table's internal consistency against a container of `file_len` bytes
    pub fn validate(&self, file_len: u64) -> Result<()> {
        if self.slots[0] != 0 {
            return Err(ZwcError::CorruptContainer(format!(
                "header sentinel is {}, expected 0",
                self.slots[0]
            )));
        }

        let first = self.slots[1] as u64;
        if first != self.header_len() {
            return Err(ZwcError::CorruptContainer(format!(
                "first page starts at {}, header is {} bytes",
                first,
                self.header_len()
            )));
        }

        if let Some(window) = self.slots[1..].windows(2).find(|w| w[0] > w[1]) {
            return Err(ZwcError::CorruptContainer(format!(
                "offsets decrease from {} to {}",
                window[0], window[1]
            )));
        }

        if self.end() != file_len {
            return Err(ZwcError::CorruptContainer(format!(
                "last offset {} does not match container length {}",
                self.end(),
                file_len
            )));
        }

        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.slots.len() * SLOT_SIZE);
        for slot in &self.slots {
            bytes.extend_from_slice(&slot.to_le_bytes());
        }
        bytes
    }
}

fn to_offset(location: u64) -> Result<u32> {
    u32::try_from(location).map_err(|_| ZwcError::ContainerTooLarge { size: location })
}
