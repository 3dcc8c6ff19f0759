//! Container serialisation

use super::OffsetTable;
use crate::core::error::{Result, ZwcError};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Collects encoded pages in order and serialises them as one container.
///
/// # Examples
///
/// ```
/// use zwc_book::ContainerWriter;
///
/// let mut writer = ContainerWriter::new();
/// writer.push_page(vec![1u8; 1000])?;
/// writer.push_page(vec![2u8; 2000])?;
/// writer.push_page(vec![3u8; 1500])?;
///
/// let bytes = writer.into_bytes()?;
/// assert_eq!(bytes.len(), 4520);
/// # Ok::<(), zwc_book::ZwcError>(())
/// ```
#[derive(Debug, Default)]
pub struct ContainerWriter {
    pages: Vec<Vec<u8>>,
}

impl ContainerWriter {
    pub fn new() -> Self {
        ContainerWriter { pages: Vec::new() }
    }

    /// Serialise `pages` in one call
    pub fn encode<B: AsRef<[u8]>>(pages: &[B]) -> Result<Vec<u8>> {
        let mut writer = ContainerWriter::new();
        for page in pages {
            writer.push_page(page.as_ref().to_vec())?;
        }
        writer.into_bytes()
    }

    /// Append the next page, returning its 1-based number.
    ///
    /// # Errors
    ///
    /// `EmptyPage` if `bytes` is empty.
    pub fn push_page(&mut self, bytes: Vec<u8>) -> Result<u32> {
        let number = self.pages.len() as u32 + 1;
        if bytes.is_empty() {
            return Err(ZwcError::EmptyPage { page: number });
        }

        debug!("Queued page {} ({} bytes)", number, bytes.len());
        self.pages.push(bytes);
        Ok(number)
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn offset_table(&self) -> Result<OffsetTable> {
        let lengths: Vec<usize> = self.pages.iter().map(Vec::len).collect();
        OffsetTable::from_page_lengths(&lengths)
    }

    /// Write header and pages to `out`
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<OffsetTable> {
        let table = self.offset_table()?;
        out.write_all(&table.to_bytes())?;
        for page in &self.pages {
            out.write_all(page)?;
        }
        out.flush()?;
        Ok(table)
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        let table = self.offset_table()?;
        let mut bytes = Vec::with_capacity(table.end() as usize);
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Persist the container at `path` so that the final name only ever
    /// names a complete file.
    ///
    /// Writes a temporary file in the destination directory, syncs it, then
    /// renames it over `path`. Nothing is created when the page list is
    /// invalid.
    pub fn write_atomic<P: AsRef<Path>>(&self, path: P) -> Result<OffsetTable> {
        let path = path.as_ref();
        let table = self.offset_table()?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::env::current_dir()?,
        };
        fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        self.write_to(temp.as_file_mut())?;
        temp.as_file().sync_all()?;
        temp.persist(path)?;

        info!(
            "Wrote container {:?}: {} pages, {} bytes",
            path,
            table.page_count(),
            table.end()
        );
        Ok(table)
    }
}
