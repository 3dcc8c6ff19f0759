//! Loose page files (`<folder>/NNNN.<ext>`)
//!
//! The build can leave every encoded page as its own file next to the
//! container. Readers fall back to this folder when the container is absent.

use crate::core::codec::CodecKind;
use crate::core::error::{Result, ZwcError};
use crate::core::page_cache::PageSource;
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Pattern for page file names
const PAGE_FILE_PATTERN: &str = r"^(\d{4,})\.(gif|png)$";

#[derive(Debug, Clone)]
pub struct PageFolder {
    dir: PathBuf,
    kind: CodecKind,
    total_pages: u32,
}

impl PageFolder {
    pub fn new<P: AsRef<Path>>(dir: P, kind: CodecKind, total_pages: u32) -> Self {
        PageFolder {
            dir: dir.as_ref().to_path_buf(),
            kind,
            total_pages,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name of page `page`: zero-padded to four digits
    pub fn file_name(&self, page: u32) -> String {
        format!("{:04}.{}", page, self.kind.extension())
    }

    pub fn path_for(&self, page: u32) -> PathBuf {
        self.dir.join(self.file_name(page))
    }

    pub fn write_page(&self, page: u32, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(page), bytes)?;
        Ok(())
    }

    /// Delete the folder and every page in it. A missing folder is not an error.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    /// # Errors
    ///
    /// `PageMissing` if the page file does not exist.
    pub fn read_page(&self, page: u32) -> Result<Vec<u8>> {
        match fs::read(self.path_for(page)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(ZwcError::PageMissing { page }),
            Err(err) => Err(err.into()),
        }
    }

    /// Page numbers present in `dir`, ascending
    pub fn scan<P: AsRef<Path>>(dir: P) -> Result<Vec<u32>> {
        let re = Regex::new(PAGE_FILE_PATTERN)
            .map_err(|e| ZwcError::InvalidConfig(e.to_string()))?;

        let mut pages = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(number) = re
                .captures(name)
                .and_then(|caps| caps[1].parse::<u32>().ok())
            {
                pages.push(number);
            }
        }

        pages.sort_unstable();
        pages.dedup();
        Ok(pages)
    }
}

impl PageSource for PageFolder {
    fn total_pages(&self) -> u32 {
        self.total_pages
    }

    fn read_page(&self, page: u32) -> Result<Vec<u8>> {
        if page < 1 || page > self.total_pages {
            return Err(ZwcError::PageOutOfRange {
                page,
                total: self.total_pages,
            });
        }
        PageFolder::read_page(self, page)
    }
}
