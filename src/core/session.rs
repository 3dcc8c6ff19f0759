//! Reading position over one book
//!
//! A session opens the book's pages (container, or the loose page folder
//! when no container exists), serves them through a [`PageCache`] and keeps
//! the sidecar's `CurrentPage` in step with navigation.

use crate::core::config::ReaderConfig;
use crate::core::container::{ContainerReader, ContainerSource, FileSource, MmapSource};
use crate::core::error::Result;
use crate::core::page_cache::{PageCache, PageSource};
use crate::core::page_folder::PageFolder;
use crate::core::sidecar::{BookInfo, BookPaths, Sidecar, KEY_CURRENT_PAGE};
use image::RgbImage;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ReaderSession {
    paths: BookPaths,
    sidecar: Sidecar,
    info: BookInfo,
    config: ReaderConfig,
    cache: PageCache,
}

fn open_reader<S: ContainerSource + 'static>(
    source: S,
    total_pages: u32,
    verify: bool,
) -> Result<Box<dyn PageSource>> {
    let reader = if verify {
        ContainerReader::open_verified(source, total_pages)?
    } else {
        ContainerReader::open(source, total_pages)?
    };
    Ok(Box::new(reader))
}

impl ReaderSession {
    /// Open the book described by the sidecar at `path` (`<name>.zwc`).
    ///
    /// # Errors
    ///
    /// - `NotABook` if `path` does not end in `.zwc`
    /// - sidecar errors (`MissingKey`, `InvalidValue`, `Sidecar`)
    /// - `ContainerTooShort`, and with `verify_container` set,
    ///   `PageCountMismatch` / `CorruptContainer`
    pub fn open<P: AsRef<Path>>(path: P, config: ReaderConfig) -> Result<Self> {
        let paths = BookPaths::from_sidecar(path)?;
        let sidecar = Sidecar::load(&paths.sidecar)?;
        let info = BookInfo::from_sidecar(&sidecar)?;

        let source = if paths.container.exists() {
            let total = info.total_pages;
            let verify = config.verify_container;
            if config.use_mmap {
                open_reader(MmapSource::open(&paths.container)?, total, verify)?
            } else {
                open_reader(FileSource::open(&paths.container)?, total, verify)?
            }
        } else {
            warn!(
                "No container at {:?}, reading pages from {:?}",
                paths.container, paths.page_folder
            );
            Box::new(PageFolder::new(
                &paths.page_folder,
                info.codec,
                info.total_pages,
            )) as Box<dyn PageSource>
        };

        let cache = PageCache::new(source, info.codec.codec(), config.prefetch_delay())?;

        info!(
            "Opened {:?}: {} pages ({}), at page {}",
            paths.sidecar, info.total_pages, info.codec, info.current_page
        );

        Ok(ReaderSession {
            paths,
            sidecar,
            info,
            config,
            cache,
        })
    }

    pub fn paths(&self) -> &BookPaths {
        &self.paths
    }

    pub fn info(&self) -> &BookInfo {
        &self.info
    }

    pub fn current_page(&self) -> u32 {
        self.info.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.info.total_pages
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    pub fn current_image(&self) -> Result<Arc<RgbImage>> {
        self.cache.get_page(self.info.current_page)
    }

    pub fn page_down(&mut self) -> Result<Arc<RgbImage>> {
        self.go_to(self.info.current_page.saturating_add(1))
    }

    pub fn page_up(&mut self) -> Result<Arc<RgbImage>> {
        self.go_to(self.info.current_page.saturating_sub(1))
    }

    /// Move to page `page`, clamped to `[1, total_pages]`.
    ///
    /// The position only changes once the page has been fetched. A failure
    /// to persist the position is logged and does not undo the move.
    pub fn go_to(&mut self, page: u32) -> Result<Arc<RgbImage>> {
        let target = page.clamp(1, self.info.total_pages);
        let image = self.cache.get_page(target)?;

        if target != self.info.current_page {
            debug!("Moved from page {} to {}", self.info.current_page, target);
            self.info.current_page = target;
            if self.config.persist_position {
                self.sidecar.set(KEY_CURRENT_PAGE, target);
                if let Err(err) = self.sidecar.save(&self.paths.sidecar) {
                    warn!(
                        "Failed to save page {} to {:?}: {}",
                        target, self.paths.sidecar, err
                    );
                }
            }
        }

        Ok(image)
    }
}
