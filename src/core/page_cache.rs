//! Decoded page cache with delayed neighbour prefetch
//!
//! Serves one viewer. Every page is either loaded (decoded and held) or not.
//! `get_page` loads on demand; once the viewer has settled on a page for the
//! prefetch delay, a background pass loads the previous and next pages and
//! drops everything outside that three-page window.
//!
//! ```text
//!   viewer ──get_page(n)──► ┌────────────────────────┐ ◄── prefetch pass
//!                           │ Mutex<CacheState>      │     (worker thread)
//!                           │  pages: n -> image     │
//!                           │  current: n            │
//!                           └────────────────────────┘
//!                                      │ miss
//!                                      ▼
//!                           PageSource::read_page + PageCodec::decode
//! ```
//!
//! Both paths hold the same lock while they touch the map, so a pass never
//! evicts a page mid-fetch and two loads of one page never race. The
//! prefetch timer is a worker thread waiting on a channel: each navigation
//! restarts the wait, so a burst of page turns triggers one pass.

use crate::core::codec::PageCodec;
use crate::core::container::{ContainerReader, ContainerSource};
use crate::core::error::{Result, ZwcError};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use image::RgbImage;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

/// Where encoded pages come from
pub trait PageSource: Send + Sync {
    fn total_pages(&self) -> u32;

    /// Encoded bytes of page `page` (1-based)
    fn read_page(&self, page: u32) -> Result<Vec<u8>>;
}

impl<S: ContainerSource> PageSource for ContainerReader<S> {
    fn total_pages(&self) -> u32 {
        ContainerReader::total_pages(self)
    }

    fn read_page(&self, page: u32) -> Result<Vec<u8>> {
        ContainerReader::read_page(self, page)
    }
}

/// Page cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// `get_page` calls served from memory
    pub hits: u64,
    /// `get_page` calls that had to decode
    pub misses: u64,
    /// Pages decoded by prefetch passes
    pub prefetched: u64,
    /// Pages dropped for leaving the window
    pub evicted: u64,
    /// Completed prefetch passes
    pub passes: u64,
}

impl CacheStats {
    /// Hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

struct CacheState {
    pages: HashMap<u32, Arc<RgbImage>>,
    /// Last page handed to the viewer; 0 before the first request
    current: u32,
    stats: CacheStats,
}

struct Shared {
    state: Mutex<CacheState>,
    source: Box<dyn PageSource>,
    codec: Box<dyn PageCodec>,
}

impl Shared {
    /// Decode `page` into the map unless it is already there.
    ///
    /// Returns `None` for page numbers outside the book.
    fn load(&self, state: &mut CacheState, page: u32) -> Result<Option<Arc<RgbImage>>> {
        if page < 1 || page > self.source.total_pages() {
            return Ok(None);
        }

        if let Some(image) = state.pages.get(&page) {
            return Ok(Some(Arc::clone(image)));
        }

        let bytes = self.source.read_page(page)?;
        let image = Arc::new(self.codec.decode(&bytes)?);
        state.pages.insert(page, Arc::clone(&image));
        debug!("Decoded page {}", page);
        Ok(Some(image))
    }

    fn prefetch_pass(&self) {
        let mut state = self.state.lock();
        let current = state.current;
        if current == 0 {
            return;
        }

        for neighbour in [current - 1, current + 1] {
            let cached = state.pages.contains_key(&neighbour);
            match self.load(&mut state, neighbour) {
                Ok(Some(_)) if !cached => state.stats.prefetched += 1,
                Ok(_) => {}
                Err(err) => warn!("Prefetch of page {} failed: {}", neighbour, err),
            }
        }

        let before = state.pages.len();
        state
            .pages
            .retain(|&page, _| page + 1 >= current && page <= current + 1);
        let evicted = (before - state.pages.len()) as u64;
        state.stats.evicted += evicted;
        state.stats.passes += 1;

        debug!(
            "Prefetch pass around page {}: {} loaded, {} evicted",
            current,
            state.pages.len(),
            evicted
        );
    }
}

enum Command {
    Rearm,
    Shutdown,
}

/// Single-shot, rearmable delay before each prefetch pass
fn prefetch_worker(shared: Arc<Shared>, commands: Receiver<Command>, delay: Duration) {
    loop {
        match commands.recv() {
            Ok(Command::Rearm) => {}
            Ok(Command::Shutdown) | Err(_) => return,
        }

        loop {
            match commands.recv_timeout(delay) {
                Ok(Command::Rearm) => continue,
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => return,
                Err(RecvTimeoutError::Timeout) => {
                    shared.prefetch_pass();
                    break;
                }
            }
        }
    }
}

/// Bounded page cache over a [`PageSource`]
pub struct PageCache {
    shared: Arc<Shared>,
    commands: Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl PageCache {
    /// Start a cache with its prefetch worker.
    ///
    /// # Errors
    ///
    /// `Io` if the worker thread cannot be spawned.
    pub fn new(
        source: Box<dyn PageSource>,
        codec: Box<dyn PageCodec>,
        prefetch_delay: Duration,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(CacheState {
                pages: HashMap::new(),
                current: 0,
                stats: CacheStats::default(),
            }),
            source,
            codec,
        });

        let (commands, receiver) = channel::unbounded();
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("zwc-prefetch".to_string())
            .spawn(move || prefetch_worker(worker_shared, receiver, prefetch_delay))?;

        Ok(PageCache {
            shared,
            commands,
            worker: Some(worker),
        })
    }

    pub fn total_pages(&self) -> u32 {
        self.shared.source.total_pages()
    }

    /// Decoded page `page`, loading it if needed.
    ///
    /// Moving to a different page restarts the prefetch delay.
    ///
    /// # Errors
    ///
    /// - `PageOutOfRange` if `page` is outside `[1, total_pages]`
    /// - I/O and decode failures from the source and codec
    pub fn get_page(&self, page: u32) -> Result<Arc<RgbImage>> {
        let total = self.total_pages();
        let mut state = self.shared.state.lock();

        let cached = state.pages.contains_key(&page);
        let image = self
            .shared
            .load(&mut state, page)?
            .ok_or(ZwcError::PageOutOfRange { page, total })?;

        if cached {
            state.stats.hits += 1;
        } else {
            state.stats.misses += 1;
        }

        if state.current != page {
            state.current = page;
            if self.commands.send(Command::Rearm).is_err() {
                warn!("Prefetch worker is gone; page {} neighbours not prefetched", page);
            }
        }

        Ok(image)
    }

    /// Run a prefetch pass now instead of waiting for the timer
    pub fn prefetch_now(&self) {
        self.shared.prefetch_pass();
    }

    /// Page the viewer last requested (0 before the first request)
    pub fn current_page(&self) -> u32 {
        self.shared.state.lock().current
    }

    /// Loaded page numbers, ascending
    pub fn loaded_pages(&self) -> Vec<u32> {
        let state = self.shared.state.lock();
        let mut pages: Vec<u32> = state.pages.keys().copied().collect();
        pages.sort_unstable();
        pages
    }

    pub fn is_loaded(&self, page: u32) -> bool {
        self.shared.state.lock().pages.contains_key(&page)
    }

    pub fn stats(&self) -> CacheStats {
        self.shared.state.lock().stats
    }
}

impl Drop for PageCache {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Prefetch worker panicked");
            }
        }
    }
}
