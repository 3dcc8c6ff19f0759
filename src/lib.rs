//! # zwc-book - Fixed-Page Raster Books
//!
//! `zwc-book` turns a rendered document into a book of fixed-size raster
//! pages for small e-ink style readers, and serves those pages back with a
//! small bounded cache:
//!
//! - **Paginator**: stacks rendered source pages onto a canvas and cuts
//!   fixed-height pages on blank rows, so lines of text are not sliced
//! - **Container** (`.zwc_data`): all pages in one file behind an offset
//!   header, read one page at a time
//! - **Sidecar** (`.zwc`): `key = value` metadata with the page count and the
//!   reader's position
//! - **PageCache**: keeps the current page and its neighbours decoded,
//!   prefetched once the reader settles on a page
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zwc_book::{BookBuilder, BuildConfig, ImageDirRenderer, ReaderConfig, ReaderSession, Result};
//!
//! # fn main() -> Result<()> {
//! // Build `books/novel.zwc` + `books/novel.zwc_data` from scanned pages
//! let mut renderer = ImageDirRenderer::open("scans/novel")?;
//! let report = BookBuilder::new(BuildConfig::default()).build(&mut renderer, "books/novel")?;
//! println!("{} pages", report.output_pages);
//!
//! // Read it back, resuming at the stored position
//! let mut session = ReaderSession::open("books/novel.zwc", ReaderConfig::default())?;
//! let page = session.page_down()?;
//! println!("page {} is {}x{}", session.current_page(), page.width(), page.height());
//! # Ok(())
//! # }
//! ```
//!
//! ## Lower Level
//!
//! ```rust
//! use zwc_book::{ContainerReader, ContainerWriter, Result};
//!
//! # fn main() -> Result<()> {
//! let bytes = ContainerWriter::encode(&[b"first".to_vec(), b"second".to_vec()])?;
//!
//! // The page count travels outside the container
//! let reader = ContainerReader::open(bytes, 2)?;
//! assert_eq!(reader.read_page(2)?, b"second");
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use crate::core::{
    builder::{BookBuilder, BuildReport, ImageDirRenderer, PageRenderer},
    codec::{CodecKind, GifCodec, PageCodec, PngCodec},
    config::{BuildConfig, ReaderConfig, ZwcConfig},
    container::{
        ContainerReader, ContainerSource, ContainerWriter, FileSource, MmapSource, OffsetTable,
    },
    error::{Result, ZwcError},
    page_cache::{CacheStats, PageCache, PageSource},
    page_folder::PageFolder,
    paginator::{OutputPage, Pagination, Paginator, PaginatorOptions},
    session::ReaderSession,
    sidecar::{BookInfo, BookPaths, Sidecar},
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
