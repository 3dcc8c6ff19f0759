//! Re-pagination of a rendered strip into fixed-height pages
//!
//! Source pages arrive as tiles of arbitrary height. They are stacked onto a
//! canvas of fixed width, and whenever at least one page height of content
//! has accumulated the paginator cuts a page off the top. Cuts land on the
//! lowest fully blank row within the first page height, so lines of text and
//! figures are not sliced in half. When no blank row exists the cut is forced
//! at exactly one page height.
//!
//! ## Canvas
//!
//! The canvas is one fixed-capacity buffer used as a ring of rows. Appending
//! writes at the fill cursor; cutting advances the logical origin. Rows are
//! never shifted, so the cost of a cut is the copy of the page itself.
//!
//! ```text
//!  physical rows            logical view
//! ┌──────────────┐
//! │ row 2 of tile│ ◄─ wraps
//! ├──────────────┤
//! │   (stale)    │
//! ├──────────────┤ ◄─ origin       row 0
//! │ content      │                 ...
//! │ content      │                 row filled-1
//! └──────────────┘
//! ```

use crate::core::config::{
    DEFAULT_BLANK_THRESHOLD, DEFAULT_CANVAS_HEIGHT, DEFAULT_PAGE_HEIGHT, DEFAULT_PAGE_WIDTH,
};
use crate::core::error::{Result, ZwcError};
use crate::core::raster::{self, CHANNELS};
use image::RgbImage;
use std::collections::VecDeque;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginatorOptions {
    pub page_width: u32,
    pub page_height: u32,
    pub canvas_height: u32,
    pub grow_canvas: bool,
    pub blank_threshold: u8,
}

impl Default for PaginatorOptions {
    fn default() -> Self {
        PaginatorOptions {
            page_width: DEFAULT_PAGE_WIDTH,
            page_height: DEFAULT_PAGE_HEIGHT,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            grow_canvas: true,
            blank_threshold: DEFAULT_BLANK_THRESHOLD,
        }
    }
}

/// One fixed-size page cut from the canvas
#[derive(Debug, Clone)]
pub struct OutputPage {
    /// 1-based page number
    pub number: u32,

    /// `page_width x page_height` image, white below `content_rows`
    pub image: RgbImage,

    /// Canvas rows consumed by this page (the cut height)
    pub content_rows: u32,
}

/// Result of [`Paginator::finish`]
#[derive(Debug)]
pub struct Pagination {
    /// Pages not yet collected through [`Paginator::take_ready`]
    pub pages: Vec<OutputPage>,

    /// Total pages emitted over the paginator's lifetime
    pub page_count: u32,

    /// Blank rows appended at finish to flush the remainder
    pub padding_rows: u32,

    /// Rows left on the canvas after the final drain (all padding)
    pub discarded_rows: u32,
}

/// Ring-of-rows canvas
struct Canvas {
    width: usize,
    capacity: usize,
    origin: usize,
    filled: usize,
    data: Vec<u8>,
}

impl Canvas {
    fn new(width: u32, capacity: u32) -> Self {
        let width = width as usize;
        let capacity = capacity as usize;
        Canvas {
            width,
            capacity,
            origin: 0,
            filled: 0,
            data: vec![255; width * capacity * CHANNELS],
        }
    }

    fn stride(&self) -> usize {
        self.width * CHANNELS
    }

    fn physical(&self, logical: usize) -> usize {
        ((self.origin + logical) % self.capacity) * self.stride()
    }

    fn row(&self, logical: usize) -> &[u8] {
        let start = self.physical(logical);
        &self.data[start..start + self.stride()]
    }

    fn row_mut(&mut self, logical: usize) -> &mut [u8] {
        let start = self.physical(logical);
        let stride = self.stride();
        &mut self.data[start..start + stride]
    }

    /// Draw `tile` at the fill cursor. Narrow tiles are padded with white,
    /// wide tiles are clipped.
    fn push_tile(&mut self, tile: &RgbImage) {
        let tile_stride = tile.width() as usize * CHANNELS;
        let copy = tile_stride.min(self.stride());
        let raw = tile.as_raw();

        for ty in 0..tile.height() as usize {
            let src = &raw[ty * tile_stride..ty * tile_stride + copy];
            let cursor = self.filled;
            let dst = self.row_mut(cursor);
            dst[..copy].copy_from_slice(src);
            dst[copy..].fill(255);
            self.filled += 1;
        }
    }

    fn push_blank(&mut self, rows: usize) {
        for _ in 0..rows {
            let cursor = self.filled;
            self.row_mut(cursor).fill(255);
            self.filled += 1;
        }
    }

    /// Re-linearise into a larger buffer holding at least `needed` rows
    fn grow(&mut self, needed: usize) {
        let capacity = needed.max(self.capacity * 2);
        let stride = self.stride();
        let mut data = vec![255; capacity * stride];
        for logical in 0..self.filled {
            data[logical * stride..(logical + 1) * stride].copy_from_slice(self.row(logical));
        }

        self.data = data;
        self.capacity = capacity;
        self.origin = 0;
    }

    fn consume(&mut self, rows: usize) {
        self.origin = (self.origin + rows) % self.capacity;
        self.filled -= rows;
    }
}

/// Streaming re-paginator
pub struct Paginator {
    options: PaginatorOptions,
    canvas: Canvas,
    ready: VecDeque<OutputPage>,
    next_number: u32,
    appended_rows: u64,
}

impl Paginator {
    pub fn new(options: PaginatorOptions) -> Result<Self> {
        if options.page_width == 0 || options.page_height == 0 {
            return Err(ZwcError::InvalidConfig(format!(
                "page size must be non-zero, got {}x{}",
                options.page_width, options.page_height
            )));
        }

        if options.canvas_height < options.page_height.saturating_mul(2) {
            return Err(ZwcError::InvalidConfig(format!(
                "canvas height {} must be at least twice the page height {}",
                options.canvas_height, options.page_height
            )));
        }

        Ok(Paginator {
            options,
            canvas: Canvas::new(options.page_width, options.canvas_height),
            ready: VecDeque::new(),
            next_number: 1,
            appended_rows: 0,
        })
    }

    pub fn options(&self) -> &PaginatorOptions {
        &self.options
    }

    /// Rows of content waiting on the canvas
    pub fn filled_rows(&self) -> u32 {
        self.canvas.filled as u32
    }

    /// Current canvas capacity in rows
    pub fn capacity(&self) -> u32 {
        self.canvas.capacity as u32
    }

    /// Total rows appended so far
    pub fn appended_rows(&self) -> u64 {
        self.appended_rows
    }

    /// Pages cut so far, collected or not
    pub fn pages_emitted(&self) -> u32 {
        self.next_number - 1
    }

    /// Stack `tile` below the current content and cut every full page.
    ///
    /// # Errors
    ///
    /// `CanvasOverflow` if the tile does not fit and canvas growth is disabled.
    pub fn append(&mut self, tile: &RgbImage) -> Result<()> {
        let needed = self.canvas.filled + tile.height() as usize;
        if needed > self.canvas.capacity {
            if !self.options.grow_canvas {
                return Err(ZwcError::CanvasOverflow {
                    needed: needed as u32,
                    capacity: self.canvas.capacity as u32,
                });
            }

            warn!(
                "Canvas too small for {}-row tile, growing from {} rows",
                tile.height(),
                self.canvas.capacity
            );
            self.canvas.grow(needed);
        }

        self.canvas.push_tile(tile);
        self.appended_rows += tile.height() as u64;
        self.drain();
        Ok(())
    }

    /// Height of the next cut.
    ///
    /// Scans rows `page_height - 1` down to `0` and returns one past the first
    /// blank row found, i.e. the blank cut closest to a full page. Rows not
    /// yet written count as blank. Returns `page_height` when no row is blank.
    pub fn find_cut_row(&self) -> u32 {
        let threshold = self.options.blank_threshold;
        for y in (0..self.options.page_height as usize).rev() {
            if y >= self.canvas.filled || raster::is_blank_row(self.canvas.row(y), threshold) {
                return y as u32 + 1;
            }
        }

        self.options.page_height
    }

    fn drain(&mut self) {
        let page_height = self.options.page_height as usize;
        while self.canvas.filled >= page_height {
            let cut = self.find_cut_row();
            self.emit(cut);
        }
    }

    fn emit(&mut self, cut: u32) {
        let mut image = raster::blank_page(self.options.page_width, self.options.page_height);
        let stride = self.canvas.stride();
        {
            let buf: &mut [u8] = &mut image;
            for y in 0..cut as usize {
                buf[y * stride..(y + 1) * stride].copy_from_slice(self.canvas.row(y));
            }
        }
        self.canvas.consume(cut as usize);

        let number = self.next_number;
        self.next_number += 1;
        debug!("Cut page {} at row {}", number, cut);

        self.ready.push_back(OutputPage {
            number,
            image,
            content_rows: cut,
        });
    }

    /// Collect the pages cut since the last call
    pub fn take_ready(&mut self) -> Vec<OutputPage> {
        self.ready.drain(..).collect()
    }

    /// Flush the remainder with one page of trailing blank rows.
    ///
    /// Consumes the paginator. The padding is always appended, so content
    /// ending exactly on a cut is followed by a blank page and an empty feed
    /// yields a single blank page.
    pub fn finish(mut self) -> Pagination {
        let padding = self.options.page_height;
        let needed = self.canvas.filled + padding as usize;
        if needed > self.canvas.capacity {
            self.canvas.grow(needed);
        }
        self.canvas.push_blank(padding as usize);
        self.drain();

        Pagination {
            pages: self.ready.into(),
            page_count: self.next_number - 1,
            padding_rows: padding,
            discarded_rows: self.canvas.filled as u32,
        }
    }
}
