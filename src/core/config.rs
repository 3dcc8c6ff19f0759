//! Build and reader configuration
//!
//! Both halves load from one TOML file with `[build]` and `[reader]` tables.
//! Every field has a default, so an empty file (or no file) is valid:
//!
//! ```toml
//! [build]
//! page_width = 800
//! page_height = 600
//! canvas_height = 3000
//! blank_threshold = 220
//! codec = "png"
//!
//! [reader]
//! prefetch_delay_ms = 500
//! ```

use crate::core::codec::CodecKind;
use crate::core::error::{Result, ZwcError};
use crate::core::paginator::PaginatorOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PAGE_WIDTH: u32 = 800;
pub const DEFAULT_PAGE_HEIGHT: u32 = 600;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 3000;
pub const DEFAULT_BLANK_THRESHOLD: u8 = 220;
pub const DEFAULT_PREFETCH_DELAY_MS: u64 = 500;

/// Settings for turning rendered source pages into a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Output page width in pixels (before display rotation)
    pub page_width: u32,

    /// Output page height in pixels (before display rotation)
    pub page_height: u32,

    /// Initial canvas capacity in rows
    pub canvas_height: u32,

    /// Grow the canvas instead of failing when a tile does not fit
    pub grow_canvas: bool,

    /// Minimum value of every channel for a pixel to count as blank
    pub blank_threshold: u8,

    /// Codec used for the persisted pages
    pub codec: CodecKind,

    /// Keep the loose `NNNN.<ext>` page files next to the container
    pub keep_page_folder: bool,

    /// Width the renderer is asked to produce source pages at
    pub render_width: u32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            page_width: DEFAULT_PAGE_WIDTH,
            page_height: DEFAULT_PAGE_HEIGHT,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            grow_canvas: true,
            blank_threshold: DEFAULT_BLANK_THRESHOLD,
            codec: CodecKind::default(),
            keep_page_folder: false,
            render_width: DEFAULT_PAGE_WIDTH,
        }
    }
}

impl BuildConfig {
    pub fn validate(&self) -> Result<()> {
        if self.page_width == 0 || self.page_height == 0 {
            return Err(ZwcError::InvalidConfig(format!(
                "page size must be non-zero, got {}x{}",
                self.page_width, self.page_height
            )));
        }

        if self.render_width == 0 {
            return Err(ZwcError::InvalidConfig(
                "render_width must be non-zero".to_string(),
            ));
        }

        // One page of content plus one page of trailing padding must fit
        let min_canvas = self.page_height.saturating_mul(2);
        if self.canvas_height < min_canvas {
            return Err(ZwcError::InvalidConfig(format!(
                "canvas_height {} is below twice the page height ({})",
                self.canvas_height, min_canvas
            )));
        }

        Ok(())
    }

    /// Paginator settings derived from this configuration
    pub fn paginator_options(&self) -> PaginatorOptions {
        PaginatorOptions {
            page_width: self.page_width,
            page_height: self.page_height,
            canvas_height: self.canvas_height,
            grow_canvas: self.grow_canvas,
            blank_threshold: self.blank_threshold,
        }
    }
}

/// Settings for serving a built book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Delay before neighbours of the settled page are prefetched
    pub prefetch_delay_ms: u64,

    /// Map the container into memory instead of seeking a file handle
    pub use_mmap: bool,

    /// Check the container's offset table against the sidecar page count on open
    pub verify_container: bool,

    /// Write `CurrentPage` back to the sidecar after each navigation
    pub persist_position: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            prefetch_delay_ms: DEFAULT_PREFETCH_DELAY_MS,
            use_mmap: true,
            verify_container: false,
            persist_position: true,
        }
    }
}

impl ReaderConfig {
    pub fn prefetch_delay(&self) -> Duration {
        Duration::from_millis(self.prefetch_delay_ms)
    }
}

/// Combined configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZwcConfig {
    pub build: BuildConfig,
    pub reader: ReaderConfig,
}

impl ZwcConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ZwcConfig = toml::from_str(text)?;
        config.build.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
