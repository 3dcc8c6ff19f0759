//! Book build pipeline
//!
//! ```text
//! PageRenderer ──tile──► Paginator ──page──► rotate ──► PageCodec ──► ContainerWriter
//!                                                          │
//!                                                          └──► PageFolder (optional)
//! ```
//!
//! The container is persisted before the sidecar, so an existing sidecar
//! always names a complete container.

use crate::core::codec::{CodecKind, PageCodec};
use crate::core::config::BuildConfig;
use crate::core::container::ContainerWriter;
use crate::core::error::{Result, ZwcError};
use crate::core::page_folder::PageFolder;
use crate::core::paginator::{OutputPage, Paginator};
use crate::core::raster;
use crate::core::sidecar::{BookInfo, BookPaths, Sidecar};
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Produces the source pages of a document as raster tiles
pub trait PageRenderer {
    fn page_count(&mut self) -> Result<usize>;

    /// Render source page `index` (0-based) at `width` pixels wide
    fn render_page(&mut self, index: usize, width: u32) -> Result<RgbImage>;
}

/// Renders a directory of raster images, one image per source page, in file
/// name order.
pub struct ImageDirRenderer {
    files: Vec<PathBuf>,
}

impl ImageDirRenderer {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_supported_image(&path) {
                files.push(path);
            }
        }
        files.sort();

        debug!("Found {} source images", files.len());
        Ok(ImageDirRenderer { files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

fn is_supported_image(path: &Path) -> bool {
    matches!(
        ImageFormat::from_path(path),
        Ok(ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP)
    )
}

impl PageRenderer for ImageDirRenderer {
    fn page_count(&mut self) -> Result<usize> {
        Ok(self.files.len())
    }

    fn render_page(&mut self, index: usize, width: u32) -> Result<RgbImage> {
        let path = self.files.get(index).ok_or_else(|| {
            ZwcError::Render(format!(
                "source page {} requested, directory has {}",
                index,
                self.files.len()
            ))
        })?;

        let image = raster::flatten_on_white(&image::open(path)?);
        if image.width() == width || image.width() == 0 {
            return Ok(image);
        }

        let height = (image.height() as u64 * width as u64 / image.width() as u64).max(1) as u32;
        debug!(
            "Scaling {:?} from {}x{} to {}x{}",
            path,
            image.width(),
            image.height(),
            width,
            height
        );
        Ok(imageops::resize(&image, width, height, FilterType::Lanczos3))
    }
}

/// Outcome of a successful build
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub source_pages: usize,
    pub output_pages: u32,
    pub container_bytes: u64,
    pub codec: CodecKind,
    pub paths: BookPaths,
}

pub struct BookBuilder {
    config: BuildConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl BookBuilder {
    pub fn new(config: BuildConfig) -> Self {
        BookBuilder {
            config,
            cancel: None,
        }
    }

    /// Abort the build between source pages once `flag` is set
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(ZwcError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Build the book `<stem>.zwc` / `<stem>.zwc_data` from `renderer`.
    ///
    /// A renderer with no pages still yields a one-page blank book.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` for an invalid build configuration
    /// - `Cancelled` when the cancel flag is raised mid-build
    ///
    /// A page folder created by a failed build is removed again.
    /// - renderer, codec and I/O failures
    pub fn build<P: AsRef<Path>>(
        &self,
        renderer: &mut dyn PageRenderer,
        stem: P,
    ) -> Result<BuildReport> {
        self.config.validate()?;

        let paths = BookPaths::from_stem(stem);
        let folder = self
            .config
            .keep_page_folder
            .then(|| PageFolder::new(&paths.page_folder, self.config.codec, 0));
        let fresh_folder = folder.is_some() && !paths.page_folder.exists();

        let result = self.write_book(renderer, &paths, folder.as_ref());
        if let (Err(err), Some(folder)) = (&result, &folder) {
            if fresh_folder {
                warn!("Build failed ({}), removing {:?}", err, folder.dir());
                if let Err(cleanup) = folder.remove() {
                    warn!("Failed to remove {:?}: {}", folder.dir(), cleanup);
                }
            }
        }

        let (source_pages, output_pages, container_bytes) = result?;
        Ok(BuildReport {
            source_pages,
            output_pages,
            container_bytes,
            codec: self.config.codec,
            paths,
        })
    }

    /// Paginate, encode and persist; returns source pages, output pages and
    /// container size
    fn write_book(
        &self,
        renderer: &mut dyn PageRenderer,
        paths: &BookPaths,
        folder: Option<&PageFolder>,
    ) -> Result<(usize, u32, u64)> {
        let codec = self.config.codec.codec();
        let mut paginator = Paginator::new(self.config.paginator_options())?;
        let mut writer = ContainerWriter::new();

        let source_pages = renderer.page_count()?;
        info!(
            "Building {:?} from {} source pages",
            paths.sidecar, source_pages
        );

        for index in 0..source_pages {
            self.check_cancelled()?;

            let tile = renderer.render_page(index, self.config.render_width)?;
            paginator.append(&tile)?;
            for page in paginator.take_ready() {
                store_page(&mut writer, codec.as_ref(), folder, page)?;
            }

            info!(
                "Source page {}/{} done, {} pages cut",
                index + 1,
                source_pages,
                paginator.pages_emitted()
            );
        }
        self.check_cancelled()?;

        let pagination = paginator.finish();
        for page in pagination.pages {
            store_page(&mut writer, codec.as_ref(), folder, page)?;
        }

        let table = writer.write_atomic(&paths.container)?;

        let mut sidecar = Sidecar::new();
        BookInfo::new(writer.page_count(), self.config.codec).apply_to(&mut sidecar);
        sidecar.save(&paths.sidecar)?;

        info!(
            "Built {:?}: {} pages, {} bytes",
            paths.sidecar,
            writer.page_count(),
            table.end()
        );

        Ok((source_pages, writer.page_count(), table.end()))
    }
}

fn store_page(
    writer: &mut ContainerWriter,
    codec: &dyn PageCodec,
    folder: Option<&PageFolder>,
    page: OutputPage,
) -> Result<()> {
    let rotated = raster::rotate_for_display(&page.image);
    let bytes = codec.encode(&rotated)?;
    if let Some(folder) = folder {
        folder.write_page(page.number, &bytes)?;
    }
    writer.push_page(bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::container::ContainerReader;
    use image::Rgb;
    use tempfile::TempDir;

    /// Source pages of `height` rows with a black line every 10 rows
    struct StripedRenderer {
        pages: usize,
        height: u32,
    }

    impl PageRenderer for StripedRenderer {
        fn page_count(&mut self) -> Result<usize> {
            Ok(self.pages)
        }

        fn render_page(&mut self, _index: usize, width: u32) -> Result<RgbImage> {
            Ok(RgbImage::from_fn(width, self.height, |_, y| {
                if y % 10 < 6 {
                    Rgb([0, 0, 0])
                } else {
                    Rgb([255, 255, 255])
                }
            }))
        }
    }

    fn small_config() -> BuildConfig {
        BuildConfig {
            page_width: 40,
            page_height: 30,
            canvas_height: 150,
            render_width: 40,
            ..BuildConfig::default()
        }
    }

    #[test]
    fn test_build_writes_container_and_sidecar() {
        let dir = TempDir::new().unwrap();
        let mut renderer = StripedRenderer {
            pages: 3,
            height: 50,
        };

        let report = BookBuilder::new(small_config())
            .build(&mut renderer, dir.path().join("book"))
            .unwrap();

        assert_eq!(report.source_pages, 3);
        assert!(report.output_pages >= 5);
        assert!(report.paths.container.exists());
        assert!(!report.paths.page_folder.exists());

        let info = BookInfo::from_sidecar(&Sidecar::load(&report.paths.sidecar).unwrap()).unwrap();
        assert_eq!(info.total_pages, report.output_pages);
        assert_eq!(info.current_page, 1);
        assert_eq!(info.codec, CodecKind::Png);

        let reader =
            ContainerReader::open_verified(fs::read(&report.paths.container).unwrap(), info.total_pages)
                .unwrap();
        let first = info.codec.codec().decode(&reader.read_page(1).unwrap()).unwrap();
        // Stored rotated: 40x30 pages become 30x40
        assert_eq!(first.dimensions(), (30, 40));
    }

    #[test]
    fn test_keep_page_folder() {
        let dir = TempDir::new().unwrap();
        let config = BuildConfig {
            keep_page_folder: true,
            codec: CodecKind::Gif,
            ..small_config()
        };

        let report = BookBuilder::new(config)
            .build(&mut StripedRenderer { pages: 2, height: 45 }, dir.path().join("book"))
            .unwrap();

        let pages = PageFolder::scan(&report.paths.page_folder).unwrap();
        assert_eq!(pages, (1..=report.output_pages).collect::<Vec<_>>());
        assert!(report.paths.page_folder.join("0001.gif").exists());
    }

    #[test]
    fn test_empty_source_builds_one_blank_page() {
        let dir = TempDir::new().unwrap();
        let report = BookBuilder::new(small_config())
            .build(&mut StripedRenderer { pages: 0, height: 10 }, dir.path().join("book"))
            .unwrap();

        assert_eq!(report.source_pages, 0);
        assert_eq!(report.output_pages, 1);

        let reader =
            ContainerReader::open_verified(fs::read(&report.paths.container).unwrap(), 1).unwrap();
        let page = CodecKind::Png.codec().decode(&reader.read_page(1).unwrap()).unwrap();
        assert_eq!(page.dimensions(), (30, 40));
        assert!(page.pixels().all(|p| *p == raster::WHITE));
    }

    #[test]
    fn test_cancelled_build_leaves_no_sidecar() {
        let dir = TempDir::new().unwrap();
        let flag = Arc::new(AtomicBool::new(true));

        let result = BookBuilder::new(small_config())
            .with_cancel(flag)
            .build(&mut StripedRenderer { pages: 4, height: 50 }, dir.path().join("book"));

        assert!(matches!(result, Err(ZwcError::Cancelled)));
        assert!(!dir.path().join("book.zwc").exists());
        assert!(!dir.path().join("book.zwc_data").exists());
    }

    /// Raises the cancel flag once the first source page is rendered
    struct CancellingRenderer {
        inner: StripedRenderer,
        flag: Arc<AtomicBool>,
    }

    impl PageRenderer for CancellingRenderer {
        fn page_count(&mut self) -> Result<usize> {
            self.inner.page_count()
        }

        fn render_page(&mut self, index: usize, width: u32) -> Result<RgbImage> {
            self.flag.store(true, Ordering::Relaxed);
            self.inner.render_page(index, width)
        }
    }

    #[test]
    fn test_cancelled_build_removes_partial_page_folder() {
        let dir = TempDir::new().unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        let config = BuildConfig {
            keep_page_folder: true,
            ..small_config()
        };
        let mut renderer = CancellingRenderer {
            inner: StripedRenderer { pages: 4, height: 50 },
            flag: Arc::clone(&flag),
        };

        let result = BookBuilder::new(config)
            .with_cancel(flag)
            .build(&mut renderer, dir.path().join("book"));

        assert!(matches!(result, Err(ZwcError::Cancelled)));
        assert!(!dir.path().join("book").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let config = BuildConfig {
            canvas_height: 10,
            ..small_config()
        };
        let result = BookBuilder::new(config)
            .build(&mut StripedRenderer { pages: 1, height: 10 }, dir.path().join("book"));
        assert!(matches!(result, Err(ZwcError::InvalidConfig(_))));
    }

    #[test]
    fn test_transparent_background_cuts_on_blank_rows() {
        let dir = TempDir::new().unwrap();
        // Ink lines on rows 0..20 and 25..40, transparent elsewhere
        image::RgbaImage::from_fn(40, 40, |_, y| {
            if y < 20 || (25..40).contains(&y) {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 0, 0])
            }
        })
        .save(dir.path().join("page.png"))
        .unwrap();

        let mut renderer = ImageDirRenderer::open(dir.path()).unwrap();
        let tile = renderer.render_page(0, 40).unwrap();
        assert_eq!(*tile.get_pixel(0, 22), raster::WHITE);

        let mut paginator = Paginator::new(small_config().paginator_options()).unwrap();
        paginator.append(&tile).unwrap();
        let pages = paginator.take_ready();
        assert_eq!(pages[0].content_rows, 25);
    }

    #[test]
    fn test_image_dir_renderer() {
        let dir = TempDir::new().unwrap();
        RgbImage::from_pixel(20, 10, Rgb([0, 0, 0]))
            .save(dir.path().join("b.png"))
            .unwrap();
        RgbImage::from_pixel(40, 10, Rgb([255, 255, 255]))
            .save(dir.path().join("a.png"))
            .unwrap();
        fs::write(dir.path().join("notes.txt"), b"skip").unwrap();

        let mut renderer = ImageDirRenderer::open(dir.path()).unwrap();
        assert_eq!(renderer.page_count().unwrap(), 2);
        assert!(renderer.files()[0].ends_with("a.png"));

        assert_eq!(renderer.render_page(0, 40).unwrap().dimensions(), (40, 10));
        assert_eq!(renderer.render_page(1, 40).unwrap().dimensions(), (40, 20));
        assert!(matches!(
            renderer.render_page(2, 40),
            Err(ZwcError::Render(_))
        ));
    }
}
