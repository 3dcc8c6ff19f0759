//! zwc - build and inspect fixed-page raster books

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use zwc_book::{
    BookBuilder, BookInfo, BookPaths, BuildConfig, ContainerReader, ImageDirRenderer,
    MmapSource, Sidecar, ZwcConfig,
};

#[derive(Parser, Debug)]
#[command(name = "zwc")]
#[command(about = "Build and inspect fixed-page raster books", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Paginate a directory of page images into a book
    Build {
        /// Directory of source page images, read in file name order
        image_dir: PathBuf,

        /// Book stem: writes <out>.zwc and <out>.zwc_data
        #[arg(short, long)]
        out: PathBuf,

        /// TOML configuration file ([build] table)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show a book's metadata
    Info {
        /// Sidecar file (<name>.zwc)
        book: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode one page to an image file
    Extract {
        /// Sidecar file (<name>.zwc)
        book: PathBuf,

        /// 1-based page number
        #[arg(short, long)]
        page: u32,

        /// Output image (format from extension)
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Check the container header against the sidecar and decode every page
    Verify {
        /// Sidecar file (<name>.zwc)
        book: PathBuf,
    },
}

#[derive(Serialize)]
struct InfoReport {
    sidecar: PathBuf,
    container: PathBuf,
    total_pages: u32,
    current_page: u32,
    codec: String,
    container_bytes: Option<u64>,
}

fn load_book(book: &Path) -> Result<(BookPaths, BookInfo)> {
    let paths = BookPaths::from_sidecar(book)?;
    let sidecar = Sidecar::load(&paths.sidecar)
        .with_context(|| format!("reading sidecar {:?}", paths.sidecar))?;
    let info = BookInfo::from_sidecar(&sidecar)?;
    Ok((paths, info))
}

fn build(image_dir: PathBuf, out: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let build_config = match config {
        Some(path) => {
            ZwcConfig::load(&path)
                .with_context(|| format!("loading config {:?}", path))?
                .build
        }
        None => BuildConfig::default(),
    };

    let mut renderer = ImageDirRenderer::open(&image_dir)
        .with_context(|| format!("scanning {:?}", image_dir))?;
    if renderer.files().is_empty() {
        bail!("no page images found in {:?}", image_dir);
    }

    let report = BookBuilder::new(build_config).build(&mut renderer, &out)?;
    println!(
        "{} source pages -> {} pages ({}, {} bytes)",
        report.source_pages, report.output_pages, report.codec, report.container_bytes
    );
    println!("{}", report.paths.sidecar.display());
    Ok(())
}

fn show_info(book: PathBuf, json: bool) -> Result<()> {
    let (paths, info) = load_book(&book)?;
    let container_bytes = std::fs::metadata(&paths.container).map(|m| m.len()).ok();

    let report = InfoReport {
        sidecar: paths.sidecar,
        container: paths.container,
        total_pages: info.total_pages,
        current_page: info.current_page,
        codec: info.codec.to_string(),
        container_bytes,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Sidecar:      {}", report.sidecar.display());
        println!("Container:    {}", report.container.display());
        println!("Pages:        {}", report.total_pages);
        println!("Current page: {}", report.current_page);
        println!("Codec:        {}", report.codec);
        match report.container_bytes {
            Some(bytes) => println!("Size:         {} bytes", bytes),
            None => println!("Size:         (no container)"),
        }
    }
    Ok(())
}

fn extract(book: PathBuf, page: u32, out: PathBuf) -> Result<()> {
    let (paths, info) = load_book(&book)?;
    let reader = ContainerReader::open(MmapSource::open(&paths.container)?, info.total_pages)?;

    let bytes = reader.read_page(page)?;
    let image = info.codec.codec().decode(&bytes)?;
    image
        .save(&out)
        .with_context(|| format!("writing {:?}", out))?;

    info!("Extracted page {} to {:?}", page, out);
    Ok(())
}

fn verify(book: PathBuf) -> Result<()> {
    let (paths, info) = load_book(&book)?;
    let reader =
        ContainerReader::open_verified(MmapSource::open(&paths.container)?, info.total_pages)?;

    let codec = info.codec.codec();
    for page in 1..=info.total_pages {
        let bytes = reader.read_page(page)?;
        codec
            .decode(&bytes)
            .with_context(|| format!("decoding page {}", page))?;
    }

    println!("OK: {} pages", info.total_pages);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Build {
            image_dir,
            out,
            config,
        } => build(image_dir, out, config),
        Command::Info { book, json } => show_info(book, json),
        Command::Extract { book, page, out } => extract(book, page, out),
        Command::Verify { book } => verify(book),
    }
}
