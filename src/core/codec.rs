//! Page image codecs
//!
//! Pages are stored encoded inside the container. Any codec works as long as
//! decode(encode(page)) reproduces the page pixel for pixel.

use crate::core::error::{Result, ZwcError};
use image::codecs::gif::GifEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// Encodes persisted pages and decodes them back for display
pub trait PageCodec: Send + Sync {
    fn kind(&self) -> CodecKind;

    fn encode(&self, page: &RgbImage) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<RgbImage>;
}

/// Codec selector used in configuration and in the sidecar `Codec` key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// Lossless for any page content
    #[default]
    Png,
    /// Palette codec; exact for pages with at most 256 distinct colours
    Gif,
}

impl CodecKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodecKind::Png => "png",
            CodecKind::Gif => "gif",
        }
    }

    /// File extension used for loose page files
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    pub fn codec(self) -> Box<dyn PageCodec> {
        match self {
            CodecKind::Png => Box::new(PngCodec),
            CodecKind::Gif => Box::new(GifCodec),
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            CodecKind::Png => ImageFormat::Png,
            CodecKind::Gif => ImageFormat::Gif,
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodecKind {
    type Err = ZwcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(CodecKind::Png),
            "gif" => Ok(CodecKind::Gif),
            _ => Err(ZwcError::InvalidConfig(format!(
                "unknown codec '{}', expected png or gif",
                s
            ))),
        }
    }
}

fn decode_as(bytes: &[u8], kind: CodecKind) -> Result<RgbImage> {
    let image = image::load_from_memory_with_format(bytes, kind.image_format())?;
    Ok(image.to_rgb8())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl PageCodec for PngCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Png
    }

    fn encode(&self, page: &RgbImage) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes).write_image(
            page.as_raw(),
            page.width(),
            page.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<RgbImage> {
        decode_as(bytes, CodecKind::Png)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GifCodec;

impl PageCodec for GifCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Gif
    }

    fn encode(&self, page: &RgbImage) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut encoder = GifEncoder::new(&mut cursor);
            encoder.encode(
                page.as_raw(),
                page.width(),
                page.height(),
                ExtendedColorType::Rgb8,
            )?;
        }
        Ok(cursor.into_inner())
    }

    fn decode(&self, bytes: &[u8]) -> Result<RgbImage> {
        decode_as(bytes, CodecKind::Gif)
    }
}
