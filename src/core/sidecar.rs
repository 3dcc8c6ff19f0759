//! Sidecar metadata file (`<name>.zwc`)
//!
//! A small UTF-8 `key = value` file next to the container. Blank lines and
//! lines starting with `;` are ignored. A leading byte order mark is skipped. The first `=` splits a line; key and
//! value are trimmed.
//!
//! ```text
//! ;Create at 2026-10-18 09:12:44 +02:00
//!
//! Codec = png
//! CurrentPage = 1
//! TotalPages = 48
//! ```

use crate::core::codec::CodecKind;
use crate::core::container::CONTAINER_EXTENSION;
use crate::core::error::{Result, ZwcError};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Sidecar file extension
pub const SIDECAR_EXTENSION: &str = "zwc";

pub const KEY_TOTAL_PAGES: &str = "TotalPages";
pub const KEY_CURRENT_PAGE: &str = "CurrentPage";
pub const KEY_CODEC: &str = "Codec";

/// Parsed sidecar entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sidecar {
    entries: BTreeMap<String, String>,
}

impl Sidecar {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// `Sidecar` for a line without `=`, an empty key, or a repeated key.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut entries = BTreeMap::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }

            let line_no = index + 1;
            let (key, value) = line.split_once('=').ok_or_else(|| ZwcError::Sidecar {
                line: line_no,
                reason: "expected `key = value`".to_string(),
            })?;

            let key = key.trim();
            if key.is_empty() {
                return Err(ZwcError::Sidecar {
                    line: line_no,
                    reason: "empty key".to_string(),
                });
            }

            if entries
                .insert(key.to_string(), value.trim().to_string())
                .is_some()
            {
                return Err(ZwcError::Sidecar {
                    line: line_no,
                    reason: format!("duplicate key `{}`", key),
                });
            }
        }

        Ok(Sidecar { entries })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Load `path`, or start empty if it does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Text form: creation comment, blank line, then entries sorted by key
    pub fn to_text(&self) -> String {
        let mut text = format!(
            ";Create at {}\n\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S %:z")
        );
        for (key, value) in &self.entries {
            text.push_str(key);
            text.push_str(" = ");
            text.push_str(value);
            text.push('\n');
        }
        text
    }

    /// Replace the file at `path` atomically
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::env::current_dir()?,
        };

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(self.to_text().as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(path)?;

        debug!("Saved sidecar {:?} ({} keys)", path, self.entries.len());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.entries.insert(key.into(), value.to_string());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Integer value of `key`, `None` when absent
    pub fn get_u32(&self, key: &str) -> Result<Option<u32>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .parse::<u32>()
                .map(Some)
                .map_err(|_| ZwcError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
        }
    }
}

/// Typed view of the keys a reader needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookInfo {
    pub total_pages: u32,
    pub current_page: u32,
    pub codec: CodecKind,
}

impl BookInfo {
    pub fn new(total_pages: u32, codec: CodecKind) -> Self {
        BookInfo {
            total_pages,
            current_page: 1,
            codec,
        }
    }

    /// # Errors
    ///
    /// - `MissingKey` without `TotalPages`
    /// - `InvalidValue` for a zero page count, a non-integer, or an unknown codec
    pub fn from_sidecar(sidecar: &Sidecar) -> Result<Self> {
        let total_pages = sidecar
            .get_u32(KEY_TOTAL_PAGES)?
            .ok_or(ZwcError::MissingKey(KEY_TOTAL_PAGES))?;
        if total_pages == 0 {
            return Err(ZwcError::InvalidValue {
                key: KEY_TOTAL_PAGES.to_string(),
                value: "0".to_string(),
            });
        }

        let current_page = sidecar
            .get_u32(KEY_CURRENT_PAGE)?
            .unwrap_or(1)
            .clamp(1, total_pages);

        // Books written before the key existed are GIF
        let codec = match sidecar.get(KEY_CODEC) {
            None => CodecKind::Gif,
            Some(value) => value.parse::<CodecKind>().map_err(|_| ZwcError::InvalidValue {
                key: KEY_CODEC.to_string(),
                value: value.to_string(),
            })?,
        };

        Ok(BookInfo {
            total_pages,
            current_page,
            codec,
        })
    }

    pub fn apply_to(&self, sidecar: &mut Sidecar) {
        sidecar.set(KEY_TOTAL_PAGES, self.total_pages);
        sidecar.set(KEY_CURRENT_PAGE, self.current_page);
        sidecar.set(KEY_CODEC, self.codec);
    }
}

/// The files that make up one book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookPaths {
    pub sidecar: PathBuf,
    pub container: PathBuf,
    pub page_folder: PathBuf,
}

impl BookPaths {
    /// Paths for the book stem `<dir>/<name>`
    pub fn from_stem<P: AsRef<Path>>(stem: P) -> Self {
        let stem = stem.as_ref();
        BookPaths {
            sidecar: with_suffix(stem, SIDECAR_EXTENSION),
            container: with_suffix(stem, CONTAINER_EXTENSION),
            page_folder: stem.to_path_buf(),
        }
    }

    /// # Errors
    ///
    /// `NotABook` unless `path` ends in `.zwc`.
    pub fn from_sidecar<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.extension().and_then(|ext| ext.to_str()) != Some(SIDECAR_EXTENSION) {
            return Err(ZwcError::NotABook(path.to_path_buf()));
        }
        Ok(Self::from_stem(path.with_extension("")))
    }
}

// Appends rather than replaces so stems containing dots survive
fn with_suffix(stem: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(stem.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
