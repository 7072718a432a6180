//! Loading of referenced schema and linkbase documents.
//!
//! Loaders never panic on a missing document; they return
//! [`Error::NotFound`] and the caller decides whether the absence matters.

use crate::xml::XmlDocument;
use crate::{Error, Result};
use ahash::AHashMap;
use std::path::{Path, PathBuf};
use url::Url;

pub trait DocumentLoader: Send + Sync {
    /// Loads the document at an already resolved location.
    fn load(&self, location: &str) -> Result<XmlDocument>;
}

/// Parses `location` as an absolute URL. One-letter schemes are drive
/// letters of Windows paths, not URLs.
fn as_url(location: &str) -> Option<Url> {
    Url::parse(location).ok().filter(|url| url.scheme().len() > 1)
}

/// Resolves `href` relative to the document at `base`.
///
/// URL bases are joined per RFC 3986. File system bases are joined through a
/// `file:` URL so percent escapes and dot segments resolve the same way; a
/// relative base is anchored at a placeholder root and comes back relative.
pub fn resolve_location(base: Option<&str>, href: &str) -> String {
    let href = href.trim();
    if let Some(url) = as_url(href) {
        return url.into();
    }
    let base = base.map(str::trim).unwrap_or("");
    match as_url(base) {
        Some(base_url) => base_url
            .join(href)
            .map(String::from)
            .unwrap_or_else(|_| href.to_string()),
        None => resolve_file(base, href),
    }
}

fn resolve_file(base: &str, href: &str) -> String {
    let base_path = Path::new(base);
    let relative = !base_path.has_root() && !Path::new(href).has_root();
    let anchored = if base_path.has_root() {
        base_path.to_path_buf()
    } else {
        Path::new("/").join(base_path)
    };

    let Some(resolved) = Url::from_file_path(&anchored)
        .ok()
        .and_then(|url| url.join(href).ok())
    else {
        return href.to_string();
    };
    match resolved.to_file_path() {
        Ok(path) if relative => path.to_string_lossy().trim_start_matches('/').to_string(),
        Ok(path) => path.to_string_lossy().into_owned(),
        // file URL with a remote host
        Err(()) => resolved.into(),
    }
}

/// Reads documents from the local file system.
///
/// Remote `http(s)` locations are served from `schema_dir` by file name when
/// one is configured; there is no network access.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    schema_dir: Option<PathBuf>,
}

impl FileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.schema_dir = Some(dir.into());
        self
    }

    fn local_path(&self, location: &str) -> Option<PathBuf> {
        let Some(url) = as_url(location) else {
            return Some(PathBuf::from(location));
        };
        match url.scheme() {
            "file" => url.to_file_path().ok(),
            "http" | "https" => {
                let dir = self.schema_dir.as_ref()?;
                let file_name = url.path_segments()?.last().filter(|n| !n.is_empty())?;
                Some(dir.join(file_name))
            }
            _ => None,
        }
    }
}

impl DocumentLoader for FileLoader {
    fn load(&self, location: &str) -> Result<XmlDocument> {
        let path = self
            .local_path(location)
            .filter(|p| p.is_file())
            .ok_or_else(|| Error::NotFound(location.to_string()))?;
        let content = read_file(&path)?;
        XmlDocument::parse(&content, Some(location))
    }
}

#[cfg(feature = "mmap")]
pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>> {
    let file = std::fs::File::open(path)?;
    // SAFETY: the mapping is copied out before the file handle is dropped
    let map = unsafe { memmap2::Mmap::map(&file)? };
    Ok(map.to_vec())
}

#[cfg(not(feature = "mmap"))]
pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>> {
    Ok(std::fs::read(path)?)
}

/// Serves documents from memory, keyed by location.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    documents: AHashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, location: &str, text: &str) -> Self {
        self.insert(location, text);
        self
    }

    pub fn insert(&mut self, location: &str, text: &str) {
        self.documents
            .insert(resolve_location(None, location), text.to_string());
    }
}

impl DocumentLoader for MemoryLoader {
    fn load(&self, location: &str) -> Result<XmlDocument> {
        let text = self
            .documents
            .get(&resolve_location(None, location))
            .ok_or_else(|| Error::NotFound(location.to_string()))?;
        XmlDocument::parse_str(text, Some(location))
    }
}
