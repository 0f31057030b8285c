//! Key-addressed filesystem storage for image variants.
//!
//! Variants live under `{base_dir}/{image_id}/{level}.{ext}` where the
//! extension is derived from the payload's sniffed content type at write
//! time. Lookups match on the file stem only, since the extension is not
//! known at read time.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::codec;
use crate::error::{Error, Result};

/// The fixed quality levels at which image variants are stored, as
/// percentages of the original linear dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityLevel {
    /// Verbatim original bytes.
    Full,
    /// 75% of the original dimensions.
    Q75,
    /// 50% of the original dimensions.
    Q50,
    /// 25% of the original dimensions.
    Q25,
}

impl QualityLevel {
    /// All levels, original first.
    pub fn all() -> &'static [QualityLevel] {
        &[Self::Full, Self::Q75, Self::Q50, Self::Q25]
    }

    /// The levels derived by resizing the decoded original.
    pub fn derived() -> &'static [QualityLevel] {
        &[Self::Q75, Self::Q50, Self::Q25]
    }

    /// The storage key for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "100",
            Self::Q75 => "75",
            Self::Q50 => "50",
            Self::Q25 => "25",
        }
    }

    /// The percentage of the original dimensions this level represents.
    pub fn percent(&self) -> u32 {
        match self {
            Self::Full => 100,
            Self::Q75 => 75,
            Self::Q50 => 50,
            Self::Q25 => 25,
        }
    }

    /// Parse a quality query value. Only the closed set is accepted.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "100" => Some(Self::Full),
            "75" => Some(Self::Q75),
            "50" => Some(Self::Q50),
            "25" => Some(Self::Q25),
            _ => None,
        }
    }
}

impl std::fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filesystem store addressed by `(image_id, level)`.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a new `FileStore`, creating the base directory if absent.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Directory holding all variants of one image.
    fn image_dir(&self, image_id: &str) -> PathBuf {
        self.base_dir.join(image_id)
    }

    /// Write one variant, creating the image's directory if needed.
    ///
    /// Each writer gets its own uniquely-named temporary sibling which is
    /// moved into place with an atomic rename, so concurrent writers to the
    /// same key cannot interleave partial content; the last rename wins.
    /// Calling twice with the same key overwrites.
    pub fn create_image(&self, data: &[u8], image_id: &str, level: &str) -> Result<()> {
        let dir = self.image_dir(image_id);
        fs::create_dir_all(&dir)?;

        let ext = codec::extension_for(codec::sniff_content_type(data)).unwrap_or("bin");
        let path = dir.join(format!("{level}.{ext}"));

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(data)?;
        tmp.persist(&path).map_err(|e| Error::from(e.error))?;
        Ok(())
    }

    /// Read one variant back, matching on the file stem regardless of
    /// extension.
    pub fn get_image(&self, image_id: &str, level: &str) -> Result<Vec<u8>> {
        let path = self
            .find_by_stem(image_id, level)?
            .ok_or_else(|| Error::not_found(image_id, level))?;
        Ok(fs::read(path)?)
    }

    /// Whether a variant already exists for the given key.
    pub fn exists(&self, image_id: &str, level: &str) -> bool {
        matches!(self.find_by_stem(image_id, level), Ok(Some(_)))
    }

    fn find_by_stem(&self, image_id: &str, level: &str) -> Result<Option<PathBuf>> {
        let dir = self.image_dir(image_id);
        if !dir.is_dir() {
            return Ok(None);
        }
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.file_stem().and_then(|s| s.to_str()) == Some(level) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// The base directory this store writes under.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}
