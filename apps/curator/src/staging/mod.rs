//! Staging area: in-progress and completed submissions waiting for promotion.
//!
//! Each submission is a group of files sharing one base identifier:
//!
//! ```text
//! {base}.jpg        image
//! {base}.txt        prompt
//! {base}_title.txt  title marker (its presence means the group is complete)
//! ```
//!
//! The ingestion side writes these, the promoter reads and removes them. The
//! naming convention is the contract between the two.

pub mod naming;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::errors::AppError;
use crate::store::write_file_atomic;

const IMAGE_SUFFIX: &str = ".jpg";
const PROMPT_SUFFIX: &str = ".txt";
const TITLE_SUFFIX: &str = "_title.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Image,
    Prompt,
    Title,
}

impl ArtifactKind {
    pub fn file_name(self, base: &str) -> String {
        match self {
            ArtifactKind::Image => format!("{base}{IMAGE_SUFFIX}"),
            ArtifactKind::Prompt => format!("{base}{PROMPT_SUFFIX}"),
            ArtifactKind::Title => format!("{base}{TITLE_SUFFIX}"),
        }
    }

    /// Splits a staged file name into its base and kind.
    /// Hidden files (in-flight temp files) and unknown extensions yield `None`.
    pub fn parse(file_name: &str) -> Option<(&str, ArtifactKind)> {
        if file_name.starts_with('.') {
            return None;
        }
        // Title before prompt: both end in ".txt"
        let (base, kind) = if let Some(base) = file_name.strip_suffix(TITLE_SUFFIX) {
            (base, ArtifactKind::Title)
        } else if let Some(base) = file_name.strip_suffix(PROMPT_SUFFIX) {
            (base, ArtifactKind::Prompt)
        } else if let Some(base) = file_name.strip_suffix(IMAGE_SUFFIX) {
            (base, ArtifactKind::Image)
        } else {
            return None;
        };
        (!base.is_empty()).then_some((base, kind))
    }
}

/// A staged group as reconstructed from a directory scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedItem {
    Incomplete { has_image: bool, has_prompt: bool },
    Complete { title: String },
}

#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, base: &str, kind: ArtifactKind) -> PathBuf {
        self.dir.join(kind.file_name(base))
    }

    pub fn has(&self, base: &str, kind: ArtifactKind) -> bool {
        self.path(base, kind).is_file()
    }

    /// Whether any artifact with this base exists.
    pub fn has_stem(&self, base: &str) -> bool {
        [ArtifactKind::Image, ArtifactKind::Prompt, ArtifactKind::Title]
            .into_iter()
            .any(|kind| self.has(base, kind))
    }

    pub fn write(
        &self,
        base: &str,
        kind: ArtifactKind,
        content: &[u8],
    ) -> Result<PathBuf, AppError> {
        let path = self.path(base, kind);
        write_file_atomic(&path, content)?;
        Ok(path)
    }

    /// Removes one artifact. Already-absent files are fine.
    pub fn remove(&self, base: &str, kind: ArtifactKind) -> Result<(), AppError> {
        let path = self.path(base, kind);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::storage(&path)(e)),
        }
    }

    pub fn read_text(&self, base: &str, kind: ArtifactKind) -> Result<String, AppError> {
        let path = self.path(base, kind);
        fs::read_to_string(&path).map_err(AppError::storage(&path))
    }

    /// Groups every staged file by base. A missing staging directory is empty.
    pub fn scan(&self) -> Result<BTreeMap<String, StagedItem>, AppError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(AppError::storage(&self.dir)(e)),
        };

        let mut groups: BTreeMap<String, (bool, bool, bool)> = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(AppError::storage(&self.dir))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name();
            let Some((base, kind)) = name.to_str().and_then(ArtifactKind::parse) else {
                continue;
            };
            let flags = groups.entry(base.to_string()).or_default();
            match kind {
                ArtifactKind::Image => flags.0 = true,
                ArtifactKind::Prompt => flags.1 = true,
                ArtifactKind::Title => flags.2 = true,
            }
        }

        let mut items = BTreeMap::new();
        for (base, (has_image, has_prompt, has_title)) in groups {
            let item = if has_title {
                StagedItem::Complete {
                    title: self.read_text(&base, ArtifactKind::Title)?.trim().to_string(),
                }
            } else {
                StagedItem::Incomplete {
                    has_image,
                    has_prompt,
                }
            };
            items.insert(base, item);
        }
        Ok(items)
    }
}

/// Permanent image and prompt stores that promoted artifacts move into.
#[derive(Debug, Clone)]
pub struct PermanentStores {
    pub image_dir: PathBuf,
    pub prompt_dir: PathBuf,
    image_subdir: String,
    prompt_subdir: String,
}

impl PermanentStores {
    pub fn new(
        image_dir: impl Into<PathBuf>,
        prompt_dir: impl Into<PathBuf>,
        image_subdir: &str,
        prompt_subdir: &str,
    ) -> Self {
        Self {
            image_dir: image_dir.into(),
            prompt_dir: prompt_dir.into(),
            image_subdir: image_subdir.trim_end_matches('/').to_string(),
            prompt_subdir: prompt_subdir.trim_end_matches('/').to_string(),
        }
    }

    pub fn image_path(&self, base: &str) -> PathBuf {
        self.image_dir.join(ArtifactKind::Image.file_name(base))
    }

    pub fn prompt_path(&self, base: &str) -> PathBuf {
        self.prompt_dir.join(ArtifactKind::Prompt.file_name(base))
    }

    /// Catalog-facing relative path of a promoted image.
    pub fn image_ref(&self, base: &str) -> String {
        format!("{}/{}", self.image_subdir, ArtifactKind::Image.file_name(base))
    }

    pub fn prompt_ref(&self, base: &str) -> String {
        format!("{}/{}", self.prompt_subdir, ArtifactKind::Prompt.file_name(base))
    }

    pub fn has_stem(&self, base: &str) -> bool {
        self.image_path(base).exists() || self.prompt_path(base).exists()
    }
}
