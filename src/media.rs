use serde::Serialize;
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use crate::error::MediaError;

/// A picked image file. Only metadata is read; the bytes stay on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSource {
    pub path: PathBuf,
    pub bytes: u64,
}

impl ImageSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MediaError> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|source| MediaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(MediaError::NotAFile(path.display().to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            bytes: metadata.len(),
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub source: ImageSource,
    pub preview_url: String,
}

/// Hands out displayable preview handles for images and takes them back.
pub trait PreviewProvider {
    fn create_preview(&mut self, source: &ImageSource) -> Result<String, MediaError>;
    fn release_preview(&mut self, preview_url: &str);
}

/// In-process handle registry in the style of browser object URLs.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    next_id: u64,
    live: BTreeSet<String>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, preview_url: &str) -> bool {
        self.live.contains(preview_url)
    }
}

impl PreviewProvider for PreviewRegistry {
    fn create_preview(&mut self, source: &ImageSource) -> Result<String, MediaError> {
        self.next_id += 1;
        let url = format!("blob:realty-desk/{}/{}", self.next_id, source.file_name());
        debug!(%url, "created preview");
        self.live.insert(url.clone());
        Ok(url)
    }

    fn release_preview(&mut self, preview_url: &str) {
        if !self.live.remove(preview_url) {
            warn!(preview_url, "released unknown preview handle");
        }
    }
}

const PROGRESS_STEP: u8 = 10;

/// Cosmetic upload indicator: climbs to 100 in fixed steps, one per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadProgress {
    percent: u8,
    active: bool,
}

impl UploadProgress {
    pub fn start() -> Self {
        Self {
            percent: 0,
            active: true,
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn tick(&mut self) -> u8 {
        if self.active {
            self.percent = (self.percent + PROGRESS_STEP).min(100);
            if self.percent == 100 {
                self.active = false;
            }
        }
        self.percent
    }

    pub fn cancel(&mut self) {
        self.active = false;
    }
}
