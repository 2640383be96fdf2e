//! Recently saved memes, most recent first.

use core::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::model::MemeState;

/// Maximum number of snapshots a gallery keeps.
pub const GALLERY_CAPACITY: usize = 20;

/// Gallery persistence failure.
#[derive(Debug)]
pub enum GalleryError {
    Io(io::Error),
    Encode(serde_json::Error),
}

impl fmt::Display for GalleryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "gallery io failed: {}", err),
            Self::Encode(err) => write!(f, "gallery encode failed: {}", err),
        }
    }
}

impl std::error::Error for GalleryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Encode(err) => Some(err),
        }
    }
}

impl From<io::Error> for GalleryError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for GalleryError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// Store of full meme snapshots.
pub trait GalleryStore {
    /// Save a snapshot at the front. States without an image are ignored and
    /// reported as `Ok(false)`.
    fn save(&mut self, state: &MemeState) -> Result<bool, GalleryError>;

    /// Snapshots, most recent first.
    fn list(&self) -> Vec<MemeState>;

    /// Remove every snapshot.
    fn clear(&mut self) -> Result<(), GalleryError>;
}

/// In-memory gallery.
#[derive(Clone, Debug, PartialEq)]
pub struct MemoryGallery {
    entries: Vec<MemeState>,
    capacity: usize,
}

impl Default for MemoryGallery {
    fn default() -> Self {
        Self::with_capacity(GALLERY_CAPACITY)
    }
}

impl MemoryGallery {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    fn push_front(&mut self, state: &MemeState) -> bool {
        if state.image.is_none() {
            return false;
        }
        self.entries.insert(0, state.clone());
        self.entries.truncate(self.capacity);
        true
    }
}

impl GalleryStore for MemoryGallery {
    fn save(&mut self, state: &MemeState) -> Result<bool, GalleryError> {
        Ok(self.push_front(state))
    }

    fn list(&self) -> Vec<MemeState> {
        self.entries.clone()
    }

    fn clear(&mut self) -> Result<(), GalleryError> {
        self.entries.clear();
        Ok(())
    }
}

/// Gallery persisted as a JSON array in a single file.
#[derive(Clone, Debug)]
pub struct FileGallery {
    path: PathBuf,
    memory: MemoryGallery,
}

impl FileGallery {
    /// Open the gallery at `path`.
    ///
    /// A missing file starts empty. An unreadable or corrupt file also starts
    /// empty and is overwritten on the next save.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut memory = MemoryGallery::default();
        match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<MemeState>>(&bytes) {
                Ok(mut entries) => {
                    entries.truncate(memory.capacity);
                    memory.entries = entries;
                }
                Err(err) => {
                    log::warn!("failed to load gallery {}: {}", path.display(), err);
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                log::warn!("failed to read gallery {}: {}", path.display(), err);
            }
        }
        Self { path, memory }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), GalleryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec(&self.memory.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl GalleryStore for FileGallery {
    fn save(&mut self, state: &MemeState) -> Result<bool, GalleryError> {
        if !self.memory.push_front(state) {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn list(&self) -> Vec<MemeState> {
        self.memory.list()
    }

    fn clear(&mut self) -> Result<(), GalleryError> {
        self.memory.entries.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_gallery_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("meme-canvas-gallery-{}-{}", name, std::process::id()))
            .join("gallery.json")
    }

    fn snapshot(n: usize) -> MemeState {
        let mut state = MemeState::with_image(format!("img-{}.png", n));
        state.top_text = format!("TOP {}", n);
        state
    }

    #[test]
    fn memory_gallery_lists_most_recent_first_and_caps() {
        let mut gallery = MemoryGallery::default();
        for n in 0..25 {
            assert!(gallery.save(&snapshot(n)).expect("save"));
        }
        let list = gallery.list();
        assert_eq!(list.len(), GALLERY_CAPACITY);
        assert_eq!(list[0].top_text, "TOP 24");
        assert_eq!(list[GALLERY_CAPACITY - 1].top_text, "TOP 5");
    }

    #[test]
    fn states_without_image_are_not_saved() {
        let mut gallery = MemoryGallery::default();
        assert!(!gallery.save(&MemeState::default()).expect("save"));
        assert!(gallery.list().is_empty());
    }

    #[test]
    fn file_gallery_persists_across_reopen() {
        let path = temp_gallery_path("persist");
        let _ = fs::remove_file(&path);
        {
            let mut gallery = FileGallery::open(&path);
            gallery.save(&snapshot(1)).expect("save 1");
            gallery.save(&snapshot(2)).expect("save 2");
        }
        let reopened = FileGallery::open(&path);
        let list = reopened.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].top_text, "TOP 2");

        let mut reopened = reopened;
        reopened.clear().expect("clear");
        assert!(!path.exists());
        assert!(FileGallery::open(&path).list().is_empty());
    }

    #[test]
    fn corrupt_gallery_file_starts_empty() {
        let path = temp_gallery_path("corrupt");
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, b"{{{ nope").expect("write corrupt");
        let mut gallery = FileGallery::open(&path);
        assert!(gallery.list().is_empty());
        gallery.save(&snapshot(7)).expect("save over corrupt file");
        assert_eq!(FileGallery::open(&path).list().len(), 1);
        let _ = gallery.clear();
    }
}
