/// Local media objects served to renderers

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Media class of a library object, encoded in its identifier prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
    Image,
}

impl MediaKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            MediaKind::Audio => "a",
            MediaKind::Video => "v",
            MediaKind::Image => "i",
        }
    }

    /// Classify a file extension, returning the kind and its MIME type
    pub fn from_extension(ext: &str) -> Option<(MediaKind, &'static str)> {
        let kind = match ext.to_ascii_lowercase().as_str() {
            "mp3" => (MediaKind::Audio, "audio/mpeg"),
            "flac" => (MediaKind::Audio, "audio/flac"),
            "ogg" | "oga" => (MediaKind::Audio, "audio/ogg"),
            "wav" => (MediaKind::Audio, "audio/wav"),
            "m4a" => (MediaKind::Audio, "audio/mp4"),
            "aac" => (MediaKind::Audio, "audio/aac"),
            "mp4" | "m4v" => (MediaKind::Video, "video/mp4"),
            "mkv" => (MediaKind::Video, "video/x-matroska"),
            "avi" => (MediaKind::Video, "video/x-msvideo"),
            "webm" => (MediaKind::Video, "video/webm"),
            "jpg" | "jpeg" => (MediaKind::Image, "image/jpeg"),
            "png" => (MediaKind::Image, "image/png"),
            "gif" => (MediaKind::Image, "image/gif"),
            "webp" => (MediaKind::Image, "image/webp"),
            _ => return None,
        };
        Some(kind)
    }
}

/// A file the responder can serve
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaObject {
    pub id: String,
    pub kind: MediaKind,
    pub mime: String,
    #[serde(skip)]
    pub path: PathBuf,
}

impl MediaObject {
    /// Path under `/media` a renderer requests this object by
    pub fn url_path(&self) -> String {
        match self.path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("/media/{}.{}", self.id, ext),
            None => format!("/media/{}", self.id),
        }
    }
}

/// Identifier to file mapping, numbered per kind in insertion order
#[derive(Debug, Default)]
pub struct MediaLibrary {
    objects: BTreeMap<String, MediaObject>,
    next_index: [u32; 3],
}

impl MediaLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a library from every recognised file below `root`
    pub fn scan(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let mut library = Self::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries: Vec<(PathBuf, std::fs::FileType)> = std::fs::read_dir(&dir)
                .with_context(|| format!("Failed to read media directory {}", dir.display()))?
                .filter_map(|entry| match entry.and_then(|e| Ok((e.path(), e.file_type()?))) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                        None
                    }
                })
                .collect();
            // Stable identifiers across restarts
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            for (path, file_type) in entries {
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_symlink() && path.is_dir() {
                    // Directory links may point back into the tree
                    debug!("Not following directory link {}", path.display());
                } else if library.add(&path).is_none() {
                    debug!("Ignoring non-media file {}", path.display());
                }
            }
        }

        info!("Media library: {} object(s) under {}", library.len(), root.display());
        Ok(library)
    }

    /// Register a file, returning its identifier. Unrecognised files are skipped.
    pub fn add(&mut self, path: impl Into<PathBuf>) -> Option<String> {
        let path = path.into();
        let ext = path.extension()?.to_str()?;
        let (kind, mime) = MediaKind::from_extension(ext)?;

        let slot = match kind {
            MediaKind::Audio => 0,
            MediaKind::Video => 1,
            MediaKind::Image => 2,
        };
        let id = format!("{}-{}", kind.prefix(), self.next_index[slot]);
        self.next_index[slot] += 1;

        self.objects.insert(
            id.clone(),
            MediaObject {
                id: id.clone(),
                kind,
                mime: mime.to_string(),
                path,
            },
        );
        Some(id)
    }

    /// Look up a request path such as `a-12.mp3` or `/a-12`
    pub fn resolve(&self, request: &str) -> Option<&MediaObject> {
        let name = request.trim_start_matches('/');
        let id = match name.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => name,
        };
        self.objects.get(id)
    }

    pub fn get(&self, id: &str) -> Option<&MediaObject> {
        self.objects.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaObject> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
