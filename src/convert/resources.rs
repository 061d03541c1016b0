// ABOUTME: Hash to file-name lookup over the resource cache
// ABOUTME: Classifies resources by extension into image, audio, video, or link

use std::collections::HashMap;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "svg", "webp"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "aac", "flac"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "m4v", "ogv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    Link,
}

impl MediaKind {
    pub fn from_file_name(name: &str) -> Self {
        let ext = match name.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => return MediaKind::Link,
        };
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Image
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Audio
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else {
            MediaKind::Link
        }
    }
}

/// Built once per conversion run from the resource cache listing.
#[derive(Debug, Default, Clone)]
pub struct ResourceIndex {
    by_hash: HashMap<String, String>,
}

impl ResourceIndex {
    /// Index `hex(hash)-name` file names by their hash prefix. On a duplicate
    /// hash the first name in iteration order is kept.
    pub fn from_file_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut by_hash = HashMap::new();
        for name in names {
            let name = name.into();
            if let Some((hash, _)) = name.split_once('-') {
                by_hash
                    .entry(hash.to_ascii_lowercase())
                    .or_insert_with(|| name.clone());
            }
        }
        ResourceIndex { by_hash }
    }

    pub fn lookup(&self, hash: &str) -> Option<&str> {
        self.by_hash
            .get(&hash.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

/// The declared name part of a content-addressed file name.
pub fn display_name(file_name: &str) -> &str {
    file_name
        .split_once('-')
        .map_or(file_name, |(_, name)| name)
}
