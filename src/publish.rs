// ABOUTME: Writes converted notes and resource copies into the site tree
// ABOUTME: Clean mode wipes posts and resources first; incremental only overwrites

use crate::convert::ConvertedNote;
use crate::{Error, Result};
use filetime::FileTime;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// Remove the posts and resources directories before writing.
    Clean,
    /// Overwrite only. Files of notes deleted remotely stay behind.
    Incremental,
}

pub struct Publisher {
    output_root: PathBuf,
    posts_dir: PathBuf,
    resources_dir: PathBuf,
    mode: PublishMode,
}

impl Publisher {
    pub fn new(
        output_root: impl Into<PathBuf>,
        posts_dir: &str,
        resources_dir: &str,
        mode: PublishMode,
    ) -> Self {
        let output_root = output_root.into();
        Publisher {
            posts_dir: output_root.join(posts_dir),
            resources_dir: output_root.join(resources_dir),
            output_root,
            mode,
        }
    }

    pub fn posts_dir(&self) -> &Path {
        &self.posts_dir
    }

    pub fn resources_dir(&self) -> &Path {
        &self.resources_dir
    }

    pub fn prepare(&self) -> Result<()> {
        if self.mode == PublishMode::Clean {
            for dir in [&self.posts_dir, &self.resources_dir] {
                match fs::remove_dir_all(dir) {
                    Ok(()) => info!(dir = %dir.display(), "cleaned output directory"),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        fs::create_dir_all(&self.posts_dir)?;
        fs::create_dir_all(&self.resources_dir)?;
        Ok(())
    }

    /// Write one converted note; returns the absolute path written.
    pub fn write(&self, note: &ConvertedNote) -> Result<PathBuf> {
        let content = note
            .render()
            .map_err(|e| Error::conversion(&note.guid, e))?;
        let path = self.output_root.join(&note.relative_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Mirror the resource cache into the published resources directory.
    ///
    /// Names are content-addressed, so in incremental mode a file whose size and
    /// mtime already match is left alone. Returns the number of files copied.
    pub fn copy_resources(&self, from: &Path) -> Result<usize> {
        fs::create_dir_all(&self.resources_dir)?;
        let entries = match fs::read_dir(from) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut copied = 0;
        for entry in entries {
            let entry = entry?;
            let source_meta = entry.metadata()?;
            if !source_meta.is_file() {
                continue;
            }

            let dest = self.resources_dir.join(entry.file_name());
            if self.mode == PublishMode::Incremental && is_current(&dest, &source_meta) {
                debug!(file = %dest.display(), "resource already published");
                continue;
            }

            fs::copy(entry.path(), &dest)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&dest, fs::Permissions::from_mode(0o644))?;
            }
            filetime::set_file_mtime(&dest, FileTime::from_last_modification_time(&source_meta))?;
            copied += 1;
        }
        Ok(copied)
    }
}

fn is_current(dest: &Path, source: &fs::Metadata) -> bool {
    match fs::metadata(dest) {
        Ok(meta) => {
            meta.len() == source.len()
                && FileTime::from_last_modification_time(&meta)
                    == FileTime::from_last_modification_time(source)
        }
        Err(_) => false,
    }
}
