// ABOUTME: On-disk note and resource cache with atomic writes
// ABOUTME: Notes are keyed by GUID, resources by content-addressed file name

use crate::model::{NoteRecord, SyncState};
use crate::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const NOTE_EXT: &str = "json";

pub struct Paths {
    pub cache_dir: PathBuf,
    pub notes_dir: PathBuf,
    pub resources_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub sync_state_file: PathBuf,
}

impl Paths {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        Paths {
            notes_dir: cache_dir.join("notes"),
            resources_dir: cache_dir.join("resources"),
            tmp_dir: cache_dir.join("tmp"),
            sync_state_file: cache_dir.join("sync_state.json"),
            cache_dir,
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in &[&self.notes_dir, &self.resources_dir, &self.tmp_dir] {
            fs::create_dir_all(dir)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = fs::Permissions::from_mode(0o700);
                fs::set_permissions(dir, perms)?;
            }
        }
        Ok(())
    }
}

pub fn write_atomic(path: &Path, content: &[u8], tmp_dir: &Path) -> Result<()> {
    use rand::Rng;

    let random: u32 = rand::thread_rng().gen();
    let tmp_path = tmp_dir.join(format!("{:x}.part", random));

    fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(&tmp_path, perms)?;
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(&tmp_path, path)?;

    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn list_files(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Durable cache of note records and resource blobs.
///
/// Only one process may mutate a cache root at a time; nothing here locks.
pub struct CacheStore {
    paths: Paths,
}

impl CacheStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        CacheStore {
            paths: Paths::new(cache_dir),
        }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        self.paths.ensure_dirs()
    }

    fn note_path(&self, guid: &str) -> PathBuf {
        self.paths.notes_dir.join(format!("{}.{}", guid, NOTE_EXT))
    }

    /// Load a cached note; `Ok(None)` when no entry exists for `guid`.
    pub fn read_note(&self, guid: &str) -> Result<Option<NoteRecord>> {
        let path = self.note_path(guid);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| Error::CacheCorruption { path, source })
    }

    pub fn write_note(&self, note: &NoteRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(note)?;
        write_atomic(&self.note_path(&note.guid), &json, &self.paths.tmp_dir)
    }

    /// GUIDs of every cached note, sorted.
    pub fn list_notes(&self) -> Result<Vec<String>> {
        let suffix = format!(".{}", NOTE_EXT);
        Ok(list_files(&self.paths.notes_dir)?
            .into_iter()
            .filter_map(|name| name.strip_suffix(&suffix).map(str::to_string))
            .collect())
    }

    pub fn delete_note(&self, guid: &str) -> Result<bool> {
        remove_if_exists(&self.note_path(guid))
    }

    pub fn resource_dir(&self) -> &Path {
        &self.paths.resources_dir
    }

    pub fn has_resource(&self, name: &str) -> bool {
        self.paths.resources_dir.join(name).is_file()
    }

    pub fn read_resource(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.paths.resources_dir.join(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store a resource blob. Names are content-addressed, so overwriting is harmless.
    pub fn write_resource(&self, name: &str, data: &[u8]) -> Result<()> {
        write_atomic(&self.paths.resources_dir.join(name), data, &self.paths.tmp_dir)
    }

    pub fn list_resources(&self) -> Result<Vec<String>> {
        list_files(&self.paths.resources_dir)
    }

    pub fn delete_resource(&self, name: &str) -> Result<bool> {
        remove_if_exists(&self.paths.resources_dir.join(name))
    }

    pub fn read_sync_state(&self) -> Result<Option<SyncState>> {
        let path = &self.paths.sync_state_file;
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| Error::CacheCorruption {
                path: path.clone(),
                source,
            })
    }

    pub fn write_sync_state(&self, state: &SyncState) -> Result<()> {
        let json = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.paths.sync_state_file, &json, &self.paths.tmp_dir)
    }
}

#[cfg(test)]
pub(crate) fn sample_note(guid: &str, usn: i32) -> NoteRecord {
    NoteRecord {
        guid: guid.into(),
        title: format!("Note {}", guid),
        content: "<en-note><div>hello</div></en-note>".into(),
        content_hash: vec![0x12, 0x34],
        update_sequence_num: usn,
        created: 1_700_000_000_000,
        updated: 1_700_000_000_000,
        deleted: None,
        active: true,
        notebook_guid: "nb".into(),
        tag_names: vec![],
        attributes: Default::default(),
        resources: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_layout() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::new(temp.path());
        assert_eq!(paths.cache_dir, temp.path());
        assert_eq!(paths.notes_dir, temp.path().join("notes"));
        assert_eq!(paths.resources_dir, temp.path().join("resources"));
    }

    #[test]
    #[cfg(unix)]
    fn test_ensure_dirs_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let paths = Paths::new(temp.path());
        paths.ensure_dirs().unwrap();

        let perms = fs::metadata(&paths.notes_dir).unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o700);
    }

    #[test]
    fn test_write_atomic_creates_file() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::new(temp.path());
        paths.ensure_dirs().unwrap();

        let target = temp.path().join("nested").join("test.txt");
        write_atomic(&target, b"hello", &paths.tmp_dir).unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
        assert_eq!(fs::read_dir(&paths.tmp_dir).unwrap().count(), 0);
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, CacheStore) {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path());
        store.ensure_dirs().unwrap();
        (temp, store)
    }

    #[test]
    fn test_note_roundtrip_and_overwrite() {
        let (_temp, store) = store();
        assert!(store.read_note("n1").unwrap().is_none());

        store.write_note(&sample_note("n1", 1)).unwrap();
        store.write_note(&sample_note("n1", 2)).unwrap();

        let cached = store.read_note("n1").unwrap().unwrap();
        assert_eq!(cached.update_sequence_num, 2);
        assert_eq!(cached.content_hash, vec![0x12, 0x34]);
    }

    #[test]
    fn test_list_and_delete_notes() {
        let (_temp, store) = store();
        store.write_note(&sample_note("b", 1)).unwrap();
        store.write_note(&sample_note("a", 1)).unwrap();
        fs::write(store.paths().notes_dir.join("stray.txt"), "x").unwrap();

        assert_eq!(store.list_notes().unwrap(), vec!["a", "b"]);
        assert!(store.delete_note("a").unwrap());
        assert!(!store.delete_note("a").unwrap());
        assert_eq!(store.list_notes().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_corrupt_note_is_reported() {
        let (_temp, store) = store();
        fs::write(store.paths().notes_dir.join("bad.json"), "{not json").unwrap();

        match store.read_note("bad") {
            Err(Error::CacheCorruption { path, .. }) => assert!(path.ends_with("bad.json")),
            other => panic!("expected corruption error, got {:?}", other),
        }
    }

    #[test]
    fn test_resources() {
        let (_temp, store) = store();
        assert!(!store.has_resource("ab-x.png"));
        store.write_resource("ab-x.png", b"png").unwrap();
        store.write_resource("ab-x.png", b"png").unwrap();

        assert!(store.has_resource("ab-x.png"));
        assert_eq!(store.read_resource("ab-x.png").unwrap().unwrap(), b"png");
        assert_eq!(store.list_resources().unwrap(), vec!["ab-x.png"]);
        assert!(store.delete_resource("ab-x.png").unwrap());
        assert!(store.read_resource("ab-x.png").unwrap().is_none());
    }

    #[test]
    fn test_sync_state_roundtrip() {
        let (_temp, store) = store();
        assert!(store.read_sync_state().unwrap().is_none());

        let state = SyncState {
            update_count: 10,
            current_time: 1_000,
            complete: false,
        };
        store.write_sync_state(&state).unwrap();
        assert_eq!(store.read_sync_state().unwrap(), Some(state));
    }

    #[test]
    fn test_listing_missing_dirs_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path().join("never-created"));
        assert!(store.list_notes().unwrap().is_empty());
        assert!(store.list_resources().unwrap().is_empty());
    }
}
