// ABOUTME: Incremental notebook sync from the remote store into the local cache
// ABOUTME: Skips unchanged notes by sequence number and purges remotely deleted ones

use crate::{
    model::{NoteMetadata, NoteRecord, Notebook, SyncState},
    remote::NoteStore,
    storage::CacheStore,
    Error, Result,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

const PROGRESS_TEMPLATE: &str = "[{bar:40}] {pos}/{len} notes {msg}";

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub notebook_name: String,
    /// Minimum distance between two reconciliations of a changed account.
    pub throttle_window: Duration,
    pub max_notes: i32,
    pub page_size: i32,
    /// Skip the unchanged/throttle gate.
    pub force: bool,
    pub prune_resources: bool,
    pub show_progress: bool,
}

impl SyncOptions {
    pub fn new(notebook_name: impl Into<String>) -> Self {
        SyncOptions {
            notebook_name: notebook_name.into(),
            throttle_window: Duration::from_secs(15 * 60),
            max_notes: 1000,
            page_size: 250,
            force: false,
            prune_resources: true,
            show_progress: false,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncReport {
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    pub fetched_resources: Vec<String>,
    pub pruned_resources: Vec<String>,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.removed.is_empty() && self.pruned_resources.is_empty()
    }
}

#[derive(Debug, PartialEq)]
enum Gate {
    UpToDate,
    Throttled { retry_after: Duration },
    Proceed,
}

fn check_gate(previous: Option<&SyncState>, remote: &SyncState, options: &SyncOptions) -> Gate {
    let Some(previous) = previous else {
        return Gate::Proceed;
    };
    if options.force || !previous.complete {
        return Gate::Proceed;
    }
    if previous.update_count == remote.update_count {
        return Gate::UpToDate;
    }

    let elapsed = Duration::from_millis(remote.current_time.saturating_sub(previous.current_time).max(0) as u64);
    if elapsed < options.throttle_window {
        Gate::Throttled {
            retry_after: options.throttle_window - elapsed,
        }
    } else {
        Gate::Proceed
    }
}

/// Mirror one notebook into `cache`.
///
/// Fail-fast: the first error aborts the run. Entries already written stay
/// written, and a rerun picks up whatever is still out of date.
pub fn sync_notebook<S: NoteStore + ?Sized>(
    store: &S,
    cache: &CacheStore,
    options: &SyncOptions,
) -> Result<SyncReport> {
    cache.ensure_dirs()?;

    if !store.check_protocol_version()? {
        return Err(Error::ProtocolVersionMismatch);
    }

    let remote_state = store.get_sync_state()?;
    let previous = load_sync_state(cache)?;
    match check_gate(previous.as_ref(), &remote_state, options) {
        Gate::UpToDate => {
            info!(update_count = remote_state.update_count, "notebook is up to date");
            return Ok(SyncReport::default());
        }
        Gate::Throttled { retry_after } => {
            return Err(Error::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }
        Gate::Proceed => {}
    }

    cache.write_sync_state(&SyncState {
        complete: false,
        ..remote_state
    })?;

    let notebook = resolve_notebook(store, &options.notebook_name)?;
    let metadata = list_metadata(store, &notebook.guid, options)?;
    info!(notebook = %notebook.name, notes = metadata.len(), "listed remote notes");

    let mut stale: HashSet<String> = cache.list_notes()?.into_iter().collect();
    let mut report = SyncReport::default();

    let pb = if options.show_progress {
        ProgressBar::new(metadata.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );

    for meta in &metadata {
        let cached = load_cached(cache, &meta.guid)?;
        let unchanged = cached
            .as_ref()
            .is_some_and(|note| note.update_sequence_num == meta.update_sequence_num);

        if unchanged {
            debug!(guid = %meta.guid, usn = meta.update_sequence_num, "note unchanged");
        } else {
            debug!(guid = %meta.guid, title = ?meta.title, "fetching note");
            let mut note = store.get_note(&meta.guid)?;
            note.tag_names = store.get_note_tag_names(&meta.guid)?;
            let fetched = reconcile_resources(store, cache, cached.as_ref(), &mut note)?;
            cache.write_note(&note)?;
            report.fetched_resources.extend(fetched);
            report.updated.push(meta.guid.clone());
        }

        stale.remove(&meta.guid);
        pb.inc(1);
    }

    let mut stale: Vec<String> = stale.into_iter().collect();
    stale.sort();
    for guid in stale {
        if cache.delete_note(&guid)? {
            info!(guid = %guid, "removed note no longer in notebook");
            report.removed.push(guid);
        }
    }

    if options.prune_resources {
        report.pruned_resources = prune_resources(cache)?;
    }

    cache.write_sync_state(&SyncState {
        complete: true,
        ..remote_state
    })?;

    pb.finish_with_message(format!(
        "synced {} notes ({} new/updated, {} removed)",
        metadata.len(),
        report.updated.len(),
        report.removed.len()
    ));

    Ok(report)
}

/// Exact, case-sensitive match; the first notebook in remote order wins.
fn resolve_notebook<S: NoteStore + ?Sized>(store: &S, name: &str) -> Result<Notebook> {
    let mut matches = store
        .list_notebooks()?
        .into_iter()
        .filter(|notebook| notebook.name == name);

    let first = matches
        .next()
        .ok_or_else(|| Error::NotebookNotFound(name.to_string()))?;
    for duplicate in matches {
        warn!(
            name,
            used = %first.guid,
            ignored = %duplicate.guid,
            "several notebooks share this name, using the first"
        );
    }
    Ok(first)
}

/// Newest-first metadata for a notebook, paged up to `max_notes`.
fn list_metadata<S: NoteStore + ?Sized>(
    store: &S,
    notebook_guid: &str,
    options: &SyncOptions,
) -> Result<Vec<NoteMetadata>> {
    let page_size = options.page_size.max(1);
    let mut notes = Vec::new();

    while (notes.len() as i32) < options.max_notes {
        let offset = notes.len() as i32;
        let limit = page_size.min(options.max_notes - offset);
        let page = store.find_note_metadata(notebook_guid, false, offset, limit)?;
        let done = (page.len() as i32) < limit;
        notes.extend(page);
        if done {
            break;
        }
    }

    notes.truncate(options.max_notes.max(0) as usize);
    Ok(notes)
}

/// The stored snapshot only gates work, so an unreadable one counts as no snapshot.
fn load_sync_state(cache: &CacheStore) -> Result<Option<SyncState>> {
    match cache.read_sync_state() {
        Err(Error::CacheCorruption { path, source }) => {
            warn!(path = %path.display(), error = %source, "discarding corrupt sync state");
            Ok(None)
        }
        other => other,
    }
}

fn load_cached(cache: &CacheStore, guid: &str) -> Result<Option<NoteRecord>> {
    match cache.read_note(guid) {
        Err(Error::CacheCorruption { path, source }) => {
            warn!(path = %path.display(), error = %source, "discarding corrupt cache entry");
            Ok(None)
        }
        other => other,
    }
}

/// Download the resources of a freshly fetched note that are new or changed.
///
/// The note's resource list is updated in place with the content hash and file
/// name the remote reported for each downloaded body.
fn reconcile_resources<S: NoteStore + ?Sized>(
    store: &S,
    cache: &CacheStore,
    previous: Option<&NoteRecord>,
    note: &mut NoteRecord,
) -> Result<Vec<String>> {
    let known: HashMap<&str, i32> = previous
        .map(|prev| {
            prev.resources
                .iter()
                .map(|r| (r.guid.as_str(), r.update_sequence_num))
                .collect()
        })
        .unwrap_or_default();

    let mut written = Vec::new();
    for resource in &mut note.resources {
        let changed = known
            .get(resource.guid.as_str())
            .map_or(true, |usn| *usn != resource.update_sequence_num);
        let missing = resource
            .cache_file_name()
            .map_or(true, |name| !cache.has_resource(&name));
        if !changed && !missing {
            continue;
        }

        let binary = store.get_resource_binary(&resource.guid)?;
        resource.content_hash = binary.content_hash;
        resource.file_name = Some(binary.file_name);

        let name = resource
            .cache_file_name()
            .ok_or_else(|| Error::ResourceNotFound(resource.guid.clone()))?;
        cache.write_resource(&name, &binary.data)?;
        info!(guid = %resource.guid, file = %name, "wrote resource");
        written.push(name);
    }

    Ok(written)
}

/// Delete resource blobs no cached note refers to. Returns the deleted names.
fn prune_resources(cache: &CacheStore) -> Result<Vec<String>> {
    let mut referenced = HashSet::new();
    for guid in cache.list_notes()? {
        match cache.read_note(&guid) {
            Ok(Some(note)) => referenced.extend(note.resources.iter().filter_map(|r| r.cache_file_name())),
            Ok(None) => {}
            Err(Error::CacheCorruption { path, .. }) => {
                warn!(path = %path.display(), "skipping resource sweep, cache entry unreadable");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        }
    }

    let mut pruned = Vec::new();
    for name in cache.list_resources()? {
        if !referenced.contains(&name) && cache.delete_resource(&name)? {
            info!(file = %name, "pruned orphaned resource");
            pruned.push(name);
        }
    }
    Ok(pruned)
}

#[cfg(test)]
mod gate_tests {
    use super::*;

    fn state(update_count: i64, current_time: i64, complete: bool) -> SyncState {
        SyncState {
            update_count,
            current_time,
            complete,
        }
    }

    #[test]
    fn test_first_run_proceeds() {
        let options = SyncOptions::new("Blog");
        assert_eq!(check_gate(None, &state(5, 0, true), &options), Gate::Proceed);
    }

    #[test]
    fn test_unchanged_count_is_up_to_date() {
        let options = SyncOptions::new("Blog");
        let gate = check_gate(Some(&state(5, 0, true)), &state(5, 10_000_000, true), &options);
        assert_eq!(gate, Gate::UpToDate);
    }

    #[test]
    fn test_changed_within_window_is_throttled() {
        let options = SyncOptions::new("Blog");
        let gate = check_gate(Some(&state(5, 0, true)), &state(6, 60_000, true), &options);
        assert_eq!(
            gate,
            Gate::Throttled {
                retry_after: Duration::from_secs(14 * 60)
            }
        );
    }

    #[test]
    fn test_changed_after_window_proceeds() {
        let options = SyncOptions::new("Blog");
        let gate = check_gate(Some(&state(5, 0, true)), &state(6, 15 * 60_000, true), &options);
        assert_eq!(gate, Gate::Proceed);
    }

    #[test]
    fn test_interrupted_run_is_resumed() {
        let options = SyncOptions::new("Blog");
        let gate = check_gate(Some(&state(5, 0, false)), &state(5, 1, true), &options);
        assert_eq!(gate, Gate::Proceed);
    }

    #[test]
    fn test_force_skips_gate() {
        let mut options = SyncOptions::new("Blog");
        options.force = true;
        let gate = check_gate(Some(&state(5, 0, true)), &state(5, 1, true), &options);
        assert_eq!(gate, Gate::Proceed);
    }
}
