// ABOUTME: Converts cached ENML notes into Jekyll posts and pages
// ABOUTME: Runs the rewrite passes, derives front matter, and hands files to the publisher

pub mod document;
pub mod frontmatter;
pub mod passes;
pub mod resources;

use crate::error::ConvertError;
use crate::model::FrontMatter;
use crate::publish::Publisher;
use crate::storage::CacheStore;
use crate::{Error, NoteRecord, Result};
use chrono::{Local, TimeZone};
use document::Document;
use passes::{run_passes, PassContext};
use resources::ResourceIndex;
use std::fmt::Display;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Directory for posts, relative to the output root.
    pub posts_dir: String,
    /// URL path under which published resources are served.
    pub resource_url_prefix: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            posts_dir: "_posts".into(),
            resource_url_prefix: "/resources".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedNote {
    pub guid: String,
    pub front_matter: FrontMatter,
    pub body: String,
    /// Relative to the output root.
    pub relative_path: PathBuf,
}

impl ConvertedNote {
    /// Front matter block followed by the HTML body.
    pub fn render(&self) -> std::result::Result<String, ConvertError> {
        let yaml = serde_yaml::to_string(&self.front_matter)?;
        Ok(format!("---\n{}---\n\n{}\n", yaml, self.body))
    }
}

/// Transform an ENML body into HTML.
pub fn transform_body(
    enml: &str,
    ctx: &PassContext<'_>,
) -> std::result::Result<String, ConvertError> {
    let doc = run_passes(Document::parse(enml)?, ctx)?;
    Ok(doc.to_html())
}

pub fn convert_note(
    note: &NoteRecord,
    resources: &ResourceIndex,
    options: &ConvertOptions,
) -> Result<ConvertedNote> {
    convert_note_in(note, resources, options, &Local)
}

/// [`convert_note`] with dates rendered in an explicit time zone.
pub fn convert_note_in<Tz>(
    note: &NoteRecord,
    resources: &ResourceIndex,
    options: &ConvertOptions,
    tz: &Tz,
) -> Result<ConvertedNote>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let ctx = PassContext {
        resources,
        resource_url_prefix: &options.resource_url_prefix,
    };
    let body = transform_body(&note.content, &ctx).map_err(|e| Error::conversion(&note.guid, e))?;

    let created = frontmatter::created_at(note, tz);
    let front_matter = frontmatter::derive_front_matter(note, &created);
    let slug = frontmatter::note_slug(note).map_err(|e| Error::conversion(&note.guid, e))?;
    let relative_path =
        frontmatter::output_path(front_matter.layout, &slug, &created, &options.posts_dir);

    Ok(ConvertedNote {
        guid: note.guid.clone(),
        front_matter,
        body,
        relative_path,
    })
}

#[derive(Debug, Default)]
pub struct ConvertReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<String>,
    pub copied_resources: usize,
    /// Notes that produced no output, with the reason.
    pub failed: Vec<Error>,
}

/// Convert every cached note and publish the results.
///
/// A note that fails conversion is reported in [`ConvertReport::failed`] and
/// produces no file; the others are still written. I/O failures of the
/// publisher itself abort the run.
pub fn convert_all(
    cache: &CacheStore,
    publisher: &Publisher,
    options: &ConvertOptions,
) -> Result<ConvertReport> {
    publisher.prepare()?;

    let resources = ResourceIndex::from_file_names(cache.list_resources()?);
    if resources.is_empty() {
        info!("resource cache is empty, media references will stay unresolved");
    } else {
        debug!(resources = resources.len(), "indexed resource cache");
    }

    let mut report = ConvertReport::default();
    for guid in cache.list_notes()? {
        let note = match cache.read_note(&guid) {
            Ok(Some(note)) => note,
            Ok(None) => continue,
            Err(e @ Error::CacheCorruption { .. }) => {
                warn!(guid = %guid, error = %e, "skipping unreadable cache entry");
                report.failed.push(e);
                continue;
            }
            Err(e) => return Err(e),
        };

        if !note.active {
            debug!(guid = %guid, "skipping inactive note");
            report.skipped.push(guid);
            continue;
        }

        match convert_note(&note, &resources, options) {
            Ok(converted) => {
                let path = publisher.write(&converted)?;
                info!(guid = %guid, path = %path.display(), "wrote note");
                report.written.push(path);
            }
            Err(e) => {
                warn!(guid = %guid, error = %e, "note conversion failed");
                report.failed.push(e);
            }
        }
    }

    report.copied_resources = publisher.copy_resources(cache.resource_dir())?;
    Ok(report)
}
