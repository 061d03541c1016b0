// ABOUTME: Derives Jekyll front matter and output paths from a cached note
// ABOUTME: Special tags pick the layout and publish flag; the rest pass through

use crate::error::ConvertError;
use crate::model::{FrontMatter, Layout, NoteRecord};
use crate::util::{is_path_safe, slugify};
use chrono::{DateTime, TimeZone, Utc};
use std::fmt::Display;
use std::path::PathBuf;
use tracing::warn;

const PUBLISHED_TAG: &str = "published";
const PAGE_TAG: &str = "page";

/// Note creation time in `tz`. Out-of-range timestamps fall back to the epoch.
pub fn created_at<Tz: TimeZone>(note: &NoteRecord, tz: &Tz) -> DateTime<Tz> {
    DateTime::<Utc>::from_timestamp_millis(note.created)
        .unwrap_or_default()
        .with_timezone(tz)
}

pub fn derive_front_matter<Tz>(note: &NoteRecord, created: &DateTime<Tz>) -> FrontMatter
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut layout = Layout::Post;
    let mut published = false;
    let mut tags = Vec::with_capacity(note.tag_names.len());

    for tag in &note.tag_names {
        match tag.as_str() {
            PUBLISHED_TAG => published = true,
            PAGE_TAG => layout = Layout::Page,
            _ => tags.push(tag.clone()),
        }
    }

    FrontMatter {
        title: note.title.clone(),
        layout,
        published,
        date: created.format("%Y-%m-%d %H:%M:%S %z").to_string(),
        tags,
    }
}

/// Source URL attribute when set, otherwise the title. Slugs that cannot be a
/// file name fall back to a slugified form.
pub fn note_slug(note: &NoteRecord) -> Result<String, ConvertError> {
    let raw = note
        .attributes
        .source_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .unwrap_or(note.title.as_str());

    if is_path_safe(raw) {
        return Ok(raw.to_string());
    }

    let fallback = slugify(raw);
    if fallback.is_empty() {
        return Err(ConvertError::InvalidSlug(raw.to_string()));
    }
    warn!(guid = %note.guid, raw, slug = %fallback, "slug is not a valid file name, using slugified form");
    Ok(fallback)
}

/// Path of the published file relative to the output root.
pub fn output_path<Tz: TimeZone>(
    layout: Layout,
    slug: &str,
    created: &DateTime<Tz>,
    posts_dir: &str,
) -> PathBuf
where
    Tz::Offset: Display,
{
    match layout {
        Layout::Page => PathBuf::from(format!("{}.html", slug)),
        Layout::Post => PathBuf::from(posts_dir).join(format!(
            "{}-{}.html",
            created.format("%Y-%m-%d"),
            slug
        )),
    }
}
