// ABOUTME: Serde data models for notes, resources, and sync state
// ABOUTME: Shared by the remote client, the on-disk cache, and the converter

use serde::{Deserialize, Serialize};

/// A note as the remote store returns it and as the cache persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub guid: String,
    #[serde(default)]
    pub title: String,
    /// Raw ENML body.
    #[serde(default)]
    pub content: String,
    #[serde(default, with = "hex_bytes")]
    pub content_hash: Vec<u8>,
    pub update_sequence_num: i32,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub updated: i64,
    #[serde(default)]
    pub deleted: Option<i64>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub notebook_guid: String,
    #[serde(default)]
    pub tag_names: Vec<String>,
    #[serde(default)]
    pub attributes: NoteAttributes,
    #[serde(default)]
    pub resources: Vec<ResourceRef>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteAttributes {
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub guid: String,
    #[serde(with = "hex_bytes")]
    pub content_hash: Vec<u8>,
    pub update_sequence_num: i32,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl ResourceRef {
    /// Name of this resource inside the resource cache, if the file name is known.
    pub fn cache_file_name(&self) -> Option<String> {
        self.file_name
            .as_deref()
            .map(|name| resource_file_name(&self.content_hash, name, &self.guid))
    }
}

/// Content-addressed resource file name: `hex(hash)-name`.
///
/// Path separators in the declared name are replaced so the result always stays
/// inside the resource directory; an empty name falls back to the resource GUID.
pub fn resource_file_name(content_hash: &[u8], declared: &str, guid: &str) -> String {
    let name: String = declared
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    let name = if name.is_empty() { guid } else { name.as_str() };
    format!("{}-{}", hex::encode(content_hash), name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub guid: String,
    pub name: String,
}

/// One row of a notebook listing; carries just enough to decide whether to refetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteMetadata {
    pub guid: String,
    pub update_sequence_num: i32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub updated: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceBinary {
    #[serde(with = "hex_bytes")]
    pub content_hash: Vec<u8>,
    #[serde(default)]
    pub file_name: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// Remote account-wide sync counters, persisted after each reconciliation.
///
/// The state file uses camelCase keys; the gateway's snake_case form is accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    #[serde(alias = "update_count")]
    pub update_count: i64,
    /// Server time in milliseconds.
    #[serde(alias = "current_time")]
    pub current_time: i64,
    /// False while a reconciliation is in flight; an interrupted run leaves it false.
    #[serde(default = "default_active")]
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Post,
    Page,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    pub title: String,
    pub layout: Layout,
    pub published: bool,
    pub date: String,
    pub tags: Vec<String>,
}

mod hex_bytes {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(D::Error::custom)
    }
}
