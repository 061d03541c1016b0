// ABOUTME: Contract for the remote note service the sync engine talks to
// ABOUTME: One method per remote operation so tests can swap in mocks

use crate::model::{Notebook, NoteMetadata, NoteRecord, ResourceBinary, SyncState};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    pub fn from_sandbox_flag(sandbox: bool) -> Self {
        if sandbox {
            Environment::Sandbox
        } else {
            Environment::Production
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => "https://sandbox.evernote.com",
            Environment::Production => "https://www.evernote.com",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_key: String,
    pub client_secret: String,
    pub developer_token: String,
    pub environment: Environment,
}

/// Remote note store. Every call is blocking; implementations report transport
/// problems as [`crate::Error::Network`] or [`crate::Error::Api`].
#[cfg_attr(test, mockall::automock)]
pub trait NoteStore {
    fn check_protocol_version(&self) -> Result<bool>;

    fn get_sync_state(&self) -> Result<SyncState>;

    fn list_notebooks(&self) -> Result<Vec<Notebook>>;

    fn find_note_metadata(
        &self,
        notebook_guid: &str,
        ascending: bool,
        offset: i32,
        limit: i32,
    ) -> Result<Vec<NoteMetadata>>;

    /// Full note with content and resource list, without resource bodies.
    fn get_note(&self, guid: &str) -> Result<NoteRecord>;

    fn get_note_tag_names(&self, guid: &str) -> Result<Vec<String>>;

    fn get_resource_binary(&self, guid: &str) -> Result<ResourceBinary>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_from_flag() {
        assert_eq!(Environment::from_sandbox_flag(true), Environment::Sandbox);
        assert_eq!(
            Environment::from_sandbox_flag(false).base_url(),
            "https://www.evernote.com"
        );
    }
}
