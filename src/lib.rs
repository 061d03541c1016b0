// ABOUTME: Public library API for Evernote-to-Jekyll publishing
// ABOUTME: Re-exports the sync engine, converter, and supporting modules

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod publish;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod util;

pub use error::{ConvertError, Error, Result};
pub use model::{FrontMatter, Layout, NoteMetadata, NoteRecord, Notebook, ResourceRef, SyncState};
pub use remote::NoteStore;
