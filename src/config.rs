// ABOUTME: YAML site configuration for credentials, notebook, and directory layout
// ABOUTME: Validated once and turned into explicit options for sync and convert

use crate::convert::ConvertOptions;
use crate::publish::{PublishMode, Publisher};
use crate::remote::Environment;
use crate::sync::SyncOptions;
use crate::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "_evernote.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub client_key: String,
    pub client_secret: String,
    #[serde(default)]
    pub developer_token: Option<String>,
    #[serde(default, rename = "is_sandbox")]
    pub sandbox: bool,
    pub notebook_name: String,

    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default = "default_throttle_minutes")]
    pub throttle_minutes: u64,
    #[serde(default = "default_max_notes")]
    pub max_notes: i32,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    #[serde(default = "default_cache_root")]
    pub cache_root: PathBuf,
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    #[serde(default = "default_posts_dir")]
    pub posts_dir: String,
    #[serde(default = "default_resources_dir")]
    pub resources_dir: String,
    #[serde(default = "default_prune_resources")]
    pub prune_resources: bool,
}

fn default_throttle_minutes() -> u64 {
    15
}

fn default_max_notes() -> i32 {
    1000
}

fn default_page_size() -> i32 {
    250
}

fn default_cache_root() -> PathBuf {
    PathBuf::from("_cache")
}

fn default_output_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_posts_dir() -> String {
    "_posts".into()
}

fn default_resources_dir() -> String {
    "resources".into()
}

fn default_prune_resources() -> bool {
    true
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "can't read {} ({}); create it with client_key, client_secret and notebook_name",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_yaml(content: &str) -> std::result::Result<Self, String> {
        let config: Config = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        for (key, value) in [
            ("client_key", &self.client_key),
            ("client_secret", &self.client_secret),
            ("notebook_name", &self.notebook_name),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{} is blank", key));
            }
        }
        if self.page_size <= 0 || self.max_notes <= 0 {
            return Err("page_size and max_notes must be positive".into());
        }
        Ok(())
    }

    pub fn environment(&self) -> Environment {
        Environment::from_sandbox_flag(self.sandbox)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            throttle_window: Duration::from_secs(self.throttle_minutes * 60),
            max_notes: self.max_notes,
            page_size: self.page_size,
            prune_resources: self.prune_resources,
            ..SyncOptions::new(self.notebook_name.clone())
        }
    }

    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            posts_dir: self.posts_dir.clone(),
            resource_url_prefix: format!("/{}", self.resources_dir.trim_matches('/')),
        }
    }

    pub fn publisher(&self, mode: PublishMode) -> Publisher {
        Publisher::new(
            &self.output_root,
            self.posts_dir.trim_matches('/'),
            self.resources_dir.trim_matches('/'),
            mode,
        )
    }
}
