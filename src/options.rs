use std::path::PathBuf;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

/// Configuration options of Harmonia.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmoniaOptions {
    /// Sqlite file holding folder tags. Defaults to the data directory.
    pub database: Option<PathBuf>,
    /// Address the tag service listens on.
    pub listen: String,
    /// Base URL of the tag service used by the client commands.
    pub api_base: String,
    /// Base URL of the Dropbox API.
    pub dropbox_api: String,
    /// Dropbox bearer token.
    pub access_token: Option<String>,
    /// Shared link whose folders are browsed.
    pub shared_link: Option<String>,
    /// Send saves of one folder one after another.
    pub serialize_saves: bool,
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for HarmoniaOptions {
    fn default() -> Self {
        HarmoniaOptions {
            database: None,
            listen: "127.0.0.1:4000".to_string(),
            api_base: "http://127.0.0.1:4000".to_string(),
            dropbox_api: "https://api.dropboxapi.com".to_string(),
            access_token: None,
            shared_link: None,
            serialize_saves: true,
            log_level: "info".to_string(),
        }
    }
}

impl HarmoniaOptions {
    /// Let environment variables override secrets from the file.
    pub fn with_env(mut self) -> Self {
        if let Ok(token) = std::env::var("HARMONIA_ACCESS_TOKEN") {
            self.access_token = Some(token);
        }
        if let Ok(link) = std::env::var("HARMONIA_SHARED_LINK") {
            self.shared_link = Some(link);
        }
        self
    }

    /// Level named by `log_level`, `info` when it names none.
    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}
