pub mod api;
pub mod client;
pub mod options;
pub mod provider;
pub mod server;
pub mod store;
pub mod tagset;

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use isahc::config::Configurable;
use isahc::HttpClient;
use miette::Diagnostic;
use thiserror::Error;
use tokio::fs::read_to_string;

use crate::api::TagServiceClient;
use crate::client::filter::PageLocation;
use crate::client::session::Browser;
use crate::options::HarmoniaOptions;
use crate::provider::FolderProvider;
use crate::store::{StoreError, TagStore};

#[derive(Debug)]
pub struct Harmonia {
    /// HTTP client shared by the tag service and Dropbox clients.
    http_client: HttpClient,
    /// Project directories.
    dirs: ProjectDirs,
    /// Configuration options of the session.
    options: HarmoniaOptions,
}

#[derive(Debug, Error, Diagnostic)]
pub enum HarmoniaError {
    #[error("Could not create HTTP client.")]
    HttpClient(#[from] isahc::Error),

    #[error("Could not open tag store.")]
    Store(#[from] StoreError),

    #[error("Could not load configuration file: {0}")]
    Options(String),

    #[error("Tag service stopped.")]
    Server(#[from] std::io::Error),
}

impl Harmonia {
    /// Create new session. Options are read from `config`, or from
    /// `config.toml` in the configuration directory when it exists.
    pub async fn new(config: &Option<PathBuf>) -> Result<Harmonia, HarmoniaError> {
        let dirs = ProjectDirs::from("org", "harmonia", "Harmonia").ok_or_else(|| {
            HarmoniaError::Options("Could not load directory for configuration files".to_string())
        })?;

        let options = match config {
            Some(path) => load_options(path).await?,
            None => match read_to_string(dirs.config_dir().join("config.toml")).await {
                Ok(s) => toml::from_str(&s).map_err(|e| HarmoniaError::Options(e.to_string()))?,
                Err(_) => HarmoniaOptions::default(),
            },
        }
        .with_env();

        Harmonia::with_options(dirs, options)
    }

    fn with_options(dirs: ProjectDirs, options: HarmoniaOptions) -> Result<Harmonia, HarmoniaError> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Harmonia {
            http_client,
            dirs,
            options,
        })
    }

    pub fn options(&self) -> &HarmoniaOptions {
        &self.options
    }

    /// Returns the sqlite file that stores folder tags.
    pub fn database_path(&self) -> PathBuf {
        self.options
            .database
            .clone()
            .unwrap_or_else(|| self.dirs.data_dir().join("tags.db"))
    }

    pub async fn open_store(&self) -> Result<TagStore, HarmoniaError> {
        Ok(TagStore::open(self.database_path()).await?)
    }

    /// Run the tag service until stopped.
    pub async fn serve(&self) -> Result<(), HarmoniaError> {
        let store = self.open_store().await?;
        log::info!("Serving tags from {}", self.database_path().display());
        server::serve(store, self.options.listen.as_str()).await?;
        Ok(())
    }

    pub fn tag_client(&self) -> TagServiceClient {
        TagServiceClient::new(self.http_client.clone(), self.options.api_base.clone())
    }

    pub fn provider(&self) -> FolderProvider {
        FolderProvider::new(
            self.http_client.clone(),
            self.options.dropbox_api.clone(),
            self.options.access_token.clone(),
            self.options.shared_link.clone(),
        )
    }

    /// Browser for the page at `location`.
    pub fn browser(&self, location: PageLocation) -> Browser {
        Browser::new(
            location,
            self.provider(),
            self.tag_client(),
            self.options.serialize_saves,
        )
    }
}

async fn load_options(path: &Path) -> Result<HarmoniaOptions, HarmoniaError> {
    let s = read_to_string(path)
        .await
        .map_err(|e| HarmoniaError::Options(format!("{}: {e}", path.display())))?;
    toml::from_str(&s).map_err(|e| HarmoniaError::Options(e.to_string()))
}

/// Set up logging: `RUST_LOG` wins over the configured level.
pub fn init_logging(options: &HarmoniaOptions) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(options.level_filter());
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    let _ = builder.try_init();
}
