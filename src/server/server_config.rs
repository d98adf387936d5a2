use std::io;
use std::path::PathBuf;

use crate::config::Config;
use crate::server::auth::{AllowAll, AuthBackend, TokenAuth};
use crate::store::{Store, StoreError};

const SECTION: &str = "Server";

pub const DEFAULT_BIND: &str = "127.0.0.1:4545";
pub const DEFAULT_DATA_FILE: &str = "keyforge.db";

/// Settings of the `[Server]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    /// `None` keeps the store in memory only.
    pub data_file: Option<PathBuf>,
    pub tokens_file: Option<PathBuf>,
    /// Plaintext tokens; hashed as soon as the auth backend is built.
    pub tokens: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_owned(),
            data_file: Some(PathBuf::from(DEFAULT_DATA_FILE)),
            tokens_file: None,
            tokens: Vec::new(),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        // An explicitly empty data_file disables persistence.
        let data_file = match config.get(SECTION, "data_file") {
            Some(v) if v.is_empty() => None,
            Some(v) => Some(PathBuf::from(v)),
            None => Some(PathBuf::from(DEFAULT_DATA_FILE)),
        };

        let tokens = config
            .get(SECTION, "tokens")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            bind: config
                .get_non_empty_or_default(SECTION, "bind", DEFAULT_BIND)
                .to_owned(),
            data_file,
            tokens_file: config.get_non_empty(SECTION, "tokens_file").map(PathBuf::from),
            tokens,
        }
    }

    /// Token auth when any token is configured, otherwise [`AllowAll`].
    pub fn build_auth(&self) -> io::Result<Box<dyn AuthBackend>> {
        let mut auth = TokenAuth::from_tokens(&self.tokens);
        if let Some(path) = &self.tokens_file {
            auth.load_file(path)?;
        }

        if auth.is_empty() {
            Ok(Box::new(AllowAll))
        } else {
            Ok(Box::new(auth))
        }
    }

    pub fn open_store(&self) -> Result<Store, StoreError> {
        match &self.data_file {
            Some(path) => Store::open(path),
            None => Ok(Store::in_memory()),
        }
    }
}
