use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::core::{ModelError, Result};
use crate::storage::{DurabilityMode, FileStore, InMemoryStore, StoreClient};

pub const DEFAULT_TABLE: &str = "JSC-Tracker";
pub const DEFAULT_REGION: &str = "us-west-2";

const URL_SCHEME: &str = "kvmodel://";

/// Store configuration
///
/// Names the logical table and picks the backend: in-memory unless a data
/// directory is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Logical table name
    pub table: String,

    /// Region the table lives in
    pub region: String,

    /// Snapshot directory for the file backend
    pub data_dir: Option<PathBuf>,

    pub durability: DurabilityMode,
}

impl StoreConfig {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            region: DEFAULT_REGION.to_string(),
            data_dir: None,
            durability: DurabilityMode::default(),
        }
    }

    pub fn region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    pub fn data_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.data_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn durability(mut self, durability: DurabilityMode) -> Self {
        self.durability = durability;
        self
    }

    /// Parse from a store URL
    ///
    /// Format: "kvmodel://table[@region][/data_dir]"
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = StoreConfig::from_url("kvmodel://JSC-Tracker@us-east-1/var/lib/jsc")?;
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| ModelError::Config(format!("URL must start with '{}'", URL_SCHEME)))?;

        let (location, data_dir) = match rest.split_once('/') {
            Some((location, dir)) => (location, Some(dir)),
            None => (rest, None),
        };
        let (table, region) = match location.split_once('@') {
            Some((table, region)) => (table, Some(region)),
            None => (location, None),
        };

        let mut config = Self::new(table);
        if let Some(region) = region {
            config = config.region(region);
        }
        if let Some(dir) = data_dir.filter(|d| !d.is_empty()) {
            config = config.data_dir(format!("/{}", dir));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn to_url(&self) -> String {
        let mut url = format!("{}{}@{}", URL_SCHEME, self.table, self.region);
        if let Some(dir) = &self.data_dir {
            url.push_str(&dir.to_string_lossy());
        }
        url
    }

    pub fn validate(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(ModelError::Config("Table name cannot be empty".to_string()));
        }
        if self.region.is_empty() {
            return Err(ModelError::Config("Region cannot be empty".to_string()));
        }
        // Store URLs only carry absolute paths.
        if let Some(dir) = &self.data_dir {
            if !dir.is_absolute() {
                return Err(ModelError::Config(format!(
                    "Data dir must be an absolute path: {}",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    /// Open the configured backend and wrap it in a client.
    pub fn open(&self) -> Result<StoreClient> {
        self.validate()?;
        let client = match &self.data_dir {
            Some(dir) => {
                debug!("Opening {} from {}", self.table, dir.display());
                StoreClient::new(Arc::new(FileStore::open(dir, self.durability)?), &self.table)
            }
            None => {
                debug!("Opening {} in memory", self.table);
                StoreClient::new(Arc::new(InMemoryStore::new()), &self.table)
            }
        };
        Ok(client)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE)
    }
}
