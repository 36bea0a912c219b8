use std::env;

use tracing::warn;

use crate::errors::{Error, Result};

pub const DEFAULT_POOL_SIZE: usize = 64;
pub const DEFAULT_KEY_SIZE: usize = 32;

/// Tunables for a storage engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageOptions {
    // Frames in the buffer pool
    pub pool_size: usize,
    // Serialized key width shared by every index of the engine
    pub key_size: usize,
    // Derived from page capacity when left unset
    pub leaf_max_size: Option<usize>,
    pub internal_max_size: Option<usize>,
}

impl Default for StorageOptions {
    fn default() -> Self {
        StorageOptions {
            pool_size: DEFAULT_POOL_SIZE,
            key_size: DEFAULT_KEY_SIZE,
            leaf_max_size: None,
            internal_max_size: None,
        }
    }
}

impl StorageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn key_size(mut self, key_size: usize) -> Self {
        self.key_size = key_size;
        self
    }

    pub fn leaf_max_size(mut self, leaf_max_size: usize) -> Self {
        self.leaf_max_size = Some(leaf_max_size);
        self
    }

    pub fn internal_max_size(mut self, internal_max_size: usize) -> Self {
        self.internal_max_size = Some(internal_max_size);
        self
    }

    /// Defaults overlaid with `CAIRN_POOL_SIZE`, `CAIRN_KEY_SIZE`,
    /// `CAIRN_LEAF_MAX_SIZE` and `CAIRN_INTERNAL_MAX_SIZE`.
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();
        if let Some(pool_size) = read_env("CAIRN_POOL_SIZE")? {
            options.pool_size = pool_size;
        }
        if let Some(key_size) = read_env("CAIRN_KEY_SIZE")? {
            options.key_size = key_size;
        }
        options.leaf_max_size = read_env("CAIRN_LEAF_MAX_SIZE")?.or(options.leaf_max_size);
        options.internal_max_size =
            read_env("CAIRN_INTERNAL_MAX_SIZE")?.or(options.internal_max_size);
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::InvalidConfig("pool size must be positive".to_string()));
        }
        if self.key_size == 0 {
            return Err(Error::InvalidConfig("key size must be positive".to_string()));
        }
        Ok(())
    }
}

fn read_env(name: &str) -> Result<Option<usize>> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|err| {
            Error::InvalidConfig(format!("{}={:?} is not a number: {}", name, raw, err))
        }),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => {
            warn!(name, "ignoring environment variable that is not unicode");
            Ok(None)
        }
    }
}

#[cfg(test)]
pub mod test {
    use super::{StorageOptions, DEFAULT_POOL_SIZE};

    #[test]
    fn builder_overrides_defaults() {
        let options = StorageOptions::new().pool_size(8).leaf_max_size(4);
        assert_eq!(8, options.pool_size);
        assert_eq!(Some(4), options.leaf_max_size);
        assert_eq!(None, options.internal_max_size);
        assert!(options.validate().is_ok());

        assert_eq!(DEFAULT_POOL_SIZE, StorageOptions::default().pool_size);
        assert!(StorageOptions::new().pool_size(0).validate().is_err());
    }
}
