//! Node configuration: every `CFG_*` knob the protocol engine reads, collected
//! in one serializable struct with a `Default` matching the documented values.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Port the listener binds to.
    pub listening_port: u16,
    /// `listen(2)` backlog size.
    pub listening_queue: u32,
    /// Max number of connections serviced concurrently by the worker pool.
    pub thread_pool_length: usize,
    /// RSA modulus size in bits for freshly generated keypairs.
    pub key_length: usize,
    /// Number of relays drawn for a message's onion path.
    pub path_length: usize,
    /// Plaintext (encrypt) / ciphertext (decrypt) chunk size for the RSA primitive.
    pub crypt_chunk_size: usize,
    /// Minimum length, in bytes, of the random padding appended before encryption.
    pub salt_len_min: usize,
    /// Maximum length, in bytes, of the random padding appended before encryption.
    pub salt_len_max: usize,
    /// Timeout applied to every blocking socket operation, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listening_port: 2000,
            listening_queue: 8,
            thread_pool_length: 8,
            key_length: 1024,
            path_length: 3,
            crypt_chunk_size: 128,
            salt_len_min: 64,
            salt_len_max: 512,
            timeout_ms: 15_000,
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Ok(config)
    }

    pub fn to_file(&self, path: &PathBuf) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "IO error: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::SerializeError(msg) => write!(f, "Serialize error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.listening_port, 2000);
        assert_eq!(cfg.listening_queue, 8);
        assert_eq!(cfg.thread_pool_length, 8);
        assert_eq!(cfg.key_length, 1024);
        assert_eq!(cfg.path_length, 3);
        assert_eq!(cfg.crypt_chunk_size, 128);
        assert_eq!(cfg.salt_len_min, 64);
        assert_eq!(cfg.salt_len_max, 512);
        assert_eq!(cfg.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn file_round_trip() -> Result<(), ConfigError> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let cfg = Config::default();
        cfg.to_file(&path)?;
        let loaded = Config::from_file(&path)?;

        assert_eq!(cfg, loaded);
        Ok(())
    }
}
