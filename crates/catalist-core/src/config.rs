use std::path::PathBuf;

use catalist_crypto::{KdfParams, PBKDF2_ITERATIONS, SHARED_SALT};
use serde::{Deserialize, Serialize};

use crate::error::{CatalistError, CatalistResult};

/// Top-level configuration (loaded from catalist.toml)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalistConfig {
    pub crypto: CryptoConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

/// Session key derivation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// PBKDF2-HMAC-SHA256 iteration count (default: 100000)
    pub pbkdf2_iterations: u32,
    /// Application salt shared by every member of a workspace
    pub salt: String,
    /// Check the canary file at session start when it exists
    pub verify_canary: bool,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: PBKDF2_ITERATIONS,
            salt: String::from_utf8_lossy(SHARED_SALT).into_owned(),
            verify_canary: true,
        }
    }
}

impl CryptoConfig {
    /// KDF parameters for session bootstrap.
    pub fn kdf_params(&self) -> CatalistResult<KdfParams> {
        if self.salt.is_empty() {
            return Err(CatalistError::Config("crypto.salt must not be empty".into()));
        }
        let params = KdfParams {
            iterations: self.pbkdf2_iterations,
            salt: self.salt.as_bytes().to_vec(),
        };
        params
            .validate()
            .map_err(|e| CatalistError::Config(format!("crypto: {e}")))?;
        Ok(params)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON array of note envelopes
    pub notes_file: PathBuf,
    /// Canary envelope written by `canary init`
    pub canary_file: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            notes_file: PathBuf::from("notes.json"),
            canary_file: PathBuf::from("canary.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[crypto]
pbkdf2_iterations = 200000
salt = "team-salt"
verify_canary = false

[store]
notes_file = "/var/lib/catalist/notes.json"
canary_file = "/var/lib/catalist/canary.json"

[logging]
log_level = "debug"
log_format = "json"
"#;
        let config: CatalistConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.crypto.pbkdf2_iterations, 200_000);
        assert_eq!(config.crypto.salt, "team-salt");
        assert!(!config.crypto.verify_canary);
        assert_eq!(
            config.store.notes_file,
            PathBuf::from("/var/lib/catalist/notes.json")
        );
        assert_eq!(config.logging.log_level, "debug");
        assert_eq!(config.logging.log_format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config: CatalistConfig = toml::from_str("").unwrap();

        assert_eq!(config.crypto.pbkdf2_iterations, 100_000);
        assert_eq!(config.crypto.salt, "shared-salt");
        assert!(config.crypto.verify_canary);
        assert_eq!(config.store.notes_file, PathBuf::from("notes.json"));
        assert_eq!(config.store.canary_file, PathBuf::from("canary.json"));
        assert_eq!(config.logging.log_level, "info");
        assert_eq!(config.logging.log_format, "text");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[store]
notes_file = "shared/notes.json"
"#;
        let config: CatalistConfig = toml::from_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.store.notes_file, PathBuf::from("shared/notes.json"));
        // Defaults
        assert_eq!(config.store.canary_file, PathBuf::from("canary.json"));
        assert_eq!(config.crypto.pbkdf2_iterations, 100_000);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = CatalistConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: CatalistConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, parsed);
    }

    #[test]
    fn test_default_kdf_params() {
        let params = CryptoConfig::default().kdf_params().unwrap();
        assert!(params.is_default());
        assert_eq!(params, KdfParams::default());
    }

    #[test]
    fn test_kdf_params_rejects_zero_iterations() {
        let config = CryptoConfig {
            pbkdf2_iterations: 0,
            ..CryptoConfig::default()
        };
        assert!(matches!(config.kdf_params(), Err(CatalistError::Config(_))));
    }

    #[test]
    fn test_kdf_params_rejects_empty_salt() {
        let config = CryptoConfig {
            salt: String::new(),
            ..CryptoConfig::default()
        };
        assert!(matches!(config.kdf_params(), Err(CatalistError::Config(_))));
    }
}
