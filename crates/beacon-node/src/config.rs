//! Node configuration file.
//!
//! JSON, read once at startup. Paths inside it are made absolute against
//! the data directory, which itself defaults to the directory holding the
//! configuration file.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use beacon_peer::{Chain, PeerConfiguration};
use serde::Deserialize;

pub const DEFAULT_FILE: &str = "beacond.conf.json";
const DEFAULT_DATA_DIRECTORY: &str = ".";

#[derive(Debug, Clone, Deserialize)]
pub struct Logging {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_data_directory() -> String {
    DEFAULT_DATA_DIRECTORY.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    #[serde(default = "default_data_directory")]
    pub data_directory: String,
    #[serde(default)]
    pub chain: Chain,
    #[serde(default)]
    pub logging: Logging,
    pub peering: PeerConfiguration,
}

impl Configuration {
    /// Read, decode and verify the configuration at `path`.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = absolute(path.as_ref())?;
        let text = fs::read_to_string(&path)
            .with_context(|| format!("read configuration {}", path.display()))?;
        let mut options: Configuration = serde_json::from_str(&text)
            .with_context(|| format!("parse configuration {}", path.display()))?;

        let config_directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let data_directory = match options.data_directory.as_str() {
            "" | "~" => bail!("Path: {:?} is not a valid directory", options.data_directory),
            "." => config_directory,
            other => PathBuf::from(other),
        };

        let metadata = fs::metadata(&data_directory)
            .with_context(|| format!("data directory {}", data_directory.display()))?;
        if !metadata.is_dir() {
            bail!("Path: {:?} is not a directory", data_directory.display().to_string());
        }

        options.peering.private_key = ensure_absolute(&data_directory, &options.peering.private_key);
        options.peering.public_key = ensure_absolute(&data_directory, &options.peering.public_key);
        options.data_directory = data_directory.display().to_string();

        Ok(options)
    }
}

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("current directory")?;
    Ok(cwd.join(path))
}

fn ensure_absolute(directory: &Path, file: &str) -> String {
    let path = Path::new(file);
    if path.is_absolute() {
        file.to_string()
    } else {
        directory.join(path).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, data_directory: &str, chain: Option<&str>) -> PathBuf {
        let chain = chain
            .map(|c| format!(r#""chain": "{c}","#))
            .unwrap_or_default();
        let json = format!(
            r#"{{
                "data_directory": {data_directory:?},
                {chain}
                "logging": {{ "level": "debug" }},
                "peering": {{
                    "private_key": "peer.private",
                    "public_key": "/etc/beacon/peer.public",
                    "node": [
                        {{ "public_key": "aa", "subscribe": "127.0.0.1:2135", "connect": "127.0.0.1:2136" }}
                    ]
                }}
            }}"#
        );
        let path = dir.join(DEFAULT_FILE);
        fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn dot_means_configuration_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), ".", Some("testing"));

        let config = Configuration::load(&path).unwrap();
        assert_eq!(config.chain, Chain::Testing);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(Path::new(&config.data_directory), dir.path());
        assert_eq!(
            Path::new(&config.peering.private_key),
            dir.path().join("peer.private")
        );
        assert_eq!(config.peering.public_key, "/etc/beacon/peer.public");
        assert_eq!(config.peering.node.len(), 1);
    }

    #[test]
    fn chain_defaults_to_bitmark() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), ".", None);
        assert_eq!(Configuration::load(&path).unwrap().chain, Chain::Bitmark);
    }

    #[test]
    fn empty_and_home_directories_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for bad in ["", "~"] {
            let path = write_config(dir.path(), bad, None);
            let err = Configuration::load(&path).unwrap_err();
            assert!(err.to_string().contains("is not a valid directory"), "{err}");
        }
    }

    #[test]
    fn data_directory_must_exist_and_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let path = write_config(dir.path(), missing.to_str().unwrap(), None);
        assert!(Configuration::load(&path).is_err());

        let file = dir.path().join("plain-file");
        fs::write(&file, "x").unwrap();
        let path = write_config(dir.path(), file.to_str().unwrap(), None);
        let err = Configuration::load(&path).unwrap_err();
        assert!(err.to_string().contains("is not a directory"), "{err}");
    }

    #[test]
    fn key_paths_resolve_against_explicit_data_directory() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir(&data).unwrap();
        let path = write_config(dir.path(), data.to_str().unwrap(), Some("local"));

        let config = Configuration::load(&path).unwrap();
        assert_eq!(Path::new(&config.peering.private_key), data.join("peer.private"));
    }

    #[test]
    fn unknown_chain_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), ".", Some("livenet"));
        assert!(Configuration::load(&path).is_err());
    }
}
