use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    pub paths: PathsConfig,
}

/// Connection settings for the structured-query service (BaseX REST).
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub url: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    /// Per-query timeout. The engine defines no timeout semantics of its
    /// own, so this is the only bound on a hung service.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_user() -> String {
    "admin".to_string()
}
fn default_password() -> String {
    "pass".to_string()
}
fn default_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// The instruction template, loaded once per run.
    pub template: PathBuf,
    /// Directory of per-identifier rich-user-content JSON files.
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,
    /// Directory of harvested metadata records; file stems are the record ids.
    #[serde(default = "default_records_dir")]
    pub records_dir: PathBuf,
    /// Directory against which `@file` query references resolve.
    #[serde(default = "default_query_root")]
    pub query_root: PathBuf,
    /// Directory of vocabulary tables (`<name>.json`).
    #[serde(default = "default_vocab_dir")]
    pub vocab_dir: PathBuf,
    /// Where merged records are written (one subdirectory per record kind).
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("./data/rich_user_contents")
}
fn default_records_dir() -> PathBuf {
    PathBuf::from("./data/parsed_datasets")
}
fn default_query_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_vocab_dir() -> PathBuf {
    PathBuf::from("./properties")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./processed")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.service.url.trim().is_empty() {
        anyhow::bail!("service.url must not be empty");
    }
    if config.service.timeout_secs == 0 {
        anyhow::bail!("service.timeout_secs must be > 0");
    }
    if config.paths.template.as_os_str().is_empty() {
        anyhow::bail!("paths.template must be set");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_minimal_config_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weave.toml");
        fs::write(
            &path,
            r#"[service]
url = "http://basex:8080/rest"

[paths]
template = "./template.json"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.service.user, "admin");
        assert_eq!(config.service.timeout_secs, 300);
        assert_eq!(config.paths.vocab_dir, PathBuf::from("./properties"));
    }

    #[test]
    fn test_empty_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weave.toml");
        fs::write(
            &path,
            r#"[service]
url = ""

[paths]
template = "./template.json"
"#,
        )
        .unwrap();
        assert!(load_config(&path).is_err());
    }
}
