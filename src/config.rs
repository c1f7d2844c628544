use crate::cache::{self, PrCache};
use crate::gh::GITHUB_API_URL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_OWNER: &str = "hans-zanecoder";
const DEFAULT_REPO: &str = "Github-API";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub owner: String,
    pub repo: String,
    pub api_base: String,
    /// URL answering `{ "token": "..." }`; unset means GITHUB_TOKEN / gh cli
    pub token_endpoint: Option<String>,
    pub cache_ttl_secs: u64,
    /// Defaults to the cache TTL
    pub refresh_interval_secs: Option<u64>,
    pub debounce_ms: u64,
    pub request_timeout_secs: u64,
    pub cache_path: Option<String>,
    pub clone_root: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            owner: DEFAULT_OWNER.to_string(),
            repo: DEFAULT_REPO.to_string(),
            api_base: GITHUB_API_URL.to_string(),
            token_endpoint: None,
            cache_ttl_secs: cache::DEFAULT_TTL.as_secs(),
            refresh_interval_secs: None,
            debounce_ms: 300,
            request_timeout_secs: 20,
            cache_path: None,
            clone_root: None,
        }
    }
}

impl Config {
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        // A zero interval would spin the refresh loop
        Duration::from_secs(self.refresh_interval_secs.unwrap_or(self.cache_ttl_secs).max(10))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn cache(&self) -> PrCache {
        let path = self
            .cache_path
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(PrCache::default_path);
        PrCache::new(path, self.cache_ttl())
    }

    pub fn clone_root(&self) -> PathBuf {
        self.clone_root.as_deref().map(expand_home).unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(config_dir)
                .join("prboard")
                .join("repos")
        })
    }

    /// Point the config at another repository, given as `owner/repo` or a GitHub URL
    pub fn set_repo(&mut self, spec: &str) -> Result<()> {
        let (owner, repo) = parse_repo_spec(spec)?;
        self.owner = owner;
        self.repo = repo;
        Ok(())
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("prboard")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

pub fn load_config() -> Config {
    let path = config_path();
    if !path.exists() {
        return Config::default();
    }
    std::fs::read_to_string(&path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn save_config(config: &Config) -> Result<()> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|h| h.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Accepts `owner/repo`, `https://github.com/owner/repo(.git)` and
/// `git@github.com:owner/repo.git`.
pub fn parse_repo_spec(spec: &str) -> Result<(String, String)> {
    let spec = spec.trim();

    let path = if spec.starts_with("https://") || spec.starts_with("http://") {
        let url = url::Url::parse(spec).with_context(|| format!("Invalid repository URL: {spec}"))?;
        url.path().trim_matches('/').to_string()
    } else if let Some(rest) = spec.strip_prefix("git@") {
        rest.split_once(':')
            .map(|(_, path)| path.to_string())
            .with_context(|| format!("Invalid SSH URL: {spec}"))?
    } else {
        spec.to_string()
    };

    let path = path.trim_end_matches(".git");
    match path.split('/').collect::<Vec<_>>().as_slice() {
        [owner, repo] if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => anyhow::bail!("Invalid repository format: {spec}. Expected owner/repo"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_in_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{ "owner": "octo", "cache_ttl_secs": 60 }"#).unwrap();
        assert_eq!(cfg.repo_slug(), "octo/Github-API");
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(60));
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(60));
        assert_eq!(cfg.debounce(), Duration::from_millis(300));
        assert_eq!(cfg.api_base, "https://api.github.com");
    }

    #[test]
    fn default_refresh_matches_cache_expiry() {
        let cfg = Config::default();
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(30 * 60));
    }

    #[test]
    fn refresh_interval_has_a_floor() {
        let cfg = Config {
            refresh_interval_secs: Some(0),
            ..Config::default()
        };
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(10));
    }

    #[test]
    fn explicit_cache_path_is_used() {
        let cfg = Config {
            cache_path: Some("/tmp/prboard-test/cache.json".to_string()),
            ..Config::default()
        };
        assert_eq!(
            cfg.cache().path(),
            std::path::Path::new("/tmp/prboard-test/cache.json")
        );
    }

    #[test]
    fn parse_shorthand() {
        let (owner, repo) = parse_repo_spec("owner/repo").unwrap();
        assert_eq!((owner.as_str(), repo.as_str()), ("owner", "repo"));
    }

    #[test]
    fn parse_https_url_with_git_suffix() {
        let (owner, repo) = parse_repo_spec("https://github.com/owner/repo.git").unwrap();
        assert_eq!((owner.as_str(), repo.as_str()), ("owner", "repo"));
    }

    #[test]
    fn parse_ssh_url() {
        let (owner, repo) = parse_repo_spec("git@github.com:owner/repo.git").unwrap();
        assert_eq!((owner.as_str(), repo.as_str()), ("owner", "repo"));
    }

    #[test]
    fn parse_invalid() {
        assert!(parse_repo_spec("invalid").is_err());
        assert!(parse_repo_spec("a/b/c").is_err());
        assert!(parse_repo_spec("/repo").is_err());
    }

    #[test]
    fn set_repo_updates_owner_and_name() {
        let mut cfg = Config::default();
        cfg.set_repo("rust-lang/rust").unwrap();
        assert_eq!(cfg.repo_slug(), "rust-lang/rust");
    }
}
