use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILENAME: &str = "wikimigrate.toml";
pub const DEFAULT_ROOT_DIR: &str = "text";
pub const DEFAULT_LOCALE: &str = "ru";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_USER_AGENT: &str = concat!("wikimigrate/", env!("CARGO_PKG_VERSION"));

pub const ENV_API_URL: &str = "API_URL";
pub const ENV_TOKEN: &str = "WIKI_TOKEN";
pub const ENV_ROOT_DIR: &str = "FOLDER_NAME";
pub const ENV_LOCALE: &str = "WIKI_LOCALE";
pub const ENV_TIMEOUT_MS: &str = "WIKI_HTTP_TIMEOUT_MS";
pub const ENV_CONCURRENCY: &str = "MIGRATE_CONCURRENCY";

/// On-disk TOML settings. Every key is optional; the bearer token is never read from here.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub wiki: WikiSection,
    #[serde(default)]
    pub migrate: MigrateSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    pub api_url: Option<String>,
    pub locale: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct MigrateSection {
    pub root_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
}

/// Values supplied on the command line. They win over env and file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root_dir: Option<PathBuf>,
    pub api_url: Option<String>,
    pub locale: Option<String>,
    pub timeout_ms: Option<u64>,
    pub concurrency: Option<usize>,
}

/// Bearer token for the wiki API. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(**********)")
    }
}

/// Immutable settings for one migration run, resolved once at startup.
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    pub api_url: String,
    pub token: ApiToken,
    pub root_dir: PathBuf,
    pub locale: String,
    pub timeout_ms: u64,
    pub concurrency: usize,
    pub user_agent: String,
}

impl MigrateConfig {
    /// Resolve every field as flag > process env > config file > default.
    pub fn resolve(overrides: &ConfigOverrides, file: &ConfigFile) -> Result<Self> {
        Self::resolve_with_env(overrides, file, |key| env::var(key).ok())
    }

    pub fn resolve_with_env<F>(overrides: &ConfigOverrides, file: &ConfigFile, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_url = overrides
            .api_url
            .clone()
            .or_else(|| env_value(ENV_API_URL))
            .or_else(|| file.wiki.api_url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("wiki API URL is not configured (set {ENV_API_URL} or [wiki].api_url)")
            })?;

        let token = env_value(ENV_TOKEN)
            .map(ApiToken::new)
            .ok_or_else(|| anyhow::anyhow!("wiki API token is not configured (set {ENV_TOKEN})"))?;

        let root_dir = overrides
            .root_dir
            .clone()
            .or_else(|| env_value(ENV_ROOT_DIR).map(PathBuf::from))
            .or_else(|| file.migrate.root_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT_DIR));

        let locale = overrides
            .locale
            .clone()
            .or_else(|| env_value(ENV_LOCALE))
            .or_else(|| file.wiki.locale.clone())
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string());

        let timeout_ms = match overrides.timeout_ms {
            Some(value) => value,
            None => match env_value(ENV_TIMEOUT_MS) {
                Some(raw) => parse_number(ENV_TIMEOUT_MS, &raw)?,
                None => file.wiki.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            },
        };

        let concurrency = match overrides.concurrency {
            Some(value) => value,
            None => match env_value(ENV_CONCURRENCY) {
                Some(raw) => parse_number(ENV_CONCURRENCY, &raw)?,
                None => file.migrate.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            },
        };

        if timeout_ms == 0 {
            bail!("request timeout must be at least 1 ms (check {ENV_TIMEOUT_MS} or [wiki].timeout_ms)");
        }
        if api_url.trim().is_empty() {
            bail!("wiki API URL cannot be empty");
        }

        Ok(Self {
            api_url: api_url.trim().to_string(),
            token,
            root_dir,
            locale,
            timeout_ms,
            concurrency: concurrency.max(1),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }
}

/// Load and parse the TOML config file. Returns defaults if the file doesn't exist.
pub fn load_config_file(config_path: &Path) -> Result<ConfigFile> {
    if !config_path.exists() {
        return Ok(ConfigFile::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("{key} must be a non-negative integer, got `{raw}`"))
}
