use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use homedir::my_home;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.yaml";

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CACHE_FILE: &str = "scores.csv";
const USER_AGENT_DEFAULT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

/// Settings for the http retriever
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Proxy url applied to every request (http, https or socks5)
    #[serde(default)]
    pub proxy: Option<String>,

    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Extra attempts after a network error, 429 or 5xx
    #[serde(default)]
    pub retries: u8,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: USER_AGENT_DEFAULT.to_string(),
            proxy: None,
            accept_invalid_certs: false,
            retries: 0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Score store file, relative to the base directory
    #[serde(default = "default_cache_file")]
    pub file: String,

    /// Sort the two identifiers before touching the store so that (a, b)
    /// and (b, a) share one record.
    #[serde(default)]
    pub canonical_keys: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            file: DEFAULT_CACHE_FILE.to_string(),
            canonical_keys: false,
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    USER_AGENT_DEFAULT.to_string()
}

fn default_cache_file() -> String {
    DEFAULT_CACHE_FILE.to_string()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        if self.fetch.timeout_secs == 0 {
            bail!("fetch.timeout_secs must be greater than 0");
        }

        if self.cache.file.trim().is_empty() {
            bail!("cache.file must not be empty");
        }

        Ok(())
    }

    /// Base directory from `SITESIM_BASE_PATH`, or `~/.local/share/sitesim`.
    pub fn default_base_path() -> anyhow::Result<PathBuf> {
        if let Ok(base_path) = std::env::var("SITESIM_BASE_PATH") {
            return Ok(PathBuf::from(base_path));
        }

        let home = my_home()
            .context("could not determine home directory")?
            .context("home directory path is empty")?;
        Ok(home.join(".local/share/sitesim"))
    }

    /// Load `config.yaml` from `base_path`, writing the defaults first when
    /// the file does not exist.
    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(base_path)
            .with_context(|| format!("failed to create {}", base_path.display()))?;

        let config_path = base_path.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            log::info!("Creating default config at {}", config_path.display());
            std::fs::write(&config_path, serde_yml::to_string(&Self::default())?)?;
        }

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = self.base_path.join(CONFIG_FILE_NAME);
        let temp_path = self.base_path.join(format!("{CONFIG_FILE_NAME}-tmp"));

        std::fs::write(&temp_path, serde_yml::to_string(&self)?)?;
        std::fs::rename(&temp_path, &config_path)?;
        Ok(())
    }

    pub fn cache_path(&self) -> PathBuf {
        self.base_path.join(&self.cache.file)
    }
}
