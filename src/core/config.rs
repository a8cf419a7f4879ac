use anyhow::{Context, Result};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

/// Indices processed when neither the config nor the command line names any.
pub const DEFAULT_INDICES: [&str; 5] = [
    "NIFTY MIDCAP 150",
    "NIFTY LARGEMID250",
    "NIFTY 50",
    "NIFTY SMALLCAP 250",
    "NIFTY NEXT 50",
];

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NiftyProviderConfig {
    pub history_base_url: String,
    pub live_base_url: String,
}

impl Default for NiftyProviderConfig {
    fn default() -> Self {
        NiftyProviderConfig {
            history_base_url: "https://www.niftyindices.com".to_string(),
            live_base_url: "https://iislliveblob.niftyindices.com".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub nifty: Option<NiftyProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            nifty: Some(NiftyProviderConfig::default()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SupabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        SupabaseConfig {
            url: None,
            key: None,
            table: default_table(),
        }
    }
}

/// Fully resolved connection settings for the hosted store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseSettings {
    pub url: String,
    pub key: String,
    pub table: String,
}

impl SupabaseConfig {
    /// Resolves settings, preferring `SUPABASE_URL` and
    /// `SUPABASE_SERVICE_ROLE_KEY` (or `SUPABASE_KEY`) from the environment.
    pub fn resolve(&self) -> Result<SupabaseSettings> {
        self.resolve_with(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
    }

    fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<SupabaseSettings> {
        let url = env("SUPABASE_URL")
            .or_else(|| self.url.clone())
            .context("Supabase URL not configured (set SUPABASE_URL or store.url)")?;
        let key = env("SUPABASE_SERVICE_ROLE_KEY")
            .or_else(|| env("SUPABASE_KEY"))
            .or_else(|| self.key.clone())
            .context("Supabase key not configured (set SUPABASE_SERVICE_ROLE_KEY or store.key)")?;
        Ok(SupabaseSettings {
            url,
            key,
            table: self.table.clone(),
        })
    }
}

fn default_table() -> String {
    "index_ind".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    Local {
        #[serde(default)]
        path: Option<String>,
    },
    Supabase(SupabaseConfig),
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Local { path: None }
    }
}

fn default_indices() -> Vec<String> {
    DEFAULT_INDICES.iter().map(|s| s.to_string()).collect()
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn default_batch_size() -> usize {
    100
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_indices")]
    pub indices: Vec<String>,
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            indices: default_indices(),
            start_date: default_start_date(),
            batch_size: default_batch_size(),
            providers: ProvidersConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads `path` when given; otherwise the default config file if present,
    /// falling back to built-in defaults.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }
        let default_path = Self::default_config_path()?;
        if default_path.exists() {
            Self::load_from_path(&default_path)
        } else {
            debug!("No config at {}, using defaults", default_path.display());
            Ok(Self::default())
        }
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "idxsync", "idxsync")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "idxsync", "idxsync")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn nifty(&self) -> NiftyProviderConfig {
        self.providers.nifty.clone().unwrap_or_default()
    }
}
