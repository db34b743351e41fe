use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use time::UtcOffset;

use crate::dashboard::DEFAULT_TREND_DAYS;
use crate::timestamp::parse_zone;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Postdash";
const APP_NAME: &str = "postdash";

const MAX_TREND_DAYS: u16 = 366;
const DEFAULT_INTERVAL_SECS: u64 = 30;

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load();
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load();
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    /// Default location of the posts export read by the CLI.
    pub posts_file: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("POSTDASH_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("POSTDASH_DATA").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_dir = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let posts_file = data_dir.join("posts.json");

        Ok(Self {
            config_dir,
            config_file,
            data_dir,
            posts_file,
        })
    }

    /// Layout rooted at a single directory, used by tests and portable setups.
    pub fn rooted_at(root: &Path) -> Self {
        let config_dir = root.join("config");
        let data_dir = root.join("data");
        Self {
            config_file: config_dir.join("config.toml"),
            posts_file: data_dir.join("posts.json"),
            config_dir,
            data_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub display: DisplayOptions,
    pub dashboard: DashboardOptions,
    pub watch: WatchOptions,
}

impl AppConfig {
    fn post_load(&mut self) {
        if let Err(err) = parse_zone(&self.display.zone) {
            tracing::warn!(%err, "invalid display zone in config, falling back to UTC");
            self.display.zone = "UTC".to_string();
        }
        if self.dashboard.trend_days == 0 || self.dashboard.trend_days > MAX_TREND_DAYS {
            tracing::warn!(
                trend_days = self.dashboard.trend_days,
                "trend_days out of range in config, falling back to {DEFAULT_TREND_DAYS}"
            );
            self.dashboard.trend_days = DEFAULT_TREND_DAYS;
        }
        if self.watch.interval_secs == 0 {
            tracing::warn!("watch interval of 0s in config, falling back to {DEFAULT_INTERVAL_SECS}s");
            self.watch.interval_secs = DEFAULT_INTERVAL_SECS;
        }
    }

    /// Zone used for calendar days and wall-clock rendering.
    pub fn zone(&self) -> UtcOffset {
        parse_zone(&self.display.zone).unwrap_or(UtcOffset::UTC)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    /// Fixed UTC offset such as `+07:00`, or `UTC`.
    pub zone: String,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            zone: "+07:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardOptions {
    pub trend_days: u16,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            trend_days: DEFAULT_TREND_DAYS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    pub interval_secs: u64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

impl WatchOptions {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
