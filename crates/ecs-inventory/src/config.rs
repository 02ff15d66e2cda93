//! Application configuration
//!
//! Sources, lowest precedence first:
//! - built-in defaults
//! - the first YAML file found of `./.ecs-inventory.yaml`, `./.ecs-inventory/config.yaml`,
//!   `~/.ecs-inventory.yaml`, `$XDG_CONFIG_HOME/ecs-inventory/config.yaml`
//!   (`~/.config` when unset), then `ecs-inventory/config.yaml` under each of
//!   `$XDG_CONFIG_DIRS` (`/etc/xdg` when unset), or exactly the `--config` path
//! - environment variables prefixed with `ECS_INVENTORY_`, `__` separating nested keys
//!   (e.g. `ECS_INVENTORY_ANCHORE__URL`)
//! - command line flags

use crate::Cli;
use anyhow::{bail, Context, Result};
use config::{Environment, File, FileFormat};
use inventory_lib::inventory::CollectorConfig;
use inventory_lib::observability::LogSettings;
use inventory_lib::{AnchoreInfo, DispatchOptions};
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "ecs-inventory";
const ENV_PREFIX: &str = "ECS_INVENTORY";

/// Default seconds between inventory runs
const DEFAULT_POLLING_INTERVAL_SECONDS: u64 = 300;

/// All application settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AppConfig {
    pub log: LoggingConfig,

    /// AWS region; the SDK default chain is used when unset
    pub region: Option<String>,

    /// Seconds between runs, 0 runs once and exits
    #[serde(alias = "polling_interval_seconds")]
    pub polling_interval_seconds: u64,

    /// Clusters processed concurrently
    #[serde(alias = "max_concurrent_clusters")]
    pub max_concurrent_clusters: usize,

    /// Do not print reports to stdout
    pub quiet: bool,

    /// Do not deliver reports to Anchore
    #[serde(alias = "dry_run")]
    pub dry_run: bool,

    /// Include task and service metadata in reports
    pub metadata: bool,

    pub anchore: AnchoreInfo,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level; derived from `-v` when empty
    pub level: String,
    /// Log file path; stderr when empty
    pub file: String,
    /// Emit JSON log lines
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log: LoggingConfig::default(),
            region: None,
            polling_interval_seconds: DEFAULT_POLLING_INTERVAL_SECONDS,
            max_concurrent_clusters: CollectorConfig::default().max_concurrent_clusters,
            quiet: false,
            dry_run: false,
            metadata: false,
            anchore: AnchoreInfo::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files, environment and command line
    pub fn load(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                if !path.is_file() {
                    bail!("unable to read config file: {}", path.display());
                }
                Some(path.clone())
            }
            None => find_config_file(&default_search_paths()),
        };

        let mut builder = config::Config::builder();
        if let Some(path) = &file {
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Yaml));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: AppConfig = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config.apply_cli(cli);
        config.resolve_log_level(cli.verbose)?;

        if config.max_concurrent_clusters == 0 {
            bail!("max-concurrent-clusters must be at least 1");
        }

        Ok(config)
    }

    /// Command line flags override every other source
    fn apply_cli(&mut self, cli: &Cli) {
        if cli.quiet {
            self.quiet = true;
        }
        if cli.dry_run {
            self.dry_run = true;
        }
        if cli.metadata {
            self.metadata = true;
        }
        if let Some(region) = &cli.region {
            self.region = Some(region.clone());
        }
        if let Some(secs) = cli.polling_interval_seconds {
            self.polling_interval_seconds = secs;
        }
        if let Some(limit) = cli.max_concurrent_clusters {
            self.max_concurrent_clusters = limit;
        }
        if let Some(url) = &cli.anchore_url {
            self.anchore.url = url.clone();
        }
        if let Some(user) = &cli.anchore_user {
            self.anchore.user = user.clone();
        }
        if let Some(password) = &cli.anchore_password {
            self.anchore.password = password.clone();
        }
        if let Some(account) = &cli.anchore_account {
            self.anchore.account = account.clone();
        }
    }

    /// Derive the log level from `-v` unless one was configured explicitly
    fn resolve_log_level(&mut self, verbosity: u8) -> Result<()> {
        if !self.log.level.is_empty() {
            if verbosity > 0 {
                bail!("cannot explicitly set log level (cfg file or env var) and use -v flag together");
            }
            return Ok(());
        }

        self.log.level = match verbosity {
            0 => "error",
            1 => "info",
            _ => "debug",
        }
        .to_string();
        Ok(())
    }

    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            level: self.log.level.clone(),
            file: Some(self.log.file.clone()).filter(|f| !f.is_empty()),
            json: self.log.json,
        }
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            quiet: self.quiet,
            dry_run: self.dry_run,
        }
    }
}

/// Candidate config files in search order
fn default_search_paths() -> Vec<PathBuf> {
    let home = dirs_next::home_dir();
    let config_home = xdg_config_home(home.as_deref(), std::env::var_os("XDG_CONFIG_HOME"));
    let config_dirs = xdg_config_dirs(std::env::var_os("XDG_CONFIG_DIRS"));

    search_paths(Path::new("."), home, config_home, config_dirs)
}

/// `$XDG_CONFIG_HOME`, falling back to `~/.config` on every platform
fn xdg_config_home(home: Option<&Path>, var: Option<OsString>) -> Option<PathBuf> {
    match var.filter(|v| !v.is_empty()) {
        Some(dir) => Some(PathBuf::from(dir)),
        None => home.map(|h| h.join(".config")),
    }
}

/// `$XDG_CONFIG_DIRS`, falling back to `/etc/xdg`
fn xdg_config_dirs(var: Option<OsString>) -> Vec<PathBuf> {
    let dirs: Vec<PathBuf> = var
        .map(|v| std::env::split_paths(&v).filter(|p| !p.as_os_str().is_empty()).collect())
        .unwrap_or_default();

    if dirs.is_empty() {
        vec![PathBuf::from("/etc/xdg")]
    } else {
        dirs
    }
}

fn search_paths(
    cwd: &Path,
    home: Option<PathBuf>,
    config_home: Option<PathBuf>,
    config_dirs: Vec<PathBuf>,
) -> Vec<PathBuf> {
    let mut paths = vec![
        cwd.join(format!(".{APP_NAME}.yaml")),
        cwd.join(format!(".{APP_NAME}")).join("config.yaml"),
    ];
    if let Some(home) = home {
        paths.push(home.join(format!(".{APP_NAME}.yaml")));
    }
    paths.extend(
        config_home
            .into_iter()
            .chain(config_dirs)
            .map(|dir| dir.join(APP_NAME).join("config.yaml")),
    );
    paths
}

fn find_config_file(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.is_file()).cloned()
}
