use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Answer unrouted paths with a plain-text echo of the request. Enabling
    /// this restores the legacy server's catch-all responder; when off,
    /// unrouted paths get 404.
    #[serde(default)]
    pub echo_fallback: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MirrorConfig {
    /// Mirror root directory; release files live under `<root>/packages/`
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Metadata database, `<root>/pypi.db` when unset
    #[serde(default)]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_root() -> PathBuf {
    PathBuf::from("~/data/pypi")
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            echo_fallback: false,
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            database: None,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_metrics_path(),
        }
    }
}

impl MirrorConfig {
    /// Mirror root with a leading `~` expanded
    pub fn root_path(&self) -> PathBuf {
        expand_home(&self.root)
    }

    /// Metadata database path, defaulting to `pypi.db` inside the mirror root
    pub fn database_path(&self) -> PathBuf {
        match &self.database {
            Some(path) => expand_home(path),
            None => self.root_path().join("pypi.db"),
        }
    }
}

/// Expand `~` and `~/...` to the current user's home directory.
/// Paths like `/a/~/b` are left alone.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
    if rest.as_os_str().is_empty() {
        home
    } else {
        home.join(rest)
    }
}

impl Config {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Add config file sources in order of precedence (lower to higher)
        if config_path.is_none() {
            // Release builds: look in /etc/pypi-mirror/
            #[cfg(not(debug_assertions))]
            {
                builder = builder.add_source(
                    config::File::with_name("/etc/pypi-mirror/config").required(false),
                );
            }

            // Debug builds: look in current working directory
            #[cfg(debug_assertions)]
            {
                builder = builder.add_source(config::File::with_name("config").required(false));
            }
        }

        // Custom config path (if specified via --config)
        if let Some(path) = config_path {
            builder = builder.add_source(
                config::File::with_name(path)
                    .required(true)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment variables (highest precedence), e.g. PYPI_MIRROR_SERVER__PORT
        builder = builder.add_source(
            config::Environment::with_prefix("PYPI_MIRROR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(|e| Error::Config {
            msg: format!("Failed to load configuration: {}", e),
        })?;

        config.try_deserialize().map_err(|e| Error::Config {
            msg: format!("Failed to deserialize configuration: {}", e),
        })
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            mirror: MirrorConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}
