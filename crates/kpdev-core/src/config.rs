//! Project configuration (`.kpdev/config.json`).
//!
//! Credentials may live in the file, but values from the environment always
//! win. A `<project>/.env` file fills in variables the process environment
//! does not set:
//!
//! | Variable | Applies to |
//! |---|---|
//! | `KPDEV_USERNAME` / `KPDEV_PASSWORD` | development environment |
//! | `KPDEV_PROD_<NAME>_USERNAME` / `_PASSWORD` | production target `<NAME>` |
//!
//! `<NAME>` is the target name uppercased with every non-alphanumeric
//! character replaced by `_` (`staging-eu` -> `STAGING_EU`).
//!
//! The configuration is read-only here; merged credentials are never
//! written back.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kpdev_schema::{Credentials, DeployTarget, Targets};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::paths::ProjectPaths;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_UPLOAD_PATH: &str = "/k/v1/file.json";
pub const DEFAULT_IMPORT_PATH: &str = "/k/api/dev/plugin/import.json";
pub const DEFAULT_PLUGINS_PATH: &str = "/k/v1/plugins.json";

const DEV_USERNAME_ENV: &str = "KPDEV_USERNAME";
const DEV_PASSWORD_ENV: &str = "KPDEV_PASSWORD";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Contents of `.kpdev/config.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default)]
    pub kintone: KintoneConfig,
    #[serde(default)]
    pub targets: Targets,
    #[serde(default)]
    pub deploy: DeploySettings,
    /// Keys owned by other tooling (dev server, package manager).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KintoneConfig {
    #[serde(default)]
    pub dev: DevEnvironment,
    #[serde(default)]
    pub prod: Vec<ProdEnvironment>,
}

/// The development environment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DevEnvironment {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub auth: Credentials,
}

/// A named production environment.
#[derive(Debug, Clone, Deserialize)]
pub struct ProdEnvironment {
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub auth: Credentials,
}

/// HTTP deployment settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploySettings {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    pub upload_path: String,
    pub import_path: String,
    pub plugins_path: String,
    /// Deploy to all targets at once instead of one after another.
    pub concurrent: bool,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            upload_path: DEFAULT_UPLOAD_PATH.to_string(),
            import_path: DEFAULT_IMPORT_PATH.to_string(),
            plugins_path: DEFAULT_PLUGINS_PATH.to_string(),
            concurrent: false,
        }
    }
}

impl DeploySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ProjectConfig {
    /// Read the config file without environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read the project's config and apply credential overrides from the
    /// process environment, then from the project's `.env` file.
    pub fn load_project(paths: &ProjectPaths) -> Result<Self, ConfigError> {
        let mut config = Self::load(&paths.config_file())?;
        let dotenv = read_dotenv(&paths.dotenv_file());
        config.apply_env_from(|key| layered_lookup(key, &dotenv));
        Ok(config)
    }

    /// Apply overrides from `lookup`. Empty values are ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        override_credentials(
            &mut self.kintone.dev.auth,
            get(DEV_USERNAME_ENV),
            get(DEV_PASSWORD_ENV),
        );

        for env in &mut self.kintone.prod {
            let prefix = prod_env_prefix(&env.name);
            let user = get(&format!("{prefix}_USERNAME"));
            let pass = get(&format!("{prefix}_PASSWORD"));
            if user.is_some() || pass.is_some() {
                debug!(target_name = %env.name, "credentials overridden from environment");
            }
            override_credentials(&mut env.auth, user, pass);
        }
    }

    /// Production deploy targets in file order.
    pub fn prod_targets(&self) -> Vec<DeployTarget> {
        self.kintone
            .prod
            .iter()
            .map(|env| DeployTarget::new(&env.name, &env.domain, usable(&env.auth)))
            .collect()
    }

    /// The development environment as a deploy target, if a domain is set.
    pub fn dev_target(&self) -> Option<DeployTarget> {
        let dev = &self.kintone.dev;
        (!dev.domain.trim().is_empty())
            .then(|| DeployTarget::new("dev", &dev.domain, usable(&dev.auth)))
    }

    /// Production targets whose names are in `names`; all of them when
    /// `names` is empty. Unknown names are returned as the error value.
    pub fn select_prod_targets(&self, names: &[String]) -> Result<Vec<DeployTarget>, Vec<String>> {
        let all = self.prod_targets();
        if names.is_empty() {
            return Ok(all);
        }

        let unknown: Vec<String> = names
            .iter()
            .filter(|n| !all.iter().any(|t| &t.name == *n))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(unknown);
        }

        Ok(all
            .into_iter()
            .filter(|t| names.iter().any(|n| n == &t.name))
            .collect())
    }
}

fn usable(auth: &Credentials) -> Option<Credentials> {
    auth.is_complete().then(|| auth.clone())
}

fn override_credentials(auth: &mut Credentials, user: Option<String>, pass: Option<String>) {
    if let Some(user) = user {
        auth.username = user;
    }
    if let Some(pass) = pass {
        auth.password = pass;
    }
}

/// `KPDEV_PROD_<NAME>` for a production target name.
pub fn prod_env_prefix(name: &str) -> String {
    let normalized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("KPDEV_PROD_{normalized}")
}

/// Variables from a dotenv file. A missing file is empty; malformed lines
/// are skipped with a warning.
pub fn read_dotenv(path: &Path) -> HashMap<String, String> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => return HashMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable .env");
            return HashMap::new();
        }
    };

    iter.filter_map(|item| match item {
        Ok(pair) => Some(pair),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping malformed .env line");
            None
        }
    })
    .collect()
}

/// Process environment first, dotenv values for whatever it leaves unset.
fn layered_lookup(key: &str, dotenv: &HashMap<String, String>) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| dotenv.get(key).cloned())
}
