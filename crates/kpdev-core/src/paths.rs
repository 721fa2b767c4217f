//! On-disk project layout.
//!
//! ```text
//! <project>/
//! ├── .kpdev/
//! │   ├── config.json        # environments, targets, deploy settings
//! │   ├── manifest.json      # source manifest (edited by the developer)
//! │   ├── vite.config.ts     # bundler config (generated elsewhere)
//! │   └── keys/
//! │       ├── private.dev.ppk
//! │       └── private.prod.ppk
//! ├── src/config/index.html  # config screen markup
//! ├── .env                   # optional credential variables
//! ├── icon.png
//! └── dist/                  # bundler output and final packages
//! ```

use kpdev_schema::LifecycleStage;
use std::path::{Path, PathBuf};

/// Name of the per-project tool directory.
pub const CONFIG_DIR: &str = ".kpdev";

/// Private key file for development builds.
pub const DEV_KEY_FILE: &str = "private.dev.ppk";

/// Private key file for production builds.
pub const PROD_KEY_FILE: &str = "private.prod.ppk";

/// Resolved paths for one project root.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    /// Layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `.kpdev/`
    pub fn config_dir(&self) -> PathBuf {
        self.root.join(CONFIG_DIR)
    }

    /// `.kpdev/config.json`
    pub fn config_file(&self) -> PathBuf {
        self.config_dir().join("config.json")
    }

    /// `.kpdev/manifest.json`
    pub fn source_manifest(&self) -> PathBuf {
        self.config_dir().join("manifest.json")
    }

    /// `.kpdev/vite.config.ts`
    pub fn bundler_config(&self) -> PathBuf {
        self.config_dir().join("vite.config.ts")
    }

    /// `.kpdev/keys/`
    pub fn keys_dir(&self) -> PathBuf {
        self.config_dir().join("keys")
    }

    /// Private key path for a lifecycle stage.
    pub fn key_path(&self, stage: LifecycleStage) -> PathBuf {
        let file = match stage {
            LifecycleStage::Development => DEV_KEY_FILE,
            LifecycleStage::Production => PROD_KEY_FILE,
        };
        self.keys_dir().join(file)
    }

    /// `.env`
    pub fn dotenv_file(&self) -> PathBuf {
        self.root.join(".env")
    }

    /// `dist/`
    pub fn dist_dir(&self) -> PathBuf {
        self.root.join("dist")
    }

    /// `icon.png`
    pub fn icon(&self) -> PathBuf {
        self.root.join("icon.png")
    }

    /// `src/config/index.html`
    pub fn config_html(&self) -> PathBuf {
        self.root.join("src").join("config").join("index.html")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_paths_are_per_stage() {
        let p = ProjectPaths::new("/work/app");
        assert_eq!(
            p.key_path(LifecycleStage::Development),
            Path::new("/work/app/.kpdev/keys/private.dev.ppk")
        );
        assert_eq!(
            p.key_path(LifecycleStage::Production),
            Path::new("/work/app/.kpdev/keys/private.prod.ppk")
        );
    }
}
