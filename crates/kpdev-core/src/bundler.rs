//! External bundler invocation.
//!
//! The JavaScript bundler is an external collaborator: it compiles the
//! project's sources into `dist/main.js` and `dist/config.js` (plus optional
//! stylesheets). This module only decides how to call it.

use std::path::PathBuf;
use std::process::Command;

use kpdev_schema::BuildMode;
use thiserror::Error;
use tracing::{debug, info};

use crate::paths::ProjectPaths;

/// Environment variable selecting which entry the bundler config builds.
pub const ENTRY_ENV: &str = "VITE_BUILD_ENTRY";

/// Environment variable telling the bundler config to strip `console.*`.
pub const DROP_CONSOLE_ENV: &str = "KPDEV_DROP_CONSOLE";

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Bundler executable '{program}' not found on PATH: {source}")]
    ToolNotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("Bundler config not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Failed to start bundler: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Bundler failed for entry '{entry}' ({status})\n{output}")]
    Failed {
        entry: &'static str,
        status: std::process::ExitStatus,
        output: String,
    },
}

/// One bundler entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleEntry {
    /// Record-screen script (`dist/main.js`).
    Main,
    /// Plugin settings screen (`dist/config.js`).
    Config,
}

impl BundleEntry {
    /// Both entries, in build order.
    pub const ALL: [BundleEntry; 2] = [BundleEntry::Main, BundleEntry::Config];

    /// Value passed in [`ENTRY_ENV`].
    pub fn as_str(self) -> &'static str {
        match self {
            BundleEntry::Main => "main",
            BundleEntry::Config => "config",
        }
    }
}

/// Something that can produce the bundle for one entry.
pub trait Bundler {
    /// Build `entry` with the options `mode` implies.
    fn bundle(&self, entry: BundleEntry, mode: BuildMode) -> Result<(), BundleError>;

    /// Build every entry.
    fn bundle_all(&self, mode: BuildMode) -> Result<(), BundleError> {
        for entry in BundleEntry::ALL {
            self.bundle(entry, mode)?;
        }
        Ok(())
    }
}

/// Runs `npx vite build --config .kpdev/vite.config.ts` in the project root.
#[derive(Debug, Clone)]
pub struct ViteBundler {
    program: PathBuf,
    project_root: PathBuf,
    config: PathBuf,
}

impl ViteBundler {
    /// Resolve `npx` on `PATH` for the project at `paths`.
    pub fn locate(paths: &ProjectPaths) -> Result<Self, BundleError> {
        let program = which::which("npx").map_err(|source| BundleError::ToolNotFound {
            program: "npx".into(),
            source,
        })?;
        Self::with_program(program, paths)
    }

    /// Use an explicit launcher instead of `npx`.
    pub fn with_program(program: impl Into<PathBuf>, paths: &ProjectPaths) -> Result<Self, BundleError> {
        let config = paths.bundler_config();
        if !config.is_file() {
            return Err(BundleError::ConfigNotFound(config));
        }
        Ok(Self {
            program: program.into(),
            project_root: paths.root().to_path_buf(),
            config,
        })
    }

    /// The command that builds `entry`.
    pub fn command(&self, entry: BundleEntry, mode: BuildMode) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("vite")
            .arg("build")
            .arg("--config")
            .arg(&self.config)
            .current_dir(&self.project_root)
            .env(ENTRY_ENV, entry.as_str())
            .env(DROP_CONSOLE_ENV, if mode.drop_console() { "true" } else { "false" });

        if !mode.minify() {
            cmd.arg("--minify").arg("false");
        }
        cmd
    }
}

impl Bundler for ViteBundler {
    fn bundle(&self, entry: BundleEntry, mode: BuildMode) -> Result<(), BundleError> {
        let mut cmd = self.command(entry, mode);
        debug!(?cmd, "running bundler");

        let output = cmd.output().map_err(BundleError::Spawn)?;
        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(BundleError::Failed {
                entry: entry.as_str(),
                status: output.status,
                output: text.trim_end().to_string(),
            });
        }

        info!(entry = entry.as_str(), mode = %mode, "bundle built");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn project() -> (TempDir, ProjectPaths) {
        let dir = TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path());
        std::fs::create_dir_all(paths.config_dir()).unwrap();
        std::fs::write(paths.bundler_config(), "export default {}").unwrap();
        (dir, paths)
    }

    fn env_of<'a>(cmd: &'a Command, key: &str) -> Option<&'a OsStr> {
        cmd.get_envs()
            .find(|(k, _)| *k == OsStr::new(key))
            .and_then(|(_, v)| v)
    }

    #[test]
    fn test_production_command_minifies() {
        let (_tmp, paths) = project();
        let vite = ViteBundler::with_program("npx", &paths).unwrap();
        let cmd = vite.command(BundleEntry::Main, BuildMode::Production);

        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args[..3], [OsStr::new("vite"), OsStr::new("build"), OsStr::new("--config")]);
        assert!(!args.contains(&OsStr::new("--minify")));
        assert_eq!(env_of(&cmd, ENTRY_ENV), Some(OsStr::new("main")));
        assert_eq!(env_of(&cmd, DROP_CONSOLE_ENV), Some(OsStr::new("true")));
        assert_eq!(cmd.get_current_dir(), Some(paths.root()));
    }

    #[test]
    fn test_prerelease_command_keeps_output_readable() {
        let (_tmp, paths) = project();
        let vite = ViteBundler::with_program("npx", &paths).unwrap();
        let cmd = vite.command(BundleEntry::Config, BuildMode::PreRelease);

        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args[args.len() - 2..], [OsStr::new("--minify"), OsStr::new("false")]);
        assert_eq!(env_of(&cmd, ENTRY_ENV), Some(OsStr::new("config")));
        assert_eq!(env_of(&cmd, DROP_CONSOLE_ENV), Some(OsStr::new("false")));
    }

    #[test]
    fn test_missing_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path());
        let err = ViteBundler::with_program("npx", &paths).unwrap_err();
        assert!(matches!(err, BundleError::ConfigNotFound(_)));
    }

    #[test]
    fn test_bundle_all_runs_main_then_config() {
        struct Recorder(Mutex<Vec<BundleEntry>>);
        impl Bundler for Recorder {
            fn bundle(&self, entry: BundleEntry, _: BuildMode) -> Result<(), BundleError> {
                self.0.lock().unwrap().push(entry);
                Ok(())
            }
        }

        let rec = Recorder(Mutex::new(Vec::new()));
        rec.bundle_all(BuildMode::Production).unwrap();
        assert_eq!(
            *rec.0.lock().unwrap(),
            vec![BundleEntry::Main, BundleEntry::Config]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_script_bundler_writes_entry_and_reports_failure() {
        use std::os::unix::fs::PermissionsExt;

        let (tmp, paths) = project();
        let script = tmp.path().join("fake-npx");
        std::fs::write(
            &script,
            "#!/bin/sh\nmkdir -p dist\n[ \"$VITE_BUILD_ENTRY\" = config ] && { echo boom >&2; exit 3; }\necho built > \"dist/$VITE_BUILD_ENTRY.js\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let vite = ViteBundler::with_program(&script, &paths).unwrap();
        vite.bundle(BundleEntry::Main, BuildMode::Production).unwrap();
        assert!(paths.dist_dir().join("main.js").is_file());

        let err = vite.bundle_all(BuildMode::Production).unwrap_err();
        match err {
            BundleError::Failed { entry, output, .. } => {
                assert_eq!(entry, "config");
                assert_eq!(output, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
