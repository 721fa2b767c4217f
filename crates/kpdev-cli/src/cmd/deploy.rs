//! Deploy command

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use kpdev_core::Reporter;
use kpdev_core::config::ProjectConfig;
use kpdev_core::io::deploy::{DeployClient, DeployStrategy, DeploySummary};
use kpdev_core::paths::ProjectPaths;
use kpdev_schema::{BuildMode, DeployTarget};
use tracing::debug;

use super::build::run_build;

/// Flags of `kpdev deploy`.
#[derive(Debug, Clone, Default)]
pub struct DeployArgs {
    pub file: Option<PathBuf>,
    pub build: bool,
    pub mode: BuildMode,
    pub skip_bundle: bool,
    pub targets: Vec<String>,
    pub dev: bool,
    pub parallel: bool,
    pub check: bool,
}

/// Deploy a package to the selected environments.
///
/// Per-target failures are reported and the batch continues; the command
/// fails only when every target failed.
pub async fn deploy(
    paths: &ProjectPaths,
    args: &DeployArgs,
    reporter: &dyn Reporter,
) -> Result<()> {
    let config = ProjectConfig::load_project(paths).context("Failed to load project config")?;
    let targets = select_targets(&config, args)?;
    let package = resolve_package(paths, &config, args, reporter)?;

    let strategy = if args.parallel || config.deploy.concurrent {
        DeployStrategy::Concurrent
    } else {
        DeployStrategy::Sequential
    };
    debug!(?strategy, targets = targets.len(), package = %package.display(), "deploying");

    let client = DeployClient::new(config.deploy.clone())?;
    let file_name = package.file_name().map_or_else(
        || package.display().to_string(),
        |n| n.to_string_lossy().into_owned(),
    );
    reporter.section(&format!("Deploying {file_name}"));

    let summary = client
        .deploy_all(&targets, &package, strategy, reporter)
        .await?;

    if args.check {
        check_installed(&client, &targets, &summary, reporter).await;
    }

    if summary.all_failed() {
        bail!("Deployment failed on all {} target(s)", summary.outcomes.len());
    }
    Ok(())
}

/// Targets for this run: the dev environment with `--dev`, otherwise the
/// named production environments (all of them when none are named).
pub fn select_targets(config: &ProjectConfig, args: &DeployArgs) -> Result<Vec<DeployTarget>> {
    if args.dev {
        return config
            .dev_target()
            .map(|t| vec![t])
            .ok_or_else(|| anyhow!("No development environment configured (kintone.dev.domain)"));
    }

    let targets = config
        .select_prod_targets(&args.targets)
        .map_err(|unknown| anyhow!("Unknown target(s): {}", unknown.join(", ")))?;
    if targets.is_empty() {
        bail!("No production environments configured (kintone.prod)");
    }
    Ok(targets)
}

fn resolve_package(
    paths: &ProjectPaths,
    config: &ProjectConfig,
    args: &DeployArgs,
    reporter: &dyn Reporter,
) -> Result<PathBuf> {
    if let Some(file) = &args.file {
        let file = if file.is_absolute() {
            file.clone()
        } else {
            paths.root().join(file)
        };
        if !file.is_file() {
            bail!("Package not found: {}", file.display());
        }
        return Ok(file);
    }

    let existing = if args.build {
        None
    } else {
        newest_package(&paths.dist_dir())
    };
    if let Some(newest) = existing {
        reporter.info(&format!("Using {}", newest.display()));
        return Ok(newest);
    }

    let package = run_build(paths, config, args.mode, args.skip_bundle, reporter)?;
    Ok(package.path)
}

/// The most recently modified `*.zip` directly under `dist`.
pub fn newest_package(dist: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dist).ok()?;
    entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "zip"))
        .filter_map(|p| {
            let modified = p.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, p))
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)))
        .map(|(_, p)| p)
}

async fn check_installed(
    client: &DeployClient,
    targets: &[DeployTarget],
    summary: &DeploySummary,
    reporter: &dyn Reporter,
) {
    reporter.section("Checking installed plugins");
    for (target, outcome) in targets.iter().zip(&summary.outcomes) {
        let Ok(imported) = &outcome.result else {
            continue;
        };
        match client.find_plugin(target, &imported.id).await {
            Ok(Some(installed)) => reporter.success(&format!(
                "{}: {} v{}",
                target.name, installed.name, installed.version
            )),
            Ok(None) => reporter.warning(&format!(
                "{}: plugin {} is not listed",
                target.name, imported.id
            )),
            Err(e) => reporter.error(&format!("{}: {e}", target.name)),
        }
    }
}
