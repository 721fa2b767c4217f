//! kpdev - kintone plugin build and deploy CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kpdev_cli::cmd;
use kpdev_cli::cmd::deploy::DeployArgs;
use kpdev_cli::ui::ConsoleReporter;
use kpdev_cli::{Cli, Commands, ProjectPaths};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = ProjectPaths::new(&cli.project_dir);
    let reporter = ConsoleReporter::stdout(cli.quiet);

    match cli.command {
        Commands::Build { mode, skip_bundle } => {
            cmd::build::build(&paths, mode, skip_bundle, &reporter)
        }
        Commands::Deploy {
            file,
            build,
            mode,
            skip_bundle,
            targets,
            dev,
            parallel,
            check,
        } => {
            let args = DeployArgs {
                file,
                build,
                mode,
                skip_bundle,
                targets,
                dev,
                parallel,
                check,
            };
            cmd::deploy::deploy(&paths, &args, &reporter).await
        }
        Commands::Keys => cmd::keys::keys(&paths),
        Commands::Verify { path } => cmd::verify::verify(&path),
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}
