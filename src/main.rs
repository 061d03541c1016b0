// ABOUTME: CLI entrypoint for inkpost command
// ABOUTME: Handles logging setup, error exit codes, and command dispatch

use clap::Parser;
use inkpost::{
    api::ApiClient,
    auth::credentials,
    cli::{Cli, Commands},
    config::Config,
    convert::convert_all,
    publish::PublishMode,
    storage::CacheStore,
    sync::sync_notebook,
    Error, Result,
};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let code = e.exit_code();
            eprintln!("inkpost: [E{}] {:#}", code, anyhow::Error::new(e));
            std::process::exit(code);
        }
    }
}

/// Returns the process exit code for runs that finished with per-note failures.
fn run(cli: Cli) -> Result<i32> {
    let config = Config::load(&cli.config)?;
    let cache = CacheStore::new(&config.cache_root);

    match cli.command {
        Commands::Sync {
            force,
            no_throttle,
            throttle_ms,
        } => {
            let credentials = credentials(&config, cli.token)?;
            let mut client = ApiClient::authenticate(&credentials, config.api_base.clone())?;

            if no_throttle {
                client = client.disable_throttle();
            } else if let Some((min, max)) = throttle_ms {
                client = client.with_throttle(min, max);
            }

            let mut options = config.sync_options();
            options.force = force;
            options.show_progress = !cli.quiet;

            let report = sync_notebook(&client, &cache, &options)?;
            if report.is_empty() {
                println!("Cache is up to date");
            } else {
                println!(
                    "Synced notebook {:?}: {} updated, {} removed, {} resources fetched, {} pruned",
                    options.notebook_name,
                    report.updated.len(),
                    report.removed.len(),
                    report.fetched_resources.len(),
                    report.pruned_resources.len()
                );
            }
        }
        Commands::Convert { incremental } => {
            let mode = if incremental {
                PublishMode::Incremental
            } else {
                PublishMode::Clean
            };
            let publisher = config.publisher(mode);
            let report = convert_all(&cache, &publisher, &config.convert_options())?;

            println!(
                "Wrote {} notes, copied {} resources ({} skipped, {} failed)",
                report.written.len(),
                report.copied_resources,
                report.skipped.len(),
                report.failed.len()
            );

            let code = report.failed.first().map_or(0, Error::exit_code);
            for e in report.failed {
                eprintln!("inkpost: [E{}] {:#}", e.exit_code(), anyhow::Error::new(e));
            }
            return Ok(code);
        }
    }

    Ok(0)
}
