// ABOUTME: Command-line interface definitions using clap
// ABOUTME: Defines the sync and convert subcommands and global flags

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "inkpost")]
#[command(
    about = "Mirror an Evernote notebook into a local cache and publish it as Jekyll posts",
    long_about = "Run from your Jekyll root. `sync` refreshes the note cache, `convert` writes posts, pages and resources."
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file
    #[arg(long, global = true, default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Developer token (overrides env and config)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Hide progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Sync the local cache with the configured notebook
    Sync {
        /// Ignore the unchanged/throttle check
        #[arg(long)]
        force: bool,

        /// Disable the randomized delay between API requests
        #[arg(long)]
        no_throttle: bool,

        /// Throttle range in ms (min:max)
        #[arg(long, value_parser = parse_throttle_range)]
        throttle_ms: Option<(u64, u64)>,
    },

    /// Convert the local cache into post, page and resource files
    Convert {
        /// Only overwrite; keep files of notes that no longer exist
        #[arg(long)]
        incremental: bool,
    },
}

fn parse_throttle_range(s: &str) -> Result<(u64, u64), String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err("Expected format: min:max".into());
    }

    let min = parts[0].parse().map_err(|_| "Invalid min value")?;
    let max = parts[1].parse().map_err(|_| "Invalid max value")?;

    if min > max {
        return Err("min must be <= max".into());
    }

    Ok((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_throttle_range_valid() {
        let result = parse_throttle_range("100:300").unwrap();
        assert_eq!(result, (100, 300));
    }

    #[test]
    fn test_parse_throttle_range_invalid() {
        assert!(parse_throttle_range("300:100").is_err());
        assert!(parse_throttle_range("abc:def").is_err());
        assert!(parse_throttle_range("100").is_err());
    }

    #[test]
    fn test_parse_sync_command() {
        let cli = Cli::try_parse_from(["inkpost", "sync", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::Sync { force: true, .. }));
        assert_eq!(cli.config, PathBuf::from("_evernote.yml"));
    }

    #[test]
    fn test_parse_convert_command_with_globals() {
        let cli =
            Cli::try_parse_from(["inkpost", "convert", "--incremental", "--config", "site.yml", "-v"])
                .unwrap();
        assert!(matches!(cli.command, Commands::Convert { incremental: true }));
        assert_eq!(cli.config, PathBuf::from("site.yml"));
        assert!(cli.verbose);
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["inkpost"]).is_err());
    }
}
