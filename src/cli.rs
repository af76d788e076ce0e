// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Most settings live in the TOML config file; the flags here override the
// handful that are commonly changed from one run to the next.
//
// Rust concepts:
// - Derive macros: clap generates the parser from the struct definition
// - Option<T>: a flag that wasn't given leaves the config value alone
// =============================================================================

use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "vcd",
    version = "0.1.0",
    about = "Downloads every file from your courses on a Moodle campus",
    long_about = "vcd logs in to a Moodle campus, walks every subject on your dashboard \
                  (resources, folders, forums and assignments) and mirrors their files \
                  into a local folder. Files that didn't change since the last run are \
                  not downloaded again."
)]
pub struct Cli {
    /// Path to the TOML config file (missing file = defaults)
    #[arg(long, short, default_value = "vcd.toml")]
    pub config: PathBuf,

    /// Folder where subjects are downloaded
    #[arg(long)]
    pub root_folder: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(long, short)]
    pub workers: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Give up when no item finishes for this many seconds
    #[arg(long)]
    pub idle_timeout: Option<u64>,

    /// Put each forum directly in its subject folder
    #[arg(long)]
    pub no_forums_folder: bool,

    /// Stop at the first fatal item
    #[arg(long)]
    pub fail_fast: bool,

    /// Output the summary in JSON format instead of a table
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Applies the flags that were given on top of the loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(root) = &self.root_folder {
            config.root_folder = root.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(timeout) = self.timeout {
            config.request.timeout_secs = timeout;
        }
        if let Some(idle) = self.idle_timeout {
            config.watchdog.idle_timeout_secs = Some(idle);
        }
        if self.no_forums_folder {
            config.forums_subfolder = false;
        }
        if self.fail_fast {
            config.fail_fast = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_leave_config_untouched() {
        let cli = Cli::try_parse_from(["vcd"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("vcd.toml"));

        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.workers, 50);
        assert!(config.forums_subfolder);
        assert!(!cli.json);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "vcd",
            "--root-folder",
            "/tmp/campus",
            "-w",
            "8",
            "--timeout",
            "10",
            "--idle-timeout",
            "300",
            "--no-forums-folder",
            "--json",
        ])
        .unwrap();

        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.root_folder, PathBuf::from("/tmp/campus"));
        assert_eq!(config.workers, 8);
        assert_eq!(config.request.timeout_secs, 10);
        assert_eq!(config.watchdog.idle_timeout_secs, Some(300));
        assert!(!config.forums_subfolder);
        assert!(cli.json);
    }
}
