pub mod commands;
pub mod dispatch;

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "postpilot")]
#[command(version, about = "Publish media through a remote-controlled browser")]
#[command(
    long_about = "Drives a Chrome session through sign-in and the post composer, with bounded retries and guaranteed browser cleanup"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: commands::Command,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Run Chrome in headless mode")]
    pub headless: Option<bool>,

    #[arg(
        long,
        global = true,
        help = "Browser profile directory to reuse; it is never deleted (--keep-profile only affects the per-run default)"
    )]
    pub profile_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Do not delete the per-run profile directory")]
    pub keep_profile: bool,

    #[arg(long, global = true, help = "Attempts per element operation")]
    pub max_retries: Option<u32>,

    #[arg(long, global = true, help = "Delay between wait polls in milliseconds")]
    pub poll_interval_ms: Option<u64>,
}

impl Cli {
    fn overrides(&self) -> crate::config::ConfigOverrides {
        crate::config::ConfigOverrides {
            headless: self.headless,
            profile_dir: self.profile_dir.clone(),
            keep_profile: self.keep_profile,
            max_retries: self.max_retries,
            poll_interval_ms: self.poll_interval_ms,
        }
    }
}

/// Parses arguments, loads configuration and runs the command. Returns the
/// process exit code.
pub async fn run() -> crate::Result<i32> {
    let cli = Cli::parse();

    let config = if let Some(config_path) = &cli.config {
        let content = std::fs::read_to_string(config_path)?;
        toml::from_str(&content)?
    } else {
        crate::config::Config::load()?
    };

    let config = config.load_with_overrides(cli.overrides());

    dispatch::dispatch(cli, config).await
}
