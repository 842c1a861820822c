use clap::Subcommand;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[command(about = "Sign in and publish one media file")]
    Post {
        #[arg(long, env = "POSTPILOT_USERNAME", help = "Account username")]
        username: Option<String>,
        #[arg(
            long,
            env = "POSTPILOT_PASSWORD",
            hide_env_values = true,
            help = "Account password"
        )]
        password: Option<String>,
        #[arg(
            long,
            env = "POSTPILOT_MEDIA",
            help = "Local media path or shareable link (.jpg .jpeg .png .gif .mp4 .mov)"
        )]
        media: Option<String>,
        #[arg(long, env = "POSTPILOT_CAPTION", help = "Post caption")]
        caption: Option<String>,
    },

    #[command(about = "Sign in only and report whether credentials were needed")]
    Login {
        #[arg(long, env = "POSTPILOT_USERNAME", help = "Account username")]
        username: Option<String>,
        #[arg(
            long,
            env = "POSTPILOT_PASSWORD",
            hide_env_values = true,
            help = "Account password"
        )]
        password: Option<String>,
    },

    #[command(about = "Configuration management")]
    Config {
        #[command(subcommand)]
        subcommand: ConfigCommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    #[command(about = "Initialize config file with defaults")]
    Init,

    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Show config file path")]
    Path,
}
