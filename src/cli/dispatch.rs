use super::{
    Cli,
    commands::{Command, ConfigCommand},
};
use crate::{
    Result,
    config::Config,
    driver::ChromeLauncher,
    handlers,
    outcome::Outcome,
    output::{self, Report},
    runner::{LocalOnly, LoginRequest, PostRequest, Runner},
    transfer::DriveDownloader,
};

pub async fn dispatch(cli: Cli, config: Config) -> Result<i32> {
    match cli.command.clone() {
        Command::Post {
            username,
            password,
            media,
            caption,
        } => {
            let request = PostRequest {
                username,
                password,
                media,
                caption,
            };
            handle_post(request, &cli, &config).await
        }
        Command::Login { username, password } => {
            let request = LoginRequest { username, password };
            handle_login(request, &cli, &config).await
        }
        Command::Config { subcommand } => {
            handle_config_command(subcommand, &cli, &config)?;
            Ok(0)
        }
    }
}

async fn handle_post(request: PostRequest, cli: &Cli, config: &Config) -> Result<i32> {
    let outcome = match config.validate().and_then(|()| DriveDownloader::new()) {
        Ok(downloader) => {
            Runner::new(config, &ChromeLauncher, &downloader)
                .post(request)
                .await
        }
        Err(e) => Outcome::from_error(&e),
    };
    report(&outcome, cli, config)
}

async fn handle_login(request: LoginRequest, cli: &Cli, config: &Config) -> Result<i32> {
    let outcome = match config.validate() {
        Ok(()) => {
            Runner::new(config, &ChromeLauncher, &LocalOnly)
                .login(request)
                .await
        }
        Err(e) => Outcome::from_error(&e),
    };
    report(&outcome, cli, config)
}

fn report(outcome: &Outcome, cli: &Cli, config: &Config) -> Result<i32> {
    output::print_output(&Report::new(outcome), cli.json, config.output.json_pretty)?;
    Ok(outcome.exit_code())
}

fn handle_config_command(subcommand: ConfigCommand, cli: &Cli, config: &Config) -> Result<()> {
    match subcommand {
        ConfigCommand::Init => {
            let result = handlers::config_handler::handle_config_init()?;
            output::print_output(&result, cli.json, true)
        }
        ConfigCommand::Show => {
            let result = handlers::config_handler::handle_config_show(config)?;
            output::print_output(&result, cli.json, true)
        }
        ConfigCommand::Path => {
            let result = handlers::config_handler::handle_config_path()?;
            output::print_output(&result, cli.json, true)
        }
    }
}
