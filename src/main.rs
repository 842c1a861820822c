use std::process;

#[tokio::main]
async fn main() {
    let verbose = std::env::args().any(|arg| arg == "--verbose" || arg == "-v");
    init_logging(verbose);

    match postpilot::cli::run().await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            for suggestion in e.suggestions() {
                eprintln!("  • {}", suggestion);
            }
            process::exit(e.exit_code());
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = if verbose {
        EnvFilter::new("debug,chromiumoxide=info")
    } else {
        let from_env = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
        EnvFilter::new(format!("warn,{},chromiumoxide=off", from_env))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
