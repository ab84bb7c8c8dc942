use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "bot_cli=info,bot_runtime=info";

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    std::process::exit(bot_cli::run_cli_from_args(std::env::args_os()));
}
