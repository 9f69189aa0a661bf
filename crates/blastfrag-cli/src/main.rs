mod cli;

use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "BLASTFRAG_LOG";

fn main() {
    init_tracing();
    std::process::exit(cli::run_from_env());
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
