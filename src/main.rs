use std::path::PathBuf;

use clap::Parser;

use mgmtd::config::loader::load_or_default;
use mgmtd::observability::{logging, metrics};
use mgmtd::{run, Daemon};

#[derive(Parser)]
#[command(name = "mgmtd")]
#[command(about = "Management daemon web server", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults are used when absent
    #[arg(short, long, env = "MGMTD_CONFIG")]
    config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let config = match load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("mgmtd: {}", e);
            std::process::exit(1);
        }
    };

    logging::init(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.listener.default_port,
        "mgmtd starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    std::process::exit(run(Daemon::new(config)));
}
