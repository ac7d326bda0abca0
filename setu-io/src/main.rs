//! SetuIO - lidar scan relay daemon
//!
//! ```text
//! setu-io [--config <path>] --channel --serial <port> [baud]
//! setu-io [--config <path>] --channel --udp <host> <port>
//! ```

use setu_io::cli::{self, Command};
use setu_io::error::exit_code;
use setu_io::Config;
use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("setu-io");

    let invocation = match cli::parse_args(&args) {
        Ok(Command::Run(invocation)) => invocation,
        Ok(command) => {
            println!("{}", cli::usage(program));
            std::process::exit(command.early_exit().unwrap_or(exit_code::SUCCESS));
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("{}", cli::usage(program));
            std::process::exit(e.exit_code());
        }
    };

    let config = match &invocation.config_path {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(exit_code::CONFIG);
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("SetuIO v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &invocation.config_path {
        log::info!("Using config: {}", path);
    }
    log::info!("Lidar channel: {}", invocation.selector);

    std::process::exit(setu_io::app::run(&config, &invocation.selector));
}
