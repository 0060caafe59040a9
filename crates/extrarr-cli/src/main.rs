use clap::Parser;
use extrarr_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    // Initialize logging before anything touches the store.
    logging::init(cli.command.log_target());

    if let Err(err) = cli.command.run().await {
        eprintln!("extrarr error: {:#}", err);
        std::process::exit(1);
    }
}
