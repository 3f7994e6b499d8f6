use chartify::cli::Cli;
use clap::Parser;
use std::process;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> chartify::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    cli.init_logging();

    chartify::run_command(cli.command, cli.config)
}
