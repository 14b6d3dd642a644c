use clap::Parser;
use tracing_subscriber::FmtSubscriber;

use aep_cli::cli::{Cli, Commands};

mod commands;

use commands::{config, run, table};

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {err}");
    }

    let result = match &cli.command {
        Commands::Run {
            plant,
            settings,
            num_sim,
            products,
            out,
            params_out,
            json,
        } => run::handle(
            plant,
            settings,
            *num_sim,
            products,
            out,
            params_out.as_deref(),
            *json,
        ),
        Commands::Table {
            plant,
            settings,
            out,
        } => table::handle(plant, settings, out),
        Commands::Config { command } => config::handle(command),
    };

    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
