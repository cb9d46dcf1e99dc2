use std::process::ExitCode;

use clap::Parser;
use dbspro::command::Commands;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::debug!("Running {}", cli.command);

    let result = match cli.command {
        Commands::ClusterBarcodes(mut cmd) => cmd.try_execute(),
        Commands::Correctfastq(mut cmd) => cmd.try_execute(),
        Commands::Tagfastq(mut cmd) => cmd.try_execute(),
        Commands::Splitcluster(mut cmd) => cmd.try_execute(),
        Commands::Integrate(mut cmd) => cmd.try_execute(),
        Commands::Filter(mut cmd) => cmd.try_execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
