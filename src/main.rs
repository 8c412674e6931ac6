//! zennas - Main Entry Point

use clap::Parser;
use zennas::cli::{cmd_info, cmd_search, Cli, Commands, SearchArgs};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zennas=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Search {
            max_params,
            max_flops,
            max_layers,
            population_size,
            max_iter,
            seed,
            initial_structure,
            random_init,
            scorer,
            batch_size,
            resolution,
            num_classes,
            progress_every,
            time_budget_secs,
            output_dir,
        } => {
            cmd_search(&SearchArgs {
                max_params,
                max_flops,
                max_layers,
                population_size,
                max_iter,
                seed,
                initial_structure,
                random_init,
                scorer,
                batch_size,
                resolution,
                num_classes,
                progress_every,
                time_budget_secs,
                output_dir,
            })?;
        }
        Commands::Info {
            structure,
            resolution,
        } => {
            cmd_info(&structure, resolution)?;
        }
    }

    Ok(())
}
