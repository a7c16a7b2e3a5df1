use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod cache;
mod classifier;
mod cli;
mod config;
mod discovery;
mod domain;
mod errors;
mod llm;
mod note_id;
mod semantic;
mod sources;
mod storage;
#[cfg(test)]
mod tests;
mod vault;

use app::AppFactory;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();
    let _span = tracing::info_span!("serendip", command = args.command.name()).entered();

    let paths = AppFactory::get_paths()?;
    let ctx = AppFactory::create_context(&paths)?;

    match args.command {
        cli::Command::Embed {} => cli::handle_embed(&ctx)?,
        cli::Command::Classify { note } => cli::handle_classify(&ctx, &note)?,
        cli::Command::Discover {
            note,
            explain,
            no_cache,
        } => cli::handle_discover(&ctx, &note, explain, no_cache)?,
        cli::Command::Top {
            limit,
            explain,
            no_cache,
            seed,
        } => cli::handle_top(&ctx, limit, explain, no_cache, seed)?,
        cli::Command::Deep { seed, no_cache } => cli::handle_deep(&ctx, seed, no_cache)?,
        cli::Command::Cache { action } => match cli::handle_cache(&ctx, action) {
            Err(cli::errors::CliError::UserCancelled) => {}
            other => other?,
        },
    }

    Ok(())
}
