use clap::Parser;
use dbpush::backend::postgres::PostgresBackend;
use dbpush::cli::Cli;
use dbpush::error::DbpushError;
use dbpush::pipeline::{Run, RunReport};
use dbpush::{logging, output};
use std::process;

#[tokio::main]
async fn main() {
    // Load .env file (optional, ignore if missing)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref());

    match run(&cli).await {
        Ok(report) => output::print_summary(&report),
        Err(err) => {
            output::print_error(&err);
            process::exit(1);
        }
    }
}

async fn run(cli: &Cli) -> Result<RunReport, DbpushError> {
    let mut run = Run::new();
    let config = run.load(&cli.run, cli.show_secrets)?;
    let backend = PostgresBackend::new(&config.database);
    run.fetch_and_push(&config, &backend).await
}
