//! TransFit CLI: evidence-grounded exercise tip enrichment.
//!
//! Tags research by topic, infers exercise topics, and generates coaching
//! tips grounded in matching research, stored for human review.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // Credentials may live in a local .env file.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
