use anyhow::Result;
use autorent::cli::Cli;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    autorent::logging::init_logging(cli.verbose);
    cli.run().await
}
