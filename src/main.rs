use anyhow::Result;
use clap::Parser;

use seqgen::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run()
}
