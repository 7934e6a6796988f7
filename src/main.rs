//! Provides the main entry point to the program.
use anyhow::Result;
use clap::Parser;
use expanse::commands::Cli;

fn main() -> Result<()> {
    Cli::parse().command.execute()
}
