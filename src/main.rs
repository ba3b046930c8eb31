use anyhow::Result;
use clap::{Parser, Subcommand};
use KLASH::cmd::{index, search};

#[derive(Parser)]
#[command(name = "klash")]
#[command(version = "0.1.0")]
#[command(about = "K-mer LSH approximate-similarity search for protein databases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the MinHash/LSH index for one database volume
    Index(index::IndexArgs),

    /// Search queries against a built index
    Search(search::SearchArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Index(args) => {
            index::run(args)?;
        }
        Commands::Search(args) => {
            search::run(args)?;
        }
    }
    Ok(())
}
