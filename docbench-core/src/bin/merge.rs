use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use docbench_core::dataset::{merge_samples, read_samples};

#[derive(Parser)]
#[command(name = "docbench-merge")]
#[command(about = "Merge canonical annotation files into one JSON array, joining pages with the same key")]
struct Args {
    #[arg(required = true, help = "Canonical files (.json or .jsonl)")]
    inputs: Vec<PathBuf>,

    #[arg(short, long, help = "Merged output file")]
    output: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut samples = Vec::new();
    for input in &args.inputs {
        let read = read_samples(input)?;
        info!("{}: {} samples", input.display(), read.len());
        samples.extend(read);
    }
    let merged = merge_samples(samples);

    std::fs::write(&args.output, serde_json::to_string_pretty(&merged)?)?;
    info!("Wrote {} samples to {}", merged.len(), args.output.display());
    Ok(())
}
