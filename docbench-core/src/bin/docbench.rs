use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use docbench_core::{EvalConfig, Orchestrator, Registries};

#[derive(Parser)]
#[command(name = "docbench")]
#[command(about = "Evaluate document layout predictions against ground truth")]
struct Args {
    #[arg(short, long, help = "Evaluation config (.json or .toml)")]
    config: PathBuf,

    #[arg(short, long, help = "Directory for <save_name>_metric_result.json reports")]
    output_dir: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = EvalConfig::load_from_file(&args.config)?;
    info!(
        "Loaded {} tasks from {}",
        config.tasks.len(),
        args.config.display()
    );

    let mut orchestrator = Orchestrator::new(Registries::with_builtins()?);
    if let Some(dir) = args.output_dir {
        orchestrator = orchestrator.with_output_dir(dir);
    }

    for entry in &config.tasks {
        let _span = tracing::info_span!("task", name = %entry.name).entered();
        let report = match orchestrator.prepare(entry) {
            Ok(matched) => {
                println!("###### Process: {}", matched.save_name());
                orchestrator.score(matched)
            }
            Err(err) => orchestrator.fail(entry, &err),
        };
        println!("{}", report.summary());
    }

    info!("Evaluation finished");
    Ok(())
}
