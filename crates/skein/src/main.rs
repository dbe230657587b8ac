use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use skein::common::config::load_settings_from;
use skein::common::{init_logging, LogFormat};
use skein::{coordinator, render_routing, worker, PlanDescription};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file; defaults to the component's standard config path.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble a plan description and print the routing of every worker.
    Explain { plan: PathBuf },
    /// Run a worker until Ctrl-C.
    Worker,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(if args.log_json { LogFormat::Json } else { LogFormat::Pretty });

    match args.command {
        Command::Explain { plan } => {
            let settings: coordinator::config::Settings = match &args.config {
                Some(path) => load_settings_from(path, "SKEIN_COORDINATOR")?,
                None => coordinator::config::Settings::new()?,
            };
            let json = std::fs::read_to_string(&plan)
                .with_context(|| format!("reading plan description {}", plan.display()))?;
            let description = PlanDescription::from_json(&json)
                .with_context(|| format!("parsing plan description {}", plan.display()))?;
            let query = description.assemble(&settings)?;
            print!("{}", render_routing(&query));
        }
        Command::Worker => {
            let settings: worker::Settings = match &args.config {
                Some(path) => load_settings_from(path, "SKEIN_WORKER")?,
                None => worker::Settings::new()?,
            };
            worker::run_worker(settings, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "failed to listen for ctrl-c");
                }
            })
            .await?;
        }
    }
    Ok(())
}
