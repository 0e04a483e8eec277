use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use playguard::sim::scenario::{self, Scenario};
use playguard::GuardPolicy;

#[derive(Parser)]
#[command(name = "playguard", about = "Run playback-guard scenarios on the simulated page")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file and print its report
    Run {
        /// Path to a scenario JSON file
        scenario: PathBuf,
        /// Override the scenario's guard policy with this JSON file
        #[arg(long)]
        policy: Option<PathBuf>,
        /// Print the full decision trace instead of the report
        #[arg(long)]
        trace: bool,
        /// Print only the sha256 digest of the trace
        #[arg(long)]
        digest: bool,
    },
    /// Run the built-in miniplayer demo scenario
    Demo {
        #[arg(long)]
        trace: bool,
        #[arg(long)]
        digest: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { scenario, policy, trace, digest } => {
            let mut scn = Scenario::load(&scenario)
                .with_context(|| format!("loading {}", scenario.display()))?;
            if let Some(path) = policy {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let policy: GuardPolicy =
                    serde_json::from_str(&raw).context("parsing policy JSON")?;
                scn.policy = Some(policy);
            }
            execute(&scn, trace, digest)
        }
        Commands::Demo { trace, digest } => execute(&scenario::demo_scenario(), trace, digest),
    }
}

fn execute(scn: &Scenario, trace: bool, digest: bool) -> anyhow::Result<()> {
    let report = scenario::run_scenario(scn).context("running scenario")?;
    if digest {
        println!("{}", report.digest);
    } else if trace {
        println!("{}", serde_json::to_string_pretty(&report.trace)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    if !report.passed() {
        for failure in &report.failures {
            eprintln!("expectation failed: {failure}");
        }
        std::process::exit(1);
    }
    Ok(())
}
