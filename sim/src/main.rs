mod config;
mod population;
mod report;

use anyhow::Context as _;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(clap::Parser)]
#[command(about = "Runs one batch epidemic simulation from a scenario directory")]
struct Args {
    /// Directory holding settings.json, disease.json, isolation.json,
    /// tracing.json and contacts.csv.
    #[arg(long)]
    scenario: PathBuf,
    /// Directory the reports are written into.
    #[arg(long, default_value = "out")]
    out: PathBuf,
    /// Overrides the seed from settings.json.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let mut scenario = config::Scenario::load(&args.scenario)?;
    if let Some(seed) = args.seed {
        scenario.settings.seed = seed;
    }
    let cases = population::generate(&scenario.population, &scenario.settings)
        .context("generating population")?;
    let contacts = config::load_contacts(&args.scenario.join("contacts.csv"))?;

    let mut world = sim_core::World::new(
        scenario.settings,
        scenario.disease,
        scenario.isolation,
        scenario.tracing,
        cases,
        contacts,
    )
    .context("building world")?;
    world.run().context("running simulation")?;

    report::write_all(&args.out, &world)
}
