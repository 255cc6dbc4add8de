use anyhow::Context as _;
use sim_core::{world::case::VirusStatus, World};
use std::{fs, fs::File, path::Path};
use strum::IntoEnumIterator;
use tracing::info;

/// Trailing window (in days) for the averaged R column.
const R_WINDOW_DAYS: usize = 7;

pub fn write_all(dir: &Path, world: &World) -> anyhow::Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    write_compartments(&dir.join("compartments.csv"), world)?;
    write_r_progression(&dir.join("r_progression.csv"), world)?;
    write_summary(&dir.join("summary.json"), world)?;
    info!(dir = %dir.display(), "reports written");
    Ok(())
}

/// One row per time step, one column per disease compartment.
fn write_compartments(path: &Path, world: &World) -> anyhow::Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    let mut header = vec!["step".to_string()];
    header.extend(VirusStatus::iter().map(|s| s.to_string()));
    writer.write_record(&header)?;
    for (step, counts) in world.stat().compartment_series().iter().enumerate() {
        let mut row = vec![step.to_string()];
        row.extend(VirusStatus::iter().map(|s| counts[s].to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_r_progression(path: &Path, world: &World) -> anyhow::Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for row in world.stat().r0_progression(R_WINDOW_DAYS) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_summary(path: &Path, world: &World) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &world.summary())?;
    Ok(())
}
