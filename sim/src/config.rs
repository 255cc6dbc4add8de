use crate::population::PopulationProperties;

use anyhow::Context as _;
use serde::Deserialize;
use sim_core::world::{
    alert::TracingPolicy,
    case::CaseId,
    commons::{DiseaseProperties, RunSettings},
    event::ContactEvent,
    isolation::IsolationProperties,
};
use std::{fs::File, path::Path};

/// Everything a run needs, loaded from a scenario directory of JSON files
/// plus a contact-schedule CSV.
pub struct Scenario {
    pub settings: RunSettings,
    pub population: PopulationProperties,
    pub disease: DiseaseProperties,
    pub isolation: IsolationProperties,
    pub tracing: TracingPolicy,
}

#[derive(Deserialize)]
struct SettingsFile {
    run: RunSettings,
    population: PopulationProperties,
}

impl Scenario {
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let SettingsFile { run, population } = read_json(&dir.join("settings.json"))?;
        Ok(Self {
            settings: run,
            population,
            disease: read_json(&dir.join("disease.json"))?,
            isolation: read_json(&dir.join("isolation.json"))?,
            tracing: read_json(&dir.join("tracing.json"))?,
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(file).with_context(|| format!("parsing {}", path.display()))
}

#[derive(Deserialize)]
struct ContactRow {
    time: u32,
    from: u32,
    to: u32,
    weight: f64,
    label: String,
}

/// Contact schedule CSV with columns `time,from,to,weight,label`.
pub fn load_contacts(path: &Path) -> anyhow::Result<Vec<ContactEvent>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut contacts = Vec::new();
    for row in reader.deserialize() {
        let row: ContactRow = row.with_context(|| format!("parsing {}", path.display()))?;
        contacts.push(ContactEvent {
            time: row.time,
            from: CaseId(row.from),
            to: CaseId(row.to),
            weight: row.weight,
            label: row.label,
        });
    }
    Ok(contacts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_rows_map_onto_events() {
        let dir = std::env::temp_dir().join("sim-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("contacts.csv");
        std::fs::write(
            &path,
            "time,from,to,weight,label\n0,1,2,1.5,home\n3,2,4,0.5,work\n",
        )
        .unwrap();

        let contacts = load_contacts(&path).unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].from, CaseId(1));
        assert_eq!(contacts[0].weight, 1.5);
        assert_eq!(contacts[1].time, 3);
        assert_eq!(contacts[1].label, "work");
    }

    #[test]
    fn missing_settings_file_reports_its_path() {
        let err = Scenario::load(Path::new("/nonexistent-scenario")).err().unwrap();
        assert!(format!("{err:#}").contains("settings.json"));
    }
}
