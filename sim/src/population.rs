use math::Proportion;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Deserialize;
use sim_core::util::random::Shape;
use sim_core::world::case::{Case, CaseId, Gender};
use sim_core::world::commons::RunSettings;
use tracing::info;

/// Demographic sampling parameters. Continuous draws are clamped into their
/// valid ranges rather than rejected; demographics have no bounded-integer
/// semantics.
#[derive(Clone, Debug, Deserialize)]
pub struct PopulationProperties {
    pub age: Shape,
    pub female_ratio: Proportion,
    pub compliance: Shape,
    pub health: Shape,
    pub app_ownership: Proportion,
}

/// Builds the case list the kernel receives. Seeded from the run seed, so a
/// scenario reproduces its population along with everything else.
pub fn generate(
    props: &PopulationProperties,
    settings: &RunSettings,
) -> anyhow::Result<Vec<Case>> {
    let mut rng = StdRng::seed_from_u64(settings.seed);
    let cases = (0..settings.population_size)
        .map(|i| {
            let age = props.age.draw(&mut rng)?.clamp(0.0, 120.0) as u32;
            let gender = if rng.gen::<f64>() < props.female_ratio.r() {
                Gender::Female
            } else {
                Gender::Male
            };
            let compliance = Proportion::new(props.compliance.draw(&mut rng)?.clamp(0.0, 1.0));
            let health = Proportion::new(props.health.draw(&mut rng)?.clamp(0.0, 1.0));
            let has_app = rng.gen::<f64>() < props.app_ownership.r();
            Ok(Case::new(CaseId(i), age, gender, compliance, health, has_app))
        })
        .collect::<Result<Vec<_>, sim_core::Error>>()?;
    info!(n = cases.len(), "population generated");
    Ok(cases)
}
