use crate::util::random::BoundedDistribution;
use crate::Error;

use math::Proportion;
use serde::{Deserialize, Serialize};

/// Disease parameters: scalar rates/thresholds plus one bounded duration
/// distribution per disease stage. Arrives already parsed; the kernel never
/// touches file bytes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiseaseProperties {
    /// Contact weights below this are "weak"; only weak contacts can be
    /// suppressed by isolation.
    pub exposure_threshold: f64,
    /// Per-unit-weight infection probability of a contact.
    pub exposure_rate: Proportion,
    /// Exponent applied to the contact weight before the rate.
    pub exposure_exponent: f64,
    /// Per-step probability that a susceptible case is exposed with no
    /// contact at all.
    pub random_infection_rate: Proportion,
    /// Branch EXPOSED -> EXPOSED_2 (symptomatic track) vs ASYMPTOMATIC.
    pub probability_symptomatic: Proportion,
    /// Branch SYMPTOMATIC -> SEVERELY_SYMPTOMATIC vs RECOVERED.
    pub severity_rate: Proportion,
    /// Branch SEVERELY_SYMPTOMATIC -> DEAD vs RECOVERED.
    pub mortality_rate: Proportion,
    /// Probability a test result reflects the truth.
    pub test_accuracy: Proportion,

    pub latent_period: BoundedDistribution,
    pub onset_period: BoundedDistribution,
    pub asymptomatic_recovery_period: BoundedDistribution,
    pub symptomatic_recovery_period: BoundedDistribution,
    pub decline_period: BoundedDistribution,
    pub severe_recovery_period: BoundedDistribution,
    pub death_period: BoundedDistribution,
    pub test_administered_delay: BoundedDistribution,
    pub test_result_delay: BoundedDistribution,
}

impl DiseaseProperties {
    /// Every probability field must already be a fraction in `[0, 1]`;
    /// anything else would panic deep inside a run instead of failing at
    /// load time.
    pub fn validate(&self) -> Result<(), Error> {
        for (name, value) in [
            ("exposure_rate", self.exposure_rate),
            ("random_infection_rate", self.random_infection_rate),
            ("probability_symptomatic", self.probability_symptomatic),
            ("severity_rate", self.severity_rate),
            ("mortality_rate", self.mortality_rate),
            ("test_accuracy", self.test_accuracy),
        ] {
            if !(0.0..=1.0).contains(&value.r()) {
                return Err(Error::InvalidConfig(format!(
                    "disease {name} must lie in [0, 1], got {}",
                    value.r()
                )));
            }
        }
        Ok(())
    }
}

/// Run settings for one batch simulation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RunSettings {
    pub population_size: u32,
    /// Last time step at which new activity (contacts, background
    /// infection) may occur; the run drains remaining events past it.
    pub time_limit: u32,
    pub steps_per_day: u32,
    pub seed: u64,
    pub initial_exposures: u32,
}

impl RunSettings {
    #[inline]
    pub fn day_of(&self, time: u32) -> u32 {
        time / self.steps_per_day.max(1)
    }
}
