use crate::world::case::{CaseId, VirusStatus};

use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};
use strum::{EnumCount, IntoEnumIterator};

const EPSILON: f64 = 1e-9;

/// Cases per disease compartment at one time step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CompartmentCounts([u32; VirusStatus::COUNT]);

impl CompartmentCounts {
    pub fn with_susceptible(n: u32) -> Self {
        let mut c = Self::default();
        c[VirusStatus::Susceptible] = n;
        c
    }

    pub fn apply_difference(&mut self, from: VirusStatus, to: VirusStatus) {
        self[from] -= 1;
        self[to] += 1;
    }

    pub fn n_infected(&self) -> u32 {
        VirusStatus::iter()
            .filter(|s| s.is_infected())
            .map(|s| self[s])
            .sum()
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }
}

impl Index<VirusStatus> for CompartmentCounts {
    type Output = u32;

    fn index(&self, status: VirusStatus) -> &u32 {
        &self.0[status as usize]
    }
}

impl IndexMut<VirusStatus> for CompartmentCounts {
    fn index_mut(&mut self, status: VirusStatus) -> &mut u32 {
        &mut self.0[status as usize]
    }
}

/// One seed case and the number of secondary infections it caused, bucketed
/// under the day the seed itself was exposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SpreadEntry {
    pub seed: CaseId,
    pub secondary_infections: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TestCounts {
    pub true_positive: u32,
    pub false_positive: u32,
    pub true_negative: u32,
    pub false_negative: u32,
}

/// One row of the R0 progression table.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct R0Row {
    pub day: u32,
    pub new_infectors: u32,
    pub new_infections: u32,
    pub r: f64,
    pub avg_r: f64,
}

/// Passive accumulator for everything the loop reports on. Append-only for
/// the duration of a run, read at output time.
#[derive(Default)]
pub struct Stat {
    people_infected: BTreeMap<u32, u32>,
    contacts_traced: BTreeMap<u32, u32>,
    isolation_steps: FxHashMap<CaseId, u32>,
    infection_spread: BTreeMap<u32, Vec<SpreadEntry>>,
    compartment_series: Vec<CompartmentCounts>,
    tests: TestCounts,
}

impl Stat {
    pub fn record_person_infected(&mut self, day: u32) {
        *self.people_infected.entry(day).or_insert(0) += 1;
    }

    pub fn record_contacts_traced(&mut self, day: u32, n: u32) {
        *self.contacts_traced.entry(day).or_insert(0) += n;
    }

    pub fn record_days_in_isolation(&mut self, id: CaseId, steps: u32) {
        *self.isolation_steps.entry(id).or_insert(0) += steps;
    }

    pub fn record_infection_spread(&mut self, exposure_day: u32, entry: SpreadEntry) {
        self.infection_spread
            .entry(exposure_day)
            .or_default()
            .push(entry);
    }

    pub fn record_test_result(&mut self, infected: bool, positive: bool) {
        let counter = match (infected, positive) {
            (true, true) => &mut self.tests.true_positive,
            (true, false) => &mut self.tests.false_negative,
            (false, true) => &mut self.tests.false_positive,
            (false, false) => &mut self.tests.true_negative,
        };
        *counter += 1;
    }

    pub fn push_compartments(&mut self, counts: CompartmentCounts) {
        self.compartment_series.push(counts);
    }

    pub fn compartment_series(&self) -> &[CompartmentCounts] {
        &self.compartment_series
    }

    pub fn people_infected_on(&self, day: u32) -> u32 {
        self.people_infected.get(&day).copied().unwrap_or(0)
    }

    pub fn total_infected(&self) -> u32 {
        self.people_infected.values().sum()
    }

    pub fn total_contacts_traced(&self) -> u32 {
        self.contacts_traced.values().sum()
    }

    pub fn total_isolation_steps(&self) -> u32 {
        self.isolation_steps.values().sum()
    }

    pub fn tests(&self) -> TestCounts {
        self.tests
    }

    /// Trailing unweighted mean over up to `window` values ending at each
    /// index. The head of the series averages over however many values
    /// exist; an empty window yields 0, and sums below epsilon are treated
    /// as 0 to avoid division noise.
    pub fn rolling_average(values: &[f64], window: usize) -> Vec<f64> {
        values
            .iter()
            .enumerate()
            .map(|(i, _)| {
                if window == 0 {
                    return 0.0;
                }
                let start = (i + 1).saturating_sub(window);
                let slice = &values[start..=i];
                let sum: f64 = slice.iter().sum();
                if sum.abs() < EPSILON {
                    0.0
                } else {
                    sum / slice.len() as f64
                }
            })
            .collect()
    }

    /// R0 progression: per exposure day, the cohort of seeds exposed that
    /// day, their secondary infections, R = infections / infectors, and the
    /// trailing `window`-day average of R.
    pub fn r0_progression(&self, window: usize) -> Vec<R0Row> {
        let Some((&last_day, _)) = self.infection_spread.iter().next_back() else {
            return Vec::new();
        };

        let mut rows: Vec<R0Row> = (0..=last_day)
            .map(|day| {
                let entries = self
                    .infection_spread
                    .get(&day)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                let new_infectors = entries.len() as u32;
                let new_infections: u32 =
                    entries.iter().map(|e| e.secondary_infections).sum();
                let r = if (new_infectors as f64) < EPSILON {
                    0.0
                } else {
                    f64::from(new_infections) / f64::from(new_infectors)
                };
                R0Row {
                    day,
                    new_infectors,
                    new_infections,
                    r,
                    avg_r: 0.0,
                }
            })
            .collect();

        let rs: Vec<f64> = rows.iter().map(|r| r.r).collect();
        for (row, avg) in rows.iter_mut().zip(Self::rolling_average(&rs, window)) {
            row.avg_r = avg;
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compartment_difference_moves_one_case() {
        let mut c = CompartmentCounts::with_susceptible(10);
        c.apply_difference(VirusStatus::Susceptible, VirusStatus::Exposed);
        assert_eq!(c[VirusStatus::Susceptible], 9);
        assert_eq!(c[VirusStatus::Exposed], 1);
        assert_eq!(c.n_infected(), 1);
        assert_eq!(c.total(), 10);
    }

    #[test]
    fn rolling_average_divides_by_actual_count_at_head() {
        let avg = Stat::rolling_average(&[2.0, 4.0, 6.0], 7);
        assert_eq!(avg, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn rolling_average_uses_trailing_window() {
        let avg = Stat::rolling_average(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(avg, vec![1.0, 1.5, 2.5, 3.5]);
    }

    #[test]
    fn rolling_average_of_nothing_is_empty_and_zero_window_is_zero() {
        assert!(Stat::rolling_average(&[], 7).is_empty());
        assert_eq!(Stat::rolling_average(&[5.0, 5.0], 0), vec![0.0, 0.0]);
    }

    #[test]
    fn rolling_average_treats_tiny_sums_as_zero() {
        let avg = Stat::rolling_average(&[1e-12, -5e-13], 7);
        assert_eq!(avg, vec![0.0, 0.0]);
    }

    #[test]
    fn infected_per_day_accumulates() {
        let mut stat = Stat::default();
        stat.record_person_infected(0);
        stat.record_person_infected(0);
        stat.record_person_infected(2);
        assert_eq!(stat.people_infected_on(0), 2);
        assert_eq!(stat.people_infected_on(1), 0);
        assert_eq!(stat.total_infected(), 3);
    }

    #[test]
    fn r0_rows_cover_gap_days() {
        let mut stat = Stat::default();
        stat.record_infection_spread(
            0,
            SpreadEntry {
                seed: CaseId(1),
                secondary_infections: 4,
            },
        );
        stat.record_infection_spread(
            0,
            SpreadEntry {
                seed: CaseId(2),
                secondary_infections: 0,
            },
        );
        stat.record_infection_spread(
            2,
            SpreadEntry {
                seed: CaseId(3),
                secondary_infections: 3,
            },
        );

        let rows = stat.r0_progression(7);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].new_infectors, 2);
        assert_eq!(rows[0].new_infections, 4);
        assert_eq!(rows[0].r, 2.0);
        assert_eq!(rows[1].new_infectors, 0);
        assert_eq!(rows[1].r, 0.0);
        assert_eq!(rows[2].r, 3.0);
        // trailing average over (2.0, 0.0, 3.0)
        assert!((rows[2].avg_r - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_tallies() {
        let mut stat = Stat::default();
        stat.record_test_result(true, true);
        stat.record_test_result(true, false);
        stat.record_test_result(false, false);
        stat.record_test_result(false, true);
        let t = stat.tests();
        assert_eq!(t.true_positive, 1);
        assert_eq!(t.false_negative, 1);
        assert_eq!(t.true_negative, 1);
        assert_eq!(t.false_positive, 1);
    }
}
